//! Configuration types for batch conversion.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. Every option is enumerated here with its default
//! resolved once at construction — nothing is re-derived per file, so two
//! runs with the same config are directly comparable.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::converter::{DocumentConverter, IncludeGenerator};
use crate::error::BatchError;
use crate::pipeline::plan::TocPlan;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Target publishing format.
///
/// Selects the output file extension, the reference syntax the rewriter
/// scans for, and whether the format ships image assets alongside the
/// converted documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetFormat {
    /// AsciiDoc (`.adoc`), `xref:`/`image::` references.
    #[default]
    Asciidoc,
    /// CommonMark (`.md`), `[..](..)` / `![..](..)` references.
    Markdown,
    /// Writerside-flavoured Markdown (`.md`).
    WritersideMarkdown,
    /// Zendesk Help Center HTML (`.html`), `href`/`src` references.
    Zendesk,
    /// Plain text (`.txt`); no reference syntax, no asset copying.
    PlainText,
}

impl TargetFormat {
    /// Output file extension for this format (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Asciidoc => "adoc",
            TargetFormat::Markdown | TargetFormat::WritersideMarkdown => "md",
            TargetFormat::Zendesk => "html",
            TargetFormat::PlainText => "txt",
        }
    }

    /// Whether the directory-level image copy runs for this format.
    pub fn copies_assets(self) -> bool {
        !matches!(self, TargetFormat::PlainText)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetFormat::Asciidoc => "asciidoc",
            TargetFormat::Markdown => "markdown",
            TargetFormat::WritersideMarkdown => "writerside-markdown",
            TargetFormat::Zendesk => "zendesk",
            TargetFormat::PlainText => "plain-text",
        };
        f.write_str(s)
    }
}

/// Configuration for one batch conversion run.
///
/// Built via [`BatchConfig::builder()`] or [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2pub::{BatchConfig, TargetFormat};
///
/// let config = BatchConfig::builder()
///     .format(TargetFormat::Asciidoc)
///     .chunk_size(25)
///     .rename_from_headings(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Descend into subdirectories. Default: true.
    pub recursive: bool,

    /// Mirror the input directory structure under the output root.
    /// When false every output lands directly in the output root.
    /// Ignored when a TOC plan is supplied. Default: true.
    pub preserve_structure: bool,

    /// Run the directory-level image asset copy. Default: true.
    pub copy_images: bool,

    /// Derive output filenames from each document's first level-1 heading
    /// (slugified), recording renames for the cross-reference rewriter.
    /// Default: false.
    pub rename_from_headings: bool,

    /// Basename patterns a file must match to be converted (substring, or
    /// `*.ext` suffix). Empty means "accept everything".
    pub include_patterns: Vec<String>,

    /// Basename patterns that exclude a file (same matching rules).
    pub exclude_patterns: Vec<String>,

    /// Condition-marker values that exclude a file. Matching requires
    /// reading content, so it runs again at task execution time, not only
    /// at discovery.
    pub exclude_conditions: Vec<String>,

    /// Externally supplied table-of-contents plan. When present, output
    /// paths come from the plan and files absent from it are skipped.
    pub toc_plan: Option<TocPlan>,

    /// Number of tasks per chunk. Default: 50.
    ///
    /// Chunks bound peak resource usage (open file handles, in-flight
    /// buffers) on very large batches; chunk N finishes completely before
    /// chunk N+1 starts.
    pub chunk_size: usize,

    /// Delay between chunk boundaries in milliseconds. Default: 1000.
    pub chunk_delay_ms: u64,

    /// Per-file conversion timeout in milliseconds. Default: 30000.
    ///
    /// When the timer wins the race the task fails with a timeout error;
    /// there is no automatic retry.
    pub per_file_timeout_ms: u64,

    /// Heartbeat period in milliseconds. Default: 5000.
    ///
    /// While a conversion is in flight a progress event is re-emitted at
    /// this period so observers are not starved during slow files. The
    /// heartbeat never extends the timeout.
    pub heartbeat_interval_ms: u64,

    /// Target publishing format. Default: [`TargetFormat::Asciidoc`].
    pub format: TargetFormat,

    /// The single-document converter collaborator. Required to run a batch.
    pub converter: Option<Arc<dyn DocumentConverter>>,

    /// Optional variables/stylesheet include generator.
    pub includes: Option<Arc<dyn IncludeGenerator>>,

    /// Cancellation token checked between tasks and chunks. Defaults to a
    /// token that is never cancelled.
    pub cancel: CancellationToken,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            preserve_structure: true,
            copy_images: true,
            rename_from_headings: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            exclude_conditions: Vec::new(),
            toc_plan: None,
            chunk_size: 50,
            chunk_delay_ms: 1000,
            per_file_timeout_ms: 30_000,
            heartbeat_interval_ms: 5_000,
            format: TargetFormat::default(),
            converter: None,
            includes: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("recursive", &self.recursive)
            .field("preserve_structure", &self.preserve_structure)
            .field("copy_images", &self.copy_images)
            .field("rename_from_headings", &self.rename_from_headings)
            .field("include_patterns", &self.include_patterns)
            .field("exclude_patterns", &self.exclude_patterns)
            .field("exclude_conditions", &self.exclude_conditions)
            .field("toc_plan", &self.toc_plan.as_ref().map(|p| p.file_mapping.len()))
            .field("chunk_size", &self.chunk_size)
            .field("chunk_delay_ms", &self.chunk_delay_ms)
            .field("per_file_timeout_ms", &self.per_file_timeout_ms)
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("format", &self.format)
            .field("converter", &self.converter.as_ref().map(|c| c.name()))
            .field("includes", &self.includes.as_ref().map(|_| "<dyn IncludeGenerator>"))
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BatchConfig`].
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn preserve_structure(mut self, v: bool) -> Self {
        self.config.preserve_structure = v;
        self
    }

    pub fn copy_images(mut self, v: bool) -> Self {
        self.config.copy_images = v;
        self
    }

    pub fn rename_from_headings(mut self, v: bool) -> Self {
        self.config.rename_from_headings = v;
        self
    }

    pub fn include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.include_patterns = patterns;
        self
    }

    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude_patterns = patterns;
        self
    }

    pub fn exclude_conditions(mut self, conditions: Vec<String>) -> Self {
        self.config.exclude_conditions = conditions;
        self
    }

    pub fn toc_plan(mut self, plan: TocPlan) -> Self {
        self.config.toc_plan = Some(plan);
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n.max(1);
        self
    }

    pub fn chunk_delay_ms(mut self, ms: u64) -> Self {
        self.config.chunk_delay_ms = ms;
        self
    }

    pub fn per_file_timeout_ms(mut self, ms: u64) -> Self {
        self.config.per_file_timeout_ms = ms;
        self
    }

    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.heartbeat_interval_ms = ms;
        self
    }

    pub fn format(mut self, format: TargetFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.config.converter = Some(converter);
        self
    }

    pub fn includes(mut self, includes: Arc<dyn IncludeGenerator>) -> Self {
        self.config.includes = Some(includes);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.config.cancel = token;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, BatchError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(BatchError::InvalidConfig("chunk_size must be >= 1".into()));
        }
        if c.per_file_timeout_ms == 0 {
            return Err(BatchError::InvalidConfig(
                "per_file_timeout_ms must be >= 1".into(),
            ));
        }
        if c.heartbeat_interval_ms == 0 {
            return Err(BatchError::InvalidConfig(
                "heartbeat_interval_ms must be >= 1".into(),
            ));
        }
        Ok(self.config)
    }
}
