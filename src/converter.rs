//! Collaborator contracts consumed by the orchestrator.
//!
//! The orchestrator never parses or renders document content itself. The
//! format-specific rendering logic, variable/glossary extraction, and
//! quality scoring live behind the traits in this module; the batch core
//! only decides *when* each collaborator runs and *where* its output lands.
//!
//! Both traits return [`BoxFuture`]s instead of using `async fn` so they
//! stay object-safe — the executor holds them as `Arc<dyn …>` and calls
//! them from concurrently running tasks.

use crate::config::TargetFormat;
use crate::error::TaskError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Options passed through to the converter for each file.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Target publishing format.
    pub format: TargetFormat,
    /// Root of the input project, for converters that resolve
    /// project-relative resources (snippets, variables).
    pub input_root: PathBuf,
}

/// A name/value pair extracted from the project's variable definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    pub value: String,
}

/// Quality assessment attached to a conversion result by the external
/// scorer. The orchestrator only aggregates these — the scoring algorithm
/// itself is out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Score in the 0–100 range.
    pub score: f32,
    /// Human-readable issue descriptions.
    pub issues: Vec<String>,
}

/// Metadata a converter reports alongside the converted content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertMetadata {
    /// Image paths referenced by the document, as declared in the source
    /// (project-relative or document-relative; the asset resolver tries
    /// both).
    pub images: Vec<String>,
    /// Variables the converter encountered in this document.
    pub variables: Vec<VariableDef>,
    /// Optional quality report from the external scorer.
    pub quality: Option<QualityReport>,
}

/// The result of converting a single document.
#[derive(Debug, Clone, Default)]
pub struct ConvertedDocument {
    /// Converted content; the executor writes this to the planned output
    /// path atomically.
    pub content: String,
    pub metadata: ConvertMetadata,
}

/// Format-specific single-document converter.
///
/// Implementations must be safe to invoke repeatedly and must not mutate
/// state the orchestrator can observe; the executor may call `convert`
/// concurrently for different files within a sub-group.
pub trait DocumentConverter: Send + Sync {
    /// Convert `input` and return the content destined for `output`.
    ///
    /// The executor — not the converter — writes the returned content to
    /// `output`; the path is provided so converters can compute
    /// output-relative links.
    fn convert<'a>(
        &'a self,
        input: &'a Path,
        output: &'a Path,
        options: &'a ConvertOptions,
    ) -> BoxFuture<'a, Result<ConvertedDocument, TaskError>>;

    /// Human-readable converter name for tracing.
    fn name(&self) -> &str {
        "converter"
    }
}

/// A file generated by the include-file collaborator (variables include,
/// stylesheet), written once per batch into the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Path relative to the output root.
    pub relative_path: PathBuf,
    pub content: String,
}

/// Variable/glossary and stylesheet generation, supplied by the project
/// subsystem. The orchestrator invokes each method at most once per batch
/// (after the first successful conversion) and writes the returned files
/// into the output root.
pub trait IncludeGenerator: Send + Sync {
    /// The variables include file for the project, if it defines any.
    fn variables_file<'a>(
        &'a self,
        project_root: &'a Path,
        format: TargetFormat,
    ) -> BoxFuture<'a, Result<Option<GeneratedFile>, TaskError>>;

    /// Stylesheet to ship alongside HTML-based outputs.
    fn stylesheet<'a>(
        &'a self,
        format: TargetFormat,
    ) -> BoxFuture<'a, Result<Option<GeneratedFile>, TaskError>>;
}

/// A trivial converter that passes text content through unchanged.
///
/// Used by the test suite and the CLI's `--execute` smoke mode. It performs
/// no parsing or rendering — the content lands in the output tree exactly
/// as it was read.
pub struct PassthroughConverter;

impl DocumentConverter for PassthroughConverter {
    fn convert<'a>(
        &'a self,
        input: &'a Path,
        _output: &'a Path,
        _options: &'a ConvertOptions,
    ) -> BoxFuture<'a, Result<ConvertedDocument, TaskError>> {
        Box::pin(async move {
            let content = tokio::fs::read_to_string(input)
                .await
                .map_err(|e| TaskError::io(input, &e))?;
            Ok(ConvertedDocument {
                content,
                metadata: ConvertMetadata::default(),
            })
        })
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_returns_content_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("topic.htm");
        tokio::fs::write(&input, "<h1>Hello</h1>").await.unwrap();

        let opts = ConvertOptions {
            format: TargetFormat::Asciidoc,
            input_root: dir.path().to_path_buf(),
        };
        let doc = PassthroughConverter
            .convert(&input, Path::new("out.adoc"), &opts)
            .await
            .unwrap();

        assert_eq!(doc.content, "<h1>Hello</h1>");
        assert!(doc.metadata.images.is_empty());
    }

    #[tokio::test]
    async fn passthrough_missing_input_is_io_error() {
        let opts = ConvertOptions {
            format: TargetFormat::Markdown,
            input_root: PathBuf::from("."),
        };
        let err = PassthroughConverter
            .convert(Path::new("/no/such/file.htm"), Path::new("out.md"), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Io { .. }));
    }
}
