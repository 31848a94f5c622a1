//! # doc2pub
//!
//! Batch-convert documentation project export trees (authoring-tool HTML
//! topic trees) to publishing formats, file by file, while preserving
//! cross-document structure.
//!
//! ## Why this crate?
//!
//! Authoring-tool exports are sprawling: thousands of topic files, image
//! directories in tool-specific places, generated junk interleaved with
//! content, and cross-document links that break the moment a filename
//! changes. doc2pub is the orchestrator for that mess — it discovers the
//! convertible files, decides where each one lands (mirroring the source
//! tree or following an external table-of-contents plan), drives the
//! format converter under throughput and time bounds with per-file
//! failure isolation, and finishes with a link-repair pass so the
//! converted corpus stays internally consistent.
//!
//! The format-specific rendering itself is a collaborator: implement
//! [`DocumentConverter`] (or use an existing one) and hand it to the
//! batch config.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input tree
//!  │
//!  ├─ 1. Discover  bounded lexical walk, junk pruned before descent
//!  ├─ 2. Plan      mirror or TOC-plan paths, optional heading renames
//!  ├─ 3. Execute   chunks of 50, sub-groups of 10, timeout + heartbeat
//!  ├─ 4. Assets    project image directory copied once per batch
//!  ├─ 5. Rewrite   links/images repaired after renames (idempotent)
//!  └─ 6. Result    counts, errors, skips, quality summary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2pub::{run_batch, BatchConfig, PassthroughConverter, TargetFormat};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BatchConfig::builder()
//!         .format(TargetFormat::Asciidoc)
//!         .rename_from_headings(true)
//!         .converter(Arc::new(PassthroughConverter))
//!         .build()?;
//!
//!     let result = run_batch("export/Content", "out/docs", &config).await?;
//!     println!(
//!         "{}/{} converted, {} skipped, {} errors",
//!         result.converted,
//!         result.total_files,
//!         result.skipped,
//!         result.errors.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! A batch run returns `Err` only when it cannot start at all (no
//! converter, output root uncreatable). Everything per-file — converter
//! errors, timeouts, binary inputs, pattern and condition exclusions —
//! is recorded in the [`BatchResult`] and the run continues. There are no
//! automatic retries anywhere.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2pub` binary (clap + anyhow + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod converter;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run_batch, run_batch_with_progress};
pub use config::{BatchConfig, BatchConfigBuilder, TargetFormat};
pub use converter::{
    ConvertMetadata, ConvertOptions, ConvertedDocument, DocumentConverter, GeneratedFile,
    IncludeGenerator, PassthroughConverter, QualityReport, VariableDef,
};
pub use error::{BatchError, TaskError};
pub use output::{
    BatchResult, CandidateFile, ErrorEntry, FileRecord, FilenameMapping, QualitySummary,
    SkipEntry, SkipReason, TaskStatus,
};
pub use pipeline::plan::{TocFolder, TocPlan};
pub use progress::{progress_channel, Phase, ProgressEvent, ProgressSender, ProgressStream};
