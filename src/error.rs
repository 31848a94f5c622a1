//! Error types for the doc2pub library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BatchError`] — **Fatal**: the batch cannot proceed at all (the output
//!   root cannot be created, the configuration is invalid). Returned as
//!   `Err(BatchError)` from the top-level `run_batch*` functions.
//!
//! * [`TaskError`] — **Non-fatal**: a single file failed (converter error,
//!   per-file timeout, unreadable input) but every other file is fine.
//!   Stored inside [`crate::output::TaskStatus::Failed`] so callers can
//!   inspect partial success rather than losing the whole batch to one
//!   bad file.
//!
//! Skips are not errors at all — see [`crate::output::SkipReason`]. A file
//! excluded by pattern, condition, or binary detection lands in the result's
//! skip list with a human-readable reason, never in `errors`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doc2pub library.
///
/// Per-file failures use [`TaskError`] and are stored in
/// [`crate::output::FileRecord`] rather than propagated here. The only
/// condition that aborts an entire run is failing to create the output
/// root directory.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The output root directory could not be created.
    #[error("failed to create output root '{path}': {source}")]
    OutputRootCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed, or the config is unusable at run time
    /// (e.g. no converter attached).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal error for a single conversion task.
///
/// Stored in [`crate::output::TaskStatus::Failed`]; the batch continues
/// with the next task. There are no automatic retries — a failed task is
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum TaskError {
    /// The external converter returned an error for this file.
    #[error("conversion failed for '{path}': {detail}")]
    ConverterFailed { path: PathBuf, detail: String },

    /// The per-file timeout elapsed before the converter finished.
    #[error("conversion timed out after {elapsed_ms}ms for '{path}'")]
    Timeout { path: PathBuf, elapsed_ms: u64 },

    /// Reading the input or writing the output failed.
    #[error("I/O error on '{path}': {detail}")]
    Io { path: PathBuf, detail: String },
}

impl TaskError {
    /// Build an I/O task error from a `std::io::Error`, keeping only the
    /// display string so the error stays cloneable and serialisable.
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        TaskError::Io {
            path: path.into(),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let e = TaskError::Timeout {
            path: PathBuf::from("docs/intro.htm"),
            elapsed_ms: 30000,
        };
        let msg = e.to_string();
        assert!(msg.contains("30000ms"), "got: {msg}");
        assert!(msg.contains("intro.htm"));
    }

    #[test]
    fn converter_failed_display() {
        let e = TaskError::ConverterFailed {
            path: PathBuf::from("a.htm"),
            detail: "malformed topic".into(),
        };
        assert!(e.to_string().contains("malformed topic"));
    }

    #[test]
    fn invalid_config_display() {
        let e = BatchError::InvalidConfig("chunk_size must be >= 1".into());
        assert!(e.to_string().contains("chunk_size"));
    }
}
