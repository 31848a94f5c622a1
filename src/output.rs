//! Result types for batch conversion.
//!
//! Everything the orchestrator learns during a run ends up in a
//! [`BatchResult`]: per-file records, the error and skip lists, the
//! filename mapping produced by heading-derived renaming, and an optional
//! quality summary. A run that finishes always returns a result — callers
//! inspect `errors` and `skipped_list` rather than relying on an `Err` to
//! detect problems.

use crate::converter::QualityReport;
use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Files scoring below this threshold are listed in
/// [`QualitySummary::below_threshold`].
pub const QUALITY_THRESHOLD: f32 = 70.0;

/// A file found by the discoverer and considered for conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFile {
    /// Absolute path of the input file.
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Lowercased extension without the dot; empty if none.
    pub extension: String,
}

/// Why a file was skipped rather than converted.
///
/// A skip is never an error: it is recorded in the result's skip list with
/// a human-readable reason and does not affect the error count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Extension outside the supported input set.
    UnsupportedExtension(String),
    /// An exclude pattern matched (or no include pattern did).
    PatternExcluded(String),
    /// A condition marker in the content intersects the exclusion
    /// vocabulary.
    ConditionExcluded(String),
    /// Content classified as binary; carries the classifier's detail.
    Binary(String),
    /// File exceeds the size limit for text conversion.
    Oversize(u64),
    /// The TOC plan does not mention this file.
    NotInPlan,
    /// The batch was cancelled before this task started.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnsupportedExtension(ext) => {
                write!(f, "unsupported extension '.{ext}'")
            }
            SkipReason::PatternExcluded(pattern) => {
                write!(f, "pattern exclusion ('{pattern}')")
            }
            SkipReason::ConditionExcluded(condition) => {
                write!(f, "condition exclusion ('{condition}')")
            }
            SkipReason::Binary(detail) => write!(f, "binary content: {detail}"),
            SkipReason::Oversize(bytes) => {
                write!(f, "binary: file size {bytes} bytes exceeds the 5 MB text limit")
            }
            SkipReason::NotInPlan => f.write_str("not in plan"),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Terminal status of one conversion task.
///
/// A task transitions exactly once from pending to one of these; tasks are
/// never retried automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskStatus {
    Succeeded {
        /// Assets copied for this document (resolved image references).
        assets: Vec<PathBuf>,
        /// Quality report attached by the external scorer, if any.
        quality: Option<QualityReport>,
    },
    Skipped(SkipReason),
    Failed(TaskError),
}

impl TaskStatus {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, TaskStatus::Succeeded { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TaskStatus::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }
}

/// Per-file outcome record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute input path.
    pub input: PathBuf,
    /// Planned output path; `None` when planning skipped the file before
    /// an output path existed (e.g. absent from the TOC plan).
    pub output: Option<PathBuf>,
    pub status: TaskStatus,
}

/// An entry in the batch error list, with position context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// 1-based task index within the batch.
    pub index: usize,
    pub total: usize,
    pub file: PathBuf,
    pub detail: String,
}

/// An entry in the batch skip list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipEntry {
    pub file: PathBuf,
    pub reason: String,
}

/// Ordered mapping from original relative input paths to renamed relative
/// output paths.
///
/// Populated only when heading-derived renaming changes a filename; the
/// cross-reference rewriter consumes it after the executor phase. Insertion
/// order is preserved so earlier (lexically first) entries win ties during
/// basename resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilenameMapping {
    entries: Vec<(String, String)>,
}

impl FilenameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `original -> renamed`. Both are relative paths with forward
    /// slashes. A duplicate original is ignored (first entry wins).
    pub fn insert(&mut self, original: impl Into<String>, renamed: impl Into<String>) {
        let original = original.into();
        if self.get(&original).is_none() {
            self.entries.push((original, renamed.into()));
        }
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == original)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregate quality summary over converter-attached quality reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySummary {
    /// Mean score over all scored files.
    pub mean_score: f32,
    /// Total issue count over all scored files.
    pub total_issues: usize,
    /// Files scoring below [`QUALITY_THRESHOLD`].
    pub below_threshold: Vec<PathBuf>,
}

/// The final result of a batch run.
///
/// Invariant once the run finishes:
/// `total_files == converted + skipped + errors.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub total_files: usize,
    pub converted: usize,
    pub skipped: usize,
    pub errors: Vec<ErrorEntry>,
    pub skipped_list: Vec<SkipEntry>,
    pub per_file: Vec<FileRecord>,
    /// Present (possibly empty) only when heading renaming was active.
    pub filename_mapping: Option<FilenameMapping>,
    /// Present only when at least one result carried a quality report.
    pub quality: Option<QualitySummary>,
}

impl BatchResult {
    /// Assemble a result from per-file records.
    ///
    /// Counts, the error list, and the skip list are all derived from the
    /// records so they cannot drift apart.
    pub fn from_records(
        records: Vec<FileRecord>,
        filename_mapping: Option<FilenameMapping>,
    ) -> Self {
        let total_files = records.len();
        let converted = records.iter().filter(|r| r.status.is_succeeded()).count();
        let skipped = records.iter().filter(|r| r.status.is_skipped()).count();

        let errors = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match &r.status {
                TaskStatus::Failed(e) => Some(ErrorEntry {
                    index: i + 1,
                    total: total_files,
                    file: r.input.clone(),
                    detail: e.to_string(),
                }),
                _ => None,
            })
            .collect();

        let skipped_list = records
            .iter()
            .filter_map(|r| match &r.status {
                TaskStatus::Skipped(reason) => Some(SkipEntry {
                    file: r.input.clone(),
                    reason: reason.to_string(),
                }),
                _ => None,
            })
            .collect();

        let quality = summarise_quality(&records);

        BatchResult {
            total_files,
            converted,
            skipped,
            errors,
            skipped_list,
            per_file: records,
            filename_mapping,
            quality,
        }
    }
}

/// Compute the quality summary, or `None` when nothing was scored.
fn summarise_quality(records: &[FileRecord]) -> Option<QualitySummary> {
    let scored: Vec<(&FileRecord, &QualityReport)> = records
        .iter()
        .filter_map(|r| match &r.status {
            TaskStatus::Succeeded {
                quality: Some(q), ..
            } => Some((r, q)),
            _ => None,
        })
        .collect();

    if scored.is_empty() {
        return None;
    }

    let mean_score = scored.iter().map(|(_, q)| q.score).sum::<f32>() / scored.len() as f32;
    let total_issues = scored.iter().map(|(_, q)| q.issues.len()).sum();
    let below_threshold = scored
        .iter()
        .filter(|(_, q)| q.score < QUALITY_THRESHOLD)
        .map(|(r, _)| r.input.clone())
        .collect();

    Some(QualitySummary {
        mean_score,
        total_issues,
        below_threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn succeeded(input: &str, score: Option<f32>) -> FileRecord {
        FileRecord {
            input: PathBuf::from(input),
            output: Some(PathBuf::from(format!("{input}.out"))),
            status: TaskStatus::Succeeded {
                assets: Vec::new(),
                quality: score.map(|s| QualityReport {
                    score: s,
                    issues: vec!["issue".into()],
                }),
            },
        }
    }

    #[test]
    fn counts_partition_records() {
        let records = vec![
            succeeded("a.htm", None),
            FileRecord {
                input: PathBuf::from("b.htm"),
                output: None,
                status: TaskStatus::Skipped(SkipReason::NotInPlan),
            },
            FileRecord {
                input: PathBuf::from("c.htm"),
                output: Some(PathBuf::from("c.adoc")),
                status: TaskStatus::Failed(TaskError::ConverterFailed {
                    path: PathBuf::from("c.htm"),
                    detail: "boom".into(),
                }),
            },
        ];

        let result = BatchResult::from_records(records, None);
        assert_eq!(result.total_files, 3);
        assert_eq!(result.converted, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.total_files,
            result.converted + result.skipped + result.errors.len()
        );
        assert_eq!(result.errors[0].index, 3);
        assert_eq!(result.errors[0].total, 3);
        assert_eq!(result.skipped_list[0].reason, "not in plan");
    }

    #[test]
    fn quality_summary_aggregates_and_flags_low_scores() {
        let records = vec![
            succeeded("good.htm", Some(90.0)),
            succeeded("bad.htm", Some(50.0)),
            succeeded("unscored.htm", None),
        ];

        let result = BatchResult::from_records(records, None);
        let quality = result.quality.expect("two files were scored");
        assert!((quality.mean_score - 70.0).abs() < f32::EPSILON);
        assert_eq!(quality.total_issues, 2);
        assert_eq!(quality.below_threshold, vec![PathBuf::from("bad.htm")]);
    }

    #[test]
    fn quality_summary_absent_when_nothing_scored() {
        let result = BatchResult::from_records(vec![succeeded("a.htm", None)], None);
        assert!(result.quality.is_none());
    }

    #[test]
    fn filename_mapping_preserves_insertion_order_and_first_wins() {
        let mut mapping = FilenameMapping::new();
        mapping.insert("a/one.htm", "a/first.adoc");
        mapping.insert("b/two.htm", "b/second.adoc");
        mapping.insert("a/one.htm", "a/overwritten.adoc");

        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("a/one.htm"), Some("a/first.adoc"));
        let keys: Vec<&str> = mapping.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a/one.htm", "b/two.htm"]);
    }

    #[test]
    fn oversize_skip_reason_mentions_size() {
        let reason = SkipReason::Oversize(6_291_456);
        assert!(reason.to_string().contains("6291456"));
    }

    #[test]
    fn batch_result_round_trips_through_json() {
        let mut mapping = FilenameMapping::new();
        mapping.insert("a/one.htm", "a/first.adoc");
        let result = BatchResult::from_records(
            vec![succeeded("a.htm", Some(80.0))],
            Some(mapping),
        );

        let json = serde_json::to_string(&result).unwrap();
        let back: BatchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_files, 1);
        assert_eq!(back.converted, 1);
        assert_eq!(
            back.filename_mapping.unwrap().get("a/one.htm"),
            Some("a/first.adoc")
        );
    }
}
