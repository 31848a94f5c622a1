//! Path/pattern filtering: decides whether a filesystem entry is eligible
//! for conversion.
//!
//! Rules run in a fixed order; the first rule that rejects wins. Directory
//! decisions are made before descent so irrelevant subtrees (dependency
//! caches, build output) are pruned, not merely excluded from results.
//!
//! Two tiers of file rejection:
//!
//! * **Junk** ([`is_junk_file`]) — OS metadata, backup/temp files, log and
//!   webhelp artifacts. Dropped silently at discovery; these never become
//!   tasks and do not appear in the result's skip list.
//! * **Skip** ([`file_skip_reason`]) — unsupported extension or pattern
//!   exclusion. These become tasks with a recorded
//!   [`SkipReason`](crate::output::SkipReason) so callers can see exactly
//!   what was passed over and why.
//!
//! Condition-marker exclusion is the one rule that needs file *content*,
//! so [`content_excluded`] is applied at task execution time rather than
//! at discovery.

use crate::config::BatchConfig;
use crate::output::SkipReason;
use once_cell::sync::Lazy;
use regex::Regex;

/// Input extensions the converter collaborators accept.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["htm", "html", "xhtml"];

/// Directory names that never contain convertible content
/// (case-insensitive).
const REJECTED_DIR_NAMES: &[&str] = &[
    "build",
    "dist",
    "out",
    "output",
    "target",
    "node_modules",
    "bin",
    "obj",
    "cache",
    "__pycache__",
];

/// Dot-directories that are still worth descending into. Everything else
/// starting with `.` is pruned.
const DOT_DIR_ALLOWLIST: &[&str] = &[".images", ".snippets"];

/// OS metadata files that are never content.
const OS_METADATA_FILES: &[&str] = &["thumbs.db", "ehthumbs.db", "desktop.ini", ".ds_store"];

/// Backup/temp filename suffixes.
const BACKUP_SUFFIXES: &[&str] = &["~", ".bak", ".tmp", ".swp", ".orig", ".old"];

/// Authoring-tool log extensions.
const LOG_SUFFIXES: &[&str] = &[".log", ".mclog"];

/// Generated webhelp data files (search index shards, navigation data).
const WEBHELP_PREFIXES: &[&str] = &["whxdata", "whgdata", "whproj", "whstart"];

/// The outcome of a directory filter check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(String),
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

/// Decide whether to descend into a directory.
pub fn accept_dir(name: &str) -> FilterDecision {
    let lower = name.to_lowercase();

    if REJECTED_DIR_NAMES.contains(&lower.as_str()) {
        return FilterDecision::Reject(format!("non-content directory '{name}'"));
    }
    if lower.contains("temp") || lower.contains("tmp") {
        return FilterDecision::Reject(format!("temporary directory '{name}'"));
    }
    if lower.starts_with('.') && !DOT_DIR_ALLOWLIST.contains(&lower.as_str()) {
        return FilterDecision::Reject(format!("hidden directory '{name}'"));
    }

    FilterDecision::Accept
}

/// Classify a file as discovery-time junk. Returns the reason for debug
/// logging; junk files never become candidates.
pub fn is_junk_file(name: &str) -> Option<String> {
    let lower = name.to_lowercase();

    if OS_METADATA_FILES.contains(&lower.as_str()) {
        return Some(format!("OS metadata file '{name}'"));
    }
    if BACKUP_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return Some(format!("backup/temp file '{name}'"));
    }
    if LOG_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return Some(format!("log file '{name}'"));
    }
    if WEBHELP_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return Some(format!("webhelp artifact '{name}'"));
    }
    None
}

/// Why a candidate is skipped rather than converted, or `None` to accept.
///
/// `extension` is the lowercased extension without the dot. Rules in
/// order: unsupported extension, exclude patterns, include patterns.
pub fn file_skip_reason(
    name: &str,
    extension: &str,
    config: &BatchConfig,
) -> Option<SkipReason> {
    let lower = name.to_lowercase();

    if !SUPPORTED_EXTENSIONS.contains(&extension) {
        return Some(SkipReason::UnsupportedExtension(extension.to_string()));
    }
    if let Some(pattern) = matching_pattern(&lower, &config.exclude_patterns) {
        return Some(SkipReason::PatternExcluded(pattern.to_string()));
    }
    if !config.include_patterns.is_empty()
        && matching_pattern(&lower, &config.include_patterns).is_none()
    {
        return Some(SkipReason::PatternExcluded("no include pattern matched".into()));
    }

    None
}

/// Return the first pattern matching `basename`, if any.
///
/// A pattern starting with `*` is a suffix match on the remainder
/// (`*.htm` matches `intro.htm`); anything else is a substring match.
/// Matching is case-insensitive; `basename` must already be lowercased.
fn matching_pattern<'a>(basename: &str, patterns: &'a [String]) -> Option<&'a str> {
    patterns.iter().map(String::as_str).find(|pattern| {
        let p = pattern.to_lowercase();
        match p.strip_prefix('*') {
            Some(suffix) => basename.ends_with(suffix),
            None => basename.contains(&p),
        }
    })
}

static RE_CONDITIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)conditions\s*=\s*"([^"]*)""#).unwrap());

/// Check content for authoring-tool condition markers whose values
/// intersect the exclusion vocabulary. Returns the first excluded
/// condition value found.
pub fn content_excluded(content: &str, vocabulary: &[String]) -> Option<String> {
    if vocabulary.is_empty() {
        return None;
    }
    for caps in RE_CONDITIONS.captures_iter(content) {
        for value in caps[1].split([',', ';']) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if vocabulary.iter().any(|v| v.eq_ignore_ascii_case(value)) {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(include: &[&str], exclude: &[&str]) -> BatchConfig {
        BatchConfig {
            include_patterns: include.iter().map(|s| s.to_string()).collect(),
            exclude_patterns: exclude.iter().map(|s| s.to_string()).collect(),
            ..BatchConfig::default()
        }
    }

    #[test]
    fn rejects_non_content_directories() {
        assert!(!accept_dir("node_modules").is_accept());
        assert!(!accept_dir("Output").is_accept());
        assert!(!accept_dir("TempFiles").is_accept());
        assert!(!accept_dir("my-tmp-stuff").is_accept());
        assert!(!accept_dir(".git").is_accept());
        assert!(accept_dir("Content").is_accept());
        assert!(accept_dir(".images").is_accept());
    }

    #[test]
    fn junk_files_are_classified() {
        assert!(is_junk_file("Thumbs.db").is_some());
        assert!(is_junk_file(".DS_Store").is_some());
        assert!(is_junk_file("intro.htm.bak").is_some());
        assert!(is_junk_file("intro.htm~").is_some());
        assert!(is_junk_file("project.mclog").is_some());
        assert!(is_junk_file("whxdata12.js").is_some());
        assert!(is_junk_file("intro.htm").is_none());
    }

    #[test]
    fn unsupported_extension_is_a_skip() {
        let cfg = BatchConfig::default();
        assert!(matches!(
            file_skip_reason("notes.txt", "txt", &cfg),
            Some(SkipReason::UnsupportedExtension(ext)) if ext == "txt"
        ));
        assert!(file_skip_reason("intro.htm", "htm", &cfg).is_none());
        assert!(file_skip_reason("intro.xhtml", "xhtml", &cfg).is_none());
    }

    #[test]
    fn exclude_patterns_support_substring_and_star_suffix() {
        let cfg = config_with(&[], &["draft"]);
        assert!(file_skip_reason("draft-intro.htm", "htm", &cfg).is_some());
        assert!(file_skip_reason("intro.htm", "htm", &cfg).is_none());

        let cfg = config_with(&[], &["*-old.htm"]);
        assert!(file_skip_reason("intro-old.htm", "htm", &cfg).is_some());
        assert!(file_skip_reason("intro.htm", "htm", &cfg).is_none());
    }

    #[test]
    fn include_patterns_require_a_match() {
        let cfg = config_with(&["guide"], &[]);
        assert!(file_skip_reason("guide-setup.htm", "htm", &cfg).is_none());
        assert!(file_skip_reason("intro.htm", "htm", &cfg).is_some());
    }

    #[test]
    fn exclude_wins_over_include() {
        let cfg = config_with(&["guide"], &["guide-internal"]);
        assert!(matches!(
            file_skip_reason("guide-internal.htm", "htm", &cfg),
            Some(SkipReason::PatternExcluded(p)) if p == "guide-internal"
        ));
    }

    #[test]
    fn condition_exclusion_reads_marker_values() {
        let vocab = vec!["PrintOnly".to_string(), "Internal".to_string()];
        let content = r#"<p data-conditions="Online,printonly">hi</p>"#;
        assert_eq!(content_excluded(content, &vocab).as_deref(), Some("printonly"));

        let content = r#"<p conditions="Online">hi</p>"#;
        assert_eq!(content_excluded(content, &vocab), None);

        assert_eq!(content_excluded(content, &[]), None);
    }
}
