//! File discovery: walk the input tree and produce an ordered candidate
//! list.
//!
//! The walk is depth-first with deterministic lexical ordering, implemented
//! on walkdir's iterative walker — bounded by an explicit work list, never
//! by language-level recursion, so pathological trees cannot blow the
//! stack. Directories the filter rejects are pruned *before descent*
//! (`filter_entry`), which bounds discovery cost on large irrelevant
//! subtrees such as dependency caches.
//!
//! An unreadable directory is a discovery error: it is logged, its subtree
//! is skipped, and the walk continues. Junk files (OS metadata, backups,
//! logs) are dropped here and never become candidates; files a later stage
//! may still skip (unsupported extension, pattern exclusion) are kept so
//! the skip is recorded in the batch result.

use crate::config::BatchConfig;
use crate::output::CandidateFile;
use crate::pipeline::filter;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Upper bound on walk depth, applied even for recursive runs. Deep enough
/// for any real documentation tree; a guard against cyclic or adversarial
/// layouts.
const MAX_DEPTH: usize = 64;

/// Discover candidate files under `root`.
///
/// Returns candidates in lexical depth-first order. The root itself is
/// never filtered — only entries below it.
pub fn discover(root: &Path, config: &BatchConfig) -> Vec<CandidateFile> {
    let max_depth = if config.recursive { MAX_DEPTH } else { 1 };

    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            // depth 0 is the root itself
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            match filter::accept_dir(&name) {
                filter::FilterDecision::Accept => true,
                filter::FilterDecision::Reject(reason) => {
                    debug!("pruning {}: {}", entry.path().display(), reason);
                    false
                }
            }
        });

    let mut candidates = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("discovery error, skipping subtree: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if let Some(reason) = filter::is_junk_file(&name) {
            debug!("dropping {}: {}", entry.path().display(), reason);
            continue;
        }

        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let extension = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        candidates.push(CandidateFile {
            path: entry.path().to_path_buf(),
            size_bytes,
            extension,
        });
    }

    debug!(
        "discovered {} candidate files under {}",
        candidates.len(),
        root.display()
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn discovers_in_lexical_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.htm", "b");
        write(dir.path(), "a.htm", "a");
        write(dir.path(), "sub/c.htm", "c");

        let found = discover(dir.path(), &BatchConfig::default());
        let names: Vec<String> = found
            .iter()
            .map(|c| {
                c.path
                    .strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.htm", "b.htm", "sub/c.htm"]);
    }

    #[test]
    fn prunes_rejected_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "keep.htm", "x");
        write(dir.path(), "node_modules/dep/index.htm", "x");
        write(dir.path(), "TempOutput/gen.htm", "x");
        write(dir.path(), ".git/objects/blob.htm", "x");

        let found = discover(dir.path(), &BatchConfig::default());
        assert_eq!(found.len(), 1);
        assert!(found[0].path.ends_with("keep.htm"));
    }

    #[test]
    fn drops_junk_files_silently() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "topic.htm", "x");
        write(dir.path(), "Thumbs.db", "x");
        write(dir.path(), "topic.htm.bak", "x");
        write(dir.path(), "build.mclog", "x");

        let found = discover(dir.path(), &BatchConfig::default());
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn keeps_unsupported_extensions_for_later_skip_recording() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "topic.htm", "x");
        write(dir.path(), "data.xml", "x");

        let found = discover(dir.path(), &BatchConfig::default());
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn non_recursive_stays_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "top.htm", "x");
        write(dir.path(), "sub/nested.htm", "x");

        let config = BatchConfig {
            recursive: false,
            ..BatchConfig::default()
        };
        let found = discover(dir.path(), &config);
        assert_eq!(found.len(), 1);
        assert!(found[0].path.ends_with("top.htm"));
    }

    #[test]
    fn records_size_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Topic.HTM", "hello");

        let found = discover(dir.path(), &BatchConfig::default());
        assert_eq!(found[0].size_bytes, 5);
        assert_eq!(found[0].extension, "htm");
    }
}
