//! Image asset resolution and copying.
//!
//! Two independent jobs:
//!
//! 1. **Directory-level copy** ([`copy_image_assets`]) — find the project's
//!    image directory and copy it wholesale into the output tree. Runs
//!    exactly once per batch (the executor guards it with the run-state
//!    flag) and is independent of which documents reference which images.
//!    Resolution is an ordered list of named strategies, first success
//!    wins; each strategy is independently testable.
//!
//! 2. **Per-document resolution** ([`resolve_document_images`]) — for each
//!    successfully converted document, resolve the image paths its
//!    conversion metadata declares against a ranked list of candidate
//!    roots, falling back to a filename-only search of the whole input
//!    tree. Unresolved images are logged, never fatal.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::pipeline::filter;

/// Name of the asset directory created under the output root.
pub const ASSET_DIR_NAME: &str = "images";

/// Ranked conventional asset-directory locations relative to the input
/// root. Most specific first.
const CONVENTIONAL_ASSET_DIRS: &[&str] = &[
    "Content/Resources/Images",
    "Content/Images",
    "Resources/Images",
    "Images",
    "images",
    "assets/images",
    "img",
    "media",
];

/// Directories that hold project machinery, not shippable assets
/// (case-insensitive).
const NON_ASSET_DIRS: &[&str] = &[
    "snippets",
    "pagelayouts",
    "templatepages",
    "variables",
    "tocs",
    "stylesheets",
];

/// Recognised image file extensions (lowercase).
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "bmp", "webp", "ico"];

/// Depth bound for the asset-directory search strategy.
const SEARCH_MAX_DEPTH: usize = 8;

/// Named resolution strategies for the project image directory, tried in
/// order until one yields a path.
const DIRECTORY_STRATEGIES: &[(&str, fn(&Path) -> Option<PathBuf>)] = &[
    ("conventional-location", try_conventional_location),
    ("tree-search", try_tree_search),
];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_non_asset_dir(name: &str) -> bool {
    NON_ASSET_DIRS.contains(&name.to_lowercase().as_str())
}

/// Strategy (a): the first conventional location that exists and is a
/// directory.
fn try_conventional_location(input_root: &Path) -> Option<PathBuf> {
    CONVENTIONAL_ASSET_DIRS
        .iter()
        .map(|rel| input_root.join(rel))
        .find(|p| p.is_dir())
}

/// Strategy (b): bounded search for any directory that directly contains
/// image files, excluding project-machinery directories.
fn try_tree_search(input_root: &Path) -> Option<PathBuf> {
    let walker = WalkDir::new(input_root)
        .max_depth(SEARCH_MAX_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            filter::accept_dir(&name).is_accept() && !is_non_asset_dir(&name)
        });

    for entry in walker.flatten() {
        if entry.file_type().is_file() && is_image_file(entry.path()) {
            return entry.path().parent().map(Path::to_path_buf);
        }
    }
    None
}

/// Directory-level image copy into `output_root/images`.
///
/// Tries the named directory strategies in order; when none yields a
/// directory, falls back to collecting individual image files from
/// anywhere in the tree into a flat asset directory. Returns the number
/// of files copied. Copy errors are logged per file and do not abort.
pub async fn copy_image_assets(input_root: &Path, output_root: &Path) -> usize {
    let target = output_root.join(ASSET_DIR_NAME);

    for (name, strategy) in DIRECTORY_STRATEGIES {
        if let Some(source) = strategy(input_root) {
            debug!("asset strategy '{name}' resolved {}", source.display());
            let copied = copy_dir_recursive(&source, &target).await;
            info!(
                "copied {copied} asset files from {} via '{name}'",
                source.display()
            );
            return copied;
        }
    }

    // Last resort: collect loose images flat into the asset directory.
    let copied = collect_loose_images(input_root, &target).await;
    if copied > 0 {
        info!("collected {copied} loose image files into {}", target.display());
    }
    copied
}

/// Copy a directory tree. Existing files are overwritten; per-file errors
/// are logged and skipped.
async fn copy_dir_recursive(source: &Path, target: &Path) -> usize {
    let mut copied = 0usize;
    for entry in WalkDir::new(source).sort_by_file_name().into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match entry.path().strip_prefix(source) {
            Ok(r) => r,
            Err(_) => continue,
        };
        let dest = target.join(rel);
        if let Some(parent) = dest.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("asset copy: cannot create {}: {e}", parent.display());
                continue;
            }
        }
        match tokio::fs::copy(entry.path(), &dest).await {
            Ok(_) => copied += 1,
            Err(e) => warn!("asset copy failed for {}: {e}", entry.path().display()),
        }
    }
    copied
}

/// Flat-collect every image file in the tree into `target`, skipping any
/// filename that already exists there.
async fn collect_loose_images(input_root: &Path, target: &Path) -> usize {
    let mut copied = 0usize;
    for entry in WalkDir::new(input_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || filter::accept_dir(&e.file_name().to_string_lossy()).is_accept()
        })
        .flatten()
    {
        if !entry.file_type().is_file() || !is_image_file(entry.path()) {
            continue;
        }
        let Some(name) = entry.path().file_name() else {
            continue;
        };
        let dest = target.join(name);
        if dest.exists() {
            continue;
        }
        if let Err(e) = tokio::fs::create_dir_all(target).await {
            warn!("asset collect: cannot create {}: {e}", target.display());
            return copied;
        }
        match tokio::fs::copy(entry.path(), &dest).await {
            Ok(_) => copied += 1,
            Err(e) => warn!("asset collect failed for {}: {e}", entry.path().display()),
        }
    }
    copied
}

/// Resolve the image paths a converted document declares and copy them
/// into the output asset directory.
///
/// Each declared path is tried relative to a ranked list of candidate
/// roots (the document's own directory first, then the project root and
/// its conventional content roots); when none exists, the whole tree is
/// searched for the bare filename. Returns the output paths of the copied
/// assets; unresolved declarations are logged and dropped.
pub async fn resolve_document_images(
    declared: &[String],
    doc_input: &Path,
    input_root: &Path,
    output_root: &Path,
) -> Vec<PathBuf> {
    if declared.is_empty() {
        return Vec::new();
    }

    let target = output_root.join(ASSET_DIR_NAME);
    let mut resolved = Vec::new();

    for decl in declared {
        let decl_path = Path::new(decl.trim_start_matches("./"));
        let candidate_roots = [
            doc_input.parent().map(Path::to_path_buf),
            Some(input_root.to_path_buf()),
            Some(input_root.join("Content")),
            Some(input_root.join("Content/Resources")),
        ];

        let found = candidate_roots
            .iter()
            .flatten()
            .map(|root| root.join(decl_path))
            .find(|p| p.is_file())
            .or_else(|| {
                decl_path
                    .file_name()
                    .and_then(|name| find_by_filename(input_root, name))
            });

        let Some(source) = found else {
            warn!("unresolved image reference '{decl}' in {}", doc_input.display());
            continue;
        };

        let Some(name) = source.file_name() else {
            continue;
        };
        let dest = target.join(name);
        if !dest.exists() {
            if let Err(e) = tokio::fs::create_dir_all(&target).await {
                warn!("cannot create asset dir {}: {e}", target.display());
                continue;
            }
            if let Err(e) = tokio::fs::copy(&source, &dest).await {
                warn!("image copy failed for {}: {e}", source.display());
                continue;
            }
        }
        resolved.push(dest);
    }

    resolved
}

/// Filename-only search across the input tree, lexical order.
fn find_by_filename(input_root: &Path, name: &std::ffi::OsStr) -> Option<PathBuf> {
    WalkDir::new(input_root)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .find(|e| e.file_type().is_file() && e.file_name() == name)
        .map(|e| e.path().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn conventional_location_prefers_most_specific() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Images/logo.png", b"x");
        write(dir.path(), "Content/Resources/Images/logo.png", b"x");

        let found = try_conventional_location(dir.path()).unwrap();
        assert!(found.ends_with("Content/Resources/Images"));
    }

    #[test]
    fn tree_search_skips_machinery_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Stylesheets/bg.png", b"x");
        write(dir.path(), "topics/shared/diagram.png", b"x");

        let found = try_tree_search(dir.path()).unwrap();
        assert!(found.ends_with("topics/shared"), "got {}", found.display());
    }

    #[tokio::test]
    async fn directory_copy_lands_under_output_images() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "Images/a.png", b"a");
        write(input.path(), "Images/sub/b.png", b"b");

        let copied = copy_image_assets(input.path(), output.path()).await;
        assert_eq!(copied, 2);
        assert!(output.path().join("images/a.png").is_file());
        assert!(output.path().join("images/sub/b.png").is_file());
    }

    #[tokio::test]
    async fn loose_collection_skips_existing_names() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        // No conventional or searchable dir: images sit next to topics in
        // the root, which tree-search will find... so place them in dirs
        // tree-search excludes to force the loose-collection fallback.
        write(input.path(), "Stylesheets/logo.png", b"first");
        write(input.path(), "Variables/logo.png", b"second");

        let copied = copy_image_assets(input.path(), output.path()).await;
        // Same basename twice: the second is skipped.
        assert_eq!(copied, 1);
        assert!(output.path().join("images/logo.png").is_file());
    }

    #[tokio::test]
    async fn document_images_resolve_relative_to_document() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "guide/shot.png", b"img");
        write(input.path(), "guide/page.htm", b"<html/>");

        let resolved = resolve_document_images(
            &["shot.png".to_string()],
            &input.path().join("guide/page.htm"),
            input.path(),
            output.path(),
        )
        .await;

        assert_eq!(resolved.len(), 1);
        assert!(output.path().join("images/shot.png").is_file());
    }

    #[tokio::test]
    async fn document_images_fall_back_to_filename_search() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "elsewhere/deep/shot.png", b"img");
        write(input.path(), "guide/page.htm", b"<html/>");

        let resolved = resolve_document_images(
            &["missing/dir/shot.png".to_string()],
            &input.path().join("guide/page.htm"),
            input.path(),
            output.path(),
        )
        .await;

        assert_eq!(resolved.len(), 1);
    }

    #[tokio::test]
    async fn unresolved_images_are_dropped_not_fatal() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(input.path(), "guide/page.htm", b"<html/>");

        let resolved = resolve_document_images(
            &["ghost.png".to_string()],
            &input.path().join("guide/page.htm"),
            input.path(),
            output.path(),
        )
        .await;

        assert!(resolved.is_empty());
    }
}
