//! Cross-reference repair: update links and image embeds in converted
//! output after heading-derived renaming changed filenames.
//!
//! Runs once per batch, only when the filename mapping is non-empty. For
//! every produced output file the format's reference constructs are
//! scanned; each reference splits into `(path, optional #anchor)` and runs
//! through a four-step resolution chain, first match wins:
//!
//! 1. exact match against a mapping key;
//! 2. match ignoring the file extension;
//! 3. match by basename (exact, then extension-insensitive);
//! 4. fuzzy match by normalized similarity, accepted at ≥ 0.5.
//!
//! A matched reference is rewritten as the relative path from the
//! referencing file's directory to the mapped target; same directory
//! collapses to the bare filename; the anchor is re-appended. References
//! that never resolve are left byte-for-byte unchanged, which together
//! with step 3 makes the whole pass idempotent: an already-correct
//! reference resolves to itself.
//!
//! Per-file failures are logged and leave that file untouched; the pass
//! continues with the next file.

use crate::config::TargetFormat;
use crate::output::FilenameMapping;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Minimum similarity score for a fuzzy match.
const FUZZY_THRESHOLD: f64 = 0.5;

// ── Reference syntax per format ──────────────────────────────────────────

static RE_ADOC_XREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(xref:|link:)([^\[\s\]]+)(\[)").unwrap());
static RE_ADOC_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(image::?)([^\[\s\]]+)(\[)").unwrap());
static RE_MD_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(!?\[[^\]]*\]\()([^)\s]+)(\))").unwrap());
static RE_HTML_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"((?:href|src)\s*=\s*")([^"]+)(")"#).unwrap());

/// Rewrite references in every output file under `output_root`.
///
/// Returns the number of files whose content changed.
pub async fn rewrite_references(
    output_root: &Path,
    format: TargetFormat,
    mapping: &FilenameMapping,
) -> usize {
    if mapping.is_empty() || format == TargetFormat::PlainText {
        return 0;
    }

    let extension = format.extension();
    let mut changed = 0usize;

    let files: Vec<_> = WalkDir::new(output_root)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|x| x.to_string_lossy().eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    for file in files {
        let rel_dir = file
            .parent()
            .and_then(|p| p.strip_prefix(output_root).ok())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        let content = match tokio::fs::read_to_string(&file).await {
            Ok(c) => c,
            Err(e) => {
                warn!("rewrite: cannot read {}: {e}", file.display());
                continue;
            }
        };

        let rewritten = rewrite_content(&content, &rel_dir, format, mapping);
        if rewritten != content {
            if let Err(e) = tokio::fs::write(&file, rewritten).await {
                warn!("rewrite: cannot write {}: {e}", file.display());
                continue;
            }
            debug!("rewrote references in {}", file.display());
            changed += 1;
        }
    }

    info!("reference rewrite updated {changed} files");
    changed
}

/// Rewrite one file's content. `file_rel_dir` is the file's directory
/// relative to the output root, forward slashes, empty for the root.
pub fn rewrite_content(
    content: &str,
    file_rel_dir: &str,
    format: TargetFormat,
    mapping: &FilenameMapping,
) -> String {
    let rewrite = |caps: &Captures| -> String {
        let prefix = &caps[1];
        let target = &caps[2];
        let suffix = &caps[3];
        match rewrite_target(target, file_rel_dir, mapping) {
            Some(new_target) => format!("{prefix}{new_target}{suffix}"),
            None => caps[0].to_string(),
        }
    };

    match format {
        TargetFormat::PlainText => content.to_string(),
        TargetFormat::Asciidoc => {
            let pass = RE_ADOC_XREF.replace_all(content, rewrite);
            RE_ADOC_IMAGE.replace_all(&pass, rewrite).into_owned()
        }
        TargetFormat::Markdown | TargetFormat::WritersideMarkdown => {
            RE_MD_REF.replace_all(content, rewrite).into_owned()
        }
        TargetFormat::Zendesk => RE_HTML_REF.replace_all(content, rewrite).into_owned(),
    }
}

/// Resolve one reference target and compute its rewritten form.
/// `None` leaves the reference unchanged.
fn rewrite_target(target: &str, file_rel_dir: &str, mapping: &FilenameMapping) -> Option<String> {
    if is_external(target) {
        return None;
    }

    let (path, anchor) = match target.split_once('#') {
        Some((p, a)) => (p, Some(a)),
        None => (target, None),
    };
    if path.is_empty() {
        return None;
    }

    let normalized = normalize(path);
    let mapped = resolve(&normalized, mapping)?;
    let mut new_ref = relative_reference(file_rel_dir, mapped);
    if let Some(anchor) = anchor {
        new_ref.push('#');
        new_ref.push_str(anchor);
    }
    Some(new_ref)
}

fn is_external(target: &str) -> bool {
    target.starts_with('#')
        || target.contains("://")
        || target.starts_with("mailto:")
        || target.starts_with("data:")
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches("./")
        .to_string()
}

fn strip_extension(path: &str) -> &str {
    match path.rfind('.') {
        Some(dot) if !path[dot + 1..].contains('/') => &path[..dot],
        _ => path,
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// The four-step resolution chain. Returns the mapped output-relative
/// path of the renamed target.
fn resolve<'m>(path: &str, mapping: &'m FilenameMapping) -> Option<&'m str> {
    // 1. exact
    if let Some(v) = mapping.get(path) {
        return Some(v);
    }

    // 2. ignoring extension
    let path_noext = strip_extension(path);
    if let Some((_, v)) = mapping
        .iter()
        .find(|(k, _)| strip_extension(k) == path_noext)
    {
        return Some(v);
    }

    // 3. basename, exact then extension-insensitive
    let name = basename(path);
    if let Some((_, v)) = mapping.iter().find(|(k, _)| basename(k) == name) {
        return Some(v);
    }
    let stem = strip_extension(name);
    if let Some((_, v)) = mapping
        .iter()
        .find(|(k, _)| strip_extension(basename(k)) == stem)
    {
        return Some(v);
    }
    // An already-rewritten reference points at a mapping *value*; match
    // value stems too so a second pass resolves to the same target.
    if let Some((_, v)) = mapping
        .iter()
        .find(|(_, v)| strip_extension(basename(v)) == stem)
    {
        return Some(v);
    }

    // 4. fuzzy
    let (best, score) = mapping
        .iter()
        .map(|(k, v)| (v, similarity(path, k)))
        .max_by(|(_, a), (_, b)| a.total_cmp(b))?;
    (score >= FUZZY_THRESHOLD).then_some(best)
}

/// Relative reference from `from_dir` (output-relative directory of the
/// referencing file) to `to_path` (output-relative target path). Collapses
/// to the bare filename when both resolve to the same directory.
fn relative_reference(from_dir: &str, to_path: &str) -> String {
    let to_dir = match to_path.rfind('/') {
        Some(i) => &to_path[..i],
        None => "",
    };
    if from_dir == to_dir {
        return basename(to_path).to_string();
    }

    let from_parts: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to_parts: Vec<&str> = to_path.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<Cow<'_, str>> = Vec::new();
    for _ in common..from_parts.len() {
        parts.push(Cow::Borrowed(".."));
    }
    for part in &to_parts[common..] {
        parts.push(Cow::Borrowed(part));
    }
    parts.join("/")
}

// ── Similarity ───────────────────────────────────────────────────────────

/// Normalized similarity between two reference paths.
///
/// Exact match after normalization scores 1.0; substring containment
/// scores 0.8; otherwise `(max_len - levenshtein) / max_len`. Symmetric in
/// its arguments.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase().replace('\\', "/");
    let b = b.to_lowercase().replace('\\', "/");

    if a == b {
        return 1.0;
    }
    if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
        return 0.8;
    }

    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(&a, &b);
    (max_len - distance) as f64 / max_len as f64
}

/// Classic two-row Levenshtein distance over characters.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
