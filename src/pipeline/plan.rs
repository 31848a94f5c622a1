//! Output path planning: decide where each candidate's converted output
//! lands.
//!
//! Two strategies, selected by the presence of a TOC plan:
//!
//! * **Mirror** — the output tree mirrors the input tree:
//!   `output_root / relative_input_dir / stem.{format extension}`.
//! * **Plan** — the output path comes from an externally computed
//!   file→path mapping; files absent from the plan are skipped with
//!   reason "not in plan".
//!
//! Both strategies then apply the optional heading-rename step: the
//! document's first level-1 heading (or its title as a fallback) is
//! slugified and substituted for the filename, keeping the directory the
//! strategy chose. Every rename is recorded in the
//! [`FilenameMapping`](crate::output::FilenameMapping) so the
//! cross-reference rewriter can repair links afterwards.

use crate::config::BatchConfig;
use crate::output::{CandidateFile, FilenameMapping, SkipReason};
use crate::pipeline::filter;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Longest slug the heading-rename step will produce.
const MAX_SLUG_LEN: usize = 100;

/// An externally supplied table-of-contents plan: where each source file
/// belongs in the output hierarchy, independent of the source filesystem
/// layout.
#[derive(Debug, Clone, Default)]
pub struct TocPlan {
    /// Relative input path (forward slashes) → relative output path.
    /// The planner enforces the target format's extension on the value.
    pub file_mapping: HashMap<String, PathBuf>,
    /// Output directories to pre-create, in plan order.
    pub folder_structure: Vec<TocFolder>,
}

/// One folder in the plan's output hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocFolder {
    /// Path relative to the output root.
    pub path: PathBuf,
}

/// A candidate with its planned output path, or the reason it will be
/// skipped instead.
#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub candidate: CandidateFile,
    /// Input path relative to the input root, forward slashes.
    pub relative_input: String,
    /// Absolute output path; `None` when `skip` is set.
    pub output: Option<PathBuf>,
    /// Pre-marked skip from filtering or plan lookup. The executor records
    /// it without touching the file.
    pub skip: Option<SkipReason>,
}

/// Plan outputs for all candidates and collect the filename mapping
/// produced by heading renames.
///
/// Reads document content only when `rename_from_headings` is active; a
/// read failure falls back to the strategy's default filename.
pub async fn plan_outputs(
    candidates: Vec<CandidateFile>,
    input_root: &Path,
    output_root: &Path,
    config: &BatchConfig,
) -> (Vec<PlannedTask>, FilenameMapping) {
    let mut tasks = Vec::with_capacity(candidates.len());
    let mut mapping = FilenameMapping::new();

    for candidate in candidates {
        let relative_input = relative_forward_slash(&candidate.path, input_root);
        let name = candidate
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(reason) = filter::file_skip_reason(&name, &candidate.extension, config) {
            tasks.push(PlannedTask {
                candidate,
                relative_input,
                output: None,
                skip: Some(reason),
            });
            continue;
        }

        // Strategy: directory + default filename for the output.
        let default_rel = match &config.toc_plan {
            Some(plan) => match plan.file_mapping.get(&relative_input) {
                Some(planned) => {
                    let mut rel = planned.clone();
                    rel.set_extension(config.format.extension());
                    rel
                }
                None => {
                    tasks.push(PlannedTask {
                        candidate,
                        relative_input,
                        output: None,
                        skip: Some(SkipReason::NotInPlan),
                    });
                    continue;
                }
            },
            None => {
                let rel = Path::new(&relative_input);
                let stem = rel
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "untitled".to_string());
                let file = format!("{stem}.{}", config.format.extension());
                if config.preserve_structure {
                    rel.parent()
                        .map(|p| p.join(&file))
                        .unwrap_or_else(|| PathBuf::from(&file))
                } else {
                    PathBuf::from(&file)
                }
            }
        };

        // Optional heading-derived rename, preserving the directory the
        // strategy chose.
        let final_rel = if config.rename_from_headings {
            match heading_filename(&candidate.path, config.format.extension()).await {
                Some(renamed) => default_rel
                    .parent()
                    .map(|p| p.join(&renamed))
                    .unwrap_or_else(|| PathBuf::from(&renamed)),
                None => default_rel.clone(),
            }
        } else {
            default_rel.clone()
        };

        if final_rel != default_rel {
            let new_rel = forward_slash(&final_rel);
            debug!("renaming {relative_input} -> {new_rel}");
            mapping.insert(relative_input.clone(), new_rel);
        }

        tasks.push(PlannedTask {
            candidate,
            relative_input,
            output: Some(output_root.join(&final_rel)),
            skip: None,
        });
    }

    (tasks, mapping)
}

/// Derive a slugified filename from the document's first heading.
/// `None` keeps the strategy's default.
async fn heading_filename(path: &Path, extension: &str) -> Option<String> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => {
            debug!("heading read failed for {}: {e}", path.display());
            return None;
        }
    };
    let heading = extract_heading(&content)?;
    let slug = slugify(&heading);
    if slug.is_empty() {
        return None;
    }
    Some(format!("{slug}.{extension}"))
}

static RE_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap());
static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Extract the first level-1 heading's text, falling back to the document
/// title. Inner markup is stripped; whitespace is collapsed.
pub fn extract_heading(content: &str) -> Option<String> {
    let raw = RE_H1
        .captures(content)
        .or_else(|| RE_TITLE.captures(content))
        .map(|c| c[1].to_string())?;
    let text = RE_TAG.replace_all(&raw, "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Slugify heading text into a filename stem.
///
/// Lowercase; characters outside `[a-z0-9\s_-]` are stripped; runs of
/// whitespace, underscores, and hyphens collapse to a single hyphen;
/// leading/trailing hyphens are trimmed; length is capped at
/// [`MAX_SLUG_LEN`].
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || matches!(c, '-' | '_'))
        .collect();

    let mut slug = String::with_capacity(kept.len());
    let mut pending_hyphen = false;
    for c in kept.chars() {
        if c.is_whitespace() || c == '_' || c == '-' {
            pending_hyphen = !slug.is_empty();
        } else {
            if pending_hyphen {
                slug.push('-');
                pending_hyphen = false;
            }
            slug.push(c);
        }
    }

    slug.truncate(MAX_SLUG_LEN);
    slug.trim_matches('-').to_string()
}

/// Path relative to `root` with forward slashes; falls back to the full
/// path when `path` is not under `root`.
pub fn relative_forward_slash(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    forward_slash(rel)
}

/// Render a path with forward slashes regardless of platform.
pub fn forward_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
