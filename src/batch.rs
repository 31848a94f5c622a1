//! Top-level batch entry points.
//!
//! [`run_batch`] is the primary API: discover candidates under the input
//! root, plan their output paths, execute conversion in chunks, repair
//! cross-references if renaming occurred, and aggregate everything into a
//! [`BatchResult`].
//!
//! The result always reflects partial success: per-file failures and
//! skips are recorded, never raised. The only fatal errors are an
//! unusable configuration and failure to create the output root.

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::output::BatchResult;
use crate::pipeline::execute::ExecuteContext;
use crate::pipeline::{discover, execute, plan, rewrite};
use crate::progress::{Phase, ProgressEvent, ProgressSender};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Run a batch conversion without progress reporting.
///
/// # Errors
/// Returns `Err(BatchError)` only for fatal conditions:
/// - no converter attached to the config
/// - the output root cannot be created
///
/// Everything else — converter failures, timeouts, unreadable files,
/// skipped inputs — lands inside the returned [`BatchResult`].
pub async fn run_batch(
    input_root: impl AsRef<Path>,
    output_root: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchResult, BatchError> {
    run_batch_with_progress(input_root, output_root, config, ProgressSender::disabled()).await
}

/// Run a batch conversion, emitting [`ProgressEvent`]s to `progress`.
///
/// Create the channel with [`crate::progress::progress_channel`] and
/// consume the receiver concurrently with this future:
///
/// ```rust,no_run
/// use doc2pub::{progress_channel, run_batch_with_progress, BatchConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BatchConfig::default();
/// let (tx, mut rx) = progress_channel();
/// let batch = tokio::spawn(async move {
///     run_batch_with_progress("input", "output", &config, tx).await
/// });
/// while let Some(event) = rx.recv().await {
///     eprintln!("[{}%] {}", event.percentage, event.message);
/// }
/// let result = batch.await??;
/// # Ok(())
/// # }
/// ```
pub async fn run_batch_with_progress(
    input_root: impl AsRef<Path>,
    output_root: impl AsRef<Path>,
    config: &BatchConfig,
    progress: ProgressSender,
) -> Result<BatchResult, BatchError> {
    let start = Instant::now();
    let input_root = input_root.as_ref();
    let output_root = output_root.as_ref();
    info!(
        "starting batch: {} -> {} ({})",
        input_root.display(),
        output_root.display(),
        config.format
    );

    let converter = config
        .converter
        .clone()
        .ok_or_else(|| BatchError::InvalidConfig("no converter attached".into()))?;

    // ── Step 1: Output root ──────────────────────────────────────────────
    // The one fatal I/O condition; an existing directory is fine.
    tokio::fs::create_dir_all(output_root)
        .await
        .map_err(|source| BatchError::OutputRootCreateFailed {
            path: output_root.to_path_buf(),
            source,
        })?;

    // ── Step 2: Discovery ────────────────────────────────────────────────
    let candidates = discover::discover(input_root, config);
    progress.emit(ProgressEvent {
        phase: Phase::Discovery,
        current_file: None,
        index: 0,
        total: candidates.len(),
        percentage: 0,
        message: format!("discovered {} candidate files", candidates.len()),
    });
    info!("discovered {} candidate files", candidates.len());

    // ── Step 3: Plan output paths ────────────────────────────────────────
    if let Some(toc_plan) = &config.toc_plan {
        for folder in &toc_plan.folder_structure {
            let dir = output_root.join(&folder.path);
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                warn!("cannot create planned folder {}: {e}", dir.display());
            }
        }
    }
    let (tasks, mapping) = plan::plan_outputs(candidates, input_root, output_root, config).await;

    // ── Step 4: Execute in chunks ────────────────────────────────────────
    let ctx = ExecuteContext {
        input_root,
        output_root,
        config,
        converter,
        progress: &progress,
    };
    let records = execute::process_tasks(&tasks, &ctx).await;

    // ── Step 5: Repair cross-references ──────────────────────────────────
    // Only needed when heading renaming actually changed a filename.
    if !mapping.is_empty() {
        let changed = rewrite::rewrite_references(output_root, config.format, &mapping).await;
        info!("cross-reference repair touched {changed} files");
    }

    // ── Step 6: Aggregate ────────────────────────────────────────────────
    let mapping = config.rename_from_headings.then_some(mapping);
    let result = BatchResult::from_records(records, mapping);

    progress.emit(ProgressEvent {
        phase: Phase::Completed,
        current_file: None,
        index: result.total_files,
        total: result.total_files,
        percentage: 100,
        message: format!(
            "{} converted, {} skipped, {} errors",
            result.converted,
            result.skipped,
            result.errors.len()
        ),
    });
    info!(
        "batch complete: {}/{} converted, {} skipped, {} errors in {}ms",
        result.converted,
        result.total_files,
        result.skipped,
        result.errors.len(),
        start.elapsed().as_millis()
    );

    Ok(result)
}
