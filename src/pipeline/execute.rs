//! Chunked batch execution: drive every planned task to a terminal status.
//!
//! Tasks are processed in **chunks** of `chunk_size`, strictly in order,
//! with a fixed delay separating chunk boundaries to bound peak resource
//! usage on very large batches. Within a chunk, tasks run concurrently in
//! sub-groups of [`SUBGROUP_SIZE`] — enough overlap to hide I/O latency
//! without unbounded concurrent file handles. Results are recorded in
//! discovery order regardless of completion order.
//!
//! Per task: a binary/oversize pre-check, the content condition re-check,
//! then the conversion call raced against the per-file timeout. While a
//! conversion is in flight, a heartbeat re-emits the task's progress event
//! so observers are not starved by slow files; the heartbeat never extends
//! the timeout. A failed task is recorded and the batch moves on — nothing
//! aborts the run. After every task, success or failure, the image asset
//! resolver runs for the batch (guarded by the run-state flag) so
//! directory-level copying completes even when conversions fail.
//!
//! Cancellation is checked between sub-groups and chunks; tasks not yet
//! started when the token fires are recorded as skipped.

use crate::config::BatchConfig;
use crate::converter::{ConvertOptions, ConvertedDocument, DocumentConverter};
use crate::error::TaskError;
use crate::output::{FileRecord, SkipReason, TaskStatus};
use crate::pipeline::plan::PlannedTask;
use crate::pipeline::{assets, detect, filter};
use crate::progress::ProgressSender;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, warn};

/// Concurrent tasks within a chunk.
pub const SUBGROUP_SIZE: usize = 10;

/// Per-run mutable flags, owned by the run — never module-level state.
#[derive(Debug, Default)]
pub struct BatchRunState {
    assets_copied: bool,
    variables_written: bool,
    stylesheet_written: bool,
}

/// Everything a task needs besides itself.
pub struct ExecuteContext<'a> {
    pub input_root: &'a Path,
    pub output_root: &'a Path,
    pub config: &'a BatchConfig,
    pub converter: Arc<dyn DocumentConverter>,
    pub progress: &'a ProgressSender,
}

/// Process all tasks and return one record per task, in task order.
pub async fn process_tasks(tasks: &[PlannedTask], ctx: &ExecuteContext<'_>) -> Vec<FileRecord> {
    let total = tasks.len();
    let state = Mutex::new(BatchRunState::default());
    let mut records: Vec<FileRecord> = Vec::with_capacity(total);
    let mut cancelled = false;

    for (chunk_index, chunk) in tasks.chunks(ctx.config.chunk_size.max(1)).enumerate() {
        // The delay separates chunk boundaries; it is not appended after
        // the final chunk.
        if chunk_index > 0 && !cancelled {
            sleep(Duration::from_millis(ctx.config.chunk_delay_ms)).await;
        }
        debug!(
            "chunk {} ({} tasks)",
            chunk_index + 1,
            chunk.len()
        );

        for group in chunk.chunks(SUBGROUP_SIZE) {
            if ctx.config.cancel.is_cancelled() {
                cancelled = true;
            }
            if cancelled {
                for task in group {
                    records.push(FileRecord {
                        input: task.candidate.path.clone(),
                        output: task.output.clone(),
                        status: TaskStatus::Skipped(SkipReason::Cancelled),
                    });
                }
                continue;
            }

            let base_index = records.len();
            let outcomes = join_all(
                group
                    .iter()
                    .enumerate()
                    .map(|(offset, task)| run_task(task, base_index + offset + 1, total, ctx, &state)),
            )
            .await;
            records.extend(outcomes);
        }
    }

    records
}

/// Drive one task to its terminal status.
async fn run_task(
    task: &PlannedTask,
    index: usize,
    total: usize,
    ctx: &ExecuteContext<'_>,
    state: &Mutex<BatchRunState>,
) -> FileRecord {
    let input = &task.candidate.path;
    ctx.progress.converting(input, index, total, "converting");

    let status = task_status(task, index, total, ctx, state).await;

    if let TaskStatus::Failed(e) = &status {
        warn!("task {index}/{total} failed: {e}");
    }

    // The asset resolver runs after every task, success or failure, so
    // directory-level copying completes even when conversions fail.
    copy_assets_once(ctx, state).await;

    FileRecord {
        input: input.clone(),
        output: task.output.clone(),
        status,
    }
}

/// The task state machine: pre-marked skip, oversize/binary check,
/// condition re-check, then conversion under the timeout.
async fn task_status(
    task: &PlannedTask,
    index: usize,
    total: usize,
    ctx: &ExecuteContext<'_>,
    state: &Mutex<BatchRunState>,
) -> TaskStatus {
    if let Some(reason) = &task.skip {
        return TaskStatus::Skipped(reason.clone());
    }
    let input = &task.candidate.path;
    // Planner guarantees an output path for every non-skipped task.
    let Some(output) = &task.output else {
        return TaskStatus::Skipped(SkipReason::NotInPlan);
    };

    if task.candidate.size_bytes > detect::MAX_TEXT_SIZE {
        return TaskStatus::Skipped(SkipReason::Oversize(task.candidate.size_bytes));
    }

    let prefix = match read_prefix(input).await {
        Ok(p) => p,
        Err(e) => return TaskStatus::Failed(TaskError::io(input, &e)),
    };
    if let Some(detail) = detect::classify_binary(&prefix) {
        return TaskStatus::Skipped(SkipReason::Binary(detail));
    }

    // Condition markers require content, so the check runs here and not
    // only at discovery time.
    let prefix_text = String::from_utf8_lossy(&prefix);
    if let Some(condition) = filter::content_excluded(&prefix_text, &ctx.config.exclude_conditions)
    {
        return TaskStatus::Skipped(SkipReason::ConditionExcluded(condition));
    }

    if let Some(parent) = output.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return TaskStatus::Failed(TaskError::io(parent, &e));
        }
    }

    let options = ConvertOptions {
        format: ctx.config.format,
        input_root: ctx.input_root.to_path_buf(),
    };

    let doc = match convert_with_heartbeat(input, output, &options, index, total, ctx).await {
        Ok(doc) => doc,
        Err(e) => return TaskStatus::Failed(e),
    };

    if let Err(e) = write_atomic(output, &doc.content).await {
        return TaskStatus::Failed(TaskError::io(output, &e));
    }

    let assets = if ctx.config.copy_images && ctx.config.format.copies_assets() {
        assets::resolve_document_images(
            &doc.metadata.images,
            input,
            ctx.input_root,
            ctx.output_root,
        )
        .await
    } else {
        Vec::new()
    };

    write_includes_once(ctx, state).await;

    TaskStatus::Succeeded {
        assets,
        quality: doc.metadata.quality,
    }
}

/// Race the conversion against the per-file timeout while re-emitting the
/// task's progress event at the heartbeat period.
async fn convert_with_heartbeat(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
    index: usize,
    total: usize,
    ctx: &ExecuteContext<'_>,
) -> Result<ConvertedDocument, TaskError> {
    let timeout_ms = ctx.config.per_file_timeout_ms;
    let convert_fut = ctx.converter.convert(input, output, options);
    tokio::pin!(convert_fut);

    let timeout = sleep(Duration::from_millis(timeout_ms));
    tokio::pin!(timeout);

    let mut heartbeat = interval(Duration::from_millis(ctx.config.heartbeat_interval_ms));
    // An interval's first tick completes immediately; the task's
    // Converting event was already emitted.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            result = &mut convert_fut => return result,
            _ = &mut timeout => {
                return Err(TaskError::Timeout {
                    path: input.to_path_buf(),
                    elapsed_ms: timeout_ms,
                });
            }
            _ = heartbeat.tick() => {
                ctx.progress.converting(input, index, total, "still converting");
            }
        }
    }
}

/// Directory-level asset copy, exactly once per batch.
async fn copy_assets_once(ctx: &ExecuteContext<'_>, state: &Mutex<BatchRunState>) {
    if !ctx.config.copy_images || !ctx.config.format.copies_assets() {
        return;
    }
    let mut state = state.lock().await;
    if state.assets_copied {
        return;
    }
    assets::copy_image_assets(ctx.input_root, ctx.output_root).await;
    state.assets_copied = true;
}

/// Write the variables include file and stylesheet, each at most once per
/// batch, after the first successful conversion. Generation failures are
/// logged; the flags stay set so nothing is retried.
async fn write_includes_once(ctx: &ExecuteContext<'_>, state: &Mutex<BatchRunState>) {
    let Some(includes) = &ctx.config.includes else {
        return;
    };
    let mut state = state.lock().await;

    if !state.variables_written {
        state.variables_written = true;
        match includes
            .variables_file(ctx.input_root, ctx.config.format)
            .await
        {
            Ok(Some(file)) => write_generated(ctx, &file).await,
            Ok(None) => {}
            Err(e) => warn!("variables include generation failed: {e}"),
        }
    }

    if !state.stylesheet_written {
        state.stylesheet_written = true;
        match includes.stylesheet(ctx.config.format).await {
            Ok(Some(file)) => write_generated(ctx, &file).await,
            Ok(None) => {}
            Err(e) => warn!("stylesheet generation failed: {e}"),
        }
    }
}

async fn write_generated(ctx: &ExecuteContext<'_>, file: &crate::converter::GeneratedFile) {
    let path = ctx.output_root.join(&file.relative_path);
    if let Some(parent) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!("cannot create {}: {e}", parent.display());
            return;
        }
    }
    if let Err(e) = tokio::fs::write(&path, &file.content).await {
        warn!("cannot write generated file {}: {e}", path.display());
    }
}

/// Read up to [`detect::CLASSIFY_PREFIX_LEN`] bytes.
async fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; detect::CLASSIFY_PREFIX_LEN];
    let mut filled = 0usize;
    loop {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 || filled + n == buf.len() {
            filled += n;
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Atomic write: temp file in the same directory, then rename.
async fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp = match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.tmp", name.to_string_lossy())),
        None => path.with_extension("tmp"),
    };
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetFormat;
    use crate::converter::ConvertMetadata;
    use crate::output::CandidateFile;
    use crate::progress::{progress_channel, Phase};
    use futures::future::BoxFuture;

    /// Converter that fails for inputs whose name contains "fail" and
    /// sleeps `delay_ms` otherwise.
    struct TestConverter {
        delay_ms: u64,
    }

    impl DocumentConverter for TestConverter {
        fn convert<'a>(
            &'a self,
            input: &'a Path,
            _output: &'a Path,
            _options: &'a ConvertOptions,
        ) -> BoxFuture<'a, Result<ConvertedDocument, TaskError>> {
            Box::pin(async move {
                if self.delay_ms > 0 {
                    sleep(Duration::from_millis(self.delay_ms)).await;
                }
                if input.to_string_lossy().contains("fail") {
                    return Err(TaskError::ConverterFailed {
                        path: input.to_path_buf(),
                        detail: "induced failure".into(),
                    });
                }
                Ok(ConvertedDocument {
                    content: "= converted\n".into(),
                    metadata: ConvertMetadata::default(),
                })
            })
        }
    }

    fn planned(input_root: &Path, output_root: &Path, name: &str) -> PlannedTask {
        let path = input_root.join(name);
        std::fs::write(&path, "<h1>T</h1>").unwrap();
        PlannedTask {
            candidate: CandidateFile {
                path: path.clone(),
                size_bytes: 10,
                extension: "htm".into(),
            },
            relative_input: name.to_string(),
            output: Some(output_root.join(name).with_extension("adoc")),
            skip: None,
        }
    }

    fn test_config() -> BatchConfig {
        BatchConfig {
            copy_images: false,
            chunk_delay_ms: 0,
            per_file_timeout_ms: 1_000,
            heartbeat_interval_ms: 100,
            format: TargetFormat::Asciidoc,
            ..BatchConfig::default()
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let tasks: Vec<PlannedTask> = ["a.htm", "fail.htm", "c.htm"]
            .iter()
            .map(|n| planned(input.path(), output.path(), n))
            .collect();

        let config = test_config();
        let progress = ProgressSender::disabled();
        let ctx = ExecuteContext {
            input_root: input.path(),
            output_root: output.path(),
            config: &config,
            converter: Arc::new(TestConverter { delay_ms: 0 }),
            progress: &progress,
        };

        let records = process_tasks(&tasks, &ctx).await;
        assert_eq!(records.len(), 3);
        assert!(records[0].status.is_succeeded());
        assert!(records[1].status.is_failed());
        assert!(records[2].status.is_succeeded());
        assert!(output.path().join("a.adoc").is_file());
        assert!(output.path().join("c.adoc").is_file());
        assert!(!output.path().join("fail.adoc").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_conversion_times_out_without_retry() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let tasks = vec![planned(input.path(), output.path(), "slow.htm")];

        let config = test_config();
        let progress = ProgressSender::disabled();
        let ctx = ExecuteContext {
            input_root: input.path(),
            output_root: output.path(),
            config: &config,
            converter: Arc::new(TestConverter { delay_ms: 60_000 }),
            progress: &progress,
        };

        let records = process_tasks(&tasks, &ctx).await;
        assert!(matches!(
            &records[0].status,
            TaskStatus::Failed(TaskError::Timeout { elapsed_ms, .. }) if *elapsed_ms == 1_000
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_re_emits_progress_during_slow_conversion() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let tasks = vec![planned(input.path(), output.path(), "slow.htm")];

        let config = BatchConfig {
            per_file_timeout_ms: 10_000,
            heartbeat_interval_ms: 100,
            ..test_config()
        };
        let (progress, mut rx) = progress_channel();
        let ctx = ExecuteContext {
            input_root: input.path(),
            output_root: output.path(),
            config: &config,
            converter: Arc::new(TestConverter { delay_ms: 450 }),
            progress: &progress,
        };

        let records = process_tasks(&tasks, &ctx).await;
        assert!(records[0].status.is_succeeded());
        drop(progress);

        let mut initial = 0;
        let mut heartbeats = 0;
        while let Some(event) = rx.recv().await {
            assert_eq!(event.phase, Phase::Converting);
            assert_eq!(event.index, 1);
            assert_eq!(event.percentage, 100);
            match event.message.as_str() {
                "converting" => initial += 1,
                "still converting" => heartbeats += 1,
                other => panic!("unexpected message {other}"),
            }
        }
        assert_eq!(initial, 1);
        assert!(heartbeats >= 3, "expected >= 3 heartbeats, got {heartbeats}");
    }

    #[tokio::test]
    async fn cancelled_token_skips_remaining_tasks() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let tasks: Vec<PlannedTask> = ["a.htm", "b.htm"]
            .iter()
            .map(|n| planned(input.path(), output.path(), n))
            .collect();

        let config = test_config();
        config.cancel.cancel();
        let progress = ProgressSender::disabled();
        let ctx = ExecuteContext {
            input_root: input.path(),
            output_root: output.path(),
            config: &config,
            converter: Arc::new(TestConverter { delay_ms: 0 }),
            progress: &progress,
        };

        let records = process_tasks(&tasks, &ctx).await;
        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(matches!(
                record.status,
                TaskStatus::Skipped(SkipReason::Cancelled)
            ));
        }
    }

    #[tokio::test]
    async fn oversize_candidate_is_skipped_unread() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let mut task = planned(input.path(), output.path(), "big.htm");
        task.candidate.size_bytes = 6 * 1024 * 1024;

        let config = test_config();
        let progress = ProgressSender::disabled();
        let ctx = ExecuteContext {
            input_root: input.path(),
            output_root: output.path(),
            config: &config,
            converter: Arc::new(TestConverter { delay_ms: 0 }),
            progress: &progress,
        };

        let records = process_tasks(&[task], &ctx).await;
        assert!(matches!(
            records[0].status,
            TaskStatus::Skipped(SkipReason::Oversize(_))
        ));
    }

    #[tokio::test]
    async fn condition_excluded_content_is_skipped_at_execution() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let path = input.path().join("internal.htm");
        std::fs::write(&path, r#"<body conditions="InternalOnly"><h1>x</h1></body>"#).unwrap();
        let task = PlannedTask {
            candidate: CandidateFile {
                path,
                size_bytes: 50,
                extension: "htm".into(),
            },
            relative_input: "internal.htm".into(),
            output: Some(output.path().join("internal.adoc")),
            skip: None,
        };

        let config = BatchConfig {
            exclude_conditions: vec!["InternalOnly".into()],
            ..test_config()
        };
        let progress = ProgressSender::disabled();
        let ctx = ExecuteContext {
            input_root: input.path(),
            output_root: output.path(),
            config: &config,
            converter: Arc::new(TestConverter { delay_ms: 0 }),
            progress: &progress,
        };

        let records = process_tasks(&[task], &ctx).await;
        assert!(matches!(
            &records[0].status,
            TaskStatus::Skipped(SkipReason::ConditionExcluded(c)) if c == "InternalOnly"
        ));
    }
}
