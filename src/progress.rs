//! Progress events for batch conversion.
//!
//! The executor is the single producer of [`ProgressEvent`]s; any number of
//! observers consume them from the receiving half of an unbounded channel.
//! Events are ephemeral notifications — they are never persisted and carry
//! no state the final [`crate::output::BatchResult`] doesn't also carry.
//!
//! # Event protocol
//!
//! One [`Phase::Discovery`] event after discovery completes, then one
//! [`Phase::Converting`] event per task with
//! `percentage = round(index / total * 100)` (1-based index), then one
//! [`Phase::Completed`] event with the final counts. While a single
//! conversion is in flight, its Converting event is re-emitted at the
//! heartbeat period with the same index and percentage — liveness
//! signalling only, never a timeout extension.
//!
//! Dropping the receiver is the observer's way of losing interest: the
//! sender detects the closed channel and silently stops delivering. It does
//! not cancel the batch — use [`crate::BatchConfig::cancel`] for that.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// The progress events as a `Stream`, for combinator-style consumers.
pub type ProgressStream = UnboundedReceiverStream<ProgressEvent>;

/// Which stage of the batch an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Discovery,
    Converting,
    Completed,
}

/// A single progress notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// The file currently being processed; `None` for phase-level events.
    pub current_file: Option<PathBuf>,
    /// 1-based task index; 0 for phase-level events.
    pub index: usize,
    pub total: usize,
    /// `round(index / total * 100)`; 0 when `total` is 0.
    pub percentage: u32,
    pub message: String,
}

impl ProgressEvent {
    /// Percentage for a 1-based index out of `total`.
    pub fn percentage_for(index: usize, total: usize) -> u32 {
        if total == 0 {
            0
        } else {
            ((index as f64 / total as f64) * 100.0).round() as u32
        }
    }
}

/// Sending half of the progress channel.
///
/// Cheap to clone; a disabled sender (from [`ProgressSender::disabled`])
/// drops every event, which lets `run_batch` share one code path with
/// `run_batch_with_progress`.
#[derive(Clone)]
pub struct ProgressSender {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressSender {
    /// A sender that discards all events.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event. A closed or absent channel is not an error — the
    /// observer has simply stopped listening.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    /// Emit a Converting event for the given task.
    pub fn converting(&self, file: &std::path::Path, index: usize, total: usize, message: &str) {
        self.emit(ProgressEvent {
            phase: Phase::Converting,
            current_file: Some(file.to_path_buf()),
            index,
            total,
            percentage: ProgressEvent::percentage_for(index, total),
            message: message.to_string(),
        });
    }
}

/// Create the one-producer progress channel.
///
/// The sender goes into `run_batch_with_progress`; the receiver is consumed
/// by the observer (poll it concurrently with the batch future).
pub fn progress_channel() -> (ProgressSender, UnboundedReceiver<ProgressEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx: Some(tx) }, rx)
}

/// Wrap a receiver as a [`ProgressStream`].
pub fn into_stream(rx: UnboundedReceiver<ProgressEvent>) -> ProgressStream {
    UnboundedReceiverStream::new(rx)
}
