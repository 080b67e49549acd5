//! Run control shared between a worker and its caller.
//!
//! A long-running organize or undo pass polls a [`CancellationToken`] between
//! files and reports each finished item through a [`ProgressSink`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative, file-granular cancellation flag.
///
/// Clones share the same flag, so the caller keeps one handle and passes
/// another to the engine. Cancelling never interrupts an in-flight filesystem
/// call; the engine stops before the next file.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the run stop before the next item.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receives `(current, total, message)` after every processed item.
///
/// Called synchronously on the worker path, so implementations must return
/// quickly.
pub trait ProgressSink {
    fn on_progress(&mut self, current: usize, total: usize, message: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(usize, usize, &str),
{
    fn on_progress(&mut self, current: usize, total: usize, message: &str) {
        self(current, total, message)
    }
}

/// A sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _current: usize, _total: usize, _message: &str) {}
}
