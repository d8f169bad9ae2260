//! Upload progress shared between an import and whatever displays it.
//!
//! A `ProgressContext` is created by the application, handed explicitly to
//! each import, and reset when its owner tears down. Observers subscribe to a
//! `watch` channel and always see the latest state.

use serde::Serialize;
use tokio::sync::watch;

/// Snapshot of the upload banner state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadProgress {
    pub is_uploading: bool,
    /// 0.0 ..= 100.0
    pub progress: f32,
    pub message: String,
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self {
            is_uploading: false,
            progress: 0.0,
            message: String::new(),
        }
    }
}

/// Owner of the current upload progress
pub struct ProgressContext {
    tx: watch::Sender<UploadProgress>,
}

impl ProgressContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(UploadProgress::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<UploadProgress> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> UploadProgress {
        self.tx.borrow().clone()
    }

    pub fn start(&self, message: impl Into<String>) {
        self.set(true, 0.0, message.into());
    }

    /// Record `done` of `total` items; stays below 100 until `finish`
    pub fn advance(&self, done: usize, total: usize) {
        let percent = if total == 0 {
            0.0
        } else {
            (done as f32 / total as f32 * 100.0).min(99.0)
        };
        self.set(
            true,
            percent,
            format!("Importing leads... ({} of {})", done.min(total), total),
        );
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.set(true, 100.0, message.into());
    }

    /// Back to idle; called on failure and on teardown
    pub fn reset(&self) {
        self.tx.send_replace(UploadProgress::default());
    }

    fn set(&self, is_uploading: bool, progress: f32, message: String) {
        self.tx.send_replace(UploadProgress {
            is_uploading,
            progress,
            message,
        });
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProgressContext {
    fn drop(&mut self) {
        self.reset();
    }
}
