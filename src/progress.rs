//! Defines structures and types for progress reporting while the frame corpus is
//! downloaded, extracted and loaded into the database.

use std::sync::{Arc, Mutex};

/// Represents a snapshot of the progress during a long-running operation.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// A description of the current stage (e.g., "Pass 1/2: Inserting Frames").
    pub stage_description: String,
    /// Number of items processed in the current stage.
    pub current_item: u64,
    /// Total number of items expected in the current stage (if calculable).
    pub total_items: Option<u64>,
    /// An optional message providing more context (e.g., "Frame: Abandonment").
    pub message: Option<String>,
}

/// Type alias for the progress callback function.
///
/// The callback receives a `ProgressUpdate` and returns `true` to continue. The return
/// value is currently ignored by all callers.
pub type ProgressCallback = Box<dyn FnMut(ProgressUpdate) -> bool + Send + Sync>;

/// Shared handle to an optional callback, cloned into each loading stage.
pub type ProgressReporter = Arc<Mutex<Option<ProgressCallback>>>;

impl ProgressUpdate {
    /// Creates a new progress update for the start of a stage.
    pub fn new_stage(description: String, total_items: Option<u64>) -> Self {
        ProgressUpdate {
            stage_description: description,
            current_item: 0,
            total_items,
            message: None,
        }
    }

    pub fn new(
        description: String,
        current_item: u64,
        total_items: Option<u64>,
        message: Option<String>,
    ) -> Self {
        ProgressUpdate {
            stage_description: description,
            current_item,
            total_items,
            message,
        }
    }
}

/// Wraps an optional callback into a shareable reporter.
pub fn reporter(callback: Option<ProgressCallback>) -> ProgressReporter {
    Arc::new(Mutex::new(callback))
}

/// Invokes the callback held by `reporter`, if any.
pub fn report_progress(reporter: &ProgressReporter, update: ProgressUpdate) {
    // A poisoned lock only means an earlier callback panicked; drop the update.
    if let Ok(mut guard) = reporter.lock() {
        if let Some(cb) = guard.as_mut() {
            let _ = cb(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_progress_invokes_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let reporter = reporter(Some(Box::new(move |update: ProgressUpdate| {
            seen_clone.lock().unwrap().push(update.current_item);
            true
        })));

        report_progress(&reporter, ProgressUpdate::new_stage("Stage".to_string(), Some(2)));
        report_progress(
            &reporter,
            ProgressUpdate::new("Stage".to_string(), 2, Some(2), None),
        );

        assert_eq!(*seen.lock().unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_report_progress_without_callback_is_noop() {
        let reporter = reporter(None);
        report_progress(&reporter, ProgressUpdate::new_stage("Stage".to_string(), None));
    }
}
