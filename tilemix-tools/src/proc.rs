use crate::cli::*;
use log::info;
use std::sync::Arc;
use std::thread::JoinHandle;
use tilemix::exec::{format_duration, ProgressReport, ProgressSink};

const PROGRESS_UPDATE_MILLIS: u64 = 500;

/// Shows the progress of a merge run on a spinner, and logs
/// the final report.
pub struct Tracker {
    progress: Arc<Progress<DetailCounter>>,
    handle: Option<JoinHandle<()>>,
}

impl Tracker {
    pub fn new(units: &'static str) -> Self {
        let progress = Arc::new(Progress::new(DetailCounter::new(units)));
        let handle = progress
            .clone()
            .spawn_auto_update_thread(std::time::Duration::from_millis(PROGRESS_UPDATE_MILLIS));
        Tracker {
            progress,
            handle: Some(handle),
        }
    }

    fn record(&self, report: &ProgressReport) {
        let counter = &self.progress.value;
        counter.total.store(report.total_steps);
        counter.processed.store(report.steps_done);
        counter.failed.store(report.failed);
        *counter.remaining.lock() = if report.steps_done < report.total_steps {
            format_duration(report.estimated_remaining)
        } else {
            String::new()
        };
    }
}

impl ProgressSink for Tracker {
    fn inform(&self, report: &ProgressReport) {
        self.record(report);
    }

    fn finish(&self, report: &ProgressReport) {
        self.record(report);
        self.progress.finish();
        info!("Merged {}", report);
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.progress.finish();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                eprintln!("Warning: progress thread panicked!");
            }
        }
    }
}
