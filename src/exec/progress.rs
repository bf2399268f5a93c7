//! Progress accounting for a merge run.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;
use parking_lot::Mutex;

/// A snapshot of the progress of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressReport {
    pub steps_done: u64,
    pub total_steps: u64,
    pub failed: u64,
    pub percent: f64,
    pub elapsed: Duration,
    pub estimated_remaining: Duration,
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.2}%) in {}",
            self.steps_done,
            self.total_steps,
            self.percent,
            format_duration(self.elapsed)
        )?;
        if self.steps_done < self.total_steps {
            write!(f, ", {} remaining", format_duration(self.estimated_remaining))?;
        }
        if self.failed > 0 {
            write!(f, " ({} failed)", self.failed)?;
        }
        Ok(())
    }
}

/// `1h02m03s` style, with leading zero units dropped.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}.{:01}s", s, d.subsec_millis() / 100)
    }
}

/// Receives progress reports.
pub trait ProgressSink: Send + Sync {
    /// Called at most once per reporting interval.
    fn inform(&self, report: &ProgressReport);

    /// Called once, after the last step.
    fn finish(&self, report: &ProgressReport) {
        self.inform(report)
    }
}

/// Logs reports at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn inform(&self, report: &ProgressReport) {
        info!("Merging {}", report);
    }

    fn finish(&self, report: &ProgressReport) {
        info!("Merged {}", report);
    }
}

/// Counts finished steps and forwards throttled reports
/// to a [`ProgressSink`]. Safe to update from many threads.
pub struct Progress {
    total: u64,
    done: AtomicU64,
    failed: AtomicU64,
    started: Instant,
    interval: Duration,
    last_report: Mutex<Instant>,
    sink: Arc<dyn ProgressSink>,
}

impl Progress {
    pub fn new(total: u64, interval: Duration, sink: Arc<dyn ProgressSink>) -> Self {
        let started = Instant::now();
        Progress {
            total,
            done: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started,
            interval,
            last_report: Mutex::new(started),
            sink,
        }
    }

    #[inline]
    pub fn steps_done(&self) -> u64 {
        self.done.load(Ordering::Acquire)
    }

    /// Record a finished step, failed or not.
    pub fn step_done(&self, failed: bool) {
        if failed {
            self.failed.fetch_add(1, Ordering::AcqRel);
        }
        let done = self.done.fetch_add(1, Ordering::AcqRel) + 1;

        // a report already in progress covers this step
        if let Some(mut last) = self.last_report.try_lock() {
            let now = Instant::now();
            if now.duration_since(*last) >= self.interval {
                *last = now;
                self.sink.inform(&self.report_at(done, now));
            }
        }
    }

    pub fn report(&self) -> ProgressReport {
        self.report_at(self.steps_done(), Instant::now())
    }

    fn report_at(&self, done: u64, now: Instant) -> ProgressReport {
        let elapsed = now.duration_since(self.started);
        let percent = if self.total == 0 {
            100.
        } else {
            done as f64 * 100. / self.total as f64
        };
        let estimated_remaining = if done == 0 || done >= self.total {
            Duration::from_secs(0)
        } else {
            elapsed.mul_f64((self.total - done) as f64 / done as f64)
        };
        ProgressReport {
            steps_done: done,
            total_steps: self.total,
            failed: self.failed.load(Ordering::Acquire),
            percent,
            elapsed,
            estimated_remaining,
        }
    }

    pub fn finish(&self) -> ProgressReport {
        let report = self.report();
        self.sink.finish(&report);
        report
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Keeps every report it receives.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub reports: Mutex<Vec<ProgressReport>>,
        pub finished: Mutex<Vec<ProgressReport>>,
    }

    impl ProgressSink for Recorder {
        fn inform(&self, report: &ProgressReport) {
            self.reports.lock().push(*report);
        }
        fn finish(&self, report: &ProgressReport) {
            self.finished.lock().push(*report);
        }
    }

    #[test]
    fn throttled_reports() {
        let sink = Arc::new(Recorder::default());
        let progress = Progress::new(10, Duration::from_secs(3600), sink.clone());
        for _ in 0..10 {
            progress.step_done(false);
        }
        assert!(sink.reports.lock().is_empty());

        let report = progress.finish();
        assert_eq!(report.steps_done, 10);
        assert_eq!(report.percent, 100.);
        assert_eq!(report.estimated_remaining, Duration::from_secs(0));
        assert_eq!(sink.finished.lock().len(), 1);
    }

    #[test]
    fn every_step_reported() {
        let sink = Arc::new(Recorder::default());
        let progress = Progress::new(4, Duration::from_secs(0), sink.clone());
        progress.step_done(false);
        progress.step_done(true);
        let reports = sink.reports.lock();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].steps_done, 1);
        assert_eq!(reports[0].percent, 25.);
        assert_eq!(reports[1].failed, 1);
    }

    #[test]
    fn concurrent_steps() {
        let progress = Arc::new(Progress::new(
            8000,
            Duration::from_millis(1),
            Arc::new(Recorder::default()),
        ));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let progress = progress.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        progress.step_done(false);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(progress.steps_done(), 8000);
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(2300)), "2.3s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h02m03s");
    }
}
