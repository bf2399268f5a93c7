use indicatif::ProgressBar;
use std::{fmt::Display, time::Duration};

/// A spinner showing a displayable value, typically a
/// counter, that other threads update.
pub struct Progress<T> {
    pub bar: ProgressBar,
    pub value: T,
    done: Flag,
}
impl<T> Progress<T> {
    pub fn new(value: T) -> Self {
        let bar = {
            use indicatif::*;
            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}"),
            );
            progress
        };
        Progress {
            bar,
            value,
            done: Default::default(),
        }
    }

    pub fn done(&self) -> bool {
        self.done.load()
    }

    pub fn finish(&self) {
        self.done.store(true);
    }
}
impl<T: Display> Progress<T> {
    pub fn update_progress(&self) {
        self.bar.set_message(&format!("{}", self.value));
    }

    /// Redraw every `timeout` until `finish` is called from
    /// another thread. Blocks the current thread.
    pub fn update_until_done(&self, timeout: Duration) {
        use std::thread;
        while !self.done() {
            self.update_progress();
            thread::park_timeout(timeout);
        }
        self.bar.finish_with_message(&format!("{}", self.value));
    }
}
use std::sync::Arc;
use std::thread::JoinHandle;
impl<T: Send + Sync + Display + 'static> Progress<T> {
    pub fn spawn_auto_update_thread(self: Arc<Self>, timeout: Duration) -> JoinHandle<()> {
        std::thread::spawn(move || self.update_until_done(timeout))
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
#[derive(Debug, Default)]
pub struct Flag {
    val: AtomicBool,
}
impl Flag {
    pub fn load(&self) -> bool {
        self.val.load(Ordering::Acquire)
    }

    pub fn store(&self, val: bool) {
        self.val.store(val, Ordering::Release);
    }
}
