use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter {
    val: AtomicU64,
}
impl Counter {
    pub fn load(&self) -> u64 {
        self.val.load(Ordering::Acquire)
    }

    pub fn store(&self, val: u64) {
        self.val.store(val, Ordering::Release);
    }

    pub fn fetch_add(&self, inc: u64) -> u64 {
        self.val.fetch_add(inc, Ordering::AcqRel)
    }
}
impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.load())
    }
}

/// Completed, failed and total counts of some unit of
/// work, plus a free-form suffix such as an estimate of
/// the time left.
#[derive(Debug)]
pub struct DetailCounter {
    pub total: Counter,
    pub processed: Counter,
    pub failed: Counter,
    pub remaining: parking_lot::Mutex<String>,
    name: &'static str,
}
impl DetailCounter {
    pub fn new(name: &'static str) -> Self {
        DetailCounter {
            total: Default::default(),
            processed: Default::default(),
            failed: Default::default(),
            remaining: Default::default(),
            name,
        }
    }
}
impl fmt::Display for DetailCounter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: completed {}", self.name, self.processed.load())?;
        let failed = self.failed.load();
        if failed > 0 {
            write!(f, " (failed {})", failed)?;
        }
        write!(f, " of {}.", self.total.load())?;
        let remaining = self.remaining.lock();
        if !remaining.is_empty() {
            write!(f, " {} remaining.", remaining)?;
        }
        Ok(())
    }
}
