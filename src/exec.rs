//! Concurrent execution of a merged tree.
//!
//! Every merged tile becomes one job on a [`WorkerPool`].
//! Tiles are submitted by ascending level, column and row;
//! nothing depends on the order they finish in. A failing
//! tile is logged and recorded in the [`RunSummary`], and
//! the other tiles carry on.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use parking_lot::Mutex;

use crate::geometry::TileAddress;
use crate::merge::{Compositor, MergedTile, MergedTree, TaskState};
use crate::options::MergeOptions;
use crate::{Error, Result};

mod dirs;
mod pool;
mod progress;
pub use dirs::DirectoryGuard;
pub use pool::{Dispatch, WorkerPool};
pub use progress::{format_duration, LogSink, Progress, ProgressReport, ProgressSink};

#[cfg(test)]
pub(crate) use progress::tests::Recorder;

/// A tile that couldn't be produced.
#[derive(Debug)]
pub struct TileFailure {
    pub address: TileAddress,
    pub error: Error,
}

#[derive(Debug)]
pub struct RunSummary {
    /// Number of tiles in the merged tree.
    pub tiles: usize,
    /// Tiles finished, including the failed ones.
    pub processed: u64,
    /// Failed tiles, by address.
    pub failures: Vec<TileFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn succeeded(&self) -> u64 {
        self.processed - self.failures.len() as u64
    }
}

/// State shared by the jobs of one run.
struct Shared {
    compositor: Arc<Compositor>,
    output: PathBuf,
    dirs: DirectoryGuard,
    progress: Progress,
    failures: Mutex<Vec<TileFailure>>,
}

/// Render every tile of `tree` into `output` and wait for
/// all of them to finish.
pub fn run(
    tree: &MergedTree,
    compositor: Arc<Compositor>,
    output: &Path,
    options: &MergeOptions,
    sink: Arc<dyn ProgressSink>,
) -> Result<RunSummary> {
    let pool = WorkerPool::new(options.workers)?;
    let shared = Arc::new(Shared {
        compositor,
        output: output.to_owned(),
        dirs: DirectoryGuard::new(),
        progress: Progress::new(tree.len() as u64, options.report_interval, sink),
        failures: Default::default(),
    });

    for tile in tree.tiles() {
        let tile = tile.clone();
        let shared = shared.clone();
        pool.execute(move || process(&shared, &tile));
    }

    pool.drain(options.drain_timeout)?;
    let report = shared.progress.finish();

    let mut failures = std::mem::take(&mut *shared.failures.lock());
    failures.sort_by_key(|f| f.address);
    Ok(RunSummary {
        tiles: tree.len(),
        processed: report.steps_done,
        failures,
        elapsed: report.elapsed,
    })
}

/// Render one tile and account for the outcome. A panic
/// while rendering fails that tile only.
fn process(shared: &Shared, tile: &MergedTile) {
    tile.set_state(TaskState::Running);
    let address = tile.address();
    let result = catch_unwind(AssertUnwindSafe(|| {
        shared.compositor.render(tile, &shared.output, &shared.dirs)
    }))
    .unwrap_or_else(|payload| Err(Error::Panicked(address, panic_message(payload))));

    match result {
        Ok(_) => {
            tile.set_state(TaskState::Done);
            shared.progress.step_done(false);
        }
        Err(error) => {
            warn!("tile {}: {}", address, error);
            tile.set_state(TaskState::Failed);
            shared.failures.lock().push(TileFailure { address, error });
            shared.progress.step_done(true);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
