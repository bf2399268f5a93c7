//! Entry point of a merge run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::exec::{self, format_duration, ProgressSink, RunSummary};
use crate::geometry::Pyramid;
use crate::merge::{Compositor, MergedTree};
use crate::options::MergeOptions;
use crate::source::{scan_sources, FsLister, PyramidMetadata, METADATA_FILE};
use crate::{Error, Result};

/// Merge the pyramids at `inputs` into a new pyramid at
/// `output`, following `geometry`.
///
/// Every configuration problem (invalid options, bad
/// inputs, projection mismatch, non-empty output) is
/// reported before anything is written. Tiles that fail
/// afterwards are listed in the returned summary and left
/// out of the output.
pub fn merge_pyramids(
    geometry: Arc<dyn Pyramid>,
    inputs: &[PathBuf],
    output: &Path,
    options: &MergeOptions,
    sink: Arc<dyn ProgressSink>,
) -> Result<RunSummary> {
    options.validate()?;
    if inputs.is_empty() {
        return Err(Error::Config("no input pyramids".into()));
    }
    check_output(output)?;

    let sources = scan_sources(inputs, geometry.as_ref(), &FsLister)?;
    let tree = MergedTree::build(&sources);
    info!(
        "merging {} tiles from {} pyramids with {} workers",
        tree.len(),
        sources.len(),
        options.workers
    );

    fs::create_dir_all(output).map_err(Error::io(output))?;
    PyramidMetadata::for_geometry(geometry.as_ref()).write(&output.join(METADATA_FILE))?;

    let compositor = Arc::new(Compositor::new(geometry, sources, options));
    let summary = exec::run(&tree, compositor, output, options, sink)?;
    info!(
        "done: {} tiles in {}, {} failed",
        summary.processed,
        format_duration(summary.elapsed),
        summary.failures.len()
    );
    Ok(summary)
}

/// The output must be absent or an empty directory.
fn check_output(output: &Path) -> Result<()> {
    if !output.exists() {
        return Ok(());
    }
    if !output.is_dir() {
        return Err(Error::NotADirectory(output.to_owned()));
    }
    let mut entries = fs::read_dir(output).map_err(Error::io(output))?;
    if entries.next().is_some() {
        return Err(Error::OutputNotEmpty(output.to_owned()));
    }
    Ok(())
}
