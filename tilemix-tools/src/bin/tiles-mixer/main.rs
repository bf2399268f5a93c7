// Main function
tilemix_tools::sync_main!(run());

use anyhow::Context;
use std::sync::Arc;
use tilemix::prelude::*;
use tilemix_tools::{Result, Tracker};

fn run() -> Result<()> {
    // Parse command line
    let args = parse_cmd_line();

    let geometry = WebMercatorPyramid::with_tile_size(
        args.tile_size.0,
        args.tile_size.1,
        args.row_order,
    )?;

    let inputs = if args.subdirectories {
        let parent = &args.inputs[0];
        let inputs = discover_sources(parent, &FsLister)
            .with_context(|| format!("listing sources in {}", parent.display()))?;
        eprintln!("found {} sources in {}", inputs.len(), parent.display());
        inputs
    } else {
        args.inputs.clone()
    };

    let mut options = MergeOptions::default()
        .with_quality(args.quality)
        .with_format(args.format)
        .with_priority(priority_from_str(&args.priority)?)
        .with_report_interval(std::time::Duration::from_millis(200));
    if let Some(threads) = args.threads {
        options = options.with_workers(threads);
    }

    let tracker = Arc::new(Tracker::new("tiles"));
    let summary = merge_pyramids(Arc::new(geometry), &inputs, &args.output, &options, tracker)
        .with_context(|| format!("merging into {}", args.output.display()))?;

    for failure in &summary.failures {
        eprintln!("Warning: tile {}: {}", failure.address, failure.error);
    }
    eprintln!(
        "{} of {} tiles written to {}",
        summary.succeeded(),
        summary.tiles,
        args.output.display()
    );
    Ok(())
}

mod args;
use args::parse_cmd_line;
