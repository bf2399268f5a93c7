//! Merge raster tile pyramids.
//!
//! Several partial pyramids rendered in the same geometry
//! are combined into one. Where a pyramid lacks a tile, the
//! nearest ancestor tile it does have is stretched under the
//! tiles of the other pyramids, so gaps are back-filled at a
//! lower resolution instead of being left empty.
//!
//! The work happens in three stages:
//!
//! 1. Each input directory is scanned into a
//! [`SourcePyramid`](source::SourcePyramid) index.
//!
//! 1. The indexes are combined into a
//! [`MergedTree`](merge::MergedTree) with one task per
//! output tile.
//!
//! 1. The tasks are run on a bounded worker pool
//! ([`exec`]), each compositing and writing one tile.
//!
//! See [`merge_pyramids`] for the entry point.

pub mod codec;
pub mod exec;
pub mod geometry;
pub mod merge;
pub mod mixer;
pub mod options;
pub mod prelude;
pub mod source;

mod error;
pub use error::{Error, Result};
pub use mixer::merge_pyramids;
