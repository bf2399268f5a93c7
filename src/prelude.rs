pub use crate::{merge_pyramids, Error, Result};

pub use crate::codec::*;
pub use crate::exec::{LogSink, ProgressReport, ProgressSink, RunSummary, TileFailure};
pub use crate::geometry::*;
pub use crate::merge::{ByInputOrder, ByMaxLevel, Decision, Priority};
pub use crate::options::*;
pub use crate::source::{discover_sources, DirectoryLister, FsLister};
