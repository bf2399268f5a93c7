//! Order in which the pyramids contributing to a tile are
//! drawn. Pyramids drawn later end up on top.

use std::cmp::Ordering;
use std::fmt::Debug;

use crate::source::SourcePyramid;

pub trait Priority: Debug + Send + Sync {
    fn compare(&self, a: &SourcePyramid, b: &SourcePyramid) -> Ordering;
}

/// Deeper pyramids are assumed to carry the higher native
/// resolution, and are drawn last.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByMaxLevel;

impl Priority for ByMaxLevel {
    fn compare(&self, a: &SourcePyramid, b: &SourcePyramid) -> Ordering {
        a.max_level().cmp(&b.max_level())
    }
}

/// Inputs listed later are drawn last.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByInputOrder;

impl Priority for ByInputOrder {
    fn compare(&self, a: &SourcePyramid, b: &SourcePyramid) -> Ordering {
        a.index().cmp(&b.index())
    }
}
