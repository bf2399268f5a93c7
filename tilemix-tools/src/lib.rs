pub use anyhow::Result;

pub mod proc;
pub use proc::*;

pub mod cli;
