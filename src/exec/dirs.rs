//! Serialized creation of output directories.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::{Error, Result};

/// Creates directories on behalf of concurrent tasks. The
/// check and the creation happen under one lock, and
/// directories already created are remembered so repeats
/// don't touch the file system.
#[derive(Debug, Default)]
pub struct DirectoryGuard {
    created: Mutex<HashSet<PathBuf>>,
}

impl DirectoryGuard {
    pub fn new() -> Self {
        Default::default()
    }

    /// Create `dir` and its parents if missing. Returns
    /// whether this call created it.
    pub fn ensure(&self, dir: &Path) -> Result<bool> {
        let mut created = self.created.lock();
        if created.contains(dir) {
            return Ok(false);
        }
        let fresh = !dir.is_dir();
        if fresh {
            fs::create_dir_all(dir).map_err(Error::io(dir))?;
        }
        created.insert(dir.to_owned());
        Ok(fresh)
    }

    /// Create the parent directory of `file`.
    pub fn ensure_parent(&self, file: &Path) -> Result<bool> {
        match file.parent() {
            Some(dir) => self.ensure(dir),
            None => Ok(false),
        }
    }
}
