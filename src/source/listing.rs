//! Directory listing used to discover pyramid files.

use std::fs;
use std::path::Path;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Lists the entries of a directory. Entries whose names
/// are not valid UTF-8 are left out.
pub trait DirectoryLister: Sync {
    fn list(&self, path: &Path) -> Result<Vec<DirEntry>>;
}

/// Lists directories of the local file system. Symbolic
/// links are followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLister;

impl DirectoryLister for FsLister {
    fn list(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = vec![];
        for entry in fs::read_dir(path).map_err(Error::io(path))? {
            let entry = entry.map_err(Error::io(path))?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let entry_path = entry.path();
            let meta = fs::metadata(&entry_path).map_err(Error::io(&entry_path))?;
            let kind = if meta.is_dir() {
                EntryKind::Directory
            } else if meta.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            entries.push(DirEntry { name, kind });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
