//! Index of one on-disk source pyramid.
//!
//! A source pyramid is a directory laid out as
//! `<root>/<level>/<column>/<row>.<ext>`. Scanning it
//! builds a `level -> column -> row` map of
//! [`SourceTile`]s. The index is built once and is
//! read-only afterwards.
//!
//! A source may carry a [`PyramidMetadata`] file at its
//! root stating the projection and tile size it was
//! rendered with. These are checked against the target
//! geometry while scanning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::geometry::{Pyramid, TileAddress, MAX_LEVEL};
use crate::{Error, Result};

mod listing;
mod metadata;
pub use listing::{DirEntry, DirectoryLister, EntryKind, FsLister};
pub use metadata::{PyramidMetadata, METADATA_FILE};

/// Image extensions recognised as tiles.
pub const TILE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Suffix of source pyramid directories found by
/// [`discover_sources`].
pub const SOURCE_DIR_SUFFIX: &str = ".tiles";

/// A tile image of a source pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTile {
    address: TileAddress,
    pyramid: usize,
    image: PathBuf,
}

impl SourceTile {
    #[inline]
    pub fn address(&self) -> TileAddress {
        self.address
    }

    /// Position of the owning pyramid in the list of
    /// sources being merged.
    #[inline]
    pub fn pyramid(&self) -> usize {
        self.pyramid
    }

    #[inline]
    pub fn image(&self) -> &Path {
        &self.image
    }
}

type Columns = BTreeMap<u32, BTreeMap<u32, SourceTile>>;

#[derive(Debug)]
pub struct SourcePyramid {
    root: PathBuf,
    index: usize,
    max_level: u32,
    levels: BTreeMap<u32, Columns>,
}

impl SourcePyramid {
    /// Scan `root` with `lister`. `index` is the position
    /// of this pyramid among the sources being merged.
    ///
    /// Returns `Ok(None)` if the directory holds no tiles.
    pub fn scan<L: DirectoryLister + ?Sized>(
        root: &Path,
        index: usize,
        geometry: &dyn Pyramid,
        lister: &L,
    ) -> Result<Option<Self>> {
        let mut levels: BTreeMap<u32, Columns> = BTreeMap::new();

        for level_entry in lister.list(root)? {
            if level_entry.kind != EntryKind::Directory {
                if level_entry.name == METADATA_FILE {
                    PyramidMetadata::read(&root.join(METADATA_FILE))?.check(geometry, root)?;
                }
                continue;
            }
            let level = match parse_index(&level_entry.name).filter(|l| *l <= MAX_LEVEL) {
                Some(level) => level,
                None => {
                    debug!("{}: skipping {}", root.display(), level_entry.name);
                    continue;
                }
            };
            let level_path = root.join(&level_entry.name);

            for column_entry in lister.list(&level_path)? {
                let column = match column_entry.kind {
                    EntryKind::Directory => parse_index(&column_entry.name),
                    _ => None,
                };
                let column = match column {
                    Some(column) => column,
                    None => {
                        debug!("{}: skipping {}", level_path.display(), column_entry.name);
                        continue;
                    }
                };
                let column_path = level_path.join(&column_entry.name);

                for row_entry in lister.list(&column_path)? {
                    let row = match row_entry.kind {
                        EntryKind::File => parse_tile_name(&row_entry.name),
                        _ => None,
                    };
                    let row = match row {
                        Some(row) => row,
                        None => {
                            debug!("{}: skipping {}", column_path.display(), row_entry.name);
                            continue;
                        }
                    };

                    let address = TileAddress::new(level, column, row);
                    if !geometry.contains(address) {
                        warn!("{}: tile {} outside the pyramid", root.display(), address);
                        continue;
                    }
                    levels
                        .entry(level)
                        .or_default()
                        .entry(column)
                        .or_default()
                        .insert(
                            row,
                            SourceTile {
                                address,
                                pyramid: index,
                                image: column_path.join(&row_entry.name),
                            },
                        );
                }
            }
        }

        levels.retain(|_, columns| {
            columns.retain(|_, rows| !rows.is_empty());
            !columns.is_empty()
        });
        let max_level = match levels.keys().next_back() {
            Some(&max_level) => max_level,
            None => return Ok(None),
        };

        Ok(Some(SourcePyramid {
            root: root.to_owned(),
            index,
            max_level,
            levels,
        }))
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Deepest level holding a tile.
    #[inline]
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn tile_at(&self, address: TileAddress) -> Option<&SourceTile> {
        self.levels
            .get(&address.level)?
            .get(&address.column)?
            .get(&address.row)
    }

    /// The nearest tile strictly above `address` in this
    /// pyramid, used to back-fill an address the pyramid
    /// has no tile for.
    pub fn best_ancestor(&self, address: TileAddress) -> Option<&SourceTile> {
        let mut current = address;
        while let Some(parent) = current.parent() {
            if let Some(tile) = self.tile_at(parent) {
                return Some(tile);
            }
            current = parent;
        }
        None
    }

    /// Iterate all tiles, by level, column and row.
    pub fn tiles(&self) -> impl Iterator<Item = &SourceTile> {
        self.levels
            .values()
            .flat_map(|columns| columns.values())
            .flat_map(|rows| rows.values())
    }

    pub fn tile_count(&self) -> usize {
        self.levels
            .values()
            .flat_map(|columns| columns.values())
            .map(|rows| rows.len())
            .sum()
    }
}

/// Parse a level or column directory name.
fn parse_index(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Parse the row from a tile file name such as `12.png`.
fn parse_tile_name(name: &str) -> Option<u32> {
    let (stem, ext) = name.rsplit_once('.')?;
    if !TILE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        return None;
    }
    parse_index(stem)
}

/// Check that `path` is an existing directory.
pub fn check_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::MissingInput(path.to_owned()));
    }
    if !path.is_dir() {
        return Err(Error::NotADirectory(path.to_owned()));
    }
    Ok(())
}

/// List the source pyramids under `parent`: the
/// sub-directories whose name ends with
/// [`SOURCE_DIR_SUFFIX`], sorted by name.
pub fn discover_sources<L: DirectoryLister + ?Sized>(
    parent: &Path,
    lister: &L,
) -> Result<Vec<PathBuf>> {
    check_directory(parent)?;
    let mut names: Vec<_> = lister
        .list(parent)?
        .into_iter()
        .filter(|e| e.kind == EntryKind::Directory && e.name.ends_with(SOURCE_DIR_SUFFIX))
        .map(|e| e.name)
        .collect();
    names.sort();
    Ok(names.into_iter().map(|n| parent.join(n)).collect())
}

/// Scan every input, in order. Inputs without tiles are
/// left out with a warning, so the returned indices are
/// renumbered to stay dense.
pub fn scan_sources<L: DirectoryLister + ?Sized>(
    inputs: &[PathBuf],
    geometry: &dyn Pyramid,
    lister: &L,
) -> Result<Vec<SourcePyramid>> {
    let mut sources = Vec::with_capacity(inputs.len());
    for input in inputs {
        check_directory(input)?;
        match SourcePyramid::scan(input, sources.len(), geometry, lister)? {
            Some(source) => {
                debug!(
                    "{}: {} tiles, max level {}",
                    input.display(),
                    source.tile_count(),
                    source.max_level()
                );
                sources.push(source);
            }
            None => warn!("{}: no tiles found, skipping", input.display()),
        }
    }
    Ok(sources)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geometry::WebMercatorPyramid;
    use std::fs;
    use tempdir::TempDir;

    /// Create empty tile files at the given addresses.
    pub(crate) fn touch_tiles(root: &Path, addresses: &[(u32, u32, u32)]) {
        for &(level, column, row) in addresses {
            let dir = root.join(level.to_string()).join(column.to_string());
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{}.png", row)), b"").unwrap();
        }
    }

    fn scan(root: &Path) -> SourcePyramid {
        SourcePyramid::scan(root, 0, &WebMercatorPyramid::default(), &FsLister)
            .unwrap()
            .expect("pyramid has tiles")
    }

    #[test]
    fn tile_names() {
        assert_eq!(parse_tile_name("12.png"), Some(12));
        assert_eq!(parse_tile_name("0.JPG"), Some(0));
        assert_eq!(parse_tile_name("7.jpeg"), Some(7));
        assert_eq!(parse_tile_name("7.tif"), None);
        assert_eq!(parse_tile_name("a.png"), None);
        assert_eq!(parse_tile_name("-1.png"), None);
        assert_eq!(parse_tile_name(".png"), None);
        assert_eq!(parse_tile_name("12"), None);
        assert_eq!(parse_index("003"), Some(3));
        assert_eq!(parse_index("+3"), None);
    }

    #[test]
    fn scan_layout() {
        let tmp = TempDir::new("tilemix_source").unwrap();
        touch_tiles(tmp.path(), &[(0, 0, 0), (3, 1, 1), (3, 2, 5), (5, 4, 4)]);
        // noise that must be ignored
        fs::create_dir_all(tmp.path().join("thumbs")).unwrap();
        fs::write(tmp.path().join("3").join("1").join("notes.txt"), b"").unwrap();
        fs::write(tmp.path().join("3").join("readme.png"), b"").unwrap();
        // out of range for their level
        touch_tiles(tmp.path(), &[(1, 2, 0), (2, 0, 4)]);

        let pyramid = scan(tmp.path());
        assert_eq!(pyramid.max_level(), 5);
        assert_eq!(pyramid.tile_count(), 4);
        let tile = pyramid.tile_at(TileAddress::new(3, 2, 5)).unwrap();
        assert_eq!(tile.image(), tmp.path().join("3/2/5.png").as_path());
        assert!(pyramid.tile_at(TileAddress::new(1, 2, 0)).is_none());
        assert!(pyramid.tile_at(TileAddress::new(2, 0, 4)).is_none());

        let order: Vec<_> = pyramid.tiles().map(|t| t.address()).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }

    #[test]
    fn best_ancestor_walks_up() {
        let tmp = TempDir::new("tilemix_source").unwrap();
        touch_tiles(tmp.path(), &[(3, 1, 1), (1, 0, 0), (6, 40, 40)]);
        let pyramid = scan(tmp.path());

        // every descendant of 3/1/1 down to level 6
        for level in 4..=6 {
            let span = 1 << (level - 3);
            for column in span..2 * span {
                for row in span..2 * span {
                    let ancestor = pyramid
                        .best_ancestor(TileAddress::new(level, column, row))
                        .unwrap();
                    assert_eq!(ancestor.address(), TileAddress::new(3, 1, 1));
                }
            }
        }

        // skips missing levels up to 1/0/0
        let ancestor = pyramid.best_ancestor(TileAddress::new(5, 0, 0)).unwrap();
        assert_eq!(ancestor.address(), TileAddress::new(1, 0, 0));

        // never returns the tile itself
        let ancestor = pyramid.best_ancestor(TileAddress::new(3, 1, 1)).unwrap();
        assert_eq!(ancestor.address(), TileAddress::new(1, 0, 0));

        // no ancestor on the other side of the globe
        assert!(pyramid.best_ancestor(TileAddress::new(4, 15, 15)).is_none());
        assert!(pyramid.best_ancestor(TileAddress::new(0, 0, 0)).is_none());
    }

    #[test]
    fn empty_source_is_skipped() {
        let tmp = TempDir::new("tilemix_source").unwrap();
        let empty = tmp.path().join("empty");
        let full = tmp.path().join("full");
        fs::create_dir_all(&empty).unwrap();
        touch_tiles(&full, &[(2, 1, 1)]);

        let geometry = WebMercatorPyramid::default();
        let sources = scan_sources(&[empty, full.clone()], &geometry, &FsLister).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].index(), 0);
        assert_eq!(sources[0].root(), full.as_path());
    }

    #[test]
    fn missing_input() {
        let tmp = TempDir::new("tilemix_source").unwrap();
        let geometry = WebMercatorPyramid::default();
        let missing = tmp.path().join("nope");
        match scan_sources(&[missing], &geometry, &FsLister) {
            Err(Error::MissingInput(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        let file = tmp.path().join("file");
        fs::write(&file, b"").unwrap();
        match scan_sources(&[file], &geometry, &FsLister) {
            Err(Error::NotADirectory(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn discover_tiles_directories() {
        let tmp = TempDir::new("tilemix_source").unwrap();
        for name in &["b.tiles", "a.tiles", "other"] {
            fs::create_dir_all(tmp.path().join(name)).unwrap();
        }
        fs::write(tmp.path().join("c.tiles"), b"").unwrap();

        let found = discover_sources(tmp.path(), &FsLister).unwrap();
        assert_eq!(
            found,
            vec![tmp.path().join("a.tiles"), tmp.path().join("b.tiles")]
        );
    }
}
