//! The Entry/Registry abstraction
//!
//! Every loaded binary asset gets the same wrapper: a unique name inside
//! its owning table, the relative filename used in assembly mode, the
//! ROM start address when loaded from ROM, the decoded value, and a
//! committed snapshot for dirty tracking. Managers own entries
//! arena-style in insertion-ordered maps; nothing holds a back-pointer
//! to its owner.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use landstalker_format::{
    AnimatedTileset, Blockset, CodecResult, Palette, SpriteFrame, Tilemap2D, Tileset,
};

use crate::error::{DataError, DataResult};

/// A decoded asset that can re-encode itself to wire bytes.
///
/// Decoding is not part of the trait: several formats need context a
/// byte slice cannot carry (palette kinds, section extents), so each
/// manager decodes with whatever it knows and hands the value over.
pub trait AssetBlob: Clone + PartialEq {
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

impl AssetBlob for Tileset {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(Tileset::encode(self))
    }
}

impl AssetBlob for AnimatedTileset {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(AnimatedTileset::encode(self))
    }
}

impl AssetBlob for Palette {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(Palette::encode(self))
    }
}

impl AssetBlob for Tilemap2D {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(Tilemap2D::encode(self))
    }
}

impl AssetBlob for Blockset {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(Blockset::encode(self))
    }
}

impl AssetBlob for SpriteFrame {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        SpriteFrame::encode(self)
    }
}

/// A named, dirty-tracked asset
#[derive(Debug, Clone)]
pub struct Entry<T: AssetBlob> {
    name: String,
    filename: PathBuf,
    start_address: Option<u32>,
    decoded: T,
    orig: T,
}

impl<T: AssetBlob> Entry<T> {
    /// Wrap a freshly decoded asset; the snapshot starts equal to it
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<PathBuf>,
        start_address: Option<u32>,
        decoded: T,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            start_address,
            orig: decoded.clone(),
            decoded,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// ROM byte offset, set only when loaded from ROM
    pub fn start_address(&self) -> Option<u32> {
        self.start_address
    }

    pub fn decoded(&self) -> &T {
        &self.decoded
    }

    pub fn decoded_mut(&mut self) -> &mut T {
        &mut self.decoded
    }

    /// Re-encode the current decoded state to wire bytes
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        self.decoded.encode()
    }

    /// Promote the current state to the committed snapshot
    pub fn commit(&mut self) {
        self.orig = self.decoded.clone();
    }

    /// Changed since load or the last commit
    pub fn has_data_changed(&self) -> bool {
        self.decoded != self.orig
    }

    /// Changed relative to the state last written to disk; this codebase
    /// commits on every save, so the two predicates coincide
    pub fn has_saved_data_changed(&self) -> bool {
        self.has_data_changed()
    }

    /// Encode and write to `dir / filename`, creating parent directories
    pub fn save(&self, dir: &Path) -> DataResult<()> {
        let path = dir.join(&self.filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = self.encode()?;
        std::fs::write(&path, bytes)?;
        Ok(())
    }
}

pub type TilesetEntry = Entry<Tileset>;
pub type AnimatedTilesetEntry = Entry<AnimatedTileset>;
pub type PaletteEntry = Entry<Palette>;
pub type Tilemap2DEntry = Entry<Tilemap2D>;
pub type BlocksetEntry = Entry<Blockset>;
pub type SpriteFrameEntry = Entry<SpriteFrame>;

/// Name -> entry, iterating in insertion (first-use) order. Injection
/// back into ROM lays items out in exactly this order.
pub type EntryMap<T> = IndexMap<String, Entry<T>>;

/// Insert, treating a duplicate name as an internal-consistency
/// violation (a caller bug, never user data).
pub fn insert_unique<T: AssetBlob>(map: &mut EntryMap<T>, entry: Entry<T>) -> DataResult<()> {
    let name = entry.name().to_string();
    if map.contains_key(&name) {
        return Err(DataError::consistency(format!(
            "duplicate entry name: {name}"
        )));
    }
    map.insert(name, entry);
    Ok(())
}

/// Dirty check across a whole entry table
pub fn any_changed<T: AssetBlob>(map: &EntryMap<T>) -> bool {
    map.values().any(Entry::has_data_changed)
}

/// Commit every entry of a table
pub fn commit_all<T: AssetBlob>(map: &mut EntryMap<T>) {
    for entry in map.values_mut() {
        entry.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use landstalker_format::{PaletteKind, Tile};
    use pretty_assertions::assert_eq;

    fn sample_entry() -> TilesetEntry {
        let tileset = Tileset {
            tiles: vec![Tile::default(); 4],
        };
        Entry::new("Tileset00", "rooms/tilesets/tileset_00.bin", Some(0x23000), tileset)
    }

    #[test]
    fn test_dirty_tracking_cycle() {
        let mut entry = sample_entry();
        assert!(!entry.has_data_changed());
        entry.decoded_mut().tiles.push(Tile::default());
        assert!(entry.has_data_changed());
        entry.commit();
        assert!(!entry.has_data_changed());
        entry.decoded_mut().tiles.clear();
        assert!(entry.has_data_changed());
        entry.commit();
        assert!(!entry.has_data_changed());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut map = EntryMap::new();
        insert_unique(&mut map, sample_entry()).unwrap();
        let err = insert_unique(&mut map, sample_entry()).unwrap_err();
        assert!(matches!(err, DataError::InternalConsistency(_)));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut map: EntryMap<Palette> = EntryMap::new();
        for name in ["C", "A", "B"] {
            insert_unique(
                &mut map,
                Entry::new(name, format!("{name}.bin"), None, Palette::new(PaletteKind::Hud)),
            )
            .unwrap();
        }
        let order: Vec<_> = map.keys().cloned().collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_save_writes_file() {
        let dir = std::env::temp_dir().join("lsdata_entry_test");
        let entry = sample_entry();
        entry.save(&dir).unwrap();
        let written = std::fs::read(dir.join(entry.filename())).unwrap();
        assert_eq!(written, entry.encode().unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
