//! Bidirectional data exchange between a Landstalker ROM image and an
//! editable assembly tree
//!
//! Four managers own the game's data families: [`SpriteData`],
//! [`GraphicsData`], [`StringData`] and [`RoomData`]. Each can be
//! constructed from either side (a ROM image or a tree of assembly
//! index files and binary assets), edited through typed accessors, and
//! written back to either side. ROM writes are staged as
//! [`PendingWrite`] patches against named sections so a caller can
//! inspect or refuse them before touching the image.
//!
//! Dirty state is tracked per asset: a load followed by a save with no
//! edits reproduces its input byte for byte, including the Huffman
//! forest, which is only rebuilt when the string set actually changed.

pub mod asm;
pub mod entry;
pub mod error;
pub mod flags;
pub mod graphics_data;
pub mod labels;
pub mod manager;
pub mod rom;
pub mod room_data;
pub mod sprite_data;
pub mod string_data;
pub mod tracked;

pub use entry::{Entry, EntryMap};
pub use error::{DataError, DataResult, DiagnosticReporter, Subsystem};
pub use graphics_data::GraphicsData;
pub use manager::{DataManager, PendingWrite};
pub use rom::{Rom, Section};
pub use room_data::RoomData;
pub use sprite_data::SpriteData;
pub use string_data::StringData;
pub use tracked::Tracked;

use std::path::Path;

/// All four managers behind one handle, in their fixed save order
pub struct GameData {
    pub strings: StringData,
    pub graphics: GraphicsData,
    pub sprites: SpriteData,
    pub rooms: RoomData,
}

impl GameData {
    pub fn from_rom(rom: &Rom) -> DataResult<Self> {
        Ok(Self {
            strings: StringData::from_rom(rom)?,
            graphics: GraphicsData::from_rom(rom)?,
            sprites: SpriteData::from_rom(rom)?,
            rooms: RoomData::from_rom(rom)?,
        })
    }

    pub fn from_asm(base_dir: &Path) -> DataResult<Self> {
        Ok(Self {
            strings: StringData::from_asm(base_dir)?,
            graphics: GraphicsData::from_asm(base_dir)?,
            sprites: SpriteData::from_asm(base_dir)?,
            rooms: RoomData::from_asm(base_dir)?,
        })
    }

    pub fn is_modified(&self) -> bool {
        self.strings.is_modified()
            || self.graphics.is_modified()
            || self.sprites.is_modified()
            || self.rooms.is_modified()
    }

    /// Save every subsystem to the assembly tree, in a fixed order
    pub fn save(&mut self, dir: &Path) -> DataResult<()> {
        self.strings.save(dir)?;
        self.graphics.save(dir)?;
        self.sprites.save(dir)?;
        self.rooms.save(dir)?;
        Ok(())
    }

    /// Stage every subsystem's section patches against `rom`
    pub fn refresh_pending_writes(&mut self, rom: &Rom) -> DataResult<()> {
        self.strings.refresh_pending_writes(rom)?;
        self.graphics.refresh_pending_writes(rom)?;
        self.sprites.refresh_pending_writes(rom)?;
        self.rooms.refresh_pending_writes(rom)?;
        Ok(())
    }

    /// Apply all staged patches and refresh the header checksum
    pub fn inject_into(&mut self, rom: &mut Rom) -> DataResult<()> {
        self.refresh_pending_writes(rom)?;
        for manager in [
            self.strings.pending_writes(),
            self.graphics.pending_writes(),
            self.sprites.pending_writes(),
            self.rooms.pending_writes(),
        ] {
            for write in manager {
                let section = rom.get_section(write.section)?;
                rom.write_bytes(section.begin, &write.bytes)?;
            }
        }
        rom.update_checksum();
        self.strings.commit_all_changes();
        self.graphics.commit_all_changes();
        self.sprites.commit_all_changes();
        self.rooms.commit_all_changes();
        Ok(())
    }
}
