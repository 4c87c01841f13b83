//! Room subsystem: room table, tilesets, blocksets, palettes, flags
//!
//! Three of the asset families here sit behind pointer tables with
//! shared items: several room slots routinely point at one tileset or
//! blockset. In memory a slot is a name referring into the entry map,
//! so sharing survives edits, and the slot lists persist it explicitly
//! in the assembly tree where pointers no longer exist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use landstalker_format::bytes::{deserialise_fixed_width, serialise_fixed_width};
use landstalker_format::{
    AnimatedTileset, AnimatedTilesetHeader, Blockset, Palette, PaletteKind, PointerTableBuilder,
    Tileset, slice_pointer_table,
};
use landstalker_format::tileset::validate_frame_length;

use crate::asm::{AsmFile, IncludeKind, Width};
use crate::entry::{AssetBlob, Entry, EntryMap, any_changed, commit_all, insert_unique};
use crate::error::{DataError, DataResult, Subsystem, load_context};
use crate::flags::{Chest, Door, RoomClearFlag, RoomRecord, SacredTreeFlag, TileSwapFlag, TreeWarpFlag, Warp};
use crate::labels::{self, DataFileId, data_file, format_index, format_index2};
use crate::manager::{DataManager, PendingWrite, check_section_fit, read_pointer_table};
use crate::rom::Rom;
use crate::sprite_data::write_data_file;
use crate::tracked::Tracked;

const SUBSYSTEM: Subsystem = Subsystem::Room;

pub struct RoomData {
    base_dir: Option<PathBuf>,
    rooms: Tracked<Vec<RoomRecord>>,
    tilesets: EntryMap<Tileset>,
    /// Slot index -> tileset entry name, shared entries repeat
    tileset_slots: Tracked<Vec<String>>,
    anim_headers: Tracked<Vec<AnimatedTilesetHeader>>,
    anim_tilesets: EntryMap<AnimatedTileset>,
    /// Per header, its frame entry names in animation order
    anim_frame_slots: Tracked<Vec<Vec<String>>>,
    blocksets: EntryMap<Blockset>,
    blockset_slots: Tracked<Vec<String>>,
    palettes: EntryMap<Palette>,
    warps: Tracked<Vec<Warp>>,
    doors: Tracked<Vec<Door>>,
    chests: Tracked<Vec<Chest>>,
    tile_swaps: Tracked<Vec<TileSwapFlag>>,
    clear_flags: Tracked<Vec<RoomClearFlag>>,
    sacred_trees: Tracked<Vec<SacredTreeFlag>>,
    tree_warps: Tracked<Vec<TreeWarpFlag>>,
    pending_writes: Vec<PendingWrite>,
}

impl RoomData {
    pub fn from_rom(rom: &Rom) -> DataResult<Self> {
        let rooms = Self::rom_load_rooms(rom)?;
        let (tilesets, tileset_slots) = Self::rom_load_tilesets(rom)?;
        let anim_headers = Self::rom_load_anim_headers(rom)?;
        let (anim_tilesets, anim_frame_slots) = Self::rom_load_anim_frames(rom, &anim_headers)?;
        let (blocksets, blockset_slots) = Self::rom_load_blocksets(rom)?;
        let palettes = Self::rom_load_palettes(rom, &rooms)?;
        let warps = Self::rom_load_table(rom, "Rooms::Warps", Warp::from_bytes)?;
        let doors = Self::rom_load_table(rom, "Rooms::Doors", Door::from_bytes)?;
        let chests = Self::rom_load_table(rom, "Rooms::Chests", Chest::from_bytes)?;
        let tile_swaps = Self::rom_load_table(rom, "Rooms::TileSwaps", TileSwapFlag::from_bytes)?;
        let clear_flags =
            Self::rom_load_table(rom, "Rooms::ClearFlags", RoomClearFlag::from_bytes)?;
        let sacred_trees =
            Self::rom_load_table(rom, "Rooms::SacredTrees", SacredTreeFlag::from_bytes)?;
        let tree_warps = Self::rom_load_table(rom, "Rooms::TreeWarps", TreeWarpFlag::from_bytes)?;
        Ok(Self {
            base_dir: None,
            rooms: Tracked::new(rooms),
            tilesets,
            tileset_slots: Tracked::new(tileset_slots),
            anim_headers: Tracked::new(anim_headers),
            anim_tilesets,
            anim_frame_slots: Tracked::new(anim_frame_slots),
            blocksets,
            blockset_slots: Tracked::new(blockset_slots),
            palettes,
            warps: Tracked::new(warps),
            doors: Tracked::new(doors),
            chests: Tracked::new(chests),
            tile_swaps: Tracked::new(tile_swaps),
            clear_flags: Tracked::new(clear_flags),
            sacred_trees: Tracked::new(sacred_trees),
            tree_warps: Tracked::new(tree_warps),
            pending_writes: Vec::new(),
        })
    }

    pub fn from_asm(base_dir: &Path) -> DataResult<Self> {
        let index_path = base_dir.join(data_file(DataFileId::RoomIndex).path);
        let mut index = load_context(AsmFile::load(&index_path), SUBSYSTEM, "room index")?;
        let rooms = Self::asm_load_rooms(base_dir, &mut index)?;
        let (tilesets, tileset_slots) = Self::asm_load_tilesets(base_dir, &mut index)?;
        let anim_headers = Self::asm_load_anim_headers(base_dir, &mut index)?;
        let (anim_tilesets, anim_frame_slots) =
            Self::asm_load_anim_frames(base_dir, &mut index, &anim_headers)?;
        let (blocksets, blockset_slots) = Self::asm_load_blocksets(base_dir, &mut index)?;
        let palettes = Self::asm_load_palettes(base_dir, &mut index)?;
        let warps =
            Self::asm_load_table(base_dir, &mut index, DataFileId::RoomWarps, Warp::from_bytes)?;
        let doors =
            Self::asm_load_table(base_dir, &mut index, DataFileId::RoomDoors, Door::from_bytes)?;
        let chests =
            Self::asm_load_table(base_dir, &mut index, DataFileId::RoomChests, Chest::from_bytes)?;
        let tile_swaps = Self::asm_load_table(
            base_dir,
            &mut index,
            DataFileId::RoomTileSwaps,
            TileSwapFlag::from_bytes,
        )?;
        let clear_flags = Self::asm_load_table(
            base_dir,
            &mut index,
            DataFileId::RoomClearFlags,
            RoomClearFlag::from_bytes,
        )?;
        let sacred_trees = Self::asm_load_table(
            base_dir,
            &mut index,
            DataFileId::RoomSacredTrees,
            SacredTreeFlag::from_bytes,
        )?;
        let tree_warps = Self::asm_load_table(
            base_dir,
            &mut index,
            DataFileId::RoomTreeWarps,
            TreeWarpFlag::from_bytes,
        )?;
        Ok(Self {
            base_dir: Some(base_dir.to_path_buf()),
            rooms: Tracked::new(rooms),
            tilesets,
            tileset_slots: Tracked::new(tileset_slots),
            anim_headers: Tracked::new(anim_headers),
            anim_tilesets,
            anim_frame_slots: Tracked::new(anim_frame_slots),
            blocksets,
            blockset_slots: Tracked::new(blockset_slots),
            palettes,
            warps: Tracked::new(warps),
            doors: Tracked::new(doors),
            chests: Tracked::new(chests),
            tile_swaps: Tracked::new(tile_swaps),
            clear_flags: Tracked::new(clear_flags),
            sacred_trees: Tracked::new(sacred_trees),
            tree_warps: Tracked::new(tree_warps),
            pending_writes: Vec::new(),
        })
    }

    // ---- accessors ----

    /// Assembly tree this was loaded from or last saved to
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn rooms(&self) -> &[RoomRecord] {
        self.rooms.get()
    }

    pub fn rooms_mut(&mut self) -> &mut Vec<RoomRecord> {
        self.rooms.get_mut()
    }

    pub fn tilesets(&self) -> &EntryMap<Tileset> {
        &self.tilesets
    }

    pub fn tileset_slots(&self) -> &[String] {
        self.tileset_slots.get()
    }

    /// Tileset used by a room, resolved through its slot
    pub fn room_tileset(&self, room: usize) -> Option<&Entry<Tileset>> {
        let record = self.rooms.get().get(room)?;
        let name = self.tileset_slots.get().get(usize::from(record.tileset))?;
        self.tilesets.get(name)
    }

    pub fn anim_headers(&self) -> &[AnimatedTilesetHeader] {
        self.anim_headers.get()
    }

    pub fn anim_tilesets(&self) -> &EntryMap<AnimatedTileset> {
        &self.anim_tilesets
    }

    pub fn anim_frame_slots(&self) -> &[Vec<String>] {
        self.anim_frame_slots.get()
    }

    pub fn blocksets(&self) -> &EntryMap<Blockset> {
        &self.blocksets
    }

    pub fn blockset_slots(&self) -> &[String] {
        self.blockset_slots.get()
    }

    pub fn palettes(&self) -> &EntryMap<Palette> {
        &self.palettes
    }

    pub fn warps(&self) -> &[Warp] {
        self.warps.get()
    }

    pub fn warps_mut(&mut self) -> &mut Vec<Warp> {
        self.warps.get_mut()
    }

    pub fn doors(&self) -> &[Door] {
        self.doors.get()
    }

    pub fn chests(&self) -> &[Chest] {
        self.chests.get()
    }

    pub fn chests_mut(&mut self) -> &mut Vec<Chest> {
        self.chests.get_mut()
    }

    pub fn tile_swaps(&self) -> &[TileSwapFlag] {
        self.tile_swaps.get()
    }

    pub fn clear_flags(&self) -> &[RoomClearFlag] {
        self.clear_flags.get()
    }

    pub fn sacred_trees(&self) -> &[SacredTreeFlag] {
        self.sacred_trees.get()
    }

    pub fn tree_warps(&self) -> &[TreeWarpFlag] {
        self.tree_warps.get()
    }

    // ---- ROM sub-loaders ----

    fn rom_load_rooms(rom: &Rom) -> DataResult<Vec<RoomRecord>> {
        const STEP: &str = "room table";
        let bytes = load_context(rom.section_bytes("Rooms::RoomTable"), SUBSYSTEM, STEP)?;
        Ok(deserialise_fixed_width::<{ RoomRecord::WIDTH }>(&bytes)
            .iter()
            .map(RoomRecord::from_bytes)
            .collect())
    }

    fn rom_load_tilesets(rom: &Rom) -> DataResult<(EntryMap<Tileset>, Vec<String>)> {
        const STEP: &str = "tileset data";
        Self::rom_load_pointer_items(
            rom,
            "Rooms::Tilesets",
            STEP,
            labels::ROOM_TILESET_LABEL,
            labels::ROOM_TILESET_FILE,
            |bytes| Ok(Tileset::decode(bytes)?.0),
        )
    }

    fn rom_load_anim_headers(rom: &Rom) -> DataResult<Vec<AnimatedTilesetHeader>> {
        const STEP: &str = "animated tileset headers";
        let bytes = load_context(rom.section_bytes("Rooms::AnimTilesetHeaders"), SUBSYSTEM, STEP)?;
        Ok(
            deserialise_fixed_width::<{ AnimatedTilesetHeader::WIDTH }>(&bytes)
                .iter()
                .map(AnimatedTilesetHeader::from_bytes)
                .collect(),
        )
    }

    fn rom_load_anim_frames(
        rom: &Rom,
        headers: &[AnimatedTilesetHeader],
    ) -> DataResult<(EntryMap<AnimatedTileset>, Vec<Vec<String>>)> {
        const STEP: &str = "animated tileset frames";
        let section = load_context(rom.get_section("Rooms::AnimTilesetFrames"), SUBSYSTEM, STEP)?;
        let pointers = load_context(read_pointer_table(rom, section), SUBSYSTEM, STEP)?;
        let total_slots: usize =
            headers.iter().map(|h| usize::from(h.frame_count)).sum();
        if pointers.len() != total_slots {
            return Err(DataError::load(
                SUBSYSTEM,
                STEP,
                format!(
                    "headers claim {total_slots} frame slot(s), pointer table holds {}",
                    pointers.len()
                ),
            ));
        }
        let slices = load_context(
            slice_pointer_table(&pointers, section.end),
            SUBSYSTEM,
            STEP,
        )?;

        // Entries are created at each item's first owning (header,
        // frame) slot, which also names them. Frame payloads are raw
        // tile data with no internal length, so the read is bounded by
        // the header's DMA length, not the sliced extent.
        let mut frames = EntryMap::new();
        let mut item_names: BTreeMap<usize, String> = BTreeMap::new();
        let mut frame_slots = Vec::with_capacity(headers.len());
        let mut slot = 0;
        for (h, header) in headers.iter().enumerate() {
            load_context(
                validate_frame_length(usize::from(header.length)),
                SUBSYSTEM,
                STEP,
            )?;
            let mut names = Vec::with_capacity(usize::from(header.frame_count));
            for f in 0..usize::from(header.frame_count) {
                let item = slices.index[slot];
                let name = match item_names.get(&item) {
                    Some(name) => name.clone(),
                    None => {
                        let (begin, _) = slices.items[item];
                        let bytes = load_context(
                            rom.read_bytes(begin, usize::from(header.length)),
                            SUBSYSTEM,
                            STEP,
                        )?;
                        let tileset =
                            load_context(AnimatedTileset::decode(&bytes), SUBSYSTEM, STEP)?;
                        let name = format_index2(labels::ROOM_ANIM_TILESET_LABEL, h, f);
                        let entry = Entry::new(
                            name.clone(),
                            format_index2(labels::ROOM_ANIM_TILESET_FILE, h, f),
                            Some(begin),
                            tileset,
                        );
                        insert_unique(&mut frames, entry)?;
                        item_names.insert(item, name.clone());
                        name
                    }
                };
                names.push(name);
                slot += 1;
            }
            frame_slots.push(names);
        }
        Ok((frames, frame_slots))
    }

    fn rom_load_blocksets(rom: &Rom) -> DataResult<(EntryMap<Blockset>, Vec<String>)> {
        const STEP: &str = "blockset data";
        Self::rom_load_pointer_items(
            rom,
            "Rooms::Blocksets",
            STEP,
            labels::ROOM_BLOCKSET_LABEL,
            labels::ROOM_BLOCKSET_FILE,
            |bytes| Ok(Blockset::decode(bytes)?.0),
        )
    }

    fn rom_load_pointer_items<T: AssetBlob>(
        rom: &Rom,
        section_label: &'static str,
        step: &'static str,
        name_template: &str,
        file_template: &str,
        decode: impl Fn(&[u8]) -> DataResult<T>,
    ) -> DataResult<(EntryMap<T>, Vec<String>)> {
        let section = load_context(rom.get_section(section_label), SUBSYSTEM, step)?;
        let pointers = load_context(read_pointer_table(rom, section), SUBSYSTEM, step)?;
        let slices = load_context(
            slice_pointer_table(&pointers, section.end),
            SUBSYSTEM,
            step,
        )?;
        let mut entries = EntryMap::new();
        for (item, &(begin, end)) in slices.items.iter().enumerate() {
            let bytes = load_context(
                rom.read_bytes(begin, (end - begin) as usize),
                SUBSYSTEM,
                step,
            )?;
            let decoded = decode(&bytes)?;
            let entry = Entry::new(
                format_index(name_template, item),
                format_index(file_template, item),
                Some(begin),
                decoded,
            );
            insert_unique(&mut entries, entry)?;
        }
        let mut slots = Vec::with_capacity(slices.index.len());
        for &item in &slices.index {
            let (name, _) = entries.get_index(item).ok_or_else(|| {
                DataError::consistency(format!("item {item} out of range"))
            })?;
            slots.push(name.clone());
        }
        Ok((entries, slots))
    }

    fn rom_load_palettes(rom: &Rom, rooms: &[RoomRecord]) -> DataResult<EntryMap<Palette>> {
        const STEP: &str = "room palettes";
        let section = load_context(rom.get_section("Rooms::Palettes"), SUBSYSTEM, STEP)?;
        let kind = PaletteKind::Room;
        // No stored count; it comes from the highest palette a room uses
        let count = rooms
            .iter()
            .map(|r| usize::from(r.palette) + 1)
            .max()
            .unwrap_or(0);
        let mut palettes = EntryMap::new();
        for i in 0..count {
            let addr = section.begin + (i * kind.byte_len()) as u32;
            let bytes = load_context(rom.read_bytes(addr, kind.byte_len()), SUBSYSTEM, STEP)?;
            let palette = load_context(Palette::decode(kind, &bytes), SUBSYSTEM, STEP)?;
            let entry = Entry::new(
                format_index(labels::ROOM_PALETTE_LABEL, i),
                format_index(labels::ROOM_PALETTE_FILE, i),
                Some(addr),
                palette,
            );
            insert_unique(&mut palettes, entry)?;
        }
        Ok(palettes)
    }

    fn rom_load_table<const N: usize, T>(
        rom: &Rom,
        section_label: &'static str,
        from_bytes: impl Fn(&[u8; N]) -> T,
    ) -> DataResult<Vec<T>> {
        const STEP: &str = "room flag tables";
        let bytes = load_context(rom.section_bytes(section_label), SUBSYSTEM, STEP)?;
        Ok(deserialise_fixed_width::<N>(&bytes).iter().map(from_bytes).collect())
    }

    // ---- assembly-tree sub-loaders ----

    fn asm_read_bin(
        base_dir: &Path,
        index: &mut AsmFile,
        id: DataFileId,
        step: &'static str,
    ) -> DataResult<Vec<u8>> {
        let spec = data_file(id);
        load_context(index.goto(spec.label), SUBSYSTEM, step)?;
        let include = load_context(index.read_include(), SUBSYSTEM, step)?;
        load_context(std::fs::read(base_dir.join(include.path)), SUBSYSTEM, step)
    }

    fn asm_load_rooms(base_dir: &Path, index: &mut AsmFile) -> DataResult<Vec<RoomRecord>> {
        const STEP: &str = "room table";
        let bytes = Self::asm_read_bin(base_dir, index, DataFileId::RoomTable, STEP)?;
        Ok(deserialise_fixed_width::<{ RoomRecord::WIDTH }>(&bytes)
            .iter()
            .map(RoomRecord::from_bytes)
            .collect())
    }

    fn asm_load_tilesets(
        base_dir: &Path,
        index: &mut AsmFile,
    ) -> DataResult<(EntryMap<Tileset>, Vec<String>)> {
        const STEP: &str = "tileset data";
        let entries = Self::asm_load_entry_list(
            base_dir,
            index,
            DataFileId::RoomTilesetList,
            STEP,
            |bytes| Ok(Tileset::decode(bytes)?.0),
        )?;
        let slots =
            Self::asm_load_slots(base_dir, index, DataFileId::RoomTilesetSlots, STEP, &entries)?;
        Ok((entries, slots))
    }

    fn asm_load_anim_headers(
        base_dir: &Path,
        index: &mut AsmFile,
    ) -> DataResult<Vec<AnimatedTilesetHeader>> {
        const STEP: &str = "animated tileset headers";
        let bytes = Self::asm_read_bin(base_dir, index, DataFileId::RoomAnimTilesetHeaders, STEP)?;
        Ok(
            deserialise_fixed_width::<{ AnimatedTilesetHeader::WIDTH }>(&bytes)
                .iter()
                .map(AnimatedTilesetHeader::from_bytes)
                .collect(),
        )
    }

    fn asm_load_anim_frames(
        base_dir: &Path,
        index: &mut AsmFile,
        headers: &[AnimatedTilesetHeader],
    ) -> DataResult<(EntryMap<AnimatedTileset>, Vec<Vec<String>>)> {
        const STEP: &str = "animated tileset frames";
        let entries = Self::asm_load_entry_list(
            base_dir,
            index,
            DataFileId::RoomAnimTilesetList,
            STEP,
            |bytes| Ok(AnimatedTileset::decode(bytes)?),
        )?;
        let flat =
            Self::asm_load_slots(base_dir, index, DataFileId::RoomAnimTilesetSlots, STEP, &entries)?;
        let total_slots: usize = headers.iter().map(|h| usize::from(h.frame_count)).sum();
        if flat.len() != total_slots {
            return Err(DataError::load(
                SUBSYSTEM,
                STEP,
                format!(
                    "headers claim {total_slots} frame slot(s), slot file holds {}",
                    flat.len()
                ),
            ));
        }
        let mut frame_slots = Vec::with_capacity(headers.len());
        let mut cursor = flat.into_iter();
        for header in headers {
            frame_slots.push(cursor.by_ref().take(usize::from(header.frame_count)).collect());
        }
        Ok((entries, frame_slots))
    }

    fn asm_load_blocksets(
        base_dir: &Path,
        index: &mut AsmFile,
    ) -> DataResult<(EntryMap<Blockset>, Vec<String>)> {
        const STEP: &str = "blockset data";
        let entries = Self::asm_load_entry_list(
            base_dir,
            index,
            DataFileId::RoomBlocksetList,
            STEP,
            |bytes| Ok(Blockset::decode(bytes)?.0),
        )?;
        let slots =
            Self::asm_load_slots(base_dir, index, DataFileId::RoomBlocksetSlots, STEP, &entries)?;
        Ok((entries, slots))
    }

    /// Read a `label` + `incbin` list file into an entry map, in file
    /// order
    fn asm_load_entry_list<T: AssetBlob>(
        base_dir: &Path,
        index: &mut AsmFile,
        id: DataFileId,
        step: &'static str,
        decode: impl Fn(&[u8]) -> DataResult<T>,
    ) -> DataResult<EntryMap<T>> {
        let spec = data_file(id);
        load_context(index.goto(spec.label), SUBSYSTEM, step)?;
        let list_path = load_context(index.read_include(), SUBSYSTEM, step)?.path;
        let mut list = load_context(AsmFile::load(&base_dir.join(list_path)), SUBSYSTEM, step)?;
        let mut entries = EntryMap::new();
        while list.is_good() {
            let name = load_context(list.read_label(), SUBSYSTEM, step)?;
            let include = load_context(list.read_include(), SUBSYSTEM, step)?;
            let bytes =
                load_context(std::fs::read(base_dir.join(&include.path)), SUBSYSTEM, step)?;
            let decoded = decode(&bytes)?;
            insert_unique(&mut entries, Entry::new(name, include.path, None, decoded))?;
        }
        Ok(entries)
    }

    /// Read a slot file (entry indices, `0xFF` terminated) back into
    /// entry names
    fn asm_load_slots<T: AssetBlob>(
        base_dir: &Path,
        index: &mut AsmFile,
        id: DataFileId,
        step: &'static str,
        entries: &EntryMap<T>,
    ) -> DataResult<Vec<String>> {
        let bytes = Self::asm_read_bin(base_dir, index, id, step)?;
        let mut slots = Vec::new();
        for record in deserialise_fixed_width::<1>(&bytes) {
            let item = usize::from(record[0]);
            let (name, _) = entries.get_index(item).ok_or_else(|| {
                DataError::consistency(format!("slot references missing item {item}"))
            })?;
            slots.push(name.clone());
        }
        Ok(slots)
    }

    fn asm_load_palettes(base_dir: &Path, index: &mut AsmFile) -> DataResult<EntryMap<Palette>> {
        const STEP: &str = "room palettes";
        load_context(index.goto("RoomPaletteCount"), SUBSYSTEM, STEP)?;
        let count = load_context(index.read_value(), SUBSYSTEM, STEP)? as usize;
        let mut palettes = EntryMap::new();
        for i in 0..count {
            let rel = format_index(labels::ROOM_PALETTE_FILE, i);
            let bytes = load_context(std::fs::read(base_dir.join(&rel)), SUBSYSTEM, STEP)?;
            let palette =
                load_context(Palette::decode(PaletteKind::Room, &bytes), SUBSYSTEM, STEP)?;
            insert_unique(
                &mut palettes,
                Entry::new(format_index(labels::ROOM_PALETTE_LABEL, i), rel, None, palette),
            )?;
        }
        Ok(palettes)
    }

    fn asm_load_table<const N: usize, T>(
        base_dir: &Path,
        index: &mut AsmFile,
        id: DataFileId,
        from_bytes: impl Fn(&[u8; N]) -> T,
    ) -> DataResult<Vec<T>> {
        const STEP: &str = "room flag tables";
        let bytes = Self::asm_read_bin(base_dir, index, id, STEP)?;
        Ok(deserialise_fixed_width::<N>(&bytes).iter().map(from_bytes).collect())
    }

    // ---- serialisation helpers ----

    fn room_table_bytes(&self) -> Vec<u8> {
        let records: Vec<_> = self.rooms.get().iter().map(|r| r.to_bytes()).collect();
        serialise_fixed_width(&records, true)
    }

    fn anim_header_bytes(&self) -> Vec<u8> {
        let records: Vec<_> = self.anim_headers.get().iter().map(|h| h.to_bytes()).collect();
        serialise_fixed_width(&records, true)
    }

    fn table_bytes<const N: usize, T: Copy>(
        records: &[T],
        to_bytes: impl Fn(T) -> [u8; N],
    ) -> Vec<u8> {
        let records: Vec<_> = records.iter().map(|&r| to_bytes(r)).collect();
        serialise_fixed_width(&records, true)
    }

    fn slot_bytes<T: AssetBlob>(
        entries: &EntryMap<T>,
        slots: &[String],
    ) -> DataResult<Vec<u8>> {
        let mut records = Vec::with_capacity(slots.len());
        for name in slots {
            let item = entries.get_index_of(name).ok_or_else(|| {
                DataError::consistency(format!("dangling slot name: {name}"))
            })?;
            records.push([item as u8]);
        }
        Ok(serialise_fixed_width(&records, true))
    }

    /// Lay out a shared-item pointer section: one pointer per slot up
    /// front, each distinct item once, in first-use order
    fn pointer_section_bytes<T: AssetBlob>(
        entries: &EntryMap<T>,
        slots: &[String],
        section_begin: u32,
    ) -> DataResult<Vec<u8>> {
        let data_base = section_begin + (slots.len() * 4) as u32;
        let mut builder = PointerTableBuilder::new(data_base, true);
        let mut placed: BTreeMap<&str, u32> = BTreeMap::new();
        let mut pointers = Vec::with_capacity(slots.len());
        for name in slots {
            let pointer = match placed.get(name.as_str()) {
                Some(&pointer) => pointer,
                None => {
                    let entry = entries.get(name).ok_or_else(|| {
                        DataError::consistency(format!("dangling slot name: {name}"))
                    })?;
                    let bytes = entry.encode()?;
                    let pointer = builder.push(&bytes);
                    placed.insert(name.as_str(), pointer);
                    pointer
                }
            };
            pointers.push(pointer);
        }
        let (_, blob) = builder.finish();
        let mut out = Vec::with_capacity(slots.len() * 4 + blob.len());
        for pointer in pointers {
            out.extend_from_slice(&pointer.to_be_bytes());
        }
        out.extend_from_slice(&blob);
        Ok(out)
    }

    /// Dangling room references are caught before anything is queued
    fn check_room_references(&self) -> DataResult<()> {
        for (i, room) in self.rooms.get().iter().enumerate() {
            if usize::from(room.tileset) >= self.tileset_slots.get().len() {
                return Err(DataError::consistency(format!(
                    "room {i} references missing tileset slot {}",
                    room.tileset
                )));
            }
            if usize::from(room.blockset) >= self.blockset_slots.get().len() {
                return Err(DataError::consistency(format!(
                    "room {i} references missing blockset slot {}",
                    room.blockset
                )));
            }
            if usize::from(room.palette) >= self.palettes.len() {
                return Err(DataError::consistency(format!(
                    "room {i} references missing palette {}",
                    room.palette
                )));
            }
        }
        Ok(())
    }

    // ---- assembly-tree save ----

    fn asm_save_entry_list<T: AssetBlob>(
        &self,
        dir: &Path,
        entries: &EntryMap<T>,
        list_id: DataFileId,
        title: &str,
        step: &'static str,
    ) -> DataResult<()> {
        let ok = entries.values().all(|entry| entry.save(dir).is_ok());
        if !ok {
            return Err(DataError::save(SUBSYSTEM, step));
        }
        let spec = data_file(list_id);
        let mut list = AsmFile::new(spec.path);
        for entry in entries.values() {
            list.write_label(entry.name());
            list.write_include(entry.filename(), IncludeKind::Binary);
        }
        list.save(&dir.join(spec.path), title)
            .map_err(|_| DataError::save(SUBSYSTEM, step))
    }
}

impl DataManager for RoomData {
    fn is_modified(&self) -> bool {
        any_changed(&self.tilesets)
            || any_changed(&self.anim_tilesets)
            || any_changed(&self.blocksets)
            || any_changed(&self.palettes)
            || self.rooms.is_dirty()
            || self.tileset_slots.is_dirty()
            || self.anim_headers.is_dirty()
            || self.anim_frame_slots.is_dirty()
            || self.blockset_slots.is_dirty()
            || self.warps.is_dirty()
            || self.doors.is_dirty()
            || self.chests.is_dirty()
            || self.tile_swaps.is_dirty()
            || self.clear_flags.is_dirty()
            || self.sacred_trees.is_dirty()
            || self.tree_warps.is_dirty()
    }

    fn commit_all_changes(&mut self) {
        commit_all(&mut self.tilesets);
        commit_all(&mut self.anim_tilesets);
        commit_all(&mut self.blocksets);
        commit_all(&mut self.palettes);
        self.rooms.commit();
        self.tileset_slots.commit();
        self.anim_headers.commit();
        self.anim_frame_slots.commit();
        self.blockset_slots.commit();
        self.warps.commit();
        self.doors.commit();
        self.chests.commit();
        self.tile_swaps.commit();
        self.clear_flags.commit();
        self.sacred_trees.commit();
        self.tree_warps.commit();
        self.pending_writes.clear();
    }

    fn save(&mut self, dir: &Path) -> DataResult<()> {
        self.check_room_references()?;

        // Fixed ordering: room table, tilesets, animated tilesets,
        // blocksets, palettes, flag tables, index
        write_data_file(dir, data_file(DataFileId::RoomTable).path, &self.room_table_bytes())
            .map_err(|_| DataError::save(SUBSYSTEM, "room table"))?;

        self.asm_save_entry_list(
            dir,
            &self.tilesets,
            DataFileId::RoomTilesetList,
            "Room tileset includes",
            "tileset data",
        )?;
        write_data_file(
            dir,
            data_file(DataFileId::RoomTilesetSlots).path,
            &Self::slot_bytes(&self.tilesets, self.tileset_slots.get())?,
        )
        .map_err(|_| DataError::save(SUBSYSTEM, "tileset data"))?;

        write_data_file(
            dir,
            data_file(DataFileId::RoomAnimTilesetHeaders).path,
            &self.anim_header_bytes(),
        )
        .map_err(|_| DataError::save(SUBSYSTEM, "animated tileset headers"))?;
        self.asm_save_entry_list(
            dir,
            &self.anim_tilesets,
            DataFileId::RoomAnimTilesetList,
            "Animated tileset includes",
            "animated tileset frames",
        )?;
        let flat: Vec<String> = self
            .anim_frame_slots
            .get()
            .iter()
            .flat_map(|names| names.iter().cloned())
            .collect();
        write_data_file(
            dir,
            data_file(DataFileId::RoomAnimTilesetSlots).path,
            &Self::slot_bytes(&self.anim_tilesets, &flat)?,
        )
        .map_err(|_| DataError::save(SUBSYSTEM, "animated tileset frames"))?;

        self.asm_save_entry_list(
            dir,
            &self.blocksets,
            DataFileId::RoomBlocksetList,
            "Room blockset includes",
            "blockset data",
        )?;
        write_data_file(
            dir,
            data_file(DataFileId::RoomBlocksetSlots).path,
            &Self::slot_bytes(&self.blocksets, self.blockset_slots.get())?,
        )
        .map_err(|_| DataError::save(SUBSYSTEM, "blockset data"))?;

        let ok = self.palettes.values().all(|entry| entry.save(dir).is_ok());
        if !ok {
            return Err(DataError::save(SUBSYSTEM, "room palettes"));
        }

        for (id, bytes) in [
            (DataFileId::RoomWarps, Self::table_bytes(self.warps.get(), Warp::to_bytes)),
            (DataFileId::RoomDoors, Self::table_bytes(self.doors.get(), Door::to_bytes)),
            (DataFileId::RoomChests, Self::table_bytes(self.chests.get(), Chest::to_bytes)),
            (
                DataFileId::RoomTileSwaps,
                Self::table_bytes(self.tile_swaps.get(), TileSwapFlag::to_bytes),
            ),
            (
                DataFileId::RoomClearFlags,
                Self::table_bytes(self.clear_flags.get(), RoomClearFlag::to_bytes),
            ),
            (
                DataFileId::RoomSacredTrees,
                Self::table_bytes(self.sacred_trees.get(), SacredTreeFlag::to_bytes),
            ),
            (
                DataFileId::RoomTreeWarps,
                Self::table_bytes(self.tree_warps.get(), TreeWarpFlag::to_bytes),
            ),
        ] {
            write_data_file(dir, data_file(id).path, &bytes)
                .map_err(|_| DataError::save(SUBSYSTEM, "room flag tables"))?;
        }

        let mut index = AsmFile::new(data_file(DataFileId::RoomIndex).path);
        index.write_label(data_file(DataFileId::RoomTable).label);
        index.write_include(data_file(DataFileId::RoomTable).path, IncludeKind::Binary);
        index.write_label(data_file(DataFileId::RoomTilesetList).label);
        index.write_include(data_file(DataFileId::RoomTilesetList).path, IncludeKind::Assembler);
        index.write_label(data_file(DataFileId::RoomTilesetSlots).label);
        index.write_include(data_file(DataFileId::RoomTilesetSlots).path, IncludeKind::Binary);
        index.write_label(data_file(DataFileId::RoomAnimTilesetHeaders).label);
        index.write_include(
            data_file(DataFileId::RoomAnimTilesetHeaders).path,
            IncludeKind::Binary,
        );
        index.write_label(data_file(DataFileId::RoomAnimTilesetList).label);
        index.write_include(
            data_file(DataFileId::RoomAnimTilesetList).path,
            IncludeKind::Assembler,
        );
        index.write_label(data_file(DataFileId::RoomAnimTilesetSlots).label);
        index.write_include(
            data_file(DataFileId::RoomAnimTilesetSlots).path,
            IncludeKind::Binary,
        );
        index.write_label(data_file(DataFileId::RoomBlocksetList).label);
        index.write_include(data_file(DataFileId::RoomBlocksetList).path, IncludeKind::Assembler);
        index.write_label(data_file(DataFileId::RoomBlocksetSlots).label);
        index.write_include(data_file(DataFileId::RoomBlocksetSlots).path, IncludeKind::Binary);
        index.write_label("RoomPaletteCount");
        index.write_value(self.palettes.len() as u32, Width::Word);
        for id in [
            DataFileId::RoomWarps,
            DataFileId::RoomDoors,
            DataFileId::RoomChests,
            DataFileId::RoomTileSwaps,
            DataFileId::RoomClearFlags,
            DataFileId::RoomSacredTrees,
            DataFileId::RoomTreeWarps,
        ] {
            index.write_label(data_file(id).label);
            index.write_include(data_file(id).path, IncludeKind::Binary);
        }
        index
            .save(&dir.join(data_file(DataFileId::RoomIndex).path), "Room data index")
            .map_err(|_| DataError::save(SUBSYSTEM, "room index"))?;

        self.base_dir = Some(dir.to_path_buf());
        self.commit_all_changes();
        Ok(())
    }

    fn refresh_pending_writes(&mut self, rom: &Rom) -> DataResult<()> {
        self.pending_writes.clear();
        self.check_room_references()?;

        let table = self.room_table_bytes();
        let section = rom.get_section("Rooms::RoomTable")?;
        check_section_fit("Rooms::RoomTable", table.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Rooms::RoomTable", table));

        let section = rom.get_section("Rooms::Tilesets")?;
        let bytes =
            Self::pointer_section_bytes(&self.tilesets, self.tileset_slots.get(), section.begin)?;
        check_section_fit("Rooms::Tilesets", bytes.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Rooms::Tilesets", bytes));

        let headers = self.anim_header_bytes();
        let section = rom.get_section("Rooms::AnimTilesetHeaders")?;
        check_section_fit("Rooms::AnimTilesetHeaders", headers.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Rooms::AnimTilesetHeaders", headers));

        let flat: Vec<String> = self
            .anim_frame_slots
            .get()
            .iter()
            .flat_map(|names| names.iter().cloned())
            .collect();
        let section = rom.get_section("Rooms::AnimTilesetFrames")?;
        let bytes = Self::pointer_section_bytes(&self.anim_tilesets, &flat, section.begin)?;
        check_section_fit("Rooms::AnimTilesetFrames", bytes.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Rooms::AnimTilesetFrames", bytes));

        let section = rom.get_section("Rooms::Blocksets")?;
        let bytes =
            Self::pointer_section_bytes(&self.blocksets, self.blockset_slots.get(), section.begin)?;
        check_section_fit("Rooms::Blocksets", bytes.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Rooms::Blocksets", bytes));

        let mut palettes = Vec::new();
        for entry in self.palettes.values() {
            palettes.extend(entry.encode()?);
        }
        let section = rom.get_section("Rooms::Palettes")?;
        check_section_fit("Rooms::Palettes", palettes.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Rooms::Palettes", palettes));

        for (label, bytes) in [
            ("Rooms::Warps", Self::table_bytes(self.warps.get(), Warp::to_bytes)),
            ("Rooms::Doors", Self::table_bytes(self.doors.get(), Door::to_bytes)),
            ("Rooms::Chests", Self::table_bytes(self.chests.get(), Chest::to_bytes)),
            (
                "Rooms::TileSwaps",
                Self::table_bytes(self.tile_swaps.get(), TileSwapFlag::to_bytes),
            ),
            (
                "Rooms::ClearFlags",
                Self::table_bytes(self.clear_flags.get(), RoomClearFlag::to_bytes),
            ),
            (
                "Rooms::SacredTrees",
                Self::table_bytes(self.sacred_trees.get(), SacredTreeFlag::to_bytes),
            ),
            (
                "Rooms::TreeWarps",
                Self::table_bytes(self.tree_warps.get(), TreeWarpFlag::to_bytes),
            ),
        ] {
            let section = rom.get_section(label)?;
            check_section_fit(label, bytes.len(), section.len())?;
            self.pending_writes.push(PendingWrite::new(label, bytes));
        }
        Ok(())
    }

    fn pending_writes(&self) -> &[PendingWrite] {
        &self.pending_writes
    }
}
