//! Sprite subsystem: frames, animations, palettes, visibility flags
//!
//! The frame pointer table is the canonical min-pointer-slicing
//! customer: it stores one 32-bit pointer per animation frame slot, two
//! slots routinely share one frame, and nothing stores frame lengths.
//! Animations are plain lists of frame slots; in memory they become
//! lists of frame entry names so sharing survives editing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use landstalker_format::bytes::{deserialise_fixed_width, serialise_fixed_width, serialise_map, deserialise_map};
use landstalker_format::{Palette, PaletteKind, PointerTableBuilder, SpriteFrame, slice_pointer_table};

use crate::asm::{AsmFile, IncludeKind, Width};
use crate::entry::{Entry, EntryMap, SpriteFrameEntry, any_changed, commit_all, insert_unique};
use crate::error::{DataError, DataResult, Subsystem, load_context};
use crate::flags::EntityVisibilityFlag;
use crate::labels::{self, DataFileId, data_file, format_index};
use crate::manager::{DataManager, PendingWrite, check_section_fit, read_pointer_table};
use crate::rom::Rom;
use crate::tracked::Tracked;

const SUBSYSTEM: Subsystem = Subsystem::Sprite;

/// Serialise the palette lookup: one map record per sprite holding its
/// low and high palette index, `0xFF` in a side that has no assignment.
pub fn serialise_palette_lut(lo: &BTreeMap<u8, u8>, hi: &BTreeMap<u8, u8>) -> Vec<u8> {
    let mut merged: BTreeMap<u8, [u8; 2]> = BTreeMap::new();
    for (&sprite, &palette) in lo {
        merged.entry(sprite).or_insert([0xFF, 0xFF])[0] = palette;
    }
    for (&sprite, &palette) in hi {
        merged.entry(sprite).or_insert([0xFF, 0xFF])[1] = palette;
    }
    serialise_map(&merged)
}

/// Inverse of [`serialise_palette_lut`]; one-sided records populate only
/// the matching map.
pub fn deserialise_palette_lut(bytes: &[u8]) -> (BTreeMap<u8, u8>, BTreeMap<u8, u8>) {
    let mut lo = BTreeMap::new();
    let mut hi = BTreeMap::new();
    for (sprite, value) in deserialise_map::<2>(bytes) {
        if value[0] != 0xFF {
            lo.insert(sprite, value[0]);
        }
        if value[1] != 0xFF {
            hi.insert(sprite, value[1]);
        }
    }
    (lo, hi)
}

pub struct SpriteData {
    base_dir: Option<PathBuf>,
    frames: EntryMap<SpriteFrame>,
    /// Animation -> ordered frame entry names
    animations: Tracked<Vec<Vec<String>>>,
    lo_palette_lookup: Tracked<BTreeMap<u8, u8>>,
    hi_palette_lookup: Tracked<BTreeMap<u8, u8>>,
    lo_palettes: EntryMap<Palette>,
    hi_palettes: EntryMap<Palette>,
    visibility_flags: Tracked<Vec<EntityVisibilityFlag>>,
    pending_writes: Vec<PendingWrite>,
}

impl SpriteData {
    /// Construct from a ROM image. Any failing sub-loader aborts the
    /// whole construction.
    pub fn from_rom(rom: &Rom) -> DataResult<Self> {
        let counts = Self::rom_load_animation_counts(rom)?;
        let (frames, animations) = Self::rom_load_frames(rom, &counts)?;
        let (lo_palette_lookup, hi_palette_lookup) = Self::rom_load_palette_lut(rom)?;
        let lo_palettes = Self::rom_load_palettes(
            rom,
            "Sprites::LoPalettes",
            PaletteKind::SpriteLow,
            &lo_palette_lookup,
            labels::SPRITE_LO_PALETTE_LABEL,
            labels::SPRITE_LO_PALETTE_FILE,
        )?;
        let hi_palettes = Self::rom_load_palettes(
            rom,
            "Sprites::HiPalettes",
            PaletteKind::SpriteHigh,
            &hi_palette_lookup,
            labels::SPRITE_HI_PALETTE_LABEL,
            labels::SPRITE_HI_PALETTE_FILE,
        )?;
        let visibility_flags = Self::rom_load_visibility_flags(rom)?;
        Ok(Self {
            base_dir: None,
            frames,
            animations: Tracked::new(animations),
            lo_palette_lookup: Tracked::new(lo_palette_lookup),
            hi_palette_lookup: Tracked::new(hi_palette_lookup),
            lo_palettes,
            hi_palettes,
            visibility_flags: Tracked::new(visibility_flags),
            pending_writes: Vec::new(),
        })
    }

    /// Construct from an assembly tree rooted at `base_dir`
    pub fn from_asm(base_dir: &Path) -> DataResult<Self> {
        let index_path = base_dir.join(data_file(DataFileId::SpriteIndex).path);
        let mut index = load_context(AsmFile::load(&index_path), SUBSYSTEM, "sprite index")?;
        let frames = Self::asm_load_frames(base_dir, &mut index)?;
        let animations = Self::asm_load_animations(base_dir, &mut index, &frames)?;
        let (lo_palette_lookup, hi_palette_lookup) =
            Self::asm_load_palette_lut(base_dir, &mut index)?;
        let lo_palettes = Self::asm_load_palettes(
            base_dir,
            &mut index,
            "SpriteLoPaletteCount",
            PaletteKind::SpriteLow,
            labels::SPRITE_LO_PALETTE_LABEL,
            labels::SPRITE_LO_PALETTE_FILE,
        )?;
        let hi_palettes = Self::asm_load_palettes(
            base_dir,
            &mut index,
            "SpriteHiPaletteCount",
            PaletteKind::SpriteHigh,
            labels::SPRITE_HI_PALETTE_LABEL,
            labels::SPRITE_HI_PALETTE_FILE,
        )?;
        let visibility_flags = Self::asm_load_visibility_flags(base_dir, &mut index)?;
        Ok(Self {
            base_dir: Some(base_dir.to_path_buf()),
            frames,
            animations: Tracked::new(animations),
            lo_palette_lookup: Tracked::new(lo_palette_lookup),
            hi_palette_lookup: Tracked::new(hi_palette_lookup),
            lo_palettes,
            hi_palettes,
            visibility_flags: Tracked::new(visibility_flags),
            pending_writes: Vec::new(),
        })
    }

    // ---- accessors ----

    /// Assembly tree this was loaded from or last saved to
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn frames(&self) -> &EntryMap<SpriteFrame> {
        &self.frames
    }

    pub fn frame_mut(&mut self, name: &str) -> DataResult<&mut SpriteFrameEntry> {
        self.frames
            .get_mut(name)
            .ok_or_else(|| DataError::consistency(format!("dangling frame name: {name}")))
    }

    pub fn animations(&self) -> &[Vec<String>] {
        self.animations.get()
    }

    pub fn animations_mut(&mut self) -> &mut Vec<Vec<String>> {
        self.animations.get_mut()
    }

    pub fn lo_palette_lookup(&self) -> &BTreeMap<u8, u8> {
        self.lo_palette_lookup.get()
    }

    pub fn hi_palette_lookup(&self) -> &BTreeMap<u8, u8> {
        self.hi_palette_lookup.get()
    }

    pub fn visibility_flags(&self) -> &[EntityVisibilityFlag] {
        self.visibility_flags.get()
    }

    pub fn visibility_flags_mut(&mut self) -> &mut Vec<EntityVisibilityFlag> {
        self.visibility_flags.get_mut()
    }

    // ---- ROM sub-loaders ----

    fn rom_load_animation_counts(rom: &Rom) -> DataResult<Vec<usize>> {
        const STEP: &str = "sprite animation data";
        let bytes = load_context(rom.section_bytes("Sprites::Animations"), SUBSYSTEM, STEP)?;
        Ok(deserialise_fixed_width::<1>(&bytes)
            .into_iter()
            .map(|count| usize::from(count[0]))
            .collect())
    }

    fn rom_load_frames(
        rom: &Rom,
        counts: &[usize],
    ) -> DataResult<(EntryMap<SpriteFrame>, Vec<Vec<String>>)> {
        const STEP: &str = "sprite frame data";
        let section = load_context(rom.get_section("Sprites::Frames"), SUBSYSTEM, STEP)?;
        let pointers = load_context(read_pointer_table(rom, section), SUBSYSTEM, STEP)?;
        let total_slots: usize = counts.iter().sum();
        if pointers.len() != total_slots {
            return Err(DataError::load(
                SUBSYSTEM,
                STEP,
                format!(
                    "animation table claims {total_slots} frame slot(s), pointer table holds {}",
                    pointers.len()
                ),
            ));
        }
        let slices = load_context(
            slice_pointer_table(&pointers, section.end),
            SUBSYSTEM,
            STEP,
        )?;

        let mut frames = EntryMap::new();
        for (item, &(begin, end)) in slices.items.iter().enumerate() {
            let bytes = load_context(
                rom.read_bytes(begin, (end - begin) as usize),
                SUBSYSTEM,
                STEP,
            )?;
            let (frame, _) = load_context(SpriteFrame::decode(&bytes), SUBSYSTEM, STEP)?;
            let entry = Entry::new(
                format_index(labels::SPRITE_FRAME_LABEL, item),
                format_index(labels::SPRITE_FRAME_FILE, item),
                Some(begin),
                frame,
            );
            insert_unique(&mut frames, entry)?;
        }

        // Resolve each slot back to its (possibly shared) frame name
        let mut animations = Vec::with_capacity(counts.len());
        let mut slot = 0;
        for &count in counts {
            let mut names = Vec::with_capacity(count);
            for _ in 0..count {
                let item = slices.index[slot];
                let (name, _) = frames.get_index(item).ok_or_else(|| {
                    DataError::consistency(format!("frame item {item} out of range"))
                })?;
                names.push(name.clone());
                slot += 1;
            }
            animations.push(names);
        }
        Ok((frames, animations))
    }

    fn rom_load_palette_lut(rom: &Rom) -> DataResult<(BTreeMap<u8, u8>, BTreeMap<u8, u8>)> {
        const STEP: &str = "sprite palette lookup";
        let bytes = load_context(rom.section_bytes("Sprites::PaletteLUT"), SUBSYSTEM, STEP)?;
        Ok(deserialise_palette_lut(&bytes))
    }

    fn rom_load_palettes(
        rom: &Rom,
        section_label: &'static str,
        kind: PaletteKind,
        lookup: &BTreeMap<u8, u8>,
        name_template: &str,
        file_template: &str,
    ) -> DataResult<EntryMap<Palette>> {
        const STEP: &str = "sprite palette data";
        let section = load_context(rom.get_section(section_label), SUBSYSTEM, STEP)?;
        // The palette tables carry no count of their own; it comes from
        // the highest index the lookup assigns
        let count = lookup.values().map(|&p| usize::from(p) + 1).max().unwrap_or(0);
        let mut palettes = EntryMap::new();
        for i in 0..count {
            let addr = section.begin + (i * kind.byte_len()) as u32;
            let bytes = load_context(rom.read_bytes(addr, kind.byte_len()), SUBSYSTEM, STEP)?;
            let palette = load_context(Palette::decode(kind, &bytes), SUBSYSTEM, STEP)?;
            let entry = Entry::new(
                format_index(name_template, i),
                format_index(file_template, i),
                Some(addr),
                palette,
            );
            insert_unique(&mut palettes, entry)?;
        }
        Ok(palettes)
    }

    fn rom_load_visibility_flags(rom: &Rom) -> DataResult<Vec<EntityVisibilityFlag>> {
        const STEP: &str = "entity visibility flags";
        let bytes = load_context(rom.section_bytes("Sprites::VisibilityFlags"), SUBSYSTEM, STEP)?;
        Ok(deserialise_fixed_width::<{ EntityVisibilityFlag::WIDTH }>(&bytes)
            .iter()
            .map(EntityVisibilityFlag::from_bytes)
            .collect())
    }

    // ---- assembly-tree sub-loaders ----

    fn asm_load_frames(base_dir: &Path, index: &mut AsmFile) -> DataResult<EntryMap<SpriteFrame>> {
        const STEP: &str = "sprite frame data";
        index.goto(data_file(DataFileId::SpriteFrameList).label).map_err(step_err(STEP))?;
        let list_path = index.read_include().map_err(step_err(STEP))?.path;
        let mut list =
            load_context(AsmFile::load(&base_dir.join(&list_path)), SUBSYSTEM, STEP)?;
        let mut frames = EntryMap::new();
        while list.is_good() {
            let name = list.read_label().map_err(step_err(STEP))?;
            let include = list.read_include().map_err(step_err(STEP))?;
            let bytes = load_context(
                std::fs::read(base_dir.join(&include.path)),
                SUBSYSTEM,
                STEP,
            )?;
            let (frame, _) = load_context(SpriteFrame::decode(&bytes), SUBSYSTEM, STEP)?;
            insert_unique(&mut frames, Entry::new(name, include.path, None, frame))?;
        }
        Ok(frames)
    }

    fn asm_load_animations(
        base_dir: &Path,
        index: &mut AsmFile,
        frames: &EntryMap<SpriteFrame>,
    ) -> DataResult<Vec<Vec<String>>> {
        const STEP: &str = "sprite animation data";
        index.goto(data_file(DataFileId::SpriteAnimations).label).map_err(step_err(STEP))?;
        let path = index.read_include().map_err(step_err(STEP))?.path;
        let bytes = load_context(std::fs::read(base_dir.join(path)), SUBSYSTEM, STEP)?;
        let mut animations = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() && bytes[pos] != 0xFF {
            let count = usize::from(bytes[pos]);
            pos += 1;
            if pos + count > bytes.len() {
                return Err(DataError::load(SUBSYSTEM, STEP, "truncated animation record"));
            }
            let mut names = Vec::with_capacity(count);
            for &frame_index in &bytes[pos..pos + count] {
                let (name, _) = frames.get_index(usize::from(frame_index)).ok_or_else(|| {
                    DataError::consistency(format!(
                        "animation references missing frame index {frame_index}"
                    ))
                })?;
                names.push(name.clone());
            }
            pos += count;
            animations.push(names);
        }
        Ok(animations)
    }

    fn asm_load_palette_lut(
        base_dir: &Path,
        index: &mut AsmFile,
    ) -> DataResult<(BTreeMap<u8, u8>, BTreeMap<u8, u8>)> {
        const STEP: &str = "sprite palette lookup";
        index.goto(data_file(DataFileId::SpritePaletteLut).label).map_err(step_err(STEP))?;
        let path = index.read_include().map_err(step_err(STEP))?.path;
        let bytes = load_context(std::fs::read(base_dir.join(path)), SUBSYSTEM, STEP)?;
        Ok(deserialise_palette_lut(&bytes))
    }

    fn asm_load_palettes(
        base_dir: &Path,
        index: &mut AsmFile,
        count_label: &str,
        kind: PaletteKind,
        name_template: &str,
        file_template: &str,
    ) -> DataResult<EntryMap<Palette>> {
        const STEP: &str = "sprite palette data";
        index.goto(count_label).map_err(step_err(STEP))?;
        let count = index.read_value().map_err(step_err(STEP))? as usize;
        let mut palettes = EntryMap::new();
        for i in 0..count {
            let rel = format_index(file_template, i);
            let bytes = load_context(std::fs::read(base_dir.join(&rel)), SUBSYSTEM, STEP)?;
            let palette = load_context(Palette::decode(kind, &bytes), SUBSYSTEM, STEP)?;
            insert_unique(
                &mut palettes,
                Entry::new(format_index(name_template, i), rel, None, palette),
            )?;
        }
        Ok(palettes)
    }

    fn asm_load_visibility_flags(
        base_dir: &Path,
        index: &mut AsmFile,
    ) -> DataResult<Vec<EntityVisibilityFlag>> {
        const STEP: &str = "entity visibility flags";
        index.goto(data_file(DataFileId::SpriteVisibilityFlags).label).map_err(step_err(STEP))?;
        let path = index.read_include().map_err(step_err(STEP))?.path;
        let bytes = load_context(std::fs::read(base_dir.join(path)), SUBSYSTEM, STEP)?;
        Ok(deserialise_fixed_width::<{ EntityVisibilityFlag::WIDTH }>(&bytes)
            .iter()
            .map(EntityVisibilityFlag::from_bytes)
            .collect())
    }

    // ---- serialisation helpers shared by save and injection ----

    fn animation_counts(&self) -> Vec<[u8; 1]> {
        self.animations
            .get()
            .iter()
            .map(|frames| [frames.len() as u8])
            .collect()
    }

    fn animation_bytes(&self) -> DataResult<Vec<u8>> {
        let mut out = Vec::new();
        for names in self.animations.get() {
            out.push(names.len() as u8);
            for name in names {
                let index = self.frames.get_index_of(name).ok_or_else(|| {
                    DataError::consistency(format!("dangling frame name: {name}"))
                })?;
                out.push(index as u8);
            }
        }
        out.push(0xFF);
        if out.len() % 2 != 0 {
            out.push(0xFF);
        }
        Ok(out)
    }

    fn visibility_bytes(&self) -> Vec<u8> {
        let records: Vec<_> = self
            .visibility_flags
            .get()
            .iter()
            .map(|f| f.to_bytes())
            .collect();
        serialise_fixed_width(&records, true)
    }

    // ---- assembly-tree save ----

    fn asm_save_frames(&self, dir: &Path) -> DataResult<()> {
        const STEP: &str = "sprite frame data";
        let ok = self.frames.values().all(|entry| entry.save(dir).is_ok());
        if !ok {
            return Err(DataError::save(SUBSYSTEM, STEP));
        }
        let mut list = AsmFile::new(data_file(DataFileId::SpriteFrameList).path);
        for entry in self.frames.values() {
            list.write_label(entry.name());
            list.write_include(entry.filename(), IncludeKind::Binary);
        }
        list.save(
            &dir.join(data_file(DataFileId::SpriteFrameList).path),
            "Sprite frame includes",
        )
        .map_err(|_| DataError::save(SUBSYSTEM, STEP))
    }

    fn asm_save_animations(&self, dir: &Path) -> DataResult<()> {
        const STEP: &str = "sprite animation data";
        let bytes = self.animation_bytes()?;
        write_data_file(dir, data_file(DataFileId::SpriteAnimations).path, &bytes)
            .map_err(|_| DataError::save(SUBSYSTEM, STEP))
    }

    fn asm_save_palettes(&self, dir: &Path) -> DataResult<()> {
        const STEP: &str = "sprite palette data";
        let lut = serialise_palette_lut(self.lo_palette_lookup.get(), self.hi_palette_lookup.get());
        write_data_file(dir, data_file(DataFileId::SpritePaletteLut).path, &lut)
            .map_err(|_| DataError::save(SUBSYSTEM, STEP))?;
        let ok = self
            .lo_palettes
            .values()
            .chain(self.hi_palettes.values())
            .all(|entry| entry.save(dir).is_ok());
        if !ok {
            return Err(DataError::save(SUBSYSTEM, STEP));
        }
        Ok(())
    }

    fn asm_save_visibility_flags(&self, dir: &Path) -> DataResult<()> {
        const STEP: &str = "entity visibility flags";
        write_data_file(
            dir,
            data_file(DataFileId::SpriteVisibilityFlags).path,
            &self.visibility_bytes(),
        )
        .map_err(|_| DataError::save(SUBSYSTEM, STEP))
    }

    fn asm_save_index(&self, dir: &Path) -> DataResult<()> {
        const STEP: &str = "sprite index";
        let mut index = AsmFile::new(data_file(DataFileId::SpriteIndex).path);
        index.write_label(data_file(DataFileId::SpriteFrameList).label);
        index.write_include(data_file(DataFileId::SpriteFrameList).path, IncludeKind::Assembler);
        index.write_label(data_file(DataFileId::SpriteAnimations).label);
        index.write_include(data_file(DataFileId::SpriteAnimations).path, IncludeKind::Binary);
        index.write_label(data_file(DataFileId::SpritePaletteLut).label);
        index.write_include(data_file(DataFileId::SpritePaletteLut).path, IncludeKind::Binary);
        index.write_label("SpriteLoPaletteCount");
        index.write_value(self.lo_palettes.len() as u32, Width::Word);
        index.write_label("SpriteHiPaletteCount");
        index.write_value(self.hi_palettes.len() as u32, Width::Word);
        index.write_label(data_file(DataFileId::SpriteVisibilityFlags).label);
        index.write_include(
            data_file(DataFileId::SpriteVisibilityFlags).path,
            IncludeKind::Binary,
        );
        index
            .save(&dir.join(data_file(DataFileId::SpriteIndex).path), "Sprite data index")
            .map_err(|_| DataError::save(SUBSYSTEM, STEP))
    }

    // ---- ROM injection ----

    fn rom_write_animations(&mut self, rom: &Rom) -> DataResult<()> {
        let counts = serialise_fixed_width(&self.animation_counts(), true);
        let section = rom.get_section("Sprites::Animations")?;
        check_section_fit("Sprites::Animations", counts.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Sprites::Animations", counts));
        Ok(())
    }

    fn rom_write_frames(&mut self, rom: &Rom) -> DataResult<()> {
        const STEP: &str = "sprite frame data";
        let section = rom.get_section("Sprites::Frames")?;
        let total_slots: usize = self.animations.get().iter().map(Vec::len).sum();
        let data_base = section.begin + (total_slots * 4) as u32;

        // Items land in first-use order; a frame referenced twice is
        // emitted once and both slots point at it
        let mut builder = PointerTableBuilder::new(data_base, true);
        let mut placed: BTreeMap<&str, u32> = BTreeMap::new();
        let mut pointers: Vec<u32> = Vec::with_capacity(total_slots);
        for names in self.animations.get() {
            for name in names {
                let pointer = match placed.get(name.as_str()) {
                    Some(&pointer) => pointer,
                    None => {
                        let entry = self.frames.get(name).ok_or_else(|| {
                            DataError::consistency(format!("dangling frame name: {name}"))
                        })?;
                        let bytes =
                            entry.encode().map_err(|_| DataError::save(SUBSYSTEM, STEP))?;
                        let pointer = builder.push(&bytes);
                        placed.insert(name.as_str(), pointer);
                        pointer
                    }
                };
                pointers.push(pointer);
            }
        }
        let (_, blob) = builder.finish();
        let mut out = Vec::with_capacity(total_slots * 4 + blob.len());
        for pointer in pointers {
            out.extend_from_slice(&pointer.to_be_bytes());
        }
        out.extend_from_slice(&blob);
        check_section_fit("Sprites::Frames", out.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Sprites::Frames", out));
        Ok(())
    }

    fn rom_write_palettes(&mut self, rom: &Rom) -> DataResult<()> {
        const STEP: &str = "sprite palette data";
        let lut = serialise_palette_lut(self.lo_palette_lookup.get(), self.hi_palette_lookup.get());
        let section = rom.get_section("Sprites::PaletteLUT")?;
        check_section_fit("Sprites::PaletteLUT", lut.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Sprites::PaletteLUT", lut));

        for (label, palettes) in [
            ("Sprites::LoPalettes", &self.lo_palettes),
            ("Sprites::HiPalettes", &self.hi_palettes),
        ] {
            let mut bytes = Vec::new();
            for entry in palettes.values() {
                bytes.extend(entry.encode().map_err(|_| DataError::save(SUBSYSTEM, STEP))?);
            }
            let section = rom.get_section(label)?;
            check_section_fit(label, bytes.len(), section.len())?;
            self.pending_writes.push(PendingWrite::new(label, bytes));
        }
        Ok(())
    }

    fn rom_write_visibility_flags(&mut self, rom: &Rom) -> DataResult<()> {
        let bytes = self.visibility_bytes();
        let section = rom.get_section("Sprites::VisibilityFlags")?;
        check_section_fit("Sprites::VisibilityFlags", bytes.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Sprites::VisibilityFlags", bytes));
        Ok(())
    }
}

impl DataManager for SpriteData {
    fn is_modified(&self) -> bool {
        any_changed(&self.frames)
            || any_changed(&self.lo_palettes)
            || any_changed(&self.hi_palettes)
            || self.animations.is_dirty()
            || self.lo_palette_lookup.is_dirty()
            || self.hi_palette_lookup.is_dirty()
            || self.visibility_flags.is_dirty()
    }

    fn commit_all_changes(&mut self) {
        commit_all(&mut self.frames);
        commit_all(&mut self.lo_palettes);
        commit_all(&mut self.hi_palettes);
        self.animations.commit();
        self.lo_palette_lookup.commit();
        self.hi_palette_lookup.commit();
        self.visibility_flags.commit();
        self.pending_writes.clear();
    }

    fn save(&mut self, dir: &Path) -> DataResult<()> {
        // Fixed ordering: frames establish names the animation table
        // indexes into, palettes follow the lookup they are counted by
        self.asm_save_frames(dir)?;
        self.asm_save_animations(dir)?;
        self.asm_save_palettes(dir)?;
        self.asm_save_visibility_flags(dir)?;
        self.asm_save_index(dir)?;
        self.base_dir = Some(dir.to_path_buf());
        self.commit_all_changes();
        Ok(())
    }

    fn refresh_pending_writes(&mut self, rom: &Rom) -> DataResult<()> {
        self.pending_writes.clear();
        self.rom_write_animations(rom)?;
        self.rom_write_frames(rom)?;
        self.rom_write_palettes(rom)?;
        self.rom_write_visibility_flags(rom)?;
        Ok(())
    }

    fn pending_writes(&self) -> &[PendingWrite] {
        &self.pending_writes
    }
}

/// Map a sub-step error to a load error without losing the step name
fn step_err(step: &'static str) -> impl Fn(DataError) -> DataError {
    move |source| DataError::load(SUBSYSTEM, step, source.to_string())
}

/// Write a binary data file under the tree, creating directories
pub(crate) fn write_data_file(dir: &Path, rel: &str, bytes: &[u8]) -> DataResult<()> {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_palette_lut_round_trip_with_one_sided_entries() {
        let mut lo = BTreeMap::new();
        let mut hi = BTreeMap::new();
        lo.insert(0x01, 0x00);
        lo.insert(0x02, 0x01); // low only
        hi.insert(0x01, 0x00);
        hi.insert(0x05, 0x02); // high only
        let bytes = serialise_palette_lut(&lo, &hi);
        let (lo2, hi2) = deserialise_palette_lut(&bytes);
        assert_eq!(lo2, lo);
        assert_eq!(hi2, hi);
    }

    #[test]
    fn test_palette_lut_wire_shape() {
        let mut lo = BTreeMap::new();
        lo.insert(0x03, 0x01);
        let bytes = serialise_palette_lut(&lo, &BTreeMap::new());
        // key, lo, hi=unassigned, terminator
        assert_eq!(bytes, vec![0x03, 0x01, 0xFF, 0xFF]);
    }
}
