//! Graphics subsystem: fonts, UI tiles, tilemaps, system palettes
//!
//! The main font doubles as the region probe: its tile count differs
//! per release, and the string codec keys its charset off the deduced
//! region. The two UI tilemaps live back to back in one section and are
//! carved apart by their self-terminating compressed streams.

use std::path::{Path, PathBuf};

use landstalker_format::huffman::{Region, deduce_region};
use landstalker_format::{Palette, PaletteKind, Tilemap2D, Tileset};

use crate::asm::{AsmFile, IncludeKind};
use crate::entry::{Entry, Tilemap2DEntry, TilesetEntry};
use crate::error::{DataError, DataResult, Subsystem, load_context};
use crate::labels::{DataFileId, data_file};
use crate::manager::{DataManager, PendingWrite, check_section_fit};
use crate::rom::Rom;
use crate::sprite_data::write_data_file;
use crate::tracked::Tracked;

const SUBSYSTEM: Subsystem = Subsystem::Graphics;

pub struct GraphicsData {
    base_dir: Option<PathBuf>,
    region: Region,
    main_font: TilesetEntry,
    ui_tiles: TilesetEntry,
    inventory_tiles: TilesetEntry,
    inventory_tilemap: Tilemap2DEntry,
    textbox_tilemap: Tilemap2DEntry,
    system_palettes: Tracked<Vec<Palette>>,
    pending_writes: Vec<PendingWrite>,
}

impl GraphicsData {
    pub fn from_rom(rom: &Rom) -> DataResult<Self> {
        let main_font = Self::rom_load_tileset(rom, "Graphics::MainFont", DataFileId::MainFont)?;
        let region = deduce_region(main_font.decoded().tiles.len());
        let ui_tiles = Self::rom_load_tileset(rom, "Graphics::UiTiles", DataFileId::UiTiles)?;
        let inventory_tiles =
            Self::rom_load_tileset(rom, "Graphics::InventoryTiles", DataFileId::InventoryTiles)?;
        let (inventory_tilemap, textbox_tilemap) = Self::rom_load_tilemaps(rom)?;
        let system_palettes = Self::rom_load_system_palettes(rom)?;
        Ok(Self {
            base_dir: None,
            region,
            main_font,
            ui_tiles,
            inventory_tiles,
            inventory_tilemap,
            textbox_tilemap,
            system_palettes: Tracked::new(system_palettes),
            pending_writes: Vec::new(),
        })
    }

    pub fn from_asm(base_dir: &Path) -> DataResult<Self> {
        let index_path = base_dir.join(data_file(DataFileId::GraphicsIndex).path);
        let mut index = load_context(AsmFile::load(&index_path), SUBSYSTEM, "graphics index")?;
        let main_font = Self::asm_load_tileset(base_dir, &mut index, DataFileId::MainFont)?;
        let region = deduce_region(main_font.decoded().tiles.len());
        let ui_tiles = Self::asm_load_tileset(base_dir, &mut index, DataFileId::UiTiles)?;
        let inventory_tiles =
            Self::asm_load_tileset(base_dir, &mut index, DataFileId::InventoryTiles)?;
        let inventory_tilemap =
            Self::asm_load_tilemap(base_dir, &mut index, DataFileId::InventoryTilemap)?;
        let textbox_tilemap =
            Self::asm_load_tilemap(base_dir, &mut index, DataFileId::TextboxTilemap)?;
        let system_palettes = Self::asm_load_system_palettes(base_dir, &mut index)?;
        Ok(Self {
            base_dir: Some(base_dir.to_path_buf()),
            region,
            main_font,
            ui_tiles,
            inventory_tiles,
            inventory_tilemap,
            textbox_tilemap,
            system_palettes: Tracked::new(system_palettes),
            pending_writes: Vec::new(),
        })
    }

    // ---- accessors ----

    /// Assembly tree this was loaded from or last saved to
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn main_font(&self) -> &TilesetEntry {
        &self.main_font
    }

    pub fn main_font_mut(&mut self) -> &mut TilesetEntry {
        &mut self.main_font
    }

    pub fn ui_tiles(&self) -> &TilesetEntry {
        &self.ui_tiles
    }

    pub fn ui_tiles_mut(&mut self) -> &mut TilesetEntry {
        &mut self.ui_tiles
    }

    pub fn inventory_tiles(&self) -> &TilesetEntry {
        &self.inventory_tiles
    }

    pub fn inventory_tilemap(&self) -> &Tilemap2DEntry {
        &self.inventory_tilemap
    }

    pub fn inventory_tilemap_mut(&mut self) -> &mut Tilemap2DEntry {
        &mut self.inventory_tilemap
    }

    pub fn textbox_tilemap(&self) -> &Tilemap2DEntry {
        &self.textbox_tilemap
    }

    pub fn system_palettes(&self) -> &[Palette] {
        self.system_palettes.get()
    }

    pub fn system_palettes_mut(&mut self) -> &mut Vec<Palette> {
        self.system_palettes.get_mut()
    }

    // ---- ROM sub-loaders ----

    fn rom_load_tileset(
        rom: &Rom,
        section_label: &'static str,
        id: DataFileId,
    ) -> DataResult<TilesetEntry> {
        const STEP: &str = "tile graphics";
        let section = load_context(rom.get_section(section_label), SUBSYSTEM, STEP)?;
        let bytes = load_context(rom.section_bytes(section_label), SUBSYSTEM, STEP)?;
        let (tileset, _) = load_context(Tileset::decode(&bytes), SUBSYSTEM, STEP)?;
        let spec = data_file(id);
        Ok(Entry::new(spec.label, spec.path, Some(section.begin), tileset))
    }

    fn rom_load_tilemaps(rom: &Rom) -> DataResult<(Tilemap2DEntry, Tilemap2DEntry)> {
        const STEP: &str = "tilemap data";
        let section = load_context(rom.get_section("Graphics::Tilemaps"), SUBSYSTEM, STEP)?;
        let bytes = load_context(rom.section_bytes("Graphics::Tilemaps"), SUBSYSTEM, STEP)?;
        // Two maps back to back, each stream knows its own end
        let (inventory, consumed) = load_context(Tilemap2D::decode(&bytes), SUBSYSTEM, STEP)?;
        let (textbox, _) =
            load_context(Tilemap2D::decode(&bytes[consumed..]), SUBSYSTEM, STEP)?;
        let inv_spec = data_file(DataFileId::InventoryTilemap);
        let txt_spec = data_file(DataFileId::TextboxTilemap);
        Ok((
            Entry::new(inv_spec.label, inv_spec.path, Some(section.begin), inventory),
            Entry::new(
                txt_spec.label,
                txt_spec.path,
                Some(section.begin + consumed as u32),
                textbox,
            ),
        ))
    }

    fn rom_load_system_palettes(rom: &Rom) -> DataResult<Vec<Palette>> {
        const STEP: &str = "system palettes";
        let bytes = load_context(rom.section_bytes("Graphics::SystemPalettes"), SUBSYSTEM, STEP)?;
        let kind = PaletteKind::Full;
        let mut palettes = Vec::with_capacity(bytes.len() / kind.byte_len());
        for chunk in bytes.chunks_exact(kind.byte_len()) {
            palettes.push(load_context(Palette::decode(kind, chunk), SUBSYSTEM, STEP)?);
        }
        Ok(palettes)
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

    fn asm_load_tileset(
        base_dir: &Path,
        index: &mut AsmFile,
        id: DataFileId,
    ) -> DataResult<TilesetEntry> {
        const STEP: &str = "tile graphics";
        let bytes = Self::asm_read_bin(base_dir, index, id, STEP)?;
        let (tileset, _) = load_context(Tileset::decode(&bytes), SUBSYSTEM, STEP)?;
        let spec = data_file(id);
        Ok(Entry::new(spec.label, spec.path, None, tileset))
    }

    fn asm_load_tilemap(
        base_dir: &Path,
        index: &mut AsmFile,
        id: DataFileId,
    ) -> DataResult<Tilemap2DEntry> {
        const STEP: &str = "tilemap data";
        let bytes = Self::asm_read_bin(base_dir, index, id, STEP)?;
        let (tilemap, _) = load_context(Tilemap2D::decode(&bytes), SUBSYSTEM, STEP)?;
        let spec = data_file(id);
        Ok(Entry::new(spec.label, spec.path, None, tilemap))
    }

    fn asm_load_system_palettes(base_dir: &Path, index: &mut AsmFile) -> DataResult<Vec<Palette>> {
        const STEP: &str = "system palettes";
        let bytes = Self::asm_read_bin(base_dir, index, DataFileId::SystemPalettes, STEP)?;
        let kind = PaletteKind::Full;
        let mut palettes = Vec::with_capacity(bytes.len() / kind.byte_len());
        for chunk in bytes.chunks_exact(kind.byte_len()) {
            palettes.push(load_context(Palette::decode(kind, chunk), SUBSYSTEM, STEP)?);
        }
        Ok(palettes)
    }

    // ---- serialisation helpers ----

    fn system_palette_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for palette in self.system_palettes.get() {
            bytes.extend(palette.encode());
        }
        bytes
    }

    // ---- ROM injection ----

    fn rom_write_tileset(&mut self, rom: &Rom, section: &'static str, bytes: Vec<u8>) -> DataResult<()> {
        let target = rom.get_section(section)?;
        check_section_fit(section, bytes.len(), target.len())?;
        self.pending_writes.push(PendingWrite::new(section, bytes));
        Ok(())
    }
}

impl DataManager for GraphicsData {
    fn is_modified(&self) -> bool {
        self.main_font.has_data_changed()
            || self.ui_tiles.has_data_changed()
            || self.inventory_tiles.has_data_changed()
            || self.inventory_tilemap.has_data_changed()
            || self.textbox_tilemap.has_data_changed()
            || self.system_palettes.is_dirty()
    }

    fn commit_all_changes(&mut self) {
        self.main_font.commit();
        self.ui_tiles.commit();
        self.inventory_tiles.commit();
        self.inventory_tilemap.commit();
        self.textbox_tilemap.commit();
        self.system_palettes.commit();
        self.pending_writes.clear();
    }

    fn save(&mut self, dir: &Path) -> DataResult<()> {
        // Fixed ordering: fonts, UI tiles, tilemaps, palettes, index
        for entry in [&self.main_font, &self.ui_tiles, &self.inventory_tiles] {
            entry
                .save(dir)
                .map_err(|_| DataError::save(SUBSYSTEM, "tile graphics"))?;
        }
        for entry in [&self.inventory_tilemap, &self.textbox_tilemap] {
            entry
                .save(dir)
                .map_err(|_| DataError::save(SUBSYSTEM, "tilemap data"))?;
        }
        write_data_file(
            dir,
            data_file(DataFileId::SystemPalettes).path,
            &self.system_palette_bytes(),
        )
        .map_err(|_| DataError::save(SUBSYSTEM, "system palettes"))?;

        let mut index = AsmFile::new(data_file(DataFileId::GraphicsIndex).path);
        for id in [
            DataFileId::MainFont,
            DataFileId::UiTiles,
            DataFileId::InventoryTiles,
            DataFileId::InventoryTilemap,
            DataFileId::TextboxTilemap,
            DataFileId::SystemPalettes,
        ] {
            let spec = data_file(id);
            index.write_label(spec.label);
            index.write_include(spec.path, IncludeKind::Binary);
        }
        index
            .save(
                &dir.join(data_file(DataFileId::GraphicsIndex).path),
                "Graphics data index",
            )
            .map_err(|_| DataError::save(SUBSYSTEM, "graphics index"))?;

        self.base_dir = Some(dir.to_path_buf());
        self.commit_all_changes();
        Ok(())
    }

    fn refresh_pending_writes(&mut self, rom: &Rom) -> DataResult<()> {
        self.pending_writes.clear();
        let font = self
            .main_font
            .encode()
            .map_err(|_| DataError::save(SUBSYSTEM, "tile graphics"))?;
        self.rom_write_tileset(rom, "Graphics::MainFont", font)?;
        let ui = self
            .ui_tiles
            .encode()
            .map_err(|_| DataError::save(SUBSYSTEM, "tile graphics"))?;
        self.rom_write_tileset(rom, "Graphics::UiTiles", ui)?;
        let inv = self
            .inventory_tiles
            .encode()
            .map_err(|_| DataError::save(SUBSYSTEM, "tile graphics"))?;
        self.rom_write_tileset(rom, "Graphics::InventoryTiles", inv)?;

        let mut tilemaps = self
            .inventory_tilemap
            .encode()
            .map_err(|_| DataError::save(SUBSYSTEM, "tilemap data"))?;
        tilemaps.extend(
            self.textbox_tilemap
                .encode()
                .map_err(|_| DataError::save(SUBSYSTEM, "tilemap data"))?,
        );
        let section = rom.get_section("Graphics::Tilemaps")?;
        check_section_fit("Graphics::Tilemaps", tilemaps.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Graphics::Tilemaps", tilemaps));

        let palettes = self.system_palette_bytes();
        let section = rom.get_section("Graphics::SystemPalettes")?;
        check_section_fit("Graphics::SystemPalettes", palettes.len(), section.len())?;
        self.pending_writes
            .push(PendingWrite::new("Graphics::SystemPalettes", palettes));
        Ok(())
    }

    fn pending_writes(&self) -> &[PendingWrite] {
        &self.pending_writes
    }
}
