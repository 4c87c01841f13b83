//! Declarative label / file-layout tables
//!
//! One table describes every data file the managers exchange with the
//! assembly tree: the label its index entry carries and the relative
//! path it is written to. A second table describes the ROM sections the
//! same data occupies in ROM mode. Filename templates keep the exact
//! printf-style patterns of the existing asset trees, so a tree written
//! by this code drops into place next to one written by other tools.

use crate::error::{DataError, DataResult};

/// Every data file the managers read or write in the assembly tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFileId {
    // Sprite subsystem
    SpriteIndex,
    SpriteFrameList,
    SpriteAnimations,
    SpritePaletteLut,
    SpriteVisibilityFlags,
    // Graphics subsystem
    GraphicsIndex,
    MainFont,
    UiTiles,
    InventoryTiles,
    InventoryTilemap,
    TextboxTilemap,
    SystemPalettes,
    // String subsystem
    StringIndex,
    StringBankList,
    HuffmanOffsets,
    HuffmanTables,
    CharacterNames,
    ItemNames,
    // Room subsystem
    RoomIndex,
    RoomTable,
    RoomTilesetList,
    RoomTilesetSlots,
    RoomAnimTilesetHeaders,
    RoomAnimTilesetList,
    RoomAnimTilesetSlots,
    RoomBlocksetList,
    RoomBlocksetSlots,
    RoomWarps,
    RoomDoors,
    RoomChests,
    RoomTileSwaps,
    RoomClearFlags,
    RoomSacredTrees,
    RoomTreeWarps,
}

/// One row of the declarative table
#[derive(Debug, Clone, Copy)]
pub struct DataFileSpec {
    pub id: DataFileId,
    /// Label carried in the owning index file (and in ROM metadata)
    pub label: &'static str,
    /// Path relative to the assembly-tree base
    pub path: &'static str,
}

pub const DATA_FILES: &[DataFileSpec] = &[
    DataFileSpec { id: DataFileId::SpriteIndex, label: "Sprites", path: "sprites/sprites.asm" },
    DataFileSpec { id: DataFileId::SpriteFrameList, label: "SpriteFrames", path: "sprites/frames.asm" },
    DataFileSpec { id: DataFileId::SpriteAnimations, label: "SpriteAnimations", path: "sprites/animations.bin" },
    DataFileSpec { id: DataFileId::SpritePaletteLut, label: "SpritePaletteLUT", path: "sprites/palette_lut.bin" },
    DataFileSpec { id: DataFileId::SpriteVisibilityFlags, label: "SpriteVisibilityFlags", path: "sprites/visibility_flags.bin" },
    DataFileSpec { id: DataFileId::GraphicsIndex, label: "Graphics", path: "graphics/graphics.asm" },
    DataFileSpec { id: DataFileId::MainFont, label: "MainFont", path: "graphics/fonts/main_font.bin" },
    DataFileSpec { id: DataFileId::UiTiles, label: "UiTiles", path: "graphics/ui_tiles.bin" },
    DataFileSpec { id: DataFileId::InventoryTiles, label: "InventoryTiles", path: "graphics/inventory_tiles.bin" },
    DataFileSpec { id: DataFileId::InventoryTilemap, label: "InventoryTilemap", path: "graphics/inventory_tilemap.bin" },
    DataFileSpec { id: DataFileId::TextboxTilemap, label: "TextboxTilemap", path: "graphics/textbox_tilemap.bin" },
    DataFileSpec { id: DataFileId::SystemPalettes, label: "SystemPalettes", path: "graphics/system_palettes.bin" },
    DataFileSpec { id: DataFileId::StringIndex, label: "Strings", path: "strings/strings.asm" },
    DataFileSpec { id: DataFileId::StringBankList, label: "StringBanks", path: "strings/banks.asm" },
    DataFileSpec { id: DataFileId::HuffmanOffsets, label: "HuffmanOffsets", path: "strings/huffman_offsets.bin" },
    DataFileSpec { id: DataFileId::HuffmanTables, label: "HuffmanTables", path: "strings/huffman_tables.bin" },
    DataFileSpec { id: DataFileId::CharacterNames, label: "CharacterNames", path: "strings/character_names.bin" },
    DataFileSpec { id: DataFileId::ItemNames, label: "ItemNames", path: "strings/item_names.bin" },
    DataFileSpec { id: DataFileId::RoomIndex, label: "Rooms", path: "rooms/rooms.asm" },
    DataFileSpec { id: DataFileId::RoomTable, label: "RoomTable", path: "rooms/room_table.bin" },
    DataFileSpec { id: DataFileId::RoomTilesetList, label: "RoomTilesets", path: "rooms/tilesets.asm" },
    DataFileSpec { id: DataFileId::RoomTilesetSlots, label: "RoomTilesetSlots", path: "rooms/tileset_slots.bin" },
    DataFileSpec { id: DataFileId::RoomAnimTilesetHeaders, label: "RoomAnimTilesetHeaders", path: "rooms/anim_tileset_headers.bin" },
    DataFileSpec { id: DataFileId::RoomAnimTilesetList, label: "RoomAnimTilesets", path: "rooms/anim_tilesets.asm" },
    DataFileSpec { id: DataFileId::RoomAnimTilesetSlots, label: "RoomAnimTilesetSlots", path: "rooms/anim_tileset_slots.bin" },
    DataFileSpec { id: DataFileId::RoomBlocksetList, label: "RoomBlocksets", path: "rooms/blocksets.asm" },
    DataFileSpec { id: DataFileId::RoomBlocksetSlots, label: "RoomBlocksetSlots", path: "rooms/blockset_slots.bin" },
    DataFileSpec { id: DataFileId::RoomWarps, label: "RoomWarps", path: "rooms/warps.bin" },
    DataFileSpec { id: DataFileId::RoomDoors, label: "RoomDoors", path: "rooms/doors.bin" },
    DataFileSpec { id: DataFileId::RoomChests, label: "RoomChests", path: "rooms/chests.bin" },
    DataFileSpec { id: DataFileId::RoomTileSwaps, label: "RoomTileSwaps", path: "rooms/tile_swaps.bin" },
    DataFileSpec { id: DataFileId::RoomClearFlags, label: "RoomClearFlags", path: "rooms/clear_flags.bin" },
    DataFileSpec { id: DataFileId::RoomSacredTrees, label: "RoomSacredTrees", path: "rooms/sacred_trees.bin" },
    DataFileSpec { id: DataFileId::RoomTreeWarps, label: "RoomTreeWarps", path: "rooms/tree_warps.bin" },
];

/// Look up the table row for an id. Rows are declared in enum order, so
/// the discriminant is the row position; `test_data_file_table_total`
/// locks that correspondence.
pub fn data_file(id: DataFileId) -> &'static DataFileSpec {
    &DATA_FILES[id as usize]
}

// Per-entry filename templates, printf-style. The `%0Nd` patterns are
// the ones the existing asset trees use; they must not change if
// on-disk compatibility matters.
pub const SPRITE_FRAME_FILE: &str = "sprites/frames/sprite_frame_%03d.bin";
pub const SPRITE_LO_PALETTE_FILE: &str = "sprites/palettes/sprite_palette_lo_%02d.bin";
pub const SPRITE_HI_PALETTE_FILE: &str = "sprites/palettes/sprite_palette_hi_%02d.bin";
pub const STRING_BANK_FILE: &str = "strings/string_bank_%02d.bin";
pub const ROOM_TILESET_FILE: &str = "rooms/tilesets/tileset_%02d.bin";
pub const ROOM_ANIM_TILESET_FILE: &str = "rooms/anim_tilesets/anim_tileset_%02d_frame_%02d.bin";
pub const ROOM_BLOCKSET_FILE: &str = "rooms/blocksets/blockset_%02d.bin";
pub const ROOM_PALETTE_FILE: &str = "rooms/palettes/room_palette_%02d.bin";

// Label templates for per-entry names
pub const SPRITE_FRAME_LABEL: &str = "SpriteFrame%03d";
pub const SPRITE_LO_PALETTE_LABEL: &str = "SpriteLoPalette%02d";
pub const SPRITE_HI_PALETTE_LABEL: &str = "SpriteHiPalette%02d";
pub const STRING_BANK_LABEL: &str = "StringBank%02d";
pub const ROOM_TILESET_LABEL: &str = "Tileset%02d";
pub const ROOM_ANIM_TILESET_LABEL: &str = "AnimTileset%02d_%02d";
pub const ROOM_BLOCKSET_LABEL: &str = "Blockset%02d";
pub const ROOM_PALETTE_LABEL: &str = "RoomPalette%02d";

/// Expand the first `%d`/`%0Nd` hole in a template
pub fn format_index(template: &str, index: usize) -> String {
    expand_one(template, index).unwrap_or_else(|| template.to_string())
}

/// Expand two `%d`/`%0Nd` holes (e.g. animated tileset frame files)
pub fn format_index2(template: &str, first: usize, second: usize) -> String {
    let once = format_index(template, first);
    format_index(&once, second)
}

fn expand_one(template: &str, index: usize) -> Option<String> {
    let start = template.find('%')?;
    let rest = &template[start + 1..];
    let digits_end = rest.find('d')?;
    let spec = &rest[..digits_end];
    let width: usize = if spec.is_empty() {
        0
    } else {
        spec.trim_start_matches('0').parse().unwrap_or(0)
    };
    let mut out = String::with_capacity(template.len() + 8);
    out.push_str(&template[..start]);
    out.push_str(&format!("{index:0width$}"));
    out.push_str(&rest[digits_end + 1..]);
    Some(out)
}

/// ROM section metadata: a named, externally-supplied address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
    pub label: &'static str,
    pub begin: u32,
    pub end: u32,
}

/// The ROM sections the four subsystems exchange data with. Supplied to
/// the pointer reconstruction as the authoritative region bounds; the
/// algorithms never compute these themselves.
pub const SECTIONS: &[SectionSpec] = &[
    SectionSpec { label: "Strings::HuffmanOffsets", begin: 0x002E00, end: 0x003000 },
    SectionSpec { label: "Strings::HuffmanTables", begin: 0x003000, end: 0x004000 },
    SectionSpec { label: "Strings::Banks", begin: 0x004000, end: 0x008000 },
    SectionSpec { label: "Strings::CharacterNames", begin: 0x008000, end: 0x008400 },
    SectionSpec { label: "Strings::ItemNames", begin: 0x008400, end: 0x008800 },
    SectionSpec { label: "Graphics::MainFont", begin: 0x009000, end: 0x00B000 },
    SectionSpec { label: "Graphics::UiTiles", begin: 0x00B000, end: 0x00C000 },
    SectionSpec { label: "Graphics::InventoryTiles", begin: 0x00C000, end: 0x00D000 },
    SectionSpec { label: "Graphics::Tilemaps", begin: 0x00D000, end: 0x00E000 },
    SectionSpec { label: "Graphics::SystemPalettes", begin: 0x00E000, end: 0x00E080 },
    SectionSpec { label: "Sprites::Frames", begin: 0x010000, end: 0x020000 },
    SectionSpec { label: "Sprites::Animations", begin: 0x020000, end: 0x021000 },
    SectionSpec { label: "Sprites::PaletteLUT", begin: 0x021000, end: 0x021400 },
    SectionSpec { label: "Sprites::LoPalettes", begin: 0x021400, end: 0x021700 },
    SectionSpec { label: "Sprites::HiPalettes", begin: 0x021700, end: 0x021A00 },
    SectionSpec { label: "Sprites::VisibilityFlags", begin: 0x021A00, end: 0x021C00 },
    SectionSpec { label: "Rooms::RoomTable", begin: 0x022000, end: 0x023000 },
    SectionSpec { label: "Rooms::Tilesets", begin: 0x023000, end: 0x02B000 },
    SectionSpec { label: "Rooms::AnimTilesetHeaders", begin: 0x02B000, end: 0x02B200 },
    SectionSpec { label: "Rooms::AnimTilesetFrames", begin: 0x02B200, end: 0x02D000 },
    SectionSpec { label: "Rooms::Blocksets", begin: 0x02D000, end: 0x030000 },
    SectionSpec { label: "Rooms::Palettes", begin: 0x030000, end: 0x030800 },
    SectionSpec { label: "Rooms::Warps", begin: 0x030800, end: 0x030C00 },
    SectionSpec { label: "Rooms::Doors", begin: 0x030C00, end: 0x030E00 },
    SectionSpec { label: "Rooms::Chests", begin: 0x030E00, end: 0x031000 },
    SectionSpec { label: "Rooms::TileSwaps", begin: 0x031000, end: 0x031200 },
    SectionSpec { label: "Rooms::ClearFlags", begin: 0x031200, end: 0x031300 },
    SectionSpec { label: "Rooms::SacredTrees", begin: 0x031300, end: 0x031400 },
    SectionSpec { label: "Rooms::TreeWarps", begin: 0x031400, end: 0x031500 },
];

/// Smallest ROM size that holds every declared section
pub const ROM_SIZE: usize = 0x040000;

pub fn section(label: &str) -> DataResult<&'static SectionSpec> {
    SECTIONS
        .iter()
        .find(|s| s.label == label)
        .ok_or_else(|| DataError::UnknownLabel(label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_index_templates() {
        assert_eq!(
            format_index(SPRITE_FRAME_FILE, 7),
            "sprites/frames/sprite_frame_007.bin"
        );
        assert_eq!(format_index(SPRITE_FRAME_LABEL, 123), "SpriteFrame123");
        assert_eq!(
            format_index2(ROOM_ANIM_TILESET_FILE, 3, 1),
            "rooms/anim_tilesets/anim_tileset_03_frame_01.bin"
        );
    }

    #[test]
    fn test_sections_sane() {
        for spec in SECTIONS {
            assert!(spec.begin < spec.end, "{} is empty", spec.label);
            assert!(spec.end as usize <= ROM_SIZE);
        }
        // No overlaps
        let mut sorted: Vec<_> = SECTIONS.to_vec();
        sorted.sort_by_key(|s| s.begin);
        for pair in sorted.windows(2) {
            assert!(pair[0].end <= pair[1].begin, "{} overlaps", pair[1].label);
        }
    }

    #[test]
    fn test_data_file_table_total() {
        // One row per variant, declared in enum order
        assert_eq!(DATA_FILES.len(), DataFileId::RoomTreeWarps as usize + 1);
        for (i, row) in DATA_FILES.iter().enumerate() {
            assert_eq!(row.id as usize, i, "{} row out of order", row.label);
            assert_eq!(data_file(row.id).label, row.label);
        }
        assert_eq!(data_file(DataFileId::SpriteIndex).label, "Sprites");
        assert_eq!(
            data_file(DataFileId::RoomTreeWarps).path,
            "rooms/tree_warps.bin"
        );
    }

    #[test]
    fn test_unknown_section_is_error() {
        assert!(section("Nope::Nothing").is_err());
    }
}
