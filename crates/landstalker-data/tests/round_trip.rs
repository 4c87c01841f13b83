//! End-to-end exchange tests over a synthetic ROM image
//!
//! The image is assembled with the same codecs the managers use, so an
//! unmodified load-inject cycle must reproduce it byte for byte.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use pretty_assertions::assert_eq;

use landstalker_data::manager::PendingWrite;
use landstalker_data::sprite_data::serialise_palette_lut;
use landstalker_data::{DataManager, GameData, Rom};
use landstalker_format::bytes::serialise_fixed_width;
use landstalker_format::huffman::{HuffmanTrees, Region, char_to_symbol};
use landstalker_format::{
    AnimatedTilesetHeader, Block, Blockset, Palette, PaletteKind, PointerTableBuilder,
    SpriteFrame, SubSprite, Tile, Tilemap2D, Tileset,
};

const FONT_TILES_US: usize = 0x60;

fn symbols(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| char_to_symbol(Region::UnitedStates, c).unwrap())
        .collect()
}

fn marked_tile(value: u8) -> Tile {
    let mut bytes = [0u8; 32];
    bytes[0] = value;
    Tile::from_bytes(bytes)
}

fn sprite_frame(seed: u8) -> SpriteFrame {
    SpriteFrame {
        subsprites: vec![SubSprite {
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            tile_offset: 0,
        }],
        tiles: vec![marked_tile(seed)],
    }
}

/// Lay a pointer table plus item blob into `rom` at `label`'s start
fn write_pointer_section(rom: &mut Rom, label: &str, items: &[Vec<u8>], slots: &[usize]) {
    let section = rom.get_section(label).unwrap();
    let mut builder = PointerTableBuilder::new(section.begin + (slots.len() * 4) as u32, true);
    let item_pointers: Vec<u32> = items.iter().map(|item| builder.push(item)).collect();
    let (_, blob) = builder.finish();
    let mut bytes = Vec::new();
    for &slot in slots {
        bytes.extend_from_slice(&item_pointers[slot].to_be_bytes());
    }
    bytes.extend_from_slice(&blob);
    rom.write_bytes(section.begin, &bytes).unwrap();
}

fn write_section(rom: &mut Rom, label: &str, bytes: &[u8]) {
    let begin = rom.get_section(label).unwrap().begin;
    rom.write_bytes(begin, bytes).unwrap();
}

fn sample_strings() -> Vec<Vec<u8>> {
    vec![symbols("Hello"), symbols("World")]
}

fn build_rom() -> Rom {
    let mut rom = Rom::blank();

    // Graphics: the main font's tile count pins the region to US
    let font = Tileset {
        tiles: (0..FONT_TILES_US).map(|i| marked_tile(i as u8)).collect(),
    };
    write_section(&mut rom, "Graphics::MainFont", &font.encode());
    let ui = Tileset { tiles: vec![marked_tile(0xA0); 4] };
    write_section(&mut rom, "Graphics::UiTiles", &ui.encode());
    let inventory = Tileset { tiles: vec![marked_tile(0xB0); 2] };
    write_section(&mut rom, "Graphics::InventoryTiles", &inventory.encode());
    let mut tilemaps = Tilemap2D::new(2, 2, 0x100).encode();
    tilemaps.extend(Tilemap2D::new(3, 1, 0x200).encode());
    write_section(&mut rom, "Graphics::Tilemaps", &tilemaps);
    let mut system_palettes = Vec::new();
    for _ in 0..4 {
        system_palettes.extend(Palette::new(PaletteKind::Full).encode());
    }
    write_section(&mut rom, "Graphics::SystemPalettes", &system_palettes);

    // Strings: forest, banks, name tables
    let strings = sample_strings();
    let trees = HuffmanTrees::recalculate_trees(Region::UnitedStates, &strings);
    let (offsets, tables) = trees.to_blobs();
    write_section(&mut rom, "Strings::HuffmanOffsets", &offsets);
    write_section(&mut rom, "Strings::HuffmanTables", &tables);
    let mut banks = Vec::new();
    for string in &strings {
        let encoded = trees.encode_string(string).unwrap();
        banks.push(encoded.len() as u8);
        banks.extend(encoded);
    }
    banks.push(0x00);
    banks.push(0x00);
    write_section(&mut rom, "Strings::Banks", &banks);
    let names: Vec<[u8; 16]> = vec![[0x01; 16], [0x02; 16]];
    write_section(&mut rom, "Strings::CharacterNames", &serialise_fixed_width(&names, true));
    let items: Vec<[u8; 16]> = vec![[0x03; 16]];
    write_section(&mut rom, "Strings::ItemNames", &serialise_fixed_width(&items, true));

    // Sprites: two animations of two frames each, frame 0 shared
    write_section(
        &mut rom,
        "Sprites::Animations",
        &serialise_fixed_width(&[[2u8], [2u8]], true),
    );
    let frames: Vec<Vec<u8>> = (0..3)
        .map(|i| sprite_frame(0x10 + i).encode().unwrap())
        .collect();
    write_pointer_section(&mut rom, "Sprites::Frames", &frames, &[0, 1, 0, 2]);
    let lut: BTreeMap<u8, u8> = [(0u8, 0u8)].into();
    write_section(&mut rom, "Sprites::PaletteLUT", &serialise_palette_lut(&lut, &lut));
    write_section(
        &mut rom,
        "Sprites::LoPalettes",
        &Palette::new(PaletteKind::SpriteLow).encode(),
    );
    write_section(
        &mut rom,
        "Sprites::HiPalettes",
        &Palette::new(PaletteKind::SpriteHigh).encode(),
    );
    write_section(
        &mut rom,
        "Sprites::VisibilityFlags",
        &serialise_fixed_width(&[[0x00, 0x21, 0x80, 0x05]], true),
    );

    // Rooms: two rooms sharing one tileset through two slots
    let rooms = [[0u8; 8], [0u8; 8]];
    write_section(&mut rom, "Rooms::RoomTable", &serialise_fixed_width(&rooms, true));
    let tileset = Tileset { tiles: vec![marked_tile(0xC0); 8] };
    write_pointer_section(&mut rom, "Rooms::Tilesets", &[tileset.encode()], &[0, 0]);
    let header = AnimatedTilesetHeader {
        base: 0x0400,
        length: 32,
        speed: 4,
        frame_count: 2,
        tileset: 0,
    };
    write_section(
        &mut rom,
        "Rooms::AnimTilesetHeaders",
        &serialise_fixed_width(&[header.to_bytes()], true),
    );
    write_pointer_section(
        &mut rom,
        "Rooms::AnimTilesetFrames",
        &[marked_tile(0xD0).as_bytes().to_vec()],
        &[0, 0],
    );
    let blockset = Blockset { blocks: vec![Block::default()] };
    write_pointer_section(&mut rom, "Rooms::Blocksets", &[blockset.encode()], &[0]);
    write_section(&mut rom, "Rooms::Palettes", &Palette::new(PaletteKind::Room).encode());
    write_section(
        &mut rom,
        "Rooms::Warps",
        &serialise_fixed_width(&[[0x00, 0x01, 0x05, 0x06, 0x00, 0x02, 0x07, 0x08]], true),
    );
    write_section(
        &mut rom,
        "Rooms::Doors",
        &serialise_fixed_width(&[[0x00, 0x01, 0x42, 0x03]], true),
    );
    write_section(
        &mut rom,
        "Rooms::Chests",
        &serialise_fixed_width(&[[0x00, 0x01, 0x10, 0x20]], true),
    );
    write_section(
        &mut rom,
        "Rooms::TileSwaps",
        &serialise_fixed_width(&[[0x00, 0x12, 0x80, 0x40]], true),
    );
    write_section(
        &mut rom,
        "Rooms::ClearFlags",
        &serialise_fixed_width(&[[0x00, 0x02, 0x00, 0x30]], true),
    );
    write_section(
        &mut rom,
        "Rooms::SacredTrees",
        &serialise_fixed_width(&[[0x00, 0x03, 0x00, 0x31]], true),
    );
    write_section(
        &mut rom,
        "Rooms::TreeWarps",
        &serialise_fixed_width(&[[0x00, 0x03, 0x00, 0x04, 0x00, 0x32]], true),
    );

    rom
}

fn temp_tree(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("landstalker_{test}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn load_from_rom_reconstructs_shared_items() -> Result<()> {
    let rom = build_rom();
    let data = GameData::from_rom(&rom)?;

    assert_eq!(data.strings.region(), Region::UnitedStates);
    assert_eq!(data.strings.string_count(), 2);
    assert_eq!(data.strings.string_text(0).as_deref(), Some("Hello"));
    assert_eq!(data.strings.string_text(1).as_deref(), Some("World"));
    assert_eq!(data.strings.character_names().len(), 2);
    assert_eq!(data.strings.item_names().len(), 1);

    assert_eq!(data.graphics.main_font().decoded().tiles.len(), FONT_TILES_US);
    assert_eq!(data.graphics.inventory_tilemap().decoded().width, 2);
    assert_eq!(data.graphics.textbox_tilemap().decoded().width, 3);
    assert_eq!(data.graphics.system_palettes().len(), 4);

    // Four animation-frame slots resolve to three distinct frames
    assert_eq!(data.sprites.frames().len(), 3);
    assert_eq!(
        data.sprites.animations(),
        &[
            vec!["SpriteFrame000".to_string(), "SpriteFrame001".to_string()],
            vec!["SpriteFrame000".to_string(), "SpriteFrame002".to_string()],
        ]
    );
    assert_eq!(data.sprites.lo_palette_lookup().get(&0), Some(&0));

    assert_eq!(data.rooms.rooms().len(), 2);
    assert_eq!(data.rooms.tilesets().len(), 1);
    assert_eq!(
        data.rooms.tileset_slots(),
        &["Tileset00".to_string(), "Tileset00".to_string()]
    );
    assert_eq!(data.rooms.anim_tilesets().len(), 1);
    assert_eq!(data.rooms.anim_frame_slots()[0].len(), 2);
    assert_eq!(data.rooms.blocksets().len(), 1);
    assert_eq!(data.rooms.warps().len(), 1);
    assert_eq!(data.rooms.chests().len(), 1);
    assert_eq!(data.rooms.tree_warps().len(), 1);

    assert!(!data.is_modified());
    Ok(())
}

#[test]
fn unmodified_reinjection_is_byte_stable() -> Result<()> {
    let rom = build_rom();
    let mut data = GameData::from_rom(&rom)?;

    let mut patched = rom.clone();
    data.inject_into(&mut patched)?;

    let mut expected = rom.clone();
    expected.update_checksum();
    assert_eq!(patched.bytes(), expected.bytes());
    Ok(())
}

#[test]
fn pending_writes_do_not_commit() -> Result<()> {
    let rom = build_rom();
    let mut data = GameData::from_rom(&rom)?;

    data.strings.set_string_text(0, "Changed")?;
    data.strings.refresh_pending_writes(&rom)?;
    let sections: Vec<&str> = data
        .strings
        .pending_writes()
        .iter()
        .map(|w: &PendingWrite| w.section)
        .collect();
    assert!(sections.contains(&"Strings::Banks"));

    // Staging writes leaves the dirty state in place
    assert!(data.strings.is_modified());
    Ok(())
}

#[test]
fn edits_survive_rom_reinjection() -> Result<()> {
    let rom = build_rom();
    let mut data = GameData::from_rom(&rom)?;

    data.strings.set_string_text(0, "Goodbye")?;
    // Drop the only use of frame 2; the writer must stop emitting it
    data.sprites.animations_mut()[1][1] = "SpriteFrame000".to_string();
    assert!(data.is_modified());

    let mut patched = rom.clone();
    data.inject_into(&mut patched)?;
    assert!(!data.is_modified());

    let reloaded = GameData::from_rom(&patched)?;
    assert_eq!(reloaded.strings.string_text(0).as_deref(), Some("Goodbye"));
    assert_eq!(reloaded.strings.string_text(1).as_deref(), Some("World"));
    assert_eq!(reloaded.sprites.frames().len(), 2);
    assert_eq!(
        reloaded.sprites.animations()[1],
        vec!["SpriteFrame000".to_string(), "SpriteFrame000".to_string()]
    );
    Ok(())
}

#[test]
fn asm_round_trip_preserves_everything() -> Result<()> {
    let rom = build_rom();
    let mut data = GameData::from_rom(&rom)?;
    let dir = temp_tree("asm_round_trip");

    data.save(&dir)?;
    assert!(!data.is_modified());

    let reloaded = GameData::from_asm(&dir)?;
    assert_eq!(reloaded.strings.region(), Region::UnitedStates);
    assert_eq!(reloaded.strings.string_text(0).as_deref(), Some("Hello"));
    assert_eq!(reloaded.strings.character_names(), data.strings.character_names());
    assert_eq!(reloaded.sprites.frames().len(), 3);
    assert_eq!(reloaded.sprites.animations(), data.sprites.animations());
    assert_eq!(reloaded.sprites.visibility_flags(), data.sprites.visibility_flags());
    assert_eq!(reloaded.graphics.system_palettes(), data.graphics.system_palettes());
    assert_eq!(reloaded.rooms.rooms(), data.rooms.rooms());
    assert_eq!(reloaded.rooms.tileset_slots(), data.rooms.tileset_slots());
    assert_eq!(reloaded.rooms.anim_frame_slots(), data.rooms.anim_frame_slots());
    assert_eq!(reloaded.rooms.warps(), data.rooms.warps());
    assert_eq!(reloaded.rooms.chests(), data.rooms.chests());
    assert!(!reloaded.is_modified());

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[test]
fn asm_tree_can_be_injected_into_rom() -> Result<()> {
    let rom = build_rom();
    let mut data = GameData::from_rom(&rom)?;
    let dir = temp_tree("asm_inject");
    data.save(&dir)?;

    let mut from_tree = GameData::from_asm(&dir)?;
    let mut patched = rom.clone();
    from_tree.inject_into(&mut patched)?;

    let mut expected = rom.clone();
    expected.update_checksum();
    assert_eq!(patched.bytes(), expected.bytes());

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}
