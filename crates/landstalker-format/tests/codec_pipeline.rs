//! Cross-codec pipeline tests: slicing a hand-laid region of encoded
//! assets and rebuilding it byte for byte

use anyhow::Result;
use pretty_assertions::assert_eq;

use landstalker_format::{
    Blockset, Block, PointerTableBuilder, SpriteFrame, SubSprite, Tile, TileAttributes, Tileset,
    slice_pointer_table,
};

fn marked_tile(value: u8) -> Tile {
    let mut bytes = [0u8; 32];
    bytes[0] = value;
    Tile::from_bytes(bytes)
}

#[test]
fn sliced_region_rebuilds_byte_identical() -> Result<()> {
    // Three encoded assets, the first referenced twice
    let items: Vec<Vec<u8>> = vec![
        Tileset { tiles: vec![marked_tile(1), marked_tile(2)] }.encode(),
        Tileset { tiles: vec![marked_tile(3)] }.encode(),
        Tileset { tiles: vec![marked_tile(4); 4] }.encode(),
    ];
    let slots = [0usize, 1, 0, 2];

    let base = 0x1000u32 + (slots.len() * 4) as u32;
    let mut builder = PointerTableBuilder::new(base, true);
    let item_pointers: Vec<u32> = items.iter().map(|item| builder.push(item)).collect();
    let (_, blob) = builder.finish();
    let pointers: Vec<u32> = slots.iter().map(|&s| item_pointers[s]).collect();
    let section_end = base + blob.len() as u32;

    let slices = slice_pointer_table(&pointers, section_end)?;
    assert_eq!(slices.items.len(), 3);
    assert_eq!(slices.index, vec![0, 1, 0, 2]);

    // Decode every sliced item, re-encode, re-lay-out: the blob and the
    // pointer table must come back exactly
    let mut rebuilt = PointerTableBuilder::new(base, true);
    let mut rebuilt_item_pointers = Vec::new();
    for &(begin, end) in &slices.items {
        let bytes = &blob[(begin - base) as usize..(end - base) as usize];
        let (tileset, _) = Tileset::decode(bytes)?;
        rebuilt_item_pointers.push(rebuilt.push(&tileset.encode()));
    }
    let (_, rebuilt_blob) = rebuilt.finish();
    let rebuilt_pointers: Vec<u32> = slices
        .index
        .iter()
        .map(|&item| rebuilt_item_pointers[item])
        .collect();

    assert_eq!(rebuilt_blob, blob);
    assert_eq!(rebuilt_pointers, pointers);
    Ok(())
}

#[test]
fn mixed_asset_round_trips() -> Result<()> {
    let frame = SpriteFrame {
        subsprites: vec![
            SubSprite { x: -4, y: 8, width: 2, height: 1, tile_offset: 0 },
            SubSprite { x: 0, y: 0, width: 1, height: 1, tile_offset: 2 },
        ],
        tiles: vec![marked_tile(9), marked_tile(8), marked_tile(7)],
    };
    let (decoded, consumed) = SpriteFrame::decode(&frame.encode()?)?;
    assert_eq!(decoded, frame);
    assert_eq!(consumed, frame.encode()?.len());

    let blockset = Blockset {
        blocks: vec![
            Block {
                corners: [
                    TileAttributes { index: 1, ..TileAttributes::default() },
                    TileAttributes { index: 2, hflip: true, ..TileAttributes::default() },
                    TileAttributes { index: 3, ..TileAttributes::default() },
                    TileAttributes { index: 4, ..TileAttributes::default() },
                ],
            },
            // Repeats corner 0 of the previous block
            Block {
                corners: [
                    TileAttributes { index: 1, ..TileAttributes::default() },
                    TileAttributes { index: 5, ..TileAttributes::default() },
                    TileAttributes { index: 6, ..TileAttributes::default() },
                    TileAttributes { index: 7, ..TileAttributes::default() },
                ],
            },
        ],
    };
    let encoded = blockset.encode();
    let (decoded, consumed) = Blockset::decode(&encoded)?;
    assert_eq!(decoded, blockset);
    assert_eq!(consumed, encoded.len());
    Ok(())
}
