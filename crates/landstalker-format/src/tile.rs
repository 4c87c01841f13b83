//! VDP tiles and tile attributes
//!
//! A tile is 8x8 pixels at 4bpp, two pixels per byte, 32 bytes total.
//! A tile attribute word is the VDP nametable format:
//! `PCCV HIII IIII IIII` (priority, palette line, vertical flip,
//! horizontal flip, 11-bit tile index). The bit positions are dictated
//! by the console hardware.

use crate::bytes::{pack_bits, unpack_bits};
use crate::error::{CodecError, CodecResult};

/// Size of one tile in bytes
pub const TILE_BYTES: usize = 32;

/// One 8x8 4bpp tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    bytes: [u8; TILE_BYTES],
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            bytes: [0; TILE_BYTES],
        }
    }
}

impl Tile {
    pub fn from_bytes(bytes: [u8; TILE_BYTES]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; TILE_BYTES] {
        &self.bytes
    }

    /// Pixel value (0-15) at `(x, y)`, both in `0..8`
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        let byte = self.bytes[y * 4 + x / 2];
        if x % 2 == 0 { byte >> 4 } else { byte & 0x0F }
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, value: u8) {
        let byte = &mut self.bytes[y * 4 + x / 2];
        if x % 2 == 0 {
            *byte = (*byte & 0x0F) | (value << 4);
        } else {
            *byte = (*byte & 0xF0) | (value & 0x0F);
        }
    }
}

/// Split a raw byte buffer into tiles. Length must be a multiple of the
/// tile size.
pub fn tiles_from_bytes(bytes: &[u8]) -> CodecResult<Vec<Tile>> {
    if bytes.len() % TILE_BYTES != 0 {
        return Err(CodecError::malformed(
            "tile data",
            format!("length {} is not a multiple of {TILE_BYTES}", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(TILE_BYTES)
        .map(|chunk| {
            let mut tile = [0u8; TILE_BYTES];
            tile.copy_from_slice(chunk);
            Tile::from_bytes(tile)
        })
        .collect())
}

/// Flatten tiles back into their byte representation
pub fn tiles_to_bytes(tiles: &[Tile]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(tiles.len() * TILE_BYTES);
    for tile in tiles {
        bytes.extend_from_slice(tile.as_bytes());
    }
    bytes
}

/// A VDP nametable attribute word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileAttributes {
    pub priority: bool,
    pub palette_line: u8,
    pub vflip: bool,
    pub hflip: bool,
    pub index: u16,
}

impl TileAttributes {
    pub fn from_word(word: u16) -> Self {
        Self {
            priority: unpack_bits(word, 15, 1) != 0,
            palette_line: unpack_bits(word, 13, 2) as u8,
            vflip: unpack_bits(word, 12, 1) != 0,
            hflip: unpack_bits(word, 11, 1) != 0,
            index: unpack_bits(word, 0, 11),
        }
    }

    pub fn to_word(self) -> u16 {
        let mut word = 0;
        word = pack_bits(word, 15, 1, u16::from(self.priority));
        word = pack_bits(word, 13, 2, u16::from(self.palette_line));
        word = pack_bits(word, 12, 1, u16::from(self.vflip));
        word = pack_bits(word, 11, 1, u16::from(self.hflip));
        pack_bits(word, 0, 11, self.index)
    }
}
