//! Tilesets: LZ77-compressed tile graphics, plus the animated variant
//!
//! A tileset on the wire is one LZ77 stream whose decompressed payload is
//! a whole number of 32-byte tiles. Animated tilesets are stored
//! uncompressed: their frames are recovered by min-pointer slicing, so
//! each frame's extent is already known and the payload is raw tile
//! bytes. The animation header (base VRAM address, frame count, speed)
//! lives in a separate fixed-width table owned by the room data manager.

use crate::error::{CodecError, CodecResult};
use crate::lz77;
use crate::tile::{Tile, tiles_from_bytes, tiles_to_bytes};

/// A decoded tileset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tileset {
    pub tiles: Vec<Tile>,
}

impl Tileset {
    /// Decode a compressed tileset, returning it and the number of
    /// source bytes consumed.
    pub fn decode(bytes: &[u8]) -> CodecResult<(Self, usize)> {
        let (raw, consumed) = lz77::decompress(bytes)?;
        let tiles = tiles_from_bytes(&raw)?;
        Ok((Self { tiles }, consumed))
    }

    pub fn encode(&self) -> Vec<u8> {
        lz77::compress(&tiles_to_bytes(&self.tiles))
    }
}

/// One animated-tileset frame: raw, uncompressed tile data
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnimatedTileset {
    pub tiles: Vec<Tile>,
}

impl AnimatedTileset {
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        Ok(Self {
            tiles: tiles_from_bytes(bytes)?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        tiles_to_bytes(&self.tiles)
    }
}

/// Animation header record: 8 bytes in the animated-tileset table.
/// `base` is the VRAM word address the frame is DMA'd to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimatedTilesetHeader {
    pub base: u16,
    pub length: u16,
    pub speed: u8,
    pub frame_count: u8,
    pub tileset: u8,
}

impl AnimatedTilesetHeader {
    pub const WIDTH: usize = 8;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        Self {
            base: u16::from_be_bytes([bytes[0], bytes[1]]),
            length: u16::from_be_bytes([bytes[2], bytes[3]]),
            speed: bytes[4],
            frame_count: bytes[5],
            tileset: bytes[6],
            // bytes[7] is alignment padding
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&self.base.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.length.to_be_bytes());
        bytes[4] = self.speed;
        bytes[5] = self.frame_count;
        bytes[6] = self.tileset;
        bytes
    }
}

/// Reject frame payloads that do not divide into whole tiles before they
/// reach the entry layer.
pub fn validate_frame_length(len: usize) -> CodecResult<()> {
    if len % crate::tile::TILE_BYTES != 0 {
        return Err(CodecError::malformed(
            "animated tileset frame",
            format!("length {len} is not a whole number of tiles"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_tiles(n: usize) -> Vec<Tile> {
        (0..n)
            .map(|i| {
                let mut tile = Tile::default();
                for y in 0..8 {
                    tile.set_pixel(i % 8, y, (i % 16) as u8);
                }
                tile
            })
            .collect()
    }

    #[test]
    fn test_tileset_round_trip() {
        let tileset = Tileset {
            tiles: sample_tiles(24),
        };
        let bytes = tileset.encode();
        let (decoded, consumed) = Tileset::decode(&bytes).unwrap();
        assert_eq!(decoded, tileset);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_animated_tileset_round_trip() {
        let frame = AnimatedTileset {
            tiles: sample_tiles(4),
        };
        let bytes = frame.encode();
        assert_eq!(AnimatedTileset::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_animation_header_round_trip() {
        let header = AnimatedTilesetHeader {
            base: 0xD400,
            length: 0x0100,
            speed: 4,
            frame_count: 3,
            tileset: 9,
        };
        assert_eq!(
            AnimatedTilesetHeader::from_bytes(&header.to_bytes()),
            header
        );
    }
}
