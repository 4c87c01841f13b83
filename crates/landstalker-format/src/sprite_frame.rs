//! Sprite frames: subsprite placements plus compressed tile payload
//!
//! Wire layout:
//!   - subsprite records, 4 bytes each:
//!       `y: i8, x: i8, size, tile_offset`
//!     where `size` packs `(width-1) << 2 | (height-1)` in the low nibble
//!     (hardware sprites are 1-4 tiles a side) and bit 7 marks the final
//!     subsprite of the frame;
//!   - `tile_byte_count u16 BE`, then one LZ77 stream holding that many
//!     bytes of tile data.
//!
//! Frames are the prime min-pointer-slicing customers: the frame pointer
//! table stores only start addresses and two animations frequently share
//! one frame.

use crate::bytes;
use crate::error::{CodecError, CodecResult};
use crate::lz77;
use crate::tile::{Tile, tiles_from_bytes, tiles_to_bytes};

const LAST_FLAG: u8 = 0x80;

/// One hardware-sprite placement within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubSprite {
    pub x: i8,
    pub y: i8,
    /// Width in tiles, 1-4
    pub width: u8,
    /// Height in tiles, 1-4
    pub height: u8,
    /// Index of this subsprite's first tile within the frame's tiles
    pub tile_offset: u8,
}

impl SubSprite {
    fn decode(record: &[u8], last: &mut bool) -> CodecResult<Self> {
        let size = record[2];
        *last = size & LAST_FLAG != 0;
        let width = ((size >> 2) & 0x3) + 1;
        let height = (size & 0x3) + 1;
        Ok(Self {
            y: record[0] as i8,
            x: record[1] as i8,
            width,
            height,
            tile_offset: record[3],
        })
    }

    fn encode(&self, last: bool, out: &mut Vec<u8>) {
        let mut size = ((self.width - 1) << 2) | (self.height - 1);
        if last {
            size |= LAST_FLAG;
        }
        out.push(self.y as u8);
        out.push(self.x as u8);
        out.push(size);
        out.push(self.tile_offset);
    }

    pub fn tile_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpriteFrame {
    pub subsprites: Vec<SubSprite>,
    pub tiles: Vec<Tile>,
}

impl SpriteFrame {
    /// Decode a frame, returning it and the source bytes consumed
    pub fn decode(data: &[u8]) -> CodecResult<(Self, usize)> {
        let mut subsprites = Vec::new();
        let mut pos = 0;
        let mut last = false;
        while !last {
            let record = data.get(pos..pos + 4).ok_or_else(|| {
                CodecError::malformed("sprite frame", "truncated subsprite record")
            })?;
            subsprites.push(SubSprite::decode(record, &mut last)?);
            pos += 4;
        }
        let header = data
            .get(pos..pos + 2)
            .ok_or_else(|| CodecError::malformed("sprite frame", "missing tile payload header"))?;
        let tile_bytes = usize::from(u16::from_be_bytes([header[0], header[1]]));
        pos += 2;
        let (raw, consumed) = lz77::decompress(&data[pos..])?;
        if raw.len() != tile_bytes {
            return Err(CodecError::malformed(
                "sprite frame",
                format!("payload held {} byte(s), header said {tile_bytes}", raw.len()),
            ));
        }
        let tiles = tiles_from_bytes(&raw)?;
        Ok((Self { subsprites, tiles }, pos + consumed))
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        if self.subsprites.is_empty() {
            return Err(CodecError::malformed(
                "sprite frame",
                "a frame needs at least one subsprite",
            ));
        }
        let mut out = Vec::new();
        let final_index = self.subsprites.len() - 1;
        for (i, subsprite) in self.subsprites.iter().enumerate() {
            subsprite.encode(i == final_index, &mut out);
        }
        let raw = tiles_to_bytes(&self.tiles);
        bytes::push_u16(&mut out, raw.len() as u16);
        out.extend_from_slice(&lz77::compress(&raw));
        Ok(out)
    }

    /// Total tiles claimed by the subsprite placements. A well-formed
    /// frame carries exactly this many tiles.
    pub fn claimed_tiles(&self) -> usize {
        self.subsprites.iter().map(SubSprite::tile_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_frame() -> SpriteFrame {
        let mut tiles = Vec::new();
        for i in 0..6u8 {
            let mut tile = Tile::default();
            tile.set_pixel(0, 0, i);
            tiles.push(tile);
        }
        SpriteFrame {
            subsprites: vec![
                SubSprite {
                    x: -8,
                    y: -16,
                    width: 2,
                    height: 2,
                    tile_offset: 0,
                },
                SubSprite {
                    x: 4,
                    y: 0,
                    width: 2,
                    height: 1,
                    tile_offset: 4,
                },
            ],
            tiles,
        }
    }

    #[test]
    fn test_round_trip() {
        let frame = sample_frame();
        let encoded = frame.encode().unwrap();
        let (decoded, consumed) = SpriteFrame::decode(&encoded).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded.claimed_tiles(), 6);
    }

    #[test]
    fn test_truncated_subsprites_is_error() {
        let frame = sample_frame();
        let encoded = frame.encode().unwrap();
        assert!(SpriteFrame::decode(&encoded[..3]).is_err());
    }

    #[test]
    fn test_empty_frame_rejected() {
        let frame = SpriteFrame::default();
        assert!(frame.encode().is_err());
    }

    #[test]
    fn test_payload_length_checked() {
        let frame = sample_frame();
        let mut encoded = frame.encode().unwrap();
        // Corrupt the tile byte count header
        encoded[8] ^= 0x01;
        assert!(SpriteFrame::decode(&encoded).is_err());
    }
}
