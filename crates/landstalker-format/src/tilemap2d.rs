//! 2D tilemaps: UI screens, HUD layouts, map backgrounds
//!
//! Wire layout: `width u8, height u8, base u16 BE`, then one LZ77 stream
//! of big-endian attribute words, row-major, `width * height` cells.
//! `base` is the VRAM tile index the map's relative indices are offset
//! against when uploaded.

use crate::bytes;
use crate::error::{CodecError, CodecResult};
use crate::lz77;
use crate::tile::TileAttributes;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tilemap2D {
    pub width: u8,
    pub height: u8,
    pub base: u16,
    pub cells: Vec<TileAttributes>,
}

impl Tilemap2D {
    pub fn new(width: u8, height: u8, base: u16) -> Self {
        Self {
            width,
            height,
            base,
            cells: vec![TileAttributes::default(); usize::from(width) * usize::from(height)],
        }
    }

    pub fn cell(&self, x: usize, y: usize) -> TileAttributes {
        self.cells[y * usize::from(self.width) + x]
    }

    pub fn set_cell(&mut self, x: usize, y: usize, attrs: TileAttributes) {
        self.cells[y * usize::from(self.width) + x] = attrs;
    }

    /// Decode, returning the map and the total source bytes consumed
    pub fn decode(data: &[u8]) -> CodecResult<(Self, usize)> {
        if data.len() < 4 {
            return Err(CodecError::malformed("tilemap2d", "truncated header"));
        }
        let width = data[0];
        let height = data[1];
        let base = bytes::read_u16(data, 2);
        let (raw, consumed) = lz77::decompress(&data[4..])?;
        let expected = usize::from(width) * usize::from(height) * 2;
        if raw.len() != expected {
            return Err(CodecError::malformed(
                "tilemap2d",
                format!(
                    "{width}x{height} map needs {expected} cell byte(s), stream held {}",
                    raw.len()
                ),
            ));
        }
        let cells = raw
            .chunks_exact(2)
            .map(|pair| TileAttributes::from_word(u16::from_be_bytes([pair[0], pair[1]])))
            .collect();
        Ok((
            Self {
                width,
                height,
                base,
                cells,
            },
            4 + consumed,
        ))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.cells.len() * 2);
        for cell in &self.cells {
            bytes::push_u16(&mut raw, cell.to_word());
        }
        let mut out = vec![self.width, self.height];
        bytes::push_u16(&mut out, self.base);
        out.extend_from_slice(&lz77::compress(&raw));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip() {
        let mut map = Tilemap2D::new(40, 28, 0x100);
        for y in 0..28 {
            for x in 0..40 {
                map.set_cell(
                    x,
                    y,
                    TileAttributes {
                        index: ((x + y * 3) % 0x40) as u16,
                        hflip: x % 2 == 0,
                        ..TileAttributes::default()
                    },
                );
            }
        }
        let encoded = map.encode();
        let (decoded, consumed) = Tilemap2D::decode(&encoded).unwrap();
        assert_eq!(decoded, map);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_cell_count_mismatch_is_error() {
        let map = Tilemap2D::new(4, 4, 0);
        let mut encoded = map.encode();
        encoded[0] = 5; // lie about the width
        assert!(Tilemap2D::decode(&encoded).is_err());
    }
}
