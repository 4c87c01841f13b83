//! Blocksets: 2x2 tile-attribute blocks composing room maps
//!
//! Wire layout: `count u16 BE`, then per block a mask byte followed by
//! the literal attribute words. Mask bit `n` (low four bits) set means
//! corner `n` repeats the same corner of the previous block and its word
//! is omitted. The first block always carries all four words. Adjacent
//! blocks share most corners in practice, which is what the mask layer
//! exploits.

use crate::bytes;
use crate::error::{CodecError, CodecResult};
use crate::tile::TileAttributes;

/// One 2x2 block; corners are ordered TL, TR, BL, BR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Block {
    pub corners: [TileAttributes; 4],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blockset {
    pub blocks: Vec<Block>,
}

impl Blockset {
    /// Decode, returning the blockset and the source bytes consumed
    pub fn decode(data: &[u8]) -> CodecResult<(Self, usize)> {
        if data.len() < 2 {
            return Err(CodecError::malformed("blockset", "truncated header"));
        }
        let count = usize::from(bytes::read_u16(data, 0));
        let mut pos = 2;
        let mut blocks: Vec<Block> = Vec::with_capacity(count);
        for n in 0..count {
            let mask = *data
                .get(pos)
                .ok_or_else(|| CodecError::malformed("blockset", format!("truncated block {n}")))?;
            if n == 0 && mask != 0 {
                return Err(CodecError::malformed(
                    "blockset",
                    "first block cannot reference a predecessor",
                ));
            }
            pos += 1;
            let mut block = Block::default();
            for corner in 0..4 {
                if mask & (1 << corner) != 0 {
                    block.corners[corner] = blocks[n - 1].corners[corner];
                } else {
                    if pos + 2 > data.len() {
                        return Err(CodecError::malformed(
                            "blockset",
                            format!("truncated corner word in block {n}"),
                        ));
                    }
                    block.corners[corner] = TileAttributes::from_word(bytes::read_u16(data, pos));
                    pos += 2;
                }
            }
            blocks.push(block);
        }
        Ok((Self { blocks }, pos))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.blocks.len() * 9);
        bytes::push_u16(&mut out, self.blocks.len() as u16);
        for (n, block) in self.blocks.iter().enumerate() {
            let mut mask = 0u8;
            if n > 0 {
                for corner in 0..4 {
                    if block.corners[corner] == self.blocks[n - 1].corners[corner] {
                        mask |= 1 << corner;
                    }
                }
            }
            out.push(mask);
            for corner in 0..4 {
                if mask & (1 << corner) == 0 {
                    bytes::push_u16(&mut out, block.corners[corner].to_word());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attrs(index: u16) -> TileAttributes {
        TileAttributes {
            index,
            ..TileAttributes::default()
        }
    }

    #[test]
    fn test_round_trip_with_shared_corners() {
        let blocks = vec![
            Block {
                corners: [attrs(1), attrs(2), attrs(3), attrs(4)],
            },
            Block {
                // shares TL and BR with its predecessor
                corners: [attrs(1), attrs(9), attrs(8), attrs(4)],
            },
            Block {
                corners: [attrs(1), attrs(9), attrs(8), attrs(4)],
            },
        ];
        let set = Blockset { blocks };
        let encoded = set.encode();
        let (decoded, consumed) = Blockset::decode(&encoded).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(consumed, encoded.len());
        // Third block repeats all four corners: mask byte only
        let full = 2 + (1 + 8) + (1 + 4) + 1;
        assert_eq!(encoded.len(), full);
    }

    #[test]
    fn test_empty_blockset() {
        let set = Blockset::default();
        let encoded = set.encode();
        let (decoded, consumed) = Blockset::decode(&encoded).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_first_block_with_mask_is_error() {
        let data = [0x00, 0x01, 0x0F];
        assert!(Blockset::decode(&data).is_err());
    }
}
