//! Landstalker wire-format codecs
//!
//! Leaf encoders/decoders for the asset formats embedded in the ROM.
//! Everything here is pure: bytes in, typed values out, and back, with
//! byte-exact round trips for valid inputs. Knowledge of where the data
//! lives (ROM sections, assembly include trees) belongs to the
//! `landstalker-data` crate.
//!
//! ## Organisation
//!
//! - **bytes**: fixed/variable-width table codecs, endian and bit-field
//!   helpers
//! - **pointer**: min-pointer slicing and the inverse layout builder
//! - **lz77**: the shared compression stream
//! - **huffman**: dialogue-string trees and region-sensitive charsets
//! - **tile / tileset / palette / tilemap2d / blockset / sprite_frame**:
//!   the decoded asset types

pub mod blockset;
pub mod bytes;
pub mod error;
pub mod huffman;
pub mod lz77;
pub mod palette;
pub mod pointer;
pub mod sprite_frame;
pub mod tile;
pub mod tilemap2d;
pub mod tileset;

// Re-exports for convenience
pub use blockset::{Block, Blockset};
pub use error::{CodecError, CodecResult};
pub use huffman::{HuffmanTrees, Region, deduce_region};
pub use palette::{Color, Palette, PaletteKind};
pub use pointer::{PointerSlices, PointerTableBuilder, slice_offset_table, slice_pointer_table};
pub use sprite_frame::{SpriteFrame, SubSprite};
pub use tile::{Tile, TileAttributes};
pub use tilemap2d::Tilemap2D;
pub use tileset::{AnimatedTileset, AnimatedTilesetHeader, Tileset};
