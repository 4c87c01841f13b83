//! Huffman dialogue-string codec
//!
//! Strings live in banks of length-prefixed compressed strings; the
//! shared tree forest is described by the `offsets`/`tables` blobs. The
//! bank layer itself (length prefixes, zero sentinel) belongs to the
//! string data manager; this module owns the trees, the bit codec and
//! the region-sensitive charset.

pub mod charset;
pub mod tree;

pub use charset::{
    Region, char_to_symbol, deduce_region, fold_diacritic, symbol_to_char, unfold_diacritic,
};
pub use tree::{BitReader, BitWriter, HuffmanTree, HuffmanTrees};
