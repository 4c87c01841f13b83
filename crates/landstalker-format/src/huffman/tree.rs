//! Huffman trees for the dialogue text codec
//!
//! One tree exists per *preceding* symbol: the tree used to decode the
//! next character is selected by the character before it (end-of-string
//! at the start of a string). The ROM stores the whole forest as two
//! blobs: `offsets`, a table of 16-bit big-endian offsets indexed by
//! preceding symbol (0xFFFF when that symbol never precedes anything),
//! and `tables`, the concatenated preorder tree serialisations.
//!
//! Tree node wire format, preorder: `0x00` introduces a branch (left
//! subtree, then right subtree), `0x01 sym` is a leaf. Decoding walks one
//! bit at a time, 0 = left, 1 = right, MSB first.

use std::collections::BTreeMap;

use super::charset::Region;
use crate::error::{CodecError, CodecResult};

const NO_TREE: u16 = 0xFFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Leaf(u8),
    Branch { left: usize, right: usize },
}

/// A single decode/encode tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
}

impl HuffmanTree {
    /// Build from symbol frequencies. Ties are broken by creation order
    /// so identical inputs always produce identical trees, which keeps
    /// the serialised blobs byte-stable across re-encodes.
    pub fn from_frequencies(freqs: &BTreeMap<u8, usize>) -> Option<Self> {
        if freqs.is_empty() {
            return None;
        }
        let mut tree = Self { nodes: Vec::new() };
        // (weight, tiebreak, node index) kept sorted ascending
        let mut queue: Vec<(usize, usize, usize)> = Vec::new();
        let mut seq = 0usize;
        for (&symbol, &weight) in freqs {
            tree.nodes.push(Node::Leaf(symbol));
            queue.push((weight, seq, tree.nodes.len() - 1));
            seq += 1;
        }
        if queue.len() == 1 {
            // A one-symbol tree still needs a branch so the code is one
            // bit long rather than zero bits
            let leaf = queue[0].2;
            tree.nodes.push(Node::Branch {
                left: leaf,
                right: leaf,
            });
            return Some(tree.rooted_at(tree.nodes.len() - 1));
        }
        while queue.len() > 1 {
            queue.sort_unstable();
            let (wl, _, left) = queue.remove(0);
            let (wr, _, right) = queue.remove(0);
            tree.nodes.push(Node::Branch { left, right });
            queue.push((wl + wr, seq, tree.nodes.len() - 1));
            seq += 1;
        }
        Some(tree.rooted_at(queue[0].2))
    }

    /// Re-index so the given node becomes node 0, preorder
    fn rooted_at(&self, root: usize) -> Self {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        self.copy_subtree(root, &mut nodes);
        Self { nodes }
    }

    fn copy_subtree(&self, node: usize, out: &mut Vec<Node>) -> usize {
        let slot = out.len();
        match self.nodes[node] {
            Node::Leaf(symbol) => out.push(Node::Leaf(symbol)),
            Node::Branch { left, right } => {
                out.push(Node::Branch { left: 0, right: 0 });
                let l = self.copy_subtree(left, out);
                let r = self.copy_subtree(right, out);
                out[slot] = Node::Branch { left: l, right: r };
            }
        }
        slot
    }

    /// Parse a preorder serialisation, returning the tree and the number
    /// of bytes consumed.
    pub fn from_bytes(bytes: &[u8]) -> CodecResult<(Self, usize)> {
        let mut nodes = Vec::new();
        let consumed = Self::parse_node(bytes, 0, &mut nodes)?;
        Ok((Self { nodes }, consumed))
    }

    fn parse_node(bytes: &[u8], pos: usize, nodes: &mut Vec<Node>) -> CodecResult<usize> {
        match bytes.get(pos) {
            Some(0x00) => {
                let slot = nodes.len();
                nodes.push(Node::Branch { left: 0, right: 0 });
                let left = nodes.len();
                let after_left = Self::parse_node(bytes, pos + 1, nodes)?;
                let right = nodes.len();
                let after_right = Self::parse_node(bytes, after_left, nodes)?;
                nodes[slot] = Node::Branch { left, right };
                Ok(after_right)
            }
            Some(0x01) => {
                let symbol = *bytes
                    .get(pos + 1)
                    .ok_or_else(|| CodecError::huffman("truncated leaf node"))?;
                nodes.push(Node::Leaf(symbol));
                Ok(pos + 2)
            }
            Some(tag) => Err(CodecError::huffman(format!(
                "unknown tree node tag {tag:#04X} at offset {pos}"
            ))),
            None => Err(CodecError::huffman("truncated tree")),
        }
    }

    /// Preorder serialisation (the `tables` blob fragment for this tree)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.nodes.len() * 2);
        self.write_node(0, &mut out);
        out
    }

    fn write_node(&self, node: usize, out: &mut Vec<u8>) {
        match self.nodes[node] {
            Node::Leaf(symbol) => {
                out.push(0x01);
                out.push(symbol);
            }
            Node::Branch { left, right } => {
                out.push(0x00);
                self.write_node(left, out);
                self.write_node(right, out);
            }
        }
    }

    /// Walk one symbol off the bit reader
    pub fn decode_symbol(&self, bits: &mut BitReader<'_>) -> CodecResult<u8> {
        let mut node = 0usize;
        loop {
            match self.nodes[node] {
                Node::Leaf(symbol) => return Ok(symbol),
                Node::Branch { left, right } => {
                    let bit = bits
                        .next_bit()
                        .ok_or_else(|| CodecError::huffman("bit stream exhausted mid-symbol"))?;
                    node = if bit { right } else { left };
                }
            }
        }
    }

    /// Code table: symbol -> bit path (0 = left)
    pub fn codes(&self) -> BTreeMap<u8, Vec<bool>> {
        let mut codes = BTreeMap::new();
        let mut path = Vec::new();
        self.collect_codes(0, &mut path, &mut codes);
        codes
    }

    fn collect_codes(&self, node: usize, path: &mut Vec<bool>, codes: &mut BTreeMap<u8, Vec<bool>>) {
        match self.nodes[node] {
            Node::Leaf(symbol) => {
                codes.entry(symbol).or_insert_with(|| path.clone());
            }
            Node::Branch { left, right } => {
                path.push(false);
                self.collect_codes(left, path, codes);
                path.pop();
                path.push(true);
                self.collect_codes(right, path, codes);
                path.pop();
            }
        }
    }
}

/// MSB-first bit reader over a byte slice
pub struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    bit: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            bit: 0,
        }
    }

    pub fn next_bit(&mut self) -> Option<bool> {
        let byte = *self.bytes.get(self.pos)?;
        let bit = byte & (0x80 >> self.bit) != 0;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.pos += 1;
        }
        Some(bit)
    }
}

/// MSB-first bit writer, zero-padded to a byte boundary on finish
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bit(&mut self, bit: bool) {
        if self.bit == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> self.bit;
        }
        self.bit = (self.bit + 1) % 8;
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// The whole forest: one tree per preceding symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTrees {
    region: Region,
    trees: BTreeMap<u8, HuffmanTree>,
}

impl HuffmanTrees {
    pub fn region(&self) -> Region {
        self.region
    }

    /// Rebuild every tree from scratch over the complete current string
    /// set. The forest is shared by all strings, so a partial rebuild is
    /// never sound; callers gate this on the dirty check instead.
    pub fn recalculate_trees(region: Region, strings: &[Vec<u8>]) -> Self {
        let eos = region.eos_marker();
        let mut pair_freqs: BTreeMap<u8, BTreeMap<u8, usize>> = BTreeMap::new();
        for string in strings {
            let mut prev = eos;
            for &symbol in string.iter().chain(std::iter::once(&eos)) {
                *pair_freqs
                    .entry(prev)
                    .or_default()
                    .entry(symbol)
                    .or_insert(0) += 1;
                prev = symbol;
            }
        }
        let trees = pair_freqs
            .iter()
            .filter_map(|(&prev, freqs)| HuffmanTree::from_frequencies(freqs).map(|t| (prev, t)))
            .collect();
        Self { region, trees }
    }

    /// Rehydrate the forest from the ROM's `offsets`/`tables` blobs
    pub fn from_blobs(region: Region, offsets: &[u8], tables: &[u8]) -> CodecResult<Self> {
        let mut trees = BTreeMap::new();
        for symbol in 0..region.charset_size() {
            let entry = symbol * 2;
            if entry + 2 > offsets.len() {
                break;
            }
            let offset = u16::from_be_bytes([offsets[entry], offsets[entry + 1]]);
            if offset == NO_TREE {
                continue;
            }
            let offset = offset as usize;
            if offset >= tables.len() {
                return Err(CodecError::huffman(format!(
                    "tree offset {offset:#06X} outside tables blob for symbol {symbol:#04X}"
                )));
            }
            let (tree, _) = HuffmanTree::from_bytes(&tables[offset..])?;
            trees.insert(symbol as u8, tree);
        }
        Ok(Self { region, trees })
    }

    /// Serialise the forest back to `offsets`/`tables` blobs. Iteration
    /// is in symbol order and tree serialisation is deterministic, so an
    /// unchanged forest reproduces byte-identical blobs.
    pub fn to_blobs(&self) -> (Vec<u8>, Vec<u8>) {
        let mut offsets = Vec::with_capacity(self.region.charset_size() * 2);
        let mut tables = Vec::new();
        for symbol in 0..self.region.charset_size() {
            match self.trees.get(&(symbol as u8)) {
                Some(tree) => {
                    offsets.extend_from_slice(&(tables.len() as u16).to_be_bytes());
                    tables.extend_from_slice(&tree.to_bytes());
                }
                None => offsets.extend_from_slice(&NO_TREE.to_be_bytes()),
            }
        }
        (offsets, tables)
    }

    /// Decode one string (symbols only, end-of-string consumed and
    /// dropped)
    pub fn decode_string(&self, bytes: &[u8]) -> CodecResult<Vec<u8>> {
        let eos = self.region.eos_marker();
        let mut bits = BitReader::new(bytes);
        let mut symbols = Vec::new();
        let mut prev = eos;
        loop {
            let tree = self.trees.get(&prev).ok_or_else(|| {
                CodecError::huffman(format!("no tree for preceding symbol {prev:#04X}"))
            })?;
            let symbol = tree.decode_symbol(&mut bits)?;
            if symbol == eos {
                return Ok(symbols);
            }
            symbols.push(symbol);
            prev = symbol;
        }
    }

    /// Encode one string, appending the end-of-string symbol and padding
    /// the final byte with zero bits.
    pub fn encode_string(&self, symbols: &[u8]) -> CodecResult<Vec<u8>> {
        let eos = self.region.eos_marker();
        let mut bits = BitWriter::new();
        let mut prev = eos;
        for &symbol in symbols.iter().chain(std::iter::once(&eos)) {
            let tree = self.trees.get(&prev).ok_or_else(|| {
                CodecError::huffman(format!("no tree for preceding symbol {prev:#04X}"))
            })?;
            let codes = tree.codes();
            let code = codes.get(&symbol).ok_or_else(|| {
                CodecError::huffman(format!(
                    "symbol {symbol:#04X} has no code after {prev:#04X}"
                ))
            })?;
            for &bit in code {
                bits.push_bit(bit);
            }
            prev = symbol;
        }
        Ok(bits.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::huffman::charset::Region;
    use pretty_assertions::assert_eq;

    fn sample_strings() -> Vec<Vec<u8>> {
        vec![
            vec![0x01, 0x02, 0x03, 0x02, 0x01],
            vec![0x01, 0x02],
            vec![0x10, 0x11, 0x12, 0x10, 0x11, 0x12, 0x10],
            vec![],
        ]
    }

    #[test]
    fn test_single_symbol_tree_uses_one_bit() {
        let mut freqs = BTreeMap::new();
        freqs.insert(0x41, 7usize);
        let tree = HuffmanTree::from_frequencies(&freqs).unwrap();
        let codes = tree.codes();
        assert_eq!(codes[&0x41].len(), 1);
    }

    #[test]
    fn test_tree_serialisation_round_trip() {
        let mut freqs = BTreeMap::new();
        for (symbol, weight) in [(1u8, 10usize), (2, 4), (3, 4), (4, 1)] {
            freqs.insert(symbol, weight);
        }
        let tree = HuffmanTree::from_frequencies(&freqs).unwrap();
        let bytes = tree.to_bytes();
        let (parsed, consumed) = HuffmanTree::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_string_round_trip() {
        let strings = sample_strings();
        let trees = HuffmanTrees::recalculate_trees(Region::UnitedStates, &strings);
        for string in &strings {
            let packed = trees.encode_string(string).unwrap();
            assert_eq!(trees.decode_string(&packed).unwrap(), *string);
        }
    }

    #[test]
    fn test_blob_round_trip_and_idempotence() {
        let strings = sample_strings();
        let trees = HuffmanTrees::recalculate_trees(Region::UnitedStates, &strings);
        let (offsets, tables) = trees.to_blobs();
        let reloaded = HuffmanTrees::from_blobs(Region::UnitedStates, &offsets, &tables).unwrap();
        assert_eq!(reloaded, trees);

        // Rebuilding over the same unchanged set must be byte-stable
        let rebuilt = HuffmanTrees::recalculate_trees(Region::UnitedStates, &strings);
        let (offsets2, tables2) = rebuilt.to_blobs();
        assert_eq!(offsets2, offsets);
        assert_eq!(tables2, tables);
    }

    #[test]
    fn test_decode_rejects_unknown_context() {
        let trees = HuffmanTrees::recalculate_trees(Region::UnitedStates, &[vec![1, 2, 3]]);
        // 0x40 never precedes anything in the training set
        let err = trees.encode_string(&[0x40, 0x41]).unwrap_err();
        assert!(matches!(err, crate::error::CodecError::Huffman { .. }));
    }
}
