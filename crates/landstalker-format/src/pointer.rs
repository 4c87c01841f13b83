//! Pointer-table reconstruction ("min-pointer slicing")
//!
//! ROM pointer tables store only start addresses: no lengths, and no
//! guarantee the addresses are monotonic with logical index order. Item
//! extents are recovered by sorting the distinct pointer values and using
//! each as the boundary of the previous item; the end of the final item is
//! the enclosing section's end, which callers supply (it comes from ROM
//! section metadata or a following table's base, never from the table
//! itself).
//!
//! Two logical indices frequently share one pointer value (e.g. two
//! animations reusing frame 0). Slicing must yield ONE physical item for
//! the shared address, referenced by both owners.

use crate::error::{CodecError, CodecResult};

/// Result of slicing a pointer table: distinct item extents plus a
/// logical-index -> item lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerSlices {
    /// Distinct `(begin, end)` extents in ascending address order
    pub items: Vec<(u32, u32)>,
    /// `index[logical]` is the position in `items` of that logical entry
    pub index: Vec<usize>,
}

impl PointerSlices {
    /// Extent of the item owned by `logical`
    pub fn extent(&self, logical: usize) -> (u32, u32) {
        self.items[self.index[logical]]
    }

    /// Smallest pointer value seen, i.e. the start of the sliced region
    pub fn region_begin(&self) -> Option<u32> {
        self.items.first().map(|&(begin, _)| begin)
    }
}

/// Slice a table of absolute pointers into item extents.
///
/// `section_end` bounds the final item and must come from the enclosing
/// section metadata. Every pointer must lie strictly below it.
pub fn slice_pointer_table(pointers: &[u32], section_end: u32) -> CodecResult<PointerSlices> {
    if pointers.is_empty() {
        return Ok(PointerSlices {
            items: Vec::new(),
            index: Vec::new(),
        });
    }
    for &p in pointers {
        if p >= section_end {
            return Err(CodecError::pointer(format!(
                "pointer {p:#08X} is outside its section (end {section_end:#08X})"
            )));
        }
    }

    let mut distinct: Vec<u32> = pointers.to_vec();
    distinct.sort_unstable();
    distinct.dedup();

    let mut items = Vec::with_capacity(distinct.len());
    for (i, &begin) in distinct.iter().enumerate() {
        let end = distinct.get(i + 1).copied().unwrap_or(section_end);
        items.push((begin, end));
    }

    // Map each logical index back to its item. Every pointer value is in
    // `distinct`, so the partition point is exactly its position.
    let index = pointers
        .iter()
        .map(|&p| distinct.partition_point(|&d| d < p))
        .collect();

    Ok(PointerSlices { items, index })
}

/// Slice a table of 16-bit offsets relative to an implicit base address.
pub fn slice_offset_table(
    base: u32,
    offsets: &[u16],
    section_end: u32,
) -> CodecResult<PointerSlices> {
    let pointers: Vec<u32> = offsets.iter().map(|&o| base + u32::from(o)).collect();
    slice_pointer_table(&pointers, section_end)
}

/// Inverse of slicing: lay items out contiguously from a base address in
/// first-use order and recompute every pointer as `base + running_offset`.
#[derive(Debug)]
pub struct PointerTableBuilder {
    base: u32,
    word_align: bool,
    pointers: Vec<u32>,
    blob: Vec<u8>,
}

impl PointerTableBuilder {
    /// `word_align` pads each item to an even length, required by formats
    /// whose consumers read word-at-a-time.
    pub fn new(base: u32, word_align: bool) -> Self {
        Self {
            base,
            word_align,
            pointers: Vec::new(),
            blob: Vec::new(),
        }
    }

    /// Append one item, returning the pointer assigned to it.
    pub fn push(&mut self, item: &[u8]) -> u32 {
        let pointer = self.base + self.blob.len() as u32;
        self.pointers.push(pointer);
        self.blob.extend_from_slice(item);
        if self.word_align && self.blob.len() % 2 != 0 {
            self.blob.push(0);
        }
        pointer
    }

    /// Address the next pushed item will receive
    pub fn next_pointer(&self) -> u32 {
        self.base + self.blob.len() as u32
    }

    /// Finish, yielding the recomputed pointers and the packed data blob
    pub fn finish(self) -> (Vec<u32>, Vec<u8>) {
        (self.pointers, self.blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_shared_pointer_yields_one_item() {
        // Animations 0 and 2 share frame data at 0x100
        let slices = slice_pointer_table(&[0x100, 0x140, 0x100, 0x180], 0x200).unwrap();
        assert_eq!(
            slices.items,
            vec![(0x100, 0x140), (0x140, 0x180), (0x180, 0x200)]
        );
        assert_eq!(slices.index, vec![0, 1, 0, 2]);
        assert_eq!(slices.extent(0), slices.extent(2));
    }

    #[test]
    fn test_non_monotonic_table() {
        let slices = slice_pointer_table(&[0x30, 0x10, 0x20], 0x40).unwrap();
        assert_eq!(slices.items, vec![(0x10, 0x20), (0x20, 0x30), (0x30, 0x40)]);
        assert_eq!(slices.index, vec![2, 0, 1]);
        assert_eq!(slices.region_begin(), Some(0x10));
    }

    #[test]
    fn test_pointer_past_section_end_rejected() {
        let err = slice_pointer_table(&[0x100, 0x400], 0x200).unwrap_err();
        assert!(matches!(err, CodecError::Pointer { .. }));
    }

    #[test]
    fn test_offset_table() {
        let slices = slice_offset_table(0x1000, &[0x00, 0x20, 0x00], 0x1040).unwrap();
        assert_eq!(slices.items, vec![(0x1000, 0x1020), (0x1020, 0x1040)]);
        assert_eq!(slices.index, vec![0, 1, 0]);
    }

    #[test]
    fn test_builder_layout_and_alignment() {
        let mut builder = PointerTableBuilder::new(0x2000, true);
        let p0 = builder.push(&[1, 2, 3]); // padded to 4
        let p1 = builder.push(&[4, 5]);
        let (pointers, blob) = builder.finish();
        assert_eq!((p0, p1), (0x2000, 0x2004));
        assert_eq!(pointers, vec![0x2000, 0x2004]);
        assert_eq!(blob, vec![1, 2, 3, 0, 4, 5]);
    }

    #[test]
    fn test_slice_then_layout_round_trip() {
        // Lay out three items, slice the resulting table, check extents
        let mut builder = PointerTableBuilder::new(0x100, true);
        for item in [&[0xAA; 0x40][..], &[0xBB; 0x40][..], &[0xCC; 0x20][..]] {
            builder.push(item);
        }
        let (pointers, blob) = builder.finish();
        let end = 0x100 + blob.len() as u32;
        let slices = slice_pointer_table(&pointers, end).unwrap();
        assert_eq!(slices.items.len(), 3);
        for (logical, &(begin, item_end)) in slices.items.iter().enumerate() {
            assert_eq!(begin, pointers[logical]);
            let len = (item_end - begin) as usize;
            let data = &blob[(begin - 0x100) as usize..(begin - 0x100) as usize + len];
            assert_eq!(data.len(), [0x40, 0x40, 0x20][logical]);
            assert!(data.iter().all(|&b| b == [0xAA, 0xBB, 0xCC][logical]));
        }
    }
}
