//! Shared data-manager machinery
//!
//! Each subsystem walks the same lifecycle: construct from one source
//! (assembly tree or ROM), snapshot everything, mutate freely, then
//! either save back to the tree (which commits) or produce pending
//! writes for the ROM patcher (which does not).

use crate::error::DataResult;
use crate::rom::Rom;
use std::path::Path;

/// One queued ROM patch: where it goes and what goes there. The actual
/// patching is a separate tool's job; managers only produce these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Label of the target section
    pub section: &'static str,
    pub bytes: Vec<u8>,
}

impl PendingWrite {
    pub fn new(section: &'static str, bytes: Vec<u8>) -> Self {
        Self { section, bytes }
    }
}

/// The contract every subsystem satisfies
pub trait DataManager {
    /// Any owned collection differs from its committed snapshot
    fn is_modified(&self) -> bool;

    /// Refresh every committed snapshot and clear pending writes
    fn commit_all_changes(&mut self);

    /// Serialise to the assembly tree under `dir`, in the fixed author
    /// ordering, then commit. Any step failure aborts the whole save.
    fn save(&mut self, dir: &Path) -> DataResult<()>;

    /// Serialise current state into `(section, bytes)` patch fragments.
    /// Never mutates the model and never commits.
    fn refresh_pending_writes(&mut self, rom: &Rom) -> DataResult<()>;

    /// The patch fragments produced by the latest refresh
    fn pending_writes(&self) -> &[PendingWrite];
}

/// Read a pointer table that fills the front of its section.
///
/// The table stores no length: it simply runs until the lowest pointer
/// seen so far, which is where the first item's data begins. Every
/// pointer must land inside the section.
pub fn read_pointer_table(rom: &Rom, section: crate::rom::Section) -> DataResult<Vec<u32>> {
    let mut pointers = Vec::new();
    let mut addr = section.begin;
    let mut running_min = section.end;
    while addr < running_min {
        let pointer = rom.inc_read::<u32>(&mut addr)?;
        if !section.contains(pointer) {
            return Err(crate::error::DataError::consistency(format!(
                "pointer {pointer:#08X} escapes its section ({:#08X}..{:#08X})",
                section.begin, section.end
            )));
        }
        running_min = running_min.min(pointer);
        pointers.push(pointer);
    }
    Ok(pointers)
}

/// Fit check used by every `rom_write_x` step before queueing a section
/// patch.
pub fn check_section_fit(
    section: &'static str,
    len: usize,
    capacity: usize,
) -> DataResult<()> {
    if len > capacity {
        return Err(crate::error::DataError::consistency(format!(
            "section {section} overflow: {len} byte(s) into {capacity}"
        )));
    }
    Ok(())
}
