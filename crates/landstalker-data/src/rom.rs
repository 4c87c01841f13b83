//! ROM collaborator: a flat addressable byte image
//!
//! All multi-byte reads are big-endian, as the 68000 laid them out.
//! Section and address lookups go through the declarative tables in
//! `labels`; the managers never hard-code offsets.

use std::path::Path;

use crate::error::{DataError, DataResult};
use crate::labels::{self, SectionSpec};

/// A named address range inside the ROM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub begin: u32,
    pub end: u32,
}

impl Section {
    pub fn len(&self) -> usize {
        (self.end - self.begin) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    pub fn contains(&self, addr: u32) -> bool {
        (self.begin..self.end).contains(&addr)
    }
}

impl From<&SectionSpec> for Section {
    fn from(spec: &SectionSpec) -> Self {
        Self {
            begin: spec.begin,
            end: spec.end,
        }
    }
}

/// Values readable straight out of the ROM image
pub trait RomValue: Copy + private::Sealed {
    const SIZE: usize;
    fn read_from(bytes: &[u8]) -> Self;
}

mod private {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
}

impl RomValue for u8 {
    const SIZE: usize = 1;
    fn read_from(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl RomValue for u16 {
    const SIZE: usize = 2;
    fn read_from(bytes: &[u8]) -> Self {
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}

impl RomValue for u32 {
    const SIZE: usize = 4;
    fn read_from(bytes: &[u8]) -> Self {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// The flat binary game image
#[derive(Debug, Clone)]
pub struct Rom {
    bytes: Vec<u8>,
}

impl Rom {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// A blank image sized for the declared section layout, for building
    /// ROMs from scratch (tests, injection dry-runs).
    pub fn blank() -> Self {
        Self {
            bytes: vec![0xFF; labels::ROM_SIZE],
        }
    }

    pub fn load(path: &Path) -> DataResult<Self> {
        Ok(Self {
            bytes: std::fs::read(path)?,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn checked(&self, addr: u32, len: usize) -> DataResult<&[u8]> {
        let start = addr as usize;
        if start + len > self.bytes.len() {
            return Err(DataError::RomBounds {
                addr,
                len,
                rom_len: self.bytes.len(),
            });
        }
        Ok(&self.bytes[start..start + len])
    }

    /// Big-endian scalar read
    pub fn read<T: RomValue>(&self, addr: u32) -> DataResult<T> {
        Ok(T::read_from(self.checked(addr, T::SIZE)?))
    }

    /// Big-endian array read
    pub fn read_array<T: RomValue>(&self, addr: u32, count: usize) -> DataResult<Vec<T>> {
        let bytes = self.checked(addr, T::SIZE * count)?;
        Ok(bytes.chunks_exact(T::SIZE).map(T::read_from).collect())
    }

    /// Auto-advancing read: `addr` moves past the value
    pub fn inc_read<T: RomValue>(&self, addr: &mut u32) -> DataResult<T> {
        let value = self.read::<T>(*addr)?;
        *addr += T::SIZE as u32;
        Ok(value)
    }

    /// Raw byte slice of an address range
    pub fn read_bytes(&self, addr: u32, len: usize) -> DataResult<Vec<u8>> {
        Ok(self.checked(addr, len)?.to_vec())
    }

    /// Section metadata for a label, from the declarative table
    pub fn get_section(&self, label: &str) -> DataResult<Section> {
        Ok(Section::from(labels::section(label)?))
    }

    /// Start address registered for a label
    pub fn get_address(&self, label: &str) -> DataResult<u32> {
        Ok(labels::section(label)?.begin)
    }

    /// The bytes a section currently holds
    pub fn section_bytes(&self, label: &str) -> DataResult<Vec<u8>> {
        let section = self.get_section(label)?;
        self.read_bytes(section.begin, section.len())
    }

    /// Overwrite a region (used by tests and injection dry-runs; real
    /// patching is the ROM patcher's job)
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> DataResult<()> {
        let start = addr as usize;
        if start + data.len() > self.bytes.len() {
            return Err(DataError::RomBounds {
                addr,
                len: data.len(),
                rom_len: self.bytes.len(),
            });
        }
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Recompute the Megadrive header checksum: the 16-bit word sum from
    /// offset 0x200, stored big-endian at 0x18E.
    pub fn update_checksum(&mut self) {
        if self.bytes.len() < 0x200 {
            return;
        }
        let mut sum: u32 = 0;
        for chunk in self.bytes[0x200..].chunks(2) {
            let word = if chunk.len() == 2 {
                (u32::from(chunk[0]) << 8) | u32::from(chunk[1])
            } else {
                u32::from(chunk[0]) << 8
            };
            sum = sum.wrapping_add(word);
        }
        let checksum = (sum & 0xFFFF) as u16;
        self.bytes[0x18E..0x190].copy_from_slice(&checksum.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_reads() {
        let rom = Rom::new(vec![0x12, 0x34, 0x56, 0x78]);
        assert_eq!(rom.read::<u8>(1).unwrap(), 0x34);
        assert_eq!(rom.read::<u16>(0).unwrap(), 0x1234);
        assert_eq!(rom.read::<u32>(0).unwrap(), 0x12345678);
    }

    #[test]
    fn test_inc_read_advances() {
        let rom = Rom::new(vec![0x00, 0x01, 0x00, 0x02]);
        let mut addr = 0;
        assert_eq!(rom.inc_read::<u16>(&mut addr).unwrap(), 1);
        assert_eq!(rom.inc_read::<u16>(&mut addr).unwrap(), 2);
        assert_eq!(addr, 4);
    }

    #[test]
    fn test_out_of_bounds_is_error() {
        let rom = Rom::new(vec![0; 4]);
        assert!(matches!(
            rom.read::<u32>(2),
            Err(DataError::RomBounds { .. })
        ));
    }

    #[test]
    fn test_section_lookup() {
        let rom = Rom::blank();
        let section = rom.get_section("Sprites::Frames").unwrap();
        assert_eq!(section.begin, 0x010000);
        assert!(section.contains(0x015000));
        assert!(rom.get_section("No::Such").is_err());
    }

    #[test]
    fn test_checksum_written() {
        let mut rom = Rom::new(vec![0u8; 0x400]);
        rom.write_bytes(0x200, &[0xAB, 0xCD]).unwrap();
        rom.update_checksum();
        assert_eq!(rom.read::<u16>(0x18E).unwrap(), 0xABCD);
    }
}
