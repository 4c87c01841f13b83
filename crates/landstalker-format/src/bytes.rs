//! Fixed-width and variable-width table codecs
//!
//! The ROM stores most auxiliary tables as arrays of fixed N-byte records
//! terminated by a `0xFF` sentinel, or as byte-keyed maps of alternating
//! key/value records terminated by a `0xFF` key. These helpers convert
//! between those layouts and typed collections, plus the big-endian
//! split/insert and bit-field helpers the record types are built from.

use std::collections::BTreeMap;

/// Record terminator byte used by the game's table formats
pub const TERMINATOR: u8 = 0xFF;

/// Deserialise an array of fixed N-byte records.
///
/// Consumes N bytes at a time and stops at the first record whose leading
/// byte is `0xFF`. A trailing run of fewer than N bytes is dropped, not an
/// error: some tables pad with garbage up to the next section boundary.
pub fn deserialise_fixed_width<const N: usize>(bytes: &[u8]) -> Vec<[u8; N]> {
    let mut records = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] == TERMINATOR {
            break;
        }
        if pos + N > bytes.len() {
            log::warn!(
                "dropping {} trailing byte(s), short of a full {N}-byte record",
                bytes.len() - pos
            );
            break;
        }
        let mut record = [0u8; N];
        record.copy_from_slice(&bytes[pos..pos + N]);
        records.push(record);
        pos += N;
    }
    records
}

/// Serialise an array of fixed N-byte records.
///
/// When `terminate` is set, a `0xFF` sentinel is appended, followed by a
/// second `0xFF` if the resulting length would be odd (word alignment).
pub fn serialise_fixed_width<const N: usize>(records: &[[u8; N]], terminate: bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(records.len() * N + 2);
    for record in records {
        bytes.extend_from_slice(record);
    }
    if terminate {
        bytes.push(TERMINATOR);
        if bytes.len() % 2 != 0 {
            bytes.push(TERMINATOR);
        }
    }
    bytes
}

/// Deserialise a byte-keyed map of N-byte values.
///
/// Layout is alternating `key, value[N]` records; a key of `0xFF`
/// terminates. A truncated final value is dropped with a warning.
pub fn deserialise_map<const N: usize>(bytes: &[u8]) -> BTreeMap<u8, [u8; N]> {
    let mut map = BTreeMap::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let key = bytes[pos];
        if key == TERMINATOR {
            break;
        }
        if pos + 1 + N > bytes.len() {
            log::warn!(
                "dropping truncated map value for key {key:#04X} ({} byte(s) short)",
                pos + 1 + N - bytes.len()
            );
            break;
        }
        let mut value = [0u8; N];
        value.copy_from_slice(&bytes[pos + 1..pos + 1 + N]);
        map.insert(key, value);
        pos += 1 + N;
    }
    map
}

/// Serialise a byte-keyed map in ascending key order, `0xFF`-terminated
/// and padded to an even length.
pub fn serialise_map<const N: usize>(map: &BTreeMap<u8, [u8; N]>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(map.len() * (N + 1) + 2);
    for (key, value) in map {
        bytes.push(*key);
        bytes.extend_from_slice(value);
    }
    bytes.push(TERMINATOR);
    if bytes.len() % 2 != 0 {
        bytes.push(TERMINATOR);
    }
    bytes
}

/// Read a big-endian u16 at `offset`. Caller guarantees bounds.
pub fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

/// Read a big-endian u32 at `offset`. Caller guarantees bounds.
pub fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Append a big-endian u16.
pub fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Append a big-endian u32.
pub fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Overwrite a big-endian u16 in place.
pub fn write_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Overwrite a big-endian u32 in place.
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Extract `width` bits starting at `shift` (from bit 0).
pub fn unpack_bits(value: u16, shift: u32, width: u32) -> u16 {
    (value >> shift) & ((1 << width) - 1)
}

/// Insert `field` as a `width`-bit value at `shift`, replacing the old bits.
pub fn pack_bits(value: u16, shift: u32, width: u32, field: u16) -> u16 {
    let mask = ((1u16 << width) - 1) << shift;
    (value & !mask) | ((field << shift) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixed_width_round_trip() {
        let records: Vec<[u8; 3]> = vec![[1, 2, 3], [4, 5, 6]];
        let bytes = serialise_fixed_width(&records, true);
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, 0xFF, 0xFF]);
        assert_eq!(deserialise_fixed_width::<3>(&bytes), records);
    }

    #[test]
    fn test_fixed_width_empty_terminated() {
        let bytes = serialise_fixed_width::<4>(&[], true);
        // 0xFF sentinel plus alignment pad
        assert_eq!(bytes, vec![0xFF, 0xFF]);
        let even: Vec<[u8; 2]> = vec![[1, 2]];
        let bytes = serialise_fixed_width(&even, true);
        assert_eq!(bytes, vec![1, 2, 0xFF, 0xFF]);
    }

    #[test]
    fn test_fixed_width_drops_partial_record() {
        // Two full records and one byte of a third
        let bytes = [1, 2, 3, 4, 5];
        let records = deserialise_fixed_width::<2>(&bytes);
        assert_eq!(records, vec![[1, 2], [3, 4]]);
    }

    #[test]
    fn test_map_round_trip() {
        let mut map = BTreeMap::new();
        map.insert(0x01, [0xAA, 0xBB]);
        map.insert(0x07, [0xCC, 0xDD]);
        let bytes = serialise_map(&map);
        assert_eq!(bytes, vec![0x01, 0xAA, 0xBB, 0x07, 0xCC, 0xDD, 0xFF, 0xFF]);
        assert_eq!(deserialise_map::<2>(&bytes), map);
    }

    #[test]
    fn test_map_terminates_on_ff_key() {
        let bytes = [0x02, 0x10, 0xFF, 0x03, 0x20];
        let map = deserialise_map::<1>(&bytes);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&0x02], [0x10]);
    }

    #[test]
    fn test_bit_fields() {
        let packed = pack_bits(pack_bits(0, 11, 2, 0b10), 0, 6, 0x2A);
        assert_eq!(unpack_bits(packed, 11, 2), 0b10);
        assert_eq!(unpack_bits(packed, 0, 6), 0x2A);
    }

    #[test]
    fn test_endian_helpers() {
        let mut buf = Vec::new();
        push_u16(&mut buf, 0x1234);
        push_u32(&mut buf, 0xDEADBEEF);
        assert_eq!(read_u16(&buf, 0), 0x1234);
        assert_eq!(read_u32(&buf, 2), 0xDEADBEEF);
        write_u16(&mut buf, 0, 0xABCD);
        assert_eq!(read_u16(&buf, 0), 0xABCD);
    }
}
