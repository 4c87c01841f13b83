//! Bit-packed auxiliary records
//!
//! Each record type mirrors a table the game engine reads directly, so
//! the bit positions are wire format, not design choices: do not tidy
//! them. Every type pairs `from_bytes` with `to_bytes` over a fixed
//! width and round-trips exactly. The owning tables use the fixed-width
//! codec with its `0xFF` terminator, which is why a room index of
//! `0x7FF` (11 bits, all ones in the top byte) never occurs in practice.

use landstalker_format::bytes::{pack_bits, unpack_bits};

/// Controls whether an entity is hidden once a story flag is set.
/// Layout: word0 = `room(11) << 5 | entity(5)`,
/// word1 = `set(1) << 15 | flag(11)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntityVisibilityFlag {
    pub room: u16,
    pub entity: u8,
    pub flag: u16,
    /// Hidden when the flag is SET (as opposed to hidden until set)
    pub hide_when_set: bool,
}

impl EntityVisibilityFlag {
    pub const WIDTH: usize = 4;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        let word0 = u16::from_be_bytes([bytes[0], bytes[1]]);
        let word1 = u16::from_be_bytes([bytes[2], bytes[3]]);
        Self {
            room: unpack_bits(word0, 5, 11),
            entity: unpack_bits(word0, 0, 5) as u8,
            flag: unpack_bits(word1, 0, 11),
            hide_when_set: unpack_bits(word1, 15, 1) != 0,
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut word0 = 0;
        word0 = pack_bits(word0, 5, 11, self.room);
        word0 = pack_bits(word0, 0, 5, u16::from(self.entity));
        let mut word1 = 0;
        word1 = pack_bits(word1, 15, 1, u16::from(self.hide_when_set));
        word1 = pack_bits(word1, 0, 11, self.flag);
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&word0.to_be_bytes());
        bytes[2..4].copy_from_slice(&word1.to_be_bytes());
        bytes
    }
}

/// Swaps a region of a room's tilemap when a flag is set (opened doors,
/// lowered drawbridges). Layout: word0 = `room(11) << 4 | swap(4)`,
/// word1 = `always(1) << 15 | flag(11)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileSwapFlag {
    pub room: u16,
    pub swap_index: u8,
    pub flag: u16,
    /// Swap applies unconditionally (flag ignored by the engine but
    /// still stored)
    pub always: bool,
}

impl TileSwapFlag {
    pub const WIDTH: usize = 4;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        let word0 = u16::from_be_bytes([bytes[0], bytes[1]]);
        let word1 = u16::from_be_bytes([bytes[2], bytes[3]]);
        Self {
            room: unpack_bits(word0, 4, 11),
            swap_index: unpack_bits(word0, 0, 4) as u8,
            flag: unpack_bits(word1, 0, 11),
            always: unpack_bits(word1, 15, 1) != 0,
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut word0 = 0;
        word0 = pack_bits(word0, 4, 11, self.room);
        word0 = pack_bits(word0, 0, 4, u16::from(self.swap_index));
        let mut word1 = 0;
        word1 = pack_bits(word1, 15, 1, u16::from(self.always));
        word1 = pack_bits(word1, 0, 11, self.flag);
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&word0.to_be_bytes());
        bytes[2..4].copy_from_slice(&word1.to_be_bytes());
        bytes
    }
}

/// Marks a room as "cleared" once a flag is set (defeated boss rooms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomClearFlag {
    pub room: u16,
    pub flag: u16,
}

impl RoomClearFlag {
    pub const WIDTH: usize = 4;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        Self {
            room: u16::from_be_bytes([bytes[0], bytes[1]]),
            flag: u16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&self.room.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.flag.to_be_bytes());
        bytes
    }
}

/// Sacred tree cut-down state, one flag per tree room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SacredTreeFlag {
    pub room: u16,
    pub flag: u16,
}

impl SacredTreeFlag {
    pub const WIDTH: usize = 4;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        Self {
            room: u16::from_be_bytes([bytes[0], bytes[1]]),
            flag: u16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&self.room.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.flag.to_be_bytes());
        bytes
    }
}

/// Pairs two tree rooms for the warp network, gated by a flag.
/// Layout: three big-endian words, `room2`'s top bit marks a one-way
/// link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeWarpFlag {
    pub room1: u16,
    pub room2: u16,
    pub flag: u16,
    pub one_way: bool,
}

impl TreeWarpFlag {
    pub const WIDTH: usize = 6;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        let room2 = u16::from_be_bytes([bytes[2], bytes[3]]);
        Self {
            room1: u16::from_be_bytes([bytes[0], bytes[1]]),
            room2: unpack_bits(room2, 0, 11),
            flag: u16::from_be_bytes([bytes[4], bytes[5]]),
            one_way: unpack_bits(room2, 15, 1) != 0,
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut room2 = 0;
        room2 = pack_bits(room2, 15, 1, u16::from(self.one_way));
        room2 = pack_bits(room2, 0, 11, self.room2);
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&self.room1.to_be_bytes());
        bytes[2..4].copy_from_slice(&room2.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.flag.to_be_bytes());
        bytes
    }
}

/// A connection between two rooms. The room words carry the warp type
/// in bits 11-12 (0 normal, 1 stairs up, 2 stairs down, 3 ladder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Warp {
    pub room1: u16,
    pub x1: u8,
    pub y1: u8,
    pub room2: u16,
    pub x2: u8,
    pub y2: u8,
    pub warp_type: u8,
}

impl Warp {
    pub const WIDTH: usize = 8;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        let word1 = u16::from_be_bytes([bytes[0], bytes[1]]);
        let word2 = u16::from_be_bytes([bytes[4], bytes[5]]);
        Self {
            room1: unpack_bits(word1, 0, 11),
            warp_type: unpack_bits(word1, 11, 2) as u8,
            x1: bytes[2],
            y1: bytes[3],
            room2: unpack_bits(word2, 0, 11),
            x2: bytes[6],
            y2: bytes[7],
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut word1 = 0;
        word1 = pack_bits(word1, 11, 2, u16::from(self.warp_type));
        word1 = pack_bits(word1, 0, 11, self.room1);
        let word2 = pack_bits(0, 0, 11, self.room2);
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&word1.to_be_bytes());
        bytes[2] = self.x1;
        bytes[3] = self.y1;
        bytes[4..6].copy_from_slice(&word2.to_be_bytes());
        bytes[6] = self.x2;
        bytes[7] = self.y2;
        bytes
    }
}

/// A door within a room: position plus orientation packed in byte 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Door {
    pub room: u16,
    pub x: u8,
    pub y: u8,
    /// 0 = north, 1 = east, 2 = south, 3 = west
    pub orientation: u8,
}

impl Door {
    pub const WIDTH: usize = 4;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        Self {
            room: u16::from_be_bytes([bytes[0], bytes[1]]),
            x: bytes[2] & 0x3F,
            orientation: bytes[2] >> 6,
            y: bytes[3],
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&self.room.to_be_bytes());
        bytes[2] = (self.orientation << 6) | (self.x & 0x3F);
        bytes[3] = self.y;
        bytes
    }
}

/// Chest contents, keyed to a room. `flags` packs the money bit and the
/// argument nibble the engine hands to the pickup routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Chest {
    pub room: u16,
    pub item: u8,
    pub flags: u8,
}

impl Chest {
    pub const WIDTH: usize = 4;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        Self {
            room: u16::from_be_bytes([bytes[0], bytes[1]]),
            item: bytes[2],
            flags: bytes[3],
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        let mut bytes = [0u8; Self::WIDTH];
        bytes[0..2].copy_from_slice(&self.room.to_be_bytes());
        bytes[2] = self.item;
        bytes[3] = self.flags;
        bytes
    }
}

/// A packed room record: which tileset, blockset, palette and music a
/// room uses, plus engine parameters carried verbatim.
/// Layout: byte0 = `blockset(3) << 5 | tileset(5)`,
/// byte1 = `backdrop(2) << 6 | palette(6)`, byte2 = bgm, bytes 3-7 are
/// save coordinates and raw engine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomRecord {
    pub tileset: u8,
    pub blockset: u8,
    pub palette: u8,
    pub backdrop: u8,
    pub bgm: u8,
    pub save_x: u8,
    pub save_y: u8,
    /// Engine parameters this layer does not interpret
    pub params: [u8; 3],
}

impl RoomRecord {
    pub const WIDTH: usize = 8;

    pub fn from_bytes(bytes: &[u8; Self::WIDTH]) -> Self {
        Self {
            tileset: bytes[0] & 0x1F,
            blockset: bytes[0] >> 5,
            palette: bytes[1] & 0x3F,
            backdrop: bytes[1] >> 6,
            bgm: bytes[2],
            save_x: bytes[3],
            save_y: bytes[4],
            params: [bytes[5], bytes[6], bytes[7]],
        }
    }

    pub fn to_bytes(self) -> [u8; Self::WIDTH] {
        [
            (self.blockset << 5) | (self.tileset & 0x1F),
            (self.backdrop << 6) | (self.palette & 0x3F),
            self.bgm,
            self.save_x,
            self.save_y,
            self.params[0],
            self.params[1],
            self.params[2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entity_visibility_round_trip() {
        let flag = EntityVisibilityFlag {
            room: 0x29A,
            entity: 0x13,
            flag: 0x155,
            hide_when_set: true,
        };
        assert_eq!(EntityVisibilityFlag::from_bytes(&flag.to_bytes()), flag);
        // word0 spot check: room in the high bits
        let bytes = flag.to_bytes();
        let word0 = u16::from_be_bytes([bytes[0], bytes[1]]);
        assert_eq!(word0 >> 5, 0x29A);
        assert_eq!(word0 & 0x1F, 0x13);
    }

    #[test]
    fn test_tile_swap_round_trip() {
        let flag = TileSwapFlag {
            room: 0x120,
            swap_index: 0xF,
            flag: 0x7FF,
            always: false,
        };
        assert_eq!(TileSwapFlag::from_bytes(&flag.to_bytes()), flag);
    }

    #[test]
    fn test_tree_warp_one_way_bit() {
        let flag = TreeWarpFlag {
            room1: 0x050,
            room2: 0x051,
            flag: 0x200,
            one_way: true,
        };
        let bytes = flag.to_bytes();
        assert_eq!(bytes[2] & 0x80, 0x80);
        assert_eq!(TreeWarpFlag::from_bytes(&bytes), flag);
    }

    #[test]
    fn test_warp_type_bits() {
        let warp = Warp {
            room1: 0x012,
            x1: 10,
            y1: 20,
            room2: 0x345,
            x2: 30,
            y2: 40,
            warp_type: 2,
        };
        let bytes = warp.to_bytes();
        assert_eq!(Warp::from_bytes(&bytes), warp);
        let word1 = u16::from_be_bytes([bytes[0], bytes[1]]);
        assert_eq!((word1 >> 11) & 0x3, 2);
    }

    #[test]
    fn test_door_packing() {
        let door = Door {
            room: 0x100,
            x: 0x2A,
            y: 0x10,
            orientation: 3,
        };
        let bytes = door.to_bytes();
        assert_eq!(bytes[2], 0xC0 | 0x2A);
        assert_eq!(Door::from_bytes(&bytes), door);
    }

    #[test]
    fn test_room_record_round_trip() {
        let room = RoomRecord {
            tileset: 0x1F,
            blockset: 5,
            palette: 0x21,
            backdrop: 2,
            bgm: 0x0C,
            save_x: 18,
            save_y: 22,
            params: [1, 2, 3],
        };
        let bytes = room.to_bytes();
        assert_eq!(bytes[0], (5 << 5) | 0x1F);
        assert_eq!(RoomRecord::from_bytes(&bytes), room);
    }

    #[test]
    fn test_simple_records_round_trip() {
        let clear = RoomClearFlag { room: 3, flag: 9 };
        assert_eq!(RoomClearFlag::from_bytes(&clear.to_bytes()), clear);
        let tree = SacredTreeFlag { room: 7, flag: 0x101 };
        assert_eq!(SacredTreeFlag::from_bytes(&tree.to_bytes()), tree);
        let chest = Chest { room: 0x222, item: 0x40, flags: 0x81 };
        assert_eq!(Chest::from_bytes(&chest.to_bytes()), chest);
    }
}
