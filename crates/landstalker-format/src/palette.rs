//! Genesis palettes
//!
//! A color is a 9-bit BGR value in a VDP CRAM word: `0000 BBB0 GGG0 RRR0`.
//! Most palettes in the ROM are partial: they describe a run of slots
//! inside one 16-color palette line, with the remaining slots implied
//! (slot 0 is transparent, slot 1 is reserved for text). The kind tells
//! the codec which run a blob covers.

use crate::error::{CodecError, CodecResult};

/// One 9-bit BGR color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color(u16);

impl Color {
    pub fn from_word(word: u16) -> Self {
        Self(word & 0x0EEE)
    }

    pub fn to_word(self) -> u16 {
        self.0
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let word = (u16::from(b >> 5) << 9) | (u16::from(g >> 5) << 5) | (u16::from(r >> 5) << 1);
        Self(word)
    }

    /// 8-bit channel approximations for display
    pub fn rgb(self) -> (u8, u8, u8) {
        let r = ((self.0 >> 1) & 0x7) as u8;
        let g = ((self.0 >> 5) & 0x7) as u8;
        let b = ((self.0 >> 9) & 0x7) as u8;
        (r << 5, g << 5, b << 5)
    }
}

/// Which run of palette slots a blob covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteKind {
    /// All 16 slots
    Full,
    /// Room palettes: slots 2-14
    Room,
    /// Sprite low palette: slots 2-7
    SpriteLow,
    /// Sprite high palette: slots 8-14
    SpriteHigh,
    /// HUD accent pair: slots 2-3
    Hud,
}

impl PaletteKind {
    /// First covered slot
    pub fn first_slot(self) -> usize {
        match self {
            PaletteKind::Full => 0,
            PaletteKind::Room | PaletteKind::SpriteLow | PaletteKind::Hud => 2,
            PaletteKind::SpriteHigh => 8,
        }
    }

    /// Number of covered slots
    pub fn color_count(self) -> usize {
        match self {
            PaletteKind::Full => 16,
            PaletteKind::Room => 13,
            PaletteKind::SpriteLow => 6,
            PaletteKind::SpriteHigh => 7,
            PaletteKind::Hud => 2,
        }
    }

    /// Encoded byte length
    pub fn byte_len(self) -> usize {
        self.color_count() * 2
    }
}

/// A decoded palette blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub kind: PaletteKind,
    pub colors: Vec<Color>,
}

impl Palette {
    pub fn new(kind: PaletteKind) -> Self {
        Self {
            kind,
            colors: vec![Color::default(); kind.color_count()],
        }
    }

    pub fn decode(kind: PaletteKind, bytes: &[u8]) -> CodecResult<Self> {
        if bytes.len() != kind.byte_len() {
            return Err(CodecError::malformed(
                "palette",
                format!(
                    "expected {} byte(s) for {kind:?}, got {}",
                    kind.byte_len(),
                    bytes.len()
                ),
            ));
        }
        let colors = bytes
            .chunks_exact(2)
            .map(|pair| Color::from_word(u16::from_be_bytes([pair[0], pair[1]])))
            .collect();
        Ok(Self { kind, colors })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.kind.byte_len());
        for color in &self.colors {
            bytes.extend_from_slice(&color.to_word().to_be_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_color_masks_undefined_bits() {
        let color = Color::from_word(0xFFFF);
        assert_eq!(color.to_word(), 0x0EEE);
    }

    #[test]
    fn test_palette_round_trip_all_kinds() {
        for kind in [
            PaletteKind::Full,
            PaletteKind::Room,
            PaletteKind::SpriteLow,
            PaletteKind::SpriteHigh,
            PaletteKind::Hud,
        ] {
            let palette = Palette {
                kind,
                colors: (0..kind.color_count())
                    .map(|i| Color::from_word((i as u16) << 1))
                    .collect(),
            };
            let bytes = palette.encode();
            assert_eq!(bytes.len(), kind.byte_len());
            assert_eq!(Palette::decode(kind, &bytes).unwrap(), palette);
        }
    }

    #[test]
    fn test_palette_length_mismatch_is_error() {
        let err = Palette::decode(PaletteKind::Room, &[0u8; 4]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }
}
