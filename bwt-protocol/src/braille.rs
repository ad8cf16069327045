//! Standard 6-dot braille glyph table.
//!
//! Cell masks use bit `1 << (dot - 1)` for dots 1-6, the same layout the
//! board model accumulates. Used by the tracking dump that renders
//! committed cells as text.

/// Letters a-z indexed by their dot masks.
const LETTERS: [(u8, char); 26] = [
    (0b000001, 'a'),
    (0b000011, 'b'),
    (0b001001, 'c'),
    (0b011001, 'd'),
    (0b010001, 'e'),
    (0b001011, 'f'),
    (0b011011, 'g'),
    (0b010011, 'h'),
    (0b001010, 'i'),
    (0b011010, 'j'),
    (0b000101, 'k'),
    (0b000111, 'l'),
    (0b001101, 'm'),
    (0b011101, 'n'),
    (0b010101, 'o'),
    (0b001111, 'p'),
    (0b011111, 'q'),
    (0b010111, 'r'),
    (0b001110, 's'),
    (0b011110, 't'),
    (0b100101, 'u'),
    (0b100111, 'v'),
    (0b111010, 'w'),
    (0b101101, 'x'),
    (0b111101, 'y'),
    (0b110101, 'z'),
];

/// Look up the letter for a dot mask, if any.
pub fn glyph_for_mask(mask: u8) -> Option<char> {
    LETTERS
        .iter()
        .find(|(m, _)| *m == mask)
        .map(|(_, c)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_glyphs() {
        assert_eq!(glyph_for_mask(0b000001), Some('a'));
        assert_eq!(glyph_for_mask(0b011001), Some('d'));
        assert_eq!(glyph_for_mask(0b111010), Some('w'));
        assert_eq!(glyph_for_mask(0), None);
    }

    #[test]
    fn test_masks_resolve_and_are_distinct() {
        for (i, (mask, c)) in LETTERS.iter().enumerate() {
            assert_eq!(glyph_for_mask(*mask), Some(*c));
            for (other, _) in &LETTERS[i + 1..] {
                assert_ne!(mask, other);
            }
        }
    }
}
