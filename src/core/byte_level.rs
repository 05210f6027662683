//! Reversible byte ↔ unicode-symbol mapping for byte-level BPE.
//!
//! Byte-level BPE vocabularies are written over an alphabet of 256 printable
//! characters, one per byte value, so that any UTF-8 input (including control
//! bytes and whitespace) can be expressed as a string of vocabulary symbols.
//!
//! # Mapping
//!
//! - Bytes 33-126, 161-172 and 174-255 are already printable and map to the
//!   character with the same code point.
//! - The remaining 68 byte values (0-32, 127-160, 173) map to consecutive code
//!   points starting at U+0100, assigned in ascending byte order.
//!
//! So the space byte `0x20` becomes `Ġ` (U+0120) and `\n` becomes `Ċ` (U+010A).

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// First code point handed out to non-printable bytes.
const REMAP_BASE: u32 = 0x100;

#[inline]
const fn is_printable_byte(b: u8) -> bool {
    matches!(b, 33..=126 | 161..=172 | 174..=255)
}

static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let mut table = ['\0'; 256];
    let mut next = REMAP_BASE;

    for b in 0u8..=255 {
        table[b as usize] = if is_printable_byte(b) {
            char::from(b)
        } else {
            let mapped = char::from_u32(next).unwrap_or(char::REPLACEMENT_CHARACTER);
            next += 1;
            mapped
        };
    }

    table
});

static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(b, &ch)| (ch, b as u8))
        .collect()
});

/// The full byte → symbol table.
pub fn bytes_to_unicode() -> &'static [char; 256] {
    &BYTE_TO_CHAR
}

/// Map every UTF-8 byte of `text` to its printable symbol.
///
/// ```
/// use sliver::byte_level_encode;
///
/// assert_eq!(byte_level_encode(" hello"), "Ġhello");
/// ```
#[inline]
pub fn byte_level_encode(text: &str) -> String {
    text.bytes().map(|b| BYTE_TO_CHAR[b as usize]).collect()
}

/// Map symbols back to raw bytes.
///
/// Returns `None` if `text` holds a character outside the byte-level alphabet.
#[inline]
pub fn byte_level_decode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|ch| CHAR_TO_BYTE.get(&ch).copied()).collect()
}

/// Map symbols back to bytes, passing foreign characters through as their
/// own UTF-8 encoding.
///
/// Added tokens are stored verbatim rather than in the byte-level alphabet,
/// so decoding a mixed token stream must not drop them.
pub fn byte_level_decode_lossless(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        match CHAR_TO_BYTE.get(&ch) {
            Some(&b) => out.push(b),
            None => out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes()),
        }
    }
    out
}

#[inline]
pub fn is_byte_level_char(ch: char) -> bool {
    CHAR_TO_BYTE.contains_key(&ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_table_is_bijective() {
        let distinct: FxHashSet<char> = bytes_to_unicode().iter().copied().collect();
        assert_eq!(distinct.len(), 256);
        assert_eq!(CHAR_TO_BYTE.len(), 256);
    }

    #[test]
    fn test_printable_bytes_map_to_themselves() {
        for b in (33u8..=126).chain(161..=172).chain(174..=255) {
            assert_eq!(BYTE_TO_CHAR[b as usize] as u32, b as u32, "byte {}", b);
        }
    }

    #[test]
    fn test_remapped_bytes_ascend_from_u0100() {
        assert_eq!(BYTE_TO_CHAR[0], '\u{100}');
        assert_eq!(BYTE_TO_CHAR[b'\n' as usize], 'Ċ');
        assert_eq!(BYTE_TO_CHAR[b' ' as usize], 'Ġ');
        assert_eq!(BYTE_TO_CHAR[127], '\u{121}');
        assert_eq!(BYTE_TO_CHAR[173], '\u{143}');
    }

    #[test]
    fn test_every_byte_roundtrips() {
        for b in 0u8..=255 {
            let symbol = BYTE_TO_CHAR[b as usize].to_string();
            assert_eq!(byte_level_decode(&symbol), Some(vec![b]));
        }
    }

    #[test]
    fn test_multibyte_text_roundtrips() {
        let original = "Hello, 世界! 🌍";
        let encoded = byte_level_encode(original);
        assert!(encoded.chars().all(is_byte_level_char));
        let decoded = byte_level_decode(&encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), original);
    }

    #[test]
    fn test_decode_rejects_foreign_chars() {
        assert_eq!(byte_level_decode("世"), None);
    }

    #[test]
    fn test_lossless_decode_keeps_foreign_chars() {
        let mixed = format!("{}世", byte_level_encode("a b"));
        assert_eq!(byte_level_decode_lossless(&mixed), "a b世".as_bytes());
    }
}
