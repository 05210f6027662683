//! Word-tokenization front end.
//!
//! Cleans raw text and splits it into whitespace/punctuation delimited words
//! before sub-word tokenization:
//!
//! 1. Drop NUL, U+FFFD and control characters; map whitespace to `' '`.
//! 2. Surround CJK ideographs with spaces so each becomes its own word.
//! 3. NFC-normalize so canonically equivalent inputs tokenize identically.
//! 4. Split on whitespace.
//! 5. Per word (unless never-split): lowercase and strip accents.
//! 6. Per word (unless never-split): split every punctuation char off.

use rustc_hash::FxHashSet;
use std::ops::RangeInclusive;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Configurable basic tokenizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    do_lower_case: bool,
    /// `None` follows `do_lower_case`.
    strip_accents: Option<bool>,
    tokenize_chinese_chars: bool,
    split_on_punctuation: bool,
    never_split: FxHashSet<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            do_lower_case: true,
            strip_accents: None,
            tokenize_chinese_chars: true,
            split_on_punctuation: true,
            never_split: FxHashSet::default(),
        }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lower_case(mut self, do_lower_case: bool) -> Self {
        self.do_lower_case = do_lower_case;
        self
    }

    pub fn with_strip_accents(mut self, strip_accents: Option<bool>) -> Self {
        self.strip_accents = strip_accents;
        self
    }

    pub fn with_chinese_chars(mut self, tokenize_chinese_chars: bool) -> Self {
        self.tokenize_chinese_chars = tokenize_chinese_chars;
        self
    }

    pub fn with_punctuation_split(mut self, split_on_punctuation: bool) -> Self {
        self.split_on_punctuation = split_on_punctuation;
        self
    }

    pub fn with_never_split<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.never_split.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn never_split(&self) -> &FxHashSet<String> {
        &self.never_split
    }

    /// Split `text` into normalized words.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut cleaned = clean_text(text);
        if self.tokenize_chinese_chars {
            cleaned = space_cjk_chars(&cleaned);
        }
        let composed: String = cleaned.nfc().collect();

        let mut split_tokens = Vec::new();
        for word in composed.split_whitespace() {
            if self.never_split.contains(word) {
                split_tokens.push(word.to_string());
                continue;
            }

            let mut word = word.to_string();
            if self.do_lower_case {
                word = word.to_lowercase();
                if self.strip_accents != Some(false) {
                    word = strip_accents(&word);
                }
            } else if self.strip_accents == Some(true) {
                word = strip_accents(&word);
            }

            if self.split_on_punctuation {
                split_tokens.extend(split_on_punctuation(&word));
            } else {
                split_tokens.push(word);
            }
        }

        // Accent stripping can leave empty or space-containing words behind.
        split_tokens
            .join(" ")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Collapse whitespace runs to one space and trim the ends.
pub fn whitespace_clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove invalid and control characters, map whitespace to `' '`.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\0' || ch == char::REPLACEMENT_CHARACTER || is_control(ch) {
            continue;
        }
        out.push(if is_whitespace(ch) { ' ' } else { ch });
    }
    out
}

/// Decompose and drop combining marks.
pub fn strip_accents(text: &str) -> String {
    text.nfd().filter(|&c| !is_combining_mark(c)).collect()
}

fn space_cjk_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if is_cjk_char(ch) {
            out.push(' ');
            out.push(ch);
            out.push(' ');
        } else {
            out.push(ch);
        }
    }
    out
}

fn split_on_punctuation(word: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        if is_punctuation(ch) {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.push(ch.to_string());
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

// ---------------------------------------------------------------------------
// Character classification
// ---------------------------------------------------------------------------

/// The Unicode "Space_Separator" (Zs) code points.
const SPACE_SEPARATORS: &[RangeInclusive<u32>] = &[
    0x0020..=0x0020,
    0x00A0..=0x00A0,
    0x1680..=0x1680,
    0x2000..=0x200A,
    0x202F..=0x202F,
    0x205F..=0x205F,
    0x3000..=0x3000,
];

/// Format (Cf) and private-use (Co) ranges; `char::is_control` covers Cc.
const OTHER_CONTROL: &[RangeInclusive<u32>] = &[
    0x00AD..=0x00AD,
    0x0600..=0x0605,
    0x061C..=0x061C,
    0x06DD..=0x06DD,
    0x070F..=0x070F,
    0x180E..=0x180E,
    0x200B..=0x200F,
    0x202A..=0x202E,
    0x2060..=0x2064,
    0x2066..=0x206F,
    0xE000..=0xF8FF,
    0xFEFF..=0xFEFF,
    0xFFF9..=0xFFFB,
    0xE0001..=0xE0001,
    0xE0020..=0xE007F,
    0xF0000..=0xFFFFD,
    0x100000..=0x10FFFD,
];

/// Non-ASCII punctuation: every general category P range of Unicode 14.
const UNICODE_PUNCTUATION: &[RangeInclusive<u32>] = &[
    0x00A1..=0x00A1,
    0x00A7..=0x00A7,
    0x00AB..=0x00AB,
    0x00B6..=0x00B7,
    0x00BB..=0x00BB,
    0x00BF..=0x00BF,
    0x037E..=0x037E,
    0x0387..=0x0387,
    0x055A..=0x055F,
    0x0589..=0x058A,
    0x05BE..=0x05BE,
    0x05C0..=0x05C0,
    0x05C3..=0x05C3,
    0x05C6..=0x05C6,
    0x05F3..=0x05F4,
    0x0609..=0x060A,
    0x060C..=0x060D,
    0x061B..=0x061B,
    0x061D..=0x061F,
    0x066A..=0x066D,
    0x06D4..=0x06D4,
    0x0700..=0x070D,
    0x07F7..=0x07F9,
    0x0830..=0x083E,
    0x085E..=0x085E,
    0x0964..=0x0965,
    0x0970..=0x0970,
    0x09FD..=0x09FD,
    0x0A76..=0x0A76,
    0x0AF0..=0x0AF0,
    0x0C77..=0x0C77,
    0x0C84..=0x0C84,
    0x0DF4..=0x0DF4,
    0x0E4F..=0x0E4F,
    0x0E5A..=0x0E5B,
    0x0F04..=0x0F12,
    0x0F14..=0x0F14,
    0x0F3A..=0x0F3D,
    0x0F85..=0x0F85,
    0x0FD0..=0x0FD4,
    0x0FD9..=0x0FDA,
    0x104A..=0x104F,
    0x10FB..=0x10FB,
    0x1360..=0x1368,
    0x1400..=0x1400,
    0x166E..=0x166E,
    0x169B..=0x169C,
    0x16EB..=0x16ED,
    0x1735..=0x1736,
    0x17D4..=0x17D6,
    0x17D8..=0x17DA,
    0x1800..=0x180A,
    0x1944..=0x1945,
    0x1A1E..=0x1A1F,
    0x1AA0..=0x1AA6,
    0x1AA8..=0x1AAD,
    0x1B5A..=0x1B60,
    0x1B7D..=0x1B7E,
    0x1BFC..=0x1BFF,
    0x1C3B..=0x1C3F,
    0x1C7E..=0x1C7F,
    0x1CC0..=0x1CC7,
    0x1CD3..=0x1CD3,
    0x2010..=0x2027,
    0x2030..=0x2043,
    0x2045..=0x2051,
    0x2053..=0x205E,
    0x207D..=0x207E,
    0x208D..=0x208E,
    0x2308..=0x230B,
    0x2329..=0x232A,
    0x2768..=0x2775,
    0x27C5..=0x27C6,
    0x27E6..=0x27EF,
    0x2983..=0x2998,
    0x29D8..=0x29DB,
    0x29FC..=0x29FD,
    0x2CF9..=0x2CFC,
    0x2CFE..=0x2CFF,
    0x2D70..=0x2D70,
    0x2E00..=0x2E2E,
    0x2E30..=0x2E4F,
    0x2E52..=0x2E5D,
    0x3001..=0x3003,
    0x3008..=0x3011,
    0x3014..=0x301F,
    0x3030..=0x3030,
    0x303D..=0x303D,
    0x30A0..=0x30A0,
    0x30FB..=0x30FB,
    0xA4FE..=0xA4FF,
    0xA60D..=0xA60F,
    0xA673..=0xA673,
    0xA67E..=0xA67E,
    0xA6F2..=0xA6F7,
    0xA874..=0xA877,
    0xA8CE..=0xA8CF,
    0xA8F8..=0xA8FA,
    0xA8FC..=0xA8FC,
    0xA92E..=0xA92F,
    0xA95F..=0xA95F,
    0xA9C1..=0xA9CD,
    0xA9DE..=0xA9DF,
    0xAA5C..=0xAA5F,
    0xAADE..=0xAADF,
    0xAAF0..=0xAAF1,
    0xABEB..=0xABEB,
    0xFD3E..=0xFD3F,
    0xFE10..=0xFE19,
    0xFE30..=0xFE52,
    0xFE54..=0xFE61,
    0xFE63..=0xFE63,
    0xFE68..=0xFE68,
    0xFE6A..=0xFE6B,
    0xFF01..=0xFF03,
    0xFF05..=0xFF0A,
    0xFF0C..=0xFF0F,
    0xFF1A..=0xFF1B,
    0xFF1F..=0xFF20,
    0xFF3B..=0xFF3D,
    0xFF3F..=0xFF3F,
    0xFF5B..=0xFF5B,
    0xFF5D..=0xFF5D,
    0xFF5F..=0xFF65,
    0x10100..=0x10102,
    0x1039F..=0x1039F,
    0x103D0..=0x103D0,
    0x1056F..=0x1056F,
    0x10857..=0x10857,
    0x1091F..=0x1091F,
    0x1093F..=0x1093F,
    0x10A50..=0x10A58,
    0x10A7F..=0x10A7F,
    0x10AF0..=0x10AF6,
    0x10B39..=0x10B3F,
    0x10B99..=0x10B9C,
    0x10EAD..=0x10EAD,
    0x10F55..=0x10F59,
    0x10F86..=0x10F89,
    0x11047..=0x1104D,
    0x110BB..=0x110BC,
    0x110BE..=0x110C1,
    0x11140..=0x11143,
    0x11174..=0x11175,
    0x111C5..=0x111C8,
    0x111CD..=0x111CD,
    0x111DB..=0x111DB,
    0x111DD..=0x111DF,
    0x11238..=0x1123D,
    0x112A9..=0x112A9,
    0x1144B..=0x1144F,
    0x1145A..=0x1145B,
    0x1145D..=0x1145D,
    0x114C6..=0x114C6,
    0x115C1..=0x115D7,
    0x11641..=0x11643,
    0x11660..=0x1166C,
    0x116B9..=0x116B9,
    0x1173C..=0x1173E,
    0x1183B..=0x1183B,
    0x11944..=0x11946,
    0x119E2..=0x119E2,
    0x11A3F..=0x11A46,
    0x11A9A..=0x11A9C,
    0x11A9E..=0x11AA2,
    0x11C41..=0x11C45,
    0x11C70..=0x11C71,
    0x11EF7..=0x11EF8,
    0x11FFF..=0x11FFF,
    0x12470..=0x12474,
    0x12FF1..=0x12FF2,
    0x16A6E..=0x16A6F,
    0x16AF5..=0x16AF5,
    0x16B37..=0x16B3B,
    0x16B44..=0x16B44,
    0x16E97..=0x16E9A,
    0x16FE2..=0x16FE2,
    0x1BC9F..=0x1BC9F,
    0x1DA87..=0x1DA8B,
    0x1E95E..=0x1E95F,
];

/// CJK Unified Ideographs blocks (not Hangul, Hiragana or Katakana).
const CJK_IDEOGRAPHS: &[RangeInclusive<u32>] = &[
    0x4E00..=0x9FFF,
    0x3400..=0x4DBF,
    0x20000..=0x2A6DF,
    0x2A700..=0x2B73F,
    0x2B740..=0x2B81F,
    0x2B820..=0x2CEAF,
    0xF900..=0xFAFF,
    0x2F800..=0x2FA1F,
];

#[inline]
fn in_ranges(ranges: &[RangeInclusive<u32>], cp: u32) -> bool {
    ranges.iter().any(|range| range.contains(&cp))
}

/// Space, tab, newline, carriage return, or a Zs code point.
pub fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r') || in_ranges(SPACE_SEPARATORS, ch as u32)
}

/// Control-category characters; tab, newline and carriage return count as whitespace instead.
pub fn is_control(ch: char) -> bool {
    if matches!(ch, '\t' | '\n' | '\r') {
        return false;
    }
    ch.is_control() || in_ranges(OTHER_CONTROL, ch as u32)
}

/// ASCII non-alphanumeric printable characters plus Unicode punctuation.
///
/// Characters such as `^`, `$` and `` ` `` are symbols in Unicode but are
/// treated as punctuation so they split off consistently.
pub fn is_punctuation(ch: char) -> bool {
    let cp = ch as u32;
    if (33..=47).contains(&cp)
        || (58..=64).contains(&cp)
        || (91..=96).contains(&cp)
        || (123..=126).contains(&cp)
    {
        return true;
    }
    !ch.is_ascii() && in_ranges(UNICODE_PUNCTUATION, cp)
}

pub fn is_cjk_char(ch: char) -> bool {
    in_ranges(CJK_IDEOGRAPHS, ch as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_punctuation() {
        let norm = Normalizer::new();
        assert_eq!(
            norm.tokenize("Hello, world!"),
            vec!["hello", ",", "world", "!"]
        );
    }

    #[test]
    fn test_collapses_whitespace_and_drops_controls() {
        let norm = Normalizer::new();
        assert_eq!(
            norm.tokenize("  a\t\tb\u{0}\u{200B}c \n d\u{FFFD}"),
            vec!["a", "bc", "d"]
        );
    }

    #[test]
    fn test_strips_accents_when_lowercasing() {
        let norm = Normalizer::new();
        assert_eq!(norm.tokenize("Café naïve"), vec!["cafe", "naive"]);

        let keep = Normalizer::new().with_strip_accents(Some(false));
        assert_eq!(keep.tokenize("Café"), vec!["café"]);
    }

    #[test]
    fn test_strip_accents_without_lowercase() {
        let norm = Normalizer::new()
            .with_lower_case(false)
            .with_strip_accents(Some(true));
        assert_eq!(norm.tokenize("Café"), vec!["Cafe"]);

        let raw = Normalizer::new().with_lower_case(false);
        assert_eq!(raw.tokenize("Café"), vec!["Café"]);
    }

    #[test]
    fn test_nfc_makes_equivalent_forms_equal() {
        let norm = Normalizer::new()
            .with_lower_case(false)
            .with_strip_accents(Some(false));
        let composed = norm.tokenize("\u{00E9}");
        let decomposed = norm.tokenize("e\u{0301}");
        assert_eq!(composed, decomposed);
        assert_eq!(composed, vec!["\u{00E9}"]);
    }

    #[test]
    fn test_never_split_tokens_survive() {
        let norm = Normalizer::new().with_never_split(["[UNK]"]);
        assert_eq!(norm.tokenize("a [UNK] b."), vec!["a", "[UNK]", "b", "."]);
        assert_eq!(Normalizer::new().tokenize("[UNK]"), vec!["[", "unk", "]"]);
    }

    #[test]
    fn test_cjk_chars_become_words() {
        let norm = Normalizer::new();
        assert_eq!(norm.tokenize("ah博推zz"), vec!["ah", "博", "推", "zz"]);
    }

    #[test]
    fn test_punctuation_split_disabled() {
        let norm = Normalizer::new().with_punctuation_split(false);
        assert_eq!(norm.tokenize("don't stop!"), vec!["don't", "stop!"]);
    }

    #[test]
    fn test_classification() {
        assert!(is_whitespace(' '));
        assert!(is_whitespace('\t'));
        assert!(is_whitespace('\u{00A0}'));
        assert!(!is_whitespace('A'));

        assert!(is_control('\u{0005}'));
        assert!(is_control('\u{200D}'));
        assert!(!is_control('\t'));
        assert!(!is_control('A'));

        assert!(is_punctuation('-'));
        assert!(is_punctuation('$'));
        assert!(is_punctuation('\u{00BF}'));
        assert!(is_punctuation('\u{3001}'));
        assert!(!is_punctuation('A'));
        assert!(!is_punctuation(' '));
    }

    #[test]
    fn test_punctuation_outside_common_blocks() {
        for ch in ['\u{1AA0}', '\u{10100}', '\u{1E95E}'] {
            assert!(is_punctuation(ch), "{:?}", ch);
        }
        // Currency and math symbols are not punctuation.
        assert!(!is_punctuation('\u{00A2}'));
        assert!(!is_punctuation('\u{2044}'));
    }

    #[test]
    fn test_whitespace_clean() {
        assert_eq!(whitespace_clean("  a \n\t b  "), "a b");
    }
}
