//! Sub-word models behind the encoding pipeline.
//!
//! The pipeline only sees the [`SubwordModel`] trait. Two families implement
//! it here:
//!
//! - [`ByteLevelBpe`]: byte-level BPE, either CLIP-style (normalizer front
//!   end, lowercasing, `</w>` end-of-word suffix) or GPT-2 style (no suffix,
//!   optional prefix space).
//! - [`SentencePieceAdapter`]: wraps an opaque [`SentencePieceModel`] and adds
//!   the prefix-space handling pretrained SentencePiece tokenizers expect.

use fancy_regex::Regex;
use rustc_hash::FxHashMap;
use tracing::warn;

use super::bpe::{Bpe, BpeRanks, END_OF_WORD_SUFFIX};
use super::byte_level::{byte_level_decode_lossless, byte_level_encode};
use super::error::Result;
use super::normalizer::Normalizer;
use super::vocab::{parse_merges, Vocab};

/// Word/pieces boundary marker used by SentencePiece vocabularies.
pub const SPIECE_UNDERLINE: &str = "▁";

/// CLIP pre-tokenization pattern, matched case-insensitively.
pub const CLIP_PATTERN: &str = r"(?i)<\|startoftext\|>|<\|endoftext\|>|'s|'t|'re|'ve|'m|'ll|'d|\p{L}+|\p{N}+|[^\s\p{L}\p{N}]+";

/// GPT-2 pre-tokenization pattern.
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// A sub-word model: text segment → model tokens, plus the token/id tables.
///
/// Segments handed to [`tokenize`](SubwordModel::tokenize) never contain an
/// added token; the pipeline has already split those out.
pub trait SubwordModel: Send + Sync + std::fmt::Debug {
    fn tokenize(&self, text: &str) -> Vec<String>;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn id_to_token(&self, id: u32) -> Option<String>;

    /// Size of the base vocabulary, without added tokens.
    fn vocab_size(&self) -> usize;

    fn get_vocab(&self) -> FxHashMap<String, u32>;

    /// Join model tokens back into text. `is_special` reports whether a token
    /// is a registered special token.
    fn convert_tokens_to_string(&self, tokens: &[String], is_special: &dyn Fn(&str) -> bool)
        -> String;

    /// Rewrite the raw input before added tokens are split out.
    fn prepare_for_tokenization(&self, text: &str, _is_split_into_words: bool) -> String {
        text.to_string()
    }

    /// Adjust the full token list after every segment was tokenized.
    fn postprocess_tokens(&self, tokens: Vec<String>, _is_special: &dyn Fn(&str) -> bool) -> Vec<String> {
        tokens
    }

    /// Whether pre-split word lists are accepted as input.
    fn accepts_pretokenized(&self) -> bool {
        true
    }
}

/// Byte-level BPE model.
#[derive(Debug, Clone)]
pub struct ByteLevelBpe {
    vocab: Vocab,
    bpe: Bpe,
    pattern: Regex,
    /// CLIP front end. Its output is joined with spaces and lowercased.
    normalizer: Option<Normalizer>,
    add_prefix_space: bool,
}

impl ByteLevelBpe {
    /// CLIP-style model: normalizer front end, lowercasing, `</w>` suffix.
    pub fn clip(vocab: Vocab, merges: Vec<(String, String)>) -> Result<Self> {
        let normalizer = Normalizer::new()
            .with_strip_accents(Some(false))
            .with_punctuation_split(false);
        Ok(Self {
            vocab,
            bpe: Bpe::new(
                BpeRanks::from_merges(merges),
                Some(END_OF_WORD_SUFFIX.to_string()),
            ),
            pattern: Regex::new(CLIP_PATTERN)?,
            normalizer: Some(normalizer),
            add_prefix_space: false,
        })
    }

    /// GPT-2 style model: no suffix, leading-space-aware pattern.
    pub fn gpt2(vocab: Vocab, merges: Vec<(String, String)>, add_prefix_space: bool) -> Result<Self> {
        Ok(Self {
            vocab,
            bpe: Bpe::new(BpeRanks::from_merges(merges), None),
            pattern: Regex::new(GPT2_PATTERN)?,
            normalizer: None,
            add_prefix_space,
        })
    }

    /// CLIP-style model from `vocab.json` and `merges.txt` contents.
    pub fn clip_from_str(vocab_json: &str, merges: &str) -> Result<Self> {
        Self::clip(Vocab::from_json(vocab_json)?, parse_merges(merges)?)
    }

    /// GPT-2 style model from `vocab.json` and `merges.txt` contents.
    pub fn gpt2_from_str(vocab_json: &str, merges: &str, add_prefix_space: bool) -> Result<Self> {
        Self::gpt2(Vocab::from_json(vocab_json)?, parse_merges(merges)?, add_prefix_space)
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn bpe(&self) -> &Bpe {
        &self.bpe
    }

    pub fn add_prefix_space(&self) -> bool {
        self.add_prefix_space
    }
}

impl SubwordModel for ByteLevelBpe {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let text = match &self.normalizer {
            Some(normalizer) => normalizer.tokenize(text).join(" ").to_lowercase(),
            None => text.to_string(),
        };

        let mut tokens = Vec::new();
        for chunk in self.pattern.find_iter(&text) {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("pre-tokenizer regex failed, dropping rest of segment: {}", e);
                    break;
                }
            };
            let encoded = byte_level_encode(chunk.as_str());
            tokens.extend(
                self.bpe
                    .bpe(&encoded)
                    .split(' ')
                    .filter(|piece| !piece.is_empty())
                    .map(String::from),
            );
        }
        tokens
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.vocab.id_to_token(id).map(str::to_string)
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn get_vocab(&self) -> FxHashMap<String, u32> {
        self.vocab.encoder().clone()
    }

    fn convert_tokens_to_string(&self, tokens: &[String], _is_special: &dyn Fn(&str) -> bool) -> String {
        let bytes = byte_level_decode_lossless(&tokens.concat());
        let text = String::from_utf8_lossy(&bytes);
        match self.bpe.end_of_word_suffix() {
            Some(suffix) => text.replace(suffix, " ").trim().to_string(),
            None => text.into_owned(),
        }
    }

    fn prepare_for_tokenization(&self, text: &str, is_split_into_words: bool) -> String {
        if self.normalizer.is_none() && (self.add_prefix_space || is_split_into_words) {
            format!(" {text}")
        } else {
            text.to_string()
        }
    }

    fn accepts_pretokenized(&self) -> bool {
        // Word lists only tokenize consistently when every word gets the
        // same leading space.
        self.normalizer.is_some() || self.add_prefix_space
    }
}

/// The opaque SentencePiece capability: a trained model that maps text to
/// pieces and back.
///
/// Implementations used in non-legacy mode should not add a dummy prefix
/// themselves; [`SentencePieceAdapter`] takes care of it.
pub trait SentencePieceModel: Send + Sync + std::fmt::Debug {
    fn encode(&self, text: &str) -> Vec<String>;

    fn piece_to_id(&self, piece: &str) -> Option<u32>;

    fn id_to_piece(&self, id: u32) -> Option<String>;

    fn vocab_size(&self) -> usize;

    /// Pieces → text: join, map `▁` to a space, drop one leading space.
    fn decode(&self, pieces: &[String]) -> String {
        let text = pieces.concat().replace(SPIECE_UNDERLINE, " ");
        match text.strip_prefix(' ') {
            Some(rest) => rest.to_string(),
            None => text,
        }
    }
}

/// SentencePiece model with legacy and non-legacy prefix-space handling.
///
/// In legacy mode text is passed straight to the model. Otherwise a `▁` is
/// prepended to the input once, and any segment that starts with `▁` or a
/// space (such as the text following an added token) is encoded behind the
/// unk piece, whose pieces are then dropped, so the model does not insert an
/// extra word boundary.
#[derive(Debug, Clone)]
pub struct SentencePieceAdapter<M> {
    model: M,
    legacy: bool,
    add_prefix_space: bool,
    unk_piece: String,
    unk_piece_len: usize,
}

impl<M: SentencePieceModel> SentencePieceAdapter<M> {
    pub fn new(model: M, legacy: bool, add_prefix_space: bool, unk_piece: impl Into<String>) -> Self {
        let unk_piece = unk_piece.into();
        let unk_piece_len = model.encode(&unk_piece).len();
        Self {
            model,
            legacy,
            add_prefix_space,
            unk_piece,
            unk_piece_len,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }
}

impl<M: SentencePieceModel> SubwordModel for SentencePieceAdapter<M> {
    fn tokenize(&self, text: &str) -> Vec<String> {
        if self.legacy || !(text.starts_with(SPIECE_UNDERLINE) || text.starts_with(' ')) {
            return self.model.encode(text);
        }
        let pieces = self.model.encode(&format!("{}{}", self.unk_piece, text));
        if pieces.len() >= self.unk_piece_len {
            pieces[self.unk_piece_len..].to_vec()
        } else {
            pieces
        }
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.model.piece_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.model.id_to_piece(id)
    }

    fn vocab_size(&self) -> usize {
        self.model.vocab_size()
    }

    fn get_vocab(&self) -> FxHashMap<String, u32> {
        (0..self.model.vocab_size() as u32)
            .filter_map(|id| self.model.id_to_piece(id).map(|piece| (piece, id)))
            .collect()
    }

    fn convert_tokens_to_string(&self, tokens: &[String], is_special: &dyn Fn(&str) -> bool) -> String {
        let mut tokens = tokens.to_vec();
        if self.add_prefix_space {
            if let Some(first) = tokens.first_mut() {
                if let Some(rest) = first.strip_prefix(SPIECE_UNDERLINE) {
                    *first = rest.to_string();
                }
            }
        }

        let mut out = String::new();
        let mut pending: Vec<String> = Vec::new();
        let mut prev_is_special = false;
        for (i, token) in tokens.into_iter().enumerate() {
            if is_special(&token) {
                if !prev_is_special && i != 0 && self.legacy {
                    out.push(' ');
                }
                out.push_str(&self.model.decode(&pending));
                out.push_str(&token);
                pending.clear();
                prev_is_special = true;
            } else {
                if prev_is_special
                    && i == 1
                    && self.add_prefix_space
                    && !token.starts_with(SPIECE_UNDERLINE)
                {
                    out.push(' ');
                }
                pending.push(token);
                prev_is_special = false;
            }
        }
        out.push_str(&self.model.decode(&pending));
        out
    }

    fn prepare_for_tokenization(&self, text: &str, _is_split_into_words: bool) -> String {
        if self.legacy || text.is_empty() {
            return text.to_string();
        }
        let text = text.replace(SPIECE_UNDERLINE, " ");
        if self.add_prefix_space {
            format!("{SPIECE_UNDERLINE}{text}")
        } else {
            text
        }
    }

    fn postprocess_tokens(&self, tokens: Vec<String>, is_special: &dyn Fn(&str) -> bool) -> Vec<String> {
        if !self.legacy && tokens.len() > 1 && tokens[0] == SPIECE_UNDERLINE && is_special(&tokens[1]) {
            return tokens[1..].to_vec();
        }
        tokens
    }
}

/// Prefix marking a WordPiece unit that continues the previous one.
pub const CONTINUATION_PREFIX: &str = "##";

/// WordPiece model: normalizer front end, then greedy longest-prefix matching
/// per word with `##` continuation pieces.
#[derive(Debug, Clone)]
pub struct WordPiece {
    vocab: Vocab,
    normalizer: Normalizer,
    unk_token: String,
    max_input_chars_per_word: usize,
}

impl WordPiece {
    pub fn new(vocab: Vocab, normalizer: Normalizer, unk_token: impl Into<String>) -> Self {
        Self {
            vocab,
            normalizer,
            unk_token: unk_token.into(),
            max_input_chars_per_word: 100,
        }
    }

    /// Model from a `vocab.txt` listing, one token per line, ids in line order.
    pub fn from_vocab_text(vocab_text: &str, normalizer: Normalizer, unk_token: impl Into<String>) -> Self {
        let tokens = vocab_text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty());
        Self::new(Vocab::from_tokens(tokens), normalizer, unk_token)
    }

    pub fn with_max_input_chars_per_word(mut self, max: usize) -> Self {
        self.max_input_chars_per_word = max;
        self
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Split one word. A word that cannot be fully covered becomes the unk token.
    fn split_word(&self, word: &str, output: &mut Vec<String>) {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > self.max_input_chars_per_word {
            output.push(self.unk_token.clone());
            return;
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = chars.len();
            let mut found = None;
            while start < end {
                let substr: String = chars[start..end].iter().collect();
                let candidate = if start > 0 {
                    format!("{CONTINUATION_PREFIX}{substr}")
                } else {
                    substr
                };
                if self.vocab.contains(&candidate) {
                    found = Some(candidate);
                    break;
                }
                end -= 1;
            }
            match found {
                Some(piece) => {
                    pieces.push(piece);
                    start = end;
                }
                None => {
                    output.push(self.unk_token.clone());
                    return;
                }
            }
        }
        output.extend(pieces);
    }
}

impl SubwordModel for WordPiece {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for word in self.normalizer.tokenize(text) {
            if self.normalizer.never_split().contains(&word) {
                tokens.push(word);
            } else {
                self.split_word(&word, &mut tokens);
            }
        }
        tokens
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.vocab.id_to_token(id).map(str::to_string)
    }

    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    fn get_vocab(&self) -> FxHashMap<String, u32> {
        self.vocab.encoder().clone()
    }

    fn convert_tokens_to_string(&self, tokens: &[String], _is_special: &dyn Fn(&str) -> bool) -> String {
        tokens
            .join(" ")
            .replace(&format!(" {CONTINUATION_PREFIX}"), "")
            .trim()
            .to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Whitespace-split model over a fixed word list.
    #[derive(Debug, Clone)]
    pub(crate) struct WordModel {
        vocab: Vocab,
    }

    impl WordModel {
        pub(crate) fn new<'a>(words: impl IntoIterator<Item = &'a str>) -> Self {
            Self {
                vocab: Vocab::from_tokens(words),
            }
        }
    }

    impl SubwordModel for WordModel {
        fn tokenize(&self, text: &str) -> Vec<String> {
            text.split_whitespace().map(String::from).collect()
        }

        fn token_to_id(&self, token: &str) -> Option<u32> {
            self.vocab.token_to_id(token)
        }

        fn id_to_token(&self, id: u32) -> Option<String> {
            self.vocab.id_to_token(id).map(str::to_string)
        }

        fn vocab_size(&self) -> usize {
            self.vocab.len()
        }

        fn get_vocab(&self) -> FxHashMap<String, u32> {
            self.vocab.encoder().clone()
        }

        fn convert_tokens_to_string(&self, tokens: &[String], _is_special: &dyn Fn(&str) -> bool) -> String {
            tokens.join(" ")
        }
    }

    /// Greedy longest-piece model. Spaces become `▁`; unknown chars are
    /// emitted as single-char pieces.
    #[derive(Debug, Clone)]
    struct GreedyPieces {
        vocab: Vocab,
    }

    impl SentencePieceModel for GreedyPieces {
        fn encode(&self, text: &str) -> Vec<String> {
            let text = text.replace(' ', SPIECE_UNDERLINE);
            let chars: Vec<char> = text.chars().collect();
            let mut pieces = Vec::new();
            let mut i = 0;
            while i < chars.len() {
                let mut end = chars.len();
                loop {
                    let candidate: String = chars[i..end].iter().collect();
                    if end == i + 1 || self.vocab.contains(&candidate) {
                        pieces.push(candidate);
                        i = end;
                        break;
                    }
                    end -= 1;
                }
            }
            pieces
        }

        fn piece_to_id(&self, piece: &str) -> Option<u32> {
            self.vocab.token_to_id(piece)
        }

        fn id_to_piece(&self, id: u32) -> Option<String> {
            self.vocab.id_to_token(id).map(str::to_string)
        }

        fn vocab_size(&self) -> usize {
            self.vocab.len()
        }
    }

    fn pieces() -> GreedyPieces {
        GreedyPieces {
            vocab: Vocab::from_tokens(["<unk>", "<s>", "</s>", "▁Hello", "▁world", "▁", "Hello", "world"]),
        }
    }

    fn clip_model() -> ByteLevelBpe {
        let vocab = Vocab::from_tokens([
            "l", "o", "w", "e", "r", "s", "t", "i", "d", "n", "lo", "l</w>", "w</w>", "r</w>",
            "t</w>", "low</w>", "er</w>", "lowest</w>", "newer</w>", "wider", "<unk>",
            "<|startoftext|>", "<|endoftext|>",
        ]);
        let merges = parse_merges("#version: 0.2\nl o\nlo w</w>\ne r</w>\n").unwrap();
        ByteLevelBpe::clip(vocab, merges).unwrap()
    }

    fn no_special(_: &str) -> bool {
        false
    }

    #[test]
    fn test_clip_tokenize() {
        let model = clip_model();
        assert_eq!(
            model.tokenize("lower newer"),
            vec!["lo", "w", "er</w>", "n", "e", "w", "er</w>"]
        );
        // Lowercased before matching.
        assert_eq!(model.tokenize("LOWER"), vec!["lo", "w", "er</w>"]);
        assert!(model.tokenize("   ").is_empty());
    }

    #[test]
    fn test_clip_decode_replaces_suffix() {
        let model = clip_model();
        let tokens = model.tokenize("lower newer");
        assert_eq!(model.convert_tokens_to_string(&tokens, &no_special), "lower newer");
    }

    #[test]
    fn test_clip_digit_runs_are_one_chunk() {
        let model = clip_model();
        assert_eq!(model.tokenize("42"), vec!["4", "2</w>"]);
        assert_eq!(model.tokenize("2024 7"), vec!["2", "0", "2", "4</w>", "7</w>"]);
    }

    #[test]
    fn test_regex_runtime_error_truncates_output() {
        let vocab = Vocab::from_tokens(["Ġ", "h", "i"]);
        let mut model = ByteLevelBpe::gpt2(vocab, Vec::new(), false).unwrap();
        let text = "hi   hi  !!   ";
        let full = model.tokenize(text);

        model.pattern = fancy_regex::RegexBuilder::new(GPT2_PATTERN)
            .backtrack_limit(1)
            .build()
            .unwrap();
        let limited = model.tokenize(text);
        assert!(limited.len() <= full.len());
        assert_eq!(limited[..], full[..limited.len()]);
    }

    #[test]
    fn test_gpt2_prefix_space() {
        let vocab = Vocab::from_tokens(["Ġ", "h", "i", "Ġh", "Ġhi"]);
        let merges = vec![
            ("Ġ".to_string(), "h".to_string()),
            ("Ġh".to_string(), "i".to_string()),
        ];
        let plain = ByteLevelBpe::gpt2(vocab.clone(), merges.clone(), false).unwrap();
        assert_eq!(plain.prepare_for_tokenization("hi", false), "hi");
        assert_eq!(plain.prepare_for_tokenization("hi", true), " hi");
        assert!(!plain.accepts_pretokenized());

        let prefixed = ByteLevelBpe::gpt2(vocab, merges, true).unwrap();
        let text = prefixed.prepare_for_tokenization("hi", false);
        assert_eq!(prefixed.tokenize(&text), vec!["Ġhi"]);
        assert_eq!(prefixed.convert_tokens_to_string(&["Ġhi".to_string()], &no_special), " hi");
        assert!(prefixed.accepts_pretokenized());
    }

    #[test]
    fn test_sentencepiece_non_legacy_strips_unk_prefix() {
        let adapter = SentencePieceAdapter::new(pieces(), false, true, "<unk>");
        let text = adapter.prepare_for_tokenization("Hello world", false);
        assert_eq!(text, "▁Hello world");
        assert_eq!(adapter.tokenize(&text), vec!["▁Hello", "▁world"]);
        // Text after an added token keeps its single word boundary.
        assert_eq!(adapter.tokenize(" world"), vec!["▁world"]);
        assert_eq!(adapter.tokenize("world"), vec!["world"]);
    }

    #[test]
    fn test_sentencepiece_legacy_passes_through() {
        let adapter = SentencePieceAdapter::new(pieces(), true, true, "<unk>");
        assert_eq!(adapter.prepare_for_tokenization("Hello", false), "Hello");
        assert_eq!(adapter.tokenize(" world"), vec!["▁world"]);
    }

    #[test]
    fn test_sentencepiece_drops_boundary_before_special() {
        let adapter = SentencePieceAdapter::new(pieces(), false, true, "<unk>");
        let is_special = |t: &str| t == "<s>";
        let tokens = vec!["▁".to_string(), "<s>".to_string(), "▁world".to_string()];
        assert_eq!(
            adapter.postprocess_tokens(tokens, &is_special),
            vec!["<s>", "▁world"]
        );
    }

    #[test]
    fn test_sentencepiece_decode_with_specials() {
        let adapter = SentencePieceAdapter::new(pieces(), false, true, "<unk>");
        let is_special = |t: &str| t == "<s>" || t == "</s>";
        let tokens: Vec<String> = ["▁Hello", "▁world", "</s>"].iter().map(|s| s.to_string()).collect();
        assert_eq!(adapter.convert_tokens_to_string(&tokens, &is_special), "Hello world</s>");

        let leading: Vec<String> = ["<s>", "▁Hello"].iter().map(|s| s.to_string()).collect();
        assert_eq!(adapter.convert_tokens_to_string(&leading, &is_special), "<s>Hello");
    }

    fn wordpiece() -> WordPiece {
        let vocab = "[PAD]\n[UNK]\n[CLS]\n[SEP]\nhello\nworld\nun\n##aff\n##able\n,\n";
        let normalizer = Normalizer::new().with_never_split(["[UNK]", "[CLS]", "[SEP]"]);
        WordPiece::from_vocab_text(vocab, normalizer, "[UNK]")
    }

    #[test]
    fn test_wordpiece_splits_continuations() {
        let model = wordpiece();
        assert_eq!(model.tokenize("unaffable"), vec!["un", "##aff", "##able"]);
        assert_eq!(model.tokenize("Hello, World"), vec!["hello", ",", "world"]);
    }

    #[test]
    fn test_wordpiece_unknown_word_is_single_unk() {
        let model = wordpiece();
        assert_eq!(model.tokenize("unknown hello"), vec!["[UNK]", "hello"]);
        let short = wordpiece().with_max_input_chars_per_word(3);
        assert_eq!(short.tokenize("hello"), vec!["[UNK]"]);
    }

    #[test]
    fn test_wordpiece_decode_joins_continuations() {
        let model = wordpiece();
        let tokens = model.tokenize("hello unaffable");
        assert_eq!(model.convert_tokens_to_string(&tokens, &no_special), "hello unaffable");
    }
}
