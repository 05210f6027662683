//! Integration tests for the SentencePiece (Llama-style) adapter.
//!
//! `Pieces` stands in for a trained SentencePiece model: spaces become `▁`
//! and the longest vocabulary piece wins at each position. It adds no dummy
//! prefix, so every leading `▁` in these tests comes from the adapter.

use sliver::{
    EncodingParams, SentencePieceModel, SpecialTokenKind, SpecialTokensUpdate, Tokenizer,
    TokenizerConfig, Vocab,
};

#[derive(Debug)]
struct Pieces {
    vocab: Vocab,
}

impl SentencePieceModel for Pieces {
    fn encode(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.replace(' ', "▁").chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + 1..=chars.len())
                .rev()
                .find(|&end| {
                    let candidate: String = chars[start..end].iter().collect();
                    self.vocab.contains(&candidate)
                })
                .unwrap_or(start + 1);
            pieces.push(chars[start..end].iter().collect());
            start = end;
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

fn pieces() -> Pieces {
    Pieces {
        vocab: Vocab::from_tokens([
            "<unk>", "<s>", "</s>", "▁Hello", "▁world", "▁", "Hello", "world", "▁!",
        ]),
    }
}

fn create_llama_tokenizer(legacy: bool) -> Tokenizer {
    let config = TokenizerConfig {
        legacy: Some(legacy),
        ..TokenizerConfig::default()
    };
    Tokenizer::sentencepiece(pieces(), &config).unwrap()
}

#[test]
fn test_llama_adds_bos_only() {
    let tokenizer = create_llama_tokenizer(false);
    let encoding = tokenizer.encode("Hello world", &EncodingParams::new()).unwrap();
    assert_eq!(encoding.input_ids, vec![1, 3, 4]);
    assert_eq!(tokenizer.special_token_id(SpecialTokenKind::Eos), Some(2));
    assert!(tokenizer.pad_token_id().is_none());
}

#[test]
fn test_llama_add_eos_from_config() {
    let config = TokenizerConfig {
        legacy: Some(false),
        add_eos_token: Some(true),
        ..TokenizerConfig::default()
    };
    let tokenizer = Tokenizer::sentencepiece(pieces(), &config).unwrap();
    let encoding = tokenizer.encode("Hello", &EncodingParams::new()).unwrap();
    assert_eq!(encoding.input_ids, vec![1, 3, 2]);
}

#[test]
fn test_non_legacy_text_after_special_token() {
    let tokenizer = create_llama_tokenizer(false);
    assert_eq!(
        tokenizer.tokenize("Hello</s>world"),
        vec!["▁Hello", "</s>", "world"]
    );
    assert_eq!(
        tokenizer.tokenize("Hello</s> world"),
        vec!["▁Hello", "</s>", "▁world"]
    );
}

#[test]
fn test_legacy_passes_text_through() {
    let tokenizer = create_llama_tokenizer(true);
    assert_eq!(
        tokenizer.tokenize("Hello</s> world"),
        vec!["Hello", "</s>", "▁world"]
    );
}

#[test]
fn test_unset_legacy_warns() {
    let tokenizer = Tokenizer::sentencepiece(pieces(), &TokenizerConfig::default()).unwrap();
    assert!(tokenizer.warnings().has_warned("legacy"));
    let tokenizer = create_llama_tokenizer(true);
    assert!(!tokenizer.warnings().has_warned("legacy"));
}

#[test]
fn test_llama_decode() {
    let tokenizer = create_llama_tokenizer(false);
    let ids = tokenizer
        .encode("Hello world", &EncodingParams::new())
        .unwrap()
        .input_ids;
    assert_eq!(tokenizer.decode(&ids, true, None).unwrap(), "Hello world");
    assert_eq!(
        tokenizer.convert_ids_to_tokens(&ids, false).unwrap(),
        vec!["<s>", "▁Hello", "▁world"]
    );
}

#[test]
fn test_llama_decode_cleans_up_spaces() {
    let tokenizer = create_llama_tokenizer(false);
    let ids = vec![3, 8];
    assert_eq!(tokenizer.decode(&ids, true, Some(false)).unwrap(), "Hello !");
    assert_eq!(tokenizer.decode(&ids, true, Some(true)).unwrap(), "Hello!");
}

#[test]
fn test_llama_added_special_token() {
    let mut tokenizer = create_llama_tokenizer(false);
    tokenizer.add_special_tokens(SpecialTokensUpdate::new().with(SpecialTokenKind::Pad, "<pad>"));
    assert_eq!(tokenizer.pad_token_id(), Some(9));
    assert_eq!(tokenizer.len(), 10);
    assert_eq!(tokenizer.vocab_size(), 9);
}

#[test]
fn test_llama_pretokenized_input() {
    let tokenizer = create_llama_tokenizer(false);
    let input = sliver::TextInput::pretokenized(["Hello", "world"]);
    let encoding = tokenizer.encode(input, &EncodingParams::new()).unwrap();
    assert_eq!(encoding.input_ids, vec![1, 3, 4]);
}
