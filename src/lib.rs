//! Sliver - tokenization for pretrained language models
//!
//! Text in, model-ready ids out, and back again:
//! - Byte-level BPE with a per-instance merge cache (CLIP, GPT-2)
//! - Adapters over SentencePiece-style and WordPiece models
//! - Added and special tokens matched with a longest-match trie
//! - Truncation with stride and overflow, special-token layouts, padding
//! - Rayon parallelism for batch encoding and decoding
//!
//! ```
//! use sliver::{Trie, byte_level_encode};
//!
//! let trie: Trie = ["[CLS]", "[SEP]"].into_iter().collect();
//! assert_eq!(trie.split("[CLS] hi[SEP]"), vec!["[CLS]", " hi", "[SEP]"]);
//! assert_eq!(byte_level_encode("a b"), "aĠb");
//! ```

pub mod core;

pub use core::{
    AddedToken, BatchEncoding, ByteLevelBpe, EncodeInput, Encoded, Encoding, EncodingParams,
    Normalizer, Padding, SentencePieceAdapter, SentencePieceModel, Side, SpecialTokenKind,
    SpecialTokensLayout, SpecialTokensUpdate, SubwordModel, TextInput, Tokenizer, TokenizerConfig,
    TokenizerError, TokenizerInput, TruncationStrategy, Trie, Vocab, WordPiece,
};
pub use core::{byte_level_decode, byte_level_encode, clean_up_tokenization};
