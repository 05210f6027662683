//! Core tokenization engine.
//!
//! The pipeline runs in this order:
//!
//! - [`Trie`] carves added tokens out of the input text
//! - a [`SubwordModel`] splits the remaining text: [`ByteLevelBpe`] (CLIP,
//!   GPT-2), [`SentencePieceAdapter`] (Llama family) or [`WordPiece`] (BERT)
//! - [`AddedVocabulary`] and the model's vocabulary map tokens to ids
//! - [`truncate_sequences`], [`SpecialTokensLayout`] and [`pad_encoding`]
//!   shape the ids into an [`Encoding`]
//!
//! [`Tokenizer`] owns all of it and adds batch encoding with Rayon.

mod added_tokens;
mod bpe;
pub mod byte_level;
mod config;
mod encoding;
mod error;
mod model;
pub mod normalizer;
mod padding;
mod template;
mod tokenizer;
mod trie;
mod truncation;
mod vocab;
mod warnings;

pub use added_tokens::{
    AddedToken, AddedVocabulary, NewToken, SpecialTokenKind, SpecialTokens, SpecialTokensUpdate,
};
pub use bpe::{Bpe, BpeRanks, DEFAULT_CACHE_SIZE, END_OF_WORD_SUFFIX};
pub use byte_level::{byte_level_decode, byte_level_decode_lossless, byte_level_encode};
pub use config::{SpecialTokenValue, TokenizerConfig, VERY_LARGE_INTEGER};
pub use encoding::{
    BatchEncoding, EncodeInput, Encoded, Encoding, EncodingParams, Padding, Side, TextInput,
    TokenizerInput, TruncationStrategy,
};
pub use error::{Result, TokenizerError};
pub use model::{
    ByteLevelBpe, SentencePieceAdapter, SentencePieceModel, SubwordModel, WordPiece, CLIP_PATTERN,
    CONTINUATION_PREFIX, GPT2_PATTERN, SPIECE_UNDERLINE,
};
pub use normalizer::Normalizer;
pub use padding::{pad_batch, pad_encoding, round_up, PadOptions};
pub use template::{LayoutIds, SpecialTokensLayout};
pub use tokenizer::{clean_up_tokenization, Tokenizer};
pub use trie::Trie;
pub use truncation::{truncate_sequences, Truncated};
pub use vocab::{build_decoder, load_merges_file, parse_merges, Vocab, VocabError};
pub use warnings::WarnOnce;
