//! Call parameters, input variants and encoding outputs.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The result of encoding one input.
///
/// Optional fields are `None` when they were not requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    pub input_ids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type_ids: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_mask: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_tokens_mask: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflowing_tokens: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_truncated_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl Encoding {
    pub fn new(input_ids: Vec<u32>) -> Self {
        Self {
            input_ids,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

/// Row-aligned encodings of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEncoding {
    pub encodings: Vec<Encoding>,
}

impl BatchEncoding {
    pub fn new(encodings: Vec<Encoding>) -> Self {
        Self { encodings }
    }

    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }

    pub fn input_ids(&self) -> Vec<&[u32]> {
        self.encodings.iter().map(|e| e.input_ids.as_slice()).collect()
    }

    pub fn attention_mask(&self) -> Option<Vec<&[u32]>> {
        self.column(|e| e.attention_mask.as_deref())
    }

    pub fn token_type_ids(&self) -> Option<Vec<&[u32]>> {
        self.column(|e| e.token_type_ids.as_deref())
    }

    pub fn special_tokens_mask(&self) -> Option<Vec<&[u32]>> {
        self.column(|e| e.special_tokens_mask.as_deref())
    }

    /// `Some` only when every row carries the field.
    fn column<'a>(&'a self, field: impl Fn(&'a Encoding) -> Option<&'a [u32]>) -> Option<Vec<&'a [u32]>> {
        self.encodings.iter().map(field).collect()
    }

    /// Per-key rows of the id-sequence fields present on every row.
    pub fn to_map(&self) -> FxHashMap<&'static str, Vec<Vec<u32>>> {
        let mut map = FxHashMap::default();
        fn owned(rows: Vec<&[u32]>) -> Vec<Vec<u32>> {
            rows.into_iter().map(<[u32]>::to_vec).collect()
        }
        map.insert("input_ids", owned(self.input_ids()));
        if let Some(rows) = self.token_type_ids() {
            map.insert("token_type_ids", owned(rows));
        }
        if let Some(rows) = self.attention_mask() {
            map.insert("attention_mask", owned(rows));
        }
        if let Some(rows) = self.special_tokens_mask() {
            map.insert("special_tokens_mask", owned(rows));
        }
        map
    }
}

impl IntoIterator for BatchEncoding {
    type Item = Encoding;
    type IntoIter = std::vec::IntoIter<Encoding>;

    fn into_iter(self) -> Self::IntoIter {
        self.encodings.into_iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    #[default]
    DoNotPad,
    /// Pad to the longest row (a single input is never padded).
    Longest,
    /// Pad to `max_length`, or the model maximum if unset.
    MaxLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationStrategy {
    LongestFirst,
    OnlyFirst,
    OnlySecond,
    DoNotTruncate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    #[default]
    Right,
}

/// Requested behaviour for one encode call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingParams {
    pub add_special_tokens: bool,
    pub padding: Padding,
    /// `None` leaves the decision to `max_length` resolution.
    pub truncation: Option<TruncationStrategy>,
    pub max_length: Option<usize>,
    pub stride: usize,
    pub pad_to_multiple_of: Option<usize>,
    /// Overrides the tokenizer's padding side.
    pub padding_side: Option<Side>,
    /// `None` follows the tokenizer's model input names.
    pub return_token_type_ids: Option<bool>,
    /// `None` follows the tokenizer's model input names.
    pub return_attention_mask: Option<bool>,
    pub return_overflowing_tokens: bool,
    pub return_special_tokens_mask: bool,
    pub return_offsets_mapping: bool,
    pub return_length: bool,
    pub verbose: bool,
}

impl Default for EncodingParams {
    fn default() -> Self {
        Self {
            add_special_tokens: true,
            padding: Padding::DoNotPad,
            truncation: None,
            max_length: None,
            stride: 0,
            pad_to_multiple_of: None,
            padding_side: None,
            return_token_type_ids: None,
            return_attention_mask: None,
            return_overflowing_tokens: false,
            return_special_tokens_mask: false,
            return_offsets_mapping: false,
            return_length: false,
            verbose: true,
        }
    }
}

impl EncodingParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_special_tokens(mut self, add: bool) -> Self {
        self.add_special_tokens = add;
        self
    }

    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn truncation(mut self, strategy: TruncationStrategy) -> Self {
        self.truncation = Some(strategy);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn pad_to_multiple_of(mut self, multiple: usize) -> Self {
        self.pad_to_multiple_of = Some(multiple);
        self
    }

    pub fn padding_side(mut self, side: Side) -> Self {
        self.padding_side = Some(side);
        self
    }

    pub fn return_token_type_ids(mut self, enabled: bool) -> Self {
        self.return_token_type_ids = Some(enabled);
        self
    }

    pub fn return_attention_mask(mut self, enabled: bool) -> Self {
        self.return_attention_mask = Some(enabled);
        self
    }

    pub fn return_overflowing_tokens(mut self, enabled: bool) -> Self {
        self.return_overflowing_tokens = enabled;
        self
    }

    pub fn return_special_tokens_mask(mut self, enabled: bool) -> Self {
        self.return_special_tokens_mask = enabled;
        self
    }

    pub fn return_offsets_mapping(mut self, enabled: bool) -> Self {
        self.return_offsets_mapping = enabled;
        self
    }

    pub fn return_length(mut self, enabled: bool) -> Self {
        self.return_length = enabled;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// One side of an encode input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextInput {
    Text(String),
    /// Words already split by the caller.
    Pretokenized(Vec<String>),
    /// Token ids, passed through without tokenization.
    Ids(Vec<u32>),
}

impl TextInput {
    pub fn pretokenized<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TextInput::Pretokenized(words.into_iter().map(Into::into).collect())
    }

    pub fn is_pretokenized(&self) -> bool {
        matches!(self, TextInput::Pretokenized(_))
    }
}

impl From<&str> for TextInput {
    fn from(text: &str) -> Self {
        TextInput::Text(text.to_string())
    }
}

impl From<String> for TextInput {
    fn from(text: String) -> Self {
        TextInput::Text(text)
    }
}

impl From<Vec<u32>> for TextInput {
    fn from(ids: Vec<u32>) -> Self {
        TextInput::Ids(ids)
    }
}

/// A single sequence or a sequence pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeInput {
    Single(TextInput),
    Pair(TextInput, TextInput),
}

impl EncodeInput {
    pub fn first(&self) -> &TextInput {
        match self {
            EncodeInput::Single(first) | EncodeInput::Pair(first, _) => first,
        }
    }

    pub fn second(&self) -> Option<&TextInput> {
        match self {
            EncodeInput::Single(_) => None,
            EncodeInput::Pair(_, second) => Some(second),
        }
    }
}

impl From<TextInput> for EncodeInput {
    fn from(input: TextInput) -> Self {
        EncodeInput::Single(input)
    }
}

impl From<&str> for EncodeInput {
    fn from(text: &str) -> Self {
        EncodeInput::Single(text.into())
    }
}

impl From<String> for EncodeInput {
    fn from(text: String) -> Self {
        EncodeInput::Single(text.into())
    }
}

impl From<(&str, &str)> for EncodeInput {
    fn from((first, second): (&str, &str)) -> Self {
        EncodeInput::Pair(first.into(), second.into())
    }
}

impl From<(String, String)> for EncodeInput {
    fn from((first, second): (String, String)) -> Self {
        EncodeInput::Pair(first.into(), second.into())
    }
}

impl From<(TextInput, TextInput)> for EncodeInput {
    fn from((first, second): (TextInput, TextInput)) -> Self {
        EncodeInput::Pair(first, second)
    }
}

/// Everything [`Tokenizer::call`](super::Tokenizer::call) accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerInput {
    Single(EncodeInput),
    Batch(Vec<EncodeInput>),
}

impl<T: Into<EncodeInput>> From<Vec<T>> for TokenizerInput {
    fn from(items: Vec<T>) -> Self {
        TokenizerInput::Batch(items.into_iter().map(Into::into).collect())
    }
}

impl From<EncodeInput> for TokenizerInput {
    fn from(input: EncodeInput) -> Self {
        TokenizerInput::Single(input)
    }
}

impl From<&str> for TokenizerInput {
    fn from(text: &str) -> Self {
        TokenizerInput::Single(text.into())
    }
}

/// Output of [`Tokenizer::call`](super::Tokenizer::call), matching the input shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded {
    Single(Encoding),
    Batch(BatchEncoding),
}

impl Encoded {
    pub fn into_single(self) -> Option<Encoding> {
        match self {
            Encoded::Single(encoding) => Some(encoding),
            Encoded::Batch(_) => None,
        }
    }

    pub fn into_batch(self) -> Option<BatchEncoding> {
        match self {
            Encoded::Single(_) => None,
            Encoded::Batch(batch) => Some(batch),
        }
    }
}
