use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::added_tokens::{
    AddedToken, AddedVocabulary, NewToken, SpecialTokenKind, SpecialTokens, SpecialTokensUpdate,
};
use super::config::{SpecialTokenValue, TokenizerConfig};
use super::encoding::{
    BatchEncoding, EncodeInput, Encoded, Encoding, EncodingParams, Padding, Side, TextInput,
    TokenizerInput, TruncationStrategy,
};
use super::error::{Result, TokenizerError};
use super::model::{ByteLevelBpe, SentencePieceAdapter, SentencePieceModel, SubwordModel, WordPiece};
use super::padding::{pad_batch, pad_encoding, PadOptions};
use super::template::{LayoutIds, SpecialTokensLayout};
use super::truncation::{truncate_sequences, Truncated};
use super::warnings::WarnOnce;

const INPUT_IDS: &str = "input_ids";
const TOKEN_TYPE_IDS: &str = "token_type_ids";
const ATTENTION_MASK: &str = "attention_mask";

/// Padding, truncation and length after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Plan {
    padding: Padding,
    truncation: TruncationStrategy,
    max_length: Option<usize>,
}

/// Text ↔ ids for one pretrained tokenizer.
///
/// Owns the sub-word model, the added-token registry and the special-token
/// layout, and runs the full pipeline: added-token split, sub-word
/// tokenization, id conversion, truncation, special-token insertion and
/// padding.
///
/// Encoding goes through `&self` and batch items encode in parallel. Added
/// tokens can only be registered through `&mut self`.
#[derive(Debug)]
pub struct Tokenizer {
    model: Box<dyn SubwordModel>,
    added: AddedVocabulary,
    layout: SpecialTokensLayout,
    model_max_length: Option<usize>,
    padding_side: Side,
    truncation_side: Side,
    pad_token_type_id: u32,
    model_input_names: Vec<String>,
    clean_up_tokenization_spaces: bool,
    spaces_between_special_tokens: bool,
    split_special_tokens: bool,
    warnings: WarnOnce,
}

impl Tokenizer {
    /// Create a tokenizer over `model` with the given layout and config.
    ///
    /// Entries of `added_tokens_decoder` are registered at their ids first;
    /// the named and additional special tokens of the config follow.
    pub fn new(
        model: impl SubwordModel + 'static,
        layout: SpecialTokensLayout,
        config: &TokenizerConfig,
    ) -> Result<Self> {
        let model: Box<dyn SubwordModel> = Box::new(model);
        let mut added = AddedVocabulary::new(config.do_lower_case.unwrap_or(false));

        for (id, token) in config.added_tokens()? {
            added.register_at(id, token, model.as_ref())?;
        }
        for kind in SpecialTokenKind::ALL {
            if let Some(value) = config.special_token(kind) {
                added.set_special(kind, value.to_added_token(), model.as_ref());
            }
        }
        for value in &config.additional_special_tokens {
            added.push_additional_special(value.to_added_token(), model.as_ref());
        }

        let model_input_names = config.model_input_names.clone().unwrap_or_else(|| {
            vec![INPUT_IDS.to_string(), ATTENTION_MASK.to_string()]
        });

        let tokenizer = Self {
            model,
            added,
            layout,
            model_max_length: config.max_length_limit(),
            padding_side: config.padding_side,
            truncation_side: config.truncation_side,
            pad_token_type_id: config.pad_token_type_id,
            model_input_names,
            clean_up_tokenization_spaces: config.clean_up_tokenization_spaces,
            spaces_between_special_tokens: config.spaces_between_special_tokens,
            split_special_tokens: config.split_special_tokens,
            warnings: WarnOnce::new(),
        };

        let special = tokenizer.added.special_tokens();
        if let (Some(pad), Some(eos)) = (
            special.content(SpecialTokenKind::Pad),
            special.content(SpecialTokenKind::Eos),
        ) {
            if pad == eos {
                tokenizer.warnings.warn("pad-eos-collision", || {
                    format!(
                        "pad token and eos token are both {pad:?}; padded positions cannot be told \
                         apart from end of sequence by id alone"
                    )
                });
            }
        }

        debug!(
            vocab_size = tokenizer.model.vocab_size(),
            added_tokens = tokenizer.added.encoder().len(),
            layout = ?tokenizer.layout,
            model_max_length = ?tokenizer.model_max_length,
            "tokenizer constructed"
        );
        Ok(tokenizer)
    }

    /// CLIP tokenizer: `bos A eos` layout, with CLIP's default special tokens
    /// filling any slot the config leaves empty.
    pub fn clip(model: ByteLevelBpe, config: &TokenizerConfig) -> Result<Self> {
        let config = with_defaults(
            config,
            &[
                (SpecialTokenKind::Bos, "<|startoftext|>"),
                (SpecialTokenKind::Eos, "<|endoftext|>"),
                (SpecialTokenKind::Unk, "<|endoftext|>"),
                (SpecialTokenKind::Pad, "<|endoftext|>"),
            ],
        );
        Self::new(model, SpecialTokensLayout::Clip, &config)
    }

    /// GPT-2 tokenizer: bos is prepended only when `add_bos_token` is set.
    pub fn gpt2(model: ByteLevelBpe, config: &TokenizerConfig) -> Result<Self> {
        let config = with_defaults(
            config,
            &[
                (SpecialTokenKind::Bos, "<|endoftext|>"),
                (SpecialTokenKind::Eos, "<|endoftext|>"),
                (SpecialTokenKind::Unk, "<|endoftext|>"),
            ],
        );
        let layout = SpecialTokensLayout::BosEos {
            add_bos: config.add_bos_token.unwrap_or(false),
            add_eos: config.add_eos_token.unwrap_or(false),
        };
        Self::new(model, layout, &config)
    }

    /// BERT-style tokenizer: `cls A sep` layout, token type ids returned.
    pub fn bert(model: WordPiece, config: &TokenizerConfig) -> Result<Self> {
        let mut config = with_defaults(
            config,
            &[
                (SpecialTokenKind::Unk, "[UNK]"),
                (SpecialTokenKind::Sep, "[SEP]"),
                (SpecialTokenKind::Pad, "[PAD]"),
                (SpecialTokenKind::Cls, "[CLS]"),
                (SpecialTokenKind::Mask, "[MASK]"),
            ],
        );
        if config.model_input_names.is_none() {
            config.model_input_names = Some(
                [INPUT_IDS, TOKEN_TYPE_IDS, ATTENTION_MASK]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            );
        }
        config.do_lower_case.get_or_insert(true);
        Self::new(model, SpecialTokensLayout::Bert, &config)
    }

    /// SentencePiece tokenizer (Llama family): bos added by default, eos not.
    ///
    /// `legacy` selects the historical prefix-space handling. Leaving it unset
    /// keeps legacy behaviour and logs a warning once.
    pub fn sentencepiece<M>(model: M, config: &TokenizerConfig) -> Result<Self>
    where
        M: SentencePieceModel + 'static,
    {
        let config = with_defaults(
            config,
            &[
                (SpecialTokenKind::Bos, "<s>"),
                (SpecialTokenKind::Eos, "</s>"),
                (SpecialTokenKind::Unk, "<unk>"),
            ],
        );
        let legacy = config.legacy.unwrap_or(true);
        let unk = config
            .unk_token
            .as_ref()
            .map_or("<unk>", SpecialTokenValue::content)
            .to_string();
        let adapter = SentencePieceAdapter::new(
            model,
            legacy,
            config.add_prefix_space.unwrap_or(true),
            unk,
        );
        let layout = SpecialTokensLayout::BosEos {
            add_bos: config.add_bos_token.unwrap_or(true),
            add_eos: config.add_eos_token.unwrap_or(false),
        };
        let tokenizer = Self::new(adapter, layout, &config)?;
        if config.legacy.is_none() {
            tokenizer.warnings.warn("legacy", || {
                "Using the legacy SentencePiece behaviour: text following a special token \
                 gets an extra word boundary. Set `legacy` to false for the corrected \
                 handling, or to true to silence this warning"
                    .to_string()
            });
        }
        Ok(tokenizer)
    }

    pub fn with_padding_side(mut self, side: Side) -> Self {
        self.padding_side = side;
        self
    }

    pub fn with_truncation_side(mut self, side: Side) -> Self {
        self.truncation_side = side;
        self
    }

    /// `None` removes the model maximum.
    pub fn with_model_max_length(mut self, max_length: Option<usize>) -> Self {
        self.model_max_length = max_length;
        self
    }

    pub fn with_split_special_tokens(mut self, split: bool) -> Self {
        self.split_special_tokens = split;
        self
    }

    pub fn with_clean_up_tokenization_spaces(mut self, clean_up: bool) -> Self {
        self.clean_up_tokenization_spaces = clean_up;
        self
    }

    pub fn with_spaces_between_special_tokens(mut self, spaces: bool) -> Self {
        self.spaces_between_special_tokens = spaces;
        self
    }

    pub fn model(&self) -> &dyn SubwordModel {
        self.model.as_ref()
    }

    pub fn added_vocabulary(&self) -> &AddedVocabulary {
        &self.added
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        self.added.special_tokens()
    }

    pub fn layout(&self) -> SpecialTokensLayout {
        self.layout
    }

    pub fn model_max_length(&self) -> Option<usize> {
        self.model_max_length
    }

    pub fn padding_side(&self) -> Side {
        self.padding_side
    }

    pub fn truncation_side(&self) -> Side {
        self.truncation_side
    }

    pub fn warnings(&self) -> &WarnOnce {
        &self.warnings
    }

    pub fn special_token_id(&self, kind: SpecialTokenKind) -> Option<u32> {
        self.added.special_id(kind, self.model.as_ref())
    }

    pub fn pad_token_id(&self) -> Option<u32> {
        self.special_token_id(SpecialTokenKind::Pad)
    }

    pub fn unk_token_id(&self) -> Option<u32> {
        self.special_token_id(SpecialTokenKind::Unk)
    }

    pub fn all_special_tokens(&self) -> Vec<String> {
        self.special_tokens()
            .all_contents()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn all_special_ids(&self) -> Vec<u32> {
        self.added.all_special_ids(self.model.as_ref())
    }

    fn is_special(&self, token: &str) -> bool {
        self.added.special_tokens().contains(token)
    }

    fn layout_ids(&self) -> LayoutIds {
        LayoutIds {
            bos: self.special_token_id(SpecialTokenKind::Bos),
            eos: self.special_token_id(SpecialTokenKind::Eos),
            cls: self.special_token_id(SpecialTokenKind::Cls),
            sep: self.special_token_id(SpecialTokenKind::Sep),
        }
    }

    // =========================================================================
    // Vocabulary
    // =========================================================================

    /// Base vocabulary size, without added tokens.
    pub fn vocab_size(&self) -> usize {
        self.model.vocab_size()
    }

    /// Full vocabulary size, added tokens included.
    pub fn len(&self) -> usize {
        self.added.total_len(self.model.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_vocab(&self) -> FxHashMap<String, u32> {
        let mut vocab = self.model.get_vocab();
        vocab.extend(self.added.encoder().iter().map(|(k, &v)| (k.clone(), v)));
        vocab
    }

    /// Register tokens, returning the number of new ids.
    pub fn add_tokens<I, T>(&mut self, tokens: I, special: bool) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Into<NewToken>,
    {
        self.added.add_tokens(tokens, special, self.model.as_ref())
    }

    /// Fill special-token slots and register their contents.
    pub fn add_special_tokens(&mut self, update: SpecialTokensUpdate) -> usize {
        self.added.apply(update, self.model.as_ref())
    }

    /// Content → id with unk fallback. `None` marks an unmappable token.
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.added.token_to_id(token, self.model.as_ref())
    }

    pub fn id_to_token(&self, id: u32) -> Option<String> {
        self.added.id_to_token(id, self.model.as_ref())
    }

    pub fn convert_tokens_to_ids<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<Option<u32>> {
        tokens.iter().map(|t| self.token_to_id(t.as_ref())).collect()
    }

    /// Ids → tokens. Fails on an id in neither the added table nor the base
    /// vocabulary.
    pub fn convert_ids_to_tokens(&self, ids: &[u32], skip_special_tokens: bool) -> Result<Vec<String>> {
        let special_ids: FxHashSet<u32> = if skip_special_tokens {
            self.all_special_ids().into_iter().collect()
        } else {
            FxHashSet::default()
        };
        ids.iter()
            .filter(|id| !special_ids.contains(id))
            .map(|&id| {
                self.id_to_token(id)
                    .ok_or_else(|| TokenizerError::NotFound(format!("token id {id}")))
            })
            .collect()
    }

    pub fn convert_tokens_to_string(&self, tokens: &[String]) -> String {
        self.model
            .convert_tokens_to_string(tokens, &|t: &str| self.is_special(t))
    }

    fn ids_from_tokens(&self, tokens: &[String]) -> Result<Vec<u32>> {
        tokens
            .iter()
            .map(|token| {
                self.token_to_id(token).ok_or_else(|| {
                    TokenizerError::NotFound(format!(
                        "token {token:?} is not in the vocabulary and no unk token is set"
                    ))
                })
            })
            .collect()
    }

    // =========================================================================
    // Tokenization
    // =========================================================================

    /// Split `text` into tokens: added tokens verbatim, everything else
    /// through the sub-word model.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokenize_with(text, false)
    }

    fn tokenize_with(&self, text: &str, is_split_into_words: bool) -> Vec<String> {
        let mut text = self
            .model
            .prepare_for_tokenization(text, is_split_into_words);
        if self.added.do_lower_case() {
            text = self.lowercase_unprotected(&text);
        }

        let segments = if self.split_special_tokens {
            vec![text]
        } else {
            self.split_added_tokens(&text)
        };

        let mut tokens = Vec::new();
        for segment in segments {
            if segment.is_empty() {
                continue;
            }
            if !self.split_special_tokens && self.added.is_added(&segment) {
                tokens.push(segment);
            } else {
                tokens.extend(self.model.tokenize(&segment));
            }
        }
        self.model
            .postprocess_tokens(tokens, &|t: &str| self.is_special(t))
    }

    fn lowercase_unprotected(&self, text: &str) -> String {
        let protected = self.added.case_protected();
        protected
            .split(text)
            .into_iter()
            .map(|segment| {
                if protected.contains(segment) {
                    segment.to_string()
                } else {
                    segment.to_lowercase()
                }
            })
            .collect()
    }

    /// Trie split, then strip and single-word adjustment around each added
    /// token. Segments emptied by the adjustment stay in place as "".
    fn split_added_tokens(&self, text: &str) -> Vec<String> {
        let mut segments: Vec<String> = self
            .added
            .trie()
            .split(text)
            .into_iter()
            .map(String::from)
            .collect();

        for i in 0..segments.len() {
            let Some(token) = self.added.get(&segments[i]) else {
                continue;
            };
            let (lstrip, rstrip, single_word) =
                (token.is_lstrip(), token.is_rstrip(), token.is_single_word());
            let has_left = i > 0 && !segments[i - 1].is_empty();
            let has_right = i + 1 < segments.len() && !segments[i + 1].is_empty();

            if rstrip && has_right {
                segments[i + 1] = segments[i + 1].trim_start().to_string();
            }
            if lstrip && has_left {
                segments[i - 1] = segments[i - 1].trim_end().to_string();
            }
            if single_word {
                let has_left = i > 0 && !segments[i - 1].is_empty();
                let has_right = i + 1 < segments.len() && !segments[i + 1].is_empty();
                if has_left && !segments[i - 1].ends_with(' ') {
                    let token = std::mem::take(&mut segments[i]);
                    segments[i - 1].push_str(&token);
                } else if has_right && !segments[i + 1].starts_with(' ') {
                    let right = std::mem::take(&mut segments[i + 1]);
                    segments[i].push_str(&right);
                }
            }
        }
        segments
    }

    fn input_ids(&self, input: &TextInput) -> Result<Vec<u32>> {
        match input {
            TextInput::Text(text) => self.ids_from_tokens(&self.tokenize(text)),
            TextInput::Pretokenized(words) => {
                let tokens: Vec<String> = words
                    .iter()
                    .flat_map(|word| self.tokenize_with(word, true))
                    .collect();
                self.ids_from_tokens(&tokens)
            }
            TextInput::Ids(ids) => Ok(ids.clone()),
        }
    }

    // =========================================================================
    // Special tokens
    // =========================================================================

    pub fn num_special_tokens_to_add(&self, pair: bool) -> Result<usize> {
        self.layout.num_special_tokens_to_add(&self.layout_ids(), pair)
    }

    pub fn build_inputs_with_special_tokens(&self, ids: &[u32], pair: Option<&[u32]>) -> Result<Vec<u32>> {
        self.layout.build_inputs(&self.layout_ids(), ids, pair)
    }

    /// 1 at special positions. With `already_has_special_tokens` the ids are
    /// checked against the special ids instead of the layout.
    pub fn get_special_tokens_mask(
        &self,
        ids: &[u32],
        pair: Option<&[u32]>,
        already_has_special_tokens: bool,
    ) -> Result<Vec<u32>> {
        if already_has_special_tokens {
            if pair.is_some() {
                return Err(TokenizerError::Argument(
                    "a pair cannot be given when the ids already contain special tokens".to_string(),
                ));
            }
            let special: FxHashSet<u32> = self.all_special_ids().into_iter().collect();
            return Ok(ids.iter().map(|id| u32::from(special.contains(id))).collect());
        }
        self.layout
            .special_tokens_mask(&self.layout_ids(), ids.len(), pair.map(<[u32]>::len))
    }

    pub fn create_token_type_ids(&self, ids: &[u32], pair: Option<&[u32]>) -> Result<Vec<u32>> {
        self.layout
            .token_type_ids(&self.layout_ids(), ids.len(), pair.map(<[u32]>::len))
    }

    /// Truncate on the tokenizer's truncation side.
    pub fn truncate_sequences(
        &self,
        ids: Vec<u32>,
        pair: Option<Vec<u32>>,
        num_tokens_to_remove: usize,
        strategy: TruncationStrategy,
        stride: usize,
    ) -> Truncated {
        truncate_sequences(
            ids,
            pair,
            num_tokens_to_remove,
            strategy,
            stride,
            self.truncation_side,
            &self.warnings,
        )
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Apply defaults to the padding/truncation request and check that the
    /// resolved combination can run.
    fn plan(&self, params: &EncodingParams) -> Result<Plan> {
        let mut max_length = params.max_length;
        let mut truncation = params.truncation;
        let mut padding = params.padding;

        if max_length.is_some() && padding == Padding::DoNotPad && truncation.is_none() {
            if params.verbose {
                self.warnings.warn("truncation-not-explicitly-activated", || {
                    "max_length is set but truncation is not; defaulting to longest_first \
                     truncation. Set truncation explicitly to silence this warning"
                        .to_string()
                });
            }
            truncation = Some(TruncationStrategy::LongestFirst);
        }
        let mut truncation = truncation.unwrap_or(TruncationStrategy::DoNotTruncate);

        if padding == Padding::Longest
            && max_length.is_some()
            && truncation == TruncationStrategy::DoNotTruncate
            && params.verbose
        {
            self.warnings.warn("max-length-ignored", || {
                "max_length is ignored when padding to the longest row without truncation; \
                 use MaxLength padding to pad to max_length"
                    .to_string()
            });
        }

        if max_length.is_none() {
            if padding == Padding::MaxLength {
                match self.model_max_length {
                    Some(limit) => max_length = Some(limit),
                    None => {
                        if params.verbose {
                            self.warnings.warn("asking-to-pad-to-max-length", || {
                                "Padding to max_length was requested but no max_length is given \
                                 and the model has no maximum; not padding"
                                    .to_string()
                            });
                        }
                        padding = Padding::DoNotPad;
                    }
                }
            }
            if truncation != TruncationStrategy::DoNotTruncate {
                match self.model_max_length {
                    Some(limit) => max_length = Some(limit),
                    None => {
                        if params.verbose {
                            self.warnings.warn("asking-to-truncate-to-max-length", || {
                                "Truncation was requested but no max_length is given and the \
                                 model has no maximum; not truncating"
                                    .to_string()
                            });
                        }
                        truncation = TruncationStrategy::DoNotTruncate;
                    }
                }
            }
        }

        if padding != Padding::DoNotPad && self.pad_token_id().is_none() {
            return Err(TokenizerError::Configuration(
                "padding was requested but the tokenizer has no pad token".to_string(),
            ));
        }

        if let Some(multiple) = params.pad_to_multiple_of {
            if multiple == 0 {
                return Err(TokenizerError::Argument(
                    "pad_to_multiple_of must be positive".to_string(),
                ));
            }
            if let Some(max_length) = max_length {
                if truncation != TruncationStrategy::DoNotTruncate
                    && padding != Padding::DoNotPad
                    && max_length % multiple != 0
                {
                    return Err(TokenizerError::Argument(format!(
                        "truncation and padding are both active but the truncation length \
                         ({max_length}) is not a multiple of pad_to_multiple_of ({multiple})"
                    )));
                }
            }
        }

        if params.return_overflowing_tokens && max_length.is_none() {
            return Err(TokenizerError::Argument(
                "returning overflowing tokens requires max_length".to_string(),
            ));
        }

        Ok(Plan {
            padding,
            truncation,
            max_length,
        })
    }

    /// Input checks that need no tokenization, run for every item before
    /// any of them is encoded.
    fn validate(&self, input: &EncodeInput, plan: &Plan, params: &EncodingParams) -> Result<()> {
        if params.return_offsets_mapping {
            return Err(TokenizerError::Unsupported(
                "offset mapping is not available for this tokenizer".to_string(),
            ));
        }
        if params.return_token_type_ids == Some(true) && !params.add_special_tokens {
            return Err(TokenizerError::Argument(
                "token_type_ids cannot be returned when special tokens are not added".to_string(),
            ));
        }
        let pair = input.second().is_some();
        if params.return_overflowing_tokens && pair && plan.truncation == TruncationStrategy::LongestFirst {
            return Err(TokenizerError::Argument(
                "overflowing tokens cannot be returned for a pair truncated with longest_first; \
                 use only_first or only_second"
                    .to_string(),
            ));
        }
        let pretokenized = input.first().is_pretokenized()
            || input.second().is_some_and(TextInput::is_pretokenized);
        if pretokenized && !self.model.accepts_pretokenized() {
            return Err(TokenizerError::Argument(
                "this tokenizer does not accept pre-split words as input".to_string(),
            ));
        }
        if params.add_special_tokens {
            self.layout.validate(&self.layout_ids())?;
        }
        Ok(())
    }

    fn pad_options(&self, params: &EncodingParams, return_attention_mask: bool) -> PadOptions {
        PadOptions {
            pad_id: self.pad_token_id().unwrap_or(0),
            pad_type_id: self.pad_token_type_id,
            side: params.padding_side.unwrap_or(self.padding_side),
            return_attention_mask,
        }
    }

    fn return_attention_mask(&self, params: &EncodingParams) -> bool {
        params
            .return_attention_mask
            .unwrap_or_else(|| self.model_input_names.iter().any(|n| n == ATTENTION_MASK))
    }

    /// Encode one sequence or pair.
    pub fn encode(&self, input: impl Into<EncodeInput>, params: &EncodingParams) -> Result<Encoding> {
        let input = input.into();
        let plan = self.plan(params)?;
        self.validate(&input, &plan, params)?;
        let ids = self.input_ids(input.first())?;
        let pair = input.second().map(|s| self.input_ids(s)).transpose()?;
        self.prepare(ids, pair, &plan, params, true)
    }

    /// Turn already-converted ids into a model input: truncate, add special
    /// tokens, then pad.
    pub fn prepare_for_model(
        &self,
        ids: Vec<u32>,
        pair: Option<Vec<u32>>,
        params: &EncodingParams,
    ) -> Result<Encoding> {
        let input = match &pair {
            Some(second) => EncodeInput::Pair(TextInput::Ids(ids.clone()), TextInput::Ids(second.clone())),
            None => EncodeInput::Single(TextInput::Ids(ids.clone())),
        };
        let plan = self.plan(params)?;
        self.validate(&input, &plan, params)?;
        self.prepare(ids, pair, &plan, params, true)
    }

    fn prepare(
        &self,
        ids: Vec<u32>,
        pair: Option<Vec<u32>>,
        plan: &Plan,
        params: &EncodingParams,
        pad: bool,
    ) -> Result<Encoding> {
        let is_pair = pair.is_some();
        let return_token_type_ids = params
            .return_token_type_ids
            .unwrap_or_else(|| self.model_input_names.iter().any(|n| n == TOKEN_TYPE_IDS));
        let return_attention_mask = self.return_attention_mask(params);

        let num_special = if params.add_special_tokens {
            self.num_special_tokens_to_add(is_pair)?
        } else {
            0
        };
        let total_len = ids.len() + pair.as_ref().map_or(0, Vec::len) + num_special;

        let mut truncated = Truncated {
            ids,
            pair_ids: pair,
            overflowing: Vec::new(),
        };
        if let Some(max_length) = plan.max_length {
            if plan.truncation != TruncationStrategy::DoNotTruncate && total_len > max_length {
                truncated = self.truncate_sequences(
                    truncated.ids,
                    truncated.pair_ids,
                    total_len - max_length,
                    plan.truncation,
                    params.stride,
                );
            }
        }
        let Truncated {
            ids,
            pair_ids,
            overflowing,
        } = truncated;

        let mut encoding = Encoding::default();
        if params.return_overflowing_tokens {
            encoding.overflowing_tokens = Some(overflowing);
            // Counts what was actually removed; a failed truncation removes nothing.
            let kept = ids.len() + pair_ids.as_ref().map_or(0, Vec::len) + num_special;
            encoding.num_truncated_tokens = Some(total_len - kept);
        }

        let layout_ids = self.layout_ids();
        let (input_ids, token_type_ids, special_tokens_mask) = if params.add_special_tokens {
            let pair_ref = pair_ids.as_deref();
            let pair_len = pair_ref.map(<[u32]>::len);
            (
                self.layout.build_inputs(&layout_ids, &ids, pair_ref)?,
                self.layout.token_type_ids(&layout_ids, ids.len(), pair_len)?,
                self.layout.special_tokens_mask(&layout_ids, ids.len(), pair_len)?,
            )
        } else {
            let mut sequence = ids;
            sequence.extend(pair_ids.unwrap_or_default());
            let zeros = vec![0; sequence.len()];
            (sequence, zeros.clone(), zeros)
        };

        encoding.input_ids = input_ids;
        if return_token_type_ids {
            encoding.token_type_ids = Some(token_type_ids);
        }
        if params.return_special_tokens_mask {
            encoding.special_tokens_mask = Some(special_tokens_mask);
        }

        if plan.max_length.is_none() && params.verbose {
            if let Some(limit) = self.model_max_length {
                let len = encoding.input_ids.len();
                if len > limit {
                    self.warnings.warn("sequence-too-long", || {
                        format!(
                            "Token sequence length is longer than the model maximum \
                             ({len} > {limit}); running it through the model will fail"
                        )
                    });
                }
            }
        }

        if pad && (plan.padding != Padding::DoNotPad || return_attention_mask) {
            pad_encoding(
                &mut encoding,
                plan.padding,
                plan.max_length,
                params.pad_to_multiple_of,
                &self.pad_options(params, return_attention_mask),
            );
        }
        if params.return_length {
            encoding.length = Some(encoding.input_ids.len());
        }
        Ok(encoding)
    }

    /// Encode a batch. Items are encoded in parallel without padding, then
    /// padded together in one pass.
    pub fn encode_batch<I, T>(&self, inputs: I, params: &EncodingParams) -> Result<BatchEncoding>
    where
        I: IntoIterator<Item = T>,
        T: Into<EncodeInput>,
    {
        let inputs: Vec<EncodeInput> = inputs.into_iter().map(Into::into).collect();
        let plan = self.plan(params)?;
        for input in &inputs {
            self.validate(input, &plan, params)?;
        }

        let mut encodings = inputs
            .par_iter()
            .map(|input| {
                let ids = self.input_ids(input.first())?;
                let pair = input.second().map(|s| self.input_ids(s)).transpose()?;
                self.prepare(ids, pair, &plan, params, false)
            })
            .collect::<Result<Vec<_>>>()?;

        pad_batch(
            &mut encodings,
            plan.padding,
            plan.max_length,
            params.pad_to_multiple_of,
            &self.pad_options(params, self.return_attention_mask(params)),
        );
        Ok(BatchEncoding::new(encodings))
    }

    /// Encode `firsts[i]` paired with `seconds[i]`.
    pub fn encode_batch_pairs<A, B>(
        &self,
        firsts: Vec<A>,
        seconds: Vec<B>,
        params: &EncodingParams,
    ) -> Result<BatchEncoding>
    where
        A: Into<TextInput>,
        B: Into<TextInput>,
    {
        if firsts.len() != seconds.len() {
            return Err(TokenizerError::Argument(format!(
                "batch has {} first sequences but {} second sequences",
                firsts.len(),
                seconds.len()
            )));
        }
        let pairs = firsts
            .into_iter()
            .zip(seconds)
            .map(|(a, b)| EncodeInput::Pair(a.into(), b.into()));
        self.encode_batch(pairs, params)
    }

    /// Route a single input to [`encode`](Self::encode) and a batch to
    /// [`encode_batch`](Self::encode_batch).
    pub fn call(&self, input: impl Into<TokenizerInput>, params: &EncodingParams) -> Result<Encoded> {
        match input.into() {
            TokenizerInput::Single(input) => self.encode(input, params).map(Encoded::Single),
            TokenizerInput::Batch(inputs) => self.encode_batch(inputs, params).map(Encoded::Batch),
        }
    }

    /// Pad one encoding following `params` (truncation is ignored).
    pub fn pad(&self, mut encoding: Encoding, params: &EncodingParams) -> Result<Encoding> {
        let plan = self.pad_plan(params)?;
        pad_encoding(
            &mut encoding,
            plan.padding,
            plan.max_length,
            params.pad_to_multiple_of,
            &self.pad_options(params, self.return_attention_mask(params)),
        );
        Ok(encoding)
    }

    /// Pad encodings to a shared length following `params`.
    pub fn pad_batch(&self, encodings: Vec<Encoding>, params: &EncodingParams) -> Result<BatchEncoding> {
        let plan = self.pad_plan(params)?;
        let mut encodings = encodings;
        pad_batch(
            &mut encodings,
            plan.padding,
            plan.max_length,
            params.pad_to_multiple_of,
            &self.pad_options(params, self.return_attention_mask(params)),
        );
        Ok(BatchEncoding::new(encodings))
    }

    fn pad_plan(&self, params: &EncodingParams) -> Result<Plan> {
        let mut params = params.clone();
        params.truncation = Some(TruncationStrategy::DoNotTruncate);
        params.return_overflowing_tokens = false;
        self.plan(&params)
    }

    // =========================================================================
    // Decoding
    // =========================================================================

    /// Ids → text.
    ///
    /// Added tokens that are not special are emitted verbatim as their own
    /// pieces; runs of other tokens are joined by the model.
    /// `clean_up_tokenization_spaces` of `None` uses the tokenizer default.
    pub fn decode(
        &self,
        ids: &[u32],
        skip_special_tokens: bool,
        clean_up_tokenization_spaces: Option<bool>,
    ) -> Result<String> {
        let tokens = self.convert_ids_to_tokens(ids, skip_special_tokens)?;
        let special = self.added.special_tokens();
        let is_special = |t: &str| special.contains(t);
        let base_size = self.model.vocab_size();

        let verbatim: FxHashSet<&str> = self
            .added
            .encoder()
            .keys()
            .map(String::as_str)
            .filter(|content| !special.contains(content))
            .chain(
                special
                    .additional()
                    .iter()
                    .map(AddedToken::content)
                    .filter(|content| {
                        self.added
                            .lookup(content, self.model.as_ref())
                            .is_some_and(|id| id as usize >= base_size)
                    }),
            )
            .collect();

        let mut pieces: Vec<String> = Vec::new();
        let mut run: Vec<String> = Vec::new();
        for token in tokens {
            if skip_special_tokens && is_special(token.as_str()) {
                continue;
            }
            if verbatim.contains(token.as_str()) {
                if !run.is_empty() {
                    let text = self.model.convert_tokens_to_string(&run, &is_special);
                    if !text.is_empty() {
                        pieces.push(text);
                    }
                    run.clear();
                }
                pieces.push(token);
            } else {
                run.push(token);
            }
        }
        if !run.is_empty() {
            pieces.push(self.model.convert_tokens_to_string(&run, &is_special));
        }

        let text = if self.spaces_between_special_tokens {
            pieces.join(" ")
        } else {
            pieces.concat()
        };
        if clean_up_tokenization_spaces.unwrap_or(self.clean_up_tokenization_spaces) {
            Ok(clean_up_tokenization(&text))
        } else {
            Ok(text)
        }
    }

    pub fn decode_batch(
        &self,
        sequences: &[Vec<u32>],
        skip_special_tokens: bool,
        clean_up_tokenization_spaces: Option<bool>,
    ) -> Result<Vec<String>> {
        sequences
            .par_iter()
            .map(|ids| self.decode(ids, skip_special_tokens, clean_up_tokenization_spaces))
            .collect()
    }
}

/// Copy of `config` with `defaults` filling empty special-token slots.
fn with_defaults(config: &TokenizerConfig, defaults: &[(SpecialTokenKind, &str)]) -> TokenizerConfig {
    let mut config = config.clone();
    for &(kind, content) in defaults {
        if config.special_token(kind).is_none() {
            config.set_special_token(kind, content);
        }
    }
    config
}

/// Undo the spaces tokenization puts before punctuation and contractions.
pub fn clean_up_tokenization(text: &str) -> String {
    text.replace(" .", ".")
        .replace(" ?", "?")
        .replace(" !", "!")
        .replace(" ,", ",")
        .replace(" ' ", "'")
        .replace(" n't", "n't")
        .replace(" 'm", "'m")
        .replace(" 's", "'s")
        .replace(" 've", "'ve")
        .replace(" 're", "'re")
}
