//! `tokenizer_config.json` options.
//!
//! Only the keys that change tokenization are modelled; unknown keys are
//! ignored. Special-token entries may be a bare string or a full
//! [`AddedToken`] object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::added_tokens::{AddedToken, SpecialTokenKind};
use super::encoding::Side;
use super::error::{Result, TokenizerError};

/// Values at or above this are treated as "no model maximum".
pub const VERY_LARGE_INTEGER: f64 = 1e20;

fn default_true() -> bool {
    true
}

fn default_model_max_length() -> Option<f64> {
    Some(1e30)
}

/// A special-token entry: content only, or content with flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecialTokenValue {
    Content(String),
    Token(AddedToken),
}

impl SpecialTokenValue {
    pub fn content(&self) -> &str {
        match self {
            SpecialTokenValue::Content(content) => content,
            SpecialTokenValue::Token(token) => token.content(),
        }
    }

    /// As a special [`AddedToken`]. Bare strings get default flags.
    pub fn to_added_token(&self) -> AddedToken {
        match self {
            SpecialTokenValue::Content(content) => AddedToken::new(content.clone(), true),
            SpecialTokenValue::Token(token) => token.clone().special(true),
        }
    }
}

impl From<&str> for SpecialTokenValue {
    fn from(content: &str) -> Self {
        SpecialTokenValue::Content(content.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub add_prefix_space: Option<bool>,
    pub add_bos_token: Option<bool>,
    pub add_eos_token: Option<bool>,
    /// Lowercase added tokens before matching. `None` takes the family default.
    pub do_lower_case: Option<bool>,
    pub model_max_length: Option<f64>,
    pub padding_side: Side,
    pub truncation_side: Side,
    pub bos_token: Option<SpecialTokenValue>,
    pub eos_token: Option<SpecialTokenValue>,
    pub unk_token: Option<SpecialTokenValue>,
    pub sep_token: Option<SpecialTokenValue>,
    pub pad_token: Option<SpecialTokenValue>,
    pub cls_token: Option<SpecialTokenValue>,
    pub mask_token: Option<SpecialTokenValue>,
    pub additional_special_tokens: Vec<SpecialTokenValue>,
    /// Id (as a decimal string key) → token.
    pub added_tokens_decoder: BTreeMap<String, AddedToken>,
    /// `None` means unset: legacy behaviour with a one-time warning.
    pub legacy: Option<bool>,
    #[serde(default = "default_true")]
    pub clean_up_tokenization_spaces: bool,
    #[serde(default = "default_true")]
    pub spaces_between_special_tokens: bool,
    pub split_special_tokens: bool,
    pub pad_token_type_id: u32,
    /// Fields returned by default, e.g. `["input_ids", "attention_mask"]`.
    pub model_input_names: Option<Vec<String>>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            add_prefix_space: None,
            add_bos_token: None,
            add_eos_token: None,
            do_lower_case: None,
            model_max_length: default_model_max_length(),
            padding_side: Side::Right,
            truncation_side: Side::Right,
            bos_token: None,
            eos_token: None,
            unk_token: None,
            sep_token: None,
            pad_token: None,
            cls_token: None,
            mask_token: None,
            additional_special_tokens: Vec::new(),
            added_tokens_decoder: BTreeMap::new(),
            legacy: None,
            clean_up_tokenization_spaces: true,
            spaces_between_special_tokens: true,
            split_special_tokens: false,
            pad_token_type_id: 0,
            model_input_names: None,
        }
    }
}

impl TokenizerConfig {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// The model maximum, or `None` when unbounded.
    pub fn max_length_limit(&self) -> Option<usize> {
        match self.model_max_length {
            Some(max) if max >= 0.0 && max < VERY_LARGE_INTEGER => Some(max as usize),
            _ => None,
        }
    }

    pub fn special_token(&self, kind: SpecialTokenKind) -> Option<&SpecialTokenValue> {
        match kind {
            SpecialTokenKind::Bos => self.bos_token.as_ref(),
            SpecialTokenKind::Eos => self.eos_token.as_ref(),
            SpecialTokenKind::Unk => self.unk_token.as_ref(),
            SpecialTokenKind::Sep => self.sep_token.as_ref(),
            SpecialTokenKind::Pad => self.pad_token.as_ref(),
            SpecialTokenKind::Cls => self.cls_token.as_ref(),
            SpecialTokenKind::Mask => self.mask_token.as_ref(),
        }
    }

    pub fn set_special_token(&mut self, kind: SpecialTokenKind, value: impl Into<SpecialTokenValue>) {
        let value = Some(value.into());
        match kind {
            SpecialTokenKind::Bos => self.bos_token = value,
            SpecialTokenKind::Eos => self.eos_token = value,
            SpecialTokenKind::Unk => self.unk_token = value,
            SpecialTokenKind::Sep => self.sep_token = value,
            SpecialTokenKind::Pad => self.pad_token = value,
            SpecialTokenKind::Cls => self.cls_token = value,
            SpecialTokenKind::Mask => self.mask_token = value,
        }
    }

    pub fn with_special_token(mut self, kind: SpecialTokenKind, value: impl Into<SpecialTokenValue>) -> Self {
        self.set_special_token(kind, value);
        self
    }

    /// `added_tokens_decoder` with parsed ids, in id order.
    pub fn added_tokens(&self) -> Result<Vec<(u32, AddedToken)>> {
        let mut tokens = self
            .added_tokens_decoder
            .iter()
            .map(|(id, token)| {
                id.parse::<u32>()
                    .map(|id| (id, token.clone()))
                    .map_err(|_| {
                        TokenizerError::Configuration(format!(
                            "added_tokens_decoder key {id:?} is not a token id"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        tokens.sort_by_key(|(id, _)| *id);
        Ok(tokens)
    }
}
