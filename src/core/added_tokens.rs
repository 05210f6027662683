//! Special tokens and vocabulary extension.
//!
//! [`AddedVocabulary`] owns every token registered on top of the base
//! vocabulary: the named special tokens (bos, eos, unk, sep, pad, cls, mask),
//! additional special tokens and plain added tokens. Each registered content
//! is also inserted into the [`Trie`] used to split it out of raw text.
//!
//! Ids handed out here are never reassigned. A token that is already
//! registered keeps its id and its original flags.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::error::{Result, TokenizerError};
use super::model::SubwordModel;
use super::trie::Trie;

fn default_true() -> bool {
    true
}

/// A token added on top of the base vocabulary, with matching behaviour flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddedToken {
    content: String,
    #[serde(default)]
    single_word: bool,
    #[serde(default)]
    lstrip: bool,
    #[serde(default)]
    rstrip: bool,
    #[serde(default = "default_true")]
    normalized: bool,
    #[serde(default)]
    special: bool,
}

impl AddedToken {
    /// New token; special tokens default to `normalized = false`.
    pub fn new(content: impl Into<String>, special: bool) -> Self {
        Self {
            content: content.into(),
            single_word: false,
            lstrip: false,
            rstrip: false,
            normalized: !special,
            special,
        }
    }

    pub fn single_word(mut self, single_word: bool) -> Self {
        self.single_word = single_word;
        self
    }

    pub fn lstrip(mut self, lstrip: bool) -> Self {
        self.lstrip = lstrip;
        self
    }

    pub fn rstrip(mut self, rstrip: bool) -> Self {
        self.rstrip = rstrip;
        self
    }

    pub fn normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    pub fn special(mut self, special: bool) -> Self {
        self.special = special;
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_single_word(&self) -> bool {
        self.single_word
    }

    pub fn is_lstrip(&self) -> bool {
        self.lstrip
    }

    pub fn is_rstrip(&self) -> bool {
        self.rstrip
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    fn with_content(mut self, content: String) -> Self {
        self.content = content;
        self
    }
}

impl std::fmt::Display for AddedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}

/// A candidate for [`AddedVocabulary::add_tokens`].
///
/// Plain strings take their `special`/`normalized` flags from context, while
/// an [`AddedToken`] keeps the flags it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewToken {
    Plain(String),
    Added(AddedToken),
}

impl From<&str> for NewToken {
    fn from(s: &str) -> Self {
        NewToken::Plain(s.to_string())
    }
}

impl From<String> for NewToken {
    fn from(s: String) -> Self {
        NewToken::Plain(s)
    }
}

impl From<AddedToken> for NewToken {
    fn from(token: AddedToken) -> Self {
        NewToken::Added(token)
    }
}

/// The named special-token slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialTokenKind {
    Bos,
    Eos,
    Unk,
    Sep,
    Pad,
    Cls,
    Mask,
}

impl SpecialTokenKind {
    pub const ALL: [SpecialTokenKind; 7] = [
        SpecialTokenKind::Bos,
        SpecialTokenKind::Eos,
        SpecialTokenKind::Unk,
        SpecialTokenKind::Sep,
        SpecialTokenKind::Pad,
        SpecialTokenKind::Cls,
        SpecialTokenKind::Mask,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecialTokenKind::Bos => "bos_token",
            SpecialTokenKind::Eos => "eos_token",
            SpecialTokenKind::Unk => "unk_token",
            SpecialTokenKind::Sep => "sep_token",
            SpecialTokenKind::Pad => "pad_token",
            SpecialTokenKind::Cls => "cls_token",
            SpecialTokenKind::Mask => "mask_token",
        }
    }
}

/// Named special tokens plus the open-ended additional list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialTokens {
    slots: BTreeMap<u8, AddedToken>,
    additional: Vec<AddedToken>,
}

impl SpecialTokens {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(kind: SpecialTokenKind) -> u8 {
        kind as u8
    }

    pub fn get(&self, kind: SpecialTokenKind) -> Option<&AddedToken> {
        self.slots.get(&Self::slot(kind))
    }

    pub fn content(&self, kind: SpecialTokenKind) -> Option<&str> {
        self.get(kind).map(AddedToken::content)
    }

    /// Set a named slot. The token is always flagged special.
    pub fn set(&mut self, kind: SpecialTokenKind, token: AddedToken) {
        self.slots.insert(Self::slot(kind), token.special(true));
    }

    pub fn with(mut self, kind: SpecialTokenKind, token: impl Into<String>) -> Self {
        self.set(kind, AddedToken::new(token, true));
        self
    }

    pub fn additional(&self) -> &[AddedToken] {
        &self.additional
    }

    pub fn push_additional(&mut self, token: AddedToken) {
        if !self.additional.iter().any(|t| t.content == token.content) {
            self.additional.push(token.special(true));
        }
    }

    /// Every special token in slot order then additional order, deduplicated.
    pub fn all_tokens(&self) -> Vec<&AddedToken> {
        let mut seen: Vec<&AddedToken> = Vec::new();
        let named = SpecialTokenKind::ALL.iter().filter_map(|&kind| self.get(kind));
        for token in named.chain(self.additional.iter()) {
            if !seen.iter().any(|t| t.content == token.content) {
                seen.push(token);
            }
        }
        seen
    }

    pub fn all_contents(&self) -> Vec<&str> {
        self.all_tokens().into_iter().map(AddedToken::content).collect()
    }

    pub fn contains(&self, content: &str) -> bool {
        self.all_tokens().iter().any(|t| t.content == content)
    }
}

/// Named slots and additional special tokens to register in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialTokensUpdate {
    pub named: Vec<(SpecialTokenKind, AddedToken)>,
    pub additional: Vec<AddedToken>,
}

impl SpecialTokensUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: SpecialTokenKind, token: impl Into<String>) -> Self {
        self.named.push((kind, AddedToken::new(token, true)));
        self
    }

    pub fn with_token(mut self, kind: SpecialTokenKind, token: AddedToken) -> Self {
        self.named.push((kind, token));
        self
    }

    pub fn additional(mut self, token: impl Into<String>) -> Self {
        self.additional.push(AddedToken::new(token, true));
        self
    }
}

/// Registry of added tokens layered over a [`SubwordModel`] vocabulary.
#[derive(Debug, Clone, Default)]
pub struct AddedVocabulary {
    special: SpecialTokens,
    encoder: FxHashMap<String, u32>,
    decoder: BTreeMap<u32, AddedToken>,
    trie: Trie,
    /// Contents left untouched when lowercasing input.
    case_protected: Trie,
    do_lower_case: bool,
}

impl AddedVocabulary {
    pub fn new(do_lower_case: bool) -> Self {
        Self {
            do_lower_case,
            ..Self::default()
        }
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special
    }

    pub fn do_lower_case(&self) -> bool {
        self.do_lower_case
    }

    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    pub fn case_protected(&self) -> &Trie {
        &self.case_protected
    }

    pub fn encoder(&self) -> &FxHashMap<String, u32> {
        &self.encoder
    }

    pub fn decoder(&self) -> &BTreeMap<u32, AddedToken> {
        &self.decoder
    }

    pub fn get(&self, content: &str) -> Option<&AddedToken> {
        self.encoder.get(content).and_then(|id| self.decoder.get(id))
    }

    pub fn is_added(&self, content: &str) -> bool {
        self.encoder.contains_key(content)
    }

    /// Total vocabulary size: base entries plus added ids outside the base.
    pub fn total_len(&self, model: &dyn SubwordModel) -> usize {
        let extra = self
            .encoder
            .keys()
            .filter(|content| model.token_to_id(content).is_none())
            .count();
        model.vocab_size() + extra
    }

    fn next_id(&self, model: &dyn SubwordModel) -> u32 {
        let by_len = self.total_len(model) as u32;
        let by_max = self.decoder.keys().next_back().map_or(0, |&id| id + 1);
        by_len.max(by_max)
    }

    /// Register a token at an explicit id, as read from a tokenizer config.
    ///
    /// Fails if the id already belongs to different content, or the content
    /// is already registered under another id.
    pub fn register_at(
        &mut self,
        id: u32,
        token: AddedToken,
        model: &dyn SubwordModel,
    ) -> Result<()> {
        if let Some(existing) = self.decoder.get(&id) {
            if existing.content != token.content {
                return Err(TokenizerError::Configuration(format!(
                    "added token {:?} assigned id {} already held by {:?}",
                    token.content, id, existing.content
                )));
            }
            return Ok(());
        }
        if let Some(&other) = self.encoder.get(&token.content) {
            return Err(TokenizerError::Configuration(format!(
                "added token {:?} assigned id {} is already registered as id {}",
                token.content, id, other
            )));
        }
        if let Some(base) = model.id_to_token(id) {
            if base != token.content {
                return Err(TokenizerError::Configuration(format!(
                    "added token {:?} assigned id {} already held by base token {:?}",
                    token.content, id, base
                )));
            }
        }
        if token.special && !self.special.contains(&token.content) {
            self.special.push_additional(token.clone());
        }
        self.encoder.insert(token.content.clone(), id);
        self.decoder.insert(id, token);
        self.refresh_tries();
        Ok(())
    }

    /// Register `tokens`, returning how many received a new id.
    ///
    /// Tokens already registered are skipped and keep their flags. A token
    /// whose content exists in the base vocabulary is registered under the
    /// base id without counting as new. With `special` set every token is
    /// flagged special; special tokens not in a named slot join the
    /// additional list.
    pub fn add_tokens<I, T>(&mut self, tokens: I, special: bool, model: &dyn SubwordModel) -> usize
    where
        I: IntoIterator<Item = T>,
        T: Into<NewToken>,
    {
        let mut added = 0usize;
        let mut next_id = self.next_id(model);

        for token in tokens {
            let token = match token.into() {
                NewToken::Plain(content) => {
                    if content.is_empty() || self.encoder.contains_key(&content) {
                        continue;
                    }
                    let is_special = special || self.special.contains(&content);
                    AddedToken::new(content, is_special)
                }
                NewToken::Added(token) => {
                    if token.content.is_empty() {
                        continue;
                    }
                    if special {
                        token.special(true)
                    } else {
                        token
                    }
                }
            };

            let token = if self.do_lower_case && !token.special {
                let lowered = token.content.to_lowercase();
                token.with_content(lowered)
            } else {
                token
            };

            if self.encoder.contains_key(&token.content) {
                continue;
            }

            let id = match model.token_to_id(&token.content) {
                Some(id) => id,
                None => {
                    let id = next_id;
                    next_id += 1;
                    added += 1;
                    id
                }
            };

            if token.special && !self.special.contains(&token.content) {
                self.special.push_additional(token.clone());
            }
            self.encoder.insert(token.content.clone(), id);
            self.decoder.insert(id, token);
        }

        self.refresh_tries();
        debug!(added, registered = self.encoder.len(), "added tokens registered");
        added
    }

    /// Fill a named special-token slot and register its content.
    ///
    /// Returns the number of new ids (0 or 1).
    pub fn set_special(
        &mut self,
        kind: SpecialTokenKind,
        token: AddedToken,
        model: &dyn SubwordModel,
    ) -> usize {
        let token = token.special(true);
        self.special.set(kind, token.clone());
        self.add_tokens([token], true, model)
    }

    /// Register an additional special token.
    pub fn push_additional_special(&mut self, token: AddedToken, model: &dyn SubwordModel) -> usize {
        let token = token.special(true);
        self.special.push_additional(token.clone());
        self.add_tokens([token], true, model)
    }

    /// Apply a [`SpecialTokensUpdate`], returning the number of new ids.
    ///
    /// Additional tokens are appended to the existing list.
    pub fn apply(&mut self, update: SpecialTokensUpdate, model: &dyn SubwordModel) -> usize {
        let mut added = 0;
        for (kind, token) in update.named {
            added += self.set_special(kind, token, model);
        }
        for token in update.additional {
            added += self.push_additional_special(token, model);
        }
        added
    }

    /// Added table, then base vocabulary. No unk fallback.
    pub fn lookup(&self, content: &str, model: &dyn SubwordModel) -> Option<u32> {
        self.encoder
            .get(content)
            .copied()
            .or_else(|| model.token_to_id(content))
    }

    /// Content → id: added table, base vocabulary, then the unk id.
    ///
    /// `None` means the token is unmappable and no unk token resolves.
    pub fn token_to_id(&self, content: &str, model: &dyn SubwordModel) -> Option<u32> {
        self.lookup(content, model).or_else(|| self.unk_id(model))
    }

    /// Id → content: added table, then base vocabulary.
    pub fn id_to_token(&self, id: u32, model: &dyn SubwordModel) -> Option<String> {
        match self.decoder.get(&id) {
            Some(token) => Some(token.content.clone()),
            None => model.id_to_token(id),
        }
    }

    pub fn special_id(&self, kind: SpecialTokenKind, model: &dyn SubwordModel) -> Option<u32> {
        self.special
            .content(kind)
            .and_then(|content| self.lookup(content, model))
    }

    pub fn unk_id(&self, model: &dyn SubwordModel) -> Option<u32> {
        self.special_id(SpecialTokenKind::Unk, model)
    }

    pub fn all_special_ids(&self, model: &dyn SubwordModel) -> Vec<u32> {
        let mut ids = Vec::new();
        for content in self.special.all_contents() {
            if let Some(id) = self.lookup(content, model) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    fn refresh_tries(&mut self) {
        self.trie.extend(self.encoder.keys());

        let mut protected = Trie::new();
        protected.extend(self.special.all_contents());
        protected.extend(
            self.decoder
                .values()
                .filter(|t| !t.special && t.normalized)
                .map(|t| t.content.as_str()),
        );
        self.case_protected = protected;
    }
}
