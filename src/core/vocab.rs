//! Vocabulary and merges-list loading.
//!
//! Byte-level BPE tokenizers ship two assets:
//!
//! - a vocabulary: a JSON object mapping token strings to dense integer ids
//! - a merges list: plain text, one `left right` symbol pair per line, ordered
//!   by priority. The first line is a version header and is skipped.
//!
//! # Example Format
//!
//! ```text
//! #version: 0.2
//! l o
//! lo w</w>
//! e r</w>
//! ```
//!
//! Line `n` (counting from zero after the header) gets merge rank `n`; lower
//! ranks merge first.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors that can occur when loading vocabulary or merges data.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Invalid line format: {0}")]
    ParseError(String),
    #[error("Invalid vocabulary JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Bidirectional token-string ↔ id mapping.
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    encoder: FxHashMap<String, u32>,
    decoder: FxHashMap<u32, String>,
}

impl Vocab {
    /// Build a vocabulary from a token → id map.
    ///
    /// Fails if two tokens share an id, since the decoder could not be inverse.
    pub fn new(encoder: FxHashMap<String, u32>) -> Result<Self, VocabError> {
        let decoder = build_decoder(&encoder);
        if decoder.len() != encoder.len() {
            return Err(VocabError::ParseError(format!(
                "{} tokens share {} ids",
                encoder.len(),
                decoder.len()
            )));
        }
        Ok(Self { encoder, decoder })
    }

    /// Build a vocabulary whose ids follow iteration order.
    ///
    /// Repeated tokens keep their first id and do not consume a new one.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut encoder = FxHashMap::default();
        let mut decoder = FxHashMap::default();
        for token in tokens {
            let token = token.into();
            if encoder.contains_key(&token) {
                continue;
            }
            let id = encoder.len() as u32;
            decoder.insert(id, token.clone());
            encoder.insert(token, id);
        }
        Self { encoder, decoder }
    }

    /// Parse a `vocab.json` document (`{"token": id, ...}`).
    pub fn from_json(data: &str) -> Result<Self, VocabError> {
        let encoder: FxHashMap<String, u32> = serde_json::from_str(data)?;
        Self::new(encoder)
    }

    /// Load a `vocab.json` file from disk.
    pub fn from_json_file(path: &str) -> Result<Self, VocabError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    #[inline]
    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.encoder.get(token).copied()
    }

    #[inline]
    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.decoder.get(&id).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.encoder.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }

    /// Get the encoder map (token -> ID).
    pub fn encoder(&self) -> &FxHashMap<String, u32> {
        &self.encoder
    }
}

/// Parse a merges list into ordered symbol pairs.
///
/// The first line is a version header and is always skipped. Blank lines are
/// ignored; any other line must hold exactly two whitespace-separated symbols.
pub fn parse_merges(data: &str) -> Result<Vec<(String, String)>, VocabError> {
    let mut merges = Vec::new();

    for (line_no, line) in data.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(left), Some(right), None) => merges.push((left.to_string(), right.to_string())),
            _ => {
                return Err(VocabError::ParseError(format!(
                    "line {}: expected `left right`, got {:?}",
                    line_no + 1,
                    line
                )))
            }
        }
    }

    Ok(merges)
}

/// Load a merges list from a file path.
pub fn load_merges_file(path: &str) -> Result<Vec<(String, String)>, VocabError> {
    let data = std::fs::read_to_string(path)?;
    parse_merges(&data)
}

/// Build a decoder map (token ID → token) from an encoder map.
pub fn build_decoder(encoder: &FxHashMap<String, u32>) -> FxHashMap<u32, String> {
    encoder.iter().map(|(k, v)| (*v, k.clone())).collect()
}
