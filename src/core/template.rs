//! Family-specific placement of special tokens around one or two sequences.
//!
//! | layout   | single            | pair                                  |
//! |----------|-------------------|---------------------------------------|
//! | `None`   | `A`               | `A B`                                 |
//! | `Clip`   | `bos A eos`       | `bos A eos eos B eos`                 |
//! | `Bert`   | `cls A sep`       | `cls A sep B sep`                     |
//! | `BosEos` | `[bos] A [eos]`   | `[bos] A [eos] [bos] B [eos]`         |
//!
//! Token type ids are 0 over the first segment (its specials included) and
//! 1 over the second.

use serde::{Deserialize, Serialize};

use super::error::{Result, TokenizerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialTokensLayout {
    /// Plain concatenation.
    #[default]
    None,
    Clip,
    Bert,
    BosEos { add_bos: bool, add_eos: bool },
}

/// Resolved ids of the tokens a layout may place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutIds {
    pub bos: Option<u32>,
    pub eos: Option<u32>,
    pub cls: Option<u32>,
    pub sep: Option<u32>,
}

/// Special ids placed before and after each segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Frame {
    first_prefix: Vec<u32>,
    first_suffix: Vec<u32>,
    second_prefix: Vec<u32>,
    second_suffix: Vec<u32>,
}

fn require(id: Option<u32>, name: &str, layout: &str) -> Result<u32> {
    id.ok_or_else(|| {
        TokenizerError::Configuration(format!("{layout} layout requires a {name} token"))
    })
}

impl SpecialTokensLayout {
    fn frame(&self, ids: &LayoutIds) -> Result<Frame> {
        Ok(match *self {
            SpecialTokensLayout::None => Frame::default(),
            SpecialTokensLayout::Clip => {
                let bos = require(ids.bos, "bos", "clip")?;
                let eos = require(ids.eos, "eos", "clip")?;
                Frame {
                    first_prefix: vec![bos],
                    first_suffix: vec![eos],
                    second_prefix: vec![eos],
                    second_suffix: vec![eos],
                }
            }
            SpecialTokensLayout::Bert => {
                let cls = require(ids.cls, "cls", "bert")?;
                let sep = require(ids.sep, "sep", "bert")?;
                Frame {
                    first_prefix: vec![cls],
                    first_suffix: vec![sep],
                    second_prefix: Vec::new(),
                    second_suffix: vec![sep],
                }
            }
            SpecialTokensLayout::BosEos { add_bos, add_eos } => {
                let prefix = if add_bos {
                    vec![require(ids.bos, "bos", "bos/eos")?]
                } else {
                    Vec::new()
                };
                let suffix = if add_eos {
                    vec![require(ids.eos, "eos", "bos/eos")?]
                } else {
                    Vec::new()
                };
                Frame {
                    first_prefix: prefix.clone(),
                    first_suffix: suffix.clone(),
                    second_prefix: prefix,
                    second_suffix: suffix,
                }
            }
        })
    }

    /// Fail if a token this layout places is missing.
    pub fn validate(&self, ids: &LayoutIds) -> Result<()> {
        self.frame(ids).map(|_| ())
    }

    pub fn num_special_tokens_to_add(&self, ids: &LayoutIds, pair: bool) -> Result<usize> {
        let frame = self.frame(ids)?;
        let mut count = frame.first_prefix.len() + frame.first_suffix.len();
        if pair {
            count += frame.second_prefix.len() + frame.second_suffix.len();
        }
        Ok(count)
    }

    pub fn build_inputs(&self, ids: &LayoutIds, first: &[u32], second: Option<&[u32]>) -> Result<Vec<u32>> {
        let frame = self.frame(ids)?;
        let mut out = Vec::with_capacity(first.len() + second.map_or(0, <[u32]>::len) + 6);
        out.extend_from_slice(&frame.first_prefix);
        out.extend_from_slice(first);
        out.extend_from_slice(&frame.first_suffix);
        if let Some(second) = second {
            out.extend_from_slice(&frame.second_prefix);
            out.extend_from_slice(second);
            out.extend_from_slice(&frame.second_suffix);
        }
        Ok(out)
    }

    /// 1 at special positions, 0 at content positions.
    pub fn special_tokens_mask(&self, ids: &LayoutIds, first_len: usize, second_len: Option<usize>) -> Result<Vec<u32>> {
        let frame = self.frame(ids)?;
        let mut mask = Vec::new();
        mask.extend(std::iter::repeat(1).take(frame.first_prefix.len()));
        mask.extend(std::iter::repeat(0).take(first_len));
        mask.extend(std::iter::repeat(1).take(frame.first_suffix.len()));
        if let Some(second_len) = second_len {
            mask.extend(std::iter::repeat(1).take(frame.second_prefix.len()));
            mask.extend(std::iter::repeat(0).take(second_len));
            mask.extend(std::iter::repeat(1).take(frame.second_suffix.len()));
        }
        Ok(mask)
    }

    pub fn token_type_ids(&self, ids: &LayoutIds, first_len: usize, second_len: Option<usize>) -> Result<Vec<u32>> {
        let frame = self.frame(ids)?;
        let first = frame.first_prefix.len() + first_len + frame.first_suffix.len();
        let mut types = vec![0; first];
        if let Some(second_len) = second_len {
            let second = frame.second_prefix.len() + second_len + frame.second_suffix.len();
            types.extend(std::iter::repeat(1).take(second));
        }
        Ok(types)
    }
}
