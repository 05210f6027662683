//! Multi-pattern longest-match splitter for added tokens.
//!
//! The trie is built over every added-token string. [`Trie::split`] carves
//! each occurrence of an added token out of the input as its own segment and
//! leaves the text in between untouched, so the segments always concatenate
//! back to the input.
//!
//! Matching is longest-match-wins: when a token ends, the scan keeps looking
//! ahead for a longer token that started at the same or an earlier position
//! before committing the split.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TrieNode {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    terminal: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<char, TrieNode>,
}

/// Character trie over added-token contents.
///
/// Children are kept in ordered maps, so the serialized form does not depend
/// on insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trie {
    root: TrieNode,
    tokens: BTreeSet<String>,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `word`. Empty strings are ignored and re-inserting is a no-op.
    pub fn add(&mut self, word: &str) {
        if word.is_empty() || self.tokens.contains(word) {
            return;
        }
        self.tokens.insert(word.to_string());

        let mut node = &mut self.root;
        for ch in word.chars() {
            node = node.children.entry(ch).or_default();
        }
        node.terminal = true;
    }

    pub fn contains(&self, word: &str) -> bool {
        self.tokens.contains(word)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// Split `text` on every maximal occurrence of an inserted word.
    ///
    /// ```
    /// use sliver::Trie;
    ///
    /// let mut trie = Trie::new();
    /// trie.add("[CLS]");
    /// trie.add("extra_id_100");
    /// assert_eq!(
    ///     trie.split("[CLS] This is a extra_id_100"),
    ///     vec!["[CLS]", " This is a ", "extra_id_100"]
    /// );
    /// ```
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        // In-progress matches, ordered by the char index they started at.
        let mut states: Vec<(usize, &TrieNode)> = Vec::new();
        let mut offsets = vec![0usize];
        let mut skip = 0usize;

        for (current, &current_char) in chars.iter().enumerate() {
            if skip > current {
                continue;
            }

            let mut to_remove: Vec<usize> = Vec::new();
            let mut reset = false;

            for idx in 0..states.len() {
                let (start, node) = states[idx];

                if node.terminal {
                    // A match ended here. Look ahead across every state that
                    // started at or before it for the furthest match.
                    let mut start = start;
                    let mut end = current;
                    for &(lookstart, lookahead_node) in &states {
                        if lookstart > start {
                            break;
                        }
                        // States before `start` have already consumed `current_char`.
                        let mut lookahead_index = if lookstart < start {
                            current + 1
                        } else {
                            current
                        };
                        end = lookahead_index;

                        if lookahead_node.terminal {
                            start = lookstart;
                            end = lookahead_index;
                            skip = lookahead_index;
                        }

                        let mut look = lookahead_node;
                        while let Some(next_char) = chars.get(lookahead_index) {
                            let Some(child) = look.children.get(next_char) else {
                                break;
                            };
                            look = child;
                            lookahead_index += 1;
                            if look.terminal {
                                start = lookstart;
                                end = lookahead_index;
                                skip = lookahead_index;
                            }
                        }
                    }

                    offsets.push(start);
                    offsets.push(end);
                    reset = true;
                    break;
                } else if let Some(child) = node.children.get(&current_char) {
                    states[idx].1 = child;
                } else {
                    to_remove.push(start);
                }
            }

            if reset {
                states.clear();
            } else if !to_remove.is_empty() {
                states.retain(|(start, _)| !to_remove.contains(start));
            }

            if current >= skip {
                if let Some(child) = self.root.children.get(&current_char) {
                    states.push((current, child));
                }
            }
        }

        // A match still open at end of input.
        if let Some(&(start, _)) = states.iter().find(|(_, node)| node.terminal) {
            offsets.push(start);
            offsets.push(chars.len());
        }

        cut_text(text, &chars, offsets)
    }
}

impl<S: AsRef<str>> FromIterator<S> for Trie {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut trie = Trie::new();
        trie.extend(iter);
        trie
    }
}

impl<S: AsRef<str>> Extend<S> for Trie {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for word in iter {
            self.add(word.as_ref());
        }
    }
}

/// Slice `text` at the given char offsets.
fn cut_text<'a>(text: &'a str, chars: &[char], mut offsets: Vec<usize>) -> Vec<&'a str> {
    let mut byte_at = Vec::with_capacity(chars.len() + 1);
    let mut pos = 0;
    for ch in chars {
        byte_at.push(pos);
        pos += ch.len_utf8();
    }
    byte_at.push(pos);

    offsets.push(chars.len());
    let mut segments = Vec::new();
    let mut start = 0;
    for end in offsets {
        if start > end {
            error!(start, end, "trie split produced overlapping offsets, skipping");
            continue;
        }
        if start == end {
            continue;
        }
        segments.push(&text[byte_at[start]..byte_at[end]]);
        start = end;
    }
    segments
}
