//! Rank-ordered greedy pair merging.
//!
//! A token (already mapped into the byte-level alphabet) starts as a list of
//! one-character symbols; the last symbol carries the end-of-word suffix when
//! one is configured. Each round picks the adjacent pair with the lowest merge
//! rank and merges every non-overlapping occurrence of it, scanning left to
//! right. Merging stops when one symbol remains or no adjacent pair has a rank.
//!
//! Results are memoized per distinct input in a bounded LRU cache owned by
//! the [`Bpe`].

use lru::LruCache;
use rustc_hash::FxHashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// End-of-word marker used by CLIP-style vocabularies.
pub const END_OF_WORD_SUFFIX: &str = "</w>";

/// Default number of memoized tokens.
pub const DEFAULT_CACHE_SIZE: usize = 4096;

/// Merge priority lookup: `(left, right) -> rank`.
///
/// Stored as a nested map so lookups by `&str` pairs need no allocation.
#[derive(Debug, Clone, Default)]
pub struct BpeRanks {
    ranks: FxHashMap<String, FxHashMap<String, u32>>,
    len: usize,
}

impl BpeRanks {
    /// Build ranks from an ordered merges list. The first occurrence of a pair
    /// keeps its rank.
    pub fn from_merges<I, L, R>(merges: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        let mut table = Self::default();
        for (rank, (left, right)) in merges.into_iter().enumerate() {
            let inner = table.ranks.entry(left.into()).or_default();
            if let std::collections::hash_map::Entry::Vacant(slot) = inner.entry(right.into()) {
                slot.insert(rank as u32);
                table.len += 1;
            }
        }
        table
    }

    #[inline]
    pub fn rank(&self, left: &str, right: &str) -> Option<u32> {
        self.ranks.get(left)?.get(right).copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// BPE merge engine with a per-instance memo cache.
#[derive(Debug)]
pub struct Bpe {
    ranks: BpeRanks,
    end_of_word_suffix: Option<String>,
    cache: Mutex<LruCache<String, String>>,
    cache_size: usize,
}

impl Bpe {
    pub fn new(ranks: BpeRanks, end_of_word_suffix: Option<String>) -> Self {
        Self::with_cache_size(ranks, end_of_word_suffix, DEFAULT_CACHE_SIZE)
    }

    /// A cache size of 0 is treated as 1.
    pub fn with_cache_size(ranks: BpeRanks, end_of_word_suffix: Option<String>, cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            ranks,
            end_of_word_suffix,
            cache: Mutex::new(LruCache::new(capacity)),
            cache_size: capacity.get(),
        }
    }

    pub fn ranks(&self) -> &BpeRanks {
        &self.ranks
    }

    pub fn end_of_word_suffix(&self) -> Option<&str> {
        self.end_of_word_suffix.as_deref()
    }

    /// Merge `token` into sub-word units, returned space-separated.
    pub fn bpe(&self, token: &str) -> String {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(token) {
                return cached.clone();
            }
        }

        let merged = self.merge_word(token);

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(token.to_string(), merged.clone());
        }

        merged
    }

    /// The uncached merge computation.
    pub fn merge_word(&self, token: &str) -> String {
        let mut word: Vec<String> = token.chars().map(String::from).collect();
        let Some(last) = word.last_mut() else {
            return String::new();
        };
        if let Some(suffix) = &self.end_of_word_suffix {
            last.push_str(suffix);
        }

        while word.len() > 1 {
            let best = word
                .windows(2)
                .filter_map(|pair| {
                    self.ranks
                        .rank(&pair[0], &pair[1])
                        .map(|rank| (rank, &pair[0], &pair[1]))
                })
                .min_by_key(|&(rank, _, _)| rank);

            let Some((_, first, second)) = best else {
                break;
            };
            let (first, second) = (first.clone(), second.clone());

            let mut merged = Vec::with_capacity(word.len());
            let mut symbols = word.into_iter().peekable();
            while let Some(symbol) = symbols.next() {
                if symbol == first && symbols.peek() == Some(&second) {
                    symbols.next();
                    merged.push(format!("{first}{second}"));
                } else {
                    merged.push(symbol);
                }
            }
            word = merged;
        }

        word.join(" ")
    }

    /// Number of memoized tokens.
    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

impl Clone for Bpe {
    fn clone(&self) -> Self {
        // Caches are not shared between instances.
        Self::with_cache_size(self.ranks.clone(), self.end_of_word_suffix.clone(), self.cache_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip_bpe() -> Bpe {
        let ranks = BpeRanks::from_merges([("l", "o"), ("lo", "w</w>"), ("e", "r</w>")]);
        Bpe::new(ranks, Some(END_OF_WORD_SUFFIX.to_string()))
    }

    #[test]
    fn test_merges_lowest_rank_first() {
        let bpe = clip_bpe();
        assert_eq!(bpe.bpe("lower"), "lo w er</w>");
        assert_eq!(bpe.bpe("newer"), "n e w er</w>");
    }

    #[test]
    fn test_chained_merges() {
        let bpe = clip_bpe();
        assert_eq!(bpe.bpe("low"), "low</w>");
    }

    #[test]
    fn test_single_char_gets_suffix() {
        let bpe = clip_bpe();
        assert_eq!(bpe.bpe("x"), "x</w>");
        assert_eq!(bpe.bpe(""), "");
    }

    #[test]
    fn test_no_suffix_mode() {
        let ranks = BpeRanks::from_merges([("Ġ", "l"), ("Ġl", "o"), ("Ġlo", "w")]);
        let bpe = Bpe::new(ranks, None);
        assert_eq!(bpe.bpe("Ġlow"), "Ġlow");
        assert_eq!(bpe.bpe("Ġlowly"), "Ġlow l y");
    }

    #[test]
    fn test_merges_all_non_overlapping_occurrences() {
        let ranks = BpeRanks::from_merges([("a", "a")]);
        let bpe = Bpe::new(ranks, None);
        // "aaa": the first two merge, the third is left over, then "aa a" has no rank.
        assert_eq!(bpe.bpe("aaa"), "aa a");
        assert_eq!(bpe.bpe("aaaa"), "aa aa");
    }

    #[test]
    fn test_cache_matches_uncached() {
        let bpe = clip_bpe();
        let first = bpe.bpe("lowerlower");
        assert_eq!(bpe.cache_len(), 1);
        let second = bpe.bpe("lowerlower");
        assert_eq!(first, second);
        assert_eq!(first, bpe.merge_word("lowerlower"));

        bpe.clear_cache();
        assert_eq!(bpe.cache_len(), 0);
    }

    #[test]
    fn test_cache_is_bounded() {
        let bpe = Bpe::with_cache_size(clip_bpe().ranks().clone(), Some(END_OF_WORD_SUFFIX.to_string()), 2);
        let words = ["lower", "lowest", "newer", "wider", "low"];
        let first: Vec<String> = words.iter().map(|w| bpe.merge_word(w)).collect();

        for (word, expected) in words.iter().zip(&first) {
            assert_eq!(&bpe.bpe(word), expected);
            assert!(bpe.cache_len() <= 2);
        }
        assert_eq!(bpe.cache_len(), 2);

        // "lower" was evicted long ago; merging it again gives the same pieces.
        assert_eq!(bpe.bpe("lower"), first[0]);
        assert_eq!(bpe.cache_len(), 2);
    }

    #[test]
    fn test_duplicate_merge_keeps_first_rank() {
        let ranks = BpeRanks::from_merges([("a", "b"), ("c", "d"), ("a", "b")]);
        assert_eq!(ranks.rank("a", "b"), Some(0));
        assert_eq!(ranks.rank("c", "d"), Some(1));
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks.rank("b", "a"), None);
    }
}
