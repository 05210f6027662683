use tracing::error;

use super::encoding::{Side, TruncationStrategy};
use super::warnings::WarnOnce;

/// Sequences after truncation, with the tokens cut from the truncated one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Truncated {
    pub ids: Vec<u32>,
    pub pair_ids: Option<Vec<u32>>,
    /// The removed block extended by `stride` tokens. Always empty for
    /// longest-first truncation of a pair.
    pub overflowing: Vec<u32>,
}

/// Remove `num_tokens_to_remove` tokens following `strategy`.
///
/// A one-sequence strategy fails, logging and leaving both sequences
/// unchanged, when its sequence is not longer than the removal count.
pub fn truncate_sequences(
    ids: Vec<u32>,
    pair_ids: Option<Vec<u32>>,
    num_tokens_to_remove: usize,
    strategy: TruncationStrategy,
    stride: usize,
    side: Side,
    warnings: &WarnOnce,
) -> Truncated {
    let unchanged = |ids, pair_ids| Truncated {
        ids,
        pair_ids,
        overflowing: Vec::new(),
    };
    if num_tokens_to_remove == 0 {
        return unchanged(ids, pair_ids);
    }

    match (strategy, pair_ids) {
        (TruncationStrategy::OnlyFirst, pair_ids) | (TruncationStrategy::LongestFirst, pair_ids @ None) => {
            let (ids, overflowing) = cut("first", ids, num_tokens_to_remove, stride, side);
            Truncated {
                ids,
                pair_ids,
                overflowing,
            }
        }
        (TruncationStrategy::LongestFirst, Some(pair)) => {
            warnings.warn("longest-first-overflow", || {
                "Overflowing tokens are not returned when truncating a pair with the \
                 longest_first strategy; use only_first or only_second to collect them"
                    .to_string()
            });
            let (ids, pair) = remove_from_longest(ids, pair, num_tokens_to_remove, side);
            unchanged(ids, Some(pair))
        }
        (TruncationStrategy::OnlySecond, Some(pair)) => {
            let (pair, overflowing) = cut("second", pair, num_tokens_to_remove, stride, side);
            Truncated {
                ids,
                pair_ids: Some(pair),
                overflowing,
            }
        }
        (TruncationStrategy::OnlySecond, None) => unchanged(ids, None),
        (TruncationStrategy::DoNotTruncate, pair_ids) => unchanged(ids, pair_ids),
    }
}

/// Remove one token at a time from whichever sequence is longer.
/// Ties shorten the second sequence.
fn remove_from_longest(mut ids: Vec<u32>, mut pair: Vec<u32>, num: usize, side: Side) -> (Vec<u32>, Vec<u32>) {
    for _ in 0..num {
        let target = if ids.len() > pair.len() { &mut ids } else { &mut pair };
        if target.is_empty() {
            break;
        }
        match side {
            Side::Right => {
                target.pop();
            }
            Side::Left => {
                target.remove(0);
            }
        }
    }
    (ids, pair)
}

/// Cut `num` tokens from `side` of `seq`, returning the rest and the window
/// of `num + stride` tokens at the cut end.
fn cut(which: &str, mut seq: Vec<u32>, num: usize, stride: usize, side: Side) -> (Vec<u32>, Vec<u32>) {
    if seq.len() <= num {
        error!(
            sequence = which,
            len = seq.len(),
            remove = num,
            "cannot truncate: sequence is not longer than the number of tokens to remove"
        );
        return (seq, Vec::new());
    }

    let window = seq.len().min(stride + num);
    match side {
        Side::Left => {
            let overflowing = seq[..window].to_vec();
            (seq.split_off(num), overflowing)
        }
        Side::Right => {
            let overflowing = seq[seq.len() - window..].to_vec();
            let keep = seq.len() - num;
            seq.truncate(keep);
            (seq, overflowing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        ids: &[u32],
        pair: Option<&[u32]>,
        num: usize,
        strategy: TruncationStrategy,
        stride: usize,
        side: Side,
    ) -> Truncated {
        truncate_sequences(
            ids.to_vec(),
            pair.map(<[u32]>::to_vec),
            num,
            strategy,
            stride,
            side,
            &WarnOnce::new(),
        )
    }

    #[test]
    fn test_only_first_right_with_stride() {
        let out = run(&[1, 2, 3, 4, 5], None, 2, TruncationStrategy::OnlyFirst, 1, Side::Right);
        assert_eq!(out.ids, vec![1, 2, 3]);
        assert_eq!(out.overflowing, vec![3, 4, 5]);
    }

    #[test]
    fn test_only_first_left() {
        let out = run(&[1, 2, 3, 4, 5], Some(&[9]), 2, TruncationStrategy::OnlyFirst, 0, Side::Left);
        assert_eq!(out.ids, vec![3, 4, 5]);
        assert_eq!(out.overflowing, vec![1, 2]);
        assert_eq!(out.pair_ids, Some(vec![9]));
    }

    #[test]
    fn test_overflow_accounts_for_every_token() {
        let original: Vec<u32> = (0..10).collect();
        for strategy in [TruncationStrategy::OnlyFirst, TruncationStrategy::LongestFirst] {
            for side in [Side::Left, Side::Right] {
                let out = run(&original, None, 4, strategy, 0, side);
                assert_eq!(out.ids.len() + out.overflowing.len(), original.len());
            }
        }
        let out = run(&[1], Some(&original), 3, TruncationStrategy::OnlySecond, 0, Side::Right);
        let pair = out.pair_ids.unwrap();
        assert_eq!(pair.len() + out.overflowing.len(), original.len());
        assert_eq!(out.ids, vec![1]);
    }

    #[test]
    fn test_too_short_leaves_unchanged() {
        let out = run(&[1, 2], None, 2, TruncationStrategy::OnlyFirst, 0, Side::Right);
        assert_eq!(out.ids, vec![1, 2]);
        assert!(out.overflowing.is_empty());

        let out = run(&[1, 2, 3], Some(&[4]), 1, TruncationStrategy::OnlySecond, 0, Side::Right);
        assert_eq!(out.ids, vec![1, 2, 3]);
        assert_eq!(out.pair_ids, Some(vec![4]));
    }

    #[test]
    fn test_longest_first_pair() {
        let warnings = WarnOnce::new();
        let out = truncate_sequences(
            vec![1, 2, 3, 4],
            Some(vec![5, 6]),
            3,
            TruncationStrategy::LongestFirst,
            0,
            Side::Right,
            &warnings,
        );
        // 4 vs 2 -> first; 3 vs 2 -> first; 2 vs 2 -> second.
        assert_eq!(out.ids, vec![1, 2]);
        assert_eq!(out.pair_ids, Some(vec![5]));
        assert!(out.overflowing.is_empty());
        assert!(warnings.has_warned("longest-first-overflow"));
    }

    #[test]
    fn test_longest_first_left_side() {
        let out = run(&[1, 2], Some(&[3, 4]), 2, TruncationStrategy::LongestFirst, 0, Side::Left);
        assert_eq!(out.ids, vec![2]);
        assert_eq!(out.pair_ids, Some(vec![4]));
    }

    #[test]
    fn test_do_not_truncate_keeps_pair() {
        let out = run(&[1, 2], Some(&[3]), 2, TruncationStrategy::DoNotTruncate, 0, Side::Right);
        assert_eq!(out.ids, vec![1, 2]);
        assert_eq!(out.pair_ids, Some(vec![3]));
    }
}
