//! Padding of encodings to a common length.
//!
//! Every id-sequence field of an [`Encoding`] is extended on the same side by
//! the same amount: `input_ids` with the pad id, `token_type_ids` with the pad
//! type id, `special_tokens_mask` with 1 and `attention_mask` with 0.

use super::encoding::{Encoding, Padding, Side};

/// Values used to fill padded positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadOptions {
    pub pad_id: u32,
    pub pad_type_id: u32,
    pub side: Side,
    /// Add an all-ones attention mask before padding if the encoding has none.
    pub return_attention_mask: bool,
}

/// Round `len` up to the next multiple of `multiple`.
pub fn round_up(len: usize, multiple: Option<usize>) -> usize {
    match multiple {
        Some(m) if m > 0 && len % m != 0 => (len / m + 1) * m,
        _ => len,
    }
}

/// Pad one encoding.
///
/// `Longest` pads to the encoding's own length, which only changes anything
/// when `pad_to_multiple_of` rounds it up. `MaxLength` without a length is a
/// no-op. Encodings already at or past the target are left as they are.
pub fn pad_encoding(
    encoding: &mut Encoding,
    padding: Padding,
    max_length: Option<usize>,
    pad_to_multiple_of: Option<usize>,
    options: &PadOptions,
) {
    if options.return_attention_mask && encoding.attention_mask.is_none() {
        encoding.attention_mask = Some(vec![1; encoding.input_ids.len()]);
    }

    let target = match padding {
        Padding::DoNotPad => return,
        Padding::Longest => encoding.input_ids.len(),
        Padding::MaxLength => match max_length {
            Some(max_length) => max_length,
            None => return,
        },
    };
    let target = round_up(target, pad_to_multiple_of);
    let difference = target.saturating_sub(encoding.input_ids.len());
    if difference == 0 {
        return;
    }

    fill(&mut encoding.input_ids, options.pad_id, difference, options.side);
    if let Some(types) = encoding.token_type_ids.as_mut() {
        fill(types, options.pad_type_id, difference, options.side);
    }
    if let Some(mask) = encoding.special_tokens_mask.as_mut() {
        fill(mask, 1, difference, options.side);
    }
    if let Some(mask) = encoding.attention_mask.as_mut() {
        fill(mask, 0, difference, options.side);
    }
}

/// Pad every row of a batch to one shared length.
///
/// `Longest` resolves to the longest row, then rows pad as `MaxLength`.
pub fn pad_batch(
    encodings: &mut [Encoding],
    padding: Padding,
    max_length: Option<usize>,
    pad_to_multiple_of: Option<usize>,
    options: &PadOptions,
) {
    let (padding, max_length) = match padding {
        Padding::Longest => (
            Padding::MaxLength,
            encodings.iter().map(Encoding::len).max(),
        ),
        other => (other, max_length),
    };
    for encoding in encodings.iter_mut() {
        pad_encoding(encoding, padding, max_length, pad_to_multiple_of, options);
    }
}

fn fill(values: &mut Vec<u32>, value: u32, count: usize, side: Side) {
    match side {
        Side::Right => values.extend(std::iter::repeat(value).take(count)),
        Side::Left => {
            values.splice(0..0, std::iter::repeat(value).take(count));
        }
    }
}
