//! Token estimation for chunk sizing.
//!
//! No tokenizer model ships with the crate; sizes are approximated with a
//! word/character blend that tracks byte-pair encoders closely enough for
//! chunk budgeting. English prose averages ~4 characters per token and
//! ~0.75 words per token, so we take the larger of the two estimates to
//! stay conservative on dense text.

/// Approximate the number of BPE tokens in `text`.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    let words = text.split_whitespace().count();
    ((words * 4).div_ceil(3)).max(chars / 4)
}
