/// Bounded string similarity on normalized text.
///
/// All scores are in `0.0..=100.0`, symmetric, and deterministic.
/// `ratio` is the Indel similarity (insertions and deletions only) over
/// Unicode scalar values; `token_sort_ratio` applies it after sorting the
/// whitespace tokens, so word order stops mattering.
use crate::normalize::tokens;

pub const MAX_SCORE: f64 = 100.0;

/// Pre-split form of a normalized string, built once per corpus entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Key {
    chars: Vec<char>,
    sorted: Vec<char>,
}

impl Key {
    #[must_use]
    pub fn new(normalized: &str) -> Self {
        Self {
            chars: normalized.chars().collect(),
            sorted: token_sorted(normalized).chars().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Combined score used by the match index: the better of the plain and the
/// token-sorted ratio.
#[must_use]
pub fn score(a: &Key, b: &Key) -> f64 {
    let plain = ratio_chars(&a.chars, &b.chars);
    if plain >= MAX_SCORE {
        return plain;
    }
    plain.max(ratio_chars(&a.sorted, &b.sorted))
}

#[must_use]
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

#[must_use]
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&token_sorted(a), &token_sorted(b))
}

fn token_sorted(normalized: &str) -> String {
    let mut toks: Vec<&str> = tokens(normalized).collect();
    toks.sort_unstable();
    toks.join(" ")
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return MAX_SCORE;
    }
    let lcs = lcs_len(a, b);
    let indel = total - 2 * lcs;
    MAX_SCORE * (1.0 - indel as f64 / total as f64)
}

/// Longest common subsequence length, two-row dynamic programming.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };

    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];
    for &lc in long {
        for (j, &sc) in short.iter().enumerate() {
            curr[j + 1] = if lc == sc {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}
