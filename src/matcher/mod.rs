/// In-memory match index over the question/answer corpus.
///
/// A [`MatchIndex`] is an immutable snapshot: it is built in one go from the
/// store's full listing and never patched afterwards. The cache replaces it
/// wholesale on every rebuild.
pub mod similarity;

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::normalize::normalize;
use crate::store::QaEntry;
use similarity::Key;

/// Immutable snapshot of the corpus with pre-computed match keys.
#[derive(Debug)]
pub struct MatchIndex {
    version: u64,
    loaded_at: Instant,
    loaded_at_utc: DateTime<Utc>,
    entries: Vec<QaEntry>,
    keys: Vec<Key>,
}

/// The best candidate for an input, before any threshold is applied.
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub entry: &'a QaEntry,
    pub score: f64,
}

/// Outcome of a query after the context threshold has been applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Set only when `matched` is true.
    pub entry: Option<QaEntry>,
    /// Best score seen, even on a miss.
    pub score: f64,
    pub matched: bool,
}

impl MatchResult {
    #[must_use]
    pub fn miss(score: f64) -> Self {
        Self {
            entry: None,
            score,
            matched: false,
        }
    }

    /// Apply `threshold` to a candidate. A score below it never yields an entry.
    #[must_use]
    pub fn evaluate(best: Option<Scored<'_>>, threshold: f64) -> Self {
        match best {
            Some(s) if s.score >= threshold => Self {
                entry: Some(s.entry.clone()),
                score: s.score,
                matched: true,
            },
            Some(s) => Self::miss(s.score),
            None => Self::miss(0.0),
        }
    }

    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        self.entry.as_ref().map(|e| e.answer.as_str())
    }
}

impl MatchIndex {
    /// Build a snapshot. Keys are derived from each entry's original question
    /// through [`normalize`], the same function the query path uses.
    #[must_use]
    pub fn build(version: u64, entries: Vec<QaEntry>) -> Self {
        let keys = entries
            .iter()
            .map(|e| Key::new(&normalize(&e.question)))
            .collect();
        Self {
            version,
            loaded_at: Instant::now(),
            loaded_at_utc: Utc::now(),
            entries,
            keys,
        }
    }

    /// Highest-scoring entry for `input`. Ties keep the earliest entry in
    /// corpus order. `None` only when the corpus is empty.
    #[must_use]
    pub fn best_match(&self, input: &str) -> Option<Scored<'_>> {
        let query = Key::new(&normalize(input));
        let mut best: Option<Scored<'_>> = None;

        for (entry, key) in self.entries.iter().zip(&self.keys) {
            let score = similarity::score(&query, key);
            if best.is_none_or(|b| score > b.score) {
                best = Some(Scored { entry, score });
                if score >= similarity::MAX_SCORE {
                    break;
                }
            }
        }

        best
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    #[must_use]
    pub fn loaded_at_utc(&self) -> DateTime<Utc> {
        self.loaded_at_utc
    }

    #[must_use]
    pub fn entries(&self) -> &[QaEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
