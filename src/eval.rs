/// Offline matching evaluation over a labeled query file.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::matcher::MatchIndex;
use crate::normalize::normalize;
use crate::store::QaEntry;

/// One labeled query: the entry id a human expects to be returned.
#[derive(Debug, Clone, Deserialize)]
pub struct LabeledQuery {
    pub query: String,
    pub expected_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdStats {
    pub threshold: f64,
    /// Predictions at or above the threshold.
    pub predicted: usize,
    pub true_positives: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub total: usize,
    pub top1_hits: usize,
    pub top1_accuracy: f64,
    pub thresholds: Vec<ThresholdStats>,
    /// Threshold with the highest F1; the earliest one wins a tie.
    pub best_threshold: Option<f64>,
}

/// Top hit for one query and whether it was the right one.
struct Prediction {
    found: bool,
    score: f64,
    correct: bool,
}

pub fn load_labeled<P: AsRef<Path>>(path: P) -> Result<Vec<LabeledQuery>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labeled file: {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("invalid labeled file: {}", path.display()))
}

/// Run every query through `best_match` once and score the predictions at
/// each threshold. Empty input gives zeroed ratios rather than NaN.
#[must_use]
pub fn evaluate(index: &MatchIndex, labeled: &[LabeledQuery], thresholds: &[f64]) -> EvalReport {
    let predictions: Vec<Prediction> = labeled
        .iter()
        .map(|item| {
            let best = index.best_match(&item.query);
            Prediction {
                found: best.is_some(),
                score: best.as_ref().map_or(0.0, |b| b.score),
                correct: best.is_some_and(|b| b.entry.id == item.expected_id),
            }
        })
        .collect();
    report(&predictions, thresholds)
}

/// Leave-one-out over the corpus itself, no labeled file needed.
///
/// Each entry's question is matched against every other entry. The top hit
/// counts as correct when its answer normalizes to the held-out answer, so a
/// corpus with paraphrased questions sharing one answer scores well and a
/// corpus of unrelated questions shows where the threshold must sit to
/// reject them.
#[must_use]
pub fn evaluate_leave_one_out(entries: &[QaEntry], thresholds: &[f64]) -> EvalReport {
    let predictions: Vec<Prediction> = entries
        .iter()
        .enumerate()
        .map(|(held_out, entry)| {
            let others: Vec<QaEntry> = entries
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != held_out)
                .map(|(_, e)| e.clone())
                .collect();
            let index = MatchIndex::build(0, others);
            let best = index.best_match(&entry.question);
            let answer = normalize(&entry.answer);
            Prediction {
                found: best.is_some(),
                score: best.as_ref().map_or(0.0, |b| b.score),
                correct: best.is_some_and(|b| normalize(&b.entry.answer) == answer),
            }
        })
        .collect();
    report(&predictions, thresholds)
}

fn report(predictions: &[Prediction], thresholds: &[f64]) -> EvalReport {
    let total = predictions.len();
    let top1_hits = predictions.iter().filter(|p| p.correct).count();

    let thresholds: Vec<ThresholdStats> = thresholds
        .iter()
        .map(|&threshold| {
            let accepted = predictions
                .iter()
                .filter(|p| p.found && p.score >= threshold);
            let (mut predicted, mut true_positives) = (0, 0);
            for p in accepted {
                predicted += 1;
                if p.correct {
                    true_positives += 1;
                }
            }
            let precision = ratio(true_positives, predicted);
            let recall = ratio(true_positives, total);
            ThresholdStats {
                threshold,
                predicted,
                true_positives,
                precision,
                recall,
                f1: f1(precision, recall),
            }
        })
        .collect();

    let mut best: Option<&ThresholdStats> = None;
    for stats in &thresholds {
        if best.is_none_or(|b| stats.f1 > b.f1) {
            best = Some(stats);
        }
    }
    let best_threshold = best.map(|b| b.threshold);

    EvalReport {
        total,
        top1_hits,
        top1_accuracy: ratio(top1_hits, total),
        thresholds,
        best_threshold,
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}
