//! Skill scores for replaying historical events
//!
//! Compares a predicted risk grid with an observed landslide inventory
//! (`true` where a slide occurred).

use crate::error::{Error, Result};
use crate::grid::FieldData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decision threshold used to binarise risk
pub const DEFAULT_DECISION_THRESHOLD: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Area under the ROC curve
    pub auc: f64,
}

/// Classification metrics of `risk > threshold` against `observed`.
///
/// Precision, recall and F1 are 0 when undefined. AUC is 0.5 when only one
/// class is present.
pub fn compute_metrics(
    observed: &[bool],
    risk: &FieldData,
    threshold: f32,
) -> Result<BacktestMetrics> {
    if observed.len() != risk.len() {
        let (width, height) = risk.dimensions();
        return Err(Error::ShapeMismatch {
            field: "observed",
            expected_width: width,
            expected_height: height,
            width: observed.len(),
            height: 1,
        });
    }

    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&truth, &r) in observed.iter().zip(risk.as_slice()) {
        match (truth, r > threshold) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| {
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = ratio(2 * tp, 2 * tp + fp + fn_);

    Ok(BacktestMetrics {
        precision,
        recall,
        f1,
        auc: roc_auc(observed, risk.as_slice()),
    })
}

/// Mann-Whitney rank statistic with average ranks for ties.
fn roc_auc(observed: &[bool], scores: &[f32]) -> f64 {
    let positives = observed.iter().filter(|&&t| t).count();
    let negatives = observed.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0_f64;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block i..=j shares the mean rank
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if observed[idx] {
                positive_rank_sum += mean_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

/// Hours between the earliest alert and the event, never negative.
///
/// Zero when no alert was raised.
#[must_use]
pub fn alert_lead_time_hours(alert_times: &[DateTime<Utc>], event_time: DateTime<Utc>) -> f64 {
    alert_times.iter().min().map_or(0.0, |&earliest| {
        ((event_time - earliest).num_milliseconds() as f64 / 3_600_000.0).max(0.0)
    })
}
