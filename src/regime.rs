//! Regime classification from rolling drift and volatility.
//!
//! Each horizon gets its own volatility cutoff: the median of its whole
//! volatility column. Entries at or above the cutoff are high-uncertainty;
//! the rest are labelled by the sign of their drift. Because the median spans
//! the full history, a label can depend on volatility observed after its
//! date, so the labels describe history and must not be read as a causal
//! signal.

use serde::Serialize;

use crate::error::{RegimeError, Result};
use crate::features::FeatureWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(i8)]
pub enum Regime {
    /// Non-negative drift, volatility below the cutoff
    Positive = 1,
    /// Negative drift, volatility below the cutoff
    Negative = -1,
    /// Volatility at or above the cutoff
    Uncertain = 0,
}

impl Regime {
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(Regime::Positive),
            -1 => Some(Regime::Negative),
            0 => Some(Regime::Uncertain),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Regime::Positive => "positive_drift",
            Regime::Negative => "negative_drift",
            Regime::Uncertain => "high_uncertainty",
        }
    }

    /// Label for a single entry given the panel's volatility cutoff.
    pub fn classify(mu: f64, vol: f64, vol_thr: f64) -> Self {
        if vol >= vol_thr {
            Regime::Uncertain
        } else if mu >= 0.0 {
            Regime::Positive
        } else {
            Regime::Negative
        }
    }
}

/// Median with the midpoint convention for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some((v[mid - 1] + v[mid]) / 2.0)
    } else {
        Some(v[mid])
    }
}

pub fn vol_threshold(features: &FeatureWindow) -> Result<f64> {
    let vols: Vec<f64> = features.rows.iter().map(|r| r.vol).collect();
    median(&vols).ok_or_else(|| {
        RegimeError::InvalidInput(format!(
            "{}-day feature window is empty; volatility median undefined",
            features.horizon
        ))
    })
}

/// One label per feature row, in the same order.
pub fn classify(features: &FeatureWindow) -> Result<Vec<Regime>> {
    classify_with_threshold(features).map(|(labels, _)| labels)
}

/// Labels together with the volatility cutoff they were drawn against.
pub fn classify_with_threshold(features: &FeatureWindow) -> Result<(Vec<Regime>, f64)> {
    let vol_thr = vol_threshold(features)?;
    let labels = features
        .rows
        .iter()
        .map(|r| Regime::classify(r.mu, r.vol, vol_thr))
        .collect();
    Ok((labels, vol_thr))
}

/// Number of positions whose label differs from the one before it.
pub fn count_transitions(regimes: &[Regime]) -> usize {
    regimes.windows(2).filter(|w| w[0] != w[1]).count()
}

/// Per-horizon breakdown of a label series.
#[derive(Debug, Clone, Serialize)]
pub struct RegimeSummary {
    pub label: String,
    pub entries: usize,
    pub vol_threshold: f64,
    pub positive_frac: f64,
    pub negative_frac: f64,
    pub uncertain_frac: f64,
    pub dominant: Regime,
    pub transitions: usize,
}

impl RegimeSummary {
    pub fn from_labels(label: &str, vol_threshold: f64, regimes: &[Regime]) -> Self {
        let n = regimes.len().max(1) as f64;
        let frac = |target: Regime| regimes.iter().filter(|r| **r == target).count() as f64 / n;
        let positive = frac(Regime::Positive);
        let negative = frac(Regime::Negative);
        let uncertain = frac(Regime::Uncertain);

        // Ties go to uncertain, then positive
        let dominant = if uncertain >= positive && uncertain >= negative {
            Regime::Uncertain
        } else if positive >= negative {
            Regime::Positive
        } else {
            Regime::Negative
        };

        Self {
            label: label.to_string(),
            entries: regimes.len(),
            vol_threshold,
            positive_frac: positive,
            negative_frac: negative,
            uncertain_frac: uncertain,
            dominant,
            transitions: count_transitions(regimes),
        }
    }
}
