use chrono::NaiveDate;

use crate::error::{RegimeError, Result};
use crate::features::{rolling_features, ReturnSeries};
use crate::logging::log_panel;
use crate::regime::{classify_with_threshold, Regime, RegimeSummary};

/// Aligned per-horizon series consumed by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonPanel {
    label: String,
    dates: Vec<NaiveDate>,
    mu: Vec<f64>,
    vol: Vec<f64>,
    regime: Vec<Regime>,
}

impl HorizonPanel {
    /// Fails with `InvariantViolation` unless all four series have one entry
    /// per date.
    pub fn new(
        label: impl Into<String>,
        dates: Vec<NaiveDate>,
        mu: Vec<f64>,
        vol: Vec<f64>,
        regime: Vec<Regime>,
    ) -> Result<Self> {
        let label = label.into();
        let n = dates.len();
        if mu.len() != n || vol.len() != n || regime.len() != n {
            return Err(RegimeError::InvariantViolation(format!(
                "panel {}: dates={} mu={} vol={} regime={}",
                label,
                n,
                mu.len(),
                vol.len(),
                regime.len()
            )));
        }
        Ok(Self { label, dates, mu, vol, regime })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    pub fn vol(&self) -> &[f64] {
        &self.vol
    }

    pub fn regime(&self) -> &[Regime] {
        &self.regime
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Day count when the label reads `<N>D`.
    pub fn horizon_days(&self) -> Option<usize> {
        parse_horizon_label(&self.label)
    }
}

pub fn horizon_label(h: usize) -> String {
    format!("{}D", h)
}

/// Parses `<digits>D` (surrounding whitespace ignored).
pub fn parse_horizon_label(label: &str) -> Option<usize> {
    let digits = label.trim().strip_suffix('D')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Features, labels and summary for one horizon.
pub fn assemble_panel(returns: &ReturnSeries, horizon: usize) -> Result<(HorizonPanel, RegimeSummary)> {
    let features = rolling_features(returns, horizon)?;
    let (regime, vol_thr) = classify_with_threshold(&features)?;
    let label = horizon_label(horizon);

    let dates = features.rows.iter().map(|r| r.date).collect();
    let mu = features.rows.iter().map(|r| r.mu).collect();
    let vol = features.rows.iter().map(|r| r.vol).collect();
    let panel = HorizonPanel::new(label, dates, mu, vol, regime)?;

    let summary = RegimeSummary::from_labels(panel.label(), vol_thr, panel.regime());
    log_panel(
        &summary.label,
        summary.entries,
        summary.vol_threshold,
        [summary.positive_frac, summary.negative_frac, summary.uncertain_frac],
        summary.dominant.name(),
    );
    Ok((panel, summary))
}

/// One panel per configured horizon, in configuration order.
pub fn build_panels(returns: &ReturnSeries, horizons: &[usize]) -> Result<Vec<HorizonPanel>> {
    horizons
        .iter()
        .map(|&h| assemble_panel(returns, h).map(|(panel, _)| panel))
        .collect()
}
