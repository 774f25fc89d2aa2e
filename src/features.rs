use chrono::NaiveDate;
use std::collections::VecDeque;

use crate::data::PriceTable;
use crate::error::{RegimeError, Result};
use crate::logging::log_features;

/// Trailing window over the last `window` observations.
#[derive(Debug, Clone)]
pub struct RollingStats {
    window: usize,
    buf: VecDeque<f64>,
}

impl RollingStats {
    pub fn new(window: usize) -> Self {
        Self { window, buf: VecDeque::with_capacity(window + 1) }
    }

    pub fn push(&mut self, x: f64) {
        self.buf.push_back(x);
        if self.buf.len() > self.window {
            self.buf.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.window
    }

    pub fn mean(&self) -> f64 {
        if self.buf.is_empty() {
            return 0.0;
        }
        self.buf.iter().sum::<f64>() / self.buf.len() as f64
    }

    /// Sample variance (ddof = 1); undefined below two observations.
    pub fn variance(&self) -> Option<f64> {
        let n = self.buf.len();
        if n < 2 {
            return None;
        }
        let m = self.mean();
        let ss: f64 = self.buf.iter().map(|x| (x - m) * (x - m)).sum();
        Some(ss / (n - 1) as f64)
    }

    pub fn stddev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

/// Daily log returns, dated at the later of each pair of closes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl ReturnSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(RegimeError::InvalidInput(format!(
                "{} dates for {} returns",
                dates.len(),
                values.len()
            )));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RegimeError::InvalidInput("return dates must be strictly increasing".into()));
        }
        Ok(Self { dates, values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    /// Trailing mean of returns
    pub mu: f64,
    /// Trailing sample standard deviation of returns
    pub vol: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureWindow {
    pub horizon: usize,
    pub rows: Vec<FeatureRow>,
}

impl FeatureWindow {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn log_returns(prices: &PriceTable) -> Result<ReturnSeries> {
    if prices.is_empty() {
        return Err(RegimeError::DataShape("price table has no rows".into()));
    }
    if let Some(bad) = prices.rows().iter().find(|r| !(r.close.is_finite() && r.close > 0.0)) {
        return Err(RegimeError::DataShape(format!(
            "close on {} is {}, expected a positive price",
            bad.date, bad.close
        )));
    }

    let (dates, values): (Vec<NaiveDate>, Vec<f64>) = prices
        .rows()
        .windows(2)
        .map(|w| (w[1].date, w[1].close.ln() - w[0].close.ln()))
        .unzip();
    ReturnSeries::new(dates, values)
}

/// Trailing mean and sample volatility over `horizon` returns.
///
/// Only positions with a full window produce an entry; nothing is
/// zero-filled.
pub fn rolling_features(returns: &ReturnSeries, horizon: usize) -> Result<FeatureWindow> {
    if horizon == 0 {
        return Err(RegimeError::InvalidInput("horizon must be at least 1".into()));
    }
    if returns.is_empty() {
        return Err(RegimeError::InvalidInput("return series is empty".into()));
    }

    let mut stats = RollingStats::new(horizon);
    let mut rows = Vec::with_capacity(returns.len().saturating_sub(horizon - 1));
    for (&date, &r) in returns.dates.iter().zip(&returns.values) {
        stats.push(r);
        if !stats.is_full() {
            continue;
        }
        if let Some(vol) = stats.stddev() {
            rows.push(FeatureRow { date, mu: stats.mean(), vol });
        }
    }

    log_features(horizon, returns.len(), rows.len());
    Ok(FeatureWindow { horizon, rows })
}
