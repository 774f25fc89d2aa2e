use chrono::NaiveDate;
use std::path::PathBuf;

use crate::data::source::DataSource;
use crate::error::{RegimeError, Result};
use crate::logging::params_hash;

/// Run parameters, built once at startup and passed by reference.
#[derive(Clone, Debug)]
pub struct Config {
    pub ticker: String,
    pub start: NaiveDate,
    /// Exclusive
    pub end: NaiveDate,
    /// Rolling window lengths in trading days
    pub horizons: Vec<usize>,
    pub data_source: DataSource,
    pub cache_dir: PathBuf,
    pub figure_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ticker: "SPY".to_string(),
            start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
            horizons: vec![5, 20, 60],
            data_source: DataSource::Stooq,
            cache_dir: PathBuf::from("data"),
            figure_path: PathBuf::from("outputs/regime_horizon_map_output1.png"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let cfg = Self {
            ticker: std::env::var("TICKER").unwrap_or(d.ticker),
            start: match std::env::var("START") {
                Ok(v) => parse_date("START", &v)?,
                Err(_) => d.start,
            },
            end: match std::env::var("END") {
                Ok(v) => parse_date("END", &v)?,
                Err(_) => d.end,
            },
            horizons: match std::env::var("HORIZONS") {
                Ok(v) => parse_horizons(&v)?,
                Err(_) => d.horizons,
            },
            data_source: match std::env::var("DATA_SOURCE") {
                Ok(v) => DataSource::parse(&v)?,
                Err(_) => d.data_source,
            },
            cache_dir: std::env::var("CACHE_DIR").map(PathBuf::from).unwrap_or(d.cache_dir),
            figure_path: std::env::var("FIGURE_PATH").map(PathBuf::from).unwrap_or(d.figure_path),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ticker.trim().is_empty() {
            return Err(RegimeError::Configuration("ticker is empty".into()));
        }
        if self.start >= self.end {
            return Err(RegimeError::Configuration(format!(
                "start {} must be before end {}",
                self.start, self.end
            )));
        }
        if self.horizons.is_empty() {
            return Err(RegimeError::Configuration("no horizons configured".into()));
        }
        if self.horizons.iter().any(|&h| h == 0) {
            return Err(RegimeError::Configuration("horizons must be positive".into()));
        }
        Ok(())
    }

    pub fn params_hash(&self) -> String {
        let horizons: Vec<String> = self.horizons.iter().map(|h| h.to_string()).collect();
        params_hash(&format!(
            "{}|{}|{}|{}|{}",
            self.ticker,
            self.start,
            self.end,
            horizons.join(","),
            self.data_source.as_str()
        ))
    }
}

fn parse_date(key: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| RegimeError::Configuration(format!("{}={:?} is not an ISO date: {}", key, value, e)))
}

/// Comma-separated list of positive day counts, e.g. `5,20,60`.
pub fn parse_horizons(value: &str) -> Result<Vec<usize>> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(h) if h > 0 => Ok(h),
            _ => Err(RegimeError::Configuration(format!("bad horizon {:?}", s))),
        })
        .collect()
}
