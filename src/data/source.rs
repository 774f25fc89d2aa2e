use async_trait::async_trait;
use chrono::NaiveDate;

use crate::data::PriceTable;
use crate::data::{stooq::Stooq, yahoo::Yahoo};
use crate::error::{RegimeError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSource {
    /// Read the cache file only; never touches the network
    Cache,
    Stooq,
    Yahoo,
}

impl DataSource {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cache" => Ok(DataSource::Cache),
            "stooq" => Ok(DataSource::Stooq),
            "yahoo" => Ok(DataSource::Yahoo),
            other => Err(RegimeError::Configuration(format!(
                "unknown data source '{}', use 'cache', 'stooq' or 'yahoo'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Cache => "cache",
            DataSource::Stooq => "stooq",
            DataSource::Yahoo => "yahoo",
        }
    }

    /// Remote fetcher for this selector, `None` for cache-only runs.
    pub fn build(self) -> Result<Option<Box<dyn PriceSource + Send + Sync>>> {
        match self {
            DataSource::Cache => Ok(None),
            DataSource::Stooq => Ok(Some(Box::new(Stooq::new()?))),
            DataSource::Yahoo => Ok(Some(Box::new(Yahoo::new()?))),
        }
    }
}

/// Daily close history from a remote provider.
///
/// Implementations return rows restricted to `[start, end)` in ascending
/// date order.
#[async_trait]
pub trait PriceSource {
    fn name(&self) -> &'static str;

    async fn fetch_daily(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceTable>;
}
