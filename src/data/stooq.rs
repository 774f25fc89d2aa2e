use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::data::source::PriceSource;
use crate::data::{parse_price_csv, PriceTable};
use crate::error::{RegimeError, Result};

const STOOQ_BASE: &str = "https://stooq.com/q/d/l/";

/// Daily CSV downloads from stooq.com (full history, filtered locally).
pub struct Stooq {
    client: Client,
    base: &'static str,
}

impl Stooq {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().user_agent("regime-horizon-map/0.1").build()?,
            base: STOOQ_BASE,
        })
    }

    pub fn symbol(ticker: &str) -> String {
        if ticker.eq_ignore_ascii_case("SPY") {
            "spy.us".to_string()
        } else {
            ticker.to_lowercase()
        }
    }
}

#[async_trait]
impl PriceSource for Stooq {
    fn name(&self) -> &'static str {
        "stooq"
    }

    async fn fetch_daily(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceTable> {
        let symbol = Self::symbol(ticker);
        let resp = self
            .client
            .get(self.base)
            .query(&[("s", symbol.as_str()), ("i", "d")])
            .send()
            .await?
            .error_for_status()?;
        let body = resp.text().await?;

        // Unknown symbols come back as a plain "No data" body
        let table = parse_price_csv(&body).map_err(|e| {
            RegimeError::Retrieval(format!("stooq response for {} unusable: {}", symbol, e))
        })?;
        Ok(table.restrict(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(Stooq::symbol("SPY"), "spy.us");
        assert_eq!(Stooq::symbol("spy"), "spy.us");
        assert_eq!(Stooq::symbol("AAPL.US"), "aapl.us");
    }

    #[test]
    fn test_endpoint_is_fixed() {
        std::env::set_var("STOOQ_BASE", "http://127.0.0.1:9/");
        let src = Stooq::new().unwrap();
        std::env::remove_var("STOOQ_BASE");
        assert_eq!(src.base, STOOQ_BASE);
    }
}
