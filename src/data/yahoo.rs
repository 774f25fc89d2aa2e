use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;

use crate::data::source::PriceSource;
use crate::data::{PriceRow, PriceTable};
use crate::error::{RegimeError, Result};

const YAHOO_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo chart API, used as the alternate remote source.
pub struct Yahoo {
    client: Client,
    base: &'static str,
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize, Debug)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct AdjClose {
    adjclose: Option<Vec<Option<f64>>>,
}

impl Yahoo {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().user_agent("regime-horizon-map/0.1").build()?,
            base: YAHOO_BASE,
        })
    }
}

fn epoch_secs(d: NaiveDate) -> i64 {
    d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp()).unwrap_or(0)
}

/// Convert a chart payload into a price table, skipping bars without a close.
fn table_from_chart(resp: ChartResponse) -> Result<PriceTable> {
    if let Some(err) = resp.chart.error.filter(|e| !e.is_null()) {
        return Err(RegimeError::Retrieval(format!("yahoo error: {}", err)));
    }
    let result = resp
        .chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
        .ok_or_else(|| RegimeError::Retrieval("yahoo response has no result".into()))?;

    let timestamps = result
        .timestamp
        .ok_or_else(|| RegimeError::Retrieval("yahoo output missing timestamp column".into()))?;
    let adjusted = result.indicators.adjclose.into_iter().next().and_then(|a| a.adjclose);
    let closes = adjusted
        .or_else(|| result.indicators.quote.into_iter().next().and_then(|q| q.close))
        .ok_or_else(|| RegimeError::Retrieval("yahoo output missing close column".into()))?;
    if closes.len() != timestamps.len() {
        return Err(RegimeError::Retrieval(format!(
            "yahoo output has {} timestamps but {} closes",
            timestamps.len(),
            closes.len()
        )));
    }

    let rows = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let date = DateTime::from_timestamp(ts, 0)?.date_naive();
            close.map(|close| PriceRow { date, close })
        })
        .collect();
    PriceTable::new(rows)
}

#[async_trait]
impl PriceSource for Yahoo {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_daily(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceTable> {
        let url = format!("{}/{}", self.base, ticker);
        let period1 = epoch_secs(start).to_string();
        let period2 = epoch_secs(end).to_string();
        let resp: ChartResponse = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("interval", "1d"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(table_from_chart(resp)?.restrict(start, end))
    }
}
