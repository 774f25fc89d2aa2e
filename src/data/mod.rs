use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{RegimeError, Result};
use crate::logging::log_prices_loaded;

pub mod source;
pub mod stooq;
pub mod yahoo;

use source::PriceSource;

pub const EXPECTED_COLUMNS: [&str; 2] = ["Date", "Close"];

const DATE_ALIASES: [&str; 3] = ["date", "datetime", "time"];
const CLOSE_ALIASES: [&str; 3] = ["close", "adj_close", "adjclose"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes in strictly ascending date order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    rows: Vec<PriceRow>,
}

impl PriceTable {
    /// Sorts by date; a repeated date is a shape error.
    pub fn new(mut rows: Vec<PriceRow>) -> Result<Self> {
        rows.sort_by_key(|r| r.date);
        if let Some(w) = rows.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(RegimeError::DataShape(format!("duplicate date {}", w[0].date)));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep rows with `start <= date < end`.
    pub fn restrict(self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            rows: self.rows.into_iter().filter(|r| r.date >= start && r.date < end).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReport {
    pub columns: Vec<String>,
    pub expected: Vec<String>,
    pub ok: bool,
    pub message: String,
}

pub fn cache_path(cache_dir: &Path, ticker: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
    let safe = ticker.replace('^', "");
    cache_dir.join(format!("cache_{}_{}_{}.csv", safe, start, end))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| s.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(alias))
    })
}

/// Parse a price CSV, mapping common column spellings onto `Date`/`Close`.
pub fn parse_price_csv(text: &str) -> Result<PriceTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| RegimeError::DataShape(format!("missing CSV header: {}", e)))?
        .clone();

    let date_col = find_column(&headers, &DATE_ALIASES)
        .ok_or_else(|| RegimeError::DataShape("expected a 'Date' column".into()))?;
    let close_col = find_column(&headers, &CLOSE_ALIASES)
        .ok_or_else(|| RegimeError::DataShape("expected a 'Close' column".into()))?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| RegimeError::DataShape(format!("row {}: {}", line + 1, e)))?;
        let raw_date = record.get(date_col).unwrap_or("");
        let raw_close = record.get(close_col).unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| RegimeError::DataShape(format!("row {}: bad date {:?}", line + 1, raw_date)))?;
        let close = raw_close
            .trim()
            .parse::<f64>()
            .map_err(|e| RegimeError::DataShape(format!("row {}: bad close {:?}: {}", line + 1, raw_close, e)))?;
        rows.push(PriceRow { date, close });
    }
    PriceTable::new(rows)
}

pub fn read_price_csv(path: &Path) -> Result<PriceTable> {
    let text = std::fs::read_to_string(path)?;
    parse_price_csv(&text)
}

pub fn write_price_csv(path: &Path, table: &PriceTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let io = |e: csv::Error| RegimeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e));
    let mut writer = csv::Writer::from_path(path).map_err(io)?;
    writer.write_record(EXPECTED_COLUMNS).map_err(io)?;
    for row in table.rows() {
        writer
            .write_record([row.date.to_string(), row.close.to_string()])
            .map_err(io)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn validate_schema(path: &Path) -> Result<SchemaReport> {
    let header = read_header(path)?;
    let expected = EXPECTED_COLUMNS.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let ok = header == expected;
    let message = if ok {
        "schema ok".to_string()
    } else {
        format!("schema mismatch: got {:?} expected {:?}", header, expected)
    };
    Ok(SchemaReport {
        columns: header,
        expected,
        ok,
        message,
    })
}

pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| RegimeError::DataShape(e.to_string()))?;
    match reader.headers() {
        Ok(h) => Ok(h.iter().map(|s| s.trim().to_string()).collect()),
        Err(_) => Ok(Vec::new()),
    }
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Load closes for the configured ticker and window.
///
/// An existing cache file always wins. On a miss the configured remote source
/// is queried once and its result written to the cache; a cache-only run
/// fails without writing anything.
pub async fn load_prices(cfg: &Config) -> Result<PriceTable> {
    let fetcher = cfg.data_source.build()?;
    match fetcher.as_deref() {
        Some(f) => load_prices_with(cfg, Some(f)).await,
        None => load_prices_with(cfg, None).await,
    }
}

pub async fn load_prices_with(cfg: &Config, fetcher: Option<&dyn PriceSource>) -> Result<PriceTable> {
    let path = cache_path(&cfg.cache_dir, &cfg.ticker, cfg.start, cfg.end);

    if path.exists() {
        let table = read_price_csv(&path)?;
        let sha = file_sha256(&path)?;
        log_prices_loaded(&cfg.ticker, "cache", table.len(), Some(&sha));
        return Ok(table);
    }

    let fetcher = fetcher.ok_or_else(|| {
        RegimeError::Retrieval(format!(
            "cache requested but cache file {} not found; run once with a remote source to create it",
            path.display()
        ))
    })?;

    let table = fetcher
        .fetch_daily(&cfg.ticker, cfg.start, cfg.end)
        .await?
        .restrict(cfg.start, cfg.end);
    if table.is_empty() {
        return Err(RegimeError::Retrieval(format!(
            "{} returned no rows for {} in [{}, {})",
            fetcher.name(),
            cfg.ticker,
            cfg.start,
            cfg.end
        )));
    }

    write_price_csv(&path, &table)?;
    let sha = file_sha256(&path)?;
    log_prices_loaded(&cfg.ticker, fetcher.name(), table.len(), Some(&sha));
    Ok(table)
}
