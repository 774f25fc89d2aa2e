//! Structured JSON-lines logging for report runs.
//!
//! Every record goes to stdout. Once `init_run_dir` has been called, records
//! are also appended to a per-run directory (`$LOG_DIR/<run_id>/events.jsonl`,
//! debug and trace records to `trace.jsonl`) next to a small manifest, so
//! repeated runs over the same cache can be compared record by record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Data,     // Cache reads, remote fetches
    Features, // Rolling windows
    Regime,   // Classification, per-panel summaries
    Render,   // Chart layout and output
    System,   // Startup, shutdown
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Data => "data",
            Domain::Features => "features",
            Domain::Regime => "regime",
            Domain::Render => "render",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    run_dir: Option<PathBuf>,
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_sink(path: PathBuf) -> Option<Mutex<BufWriter<File>>> {
    match File::create(&path) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", path.display(), err);
            None
        }
    }
}

impl RunContext {
    /// Context for `run_id`; file sinks and manifest only when `run_dir` is given.
    fn open(run_id: String, run_dir: Option<PathBuf>) -> Self {
        let Some(run_dir) = run_dir else {
            return RunContext { run_id, run_dir: None, events: None, trace: None };
        };
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }

        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        RunContext {
            events: open_sink(run_dir.join("events.jsonl")),
            trace: open_sink(run_dir.join("trace.jsonl")),
            run_id,
            run_dir: Some(run_dir),
        }
    }
}

fn run_id_from_env() -> String {
    std::env::var("RUN_ID").unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()))
}

/// Open the per-run files under `$LOG_DIR/<run_id>/` (default `out/runs`).
///
/// Binaries call this once at startup. Records emitted before it (or in
/// processes that never call it, such as tests) go to stdout only, and a
/// later call then returns `None`.
pub fn init_run_dir() -> Option<PathBuf> {
    let ctx = RUN_CONTEXT.get_or_init(|| {
        let run_id = run_id_from_env();
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let run_dir = PathBuf::from(base).join(&run_id);
        RunContext::open(run_id, Some(run_dir))
    });
    ctx.run_dir.clone()
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| RunContext::open(run_id_from_env(), None))
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(Ok(mut w)) = writer.as_ref().map(|m| m.lock()) {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, mut fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));

    let line = Value::Object(entry).to_string();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    println!("{}", line);
}

// =============================================================================
// Domain events
// =============================================================================

pub fn log_run_start(ticker: &str, source: &str, horizons: &[usize], params: &str) {
    log(
        Level::Info,
        Domain::System,
        "run_start",
        obj(&[
            ("ticker", v_str(ticker)),
            ("source", v_str(source)),
            ("horizons", json!(horizons)),
            ("params_hash", v_str(params)),
        ]),
    );
}

/// Price table ready; `cache_sha256` fingerprints the bytes the run consumed.
pub fn log_prices_loaded(ticker: &str, origin: &str, rows: usize, cache_sha256: Option<&str>) {
    log(
        Level::Info,
        Domain::Data,
        "prices_loaded",
        obj(&[
            ("ticker", v_str(ticker)),
            ("origin", v_str(origin)),
            ("rows", json!(rows)),
            ("cache_sha256", cache_sha256.map(v_str).unwrap_or(Value::Null)),
        ]),
    );
}

pub fn log_features(horizon: usize, inputs: usize, entries: usize) {
    log(
        Level::Debug,
        Domain::Features,
        "rolling_window",
        obj(&[
            ("horizon", json!(horizon)),
            ("inputs", json!(inputs)),
            ("entries", json!(entries)),
        ]),
    );
}

pub fn log_panel(label: &str, entries: usize, vol_threshold: f64, fractions: [f64; 3], dominant: &str) {
    log(
        Level::Info,
        Domain::Regime,
        "panel_ready",
        obj(&[
            ("label", v_str(label)),
            ("entries", json!(entries)),
            ("vol_threshold", v_num(vol_threshold)),
            ("positive_frac", v_num(fractions[0])),
            ("negative_frac", v_num(fractions[1])),
            ("uncertain_frac", v_num(fractions[2])),
            ("dominant", v_str(dominant)),
        ]),
    );
}

pub fn log_render(bands: usize, segments: usize, markers: usize, out_path: Option<&str>) {
    log(
        Level::Info,
        Domain::Render,
        "figure_composed",
        obj(&[
            ("bands", json!(bands)),
            ("segments", json!(segments)),
            ("markers", json!(markers)),
            ("out_path", out_path.map(v_str).unwrap_or(Value::Null)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Stable digest of a parameter string (SHA-256, first 16 hex chars).
pub fn params_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

/// Non-finite numbers become `null` so every line stays valid JSON.
pub fn v_num(n: f64) -> Value {
    if n.is_finite() {
        json!(n)
    } else {
        Value::Null
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
    }

    #[test]
    fn test_params_hash_deterministic() {
        assert_eq!(params_hash("SPY|5,20,60"), params_hash("SPY|5,20,60"));
        assert_eq!(params_hash("x").len(), 16);
    }

    #[test]
    fn test_params_hash_different_inputs() {
        assert_ne!(params_hash("input-a"), params_hash("input-b"));
    }

    #[test]
    fn test_obj_helper() {
        let m = obj(&[("key", v_str("value")), ("num", v_num(42.0))]);
        assert_eq!(m.get("key").unwrap(), "value");
        assert_eq!(m.get("num").unwrap(), 42.0);
    }

    #[test]
    fn test_nan_becomes_null() {
        assert_eq!(v_num(f64::NAN), Value::Null);
    }

    #[test]
    fn test_context_without_dir_writes_no_files() {
        let ctx = RunContext::open("r-stdout".to_string(), None);
        assert!(ctx.run_dir.is_none());
        assert!(ctx.events.is_none() && ctx.trace.is_none());
    }

    #[test]
    fn test_context_with_dir_writes_manifest_and_sinks() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("r-files");
        let ctx = RunContext::open("r-files".to_string(), Some(dir.clone()));
        write_line(&ctx.events, "{\"event\":\"x\"}");
        assert_eq!(ctx.run_dir.as_deref(), Some(dir.as_path()));
        assert!(dir.join("manifest.json").exists());
        assert!(dir.join("trace.jsonl").exists());
        let events = std::fs::read_to_string(dir.join("events.jsonl")).unwrap();
        assert_eq!(events.trim(), "{\"event\":\"x\"}");
    }

    #[test]
    fn test_seq_increments() {
        let s1 = next_seq();
        let s2 = next_seq();
        assert!(s2 > s1);
    }
}
