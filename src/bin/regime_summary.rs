//! Per-horizon regime breakdown without rendering.
//!
//! Usage: DATA_SOURCE=cache cargo run --bin regime_summary

use anyhow::Result;

use regime_horizon_map::config::Config;
use regime_horizon_map::data::load_prices;
use regime_horizon_map::features::log_returns;
use regime_horizon_map::logging::init_run_dir;
use regime_horizon_map::panel::assemble_panel;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;
    init_run_dir();
    let prices = load_prices(&cfg).await?;
    let returns = log_returns(&prices)?;

    println!("Regime Summary: {} [{}, {})", cfg.ticker, cfg.start, cfg.end);
    println!("==============");
    println!("Prices: {} rows, returns: {}", prices.len(), returns.len());
    println!();
    println!(
        "{:<8} {:>8} {:>12} {:>9} {:>9} {:>11} {:>17} {:>11}",
        "Horizon", "Entries", "Vol cutoff", "Pos %", "Neg %", "Uncert %", "Dominant", "Changes"
    );
    println!("{}", "-".repeat(92));

    let mut summaries = Vec::new();
    for &h in &cfg.horizons {
        let (_, s) = assemble_panel(&returns, h)?;
        println!(
            "{:<8} {:>8} {:>12.6} {:>9.1} {:>9.1} {:>11.1} {:>17} {:>11}",
            s.label,
            s.entries,
            s.vol_threshold,
            s.positive_frac * 100.0,
            s.negative_frac * 100.0,
            s.uncertain_frac * 100.0,
            s.dominant.name(),
            s.transitions,
        );
        summaries.push(s);
    }

    println!();
    println!("{}", serde_json::to_string_pretty(&summaries)?);
    Ok(())
}
