use anyhow::Result;

use regime_horizon_map::config::Config;
use regime_horizon_map::data::load_prices;
use regime_horizon_map::features::log_returns;
use regime_horizon_map::logging::{init_run_dir, log_run_start};
use regime_horizon_map::panel::build_panels;
use regime_horizon_map::render::{plot_regime_horizon_map, RenderOptions};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;
    init_run_dir();
    log_run_start(&cfg.ticker, cfg.data_source.as_str(), &cfg.horizons, &cfg.params_hash());

    let prices = load_prices(&cfg).await?;
    let returns = log_returns(&prices)?;
    let panels = build_panels(&returns, &cfg.horizons)?;

    let opts = RenderOptions::for_ticker(&cfg.ticker);
    plot_regime_horizon_map(&panels, Some(cfg.figure_path.as_path()), &opts)?;
    println!("[OK] Saved: {}", cfg.figure_path.display());
    Ok(())
}
