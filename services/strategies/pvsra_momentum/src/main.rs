//! PVSRA Momentum Strategy Main Entry Point
//!
//! Runs the decision loop against paper collaborators. No exchange orders are
//! ever placed from this binary.

use anyhow::{Context, Result};
use clap::Parser;
use pvsra_momentum::{
    Clock, DecisionLoop, EngineConfig, PaperAccount, PaperMarket, SymbolPrecision, SystemClock,
    ValidatedConfig,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use strategy_shared::{
    init_strategy_logging, load_validated_config, resolve_config_path, LogEmoji, Strategy,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (overrides PVSRA_STRATEGY_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Starting paper balance in the quote asset
    #[arg(long, default_value = "1000")]
    balance: Decimal,

    /// Starting price of the simulated market
    #[arg(long, default_value = "4.50")]
    start_price: Decimal,

    /// Exchange quantity step for the simulated symbol
    #[arg(long, default_value = "0.1")]
    step_size: Decimal,

    /// Exchange minimum order value for the simulated symbol
    #[arg(long, default_value = "5")]
    min_notional: Decimal,

    /// Random walk seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize standardized logging
    init_strategy_logging("pvsra_momentum")?;

    let args = Args::parse();

    info!("Starting PVSRA Momentum Strategy (paper trading, no real orders)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config.clone())
        .context("Failed to load PVSRA strategy configuration")?;

    for warning in config.warnings() {
        warn!("{} Configuration warning: {:?}", LogEmoji::WARNING, warning);
    }
    info!(
        symbol = %config.symbol(),
        sizing = ?config.sizing().intent(),
        leverage = %config.sizing().leverage(),
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let market = Arc::new(PaperMarket::new(
        config.symbol(),
        args.start_price,
        config.candle_interval(),
        config.config().pvsra.candle_capacity,
        clock.clone(),
        args.seed,
    ));
    let account = Arc::new(PaperAccount::new(
        config.config().quote_asset.clone(),
        args.balance,
        config.sizing().leverage(),
        SymbolPrecision {
            step_size: args.step_size,
            min_notional: args.min_notional,
        },
        market.clone(),
    ));

    let mut strategy = DecisionLoop::new(config, market, account.clone(), account.clone()).with_clock(clock);
    let stats = strategy.stats_handle();
    let metrics = strategy.metrics_handle();

    let shutdown = CancellationToken::new();
    let strategy_shutdown = shutdown.clone();
    let strategy_handle = tokio::spawn(async move {
        if let Err(e) = strategy.run(strategy_shutdown).await {
            error!("Strategy failed: {:?}", e);
        }
    });

    info!("PVSRA Momentum Strategy running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("{} Shutting down PVSRA Momentum Strategy", LogEmoji::STOP);
    shutdown.cancel();
    strategy_handle
        .await
        .context("Strategy task panicked")?;

    let stats = stats.read().clone();
    let metrics = metrics.get_metrics();
    info!(
        ticks = metrics.ticks_processed,
        approved = stats.approved,
        rejected = stats.rejected,
        avg_confidence = stats.avg_approved_confidence,
        errors = metrics.errors,
        equity = %account.equity(),
        "{} Final paper trading summary",
        LogEmoji::CHART
    );

    Ok(())
}

fn load_config(explicit: Option<PathBuf>) -> Result<ValidatedConfig> {
    let config_path = explicit.unwrap_or_else(|| {
        resolve_config_path("PVSRA_STRATEGY_CONFIG_PATH", "configs/pvsra_momentum.toml")
    });

    load_validated_config(&config_path, EngineConfig::default())
}
