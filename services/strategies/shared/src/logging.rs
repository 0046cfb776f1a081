//! Standardized logging for strategy services
//!
//! Provides subscriber setup and a consistent emoji set so every strategy's
//! log lines read the same way.

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Standard emoji set for strategy logging
pub struct LogEmoji;

impl LogEmoji {
    // Status indicators
    pub const SUCCESS: &'static str = "✅"; // Operation succeeded
    pub const ERROR: &'static str = "❌"; // Operation failed
    pub const WARNING: &'static str = "⚠️"; // Warning or caution
    pub const INFO: &'static str = "ℹ️"; // Information

    // Module-specific
    pub const SIGNAL: &'static str = "🎯"; // PVSRA / signal events
    pub const CHART: &'static str = "📊"; // Data/statistics/metrics
    pub const EXECUTE: &'static str = "⚡"; // Execution/action
    pub const MONEY: &'static str = "💰"; // Balance/sizing
    pub const NETWORK: &'static str = "🌐"; // Collaborator connectivity
    pub const CLOCK: &'static str = "⏱️"; // Timing/cooldown
    pub const STOP: &'static str = "🛑"; // Shutdown / stop loss
}

/// Install the global tracing subscriber for a strategy service
///
/// `RUST_LOG` overrides the default filter of `<service>=info,warn`.
pub fn init_strategy_logging(service_name: &str) -> Result<()> {
    let default_filter = format!("{}=info,warn", service_name);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}
