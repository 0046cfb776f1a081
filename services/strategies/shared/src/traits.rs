//! Strategy traits and interfaces

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Core strategy trait that all trading strategies must implement
#[async_trait]
pub trait Strategy: Send {
    /// Strategy name for identification
    fn name(&self) -> &str;

    /// Run the strategy until `shutdown` is cancelled
    async fn run(&mut self, shutdown: CancellationToken) -> Result<()>;

    /// Get current strategy metrics
    fn metrics(&self) -> StrategyMetrics;
}

/// Basic strategy metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyMetrics {
    pub ticks_processed: u64,
    pub decisions_approved: u64,
    pub decisions_rejected: u64,
    pub orders_submitted: u64,
    pub errors: u64,
}

/// Strategy configuration trait
///
/// Validation consumes the raw configuration and yields the checked form the
/// strategy actually runs with, so an unchecked configuration can never reach
/// the first tick.
pub trait StrategyConfig: Send + Sync + Clone {
    type Validated;

    /// Validate configuration
    fn validate(self) -> Result<Self::Validated>;
}
