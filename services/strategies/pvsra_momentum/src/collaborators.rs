//! Contracts for the systems the engine talks to
//!
//! Exchange connectivity, account queries and order routing live outside the
//! decision core. The engine only sees these traits; `paper` provides an
//! in-memory implementation and tests script their own.

use crate::error::Result;
use crate::history::{Candle, PricePoint};
use crate::signals::Side;
use crate::sizing::SymbolPrecision;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// Open position as reported by the account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionDescriptor {
    pub symbol: String,
    pub side: PositionSide,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,

    /// Unrealised pnl as a fraction of entry value (0.01 = 1%)
    pub pnl_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAck {
    pub order_id: String,
    pub filled_price: Decimal,
}

/// Price and candle source; timestamps per symbol never go backwards
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn latest_price(&self, symbol: &str) -> Result<PricePoint>;

    /// Most recent `count` candles, oldest first; the last one may still be open
    async fn recent_candles(
        &self,
        symbol: &str,
        interval: Duration,
        count: usize,
    ) -> Result<Vec<Candle>>;
}

#[async_trait]
pub trait Account: Send + Sync {
    async fn balance(&self, asset: &str) -> Result<Decimal>;

    async fn open_positions(&self, symbol: &str) -> Result<Vec<PositionDescriptor>>;

    async fn symbol_precision(&self, symbol: &str) -> Result<SymbolPrecision>;
}

#[async_trait]
pub trait Execution: Send + Sync {
    async fn submit_order(&self, symbol: &str, side: Side, quantity: Decimal) -> Result<OrderAck>;
}
