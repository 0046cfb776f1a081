//! Paper trading collaborators
//!
//! A seeded random-walk market and an in-memory account that fills market
//! orders at the walk's last price. No orders ever leave the process.

use crate::clock::Clock;
use crate::collaborators::{Account, Execution, MarketData, OrderAck, PositionDescriptor, PositionSide};
use crate::error::{EngineError, Result};
use crate::history::{Candle, PricePoint};
use crate::signals::Side;
use crate::sizing::SymbolPrecision;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const MAX_CANDLES: usize = 500;
const PRICE_DP: u32 = 4;

/// Random-walk price feed that builds its own candles
pub struct PaperMarket {
    symbol: String,
    interval_ns: u64,

    /// Largest fractional move per step
    volatility: f64,
    clock: Arc<dyn Clock>,
    state: Mutex<WalkState>,
}

struct WalkState {
    rng: StdRng,
    price: Decimal,
    last_timestamp_ns: u64,

    /// Oldest first; the last candle is the running one
    candles: VecDeque<Candle>,
}

impl WalkState {
    fn step(&mut self, volatility: f64) -> (Decimal, Decimal) {
        let change = self.rng.gen_range(-volatility..=volatility);
        let factor = Decimal::from_f64(1.0 + change).unwrap_or(Decimal::ONE);
        self.price = (self.price * factor).round_dp(PRICE_DP).max(Decimal::new(1, PRICE_DP));

        // Occasional volume burst so the PVSRA classes all show up
        let base: u32 = self.rng.gen_range(50..500);
        let volume = if self.rng.gen_ratio(1, 25) {
            Decimal::from(base * 5)
        } else {
            Decimal::from(base)
        };
        (self.price, volume)
    }

    /// Close candles whose period has ended and open one for `now_ns`
    fn roll(&mut self, now_ns: u64, interval_ns: u64) {
        let bucket = now_ns - now_ns % interval_ns;
        if let Some(last) = self.candles.back_mut() {
            if last.open_time_ns >= bucket {
                return;
            }
            last.closed = true;
        }

        let open = self.price;
        self.candles.push_back(Candle {
            open_time_ns: bucket,
            close_time_ns: bucket + interval_ns,
            open,
            high: open,
            low: open,
            close: open,
            volume: Decimal::ZERO,
            closed: false,
        });
        while self.candles.len() > MAX_CANDLES {
            self.candles.pop_front();
        }
    }
}

impl PaperMarket {
    /// Start at `start_price` with `warmup` closed candles already behind the clock
    pub fn new(
        symbol: impl Into<String>,
        start_price: Decimal,
        interval: Duration,
        warmup: usize,
        clock: Arc<dyn Clock>,
        seed: u64,
    ) -> Self {
        let interval_ns = (interval.as_nanos() as u64).max(1);
        let volatility = 0.002;
        let now_ns = clock.now_ns();
        let mut state = WalkState {
            rng: StdRng::seed_from_u64(seed),
            price: start_price,
            last_timestamp_ns: now_ns,
            candles: VecDeque::with_capacity(MAX_CANDLES),
        };

        let bucket = now_ns - now_ns % interval_ns;
        for i in (1..=warmup as u64).rev() {
            let Some(open_time_ns) = bucket.checked_sub(i * interval_ns) else {
                continue;
            };
            let open = state.price;
            let mut candle = Candle {
                open_time_ns,
                close_time_ns: open_time_ns + interval_ns,
                open,
                high: open,
                low: open,
                close: open,
                volume: Decimal::ZERO,
                closed: true,
            };
            for _ in 0..10 {
                let (price, volume) = state.step(volatility);
                candle.high = candle.high.max(price);
                candle.low = candle.low.min(price);
                candle.close = price;
                candle.volume += volume;
            }
            state.candles.push_back(candle);
        }
        state.roll(now_ns, interval_ns);

        Self {
            symbol: symbol.into(),
            interval_ns,
            volatility,
            clock,
            state: Mutex::new(state),
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility.abs();
        self
    }

    pub fn last_price(&self) -> Decimal {
        self.state.lock().price
    }

    fn check_symbol(&self, symbol: &str) -> Result<()> {
        if symbol == self.symbol {
            Ok(())
        } else {
            Err(EngineError::market_data(format!(
                "paper market only quotes {}, not {}",
                self.symbol, symbol
            )))
        }
    }
}

#[async_trait]
impl MarketData for PaperMarket {
    async fn latest_price(&self, symbol: &str) -> Result<PricePoint> {
        self.check_symbol(symbol)?;
        let mut state = self.state.lock();
        let now_ns = self.clock.now_ns().max(state.last_timestamp_ns);
        state.roll(now_ns, self.interval_ns);

        let (price, volume) = state.step(self.volatility);
        if let Some(candle) = state.candles.back_mut() {
            candle.high = candle.high.max(price);
            candle.low = candle.low.min(price);
            candle.close = price;
            candle.volume += volume;
        }
        state.last_timestamp_ns = now_ns;

        Ok(PricePoint {
            timestamp_ns: now_ns,
            price,
        })
    }

    async fn recent_candles(&self, symbol: &str, interval: Duration, count: usize) -> Result<Vec<Candle>> {
        self.check_symbol(symbol)?;
        if interval.as_nanos() as u64 != self.interval_ns {
            return Err(EngineError::market_data(format!(
                "paper market builds {:?} candles, {:?} requested",
                Duration::from_nanos(self.interval_ns),
                interval
            )));
        }

        let mut state = self.state.lock();
        let now_ns = self.clock.now_ns().max(state.last_timestamp_ns);
        state.roll(now_ns, self.interval_ns);

        let skip = state.candles.len().saturating_sub(count);
        Ok(state.candles.iter().skip(skip).copied().collect())
    }
}

#[derive(Debug, Clone, Copy)]
struct PaperPosition {
    side: PositionSide,
    size: Decimal,
    entry_price: Decimal,
}

struct AccountState {
    balance: Decimal,
    positions: HashMap<String, PaperPosition>,
    next_order_id: u64,
}

/// In-memory margin account backed by a [`PaperMarket`]
pub struct PaperAccount {
    quote_asset: String,
    leverage: Decimal,
    precision: SymbolPrecision,
    market: Arc<PaperMarket>,
    state: Mutex<AccountState>,
}

impl PaperAccount {
    pub fn new(
        quote_asset: impl Into<String>,
        starting_balance: Decimal,
        leverage: Decimal,
        precision: SymbolPrecision,
        market: Arc<PaperMarket>,
    ) -> Self {
        Self {
            quote_asset: quote_asset.into(),
            leverage: leverage.max(Decimal::ONE),
            precision,
            market,
            state: Mutex::new(AccountState {
                balance: starting_balance,
                positions: HashMap::new(),
                next_order_id: 1,
            }),
        }
    }

    /// Balance not tied up as margin
    fn free_balance(&self, state: &AccountState) -> Decimal {
        let used: Decimal = state
            .positions
            .values()
            .map(|p| p.size * p.entry_price / self.leverage)
            .sum();
        (state.balance - used).max(Decimal::ZERO)
    }

    /// Realised balance including closed-trade pnl
    pub fn equity(&self) -> Decimal {
        self.state.lock().balance
    }
}

#[async_trait]
impl Account for PaperAccount {
    async fn balance(&self, asset: &str) -> Result<Decimal> {
        if asset != self.quote_asset {
            return Err(EngineError::account(format!("no {} balance in paper account", asset)));
        }
        let state = self.state.lock();
        Ok(self.free_balance(&state))
    }

    async fn open_positions(&self, symbol: &str) -> Result<Vec<PositionDescriptor>> {
        let mark_price = self.market.last_price();
        let state = self.state.lock();

        Ok(state
            .positions
            .get(symbol)
            .map(|p| {
                let per_unit = match p.side {
                    PositionSide::Long => mark_price - p.entry_price,
                    PositionSide::Short => p.entry_price - mark_price,
                };
                let unrealized_pnl = per_unit * p.size;
                let entry_value = p.entry_price * p.size;
                let pnl_fraction = if entry_value > Decimal::ZERO {
                    (unrealized_pnl / entry_value).to_f64().unwrap_or(0.0)
                } else {
                    0.0
                };
                PositionDescriptor {
                    symbol: symbol.to_string(),
                    side: p.side,
                    size: p.size,
                    entry_price: p.entry_price,
                    mark_price,
                    unrealized_pnl,
                    pnl_fraction,
                }
            })
            .into_iter()
            .collect())
    }

    async fn symbol_precision(&self, _symbol: &str) -> Result<SymbolPrecision> {
        Ok(self.precision)
    }
}

#[async_trait]
impl Execution for PaperAccount {
    async fn submit_order(&self, symbol: &str, side: Side, quantity: Decimal) -> Result<OrderAck> {
        if quantity <= Decimal::ZERO {
            return Err(EngineError::execution("quantity must be positive"));
        }
        let price = self.market.last_price();
        let mut state = self.state.lock();

        let order_side = match side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        };
        let existing = state.positions.get(symbol).copied();

        match existing {
            Some(position) if position.side == order_side => {
                let margin = quantity * price / self.leverage;
                if margin > self.free_balance(&state) {
                    return Err(EngineError::execution("insufficient margin"));
                }
                let size = position.size + quantity;
                let entry_price =
                    ((position.entry_price * position.size + price * quantity) / size).round_dp(PRICE_DP);
                state.positions.insert(
                    symbol.to_string(),
                    PaperPosition {
                        side: order_side,
                        size,
                        entry_price,
                    },
                );
            }
            Some(position) => {
                // Opposite side: reduce, close, or flip
                let closed = quantity.min(position.size);
                let per_unit = match position.side {
                    PositionSide::Long => price - position.entry_price,
                    PositionSide::Short => position.entry_price - price,
                };
                state.balance += per_unit * closed;

                let remaining = position.size - closed;
                let flipped = quantity - closed;
                if remaining > Decimal::ZERO {
                    state.positions.insert(
                        symbol.to_string(),
                        PaperPosition {
                            size: remaining,
                            ..position
                        },
                    );
                } else if flipped > Decimal::ZERO {
                    state.positions.insert(
                        symbol.to_string(),
                        PaperPosition {
                            side: order_side,
                            size: flipped,
                            entry_price: price,
                        },
                    );
                } else {
                    state.positions.remove(symbol);
                }
            }
            None => {
                let margin = quantity * price / self.leverage;
                if margin > self.free_balance(&state) {
                    return Err(EngineError::execution("insufficient margin"));
                }
                state.positions.insert(
                    symbol.to_string(),
                    PaperPosition {
                        side: order_side,
                        size: quantity,
                        entry_price: price,
                    },
                );
            }
        }

        let order_id = format!("paper-{}", state.next_order_id);
        state.next_order_id += 1;
        info!(%symbol, ?side, %quantity, %price, %order_id, "Paper fill (simulation, no exchange order)");
        debug!(balance = %state.balance, "Paper account after fill");

        Ok(OrderAck {
            order_id,
            filled_price: price,
        })
    }
}
