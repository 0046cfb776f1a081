//! Decision loop behaviour against scripted collaborators

use async_trait::async_trait;
use parking_lot::Mutex;
use pvsra_momentum::{
    Account, Candle, Clock, Decision, DecisionLoop, EngineConfig, EngineError, Execution,
    ExitCheck, ManualClock, MarketData, OrderAck, PositionDescriptor, PositionSide, PricePoint,
    RecordingObserver, RejectReason, Result, Side, SymbolPrecision, TickRecord,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strategy_shared::Strategy;
use tokio_util::sync::CancellationToken;

const SEC: u64 = 1_000_000_000;
const CANDLE_NS: u64 = 300 * SEC;

/// First tick time; the scripted climax candle closes exactly here
const T0: u64 = 33 * CANDLE_NS;

const TICK: Duration = Duration::from_secs(2);

/// `quiet` flat candles then one high-volume candle; the last closes at `close_ns`
fn candles_closing_at(close_ns: u64, quiet: u64, last: [Decimal; 4]) -> Vec<Candle> {
    let total = quiet + 1;
    (0..total)
        .map(|i| {
            let open_time_ns = close_ns - (total - i) * CANDLE_NS;
            let ([open, high, low, close], volume) = if i < quiet {
                ([dec!(4.00), dec!(4.10), dec!(3.95), dec!(4.01)], dec!(400))
            } else {
                (last, dec!(1000))
            };
            Candle {
                open_time_ns,
                close_time_ns: open_time_ns + CANDLE_NS,
                open,
                high,
                low,
                close,
                volume,
                closed: true,
            }
        })
        .collect()
}

fn bull_climax() -> [Decimal; 4] {
    [dec!(4.00), dec!(4.05), dec!(3.99), dec!(4.04)]
}

fn bear_climax() -> [Decimal; 4] {
    [dec!(4.04), dec!(4.05), dec!(3.99), dec!(4.00)]
}

/// Prices move `step` per call, so momentum over five prices stays near 0.5%
struct ScriptedMarket {
    clock: Arc<dyn Clock>,
    calls: AtomicU64,
    start: Decimal,
    step: Decimal,
    candles: Vec<Candle>,
    candle_fetches: AtomicU64,
    /// Fetches before the newest candle is reported closed
    closes_after: AtomicU64,
    hang: AtomicBool,
}

impl ScriptedMarket {
    fn new(clock: Arc<dyn Clock>) -> Self {
        Self::scripted(clock, dec!(4.000), dec!(0.005), candles_closing_at(T0, 10, bull_climax()))
    }

    fn scripted(clock: Arc<dyn Clock>, start: Decimal, step: Decimal, candles: Vec<Candle>) -> Self {
        Self {
            clock,
            calls: AtomicU64::new(0),
            start,
            step,
            candles,
            candle_fetches: AtomicU64::new(0),
            closes_after: AtomicU64::new(0),
            hang: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl MarketData for ScriptedMarket {
    async fn latest_price(&self, _symbol: &str) -> Result<PricePoint> {
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PricePoint {
            timestamp_ns: self.clock.now_ns(),
            price: self.start + self.step * Decimal::from(n),
        })
    }

    async fn recent_candles(&self, _symbol: &str, _interval: Duration, count: usize) -> Result<Vec<Candle>> {
        let fetch = self.candle_fetches.fetch_add(1, Ordering::SeqCst);
        let skip = self.candles.len().saturating_sub(count);
        let mut candles = self.candles[skip..].to_vec();
        if fetch < self.closes_after.load(Ordering::SeqCst) {
            if let Some(newest) = candles.last_mut() {
                newest.closed = false;
            }
        }
        Ok(candles)
    }
}

struct ScriptedAccount {
    fail_balance: AtomicBool,
    positions: Mutex<Vec<PositionDescriptor>>,
}

impl ScriptedAccount {
    fn new() -> Self {
        Self {
            fail_balance: AtomicBool::new(false),
            positions: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Account for ScriptedAccount {
    async fn balance(&self, _asset: &str) -> Result<Decimal> {
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(EngineError::account("balance endpoint unavailable"));
        }
        Ok(dec!(1000))
    }

    async fn open_positions(&self, _symbol: &str) -> Result<Vec<PositionDescriptor>> {
        Ok(self.positions.lock().clone())
    }

    async fn symbol_precision(&self, _symbol: &str) -> Result<SymbolPrecision> {
        Ok(SymbolPrecision {
            step_size: dec!(0.1),
            min_notional: dec!(5),
        })
    }
}

#[derive(Default)]
struct ScriptedExecution {
    /// Queued outcomes; an empty queue acks
    failures: Mutex<VecDeque<EngineError>>,
    delay: Mutex<Option<Duration>>,
    orders: Mutex<Vec<(Side, Decimal)>>,
}

#[async_trait]
impl Execution for ScriptedExecution {
    async fn submit_order(&self, _symbol: &str, side: Side, quantity: Decimal) -> Result<OrderAck> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        let mut orders = self.orders.lock();
        orders.push((side, quantity));
        Ok(OrderAck {
            order_id: format!("order-{}", orders.len()),
            filled_price: dec!(4.02),
        })
    }
}

struct Harness {
    engine: DecisionLoop,
    clock: Arc<ManualClock>,
    market: Arc<ScriptedMarket>,
    account: Arc<ScriptedAccount>,
    execution: Arc<ScriptedExecution>,
    observer: Arc<RecordingObserver>,
    shutdown: CancellationToken,
}

impl Harness {
    fn new(config: EngineConfig) -> Self {
        Self::with_market(config, |clock| ScriptedMarket::new(clock))
    }

    fn with_market(config: EngineConfig, market: impl FnOnce(Arc<dyn Clock>) -> ScriptedMarket) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let market = Arc::new(market(clock.clone() as Arc<dyn Clock>));
        let account = Arc::new(ScriptedAccount::new());
        let execution = Arc::new(ScriptedExecution::default());
        let observer = Arc::new(RecordingObserver::new());

        let engine = DecisionLoop::new(
            config.into_validated().unwrap(),
            market.clone(),
            account.clone(),
            execution.clone(),
        )
        .with_observer(observer.clone())
        .with_clock(clock.clone());

        Self {
            engine,
            clock,
            market,
            account,
            execution,
            observer,
            shutdown: CancellationToken::new(),
        }
    }

    fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    async fn tick(&mut self) -> TickRecord {
        let record = self.engine.tick(&self.shutdown).await.unwrap();
        self.clock.advance(TICK);
        record
    }

    /// Four ticks: the price history fills while every decision is low_confidence
    async fn warm_up(&mut self) {
        for _ in 0..4 {
            let record = self.tick().await;
            assert_eq!(record.reason, Some(RejectReason::LowConfidence));
        }
    }
}

#[tokio::test]
async fn test_fifth_tick_submits_order() {
    let mut h = Harness::with_defaults();
    h.warm_up().await;

    let record = h.tick().await;
    assert_eq!(record.decision, Decision::Approved);
    assert_eq!(record.reason, None);
    assert_eq!(record.timestamp_ns, T0 + 8 * SEC);
    assert_eq!(record.order.as_ref().unwrap().order_id, "order-1");
    assert_eq!(record.sizing_result.unwrap().quantity, dec!(12.4));
    assert!(record.combined_signal.unwrap().confidence >= 0.60);

    // the climax candle raised one alert, recorded on the first tick
    assert_eq!(h.engine.alerts().len(), 1);
    assert_eq!(h.execution.orders.lock().as_slice(), &[(Side::Buy, dec!(12.4))]);
    assert_eq!(h.engine.gate_state().last_trade_ns(), Some(T0 + 8 * SEC));
    assert!(h.engine.gate_state().has_open_position("SUIUSDT"));

    let stats = h.engine.stats();
    assert_eq!(stats.approved, 1);
    assert_eq!(stats.rejections_for(RejectReason::LowConfidence), 4);
    assert_eq!(h.observer.len(), 5);

    let metrics = h.engine.metrics();
    assert_eq!(metrics.ticks_processed, 5);
    assert_eq!(metrics.orders_submitted, 1);
}

#[tokio::test]
async fn test_cooldown_blocks_next_ticks() {
    let mut h = Harness::with_defaults();
    h.warm_up().await;
    assert_eq!(h.tick().await.decision, Decision::Approved);

    // 2s..28s after the approval: all inside the 30s cooldown
    for _ in 0..14 {
        assert_eq!(h.tick().await.reason, Some(RejectReason::Cooldown));
    }

    // the account never reported the position, so only the cooldown held it back
    let record = h.tick().await;
    assert_eq!(record.timestamp_ns, T0 + 38 * SEC);
    assert_eq!(record.decision, Decision::Approved);
    assert_eq!(h.execution.orders.lock().len(), 2);
}

#[tokio::test]
async fn test_execution_failure_rolls_back_cooldown() {
    let mut h = Harness::with_defaults();
    h.execution
        .failures
        .lock()
        .push_back(EngineError::execution("exchange rejected order"));
    h.warm_up().await;

    let failed = h.tick().await;
    assert_eq!(failed.decision, Decision::Rejected);
    assert_eq!(failed.reason, Some(RejectReason::ExecutionFailed));
    assert!(failed.order.is_none());
    assert_eq!(h.engine.gate_state().last_trade_ns(), None);
    assert!(!h.engine.gate_state().has_open_position("SUIUSDT"));

    // the retry two seconds later is not held back by a cooldown
    let retried = h.tick().await;
    assert_eq!(retried.decision, Decision::Approved);
    assert_eq!(h.engine.stats().rejections_for(RejectReason::ExecutionFailed), 1);
    assert_eq!(h.engine.metrics().errors, 1);
}

#[tokio::test(start_paused = true)]
async fn test_execution_timeout_rolls_back_cooldown() {
    let mut h = Harness::with_defaults();
    h.warm_up().await;
    *h.execution.delay.lock() = Some(Duration::from_secs(10));

    let timed_out = h.tick().await;
    assert_eq!(timed_out.decision, Decision::Rejected);
    assert_eq!(timed_out.reason, Some(RejectReason::ExecutionFailed));
    assert!(timed_out.order.is_none());
    assert_eq!(h.engine.gate_state().last_trade_ns(), None);
    assert!(!h.engine.gate_state().has_open_position("SUIUSDT"));
    assert!(h.execution.orders.lock().is_empty());

    *h.execution.delay.lock() = None;
    assert_eq!(h.tick().await.decision, Decision::Approved);
    assert_eq!(h.execution.orders.lock().len(), 1);
}

#[tokio::test]
async fn test_bear_climax_with_falling_prices_sells() {
    let mut h = Harness::with_market(EngineConfig::default(), |clock| {
        ScriptedMarket::scripted(clock, dec!(4.020), dec!(-0.005), candles_closing_at(T0, 10, bear_climax()))
    });
    h.warm_up().await;

    // 10 * 5 / 4.000 = 12.5
    let record = h.tick().await;
    assert_eq!(record.decision, Decision::Approved);
    assert_eq!(record.sizing_result.unwrap().quantity, dec!(12.5));
    assert_eq!(h.execution.orders.lock().as_slice(), &[(Side::Sell, dec!(12.5))]);
    assert_eq!(h.engine.stats().sell_approvals, 1);
    assert_eq!(h.engine.stats().buy_approvals, 0);
}

#[tokio::test]
async fn test_candle_closed_late_is_still_analysed() {
    // the window is full before the climax, so only the boundary drives refetching
    let mut h = Harness::with_market(EngineConfig::default(), |clock| {
        let market = ScriptedMarket::scripted(clock, dec!(4.000), dec!(0.005), candles_closing_at(T0, 11, bull_climax()));
        market.closes_after.store(2, Ordering::SeqCst);
        market
    });
    h.warm_up().await;
    assert_eq!(h.market.candle_fetches.load(Ordering::SeqCst), 3);
    assert_eq!(h.engine.candles().latest_closed().unwrap().close_time_ns, T0);
    assert_eq!(h.engine.alerts().len(), 1);

    let record = h.tick().await;
    assert_eq!(record.decision, Decision::Approved);

    // caught up: no more fetches until the next boundary
    h.tick().await;
    assert_eq!(h.market.candle_fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_market_timeout_is_data_unavailable() {
    let mut h = Harness::with_defaults();
    h.market.hang.store(true, Ordering::SeqCst);

    let record = h.tick().await;
    assert_eq!(record.decision, Decision::Rejected);
    assert_eq!(record.reason, Some(RejectReason::DataUnavailable));
    assert!(record.combined_signal.is_none());
    assert_eq!(h.engine.metrics().errors, 1);

    // transient: the loop carries on once data flows again
    h.market.hang.store(false, Ordering::SeqCst);
    let record = h.tick().await;
    assert_eq!(record.reason, Some(RejectReason::LowConfidence));
    assert_eq!(h.engine.prices().len(), 1);
}

#[tokio::test]
async fn test_account_failure_is_data_unavailable() {
    let mut h = Harness::with_defaults();
    h.warm_up().await;
    h.account.fail_balance.store(true, Ordering::SeqCst);

    let record = h.tick().await;
    assert_eq!(record.reason, Some(RejectReason::DataUnavailable));
    assert_eq!(h.engine.gate_state().last_trade_ns(), None);
    assert!(h.execution.orders.lock().is_empty());
}

#[tokio::test]
async fn test_open_position_blocks_and_reports_exit() {
    let mut h = Harness::with_defaults();
    h.warm_up().await;
    h.account.positions.lock().push(PositionDescriptor {
        symbol: "SUIUSDT".to_string(),
        side: PositionSide::Long,
        size: dec!(12.4),
        entry_price: dec!(4.00),
        mark_price: dec!(4.012),
        unrealized_pnl: dec!(0.1488),
        pnl_fraction: 0.003,
    });

    let record = h.tick().await;
    assert_eq!(record.reason, Some(RejectReason::PositionExists));
    assert_eq!(record.exit.unwrap().check, ExitCheck::TakeProfit);

    h.account.positions.lock().clear();
    assert_eq!(h.tick().await.decision, Decision::Approved);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_abandons_pending_fetch() {
    let mut h = Harness::with_defaults();
    h.market.hang.store(true, Ordering::SeqCst);

    let token = h.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    assert!(h.engine.tick(&h.shutdown).await.is_none());
    assert!(h.observer.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_does_not_interrupt_submission() {
    let mut h = Harness::with_defaults();
    h.warm_up().await;
    *h.execution.delay.lock() = Some(Duration::from_millis(1_500));

    let token = h.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
    });

    let record = h.engine.tick(&h.shutdown).await.unwrap();
    assert!(h.shutdown.is_cancelled());
    assert_eq!(record.decision, Decision::Approved);
    assert!(h.engine.gate_state().has_open_position("SUIUSDT"));
}

/// Wall clock that follows tokio's (pausable) time
struct TokioClock {
    base_ns: u64,
    start: tokio::time::Instant,
}

impl Clock for TokioClock {
    fn now_ns(&self) -> u64 {
        self.base_ns + self.start.elapsed().as_nanos() as u64
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_ticks_on_cadence_until_cancelled() {
    let clock: Arc<dyn Clock> = Arc::new(TokioClock {
        base_ns: T0,
        start: tokio::time::Instant::now(),
    });
    let market = Arc::new(ScriptedMarket::new(clock.clone()));
    let account = Arc::new(ScriptedAccount::new());
    let execution = Arc::new(ScriptedExecution::default());
    let observer = Arc::new(RecordingObserver::new());

    let mut engine = DecisionLoop::new(
        EngineConfig::default().into_validated().unwrap(),
        market,
        account,
        execution.clone(),
    )
    .with_observer(observer.clone())
    .with_clock(clock);
    let metrics = engine.metrics_handle();

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { engine.run(shutdown).await }
    });

    tokio::time::sleep(Duration::from_secs(9)).await;
    shutdown.cancel();
    handle.await.unwrap().unwrap();

    let records = observer.records();
    assert!((4..=5).contains(&records.len()), "got {} ticks", records.len());
    assert_eq!(metrics.get_metrics().ticks_processed, records.len() as u64);
    for pair in records.windows(2) {
        assert_eq!(pair[1].timestamp_ns - pair[0].timestamp_ns, 2 * SEC);
    }
}

#[tokio::test]
async fn test_percentage_sizing_through_loop() {
    let mut config = EngineConfig::default();
    config.sizing.mode = pvsra_momentum::SizingMode::Percentage;
    config.sizing.percentage = Some(dec!(5));
    config.sizing.leverage = 20;

    let mut h = Harness::new(config);
    h.warm_up().await;

    // 1000 * 5% * 20 / 4.02 = 248.75.. → 248.7
    let record = h.tick().await;
    assert_eq!(record.decision, Decision::Approved);
    assert_eq!(record.sizing_result.unwrap().quantity, dec!(248.7));
}
