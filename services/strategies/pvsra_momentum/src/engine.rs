//! Decision loop
//!
//! [`DecisionPipeline`] is the synchronous tick body: given the buffers, an
//! account snapshot and the current time it runs momentum → PVSRA → blend →
//! gate → sizing and says whether to submit. It performs no I/O, so tests
//! drive it with synthetic buffers.
//!
//! [`DecisionLoop`] owns one instrument's buffers, gate state and alert
//! history, pulls data from the collaborators with bounded waits, and runs
//! the pipeline on a fixed cadence until cancelled.

use crate::alerts::AlertHistory;
use crate::clock::{Clock, SystemClock};
use crate::collaborators::{Account, Execution, MarketData};
use crate::config::ValidatedConfig;
use crate::error::{EngineError, Result};
use crate::exits::ExitMonitor;
use crate::gate::{AccountSnapshot, Approval, GateDecision, GateState, RejectReason, TradeGate};
use crate::history::{CandleWindow, PriceHistory};
use crate::momentum::MomentumAnalyzer;
use crate::observer::{Decision, Observer, TickRecord, TracingObserver};
use crate::pvsra::{PatternScan, PvsraAnalyzer, PvsraStatistics};
use crate::signals::{CombinedSignal, SignalBlender};
use crate::sizing::{PositionSizer, SizingResult};
use crate::stats::DecisionStats;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use strategy_shared::{LogEmoji, MetricsCollector, Strategy, StrategyMetrics};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Gate approved and sizing produced a valid quantity
    Submit {
        approval: Approval,
        sizing: SizingResult,
    },
    Reject(RejectReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub signal: CombinedSignal,
    pub sizing: Option<SizingResult>,
    pub verdict: Verdict,
}

/// The analysers, gate and sizer for one instrument
#[derive(Debug, Clone)]
pub struct DecisionPipeline {
    momentum: MomentumAnalyzer,
    pvsra: PvsraAnalyzer,
    blender: SignalBlender,
    gate: TradeGate,
    sizer: PositionSizer,
    max_candle_age_ns: u64,
}

impl DecisionPipeline {
    pub fn new(config: &ValidatedConfig) -> Self {
        let c = config.config();
        Self {
            momentum: MomentumAnalyzer::new(&c.momentum),
            pvsra: PvsraAnalyzer::new(&c.pvsra),
            blender: SignalBlender::new(&c.blend),
            gate: TradeGate::new(&c.gate, *config.sizing()),
            sizer: PositionSizer::new(*config.sizing()),
            max_candle_age_ns: c.pvsra.max_candle_age_secs.saturating_mul(NANOS_PER_SEC),
        }
    }

    pub fn gate(&self) -> &TradeGate {
        &self.gate
    }

    pub fn pvsra(&self) -> &PvsraAnalyzer {
        &self.pvsra
    }

    /// Run one decision over the given buffers
    ///
    /// On `Submit` the cooldown has already been written to `state`; the
    /// caller must [`TradeGate::confirm`] or [`TradeGate::rollback`] once the
    /// order outcome is known. Sizing rejections are rolled back here.
    pub fn evaluate(
        &self,
        state: &mut GateState,
        symbol: &str,
        prices: &PriceHistory,
        candles: &CandleWindow,
        snapshot: &AccountSnapshot,
        now_ns: u64,
    ) -> Evaluation {
        let momentum = self.momentum.analyze(prices);
        let pvsra = self
            .pvsra
            .analyze(candles)
            .expire_if_stale(now_ns, self.max_candle_age_ns);
        let signal = self.blender.blend(momentum, pvsra);

        let approval = match self.gate.evaluate(state, symbol, &signal, snapshot, now_ns) {
            GateDecision::Approved(approval) => approval,
            GateDecision::Rejected(reason) => {
                return Evaluation {
                    signal,
                    sizing: None,
                    verdict: Verdict::Reject(reason),
                }
            }
        };

        let Some(price) = prices.latest().map(|p| p.price) else {
            self.gate.rollback(state, &approval);
            return Evaluation {
                signal,
                sizing: None,
                verdict: Verdict::Reject(RejectReason::DataUnavailable),
            };
        };

        let sizing = self.sizer.size(snapshot.balance, price, snapshot.precision);
        let verdict = match sizing.rejection_reason {
            Some(rejection) => {
                self.gate.rollback(state, &approval);
                Verdict::Reject(RejectReason::Sizing(rejection))
            }
            None => Verdict::Submit { approval, sizing },
        };

        Evaluation {
            signal,
            sizing: Some(sizing),
            verdict,
        }
    }
}

/// Cadenced engine for one instrument
pub struct DecisionLoop {
    config: ValidatedConfig,
    pipeline: DecisionPipeline,
    exits: ExitMonitor,

    market: Arc<dyn MarketData>,
    account: Arc<dyn Account>,
    execution: Arc<dyn Execution>,
    observer: Arc<dyn Observer>,
    clock: Arc<dyn Clock>,

    prices: PriceHistory,
    candles: CandleWindow,
    gate_state: GateState,
    alerts: AlertHistory,

    /// Candle period index of the last successful candle fetch
    last_candle_bucket: Option<u64>,

    stats: Arc<RwLock<DecisionStats>>,
    metrics: Arc<MetricsCollector>,
}

impl DecisionLoop {
    pub fn new(
        config: ValidatedConfig,
        market: Arc<dyn MarketData>,
        account: Arc<dyn Account>,
        execution: Arc<dyn Execution>,
    ) -> Self {
        let c = config.config();
        Self {
            pipeline: DecisionPipeline::new(&config),
            exits: ExitMonitor::new(&c.exits),
            prices: PriceHistory::new(c.price_history_capacity),
            candles: CandleWindow::new(c.pvsra.candle_capacity),
            alerts: AlertHistory::new(c.pvsra.alert_history),
            gate_state: GateState::new(),
            last_candle_bucket: None,
            market,
            account,
            execution,
            observer: Arc::new(TracingObserver),
            clock: Arc::new(SystemClock),
            stats: Arc::new(RwLock::new(DecisionStats::default())),
            metrics: Arc::new(MetricsCollector::new()),
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn symbol(&self) -> &str {
        self.config.symbol()
    }

    pub fn gate_state(&self) -> &GateState {
        &self.gate_state
    }

    pub fn prices(&self) -> &PriceHistory {
        &self.prices
    }

    pub fn candles(&self) -> &CandleWindow {
        &self.candles
    }

    pub fn alerts(&self) -> &AlertHistory {
        &self.alerts
    }

    pub fn stats(&self) -> DecisionStats {
        self.stats.read().clone()
    }

    /// Shared handle for reading stats while the loop runs elsewhere
    pub fn stats_handle(&self) -> Arc<RwLock<DecisionStats>> {
        Arc::clone(&self.stats)
    }

    pub fn metrics_handle(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    pub fn pvsra_statistics(&self) -> PvsraStatistics {
        self.pipeline.pvsra().statistics(&self.candles)
    }

    pub fn pattern_scan(&self) -> PatternScan {
        self.pipeline
            .pvsra()
            .scan_patterns(&self.candles, self.config.config().pvsra.pattern_window)
    }

    /// Tick on the configured cadence until `shutdown` fires
    ///
    /// The interval absorbs processing time, so the period does not drift by
    /// the cost of each tick. A tick that has reached order submission always
    /// finishes before shutdown is observed.
    pub async fn run_until_cancelled(&mut self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            symbol = %self.symbol(),
            tick_ms = self.config.tick_interval().as_millis() as u64,
            "{} Decision loop started",
            LogEmoji::SUCCESS
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if self.tick(&shutdown).await.is_none() {
                        break;
                    }
                }
            }
        }

        let stats = self.stats();
        let pvsra = self.pvsra_statistics();
        info!(
            symbol = %self.symbol(),
            ticks = stats.total_ticks,
            approved = stats.approved,
            rejected = stats.rejected,
            climax_pct = pvsra.climax_percentage,
            rising_pct = pvsra.rising_percentage,
            alerts = self.alerts.len(),
            "{} Decision loop stopped",
            LogEmoji::STOP
        );
        Ok(())
    }

    /// Run one tick and report it to the observer
    ///
    /// Returns `None` only when shutdown interrupted a collaborator call before
    /// any decision was taken; such a tick is abandoned without a record.
    pub async fn tick(&mut self, shutdown: &CancellationToken) -> Option<TickRecord> {
        let now_ns = self.clock.now_ns();

        let record = match self.process(now_ns, shutdown).await {
            Ok(record) => record,
            Err(EngineError::Cancelled) => {
                debug!(symbol = %self.symbol(), "Tick abandoned for shutdown");
                return None;
            }
            Err(e) => {
                warn!(
                    symbol = %self.symbol(),
                    error = %e,
                    "{} Collaborator unavailable, skipping decision",
                    LogEmoji::NETWORK
                );
                self.metrics.increment_errors();
                TickRecord::rejected(now_ns, self.config.symbol(), RejectReason::DataUnavailable)
            }
        };

        self.metrics.increment_ticks();
        match record.decision {
            Decision::Approved => {
                self.metrics.increment_approved();
                self.metrics.increment_orders();
                if let Some(signal) = &record.combined_signal {
                    self.stats.write().record_approval(signal, record.timestamp_ns);
                }
            }
            Decision::Rejected => {
                self.metrics.increment_rejected();
                if let Some(reason) = record.reason {
                    self.stats.write().record_rejection(reason);
                }
            }
        }

        self.observer.record(&record);
        Some(record)
    }

    async fn process(&mut self, now_ns: u64, shutdown: &CancellationToken) -> Result<TickRecord> {
        let symbol = self.config.symbol().to_string();
        let limit = self.config.collaborator_timeout();

        let point = bounded("latest_price", limit, shutdown, self.market.latest_price(&symbol)).await?;
        if !self.prices.push(point) {
            warn!(%symbol, timestamp_ns = point.timestamp_ns, "Out-of-order price ignored");
        }

        self.refresh_candles(&symbol, now_ns, shutdown).await?;
        let snapshot = self.snapshot(&symbol, shutdown).await?;
        let exit = snapshot.position_for(&symbol).map(|p| self.exits.check(p));

        let evaluation = self.pipeline.evaluate(
            &mut self.gate_state,
            &symbol,
            &self.prices,
            &self.candles,
            &snapshot,
            now_ns,
        );
        if evaluation.signal.components.momentum.strength == 0.0
            && self.prices.len() < self.config.config().momentum.window
        {
            debug!(%symbol, buffered = self.prices.len(), "Price history still filling");
        }
        let alert = self.alerts.observe(&evaluation.signal.components.pvsra);

        let mut record = TickRecord {
            timestamp_ns: now_ns,
            symbol: symbol.clone(),
            decision: Decision::Rejected,
            reason: None,
            combined_signal: Some(evaluation.signal),
            sizing_result: evaluation.sizing,
            order: None,
            alert,
            exit,
        };

        match evaluation.verdict {
            Verdict::Reject(reason) => record.reason = Some(reason),
            Verdict::Submit { approval, sizing } => {
                info!(
                    %symbol,
                    side = ?approval.side,
                    quantity = %sizing.quantity,
                    confidence = evaluation.signal.confidence,
                    "{} Trade approved, submitting",
                    LogEmoji::SIGNAL
                );

                // Not raced against shutdown: the gate must be confirmed or rolled back
                let submitted = match tokio::time::timeout(
                    limit,
                    self.execution.submit_order(&symbol, approval.side, sizing.quantity),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Timeout {
                        operation: "submit_order",
                        after: limit,
                    }),
                };

                match submitted {
                    Ok(ack) => {
                        self.pipeline.gate().confirm(&mut self.gate_state, &approval);
                        record.decision = Decision::Approved;
                        record.order = Some(ack);
                    }
                    Err(e) => {
                        error!(
                            %symbol,
                            error = %e,
                            "{} Order submission failed, cooldown rolled back",
                            LogEmoji::ERROR
                        );
                        self.pipeline.gate().rollback(&mut self.gate_state, &approval);
                        self.metrics.increment_errors();
                        record.reason = Some(RejectReason::ExecutionFailed);
                    }
                }
            }
        }

        Ok(record)
    }

    /// Fetch candles until the period that ended at the last boundary is closed, or while the window is still filling
    async fn refresh_candles(&mut self, symbol: &str, now_ns: u64, shutdown: &CancellationToken) -> Result<()> {
        let interval = self.config.candle_interval();
        let interval_ns = (interval.as_nanos() as u64).max(1);
        let bucket = now_ns / interval_ns;
        let lookback = self.pipeline.pvsra().lookback();

        let filling = self.candles.closed().count() <= lookback;
        if self.last_candle_bucket == Some(bucket) && !filling {
            return Ok(());
        }

        let count = self.candles.capacity();
        let candles = bounded(
            "recent_candles",
            self.config.collaborator_timeout(),
            shutdown,
            self.market.recent_candles(symbol, interval, count),
        )
        .await?;

        let mut changed = 0usize;
        for candle in candles {
            if self.candles.upsert(candle) {
                changed += 1;
            }
        }

        // The feed may still report the previous period as running; keep asking until it closes
        let boundary_ns = bucket.saturating_mul(interval_ns);
        let caught_up = self
            .candles
            .latest_closed()
            .is_some_and(|candle| candle.close_time_ns >= boundary_ns);
        if caught_up {
            self.last_candle_bucket = Some(bucket);
        }
        debug!(%symbol, changed, caught_up, buffered = self.candles.len(), "Candle window refreshed");
        Ok(())
    }

    async fn snapshot(&self, symbol: &str, shutdown: &CancellationToken) -> Result<AccountSnapshot> {
        let limit = self.config.collaborator_timeout();
        let quote = &self.config.config().quote_asset;

        let balance = bounded("balance", limit, shutdown, self.account.balance(quote)).await?;
        let positions = bounded("open_positions", limit, shutdown, self.account.open_positions(symbol)).await?;
        let precision = bounded("symbol_precision", limit, shutdown, self.account.symbol_precision(symbol)).await?;

        Ok(AccountSnapshot {
            balance,
            positions,
            precision,
        })
    }
}

/// Await a collaborator call with a deadline, giving way to shutdown
async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    shutdown: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(EngineError::Cancelled),
        result = tokio::time::timeout(limit, call) => match result {
            Ok(inner) => inner,
            Err(_) => Err(EngineError::Timeout { operation, after: limit }),
        },
    }
}

#[async_trait]
impl Strategy for DecisionLoop {
    fn name(&self) -> &str {
        "pvsra_momentum"
    }

    async fn run(&mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        self.run_until_cancelled(shutdown).await?;
        Ok(())
    }

    fn metrics(&self) -> StrategyMetrics {
        self.metrics.get_metrics()
    }
}
