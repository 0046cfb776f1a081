//! # PVSRA Momentum Strategy - Signal Blending and Trade Gating
//!
//! ## Purpose
//!
//! Decision core for a single leveraged instrument. On a fixed cadence it pulls
//! the latest price and candles, measures short-term momentum, classifies the
//! newest closed candle with PVSRA (Price, Volume, Support, Resistance
//! Analysis), blends both into one confidence score and runs the result
//! through a gate and a position sizer before handing an order to execution.
//!
//! ## Integration Points
//!
//! - **Market Data**: [`MarketData`] collaborator (latest price, recent candles)
//! - **Account**: [`Account`] collaborator (balance, open positions, precision)
//! - **Execution**: [`Execution`] collaborator (market order submission)
//! - **Observability**: [`Observer`] receives one [`TickRecord`] per tick
//! - **Configuration**: TOML via `strategy_shared::config`, validated once at startup
//!
//! ## Architecture Role
//!
//! ```text
//! MarketData → [PriceHistory] → [MomentumAnalyzer] ─┐
//!          └─→ [CandleWindow] → [PvsraAnalyzer] ────┴→ [SignalBlender]
//!                                                          ↓
//! Account ──→ AccountSnapshot ──────────────────────→ [TradeGate] → [PositionSizer]
//!                                                                        ↓
//!                                              Observer ← TickRecord ← Execution
//! ```
//!
//! One [`DecisionLoop`] owns one instrument's buffers, gate state and alert
//! history. Independent instruments run independent loops; nothing is
//! process-global.
//!
//! ## Decision Rules
//!
//! ### Blending
//! - Momentum and PVSRA agree → `momentum * (1 - w) + pvsra * w`
//! - Only one side is directional → that side's share alone
//! - They disagree → `Mixed`, confidence 0, never traded
//!
//! ### Gate (first failure wins)
//! 1. `low_confidence` 2. `position_exists` 3. `cooldown`
//! 4. `pvsra_not_confirmed` 5. `insufficient_balance`
//!
//! The cooldown is written when the gate approves, before sizing and
//! submission, and rolled back if either fails.
//!
//! ### Sizing
//! Fixed amount or percentage of balance, capped at the safety ceiling,
//! multiplied by leverage and floored to the exchange step size. Orders
//! below the minimum notional are rejected, never upsized.
//!
//! ## Examples
//!
//! ### Evaluating synthetic buffers
//! ```rust
//! use pvsra_momentum::{
//!     AccountSnapshot, CandleWindow, DecisionPipeline, EngineConfig, GateState, PriceHistory,
//!     SymbolPrecision, Verdict,
//! };
//! use rust_decimal_macros::dec;
//!
//! let config = EngineConfig::default().into_validated()?;
//! let pipeline = DecisionPipeline::new(&config);
//! let mut gate_state = GateState::new();
//! let snapshot = AccountSnapshot {
//!     balance: dec!(1000),
//!     positions: Vec::new(),
//!     precision: SymbolPrecision { step_size: dec!(0.1), min_notional: dec!(5) },
//! };
//!
//! let evaluation = pipeline.evaluate(
//!     &mut gate_state,
//!     "SUIUSDT",
//!     &PriceHistory::new(50),
//!     &CandleWindow::new(50),
//!     &snapshot,
//!     1_000_000_000,
//! );
//! assert!(matches!(evaluation.verdict, Verdict::Reject(_)));
//! # Ok::<(), pvsra_momentum::EngineError>(())
//! ```

pub mod alerts;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod exits;
pub mod gate;
pub mod history;
pub mod momentum;
pub mod observer;
pub mod paper;
pub mod pvsra;
pub mod signals;
pub mod sizing;
pub mod stats;

pub use alerts::{AlertHistory, AlertRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{Account, Execution, MarketData, OrderAck, PositionDescriptor, PositionSide};
pub use config::{ConfigWarning, EngineConfig, SizingMode, ValidatedConfig};
pub use engine::{DecisionLoop, DecisionPipeline, Evaluation, Verdict};
pub use error::{EngineError, Result};
pub use exits::{ExitAdvice, ExitCheck, ExitMonitor};
pub use gate::{AccountSnapshot, Approval, GateDecision, GatePhase, GateState, RejectReason, TradeGate};
pub use history::{Candle, CandleWindow, PriceHistory, PricePoint};
pub use momentum::{MomentumAnalyzer, MomentumDirection, MomentumReading};
pub use observer::{CompositeObserver, Decision, Observer, RecordingObserver, TickRecord, TracingObserver};
pub use paper::{PaperAccount, PaperMarket};
pub use pvsra::{
    CandleColor, DirectionalBias, MarketPattern, PatternScan, PvsraAlert, PvsraAnalyzer, PvsraReading,
    PvsraStatistics, TrendBias, VolumeCondition,
};
pub use signals::{CombinedSignal, Side, SignalBlender, SignalComponents, SignalDirection};
pub use sizing::{NotionalIntent, PositionSizer, SizingPolicy, SizingRejection, SizingResult, SymbolPrecision};
pub use stats::DecisionStats;
