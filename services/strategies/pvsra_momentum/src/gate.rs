//! Trade gate
//!
//! Decides whether a blended signal may become an order. Checks run in a
//! fixed order and the first failure is the reported reason:
//!
//! 1. confidence below threshold     → `low_confidence`
//! 2. symbol already has a position  → `position_exists`
//! 3. inside the cooldown window     → `cooldown`
//! 4. PVSRA confirmation required    → `pvsra_not_confirmed`
//! 5. balance cannot back min order  → `insufficient_balance`
//!
//! On approval the cooldown timestamp is written immediately, before sizing
//! or submission, so a later tick cannot approve again while the first order
//! is still in flight. The returned [`Approval`] is the handle for undoing
//! that write when sizing or submission fails.

use crate::collaborators::PositionDescriptor;
use crate::config::GateConfig;
use crate::pvsra::VolumeCondition;
use crate::signals::{CombinedSignal, Side};
use crate::sizing::{SizingPolicy, SizingRejection, SymbolPrecision};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;

const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    LowConfidence,
    PositionExists,
    Cooldown,
    PvsraNotConfirmed,
    InsufficientBalance,
    Sizing(SizingRejection),
    DataUnavailable,
    ExecutionFailed,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::LowConfidence => "low_confidence",
            RejectReason::PositionExists => "position_exists",
            RejectReason::Cooldown => "cooldown",
            RejectReason::PvsraNotConfirmed => "pvsra_not_confirmed",
            RejectReason::InsufficientBalance => "insufficient_balance",
            RejectReason::Sizing(rejection) => rejection.as_str(),
            RejectReason::DataUnavailable => "data_unavailable",
            RejectReason::ExecutionFailed => "execution_failed",
        }
    }
}

impl Serialize for RejectReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatePhase {
    Idle,
    Evaluating,
    Approved,
    Rejected,
}

/// Account view taken once per tick; the gate never mutates it
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    pub positions: Vec<PositionDescriptor>,
    pub precision: SymbolPrecision,
}

impl AccountSnapshot {
    pub fn position_for(&self, symbol: &str) -> Option<&PositionDescriptor> {
        self.positions
            .iter()
            .find(|p| p.symbol == symbol && p.size != Decimal::ZERO)
    }
}

/// Cross-tick gate memory, owned by one decision loop
#[derive(Debug, Clone)]
pub struct GateState {
    last_trade_ns: Option<u64>,
    open_positions: HashSet<String>,
    phase: GatePhase,
}

impl Default for GateState {
    fn default() -> Self {
        Self::new()
    }
}

impl GateState {
    pub fn new() -> Self {
        Self {
            last_trade_ns: None,
            open_positions: HashSet::new(),
            phase: GatePhase::Idle,
        }
    }

    pub fn last_trade_ns(&self) -> Option<u64> {
        self.last_trade_ns
    }

    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.open_positions.contains(symbol)
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Mirror the account's view of `symbol` into the local position set
    pub fn reconcile(&mut self, symbol: &str, snapshot: &AccountSnapshot) {
        if snapshot.position_for(symbol).is_some() {
            self.open_positions.insert(symbol.to_string());
        } else {
            self.open_positions.remove(symbol);
        }
    }
}

/// Proof of an approval; needed to confirm or roll it back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Approval {
    pub symbol: String,
    pub side: Side,
    pub approved_at_ns: u64,
    previous_trade_ns: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Approved(Approval),
    Rejected(RejectReason),
}

#[derive(Debug, Clone)]
pub struct TradeGate {
    min_confidence: f64,
    cooldown_ns: u64,
    allow_multiple_positions: bool,
    require_pvsra_confirmation: bool,
    policy: SizingPolicy,
}

impl TradeGate {
    pub fn new(config: &GateConfig, policy: SizingPolicy) -> Self {
        Self {
            min_confidence: config.min_confidence,
            cooldown_ns: config.cooldown_secs.saturating_mul(NANOS_PER_SEC),
            allow_multiple_positions: config.allow_multiple_positions,
            require_pvsra_confirmation: config.require_pvsra_confirmation,
            policy,
        }
    }

    pub fn evaluate(
        &self,
        state: &mut GateState,
        symbol: &str,
        signal: &CombinedSignal,
        snapshot: &AccountSnapshot,
        now_ns: u64,
    ) -> GateDecision {
        state.phase = GatePhase::Evaluating;
        state.reconcile(symbol, snapshot);

        match self.first_failure(state, symbol, signal, snapshot, now_ns) {
            Some(reason) => {
                state.phase = GatePhase::Rejected;
                GateDecision::Rejected(reason)
            }
            None => match signal.side() {
                Some(side) => {
                    let approval = Approval {
                        symbol: symbol.to_string(),
                        side,
                        approved_at_ns: now_ns,
                        previous_trade_ns: state.last_trade_ns,
                    };
                    state.last_trade_ns = Some(now_ns);
                    state.phase = GatePhase::Approved;
                    GateDecision::Approved(approval)
                }
                // Neutral/Mixed carry zero confidence; only reachable if that ever changes
                None => {
                    state.phase = GatePhase::Rejected;
                    GateDecision::Rejected(RejectReason::LowConfidence)
                }
            },
        }
    }

    /// The order went out; the symbol now counts as holding a position
    pub fn confirm(&self, state: &mut GateState, approval: &Approval) {
        state.open_positions.insert(approval.symbol.clone());
        state.phase = GatePhase::Idle;
    }

    /// Undo the optimistic cooldown write of `approval`
    ///
    /// A no-op if a newer approval has since replaced the timestamp.
    pub fn rollback(&self, state: &mut GateState, approval: &Approval) {
        if state.last_trade_ns == Some(approval.approved_at_ns) {
            state.last_trade_ns = approval.previous_trade_ns;
        }
        state.phase = GatePhase::Idle;
    }

    fn first_failure(
        &self,
        state: &GateState,
        symbol: &str,
        signal: &CombinedSignal,
        snapshot: &AccountSnapshot,
        now_ns: u64,
    ) -> Option<RejectReason> {
        if signal.confidence < self.min_confidence {
            return Some(RejectReason::LowConfidence);
        }

        if !self.allow_multiple_positions && state.has_open_position(symbol) {
            return Some(RejectReason::PositionExists);
        }

        if let Some(last) = state.last_trade_ns {
            if now_ns.saturating_sub(last) < self.cooldown_ns {
                return Some(RejectReason::Cooldown);
            }
        }

        if self.require_pvsra_confirmation
            && signal.components.pvsra.condition == VolumeCondition::Normal
        {
            return Some(RejectReason::PvsraNotConfirmed);
        }

        if snapshot.balance <= Decimal::ZERO
            || self.policy.max_position_value(snapshot.balance) < snapshot.precision.min_notional
        {
            return Some(RejectReason::InsufficientBalance);
        }

        None
    }
}
