//! Per-tick decision records and their consumers
//!
//! Every tick produces exactly one [`TickRecord`]. The engine hands it to an
//! [`Observer`] and never formats human-readable text itself; dashboards,
//! notifications and trade journals are observers.

use crate::alerts::AlertRecord;
use crate::collaborators::OrderAck;
use crate::exits::{ExitAdvice, ExitCheck};
use crate::gate::RejectReason;
use crate::signals::CombinedSignal;
use crate::sizing::SizingResult;
use parking_lot::Mutex;
use serde::Serialize;
use strategy_shared::LogEmoji;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    pub timestamp_ns: u64,
    pub symbol: String,
    pub decision: Decision,

    /// Set exactly when `decision` is `Rejected`
    pub reason: Option<RejectReason>,

    /// Absent when the tick failed before a signal could be built
    pub combined_signal: Option<CombinedSignal>,
    pub sizing_result: Option<SizingResult>,
    pub order: Option<OrderAck>,

    /// Alert raised by this tick's candle, if it was new
    pub alert: Option<AlertRecord>,
    pub exit: Option<ExitAdvice>,
}

impl TickRecord {
    pub fn rejected(timestamp_ns: u64, symbol: &str, reason: RejectReason) -> Self {
        Self {
            timestamp_ns,
            symbol: symbol.to_string(),
            decision: Decision::Rejected,
            reason: Some(reason),
            combined_signal: None,
            sizing_result: None,
            order: None,
            alert: None,
            exit: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approved
    }
}

/// Consumer of tick records
pub trait Observer: Send + Sync {
    fn record(&self, record: &TickRecord);
}

/// Writes each record as one structured tracing event
#[derive(Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record(&self, record: &TickRecord) {
        let json = match serde_json::to_string(record) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, symbol = %record.symbol, "Failed to serialise tick record");
                return;
            }
        };

        if let Some(alert) = &record.alert {
            info!(
                symbol = %record.symbol,
                alert = ?alert.alert,
                volume_ratio = alert.volume_ratio,
                "{} PVSRA alert at {}",
                LogEmoji::SIGNAL,
                alert.price
            );
        }

        if let Some(exit) = record.exit.filter(|e| e.check != ExitCheck::Hold) {
            warn!(
                symbol = %record.symbol,
                check = ?exit.check,
                pnl_fraction = exit.pnl_fraction,
                "{} Exit threshold reached on open position",
                LogEmoji::STOP
            );
        }

        match record.decision {
            Decision::Approved => info!(
                symbol = %record.symbol,
                record = %json,
                "{} Order submitted",
                LogEmoji::EXECUTE
            ),
            Decision::Rejected => debug!(
                symbol = %record.symbol,
                reason = record.reason.map(|r| r.as_str()).unwrap_or("unknown"),
                record = %json,
                "No trade"
            ),
        }
    }
}

/// Keeps every record in memory; used by tests and the paper binary's summary
#[derive(Debug, Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<TickRecord>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TickRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Observer for RecordingObserver {
    fn record(&self, record: &TickRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Fan a record out to several observers in order
pub struct CompositeObserver {
    observers: Vec<std::sync::Arc<dyn Observer>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<std::sync::Arc<dyn Observer>>) -> Self {
        Self { observers }
    }
}

impl Observer for CompositeObserver {
    fn record(&self, record: &TickRecord) {
        for observer in &self.observers {
            observer.record(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizing::SizingRejection;
    use std::sync::Arc;

    #[test]
    fn test_rejected_record_serialises_reason_as_string() {
        let record = TickRecord::rejected(
            42,
            "SUIUSDT",
            RejectReason::Sizing(SizingRejection::BelowMinNotional),
        );
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();

        assert_eq!(json["decision"], "Rejected");
        assert_eq!(json["reason"], "below_min_notional");
        assert_eq!(json["timestamp_ns"], 42);
        assert!(json["combined_signal"].is_null());
    }

    #[test]
    fn test_composite_fans_out() {
        let first = Arc::new(RecordingObserver::new());
        let second = Arc::new(RecordingObserver::new());
        let composite = CompositeObserver::new(vec![first.clone(), second.clone()]);

        composite.record(&TickRecord::rejected(1, "SUIUSDT", RejectReason::Cooldown));
        TracingObserver.record(&TickRecord::rejected(1, "SUIUSDT", RejectReason::Cooldown));

        assert_eq!(first.len(), 1);
        assert_eq!(second.records()[0].reason, Some(RejectReason::Cooldown));
    }
}
