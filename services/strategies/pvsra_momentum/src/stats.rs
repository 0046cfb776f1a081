//! Per-engine decision statistics

use crate::gate::RejectReason;
use crate::signals::{CombinedSignal, Side};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DecisionStats {
    pub total_ticks: u64,
    pub approved: u64,
    pub rejected: u64,
    pub buy_approvals: u64,
    pub sell_approvals: u64,

    /// Rejections keyed by reason string
    pub rejections_by_reason: BTreeMap<&'static str, u64>,

    /// Rolling average confidence of approved decisions
    pub avg_approved_confidence: f64,
    pub last_approval_timestamp: Option<u64>,
}

impl DecisionStats {
    pub fn record_approval(&mut self, signal: &CombinedSignal, timestamp_ns: u64) {
        self.total_ticks += 1;
        self.approved += 1;

        match signal.side() {
            Some(Side::Buy) => self.buy_approvals += 1,
            Some(Side::Sell) => self.sell_approvals += 1,
            None => {}
        }

        // Update rolling average confidence
        let total_confidence =
            self.avg_approved_confidence * (self.approved - 1) as f64 + signal.confidence;
        self.avg_approved_confidence = total_confidence / self.approved as f64;

        self.last_approval_timestamp = Some(timestamp_ns);
    }

    pub fn record_rejection(&mut self, reason: RejectReason) {
        self.total_ticks += 1;
        self.rejected += 1;
        *self.rejections_by_reason.entry(reason.as_str()).or_insert(0) += 1;
    }

    pub fn rejections_for(&self, reason: RejectReason) -> u64 {
        self.rejections_by_reason
            .get(reason.as_str())
            .copied()
            .unwrap_or(0)
    }
}
