//! Bounded history of PVSRA alerts, owned by one decision loop

use crate::pvsra::{PvsraAlert, PvsraReading};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlertRecord {
    /// Close time of the candle that raised the alert
    pub candle_close_time_ns: u64,
    pub alert: PvsraAlert,
    pub price: Decimal,
    pub volume: Decimal,
    pub volume_ratio: f64,
}

#[derive(Debug, Clone)]
pub struct AlertHistory {
    capacity: usize,
    records: VecDeque<AlertRecord>,
}

impl AlertHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Record the reading's alert, once per candle
    ///
    /// Returns the stored record, or `None` if the reading raised no alert or
    /// its candle was already recorded.
    pub fn observe(&mut self, reading: &PvsraReading) -> Option<AlertRecord> {
        let alert = reading.alert()?;
        let closed_at = reading.candle_close_time_ns?;

        if let Some(last) = self.records.back() {
            if last.candle_close_time_ns >= closed_at {
                return None;
            }
        }

        let record = AlertRecord {
            candle_close_time_ns: closed_at,
            alert,
            price: reading.close,
            volume: reading.volume,
            volume_ratio: reading.volume_ratio,
        };
        self.records.push_back(record);
        if self.records.len() > self.capacity {
            self.records.pop_front();
        }
        Some(record)
    }

    pub fn latest(&self) -> Option<&AlertRecord> {
        self.records.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pvsra::{DirectionalBias, VolumeCondition};
    use rust_decimal_macros::dec;

    fn reading(closed_at: u64, condition: VolumeCondition) -> PvsraReading {
        PvsraReading {
            condition,
            bias: DirectionalBias::Bull,
            candle_close_time_ns: Some(closed_at),
            close: dec!(4.5),
            volume: dec!(1000),
            volume_ratio: 2.5,
            ..PvsraReading::insufficient()
        }
    }

    #[test]
    fn test_records_once_per_candle() {
        let mut history = AlertHistory::new(20);

        assert!(history.observe(&reading(10, VolumeCondition::Climax)).is_some());
        assert!(history.observe(&reading(10, VolumeCondition::Climax)).is_none());
        assert!(history.observe(&reading(20, VolumeCondition::Normal)).is_none());
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().unwrap().alert, PvsraAlert::BullClimax);
    }

    #[test]
    fn test_bounded() {
        let mut history = AlertHistory::new(3);
        for i in 1..=5 {
            history.observe(&reading(i, VolumeCondition::Rising));
        }

        assert_eq!(history.len(), 3);
        let times: Vec<u64> = history.iter().map(|r| r.candle_close_time_ns).collect();
        assert_eq!(times, vec![3, 4, 5]);
    }
}
