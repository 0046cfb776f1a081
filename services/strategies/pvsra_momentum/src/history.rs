//! Rolling price and candle buffers
//!
//! Both buffers are fixed-capacity and insertion-ordered; the oldest entry is
//! evicted on overflow.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single observed trade price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp_ns: u64,
    pub price: Decimal,
}

/// Rolling buffer of recent trade prices
#[derive(Debug, Clone)]
pub struct PriceHistory {
    capacity: usize,
    points: VecDeque<PricePoint>,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            points: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Record a price; returns `false` if it would break chronological order
    pub fn push(&mut self, point: PricePoint) -> bool {
        if let Some(last) = self.points.back() {
            if point.timestamp_ns < last.timestamp_ns {
                return false;
            }
        }

        self.points.push_back(point);
        if self.points.len() > self.capacity {
            self.points.pop_front();
        }
        true
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    /// Point `n` steps back from the latest (`0` is the latest)
    pub fn back(&self, n: usize) -> Option<&PricePoint> {
        let len = self.points.len();
        if n >= len {
            return None;
        }
        self.points.get(len - 1 - n)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// OHLCV candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time_ns: u64,
    pub close_time_ns: u64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,

    /// `false` while the candle's period is still running
    pub closed: bool,
}

impl Candle {
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Rolling buffer of candles, most recent last
#[derive(Debug, Clone)]
pub struct CandleWindow {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            candles: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Build a window from an ordered slice, keeping the newest `capacity` candles
    pub fn from_candles(capacity: usize, candles: &[Candle]) -> Self {
        let mut window = Self::new(capacity);
        for candle in candles {
            window.upsert(*candle);
        }
        window
    }

    /// Append a candle, or update the newest one in place if it shares its open time
    ///
    /// A candle already marked closed is never overwritten, and candles older
    /// than the newest buffered one are ignored. Returns whether the window changed.
    pub fn upsert(&mut self, candle: Candle) -> bool {
        if let Some(last) = self.candles.back_mut() {
            if candle.open_time_ns == last.open_time_ns {
                if last.closed || *last == candle {
                    return false;
                }
                *last = candle;
                return true;
            }
            if candle.open_time_ns < last.open_time_ns {
                return false;
            }
        }

        self.candles.push_back(candle);
        if self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
        true
    }

    /// Index of the newest closed candle
    pub fn latest_closed_index(&self) -> Option<usize> {
        self.candles.iter().rposition(|c| c.closed)
    }

    pub fn latest_closed(&self) -> Option<&Candle> {
        self.latest_closed_index().and_then(|i| self.candles.get(i))
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    /// Closed candles only, oldest first
    pub fn closed(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter().filter(|c| c.closed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}
