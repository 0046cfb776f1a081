//! PVSRA (Price, Volume, Support, Resistance Analysis)
//!
//! Classifies the newest closed candle by how its volume compares with the
//! preceding `lookback` candles and how much of its range is body:
//!
//! ```text
//! volume_ratio = volume / mean(volume of prior lookback candles)
//! body_ratio   = |close - open| / (high - low)
//!
//! Climax : volume_ratio >= climax_multiplier  && body_ratio >= climax_body_ratio
//! Rising : volume_ratio >= rising_multiplier  && body_ratio >= rising_body_ratio
//! Normal : everything else
//! ```
//!
//! The analyzer holds no mutable state: the same window always produces the
//! same reading. Besides the per-candle reading it offers window statistics
//! and a short pattern scan over recent classifications.

use crate::config::PvsraConfig;
use crate::history::{Candle, CandleWindow};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VolumeCondition {
    Normal,
    Rising,
    Climax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DirectionalBias {
    Bull,
    Bear,
    Neutral,
}

/// Conventional PVSRA chart colour for a classified candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandleColor {
    /// Bull climax
    Cyan,
    /// Bear climax, or a normal candle that did not close up
    Red,
    /// Rising-volume bull
    Blue,
    /// Rising-volume bear
    Yellow,
    /// Normal bull
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PvsraAlert {
    BullClimax,
    BearClimax,
    RisingBull,
    RisingBear,
}

impl PvsraAlert {
    /// Climax candles mark potential reversals; rising volume marks continuation
    pub fn is_reversal(&self) -> bool {
        matches!(self, PvsraAlert::BullClimax | PvsraAlert::BearClimax)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PvsraReading {
    pub volume_ratio: f64,
    pub body_ratio: f64,
    pub condition: VolumeCondition,
    pub bias: DirectionalBias,
    pub support: bool,
    pub resistance: bool,
    pub color: CandleColor,

    /// Close time of the analysed candle; `None` when there was not enough data
    pub candle_close_time_ns: Option<u64>,
    pub close: Decimal,
    pub volume: Decimal,
}

impl PvsraReading {
    /// Reading used while the window is still filling
    pub fn insufficient() -> Self {
        Self {
            volume_ratio: 0.0,
            body_ratio: 0.0,
            condition: VolumeCondition::Normal,
            bias: DirectionalBias::Neutral,
            support: false,
            resistance: false,
            color: CandleColor::Red,
            candle_close_time_ns: None,
            close: Decimal::ZERO,
            volume: Decimal::ZERO,
        }
    }

    /// Blend strength: Climax 0.8, Rising 0.6, Normal 0.5
    pub fn strength(&self) -> f64 {
        match self.condition {
            VolumeCondition::Climax => 0.8,
            VolumeCondition::Rising => 0.6,
            VolumeCondition::Normal => 0.5,
        }
    }

    /// Bias that may push a decision; Normal candles never do
    pub fn effective_bias(&self) -> DirectionalBias {
        match self.condition {
            VolumeCondition::Normal => DirectionalBias::Neutral,
            _ => self.bias,
        }
    }

    pub fn alert(&self) -> Option<PvsraAlert> {
        match (self.condition, self.bias) {
            (VolumeCondition::Climax, DirectionalBias::Bull) => Some(PvsraAlert::BullClimax),
            (VolumeCondition::Climax, DirectionalBias::Bear) => Some(PvsraAlert::BearClimax),
            (VolumeCondition::Rising, DirectionalBias::Bull) => Some(PvsraAlert::RisingBull),
            (VolumeCondition::Rising, DirectionalBias::Bear) => Some(PvsraAlert::RisingBear),
            _ => None,
        }
    }

    /// Downgrade to Normal if the analysed candle closed more than `max_age_ns` before `now_ns`
    pub fn expire_if_stale(self, now_ns: u64, max_age_ns: u64) -> Self {
        match self.candle_close_time_ns {
            Some(closed_at) if now_ns.saturating_sub(closed_at) > max_age_ns => Self {
                condition: VolumeCondition::Normal,
                ..self
            },
            _ => self,
        }
    }
}

/// Distribution of conditions across the buffered window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PvsraStatistics {
    pub total_bars: usize,
    pub climax_bars: usize,
    pub rising_bars: usize,
    pub normal_bars: usize,
    pub climax_percentage: f64,
    pub rising_percentage: f64,
    pub normal_percentage: f64,
    pub avg_volume: Decimal,
    pub max_volume_ratio: f64,
    pub avg_volume_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarketPattern {
    InsufficientData,
    HighVolatility,
    StrongTrend,
    ReversalSetup,
    Consolidation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendBias {
    Bullish,
    Bearish,
    Sideways,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternScan {
    pub pattern: MarketPattern,
    pub trend: TrendBias,
    pub climax_count: usize,
    pub rising_count: usize,
    pub price_change_pct: f64,
    pub latest_condition: Option<VolumeCondition>,
    pub latest_alert: Option<PvsraAlert>,
}

impl PatternScan {
    fn insufficient() -> Self {
        Self {
            pattern: MarketPattern::InsufficientData,
            trend: TrendBias::Sideways,
            climax_count: 0,
            rising_count: 0,
            price_change_pct: 0.0,
            latest_condition: None,
            latest_alert: None,
        }
    }
}

/// Close-to-close move beyond which the pattern scan calls a trend
const TREND_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct PvsraAnalyzer {
    lookback: usize,
    climax_multiplier: f64,
    rising_multiplier: f64,
    climax_body_ratio: f64,
    rising_body_ratio: f64,
    extrema_tolerance: f64,
}

impl PvsraAnalyzer {
    pub fn new(config: &PvsraConfig) -> Self {
        Self {
            lookback: config.lookback,
            climax_multiplier: config.climax_multiplier,
            rising_multiplier: config.rising_multiplier,
            climax_body_ratio: config.climax_body_ratio,
            rising_body_ratio: config.rising_body_ratio,
            extrema_tolerance: config.extrema_tolerance,
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Classify the newest closed candle
    ///
    /// Needs `lookback` closed candles before it; otherwise returns
    /// [`PvsraReading::insufficient`].
    pub fn analyze(&self, window: &CandleWindow) -> PvsraReading {
        let candles: Vec<&Candle> = window.closed().collect();
        match candles.len().checked_sub(1) {
            Some(last) if last >= self.lookback => self.classify_at(&candles, last),
            _ => PvsraReading::insufficient(),
        }
    }

    /// Classification of every closed candle that has a full lookback behind it
    pub fn classify_all(&self, window: &CandleWindow) -> Vec<PvsraReading> {
        let candles: Vec<&Candle> = window.closed().collect();
        (self.lookback..candles.len())
            .map(|i| self.classify_at(&candles, i))
            .collect()
    }

    pub fn statistics(&self, window: &CandleWindow) -> PvsraStatistics {
        let readings = self.classify_all(window);
        if readings.is_empty() {
            return PvsraStatistics::default();
        }

        let total = readings.len();
        let count = |condition| readings.iter().filter(|r| r.condition == condition).count();
        let climax_bars = count(VolumeCondition::Climax);
        let rising_bars = count(VolumeCondition::Rising);
        let normal_bars = total - climax_bars - rising_bars;
        let pct = |n: usize| n as f64 / total as f64 * 100.0;

        let volume_sum: Decimal = readings.iter().map(|r| r.volume).sum();
        let ratio_sum: f64 = readings.iter().map(|r| r.volume_ratio).sum();

        PvsraStatistics {
            total_bars: total,
            climax_bars,
            rising_bars,
            normal_bars,
            climax_percentage: pct(climax_bars),
            rising_percentage: pct(rising_bars),
            normal_percentage: pct(normal_bars),
            avg_volume: volume_sum / Decimal::from(total),
            max_volume_ratio: readings.iter().map(|r| r.volume_ratio).fold(0.0, f64::max),
            avg_volume_ratio: ratio_sum / total as f64,
        }
    }

    /// Summarise the last `recent` classified candles
    pub fn scan_patterns(&self, window: &CandleWindow, recent: usize) -> PatternScan {
        let readings = self.classify_all(window);
        if recent == 0 || readings.len() < recent {
            return PatternScan::insufficient();
        }

        let tail = &readings[readings.len() - recent..];
        let climax_count = tail
            .iter()
            .filter(|r| r.condition == VolumeCondition::Climax)
            .count();
        let rising_count = tail
            .iter()
            .filter(|r| r.condition == VolumeCondition::Rising)
            .count();

        let pattern = if climax_count >= 2 {
            MarketPattern::HighVolatility
        } else if rising_count >= 3 {
            MarketPattern::StrongTrend
        } else if climax_count == 1 && rising_count >= 1 {
            MarketPattern::ReversalSetup
        } else {
            MarketPattern::Consolidation
        };

        let first = tail[0].close;
        let last = tail[tail.len() - 1];
        let price_change = if first > Decimal::ZERO {
            ((last.close - first) / first).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };
        let trend = if price_change > TREND_THRESHOLD {
            TrendBias::Bullish
        } else if price_change < -TREND_THRESHOLD {
            TrendBias::Bearish
        } else {
            TrendBias::Sideways
        };

        PatternScan {
            pattern,
            trend,
            climax_count,
            rising_count,
            price_change_pct: price_change * 100.0,
            latest_condition: Some(last.condition),
            latest_alert: last.alert(),
        }
    }

    /// `candles[index]` against the `lookback` candles before it; caller guarantees `index >= lookback`
    fn classify_at(&self, candles: &[&Candle], index: usize) -> PvsraReading {
        let current = candles[index];
        let prior = &candles[index - self.lookback..index];

        let volume_sum: Decimal = prior.iter().map(|c| c.volume).sum();
        let avg_volume = volume_sum / Decimal::from(self.lookback);
        let volume_ratio = if avg_volume > Decimal::ZERO {
            ratio(current.volume, avg_volume)
        } else {
            0.0
        };

        let range = current.range();
        let body_ratio = if range > Decimal::ZERO {
            ratio(current.body(), range)
        } else {
            0.0
        };

        let condition = if avg_volume <= Decimal::ZERO {
            VolumeCondition::Normal
        } else if volume_ratio >= self.climax_multiplier && body_ratio >= self.climax_body_ratio {
            VolumeCondition::Climax
        } else if volume_ratio >= self.rising_multiplier && body_ratio >= self.rising_body_ratio {
            VolumeCondition::Rising
        } else {
            VolumeCondition::Normal
        };

        let bias = if current.is_bullish() {
            DirectionalBias::Bull
        } else if current.is_bearish() {
            DirectionalBias::Bear
        } else {
            DirectionalBias::Neutral
        };

        let color = match (condition, current.is_bullish()) {
            (VolumeCondition::Climax, true) => CandleColor::Cyan,
            (VolumeCondition::Climax, false) => CandleColor::Red,
            (VolumeCondition::Rising, true) => CandleColor::Blue,
            (VolumeCondition::Rising, false) => CandleColor::Yellow,
            (VolumeCondition::Normal, true) => CandleColor::Green,
            (VolumeCondition::Normal, false) => CandleColor::Red,
        };

        let prior_low = prior.iter().map(|c| c.low).min();
        let prior_high = prior.iter().map(|c| c.high).max();

        PvsraReading {
            volume_ratio,
            body_ratio,
            condition,
            bias,
            support: prior_low.is_some_and(|low| self.touches(current.low, low)),
            resistance: prior_high.is_some_and(|high| self.touches(current.high, high)),
            color,
            candle_close_time_ns: Some(current.close_time_ns),
            close: current.close,
            volume: current.volume,
        }
    }

    fn touches(&self, value: Decimal, extreme: Decimal) -> bool {
        if extreme <= Decimal::ZERO {
            return false;
        }
        ratio((value - extreme).abs(), extreme) <= self.extrema_tolerance
    }
}

fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    numerator
        .checked_div(denominator)
        .and_then(|r| r.to_f64())
        .unwrap_or(0.0)
}
