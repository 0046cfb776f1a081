//! Short-horizon price momentum

use crate::config::MomentumConfig;
use crate::history::PriceHistory;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MomentumDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MomentumReading {
    pub direction: MomentumDirection,

    /// Normalised magnitude in [0, 1]
    pub strength: f64,

    /// Fractional change across the window; 0 when not enough prices are buffered
    pub price_change: f64,
}

impl MomentumReading {
    pub fn flat() -> Self {
        Self {
            direction: MomentumDirection::Flat,
            strength: 0.0,
            price_change: 0.0,
        }
    }
}

/// Rate of change over the last `window` buffered prices
#[derive(Debug, Clone)]
pub struct MomentumAnalyzer {
    window: usize,
    min_price_change: f64,
    normalization_factor: f64,
}

impl MomentumAnalyzer {
    pub fn new(config: &MomentumConfig) -> Self {
        Self {
            window: config.window,
            min_price_change: config.min_price_change,
            normalization_factor: config.normalization_factor,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Flat with zero strength until `window` prices are buffered
    pub fn analyze(&self, history: &PriceHistory) -> MomentumReading {
        if self.window == 0 || history.len() < self.window {
            return MomentumReading::flat();
        }

        let (latest, base) = match (history.back(0), history.back(self.window - 1)) {
            (Some(latest), Some(base)) => (latest.price, base.price),
            _ => return MomentumReading::flat(),
        };

        if base <= Decimal::ZERO {
            return MomentumReading::flat();
        }

        let price_change = match (latest - base).checked_div(base).and_then(|c| c.to_f64()) {
            Some(change) if change.is_finite() => change,
            _ => return MomentumReading::flat(),
        };

        if price_change.abs() < self.min_price_change {
            return MomentumReading {
                price_change,
                ..MomentumReading::flat()
            };
        }

        let direction = if price_change > 0.0 {
            MomentumDirection::Up
        } else {
            MomentumDirection::Down
        };

        MomentumReading {
            direction,
            strength: (price_change.abs() / self.normalization_factor).min(1.0),
            price_change,
        }
    }
}
