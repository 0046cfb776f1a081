//! Signal definitions and blending
//!
//! Momentum and PVSRA are independent opinions about direction. The blender
//! only ever adds them up when they agree; a disagreement is reported as
//! `Mixed` with zero confidence so it can never clear the gate.

use crate::config::BlendConfig;
use crate::momentum::{MomentumDirection, MomentumReading};
use crate::pvsra::{DirectionalBias, PvsraReading};
use serde::Serialize;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalDirection {
    Buy,
    Sell,
    Neutral,
    Mixed,
}

impl SignalDirection {
    pub fn side(&self) -> Option<Side> {
        match self {
            SignalDirection::Buy => Some(Side::Buy),
            SignalDirection::Sell => Some(Side::Sell),
            SignalDirection::Neutral | SignalDirection::Mixed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalComponents {
    pub momentum: MomentumReading,
    pub pvsra: PvsraReading,
}

/// Blended view of one tick; read-only once built
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombinedSignal {
    pub direction: SignalDirection,

    /// Blended confidence in [0, 1]
    pub confidence: f64,

    pub components: SignalComponents,
}

impl CombinedSignal {
    pub fn side(&self) -> Option<Side> {
        self.direction.side()
    }
}

/// Weighted consensus of momentum and PVSRA
#[derive(Debug, Clone, Copy)]
pub struct SignalBlender {
    pvsra_weight: f64,
}

impl SignalBlender {
    pub fn new(config: &BlendConfig) -> Self {
        Self {
            pvsra_weight: config.pvsra_weight.clamp(0.0, 1.0),
        }
    }

    pub fn pvsra_weight(&self) -> f64 {
        self.pvsra_weight
    }

    pub fn blend(&self, momentum: MomentumReading, pvsra: PvsraReading) -> CombinedSignal {
        let w = self.pvsra_weight;
        let momentum_side = match momentum.direction {
            MomentumDirection::Up => Some(Side::Buy),
            MomentumDirection::Down => Some(Side::Sell),
            MomentumDirection::Flat => None,
        };
        let pvsra_side = match pvsra.effective_bias() {
            DirectionalBias::Bull => Some(Side::Buy),
            DirectionalBias::Bear => Some(Side::Sell),
            DirectionalBias::Neutral => None,
        };

        let (direction, confidence) = match (momentum_side, pvsra_side) {
            (Some(m), Some(p)) if m == p => (
                direction_of(m),
                momentum.strength * (1.0 - w) + pvsra.strength() * w,
            ),
            (Some(_), Some(_)) => (SignalDirection::Mixed, 0.0),
            (None, Some(p)) => (direction_of(p), pvsra.strength() * w),
            (Some(m), None) => (direction_of(m), momentum.strength * (1.0 - w)),
            (None, None) => (SignalDirection::Neutral, 0.0),
        };

        CombinedSignal {
            direction,
            confidence: confidence.clamp(0.0, 1.0),
            components: SignalComponents { momentum, pvsra },
        }
    }
}

fn direction_of(side: Side) -> SignalDirection {
    match side {
        Side::Buy => SignalDirection::Buy,
        Side::Sell => SignalDirection::Sell,
    }
}
