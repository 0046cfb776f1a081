//! Advisory exit checks for open positions
//!
//! The engine never closes positions itself. When the account reports an
//! open position for the symbol, each tick record carries the verdict so an
//! operator or downstream service can act on it.

use crate::collaborators::PositionDescriptor;
use crate::config::ExitConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCheck {
    TakeProfit,
    StopLoss,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExitAdvice {
    pub check: ExitCheck,
    pub pnl_fraction: f64,
}

#[derive(Debug, Clone)]
pub struct ExitMonitor {
    profit_threshold: f64,
    stop_loss_threshold: f64,
}

impl ExitMonitor {
    pub fn new(config: &ExitConfig) -> Self {
        Self {
            profit_threshold: config.profit_threshold,
            stop_loss_threshold: config.stop_loss_threshold,
        }
    }

    pub fn check(&self, position: &PositionDescriptor) -> ExitAdvice {
        let pnl = position.pnl_fraction;
        let check = if pnl >= self.profit_threshold {
            ExitCheck::TakeProfit
        } else if pnl <= -self.stop_loss_threshold {
            ExitCheck::StopLoss
        } else {
            ExitCheck::Hold
        };

        ExitAdvice {
            check,
            pnl_fraction: pnl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::PositionSide;
    use rust_decimal_macros::dec;

    fn position(pnl_fraction: f64) -> PositionDescriptor {
        PositionDescriptor {
            symbol: "SUIUSDT".to_string(),
            side: PositionSide::Long,
            size: dec!(100),
            entry_price: dec!(4.00),
            mark_price: dec!(4.00),
            unrealized_pnl: dec!(0),
            pnl_fraction,
        }
    }

    #[test]
    fn test_exit_thresholds() {
        let monitor = ExitMonitor::new(&ExitConfig::default());

        assert_eq!(monitor.check(&position(0.0025)).check, ExitCheck::TakeProfit);
        assert_eq!(monitor.check(&position(0.002)).check, ExitCheck::TakeProfit);
        assert_eq!(monitor.check(&position(0.0005)).check, ExitCheck::Hold);
        assert_eq!(monitor.check(&position(-0.0005)).check, ExitCheck::Hold);
        assert_eq!(monitor.check(&position(-0.001)).check, ExitCheck::StopLoss);
        assert_eq!(monitor.check(&position(-0.02)).check, ExitCheck::StopLoss);
    }
}
