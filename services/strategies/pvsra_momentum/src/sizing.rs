//! Position sizing
//!
//! Turns a notional intent into an exchange-valid quantity:
//!
//! ```text
//! margin    = min(intent(balance), balance * safety_ceiling)
//! raw_qty   = margin * leverage / price
//! quantity  = floor(raw_qty / step_size) * step_size
//! ```
//!
//! Quantities are only ever rounded down, and an order that ends up below the
//! exchange minimum notional is rejected rather than upsized.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// How much quote currency a single trade commits before leverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotionalIntent {
    Fixed(Decimal),
    /// Percent of available balance, in (0, 100]
    Percentage(Decimal),
}

/// Exchange quantisation for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SymbolPrecision {
    pub step_size: Decimal,
    pub min_notional: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SizingRejection {
    BelowMinNotional,
    ZeroQuantity,
    InsufficientBalance,
    InvalidPrice,
    InvalidPrecision,
}

impl SizingRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizingRejection::BelowMinNotional => "below_min_notional",
            SizingRejection::ZeroQuantity => "zero_quantity",
            SizingRejection::InsufficientBalance => "insufficient_balance",
            SizingRejection::InvalidPrice => "invalid_price",
            SizingRejection::InvalidPrecision => "invalid_precision",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizingResult {
    pub quantity: Decimal,

    /// Leveraged position value, `quantity * price`
    pub notional: Decimal,

    /// Balance committed before leverage
    pub margin: Decimal,

    pub rejected: bool,
    pub rejection_reason: Option<SizingRejection>,
}

impl SizingResult {
    fn rejected(reason: SizingRejection, margin: Decimal) -> Self {
        Self {
            quantity: Decimal::ZERO,
            notional: Decimal::ZERO,
            margin,
            rejected: true,
            rejection_reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingPolicy {
    intent: NotionalIntent,
    leverage: Decimal,
    safety_ceiling: Decimal,
}

impl SizingPolicy {
    pub fn new(intent: NotionalIntent, leverage: Decimal, safety_ceiling: Decimal) -> Self {
        Self {
            intent,
            leverage,
            safety_ceiling,
        }
    }

    pub fn intent(&self) -> NotionalIntent {
        self.intent
    }

    pub fn leverage(&self) -> Decimal {
        self.leverage
    }

    pub fn safety_ceiling(&self) -> Decimal {
        self.safety_ceiling
    }

    /// Balance committed for one trade, capped by the safety ceiling
    pub fn margin_for(&self, balance: Decimal) -> Decimal {
        if balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let requested = match self.intent {
            NotionalIntent::Fixed(amount) => amount,
            NotionalIntent::Percentage(pct) => balance * pct / dec!(100),
        };
        requested.min(balance * self.safety_ceiling).max(Decimal::ZERO)
    }

    /// Largest leveraged position the balance could ever back
    pub fn max_position_value(&self, balance: Decimal) -> Decimal {
        if balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        balance * self.safety_ceiling * self.leverage
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PositionSizer {
    policy: SizingPolicy,
}

impl PositionSizer {
    pub fn new(policy: SizingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SizingPolicy {
        &self.policy
    }

    pub fn size(&self, balance: Decimal, price: Decimal, precision: SymbolPrecision) -> SizingResult {
        if price <= Decimal::ZERO {
            return SizingResult::rejected(SizingRejection::InvalidPrice, Decimal::ZERO);
        }
        if precision.step_size <= Decimal::ZERO {
            return SizingResult::rejected(SizingRejection::InvalidPrecision, Decimal::ZERO);
        }

        let margin = self.policy.margin_for(balance);
        if margin <= Decimal::ZERO {
            return SizingResult::rejected(SizingRejection::InsufficientBalance, margin);
        }

        // overflow on a degenerate step size is a rejection, not a panic
        let quantity = margin
            .checked_mul(self.policy.leverage)
            .and_then(|notional| notional.checked_div(price))
            .and_then(|raw| raw.checked_div(precision.step_size))
            .and_then(|steps| steps.floor().checked_mul(precision.step_size));
        let Some(quantity) = quantity.map(|q| q.normalize()) else {
            return SizingResult::rejected(SizingRejection::InvalidPrecision, margin);
        };
        if quantity <= Decimal::ZERO {
            return SizingResult::rejected(SizingRejection::ZeroQuantity, margin);
        }

        let notional = quantity * price;
        if notional < precision.min_notional {
            return SizingResult::rejected(SizingRejection::BelowMinNotional, margin);
        }

        SizingResult {
            quantity,
            notional,
            margin,
            rejected: false,
            rejection_reason: None,
        }
    }
}
