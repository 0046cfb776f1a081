//! Engine configuration
//!
//! Loaded once at startup, validated, and immutable for the engine's lifetime.
//! Every threshold the pipeline uses lives here; nothing is read from the
//! environment after [`EngineConfig::into_validated`] succeeds.

use crate::error::{EngineError, Result};
use crate::sizing::{NotionalIntent, SizingPolicy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Instrument this engine instance trades
    pub symbol: String,

    /// Asset the account balance is denominated in
    pub quote_asset: String,

    /// Decision cadence
    pub tick_interval_ms: u64,

    /// Upper bound on any single collaborator call
    pub collaborator_timeout_ms: u64,

    /// Candle period requested from the market-data collaborator
    pub candle_interval_secs: u64,

    /// Rolling trade-price buffer size
    pub price_history_capacity: usize,

    pub momentum: MomentumConfig,
    pub pvsra: PvsraConfig,
    pub blend: BlendConfig,
    pub gate: GateConfig,
    pub sizing: SizingConfig,
    pub exits: ExitConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    /// Number of buffered prices the change is measured across (K)
    pub window: usize,

    /// Moves smaller than this fraction are Flat
    pub min_price_change: f64,

    /// Fractional move that maps to full strength (0.01 = 1%)
    pub normalization_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvsraConfig {
    /// Prior candles averaged for the volume baseline
    pub lookback: usize,
    pub climax_multiplier: f64,
    pub rising_multiplier: f64,

    /// Minimum body/range ratio for each condition
    pub climax_body_ratio: f64,
    pub rising_body_ratio: f64,

    /// Fractional distance from a prior extreme that still counts as touching it
    pub extrema_tolerance: f64,

    /// Rolling candle buffer size
    pub candle_capacity: usize,

    /// Alerts retained by the decision loop
    pub alert_history: usize,

    /// Closed candles older than this carry no directional weight
    pub max_candle_age_secs: u64,

    /// Candles inspected by the pattern scan
    pub pattern_window: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// PVSRA share of the blended confidence; momentum gets the remainder
    pub pvsra_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum blended confidence to approve (0-1]
    pub min_confidence: f64,

    /// Minimum time between approvals for the same symbol
    pub cooldown_secs: u64,

    pub allow_multiple_positions: bool,

    /// Reject whenever the PVSRA condition is Normal
    pub require_pvsra_confirmation: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingMode {
    Fixed,
    Percentage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub mode: SizingMode,

    /// Quote amount committed per trade in fixed mode (before leverage)
    pub fixed_amount: Decimal,

    /// Percent of available balance committed per trade in percentage mode
    pub percentage: Option<Decimal>,

    pub leverage: u32,

    /// Largest fraction of balance a single trade may commit
    pub safety_ceiling: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    /// Unrealised gain (fraction) that flags take-profit on an open position
    pub profit_threshold: f64,

    /// Unrealised loss (fraction) that flags stop-loss on an open position
    pub stop_loss_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "SUIUSDT".to_string(),
            quote_asset: "USDT".to_string(),
            tick_interval_ms: 2_000,
            collaborator_timeout_ms: 3_000,
            candle_interval_secs: 300, // 5m candles
            price_history_capacity: 50,
            momentum: MomentumConfig::default(),
            pvsra: PvsraConfig::default(),
            blend: BlendConfig::default(),
            gate: GateConfig::default(),
            sizing: SizingConfig::default(),
            exits: ExitConfig::default(),
        }
    }
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            window: 5,
            min_price_change: 0.0003,   // 0.03%
            normalization_factor: 0.01, // 1% move = full strength
        }
    }
}

impl Default for PvsraConfig {
    fn default() -> Self {
        Self {
            lookback: 10,
            climax_multiplier: 2.0,
            rising_multiplier: 1.5,
            climax_body_ratio: 0.30,
            rising_body_ratio: 0.20,
            extrema_tolerance: 0.001, // 0.1%
            candle_capacity: 50,
            alert_history: 20,
            max_candle_age_secs: 300,
            pattern_window: 5,
        }
    }
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self { pvsra_weight: 0.7 }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.60,
            cooldown_secs: 30,
            allow_multiple_positions: false,
            require_pvsra_confirmation: false,
        }
    }
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            mode: SizingMode::Fixed,
            fixed_amount: dec!(10),
            percentage: None,
            leverage: 5,
            safety_ceiling: dec!(0.9),
        }
    }
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            profit_threshold: 0.002,
            stop_loss_threshold: 0.001,
        }
    }
}

/// Non-fatal issue found during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Percentage outside (0, 100]; the engine sizes with the fixed amount instead
    PercentageFallback { requested: Decimal },
}

/// Configuration that passed startup validation
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    config: EngineConfig,
    sizing: SizingPolicy,
    warnings: Vec<ConfigWarning>,
}

impl ValidatedConfig {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sizing(&self) -> &SizingPolicy {
        &self.sizing
    }

    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_ms)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.config.collaborator_timeout_ms)
    }

    pub fn candle_interval(&self) -> Duration {
        Duration::from_secs(self.config.candle_interval_secs)
    }
}

impl EngineConfig {
    /// Check every bound and resolve the sizing rule
    ///
    /// Any hard violation is returned as [`EngineError::Configuration`]; the
    /// only soft case is an out-of-range percentage, which degrades to fixed
    /// sizing and is reported through [`ValidatedConfig::warnings`].
    pub fn into_validated(self) -> Result<ValidatedConfig> {
        fn ensure(condition: bool, message: &str) -> Result<()> {
            if condition {
                Ok(())
            } else {
                Err(EngineError::configuration(message))
            }
        }

        ensure(!self.symbol.trim().is_empty(), "symbol must not be empty")?;
        ensure(self.tick_interval_ms > 0, "tick_interval_ms must be positive")?;
        ensure(
            self.collaborator_timeout_ms > 0,
            "collaborator_timeout_ms must be positive",
        )?;
        ensure(
            self.candle_interval_secs > 0,
            "candle_interval_secs must be positive",
        )?;

        let m = &self.momentum;
        ensure(m.window >= 2, "momentum.window must be at least 2")?;
        ensure(
            m.min_price_change >= 0.0 && m.min_price_change.is_finite(),
            "momentum.min_price_change must be a non-negative number",
        )?;
        ensure(
            m.normalization_factor > 0.0 && m.normalization_factor.is_finite(),
            "momentum.normalization_factor must be positive",
        )?;
        ensure(
            self.price_history_capacity >= m.window,
            "price_history_capacity must hold at least momentum.window prices",
        )?;

        let p = &self.pvsra;
        ensure(p.lookback > 0, "pvsra.lookback must be positive")?;
        ensure(
            p.rising_multiplier > 0.0 && p.rising_multiplier <= p.climax_multiplier,
            "pvsra multipliers must satisfy 0 < rising_multiplier <= climax_multiplier",
        )?;
        ensure(
            (0.0..=1.0).contains(&p.climax_body_ratio) && (0.0..=1.0).contains(&p.rising_body_ratio),
            "pvsra body ratios must be within [0, 1]",
        )?;
        ensure(
            p.extrema_tolerance >= 0.0 && p.extrema_tolerance < 1.0,
            "pvsra.extrema_tolerance must be within [0, 1)",
        )?;
        ensure(
            p.candle_capacity > p.lookback,
            "pvsra.candle_capacity must hold at least lookback + 1 candles",
        )?;
        ensure(p.pattern_window > 0, "pvsra.pattern_window must be positive")?;

        ensure(
            (0.0..=1.0).contains(&self.blend.pvsra_weight),
            "blend.pvsra_weight must be within [0, 1]",
        )?;

        ensure(
            self.gate.min_confidence > 0.0 && self.gate.min_confidence <= 1.0,
            "gate.min_confidence must be within (0, 1]",
        )?;

        ensure(
            self.exits.profit_threshold > 0.0 && self.exits.stop_loss_threshold > 0.0,
            "exit thresholds must be positive",
        )?;

        let sizing = self.resolve_sizing()?;
        let mut warnings = Vec::new();
        let policy = match sizing {
            Ok(policy) => policy,
            Err((policy, warning)) => {
                warn!(?warning, "Invalid percentage sizing, falling back to fixed amount");
                warnings.push(warning);
                policy
            }
        };

        Ok(ValidatedConfig {
            config: self,
            sizing: policy,
            warnings,
        })
    }

    /// Inner `Err` carries the fixed-mode fallback and the warning explaining it
    fn resolve_sizing(
        &self,
    ) -> Result<std::result::Result<SizingPolicy, (SizingPolicy, ConfigWarning)>> {
        let s = &self.sizing;
        if s.leverage == 0 {
            return Err(EngineError::configuration("sizing.leverage must be at least 1"));
        }
        if s.safety_ceiling <= Decimal::ZERO || s.safety_ceiling > Decimal::ONE {
            return Err(EngineError::configuration(
                "sizing.safety_ceiling must be within (0, 1]",
            ));
        }
        if s.fixed_amount <= Decimal::ZERO {
            return Err(EngineError::configuration("sizing.fixed_amount must be positive"));
        }

        let leverage = Decimal::from(s.leverage);
        let fixed = SizingPolicy::new(
            NotionalIntent::Fixed(s.fixed_amount),
            leverage,
            s.safety_ceiling,
        );

        match (s.mode, s.percentage) {
            (SizingMode::Fixed, None) => Ok(Ok(fixed)),
            (SizingMode::Fixed, Some(_)) => Err(EngineError::configuration(
                "sizing.percentage is set but sizing.mode is \"fixed\"",
            )),
            (SizingMode::Percentage, None) => Err(EngineError::configuration(
                "sizing.mode is \"percentage\" but sizing.percentage is missing",
            )),
            (SizingMode::Percentage, Some(pct)) => {
                if pct > Decimal::ZERO && pct <= dec!(100) {
                    Ok(Ok(SizingPolicy::new(
                        NotionalIntent::Percentage(pct),
                        leverage,
                        s.safety_ceiling,
                    )))
                } else {
                    Ok(Err((fixed, ConfigWarning::PercentageFallback { requested: pct })))
                }
            }
        }
    }
}

impl strategy_shared::StrategyConfig for EngineConfig {
    type Validated = ValidatedConfig;

    fn validate(self) -> anyhow::Result<ValidatedConfig> {
        Ok(self.into_validated()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let validated = EngineConfig::default().into_validated().unwrap();
        assert!(validated.warnings().is_empty());
        assert_eq!(validated.tick_interval(), Duration::from_secs(2));
        assert_eq!(
            validated.sizing().intent(),
            NotionalIntent::Fixed(dec!(10))
        );
    }

    #[test]
    fn test_out_of_range_percentage_falls_back_to_fixed() {
        let mut config = EngineConfig::default();
        config.sizing.mode = SizingMode::Percentage;
        config.sizing.percentage = Some(dec!(150));

        let validated = config.into_validated().unwrap();
        assert_eq!(validated.sizing().intent(), NotionalIntent::Fixed(dec!(10)));
        assert_eq!(
            validated.warnings(),
            &[ConfigWarning::PercentageFallback {
                requested: dec!(150)
            }]
        );
    }

    #[test]
    fn test_zero_percentage_falls_back() {
        let mut config = EngineConfig::default();
        config.sizing.mode = SizingMode::Percentage;
        config.sizing.percentage = Some(dec!(0));

        let validated = config.into_validated().unwrap();
        assert_eq!(validated.warnings().len(), 1);
    }

    #[test]
    fn test_valid_percentage_mode() {
        let mut config = EngineConfig::default();
        config.sizing.mode = SizingMode::Percentage;
        config.sizing.percentage = Some(dec!(100));

        let validated = config.into_validated().unwrap();
        assert_eq!(
            validated.sizing().intent(),
            NotionalIntent::Percentage(dec!(100))
        );
    }

    #[test]
    fn test_conflicting_sizing_is_fatal() {
        let mut config = EngineConfig::default();
        config.sizing.percentage = Some(dec!(5));
        assert!(matches!(
            config.into_validated(),
            Err(EngineError::Configuration { .. })
        ));

        let mut config = EngineConfig::default();
        config.sizing.mode = SizingMode::Percentage;
        assert!(config.into_validated().is_err());
    }

    #[test]
    fn test_hard_bounds_rejected() {
        let cases: Vec<fn(&mut EngineConfig)> = vec![
            |c| c.gate.min_confidence = 0.0,
            |c| c.gate.min_confidence = 1.5,
            |c| c.blend.pvsra_weight = 1.2,
            |c| c.momentum.window = 1,
            |c| c.momentum.normalization_factor = 0.0,
            |c| c.pvsra.rising_multiplier = 3.0,
            |c| c.pvsra.candle_capacity = 10,
            |c| c.sizing.leverage = 0,
            |c| c.sizing.safety_ceiling = dec!(1.5),
            |c| c.tick_interval_ms = 0,
        ];

        for mutate in cases {
            let mut config = EngineConfig::default();
            mutate(&mut config);
            assert!(config.into_validated().is_err());
        }
    }

    #[test]
    fn test_parse_from_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            symbol = "BTCUSDT"

            [gate]
            cooldown_secs = 60

            [sizing]
            mode = "percentage"
            percentage = 5
            leverage = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.symbol, "BTCUSDT");
        assert_eq!(config.gate.cooldown_secs, 60);
        assert_eq!(config.gate.min_confidence, 0.60);
        assert_eq!(config.sizing.leverage, 20);
        assert_eq!(config.momentum, MomentumConfig::default());

        let validated = config.into_validated().unwrap();
        assert_eq!(
            validated.sizing().intent(),
            NotionalIntent::Percentage(dec!(5))
        );
    }

    #[test]
    fn test_sample_config_loads_through_shared_loader() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../configs/pvsra_momentum.toml");
        let validated =
            strategy_shared::load_validated_config(&path, EngineConfig::default()).unwrap();

        assert_eq!(validated.symbol(), "SUIUSDT");
        assert_eq!(validated.config().gate, GateConfig::default());
        assert_eq!(validated.config().pvsra.lookback, 10);
        assert_eq!(validated.sizing().intent(), NotionalIntent::Fixed(dec!(10)));
    }

    #[test]
    fn test_unparseable_config_is_startup_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gate]\nmin_confidence = \"high\"").unwrap();

        let error = strategy_shared::load_validated_config(file.path(), EngineConfig::default()).unwrap_err();
        assert!(format!("{error:#}").contains("Failed to parse config file"));
    }
}
