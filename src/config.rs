use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Current detector config schema, carried into signal params snapshots.
pub const DETECTOR_CONFIG_VERSION: u32 = 1;

/// Per-venue fee rates plus flat costs applied to every simulated fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// CEX taker fee rate.
    pub cex: f64,
    /// DEX pool fee rate.
    pub dex: f64,
    /// Flat gas cost per trade in quote units, independent of size.
    pub gas: f64,
    /// Slippage rate, charged on the higher of the two venue prices.
    pub slippage: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            cex: 0.001,     // 10 bps taker
            dex: 0.003,     // 30 bps pool tier
            gas: 15.0,      // flat, in quote units
            slippage: 0.002,
        }
    }
}

/// Detector thresholds and sizing.
///
/// Construct via `default()` or `with_overrides` so every instance has
/// passed validation. There is no merge of loose key/value maps; every
/// override is a named field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub version: u32,
    /// Minimum absolute spread in quote units.
    pub price_threshold: f64,
    /// Minimum absolute z-score.
    pub z_score_threshold: f64,
    /// Minimum combined venue volume for a point to qualify.
    pub volume_min: f64,
    /// Upper bound on simulated fill size in base units.
    pub size_cap: f64,
    pub fees: FeeSchedule,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            version: DETECTOR_CONFIG_VERSION,
            price_threshold: 0.8,
            z_score_threshold: 2.0,
            volume_min: 1000.0,
            size_cap: 5000.0,
            fees: FeeSchedule::default(),
        }
    }
}

/// Named optional overrides applied on top of the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorOverrides {
    pub price_threshold: Option<f64>,
    pub z_score_threshold: Option<f64>,
    pub volume_min: Option<f64>,
    pub size_cap: Option<f64>,
    pub cex_fee: Option<f64>,
    pub dex_fee: Option<f64>,
    pub gas_fee: Option<f64>,
    pub slippage: Option<f64>,
}

impl DetectorConfig {
    /// Defaults plus the given overrides, validated before use.
    pub fn with_overrides(overrides: DetectorOverrides) -> Result<Self, EngineError> {
        let mut config = Self::default();
        if let Some(v) = overrides.price_threshold {
            config.price_threshold = v;
        }
        if let Some(v) = overrides.z_score_threshold {
            config.z_score_threshold = v;
        }
        if let Some(v) = overrides.volume_min {
            config.volume_min = v;
        }
        if let Some(v) = overrides.size_cap {
            config.size_cap = v;
        }
        if let Some(v) = overrides.cex_fee {
            config.fees.cex = v;
        }
        if let Some(v) = overrides.dex_fee {
            config.fees.dex = v;
        }
        if let Some(v) = overrides.gas_fee {
            config.fees.gas = v;
        }
        if let Some(v) = overrides.slippage {
            config.fees.slippage = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        fn require(ok: bool, message: String) -> Result<(), EngineError> {
            if ok {
                Ok(())
            } else {
                Err(EngineError::InvalidConfig(message))
            }
        }

        require(
            self.price_threshold.is_finite() && self.price_threshold >= 0.0,
            format!("price_threshold must be >= 0, got {}", self.price_threshold),
        )?;
        require(
            self.z_score_threshold.is_finite() && self.z_score_threshold >= 0.0,
            format!(
                "z_score_threshold must be >= 0, got {}",
                self.z_score_threshold
            ),
        )?;
        require(
            self.volume_min.is_finite() && self.volume_min >= 0.0,
            format!("volume_min must be >= 0, got {}", self.volume_min),
        )?;
        require(
            self.size_cap.is_finite() && self.size_cap > 0.0,
            format!("size_cap must be > 0, got {}", self.size_cap),
        )?;
        for (name, rate) in [
            ("fees.cex", self.fees.cex),
            ("fees.dex", self.fees.dex),
            ("fees.slippage", self.fees.slippage),
        ] {
            require(
                rate.is_finite() && (0.0..1.0).contains(&rate),
                format!("{} must be a rate in [0, 1), got {}", name, rate),
            )?;
        }
        require(
            self.fees.gas.is_finite() && self.fees.gas >= 0.0,
            format!("fees.gas must be >= 0, got {}", self.fees.gas),
        )?;
        Ok(())
    }
}

/// Process-level configuration sourced from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub dataset_path: String,
    pub candle_file_path: Option<String>,
    pub zscore_window: usize,
    pub task_timeout_secs: u64,
    pub initial_capital: f64,
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let dataset_path = std::env::var("ARBSCOPE_DATASET")
            .unwrap_or_else(|_| "./data/processed_data.json".to_string());

        let candle_file_path = std::env::var("ARBSCOPE_CANDLE_FILE").ok();

        let zscore_window = std::env::var("ARBSCOPE_ZSCORE_WINDOW")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);

        let task_timeout_secs = std::env::var("ARBSCOPE_TASK_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let initial_capital = std::env::var("ARBSCOPE_INITIAL_CAPITAL")
            .unwrap_or_else(|_| "100000".to_string())
            .parse()
            .unwrap_or(100_000.0);

        Ok(Self {
            dataset_path,
            candle_file_path,
            zscore_window,
            task_timeout_secs,
            initial_capital,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_overrides_apply_by_name() {
        let config = DetectorConfig::with_overrides(DetectorOverrides {
            price_threshold: Some(1.5),
            gas_fee: Some(20.0),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.price_threshold, 1.5);
        assert_eq!(config.fees.gas, 20.0);
        // Untouched fields keep their defaults
        assert_eq!(config.z_score_threshold, 2.0);
        assert_eq!(config.fees.cex, 0.001);
    }

    #[test]
    fn test_out_of_range_override_fails_construction() {
        let err = DetectorConfig::with_overrides(DetectorOverrides {
            slippage: Some(1.2),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));

        let err = DetectorConfig::with_overrides(DetectorOverrides {
            size_cap: Some(0.0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let err = DetectorConfig::with_overrides(DetectorOverrides {
            price_threshold: Some(f64::NAN),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
