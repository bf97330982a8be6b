//! Validation configuration
//!
//! ```toml
//! broadcast_window_multiplier = 3
//! engine_start_tolerance_secs = 10
//! ghg_tracking_model_year = 2022
//! tracking_fail_model_year = 2024
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StepError, StepResult};

/// Thresholds applied by the validation rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Capture window, in multiples of the longest broadcast period
    #[serde(default = "default_multiplier")]
    pub broadcast_window_multiplier: u32,
    /// Allowed difference in DM26 time since engine start
    #[serde(default = "default_tolerance")]
    pub engine_start_tolerance_secs: u64,
    /// First engine model year that must provide GHG tracking arrays
    #[serde(default = "default_ghg_year")]
    pub ghg_tracking_model_year: u16,
    /// First engine model year where missing NOx/technology/hybrid arrays fail
    #[serde(default = "default_fail_year")]
    pub tracking_fail_model_year: u16,
}

fn default_multiplier() -> u32 {
    3
}

fn default_tolerance() -> u64 {
    10
}

fn default_ghg_year() -> u16 {
    2022
}

fn default_fail_year() -> u16 {
    2024
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            broadcast_window_multiplier: default_multiplier(),
            engine_start_tolerance_secs: default_tolerance(),
            ghg_tracking_model_year: default_ghg_year(),
            tracking_fail_model_year: default_fail_year(),
        }
    }
}

impl ValidationConfig {
    pub fn from_toml_str(content: &str) -> StepResult<Self> {
        let config: Self = toml::from_str(content)?;
        if config.broadcast_window_multiplier == 0 {
            return Err(StepError::Config("broadcast_window_multiplier must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> StepResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn engine_start_tolerance(&self) -> Duration {
        Duration::from_secs(self.engine_start_tolerance_secs)
    }

    /// Capture window covering `multiplier` periods of the slowest broadcast
    pub fn broadcast_window(&self, maximum_period: Duration) -> Duration {
        maximum_period * self.broadcast_window_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::from_toml_str("").unwrap();
        assert_eq!(config, ValidationConfig::default());
        assert_eq!(config.engine_start_tolerance(), Duration::from_secs(10));
        assert_eq!(
            config.broadcast_window(Duration::from_millis(1000)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_overrides() {
        let config = ValidationConfig::from_toml_str("tracking_fail_model_year = 2027\nbroadcast_window_multiplier = 2").unwrap();
        assert_eq!(config.tracking_fail_model_year, 2027);
        assert_eq!(config.ghg_tracking_model_year, 2022);
        assert_eq!(config.broadcast_window_multiplier, 2);
    }

    #[test]
    fn test_zero_multiplier_rejected() {
        let err = ValidationConfig::from_toml_str("broadcast_window_multiplier = 0").unwrap_err();
        assert!(matches!(err, StepError::Config(_)));
    }
}
