//! Session configuration.
//!
//! A `PluginConfig` can be built with [`PluginConfig::default`] or loaded from
//! JSON, where every field is optional:
//!
//! ```json
//! {
//!   "ephemeris_step": 10.0,
//!   "history_step": 10.0,
//!   "vessel_step": 1.0,
//!   "prediction_length": 3600.0,
//!   "prediction_length_tolerance": 1.0,
//!   "prediction_speed_tolerance": 1.0,
//!   "max_adaptive_steps": 100000
//! }
//! ```

use crate::error::{require_positive, PluginError, PluginResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EPHEMERIS_STEP_S: f64 = 10.0;
pub const DEFAULT_HISTORY_STEP_S: f64 = 10.0;
pub const DEFAULT_VESSEL_STEP_S: f64 = 1.0;
pub const DEFAULT_PREDICTION_LENGTH_S: f64 = 3600.0;
pub const DEFAULT_LENGTH_TOLERANCE_M: f64 = 1.0;
pub const DEFAULT_SPEED_TOLERANCE_M_PER_S: f64 = 1.0;
pub const DEFAULT_MAX_ADAPTIVE_STEPS: u32 = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub ephemeris_step: f64,   // grid spacing of the massive bodies' trajectories
    pub history_step: f64,     // grid spacing of vessel histories
    pub vessel_step: f64,      // largest fixed step when prolonging a vessel
    pub prediction_length: f64,
    pub prediction_length_tolerance: f64,
    pub prediction_speed_tolerance: f64,
    pub max_adaptive_steps: u32, // step budget of one adaptive integration
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            ephemeris_step: DEFAULT_EPHEMERIS_STEP_S,
            history_step: DEFAULT_HISTORY_STEP_S,
            vessel_step: DEFAULT_VESSEL_STEP_S,
            prediction_length: DEFAULT_PREDICTION_LENGTH_S,
            prediction_length_tolerance: DEFAULT_LENGTH_TOLERANCE_M,
            prediction_speed_tolerance: DEFAULT_SPEED_TOLERANCE_M_PER_S,
            max_adaptive_steps: DEFAULT_MAX_ADAPTIVE_STEPS,
        }
    }
}

impl PluginConfig {
    pub fn from_json_str(json: &str) -> PluginResult<Self> {
        let config: PluginConfig = serde_json::from_str(json)
            .map_err(|e| PluginError::malformed("configuration", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PluginResult<()> {
        require_positive("ephemeris_step", self.ephemeris_step)?;
        require_positive("history_step", self.history_step)?;
        require_positive("vessel_step", self.vessel_step)?;
        require_positive("prediction_length", self.prediction_length)?;
        require_positive("prediction_length_tolerance", self.prediction_length_tolerance)?;
        require_positive("prediction_speed_tolerance", self.prediction_speed_tolerance)?;
        if self.max_adaptive_steps == 0 {
            return Err(PluginError::invalid("max_adaptive_steps", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PluginConfig::from_json_str(r#"{"history_step": 5.0}"#).unwrap();
        assert_eq!(config.history_step, 5.0);
        assert_eq!(config.ephemeris_step, DEFAULT_EPHEMERIS_STEP_S);
        assert_eq!(config.max_adaptive_steps, DEFAULT_MAX_ADAPTIVE_STEPS);
    }

    #[test]
    fn test_non_positive_step_rejected() {
        let result = PluginConfig::from_json_str(r#"{"vessel_step": 0.0}"#);
        assert!(matches!(result, Err(PluginError::InvalidParameter { field: "vessel_step", .. })));
    }

    #[test]
    fn test_garbage_json_is_malformed() {
        assert!(matches!(
            PluginConfig::from_json_str("{not json"),
            Err(PluginError::MalformedInput { .. })
        ));
    }
}
