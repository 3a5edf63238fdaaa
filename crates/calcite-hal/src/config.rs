//! Cache configuration – thresholds and write-failure policy, read from TOML.
//!
//! ```toml
//! motor_threshold = 0.02
//! servo_threshold = 0.01
//! cr_servo_threshold = 0.02
//! write_failure = "rollback"
//! ```
//!
//! Every field is optional; missing fields take the defaults shown above.

use std::fs;
use std::path::Path;

use calcite_types::HalError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{DEFAULT_MOTOR_THRESHOLD, DEFAULT_SERVO_THRESHOLD, WriteFailurePolicy};

/// Construction-time settings for the caching wrappers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Change threshold for motor power and target position.
    #[serde(default = "default_motor_threshold")]
    pub motor_threshold: f64,

    /// Change threshold for servo position.
    #[serde(default = "default_servo_threshold")]
    pub servo_threshold: f64,

    /// Change threshold for continuous-rotation servo power.
    #[serde(default = "default_motor_threshold")]
    pub cr_servo_threshold: f64,

    #[serde(default)]
    pub write_failure: WriteFailurePolicy,
}

fn default_motor_threshold() -> f64 {
    DEFAULT_MOTOR_THRESHOLD
}
fn default_servo_threshold() -> f64 {
    DEFAULT_SERVO_THRESHOLD
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            motor_threshold: default_motor_threshold(),
            servo_threshold: default_servo_threshold(),
            cr_servo_threshold: default_motor_threshold(),
            write_failure: WriteFailurePolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::Config`] if the document does not parse or a
    /// threshold is invalid.
    pub fn from_toml_str(raw: &str) -> Result<Self, HalError> {
        let cfg: CacheConfig = toml::from_str(raw)
            .map_err(|e| HalError::Config(format!("Failed to parse cache config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load the config from `path`, falling back to defaults when the file
    /// does not exist.  `CALCITE_*` environment overrides are applied on top.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::Config`] if the file exists but cannot be read or
    /// parsed, or if the resulting thresholds are invalid.
    pub fn load(path: &Path) -> Result<Self, HalError> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|e| {
                HalError::Config(format!("Failed to read cache config at {}: {}", path.display(), e))
            })?;
            toml::from_str(&raw)
                .map_err(|e| HalError::Config(format!("Failed to parse cache config: {e}")))?
        } else {
            CacheConfig::default()
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write the config to `path` as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<(), HalError> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| HalError::Config(format!("Failed to serialize cache config: {e}")))?;
        fs::write(path, raw).map_err(|e| {
            HalError::Config(format!("Failed to write cache config at {}: {}", path.display(), e))
        })
    }

    /// Apply `CALCITE_*` environment variable overrides.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `CALCITE_MOTOR_THRESHOLD` | `motor_threshold` |
    /// | `CALCITE_SERVO_THRESHOLD` | `servo_threshold` |
    /// | `CALCITE_CR_SERVO_THRESHOLD` | `cr_servo_threshold` |
    /// | `CALCITE_WRITE_FAILURE` | `write_failure` (`rollback` / `optimistic`) |
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(t) = env_f64("CALCITE_MOTOR_THRESHOLD") {
            self.motor_threshold = t;
        }
        if let Some(t) = env_f64("CALCITE_SERVO_THRESHOLD") {
            self.servo_threshold = t;
        }
        if let Some(t) = env_f64("CALCITE_CR_SERVO_THRESHOLD") {
            self.cr_servo_threshold = t;
        }
        if let Ok(v) = std::env::var("CALCITE_WRITE_FAILURE") {
            match v.as_str() {
                "rollback" => self.write_failure = WriteFailurePolicy::Rollback,
                "optimistic" => self.write_failure = WriteFailurePolicy::Optimistic,
                other => warn!(value = other, "ignoring unknown CALCITE_WRITE_FAILURE"),
            }
        }
    }

    /// Check that every threshold is finite and non-negative.
    pub fn validate(&self) -> Result<(), HalError> {
        for (name, value) in [
            ("motor_threshold", self.motor_threshold),
            ("servo_threshold", self.servo_threshold),
            ("cr_servo_threshold", self.cr_servo_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(HalError::Config(format!(
                    "{name} must be a finite value >= 0, got {value}"
                )));
            }
        }
        Ok(())
    }
}

fn env_f64(name: &str) -> Option<f64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring non-numeric threshold override");
            None
        }
    }
}
