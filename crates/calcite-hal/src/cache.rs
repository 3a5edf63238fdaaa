//! Hysteresis caches that decide whether a commanded value reaches the bus.
//!
//! Each cache remembers the last value that was actually *forwarded* to the
//! hardware (never the last value requested) together with a per-instance
//! change threshold.  The [`CachedOutput`] trait carries the shared
//! write-through logic; the caching wrappers compose one cache per cached
//! output instead of inheriting it.
//!
//! | Cache | Initial state | Boundary rules |
//! |---|---|---|
//! | [`PowerCache`] | `0.0` (at rest) | forces `0.0`, `>= 1.0`, `<= -1.0` through |
//! | [`TargetPositionCache`] | `0.0` | none |
//! | [`PositionCache`] | unset | forces first write, `<= 0.0`, `>= 1.0` through |

use std::fmt::Debug;

use calcite_types::HalError;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Default threshold for motor and continuous-rotation servo power.
pub const DEFAULT_MOTOR_THRESHOLD: f64 = 0.02;

/// Default threshold for servo position.
pub const DEFAULT_SERVO_THRESHOLD: f64 = 0.01;

/// What happens to the cached value when the forwarded write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFailurePolicy {
    /// Record the value only after the handle accepted it.  A failed write
    /// leaves the cache untouched, so the same command is retried next cycle.
    #[default]
    Rollback,
    /// Record the value before calling the handle.  A failed write leaves
    /// the cache holding a value the hardware never received.
    Optimistic,
}

/// A cached output: the hysteresis predicate plus the last forwarded value.
pub trait CachedOutput {
    /// Value type accepted by the guarded setter.
    type Value: Copy + Debug;

    /// Name of the guarded output, used in log events.
    const OUTPUT: &'static str;

    fn change_threshold(&self) -> f64;

    /// Replace the threshold; applies from the next write.
    fn set_change_threshold(&mut self, threshold: f64);

    fn policy(&self) -> WriteFailurePolicy;

    fn set_policy(&mut self, policy: WriteFailurePolicy);

    /// The hysteresis predicate: `true` if `value` must be forwarded.
    fn should_write(&self, value: Self::Value) -> bool;

    /// Remember `value` as the last forwarded value.
    fn record(&mut self, value: Self::Value);

    /// Forward `value` through `write` if [`should_write`][Self::should_write]
    /// holds.  Returns whether a write was issued.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `write`, unchanged.
    fn write_through<F>(&mut self, value: Self::Value, write: F) -> Result<bool, HalError>
    where
        F: FnOnce(Self::Value) -> Result<(), HalError>,
    {
        if !self.should_write(value) {
            return Ok(false);
        }
        self.force_through(value, write)?;
        Ok(true)
    }

    /// Forward `value` through `write` unconditionally, updating the cache
    /// according to [`policy`][Self::policy].
    ///
    /// # Errors
    ///
    /// Returns the error produced by `write`, unchanged.
    fn force_through<F>(&mut self, value: Self::Value, write: F) -> Result<(), HalError>
    where
        F: FnOnce(Self::Value) -> Result<(), HalError>,
    {
        trace!(output = Self::OUTPUT, value = ?value, "forwarding write");
        let policy = self.policy();
        if policy == WriteFailurePolicy::Optimistic {
            self.record(value);
        }
        match write(value) {
            Ok(()) => {
                if policy == WriteFailurePolicy::Rollback {
                    self.record(value);
                }
                Ok(())
            }
            Err(e) => {
                warn!(output = Self::OUTPUT, value = ?value, policy = ?policy, error = %e, "forwarded write failed");
                Err(e)
            }
        }
    }
}

// Thresholds must be non-negative; NaN collapses to 0.0 as well.
fn sanitize_threshold(output: &'static str, threshold: f64) -> f64 {
    if threshold >= 0.0 {
        threshold
    } else {
        warn!(output, threshold, "change threshold must be >= 0; using 0.0");
        0.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Power
// ────────────────────────────────────────────────────────────────────────────

/// Cache for a signed power command in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerCache {
    last_written: f64,
    threshold: f64,
    policy: WriteFailurePolicy,
}

impl PowerCache {
    pub fn new(threshold: f64) -> Self {
        Self {
            last_written: 0.0,
            threshold: sanitize_threshold(Self::OUTPUT, threshold),
            policy: WriteFailurePolicy::default(),
        }
    }

    /// Last power forwarded to the hardware; `0.0` before the first write.
    pub fn last_written(&self) -> f64 {
        self.last_written
    }
}

impl Default for PowerCache {
    fn default() -> Self {
        Self::new(DEFAULT_MOTOR_THRESHOLD)
    }
}

impl CachedOutput for PowerCache {
    type Value = f64;
    const OUTPUT: &'static str = "power";

    fn change_threshold(&self) -> f64 {
        self.threshold
    }

    fn set_change_threshold(&mut self, threshold: f64) {
        self.threshold = sanitize_threshold(Self::OUTPUT, threshold);
    }

    fn policy(&self) -> WriteFailurePolicy {
        self.policy
    }

    fn set_policy(&mut self, policy: WriteFailurePolicy) {
        self.policy = policy;
    }

    fn should_write(&self, power: f64) -> bool {
        let cached = self.last_written;
        (power - cached).abs() >= self.threshold
            || (power == 0.0 && cached != 0.0)
            || (power >= 1.0 && cached < 1.0)
            || (power <= -1.0 && cached > -1.0)
    }

    fn record(&mut self, power: f64) {
        self.last_written = power;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Target position
// ────────────────────────────────────────────────────────────────────────────

/// Cache for an integer encoder target.
///
/// Targets are open-ended, so only the magnitude test applies.  With any
/// threshold below `1.0` every distinct target is forwarded and only a
/// repeated identical target is suppressed.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetPositionCache {
    last_written: f64,
    threshold: f64,
    policy: WriteFailurePolicy,
}

impl TargetPositionCache {
    pub fn new(threshold: f64) -> Self {
        Self {
            last_written: 0.0,
            threshold: sanitize_threshold(Self::OUTPUT, threshold),
            policy: WriteFailurePolicy::default(),
        }
    }

    pub fn last_written(&self) -> f64 {
        self.last_written
    }
}

impl Default for TargetPositionCache {
    fn default() -> Self {
        Self::new(DEFAULT_MOTOR_THRESHOLD)
    }
}

impl CachedOutput for TargetPositionCache {
    type Value = i32;
    const OUTPUT: &'static str = "target_position";

    fn change_threshold(&self) -> f64 {
        self.threshold
    }

    fn set_change_threshold(&mut self, threshold: f64) {
        self.threshold = sanitize_threshold(Self::OUTPUT, threshold);
    }

    fn policy(&self) -> WriteFailurePolicy {
        self.policy
    }

    fn set_policy(&mut self, policy: WriteFailurePolicy) {
        self.policy = policy;
    }

    fn should_write(&self, position: i32) -> bool {
        (f64::from(position) - self.last_written).abs() >= self.threshold
    }

    fn record(&mut self, position: i32) {
        self.last_written = f64::from(position);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Servo position
// ────────────────────────────────────────────────────────────────────────────

/// Cache for a normalized servo position in `[0.0, 1.0]`.
///
/// Starts unset so the very first command always reaches the servo.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionCache {
    last_written: Option<f64>,
    threshold: f64,
    policy: WriteFailurePolicy,
}

impl PositionCache {
    pub fn new(threshold: f64) -> Self {
        Self {
            last_written: None,
            threshold: sanitize_threshold(Self::OUTPUT, threshold),
            policy: WriteFailurePolicy::default(),
        }
    }

    /// Last position forwarded to the servo, `None` if nothing has been
    /// forwarded yet.
    pub fn last_written(&self) -> Option<f64> {
        self.last_written
    }
}

impl Default for PositionCache {
    fn default() -> Self {
        Self::new(DEFAULT_SERVO_THRESHOLD)
    }
}

impl CachedOutput for PositionCache {
    type Value = f64;
    const OUTPUT: &'static str = "servo_position";

    fn change_threshold(&self) -> f64 {
        self.threshold
    }

    fn set_change_threshold(&mut self, threshold: f64) {
        self.threshold = sanitize_threshold(Self::OUTPUT, threshold);
    }

    fn policy(&self) -> WriteFailurePolicy {
        self.policy
    }

    fn set_policy(&mut self, policy: WriteFailurePolicy) {
        self.policy = policy;
    }

    fn should_write(&self, position: f64) -> bool {
        match self.last_written {
            None => true,
            Some(cached) => {
                (position - cached).abs() >= self.threshold
                    || (position <= 0.0 && cached > 0.0)
                    || (position >= 1.0 && cached < 1.0)
            }
        }
    }

    fn record(&mut self, position: f64) {
        self.last_written = Some(position);
    }
}
