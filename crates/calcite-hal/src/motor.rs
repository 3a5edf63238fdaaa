//! Caching wrappers for motors.
//!
//! - [`CachingMotorSimple`] guards the power setter with a [`PowerCache`].
//! - [`CachingMotor`] adds a [`TargetPositionCache`] for the encoder target
//!   and passes everything else through.
//! - [`CachingMotorEx`] adds the extended motor surface as plain
//!   pass-through; velocity, PIDF and current calls are configuration or
//!   telemetry, not per-cycle output, so they are never cached.
//!
//! Each wrapper implements the same capability traits as the handle it
//! wraps, so it can stand in for the raw handle in a control loop.  Reads are
//! always forwarded; the device is authoritative for what it actually
//! applied.

use calcite_types::{
    AngleUnit, ControllerInfo, CurrentUnit, Direction, HalError, Manufacturer,
    MotorConfigurationType, PidCoefficients, PidfCoefficients, RunMode, ZeroPowerBehavior,
};

use crate::cache::{
    CachedOutput, DEFAULT_MOTOR_THRESHOLD, PowerCache, TargetPositionCache, WriteFailurePolicy,
};
use crate::config::CacheConfig;
use crate::device::{HardwareDevice, Motor, MotorEx, MotorSimple};

// ────────────────────────────────────────────────────────────────────────────
// CachingMotorSimple
// ────────────────────────────────────────────────────────────────────────────

/// A power-driven output whose writes are filtered by a [`PowerCache`].
///
/// A write is forwarded when the new power differs from the last forwarded
/// power by at least the change threshold, or when it targets rest (`0.0`),
/// full forward (`>= 1.0`) or full reverse (`<= -1.0`) and the cache is not
/// already there.
///
/// Not synchronised: drive each wrapper from a single control-loop thread.
pub struct CachingMotorSimple<M> {
    device: M,
    power: PowerCache,
}

impl<M: MotorSimple> CachingMotorSimple<M> {
    /// Wrap `device` with the default threshold of `0.02`.
    pub fn new(device: M) -> Self {
        Self::with_threshold(device, DEFAULT_MOTOR_THRESHOLD)
    }

    pub fn with_threshold(device: M, change_threshold: f64) -> Self {
        Self {
            device,
            power: PowerCache::new(change_threshold),
        }
    }

    /// Wrap `device` using `cfg.motor_threshold` and `cfg.write_failure`.
    pub fn from_config(device: M, cfg: &CacheConfig) -> Self {
        Self::from_parts(device, cfg.motor_threshold, cfg.write_failure)
    }

    pub(crate) fn from_parts(device: M, change_threshold: f64, policy: WriteFailurePolicy) -> Self {
        let mut wrapper = Self::with_threshold(device, change_threshold);
        wrapper.power.set_policy(policy);
        wrapper
    }

    /// Same as [`MotorSimple::set_power`], returning whether a hardware
    /// write was issued.
    ///
    /// # Errors
    ///
    /// Returns the wrapped handle's error unchanged.
    pub fn set_power_reporting_write(&mut self, power: f64) -> Result<bool, HalError> {
        self.power.write_through(power, |p| self.device.set_power(p))
    }

    /// Forward `power` regardless of the change threshold.
    pub fn force_power(&mut self, power: f64) -> Result<(), HalError> {
        self.power.force_through(power, |p| self.device.set_power(p))
    }

    pub fn change_threshold(&self) -> f64 {
        self.power.change_threshold()
    }

    /// Takes effect on the next power command.  Negative values are treated
    /// as `0.0`.
    pub fn set_change_threshold(&mut self, change_threshold: f64) {
        self.power.set_change_threshold(change_threshold);
    }

    pub fn write_failure_policy(&self) -> WriteFailurePolicy {
        self.power.policy()
    }

    pub fn set_write_failure_policy(&mut self, policy: WriteFailurePolicy) {
        self.power.set_policy(policy);
    }

    /// Last power forwarded to the device (`0.0` before the first write).
    pub fn last_written_power(&self) -> f64 {
        self.power.last_written()
    }

    /// The wrapped handle.
    pub fn inner(&self) -> &M {
        &self.device
    }

    /// Mutable access to the wrapped handle.  Writes made through it bypass
    /// the cache and are not recorded.
    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.device
    }

    pub fn into_inner(self) -> M {
        self.device
    }
}

impl<M: MotorSimple> HardwareDevice for CachingMotorSimple<M> {
    fn manufacturer(&self) -> Manufacturer {
        self.device.manufacturer()
    }

    fn device_name(&self) -> String {
        self.device.device_name()
    }

    fn connection_info(&self) -> String {
        self.device.connection_info()
    }

    fn version(&self) -> u32 {
        self.device.version()
    }

    fn reset_device_configuration(&mut self) -> Result<(), HalError> {
        self.device.reset_device_configuration()
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.device.close()
    }
}

impl<M: MotorSimple> MotorSimple for CachingMotorSimple<M> {
    fn direction(&self) -> Direction {
        self.device.direction()
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError> {
        self.device.set_direction(direction)
    }

    fn power(&self) -> f64 {
        self.device.power()
    }

    fn set_power(&mut self, power: f64) -> Result<(), HalError> {
        self.set_power_reporting_write(power).map(|_| ())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CachingMotor
// ────────────────────────────────────────────────────────────────────────────

/// A positioned motor with cached power and cached target position.
///
/// Both caches share one change threshold.  Integer targets only get the
/// magnitude test, so with the default `0.02` every distinct target is
/// forwarded and only a repeated target is suppressed.
pub struct CachingMotor<M> {
    simple: CachingMotorSimple<M>,
    target: TargetPositionCache,
}

impl<M: Motor> CachingMotor<M> {
    pub fn new(device: M) -> Self {
        Self::with_threshold(device, DEFAULT_MOTOR_THRESHOLD)
    }

    pub fn with_threshold(device: M, change_threshold: f64) -> Self {
        Self {
            simple: CachingMotorSimple::with_threshold(device, change_threshold),
            target: TargetPositionCache::new(change_threshold),
        }
    }

    pub fn from_config(device: M, cfg: &CacheConfig) -> Self {
        let mut target = TargetPositionCache::new(cfg.motor_threshold);
        target.set_policy(cfg.write_failure);
        Self {
            simple: CachingMotorSimple::from_config(device, cfg),
            target,
        }
    }

    /// See [`CachingMotorSimple::set_power_reporting_write`].
    pub fn set_power_reporting_write(&mut self, power: f64) -> Result<bool, HalError> {
        self.simple.set_power_reporting_write(power)
    }

    pub fn force_power(&mut self, power: f64) -> Result<(), HalError> {
        self.simple.force_power(power)
    }

    /// Same as [`Motor::set_target_position`], returning whether a hardware
    /// write was issued.
    ///
    /// # Errors
    ///
    /// Returns the wrapped handle's error unchanged.
    pub fn set_target_position_reporting_write(&mut self, position: i32) -> Result<bool, HalError> {
        let device = self.simple.inner_mut();
        self.target.write_through(position, |p| device.set_target_position(p))
    }

    /// Forward `position` regardless of the change threshold.
    pub fn force_target_position(&mut self, position: i32) -> Result<(), HalError> {
        let device = self.simple.inner_mut();
        self.target.force_through(position, |p| device.set_target_position(p))
    }

    pub fn change_threshold(&self) -> f64 {
        self.simple.change_threshold()
    }

    /// Applies to both power and target position from the next command.
    pub fn set_change_threshold(&mut self, change_threshold: f64) {
        self.simple.set_change_threshold(change_threshold);
        self.target.set_change_threshold(change_threshold);
    }

    pub fn write_failure_policy(&self) -> WriteFailurePolicy {
        self.simple.write_failure_policy()
    }

    pub fn set_write_failure_policy(&mut self, policy: WriteFailurePolicy) {
        self.simple.set_write_failure_policy(policy);
        self.target.set_policy(policy);
    }

    pub fn last_written_power(&self) -> f64 {
        self.simple.last_written_power()
    }

    /// Last target forwarded to the device (`0.0` before the first write).
    pub fn last_written_target_position(&self) -> f64 {
        self.target.last_written()
    }

    pub fn inner(&self) -> &M {
        self.simple.inner()
    }

    /// Writes made through the returned handle bypass both caches.
    pub fn inner_mut(&mut self) -> &mut M {
        self.simple.inner_mut()
    }

    pub fn into_inner(self) -> M {
        self.simple.into_inner()
    }
}

impl<M: Motor> HardwareDevice for CachingMotor<M> {
    fn manufacturer(&self) -> Manufacturer {
        self.simple.manufacturer()
    }

    fn device_name(&self) -> String {
        self.simple.device_name()
    }

    fn connection_info(&self) -> String {
        self.simple.connection_info()
    }

    fn version(&self) -> u32 {
        self.simple.version()
    }

    fn reset_device_configuration(&mut self) -> Result<(), HalError> {
        self.simple.reset_device_configuration()
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.simple.close()
    }
}

impl<M: Motor> MotorSimple for CachingMotor<M> {
    fn direction(&self) -> Direction {
        self.simple.direction()
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError> {
        self.simple.set_direction(direction)
    }

    fn power(&self) -> f64 {
        self.simple.power()
    }

    fn set_power(&mut self, power: f64) -> Result<(), HalError> {
        self.simple.set_power(power)
    }
}

impl<M: Motor> Motor for CachingMotor<M> {
    fn motor_type(&self) -> MotorConfigurationType {
        self.inner().motor_type()
    }

    fn set_motor_type(&mut self, motor_type: MotorConfigurationType) -> Result<(), HalError> {
        self.inner_mut().set_motor_type(motor_type)
    }

    fn controller(&self) -> ControllerInfo {
        self.inner().controller()
    }

    fn port_number(&self) -> u8 {
        self.inner().port_number()
    }

    fn zero_power_behavior(&self) -> ZeroPowerBehavior {
        self.inner().zero_power_behavior()
    }

    fn set_zero_power_behavior(&mut self, behavior: ZeroPowerBehavior) -> Result<(), HalError> {
        self.inner_mut().set_zero_power_behavior(behavior)
    }

    fn set_power_float(&mut self) -> Result<(), HalError> {
        self.inner_mut().set_power_float()
    }

    fn power_float(&self) -> bool {
        self.inner().power_float()
    }

    fn target_position(&self) -> i32 {
        self.inner().target_position()
    }

    fn set_target_position(&mut self, position: i32) -> Result<(), HalError> {
        self.set_target_position_reporting_write(position).map(|_| ())
    }

    fn is_busy(&self) -> bool {
        self.inner().is_busy()
    }

    fn current_position(&self) -> i32 {
        self.inner().current_position()
    }

    fn mode(&self) -> RunMode {
        self.inner().mode()
    }

    fn set_mode(&mut self, mode: RunMode) -> Result<(), HalError> {
        self.inner_mut().set_mode(mode)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CachingMotorEx
// ────────────────────────────────────────────────────────────────────────────

/// An extended motor: cached power and target position as in
/// [`CachingMotor`], everything else passed straight through.
pub struct CachingMotorEx<M> {
    motor: CachingMotor<M>,
}

impl<M: MotorEx> CachingMotorEx<M> {
    pub fn new(device: M) -> Self {
        Self {
            motor: CachingMotor::new(device),
        }
    }

    pub fn with_threshold(device: M, change_threshold: f64) -> Self {
        Self {
            motor: CachingMotor::with_threshold(device, change_threshold),
        }
    }

    pub fn from_config(device: M, cfg: &CacheConfig) -> Self {
        Self {
            motor: CachingMotor::from_config(device, cfg),
        }
    }

    pub fn set_power_reporting_write(&mut self, power: f64) -> Result<bool, HalError> {
        self.motor.set_power_reporting_write(power)
    }

    pub fn force_power(&mut self, power: f64) -> Result<(), HalError> {
        self.motor.force_power(power)
    }

    pub fn set_target_position_reporting_write(&mut self, position: i32) -> Result<bool, HalError> {
        self.motor.set_target_position_reporting_write(position)
    }

    pub fn force_target_position(&mut self, position: i32) -> Result<(), HalError> {
        self.motor.force_target_position(position)
    }

    pub fn change_threshold(&self) -> f64 {
        self.motor.change_threshold()
    }

    pub fn set_change_threshold(&mut self, change_threshold: f64) {
        self.motor.set_change_threshold(change_threshold);
    }

    pub fn write_failure_policy(&self) -> WriteFailurePolicy {
        self.motor.write_failure_policy()
    }

    pub fn set_write_failure_policy(&mut self, policy: WriteFailurePolicy) {
        self.motor.set_write_failure_policy(policy);
    }

    pub fn last_written_power(&self) -> f64 {
        self.motor.last_written_power()
    }

    pub fn last_written_target_position(&self) -> f64 {
        self.motor.last_written_target_position()
    }

    pub fn inner(&self) -> &M {
        self.motor.inner()
    }

    pub fn inner_mut(&mut self) -> &mut M {
        self.motor.inner_mut()
    }

    pub fn into_inner(self) -> M {
        self.motor.into_inner()
    }
}

impl<M: MotorEx> HardwareDevice for CachingMotorEx<M> {
    fn manufacturer(&self) -> Manufacturer {
        self.motor.manufacturer()
    }

    fn device_name(&self) -> String {
        self.motor.device_name()
    }

    fn connection_info(&self) -> String {
        self.motor.connection_info()
    }

    fn version(&self) -> u32 {
        self.motor.version()
    }

    fn reset_device_configuration(&mut self) -> Result<(), HalError> {
        self.motor.reset_device_configuration()
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.motor.close()
    }
}

impl<M: MotorEx> MotorSimple for CachingMotorEx<M> {
    fn direction(&self) -> Direction {
        self.motor.direction()
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError> {
        self.motor.set_direction(direction)
    }

    fn power(&self) -> f64 {
        self.motor.power()
    }

    fn set_power(&mut self, power: f64) -> Result<(), HalError> {
        MotorSimple::set_power(&mut self.motor, power)
    }
}

impl<M: MotorEx> Motor for CachingMotorEx<M> {
    fn motor_type(&self) -> MotorConfigurationType {
        self.motor.motor_type()
    }

    fn set_motor_type(&mut self, motor_type: MotorConfigurationType) -> Result<(), HalError> {
        self.motor.set_motor_type(motor_type)
    }

    fn controller(&self) -> ControllerInfo {
        self.motor.controller()
    }

    fn port_number(&self) -> u8 {
        self.motor.port_number()
    }

    fn zero_power_behavior(&self) -> ZeroPowerBehavior {
        self.motor.zero_power_behavior()
    }

    fn set_zero_power_behavior(&mut self, behavior: ZeroPowerBehavior) -> Result<(), HalError> {
        self.motor.set_zero_power_behavior(behavior)
    }

    fn set_power_float(&mut self) -> Result<(), HalError> {
        self.motor.set_power_float()
    }

    fn power_float(&self) -> bool {
        self.motor.power_float()
    }

    fn target_position(&self) -> i32 {
        self.motor.target_position()
    }

    fn set_target_position(&mut self, position: i32) -> Result<(), HalError> {
        Motor::set_target_position(&mut self.motor, position)
    }

    fn is_busy(&self) -> bool {
        self.motor.is_busy()
    }

    fn current_position(&self) -> i32 {
        self.motor.current_position()
    }

    fn mode(&self) -> RunMode {
        self.motor.mode()
    }

    fn set_mode(&mut self, mode: RunMode) -> Result<(), HalError> {
        self.motor.set_mode(mode)
    }
}

impl<M: MotorEx> MotorEx for CachingMotorEx<M> {
    fn set_motor_enable(&mut self) -> Result<(), HalError> {
        self.inner_mut().set_motor_enable()
    }

    fn set_motor_disable(&mut self) -> Result<(), HalError> {
        self.inner_mut().set_motor_disable()
    }

    fn is_motor_enabled(&self) -> bool {
        self.inner().is_motor_enabled()
    }

    fn set_velocity(&mut self, ticks_per_second: f64) -> Result<(), HalError> {
        self.inner_mut().set_velocity(ticks_per_second)
    }

    fn set_velocity_in(&mut self, angular_rate: f64, unit: AngleUnit) -> Result<(), HalError> {
        self.inner_mut().set_velocity_in(angular_rate, unit)
    }

    fn velocity(&self) -> f64 {
        self.inner().velocity()
    }

    fn velocity_in(&self, unit: AngleUnit) -> f64 {
        self.inner().velocity_in(unit)
    }

    fn set_pid_coefficients(&mut self, mode: RunMode, pid: PidCoefficients) -> Result<(), HalError> {
        self.inner_mut().set_pid_coefficients(mode, pid)
    }

    fn pid_coefficients(&self, mode: RunMode) -> Result<PidCoefficients, HalError> {
        self.inner().pid_coefficients(mode)
    }

    fn set_pidf_coefficients(&mut self, mode: RunMode, pidf: PidfCoefficients) -> Result<(), HalError> {
        self.inner_mut().set_pidf_coefficients(mode, pidf)
    }

    fn pidf_coefficients(&self, mode: RunMode) -> Result<PidfCoefficients, HalError> {
        self.inner().pidf_coefficients(mode)
    }

    fn set_velocity_pidf_coefficients(&mut self, p: f64, i: f64, d: f64, f: f64) -> Result<(), HalError> {
        self.inner_mut().set_velocity_pidf_coefficients(p, i, d, f)
    }

    fn set_position_pidf_coefficients(&mut self, p: f64) -> Result<(), HalError> {
        self.inner_mut().set_position_pidf_coefficients(p)
    }

    fn set_target_position_tolerance(&mut self, tolerance: i32) -> Result<(), HalError> {
        self.inner_mut().set_target_position_tolerance(tolerance)
    }

    fn target_position_tolerance(&self) -> i32 {
        self.inner().target_position_tolerance()
    }

    fn current(&self, unit: CurrentUnit) -> f64 {
        self.inner().current(unit)
    }

    fn current_alert(&self, unit: CurrentUnit) -> f64 {
        self.inner().current_alert(unit)
    }

    fn set_current_alert(&mut self, current: f64, unit: CurrentUnit) -> Result<(), HalError> {
        self.inner_mut().set_current_alert(current, unit)
    }

    fn is_over_current(&self) -> bool {
        self.inner().is_over_current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMotor;

    fn simple() -> (SimMotor, CachingMotorSimple<SimMotor>) {
        let motor = SimMotor::new("drive");
        let cached = CachingMotorSimple::new(motor.clone());
        (motor, cached)
    }

    // ------------------------------------------------------------------
    // Power
    // ------------------------------------------------------------------

    #[test]
    fn sub_threshold_step_from_rest_is_suppressed() {
        let (motor, mut cached) = simple();
        assert!(!cached.set_power_reporting_write(0.01).unwrap());
        assert!(motor.power_writes().is_empty());
        assert_eq!(cached.last_written_power(), 0.0);
        // The read reflects the device, not the request.
        assert_eq!(cached.power(), 0.0);
    }

    #[test]
    fn step_above_threshold_is_forwarded() {
        let (motor, mut cached) = simple();
        assert!(cached.set_power_reporting_write(0.03).unwrap());
        assert_eq!(motor.power_writes(), vec![0.03]);
        assert_eq!(cached.last_written_power(), 0.03);
    }

    #[test]
    fn full_power_is_forced_through_from_near_full() {
        let (motor, mut cached) = simple();
        cached.set_power(0.95).unwrap();
        assert!(cached.set_power_reporting_write(1.0).unwrap());
        assert_eq!(motor.power_writes(), vec![0.95, 1.0]);
        assert_eq!(cached.last_written_power(), 1.0);
    }

    #[test]
    fn full_reverse_is_forced_through_from_near_full_reverse() {
        let (motor, mut cached) = simple();
        cached.set_power(-0.99).unwrap();
        assert!(cached.set_power_reporting_write(-1.0).unwrap());
        assert_eq!(motor.power_writes(), vec![-0.99, -1.0]);
    }

    #[test]
    fn slow_ramp_down_always_reaches_rest() {
        let (motor, mut cached) = simple();
        cached.set_power(0.5).unwrap();
        let mut power = 0.5;
        while power > 0.0 {
            power = (power - 0.005_f64).max(0.0);
            cached.set_power(power).unwrap();
        }
        assert_eq!(motor.power_writes().last().copied(), Some(0.0));
        assert_eq!(motor.power(), 0.0);
    }

    #[test]
    fn setting_zero_forwards_exactly_once() {
        let (motor, mut cached) = simple();
        cached.set_power(0.011).unwrap(); // suppressed, cache still 0.0
        cached.set_power(0.4).unwrap();
        assert!(cached.set_power_reporting_write(0.0).unwrap());
        assert!(!cached.set_power_reporting_write(0.0).unwrap());
        assert_eq!(motor.power_writes(), vec![0.4, 0.0]);
    }

    #[test]
    fn repeated_value_forwards_at_most_once() {
        for value in [0.3, 1.0, -1.0, -0.7] {
            let (motor, mut cached) = simple();
            cached.set_power(value).unwrap();
            cached.set_power(value).unwrap();
            assert_eq!(motor.power_writes(), vec![value], "value {value}");
        }
    }

    #[test]
    fn comparison_is_against_last_forwarded_value() {
        let (motor, mut cached) = simple();
        cached.set_power(0.5).unwrap();
        // Each request is under threshold from the previous request but the
        // third drifts past it relative to the forwarded 0.5.
        cached.set_power(0.51).unwrap();
        cached.set_power(0.515).unwrap();
        cached.set_power(0.52).unwrap();
        assert_eq!(motor.power_writes(), vec![0.5, 0.52]);
    }

    #[test]
    fn threshold_change_applies_to_next_call() {
        let (motor, mut cached) = simple();
        assert_eq!(cached.change_threshold(), 0.02);
        cached.set_change_threshold(0.2);
        cached.set_power(0.1).unwrap();
        assert!(motor.power_writes().is_empty());
        cached.set_change_threshold(0.05);
        cached.set_power(0.1).unwrap();
        assert_eq!(motor.power_writes(), vec![0.1]);
    }

    #[test]
    fn force_power_bypasses_threshold() {
        let (motor, mut cached) = simple();
        cached.force_power(0.001).unwrap();
        assert_eq!(motor.power_writes(), vec![0.001]);
        assert_eq!(cached.last_written_power(), 0.001);
    }

    #[test]
    fn failed_write_is_returned_and_retried_under_rollback() {
        let (motor, mut cached) = simple();
        motor.fail_next_write();
        let err = cached.set_power(0.5).unwrap_err();
        assert!(matches!(err, HalError::HardwareFault { .. }));
        assert_eq!(cached.last_written_power(), 0.0);
        assert!(cached.set_power_reporting_write(0.5).unwrap());
        assert_eq!(motor.power_writes(), vec![0.5]);
    }

    #[test]
    fn failed_write_leaves_cache_updated_under_optimistic() {
        let (motor, mut cached) = simple();
        cached.set_write_failure_policy(WriteFailurePolicy::Optimistic);
        motor.fail_next_write();
        assert!(cached.set_power(0.5).is_err());
        assert_eq!(cached.last_written_power(), 0.5);
        // The hardware never received 0.5, yet the retry is suppressed.
        assert!(!cached.set_power_reporting_write(0.5).unwrap());
        assert!(motor.power_writes().is_empty());
    }

    #[test]
    fn device_facade_passes_through() {
        let (motor, mut cached) = simple();
        assert_eq!(cached.manufacturer(), Manufacturer::Lynx);
        assert_eq!(cached.device_name(), "Sim Motor");
        assert_eq!(cached.connection_info(), "sim; port 0");
        assert_eq!(cached.version(), 1);
        cached.set_direction(Direction::Reverse).unwrap();
        assert_eq!(motor.direction(), Direction::Reverse);
        cached.reset_device_configuration().unwrap();
        assert_eq!(cached.direction(), Direction::Forward);
        cached.close().unwrap();
        cached.close().unwrap();
        assert_eq!(motor.close_count(), 2);
        assert_eq!(cached.inner().device_name(), "Sim Motor");
    }

    #[test]
    fn from_config_uses_motor_threshold_and_policy() {
        let cfg = CacheConfig {
            motor_threshold: 0.1,
            write_failure: WriteFailurePolicy::Optimistic,
            ..CacheConfig::default()
        };
        let cached = CachingMotorSimple::from_config(SimMotor::new("m"), &cfg);
        assert_eq!(cached.change_threshold(), 0.1);
        assert_eq!(cached.write_failure_policy(), WriteFailurePolicy::Optimistic);
    }

    // ------------------------------------------------------------------
    // Target position
    // ------------------------------------------------------------------

    #[test]
    fn distinct_integer_target_is_forwarded() {
        let motor = SimMotor::new("lift");
        let mut cached = CachingMotor::new(motor.clone());
        cached.set_target_position(100).unwrap();
        assert_eq!(cached.last_written_target_position(), 100.0);
        assert!(cached.set_target_position_reporting_write(101).unwrap());
        assert_eq!(motor.target_writes(), vec![100, 101]);
    }

    #[test]
    fn repeated_target_is_suppressed() {
        let motor = SimMotor::new("lift");
        let mut cached = CachingMotor::new(motor.clone());
        for _ in 0..5 {
            cached.set_target_position(250).unwrap();
        }
        assert_eq!(motor.target_writes(), vec![250]);
    }

    #[test]
    fn initial_target_of_zero_is_suppressed() {
        let motor = SimMotor::new("lift");
        let mut cached = CachingMotor::new(motor.clone());
        assert!(!cached.set_target_position_reporting_write(0).unwrap());
        assert!(motor.target_writes().is_empty());
    }

    #[test]
    fn target_threshold_follows_shared_change_threshold() {
        let motor = SimMotor::new("lift");
        let mut cached = CachingMotor::new(motor.clone());
        cached.set_change_threshold(10.0);
        cached.set_target_position(5).unwrap();
        cached.set_target_position(10).unwrap();
        cached.force_target_position(3).unwrap();
        assert_eq!(motor.target_writes(), vec![10, 3]);
        assert_eq!(cached.last_written_target_position(), 3.0);
    }

    #[test]
    fn motor_reads_and_configuration_pass_through() {
        let motor = SimMotor::on_port("arm", 2);
        let mut cached = CachingMotor::new(motor.clone());
        cached.set_mode(RunMode::RunToPosition).unwrap();
        assert_eq!(motor.mode(), RunMode::RunToPosition);
        cached.set_target_position(40).unwrap();
        assert_eq!(cached.target_position(), 40);
        motor.set_encoder(12);
        assert_eq!(cached.current_position(), 12);
        assert!(cached.is_busy());
        cached.set_zero_power_behavior(ZeroPowerBehavior::Brake).unwrap();
        assert_eq!(cached.zero_power_behavior(), ZeroPowerBehavior::Brake);
        assert_eq!(cached.port_number(), 2);
        assert_eq!(cached.controller().name, "Sim Controller");
        assert_eq!(cached.motor_type(), MotorConfigurationType::unspecified());
    }

    #[test]
    fn power_float_is_passed_through_without_touching_cache() {
        let motor = SimMotor::new("arm");
        let mut cached = CachingMotor::new(motor.clone());
        cached.set_power(0.6).unwrap();
        cached.set_power_float().unwrap();
        assert!(cached.power_float());
        assert_eq!(cached.power(), 0.0);
        // Cache still believes 0.6 was last written; 0.0 is forced through.
        assert_eq!(cached.last_written_power(), 0.6);
        assert!(cached.set_power_reporting_write(0.0).unwrap());
    }

    #[test]
    fn from_config_applies_policy_to_both_caches() {
        let cfg = CacheConfig {
            motor_threshold: 0.5,
            write_failure: WriteFailurePolicy::Optimistic,
            ..CacheConfig::default()
        };
        let motor = SimMotor::new("lift");
        let mut cached = CachingMotorEx::from_config(motor.clone(), &cfg);
        assert_eq!(cached.write_failure_policy(), WriteFailurePolicy::Optimistic);
        motor.fail_next_write();
        assert!(cached.set_target_position(30).is_err());
        assert_eq!(cached.last_written_target_position(), 30.0);
        assert!(motor.target_writes().is_empty());
    }

    #[test]
    fn target_write_failure_propagates() {
        let motor = SimMotor::new("lift");
        let mut cached = CachingMotor::new(motor.clone());
        motor.fail_next_write();
        assert!(matches!(
            cached.set_target_position(500),
            Err(HalError::HardwareFault { .. })
        ));
        assert_eq!(cached.last_written_target_position(), 0.0);
        cached.set_target_position(500).unwrap();
        assert_eq!(motor.target_writes(), vec![500]);
    }

    // ------------------------------------------------------------------
    // Extended motor
    // ------------------------------------------------------------------

    #[test]
    fn extended_motor_keeps_power_and_target_caching() {
        let motor = SimMotor::new("shooter");
        let mut cached = CachingMotorEx::new(motor.clone());
        cached.set_power(0.5).unwrap();
        cached.set_power(0.505).unwrap();
        cached.set_target_position(7).unwrap();
        cached.set_target_position(7).unwrap();
        assert_eq!(motor.power_writes(), vec![0.5]);
        assert_eq!(motor.target_writes(), vec![7]);
    }

    #[test]
    fn extended_motor_velocity_is_never_cached() {
        let motor = SimMotor::new("shooter");
        let mut cached = CachingMotorEx::new(motor.clone());
        cached.set_velocity(1000.0).unwrap();
        cached.set_velocity(1000.001).unwrap();
        assert_eq!(motor.velocity(), 1000.001);
        assert_eq!(cached.velocity(), 1000.001);
    }

    #[test]
    fn extended_motor_pidf_and_tolerance_pass_through() {
        let motor = SimMotor::new("shooter");
        let mut cached = CachingMotorEx::new(motor.clone());
        cached.set_velocity_pidf_coefficients(1.0, 0.1, 0.01, 12.0).unwrap();
        assert_eq!(
            cached.pidf_coefficients(RunMode::RunUsingEncoder).unwrap(),
            PidfCoefficients::new(1.0, 0.1, 0.01, 12.0)
        );
        cached.set_position_pidf_coefficients(5.0).unwrap();
        assert_eq!(cached.pidf_coefficients(RunMode::RunToPosition).unwrap().p, 5.0);
        cached
            .set_pid_coefficients(RunMode::RunUsingEncoder, PidCoefficients { p: 2.0, i: 0.0, d: 0.0 })
            .unwrap();
        assert_eq!(cached.pid_coefficients(RunMode::RunUsingEncoder).unwrap().p, 2.0);
        assert!(matches!(
            cached.set_pidf_coefficients(RunMode::StopAndResetEncoder, PidfCoefficients::default()),
            Err(HalError::Unsupported(_))
        ));
        cached.set_target_position_tolerance(12).unwrap();
        assert_eq!(cached.target_position_tolerance(), 12);
    }

    #[test]
    fn extended_motor_current_and_enable_pass_through() {
        let motor = SimMotor::new("intake");
        let mut cached = CachingMotorEx::new(motor.clone());
        cached.set_current_alert(2.0, CurrentUnit::Amps).unwrap();
        assert_eq!(cached.current_alert(CurrentUnit::Milliamps), 2000.0);
        motor.set_current_draw(2500.0);
        assert_eq!(cached.current(CurrentUnit::Amps), 2.5);
        assert!(cached.is_over_current());
        cached.set_motor_disable().unwrap();
        assert!(!cached.is_motor_enabled());
        cached.set_motor_enable().unwrap();
        assert!(motor.is_motor_enabled());
    }

    #[test]
    fn extended_motor_threshold_and_force_paths() {
        let motor = SimMotor::new("intake");
        let mut cached = CachingMotorEx::with_threshold(motor.clone(), 0.5);
        assert_eq!(cached.change_threshold(), 0.5);
        assert!(!cached.set_power_reporting_write(0.3).unwrap());
        cached.force_power(0.3).unwrap();
        assert_eq!(cached.last_written_power(), 0.3);
        assert!(!cached.set_target_position_reporting_write(0).unwrap());
        cached.force_target_position(0).unwrap();
        assert_eq!(motor.power_writes(), vec![0.3]);
        assert_eq!(motor.target_writes(), vec![0]);
        assert_eq!(cached.last_written_target_position(), 0.0);
        let handle = cached.into_inner();
        assert_eq!(handle.power(), 0.3);
    }
}
