//! Caching wrappers for servos.
//!
//! [`CachingServo`] caches a normalized position with its own hysteresis
//! rules: the first command always passes, and commands at either end of the
//! range are forced through.  [`CachingCrServo`] is a power-driven servo and
//! reuses [`CachingMotorSimple`] for its power setter unchanged.

use calcite_types::{ControllerInfo, Direction, HalError, Manufacturer};

use crate::cache::{CachedOutput, DEFAULT_MOTOR_THRESHOLD, DEFAULT_SERVO_THRESHOLD, PositionCache, WriteFailurePolicy};
use crate::config::CacheConfig;
use crate::device::{CrServo, HardwareDevice, MotorSimple, Servo};
use crate::motor::CachingMotorSimple;

// ────────────────────────────────────────────────────────────────────────────
// CachingServo
// ────────────────────────────────────────────────────────────────────────────

/// A position servo whose writes are filtered by a [`PositionCache`].
///
/// A write is forwarded when nothing has been forwarded yet, when the new
/// position differs from the last forwarded one by at least the change
/// threshold, or when it targets `<= 0.0` / `>= 1.0` and the cache is not
/// already at that end.
///
/// [`Servo::scale_range`] is passed through and does not touch the cache:
/// positions are compared in the logical `[0.0, 1.0]` domain.
pub struct CachingServo<S> {
    device: S,
    position: PositionCache,
}

impl<S: Servo> CachingServo<S> {
    /// Wrap `device` with the default threshold of `0.01`.
    pub fn new(device: S) -> Self {
        Self::with_threshold(device, DEFAULT_SERVO_THRESHOLD)
    }

    pub fn with_threshold(device: S, change_threshold: f64) -> Self {
        Self {
            device,
            position: PositionCache::new(change_threshold),
        }
    }

    /// Wrap `device` using `cfg.servo_threshold` and `cfg.write_failure`.
    pub fn from_config(device: S, cfg: &CacheConfig) -> Self {
        let mut wrapper = Self::with_threshold(device, cfg.servo_threshold);
        wrapper.position.set_policy(cfg.write_failure);
        wrapper
    }

    /// Same as [`Servo::set_position`], returning whether a hardware write
    /// was issued.
    ///
    /// # Errors
    ///
    /// Returns the wrapped handle's error unchanged.
    pub fn set_position_reporting_write(&mut self, position: f64) -> Result<bool, HalError> {
        self.position.write_through(position, |p| self.device.set_position(p))
    }

    /// Forward `position` regardless of the change threshold.
    pub fn force_position(&mut self, position: f64) -> Result<(), HalError> {
        self.position.force_through(position, |p| self.device.set_position(p))
    }

    pub fn change_threshold(&self) -> f64 {
        self.position.change_threshold()
    }

    pub fn set_change_threshold(&mut self, change_threshold: f64) {
        self.position.set_change_threshold(change_threshold);
    }

    pub fn write_failure_policy(&self) -> WriteFailurePolicy {
        self.position.policy()
    }

    pub fn set_write_failure_policy(&mut self, policy: WriteFailurePolicy) {
        self.position.set_policy(policy);
    }

    /// Last position forwarded to the servo, `None` before the first write.
    pub fn last_written_position(&self) -> Option<f64> {
        self.position.last_written()
    }

    pub fn inner(&self) -> &S {
        &self.device
    }

    /// Writes made through the returned handle bypass the cache.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.device
    }

    pub fn into_inner(self) -> S {
        self.device
    }
}

impl<S: Servo> HardwareDevice for CachingServo<S> {
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

impl<S: Servo> Servo for CachingServo<S> {
    fn controller(&self) -> ControllerInfo {
        self.device.controller()
    }

    fn port_number(&self) -> u8 {
        self.device.port_number()
    }

    fn direction(&self) -> Direction {
        self.device.direction()
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError> {
        self.device.set_direction(direction)
    }

    fn position(&self) -> f64 {
        self.device.position()
    }

    fn set_position(&mut self, position: f64) -> Result<(), HalError> {
        self.set_position_reporting_write(position).map(|_| ())
    }

    fn scale_range(&mut self, min: f64, max: f64) -> Result<(), HalError> {
        self.device.scale_range(min, max)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CachingCrServo
// ────────────────────────────────────────────────────────────────────────────

/// A continuous-rotation servo with cached power.
pub struct CachingCrServo<S> {
    power: CachingMotorSimple<S>,
}

impl<S: CrServo> CachingCrServo<S> {
    /// Wrap `device` with the default threshold of `0.02`.
    pub fn new(device: S) -> Self {
        Self::with_threshold(device, DEFAULT_MOTOR_THRESHOLD)
    }

    pub fn with_threshold(device: S, change_threshold: f64) -> Self {
        Self {
            power: CachingMotorSimple::with_threshold(device, change_threshold),
        }
    }

    /// Wrap `device` using `cfg.cr_servo_threshold` and `cfg.write_failure`.
    pub fn from_config(device: S, cfg: &CacheConfig) -> Self {
        Self {
            power: CachingMotorSimple::from_parts(device, cfg.cr_servo_threshold, cfg.write_failure),
        }
    }

    pub fn set_power_reporting_write(&mut self, power: f64) -> Result<bool, HalError> {
        self.power.set_power_reporting_write(power)
    }

    pub fn force_power(&mut self, power: f64) -> Result<(), HalError> {
        self.power.force_power(power)
    }

    pub fn change_threshold(&self) -> f64 {
        self.power.change_threshold()
    }

    pub fn set_change_threshold(&mut self, change_threshold: f64) {
        self.power.set_change_threshold(change_threshold);
    }

    pub fn write_failure_policy(&self) -> WriteFailurePolicy {
        self.power.write_failure_policy()
    }

    pub fn set_write_failure_policy(&mut self, policy: WriteFailurePolicy) {
        self.power.set_write_failure_policy(policy);
    }

    pub fn last_written_power(&self) -> f64 {
        self.power.last_written_power()
    }

    pub fn inner(&self) -> &S {
        self.power.inner()
    }

    pub fn inner_mut(&mut self) -> &mut S {
        self.power.inner_mut()
    }

    pub fn into_inner(self) -> S {
        self.power.into_inner()
    }
}

impl<S: CrServo> HardwareDevice for CachingCrServo<S> {
    fn manufacturer(&self) -> Manufacturer {
        self.power.manufacturer()
    }

    fn device_name(&self) -> String {
        self.power.device_name()
    }

    fn connection_info(&self) -> String {
        self.power.connection_info()
    }

    fn version(&self) -> u32 {
        self.power.version()
    }

    fn reset_device_configuration(&mut self) -> Result<(), HalError> {
        self.power.reset_device_configuration()
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.power.close()
    }
}

impl<S: CrServo> MotorSimple for CachingCrServo<S> {
    fn direction(&self) -> Direction {
        self.power.direction()
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError> {
        self.power.set_direction(direction)
    }

    fn power(&self) -> f64 {
        self.power.power()
    }

    fn set_power(&mut self, power: f64) -> Result<(), HalError> {
        self.power.set_power(power)
    }
}

impl<S: CrServo> CrServo for CachingCrServo<S> {
    fn controller(&self) -> ControllerInfo {
        self.inner().controller()
    }

    fn port_number(&self) -> u8 {
        self.inner().port_number()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimMotor, SimServo};

    fn servo() -> (SimServo, CachingServo<SimServo>) {
        let servo = SimServo::new("claw");
        let cached = CachingServo::new(servo.clone());
        (servo, cached)
    }

    #[test]
    fn first_write_always_passes() {
        for (threshold, value) in [(0.01, 0.5), (5.0, 0.0), (5.0, 0.3), (0.0, 1.0)] {
            let servo = SimServo::new("claw");
            let mut cached = CachingServo::with_threshold(servo.clone(), threshold);
            assert_eq!(cached.last_written_position(), None);
            assert!(cached.set_position_reporting_write(value).unwrap());
            assert_eq!(cached.last_written_position(), Some(value));
            assert_eq!(servo.position_writes(), vec![value]);
        }
    }

    #[test]
    fn sub_threshold_move_is_suppressed() {
        let (servo, mut cached) = servo();
        cached.set_position(0.5).unwrap();
        assert!(!cached.set_position_reporting_write(0.505).unwrap());
        assert_eq!(servo.position_writes(), vec![0.5]);
        assert_eq!(cached.last_written_position(), Some(0.5));
    }

    #[test]
    fn upper_end_is_forced_through_below_threshold() {
        let (servo, mut cached) = servo();
        cached.set_position(0.995).unwrap();
        assert!(cached.set_position_reporting_write(1.0).unwrap());
        assert_eq!(servo.position_writes(), vec![0.995, 1.0]);
    }

    #[test]
    fn upper_end_from_threshold_distance_is_forwarded() {
        let (servo, mut cached) = servo();
        cached.set_position(0.99).unwrap();
        assert!(cached.set_position_reporting_write(1.0).unwrap());
        assert_eq!(servo.position_writes(), vec![0.99, 1.0]);
    }

    #[test]
    fn lower_end_is_forced_through_below_threshold() {
        let (servo, mut cached) = servo();
        cached.set_position(0.004).unwrap();
        assert!(cached.set_position_reporting_write(0.0).unwrap());
        assert!(!cached.set_position_reporting_write(0.0).unwrap());
        assert_eq!(servo.position_writes(), vec![0.004, 0.0]);
    }

    #[test]
    fn repeated_end_value_forwards_once() {
        let (servo, mut cached) = servo();
        cached.set_position(1.0).unwrap();
        cached.set_position(1.0).unwrap();
        assert_eq!(servo.position_writes(), vec![1.0]);
    }

    #[test]
    fn position_read_is_forwarded_and_may_be_unknown() {
        let (_servo, mut cached) = servo();
        assert!(cached.position().is_nan());
        cached.set_position(0.4).unwrap();
        assert_eq!(cached.position(), 0.4);
    }

    #[test]
    fn scale_range_does_not_affect_cache() {
        let (servo, mut cached) = servo();
        cached.set_position(0.5).unwrap();
        cached.scale_range(0.2, 0.8).unwrap();
        // Still compared against logical 0.5, not the scaled output.
        assert!(!cached.set_position_reporting_write(0.505).unwrap());
        assert_eq!(cached.last_written_position(), Some(0.5));
        assert!((servo.physical_output().unwrap() - 0.5).abs() < 1e-9);
        cached.set_position(1.0).unwrap();
        assert!((servo.physical_output().unwrap() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn failed_first_write_keeps_cache_unset_under_rollback() {
        let (servo, mut cached) = servo();
        servo.fail_next_write();
        assert!(matches!(
            cached.set_position(0.3),
            Err(HalError::HardwareFault { .. })
        ));
        assert_eq!(cached.last_written_position(), None);
        assert!(cached.set_position_reporting_write(0.3).unwrap());
    }

    #[test]
    fn failed_write_sets_cache_under_optimistic() {
        let cfg = CacheConfig {
            write_failure: WriteFailurePolicy::Optimistic,
            ..CacheConfig::default()
        };
        let servo = SimServo::new("claw");
        let mut cached = CachingServo::from_config(servo.clone(), &cfg);
        assert_eq!(cached.change_threshold(), 0.01);
        servo.fail_next_write();
        assert!(cached.set_position(0.3).is_err());
        assert_eq!(cached.last_written_position(), Some(0.3));
        assert!(!cached.set_position_reporting_write(0.3).unwrap());
        assert!(servo.position_writes().is_empty());
    }

    #[test]
    fn force_position_bypasses_threshold() {
        let (servo, mut cached) = servo();
        cached.set_position(0.5).unwrap();
        cached.force_position(0.501).unwrap();
        assert_eq!(servo.position_writes(), vec![0.5, 0.501]);
    }

    #[test]
    fn servo_facade_passes_through() {
        let servo = SimServo::on_port("wrist", 4);
        let mut cached = CachingServo::new(servo.clone());
        assert_eq!(cached.port_number(), 4);
        assert_eq!(cached.device_name(), "Sim Servo");
        assert_eq!(cached.controller().connection_info, "sim");
        cached.set_direction(Direction::Reverse).unwrap();
        assert_eq!(servo.direction(), Direction::Reverse);
        cached.set_change_threshold(0.05);
        assert_eq!(cached.change_threshold(), 0.05);
        cached.close().unwrap();
        assert_eq!(servo.close_count(), 1);
    }

    // ------------------------------------------------------------------
    // Continuous-rotation servo
    // ------------------------------------------------------------------

    #[test]
    fn cr_servo_uses_power_hysteresis() {
        let motor = SimMotor::on_port("spinner", 3);
        let mut cached = CachingCrServo::new(motor.clone());
        assert_eq!(cached.change_threshold(), 0.02);
        cached.set_power(0.01).unwrap();
        cached.set_power(0.5).unwrap();
        cached.set_power(0.99).unwrap();
        cached.set_power(1.0).unwrap();
        cached.set_power(0.0).unwrap();
        assert_eq!(motor.power_writes(), vec![0.5, 0.99, 1.0, 0.0]);
        assert_eq!(cached.last_written_power(), 0.0);
    }

    #[test]
    fn cr_servo_metadata_passes_through() {
        let motor = SimMotor::on_port("spinner", 3);
        let cached = CachingCrServo::new(motor);
        assert_eq!(CrServo::port_number(&cached), 3);
        assert_eq!(CrServo::controller(&cached).name, "Sim Controller");
        assert_eq!(cached.connection_info(), "sim; port 3");
    }

    #[test]
    fn cr_servo_from_config_uses_its_own_threshold() {
        let cfg = CacheConfig {
            cr_servo_threshold: 0.3,
            ..CacheConfig::default()
        };
        let motor = SimMotor::new("spinner");
        let mut cached = CachingCrServo::from_config(motor.clone(), &cfg);
        assert!(!cached.set_power_reporting_write(0.2).unwrap());
        cached.force_power(0.2).unwrap();
        assert_eq!(motor.power_writes(), vec![0.2]);
    }
}
