//! Capability traits for actuator handles.
//!
//! A handle is the driver-side object for one physical output device.  The
//! caching wrappers in [`crate::motor`] and [`crate::servo`] consume a handle
//! through these traits and implement the very same traits themselves, so a
//! control loop can hold a wrapper wherever it would hold the raw handle.
//!
//! The capability sets are deliberately flat:
//!
//! | Trait | Capability |
//! |---|---|
//! | [`HardwareDevice`] | identity, metadata, lifecycle |
//! | [`MotorSimple`] | signed power in `[-1.0, 1.0]` + direction |
//! | [`Motor`] | adds integer target position, run mode, encoder, braking |
//! | [`MotorEx`] | adds velocity, PIDF tuning, current sensing, enable/disable |
//! | [`Servo`] | normalized position in `[0.0, 1.0]` + range scaling |
//! | [`CrServo`] | power-driven servo (a [`MotorSimple`] on a servo port) |
//!
//! Handles are held by value; a handle type is expected to be a cheap
//! reference onto device state owned by the device map, so the same device
//! can be reached from outside the wrapper.

use calcite_types::{
    AngleUnit, ControllerInfo, CurrentUnit, Direction, HalError, Manufacturer,
    MotorConfigurationType, PidCoefficients, PidfCoefficients, RunMode, ZeroPowerBehavior,
};

/// Identity, metadata and lifecycle shared by every device.
pub trait HardwareDevice {
    /// Vendor of the device.
    fn manufacturer(&self) -> Manufacturer;

    /// Device-type name suitable for display, e.g. `"REV Core Hex Motor"`.
    /// Unrelated to the name the device was configured under.
    fn device_name(&self) -> String;

    /// Human-readable connection information (bus, module, port).
    fn connection_info(&self) -> String;

    /// Device firmware / driver version.
    fn version(&self) -> u32;

    /// Reset the device configuration to what a fresh control session
    /// expects (motors return to [`Direction::Forward`], for instance).
    ///
    /// # Errors
    ///
    /// Returns [`HalError::HardwareFault`] if the reset cannot be applied.
    fn reset_device_configuration(&mut self) -> Result<(), HalError>;

    /// Close the device.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::HardwareFault`] if the device cannot be released.
    fn close(&mut self) -> Result<(), HalError>;
}

/// An output driven by a signed power command.
pub trait MotorSimple: HardwareDevice {
    /// Logical direction the output operates in.
    fn direction(&self) -> Direction;

    /// Set the logical direction.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::HardwareFault`] if the command cannot be applied.
    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError>;

    /// Power level currently applied by the device.
    fn power(&self) -> f64;

    /// Command a power level in `[-1.0, 1.0]`.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::HardwareFault`] if the bus write fails.
    fn set_power(&mut self, power: f64) -> Result<(), HalError>;
}

/// A motor with an encoder, a target position and selectable run modes.
pub trait Motor: MotorSimple {
    fn motor_type(&self) -> MotorConfigurationType;

    fn set_motor_type(&mut self, motor_type: MotorConfigurationType) -> Result<(), HalError>;

    /// Controller the motor port lives on.
    fn controller(&self) -> ControllerInfo;

    /// Port number on [`Motor::controller`].
    fn port_number(&self) -> u8;

    fn zero_power_behavior(&self) -> ZeroPowerBehavior;

    fn set_zero_power_behavior(&mut self, behavior: ZeroPowerBehavior) -> Result<(), HalError>;

    /// Switch to [`ZeroPowerBehavior::Float`] and apply zero power.
    ///
    /// The float behavior persists after the call returns.
    fn set_power_float(&mut self) -> Result<(), HalError>;

    /// Whether the motor is currently floating at zero power.
    fn power_float(&self) -> bool;

    /// Target encoder position last accepted by the device.
    fn target_position(&self) -> i32;

    /// Set the encoder position the motor drives to while in
    /// [`RunMode::RunToPosition`].
    ///
    /// # Errors
    ///
    /// Returns [`HalError::HardwareFault`] if the bus write fails.
    fn set_target_position(&mut self, position: i32) -> Result<(), HalError>;

    /// Whether the motor is still advancing toward its target position.
    fn is_busy(&self) -> bool;

    /// Current encoder reading, in device-specific ticks.
    fn current_position(&self) -> i32;

    fn mode(&self) -> RunMode;

    fn set_mode(&mut self, mode: RunMode) -> Result<(), HalError>;
}

/// A motor exposing velocity control, PIDF tuning and current sensing.
pub trait MotorEx: Motor {
    /// Energize this motor individually.
    fn set_motor_enable(&mut self) -> Result<(), HalError>;

    /// De-energize this motor individually.
    fn set_motor_disable(&mut self) -> Result<(), HalError>;

    fn is_motor_enabled(&self) -> bool;

    /// Command a velocity in encoder ticks per second.
    fn set_velocity(&mut self, ticks_per_second: f64) -> Result<(), HalError>;

    /// Command a velocity in `unit` per second.
    fn set_velocity_in(&mut self, angular_rate: f64, unit: AngleUnit) -> Result<(), HalError>;

    /// Current velocity in encoder ticks per second.
    fn velocity(&self) -> f64;

    /// Current velocity in `unit` per second.
    fn velocity_in(&self, unit: AngleUnit) -> f64;

    /// Set legacy PID gains for `mode`.
    ///
    /// Prefer [`MotorEx::set_pidf_coefficients`].
    fn set_pid_coefficients(&mut self, mode: RunMode, pid: PidCoefficients) -> Result<(), HalError>;

    /// # Errors
    ///
    /// Returns [`HalError::Unsupported`] if the controller has no gains for
    /// `mode`.
    fn pid_coefficients(&self, mode: RunMode) -> Result<PidCoefficients, HalError>;

    /// Set PIDF gains for `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::Unsupported`] if the controller cannot run the
    /// requested algorithm in `mode`.
    fn set_pidf_coefficients(&mut self, mode: RunMode, pidf: PidfCoefficients) -> Result<(), HalError>;

    fn pidf_coefficients(&self, mode: RunMode) -> Result<PidfCoefficients, HalError>;

    /// Shorthand for PIDF gains in [`RunMode::RunUsingEncoder`].
    fn set_velocity_pidf_coefficients(&mut self, p: f64, i: f64, d: f64, f: f64) -> Result<(), HalError>;

    /// Shorthand for the proportional gain in [`RunMode::RunToPosition`].
    fn set_position_pidf_coefficients(&mut self, p: f64) -> Result<(), HalError>;

    /// Set the target-position tolerance in encoder ticks.
    fn set_target_position_tolerance(&mut self, tolerance: i32) -> Result<(), HalError>;

    fn target_position_tolerance(&self) -> i32;

    /// Current drawn by the motor.
    fn current(&self, unit: CurrentUnit) -> f64;

    fn current_alert(&self, unit: CurrentUnit) -> f64;

    fn set_current_alert(&mut self, current: f64, unit: CurrentUnit) -> Result<(), HalError>;

    /// Whether the drawn current exceeds the alert level.
    fn is_over_current(&self) -> bool;
}

/// A position servo commanded with a normalized position.
pub trait Servo: HardwareDevice {
    fn controller(&self) -> ControllerInfo;

    fn port_number(&self) -> u8;

    fn direction(&self) -> Direction;

    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError>;

    /// Position the servo was last commanded to, or `NaN` if it has never
    /// been commanded.  Servos have no position feedback.
    fn position(&self) -> f64;

    /// Command a position in `[0.0, 1.0]`.
    ///
    /// # Errors
    ///
    /// Returns [`HalError::HardwareFault`] if the bus write fails.
    fn set_position(&mut self, position: f64) -> Result<(), HalError>;

    /// Restrict the physical range so that `0.0..=1.0` maps to `min..=max`.
    ///
    /// Bounds are relative to the full physical range, so
    /// `scale_range(0.0, 1.0)` restores it.
    fn scale_range(&mut self, min: f64, max: f64) -> Result<(), HalError>;
}

/// A continuous-rotation servo, driven by power like a simple motor.
pub trait CrServo: MotorSimple {
    fn controller(&self) -> ControllerInfo;

    fn port_number(&self) -> u8;
}
