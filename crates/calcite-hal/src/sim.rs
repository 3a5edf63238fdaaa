//! In-process simulated actuator handles for testing without hardware.
//!
//! [`SimMotor`] and [`SimServo`] are cheap cloneable handles onto shared
//! device state, the same way a real device map hands out references to
//! devices it owns.  Wrap one clone in a caching wrapper and keep another to
//! assert on what actually reached the "bus".
//!
//! # Stub behaviour
//!
//! | Handle | Behaviour |
//! |---|---|
//! | [`SimMotor`] | Records every `set_power` / `set_target_position`; clamps reported power to `[-1.0, 1.0]`; implements [`MotorEx`] and [`CrServo`]. |
//! | [`SimServo`] | Records every `set_position`; reports `NaN` until first commanded; applies `scale_range` and direction to its physical output. |
//!
//! Both support one-shot fault injection with `fail_next_write`.
//!
//! # Example
//!
//! ```rust
//! use calcite_hal::device::MotorSimple;
//! use calcite_hal::motor::CachingMotorSimple;
//! use calcite_hal::sim::SimMotor;
//!
//! let motor = SimMotor::new("intake");
//! let mut cached = CachingMotorSimple::new(motor.clone());
//!
//! cached.set_power(0.5).unwrap();
//! cached.set_power(0.51).unwrap(); // suppressed
//! assert_eq!(motor.power_writes(), vec![0.5]);
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::f64::consts::TAU;
use std::rc::Rc;

use calcite_types::{
    AngleUnit, ControllerInfo, CurrentUnit, Direction, HalError, Manufacturer,
    MotorConfigurationType, PidCoefficients, PidfCoefficients, RunMode, ZeroPowerBehavior,
};

use crate::device::{CrServo, HardwareDevice, Motor, MotorEx, MotorSimple, Servo};

fn sim_controller() -> ControllerInfo {
    ControllerInfo {
        name: "Sim Controller".to_string(),
        connection_info: "sim".to_string(),
    }
}

fn injected_fault(id: &str) -> HalError {
    HalError::HardwareFault {
        component: id.to_string(),
        details: "injected bus fault".to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Motor
// ────────────────────────────────────────────────────────────────────────────

struct MotorState {
    id: String,
    port: u8,
    direction: Direction,
    power: f64,
    power_writes: Vec<f64>,
    target_position: i32,
    target_writes: Vec<i32>,
    encoder: i32,
    mode: RunMode,
    motor_type: MotorConfigurationType,
    zero_power_behavior: ZeroPowerBehavior,
    enabled: bool,
    velocity: f64,
    pidf: HashMap<RunMode, PidfCoefficients>,
    tolerance: i32,
    current_ma: f64,
    current_alert_ma: f64,
    fail_next_write: bool,
    close_count: u32,
}

/// A simulated motor handle.  Clones share the same device.
#[derive(Clone)]
pub struct SimMotor {
    state: Rc<RefCell<MotorState>>,
}

impl SimMotor {
    /// Create a simulated motor on port 0.
    pub fn new(id: impl Into<String>) -> Self {
        Self::on_port(id, 0)
    }

    /// Create a simulated motor on the given controller port.
    pub fn on_port(id: impl Into<String>, port: u8) -> Self {
        let mut pidf = HashMap::new();
        pidf.insert(RunMode::RunUsingEncoder, PidfCoefficients::new(10.0, 3.0, 0.0, 0.0));
        pidf.insert(RunMode::RunToPosition, PidfCoefficients::new(10.0, 0.0, 0.0, 0.0));
        Self {
            state: Rc::new(RefCell::new(MotorState {
                id: id.into(),
                port,
                direction: Direction::Forward,
                power: 0.0,
                power_writes: Vec::new(),
                target_position: 0,
                target_writes: Vec::new(),
                encoder: 0,
                mode: RunMode::RunWithoutEncoder,
                motor_type: MotorConfigurationType::unspecified(),
                zero_power_behavior: ZeroPowerBehavior::Float,
                enabled: true,
                velocity: 0.0,
                pidf,
                tolerance: 5,
                current_ma: 0.0,
                current_alert_ma: 5000.0,
                fail_next_write: false,
                close_count: 0,
            })),
        }
    }

    /// Every power value that reached the device, in order.
    pub fn power_writes(&self) -> Vec<f64> {
        self.state.borrow().power_writes.clone()
    }

    /// Every target position that reached the device, in order.
    pub fn target_writes(&self) -> Vec<i32> {
        self.state.borrow().target_writes.clone()
    }

    /// Make the next power or target-position write fail.
    pub fn fail_next_write(&self) {
        self.state.borrow_mut().fail_next_write = true;
    }

    /// Move the simulated encoder.
    pub fn set_encoder(&self, ticks: i32) {
        self.state.borrow_mut().encoder = ticks;
    }

    /// Set the simulated current draw.
    pub fn set_current_draw(&self, milliamps: f64) {
        self.state.borrow_mut().current_ma = milliamps;
    }

    /// Number of times `close` reached the device.
    pub fn close_count(&self) -> u32 {
        self.state.borrow().close_count
    }

    // One-shot fault check shared by the recorded writes.
    fn take_fault(&self) -> Result<(), HalError> {
        let mut s = self.state.borrow_mut();
        if s.fail_next_write {
            s.fail_next_write = false;
            return Err(injected_fault(&s.id));
        }
        Ok(())
    }

    fn ticks_per_radian(&self) -> Option<f64> {
        let ticks_per_rev = self.state.borrow().motor_type.ticks_per_rev;
        (ticks_per_rev > 0.0).then(|| ticks_per_rev / TAU)
    }
}

impl HardwareDevice for SimMotor {
    fn manufacturer(&self) -> Manufacturer {
        Manufacturer::Lynx
    }

    fn device_name(&self) -> String {
        "Sim Motor".to_string()
    }

    fn connection_info(&self) -> String {
        format!("sim; port {}", self.state.borrow().port)
    }

    fn version(&self) -> u32 {
        1
    }

    fn reset_device_configuration(&mut self) -> Result<(), HalError> {
        let mut s = self.state.borrow_mut();
        s.direction = Direction::Forward;
        s.mode = RunMode::RunWithoutEncoder;
        Ok(())
    }

    fn close(&mut self) -> Result<(), HalError> {
        let mut s = self.state.borrow_mut();
        s.close_count += 1;
        s.power = 0.0;
        Ok(())
    }
}

impl MotorSimple for SimMotor {
    fn direction(&self) -> Direction {
        self.state.borrow().direction
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError> {
        self.state.borrow_mut().direction = direction;
        Ok(())
    }

    fn power(&self) -> f64 {
        self.state.borrow().power
    }

    fn set_power(&mut self, power: f64) -> Result<(), HalError> {
        self.take_fault()?;
        let mut s = self.state.borrow_mut();
        s.power_writes.push(power);
        s.power = power.clamp(-1.0, 1.0);
        Ok(())
    }
}

impl Motor for SimMotor {
    fn motor_type(&self) -> MotorConfigurationType {
        self.state.borrow().motor_type.clone()
    }

    fn set_motor_type(&mut self, motor_type: MotorConfigurationType) -> Result<(), HalError> {
        self.state.borrow_mut().motor_type = motor_type;
        Ok(())
    }

    fn controller(&self) -> ControllerInfo {
        sim_controller()
    }

    fn port_number(&self) -> u8 {
        self.state.borrow().port
    }

    fn zero_power_behavior(&self) -> ZeroPowerBehavior {
        self.state.borrow().zero_power_behavior
    }

    fn set_zero_power_behavior(&mut self, behavior: ZeroPowerBehavior) -> Result<(), HalError> {
        self.state.borrow_mut().zero_power_behavior = behavior;
        Ok(())
    }

    fn set_power_float(&mut self) -> Result<(), HalError> {
        let mut s = self.state.borrow_mut();
        s.zero_power_behavior = ZeroPowerBehavior::Float;
        s.power = 0.0;
        Ok(())
    }

    fn power_float(&self) -> bool {
        let s = self.state.borrow();
        s.zero_power_behavior == ZeroPowerBehavior::Float && s.power == 0.0
    }

    fn target_position(&self) -> i32 {
        self.state.borrow().target_position
    }

    fn set_target_position(&mut self, position: i32) -> Result<(), HalError> {
        self.take_fault()?;
        let mut s = self.state.borrow_mut();
        s.target_writes.push(position);
        s.target_position = position;
        Ok(())
    }

    fn is_busy(&self) -> bool {
        let s = self.state.borrow();
        s.mode == RunMode::RunToPosition && (s.target_position - s.encoder).abs() > s.tolerance
    }

    fn current_position(&self) -> i32 {
        self.state.borrow().encoder
    }

    fn mode(&self) -> RunMode {
        self.state.borrow().mode
    }

    fn set_mode(&mut self, mode: RunMode) -> Result<(), HalError> {
        let mut s = self.state.borrow_mut();
        if mode == RunMode::StopAndResetEncoder {
            s.encoder = 0;
            s.power = 0.0;
        }
        s.mode = mode;
        Ok(())
    }
}

impl MotorEx for SimMotor {
    fn set_motor_enable(&mut self) -> Result<(), HalError> {
        self.state.borrow_mut().enabled = true;
        Ok(())
    }

    fn set_motor_disable(&mut self) -> Result<(), HalError> {
        self.state.borrow_mut().enabled = false;
        Ok(())
    }

    fn is_motor_enabled(&self) -> bool {
        self.state.borrow().enabled
    }

    fn set_velocity(&mut self, ticks_per_second: f64) -> Result<(), HalError> {
        self.state.borrow_mut().velocity = ticks_per_second;
        Ok(())
    }

    fn set_velocity_in(&mut self, angular_rate: f64, unit: AngleUnit) -> Result<(), HalError> {
        let ticks_per_radian = self.ticks_per_radian().ok_or_else(|| {
            HalError::Unsupported("unit velocity requires a motor type with ticks_per_rev".to_string())
        })?;
        self.set_velocity(unit.to_radians(angular_rate) * ticks_per_radian)
    }

    fn velocity(&self) -> f64 {
        self.state.borrow().velocity
    }

    fn velocity_in(&self, unit: AngleUnit) -> f64 {
        match self.ticks_per_radian() {
            Some(ticks_per_radian) => unit.from_radians(self.velocity() / ticks_per_radian),
            None => 0.0,
        }
    }

    fn set_pid_coefficients(&mut self, mode: RunMode, pid: PidCoefficients) -> Result<(), HalError> {
        self.set_pidf_coefficients(mode, pid.into())
    }

    fn pid_coefficients(&self, mode: RunMode) -> Result<PidCoefficients, HalError> {
        let pidf = self.pidf_coefficients(mode)?;
        Ok(PidCoefficients {
            p: pidf.p,
            i: pidf.i,
            d: pidf.d,
        })
    }

    fn set_pidf_coefficients(&mut self, mode: RunMode, pidf: PidfCoefficients) -> Result<(), HalError> {
        match mode {
            RunMode::RunUsingEncoder | RunMode::RunToPosition => {
                self.state.borrow_mut().pidf.insert(mode, pidf);
                Ok(())
            }
            other => Err(HalError::Unsupported(format!("no PIDF gains for {other:?}"))),
        }
    }

    fn pidf_coefficients(&self, mode: RunMode) -> Result<PidfCoefficients, HalError> {
        self.state
            .borrow()
            .pidf
            .get(&mode)
            .copied()
            .ok_or_else(|| HalError::Unsupported(format!("no PIDF gains for {mode:?}")))
    }

    fn set_velocity_pidf_coefficients(&mut self, p: f64, i: f64, d: f64, f: f64) -> Result<(), HalError> {
        self.set_pidf_coefficients(RunMode::RunUsingEncoder, PidfCoefficients::new(p, i, d, f))
    }

    fn set_position_pidf_coefficients(&mut self, p: f64) -> Result<(), HalError> {
        self.set_pidf_coefficients(RunMode::RunToPosition, PidfCoefficients::new(p, 0.0, 0.0, 0.0))
    }

    fn set_target_position_tolerance(&mut self, tolerance: i32) -> Result<(), HalError> {
        self.state.borrow_mut().tolerance = tolerance;
        Ok(())
    }

    fn target_position_tolerance(&self) -> i32 {
        self.state.borrow().tolerance
    }

    fn current(&self, unit: CurrentUnit) -> f64 {
        unit.from_milliamps(self.state.borrow().current_ma)
    }

    fn current_alert(&self, unit: CurrentUnit) -> f64 {
        unit.from_milliamps(self.state.borrow().current_alert_ma)
    }

    fn set_current_alert(&mut self, current: f64, unit: CurrentUnit) -> Result<(), HalError> {
        self.state.borrow_mut().current_alert_ma = unit.to_milliamps(current);
        Ok(())
    }

    fn is_over_current(&self) -> bool {
        let s = self.state.borrow();
        s.current_ma > s.current_alert_ma
    }
}

impl CrServo for SimMotor {
    fn controller(&self) -> ControllerInfo {
        sim_controller()
    }

    fn port_number(&self) -> u8 {
        self.state.borrow().port
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Servo
// ────────────────────────────────────────────────────────────────────────────

struct ServoState {
    id: String,
    port: u8,
    direction: Direction,
    position: Option<f64>,
    position_writes: Vec<f64>,
    range: (f64, f64),
    fail_next_write: bool,
    close_count: u32,
}

/// A simulated position servo handle.  Clones share the same device.
#[derive(Clone)]
pub struct SimServo {
    state: Rc<RefCell<ServoState>>,
}

impl SimServo {
    /// Create a simulated servo on port 0.
    pub fn new(id: impl Into<String>) -> Self {
        Self::on_port(id, 0)
    }

    pub fn on_port(id: impl Into<String>, port: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(ServoState {
                id: id.into(),
                port,
                direction: Direction::Forward,
                position: None,
                position_writes: Vec::new(),
                range: (0.0, 1.0),
                fail_next_write: false,
                close_count: 0,
            })),
        }
    }

    /// Every position that reached the device, in order.
    pub fn position_writes(&self) -> Vec<f64> {
        self.state.borrow().position_writes.clone()
    }

    pub fn fail_next_write(&self) {
        self.state.borrow_mut().fail_next_write = true;
    }

    pub fn close_count(&self) -> u32 {
        self.state.borrow().close_count
    }

    /// Physical output in `[0.0, 1.0]` after direction and range scaling, or
    /// `None` before the first command.
    pub fn physical_output(&self) -> Option<f64> {
        let s = self.state.borrow();
        let position = s.position?.clamp(0.0, 1.0);
        let logical = match s.direction {
            Direction::Forward => position,
            Direction::Reverse => 1.0 - position,
        };
        let (min, max) = s.range;
        Some(min + logical * (max - min))
    }
}

impl HardwareDevice for SimServo {
    fn manufacturer(&self) -> Manufacturer {
        Manufacturer::Lynx
    }

    fn device_name(&self) -> String {
        "Sim Servo".to_string()
    }

    fn connection_info(&self) -> String {
        format!("sim; port {}", self.state.borrow().port)
    }

    fn version(&self) -> u32 {
        1
    }

    fn reset_device_configuration(&mut self) -> Result<(), HalError> {
        let mut s = self.state.borrow_mut();
        s.direction = Direction::Forward;
        s.range = (0.0, 1.0);
        Ok(())
    }

    fn close(&mut self) -> Result<(), HalError> {
        self.state.borrow_mut().close_count += 1;
        Ok(())
    }
}

impl Servo for SimServo {
    fn controller(&self) -> ControllerInfo {
        sim_controller()
    }

    fn port_number(&self) -> u8 {
        self.state.borrow().port
    }

    fn direction(&self) -> Direction {
        self.state.borrow().direction
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), HalError> {
        self.state.borrow_mut().direction = direction;
        Ok(())
    }

    fn position(&self) -> f64 {
        self.state.borrow().position.unwrap_or(f64::NAN)
    }

    fn set_position(&mut self, position: f64) -> Result<(), HalError> {
        let mut s = self.state.borrow_mut();
        if s.fail_next_write {
            s.fail_next_write = false;
            return Err(injected_fault(&s.id));
        }
        s.position_writes.push(position);
        s.position = Some(position.clamp(0.0, 1.0));
        Ok(())
    }

    fn scale_range(&mut self, min: f64, max: f64) -> Result<(), HalError> {
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min >= max {
            let s = self.state.borrow();
            return Err(HalError::HardwareFault {
                component: s.id.clone(),
                details: format!("invalid servo range [{min}, {max}]"),
            });
        }
        self.state.borrow_mut().range = (min, max);
        Ok(())
    }
}
