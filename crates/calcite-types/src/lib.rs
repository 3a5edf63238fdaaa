use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical direction in which a motor or servo operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Sign applied to a commanded output in this direction.
    pub fn multiplier(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Reverse => -1.0,
        }
    }

    /// The opposite direction.
    pub fn inverted(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// Closed-loop mode a positioned motor runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Open-loop power control.
    #[default]
    RunWithoutEncoder,
    /// Velocity control using the encoder.
    RunUsingEncoder,
    /// Drive to the commanded target position and hold it.
    RunToPosition,
    /// Stop the motor and zero the encoder.
    StopAndResetEncoder,
}

/// What a motor does when commanded to zero power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroPowerBehavior {
    Unknown,
    Brake,
    #[default]
    Float,
}

/// Device vendor as reported by the handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Manufacturer {
    #[default]
    Unknown,
    Other,
    Lynx,
    Lego,
    HiTechnic,
    ModernRobotics,
    Adafruit,
    Matrix,
    AmsRobotics,
    Sensirion,
    /// Vendor not covered by the list above.
    Named(String),
}

/// Motor model descriptor assigned in the robot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorConfigurationType {
    /// Human-readable model name, e.g. `"GoBILDA 5202/3/4 series"`.
    pub name: String,
    /// Encoder ticks per output-shaft revolution.
    pub ticks_per_rev: f64,
    /// Free-running speed of the output shaft.
    pub max_rpm: f64,
}

impl MotorConfigurationType {
    /// The type reported when nothing has been configured for a port.
    pub fn unspecified() -> Self {
        Self {
            name: "Unspecified Motor".to_string(),
            ticks_per_rev: 0.0,
            max_rpm: 0.0,
        }
    }
}

impl Default for MotorConfigurationType {
    fn default() -> Self {
        Self::unspecified()
    }
}

/// Identity of the controller a device port lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub name: String,
    pub connection_info: String,
}

/// Legacy PID gains.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidCoefficients {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

/// Algorithm a controller applies to [`PidfCoefficients`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorControlAlgorithm {
    LegacyPid,
    #[default]
    Pidf,
}

/// PID gains plus a feed-forward term.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidfCoefficients {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub f: f64,
    pub algorithm: MotorControlAlgorithm,
}

impl PidfCoefficients {
    pub fn new(p: f64, i: f64, d: f64, f: f64) -> Self {
        Self {
            p,
            i,
            d,
            f,
            algorithm: MotorControlAlgorithm::Pidf,
        }
    }
}

impl From<PidCoefficients> for PidfCoefficients {
    fn from(pid: PidCoefficients) -> Self {
        Self {
            p: pid.p,
            i: pid.i,
            d: pid.d,
            f: 0.0,
            algorithm: MotorControlAlgorithm::LegacyPid,
        }
    }
}

/// Angular unit used by unit-qualified velocity calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleUnit {
    Degrees,
    Radians,
}

impl AngleUnit {
    /// Convert `value` expressed in `self` into radians.
    pub fn to_radians(self, value: f64) -> f64 {
        match self {
            AngleUnit::Degrees => value.to_radians(),
            AngleUnit::Radians => value,
        }
    }

    /// Convert `radians` into this unit.
    pub fn from_radians(self, radians: f64) -> f64 {
        match self {
            AngleUnit::Degrees => radians.to_degrees(),
            AngleUnit::Radians => radians,
        }
    }
}

/// Electrical current unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentUnit {
    Amps,
    Milliamps,
}

impl CurrentUnit {
    /// Convert `milliamps` into this unit.
    pub fn from_milliamps(self, milliamps: f64) -> f64 {
        match self {
            CurrentUnit::Amps => milliamps / 1000.0,
            CurrentUnit::Milliamps => milliamps,
        }
    }

    /// Convert `value` expressed in `self` into milliamps.
    pub fn to_milliamps(self, value: f64) -> f64 {
        match self {
            CurrentUnit::Amps => value * 1000.0,
            CurrentUnit::Milliamps => value,
        }
    }
}

/// Error type shared by actuator handles and the caching layer.
///
/// The caching wrappers never construct [`HalError::HardwareFault`] or
/// [`HalError::Unsupported`] themselves; they return whatever the wrapped
/// handle produced.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HalError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Cache Configuration Error: {0}")]
    Config(String),
}
