//! `calcite-hal` – hardware-output caching for actuator handles.
//!
//! A control loop recomputes its outputs every cycle, but writing each value
//! to the shared control bus costs bandwidth and loop latency.  The wrappers
//! in this crate sit between the loop and the actuator handle and only
//! forward a write when it matters, while still guaranteeing that commands
//! for rest and full output always get through.
//!
//! # Modules
//!
//! - [`device`] – capability traits for actuator handles
//!   ([`HardwareDevice`], [`MotorSimple`], [`Motor`], [`MotorEx`],
//!   [`Servo`], [`CrServo`]).
//! - [`cache`] – the [`CachedOutput`] trait and the three hysteresis caches
//!   ([`PowerCache`], [`TargetPositionCache`], [`PositionCache`]).
//! - [`motor`] – [`CachingMotorSimple`], [`CachingMotor`], [`CachingMotorEx`].
//! - [`servo`] – [`CachingServo`], [`CachingCrServo`].
//! - [`config`] – [`CacheConfig`]: thresholds and write-failure policy
//!   loaded from TOML.
//! - [`sim`] – simulated handles for headless tests.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing].
//!
//! # Threading
//!
//! Wrappers hold no locks.  Drive each wrapper from one control-loop thread;
//! sharing one across threads needs external synchronisation.

pub mod cache;
pub mod config;
pub mod device;
pub mod motor;
pub mod servo;
pub mod sim;
pub mod telemetry;

pub use cache::{CachedOutput, PositionCache, PowerCache, TargetPositionCache, WriteFailurePolicy};
pub use config::CacheConfig;
pub use device::{CrServo, HardwareDevice, Motor, MotorEx, MotorSimple, Servo};
pub use motor::{CachingMotor, CachingMotorEx, CachingMotorSimple};
pub use servo::{CachingCrServo, CachingServo};
