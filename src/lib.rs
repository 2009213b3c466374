//! Electron drift velocity curves for gas mixtures.
//!
//! The core is [`sweep()`]: vary one of electric field, pressure or
//! temperature on a [`Medium`] while holding the other two, and leave the
//! medium as it was. [`Gas`] is a medium backed by the transport table in a
//! `.gas` definition file; [`GasRepository`] finds those files locally and in
//! a remote archive.

pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod gas;
pub mod gasfile;
pub mod grid;
pub mod medium;
pub mod repository;
pub mod sweep;
pub mod units;

pub use config::Settings;
pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use gas::Gas;
pub use medium::{evaluate_at, with_restore, Conditions, Medium, StateGuard};
pub use repository::{GasRepository, DEFAULT_REMOTE_URL};
pub use sweep::{
    drift_velocity_vs_field, drift_velocity_vs_pressure, drift_velocity_vs_temperature, sweep,
    Axis, Curve, FixedValues, SweepRequest, SweepResult,
};
