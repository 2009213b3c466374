//! Drift velocity sweeps along one axis.
//!
//! One of electric field, pressure or temperature varies over a list of
//! values while the other two are held fixed. The medium's pressure and
//! temperature are put back once the sweep ends, whether it succeeded or not.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{Error, Result};
use crate::medium::{with_restore, Medium};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    #[serde(alias = "field")]
    ElectricField,
    Pressure,
    Temperature,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::ElectricField, Axis::Pressure, Axis::Temperature];

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::ElectricField => "field",
            Axis::Pressure => "pressure",
            Axis::Temperature => "temperature",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Axis::ElectricField => "V/cm",
            Axis::Pressure => "bar",
            Axis::Temperature => "K",
        }
    }

    /// Axis title for plots, e.g. `Electric field [V/cm]`.
    pub fn label(self) -> String {
        let name = match self {
            Axis::ElectricField => "Electric field",
            Axis::Pressure => "Pressure",
            Axis::Temperature => "Temperature",
        };
        format!("{name} [{}]", self.unit())
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Axis {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "field" | "e" | "electric_field" | "electric-field" => Ok(Axis::ElectricField),
            "pressure" | "p" => Ok(Axis::Pressure),
            "temperature" | "t" => Ok(Axis::Temperature),
            other => {
                let known: Vec<&str> = Axis::ALL.iter().map(|a| a.as_str()).collect();
                Err(Error::InvalidInput(format!(
                    "unknown axis '{other}', expected one of {}",
                    known.join(", ")
                )))
            }
        }
    }
}

/// Values held constant during a sweep. `None` keeps the medium's current
/// value. A value given for the swept axis itself is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedValues {
    pub electric_field: Option<f64>,
    pub pressure: Option<f64>,
    pub temperature: Option<f64>,
}

impl FixedValues {
    pub fn with_electric_field(mut self, v_per_cm: f64) -> Self {
        self.electric_field = Some(v_per_cm);
        self
    }

    pub fn with_pressure(mut self, bar: f64) -> Self {
        self.pressure = Some(bar);
        self
    }

    pub fn with_temperature(mut self, kelvin: f64) -> Self {
        self.temperature = Some(kelvin);
        self
    }

    fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("electric field", self.electric_field),
            ("pressure", self.pressure),
            ("temperature", self.temperature),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::InvalidInput(format!("fixed {label} is not finite: {v}")));
                }
            }
        }
        Ok(())
    }
}

/// Velocities in cm/µs, one per varying value, in input order.
pub type SweepResult = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRequest {
    pub axis: Axis,
    pub values: Vec<f64>,
    #[serde(default)]
    pub fixed: FixedValues,
}

impl SweepRequest {
    pub fn new(axis: Axis, values: Vec<f64>) -> Self {
        SweepRequest {
            axis,
            values,
            fixed: FixedValues::default(),
        }
    }

    pub fn fixed(mut self, fixed: FixedValues) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn run<M: Medium + ?Sized>(&self, medium: &mut M) -> Result<Curve> {
        let y = sweep(medium, self.axis, &self.values, &self.fixed)?;
        Ok(Curve {
            axis: self.axis,
            x: self.values.clone(),
            y,
        })
    }
}

/// A sampled curve, `x` on the swept axis and `y` the drift velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub axis: Axis,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Curve {
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Sweep `axis` over `values`, evaluating drift velocity at each one.
///
/// Every entry is evaluated on its own, duplicates included. An empty
/// `values` returns an empty result without touching the medium. Engine
/// errors stop the sweep and are returned after the medium is restored.
pub fn sweep<M: Medium + ?Sized>(
    medium: &mut M,
    axis: Axis,
    values: &[f64],
    fixed: &FixedValues,
) -> Result<SweepResult> {
    if values.is_empty() {
        return Ok(Vec::new());
    }
    if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(Error::InvalidInput(format!(
            "{axis} value #{i} is not finite: {v}"
        )));
    }
    fixed.validate()?;

    let field = match axis {
        Axis::ElectricField => None,
        Axis::Pressure | Axis::Temperature => Some(fixed.electric_field.ok_or_else(|| {
            Error::InvalidInput(format!("{axis} sweep needs a fixed electric field"))
        })?),
    };

    let _span = tracing::debug_span!("sweep", medium = medium.name(), %axis, samples = values.len())
        .entered();

    let result = with_restore(medium, |m| {
        if axis != Axis::Pressure {
            if let Some(p) = fixed.pressure {
                m.set_pressure(p)?;
            }
        }
        if axis != Axis::Temperature {
            if let Some(t) = fixed.temperature {
                m.set_temperature(t)?;
            }
        }

        let mut velocities = Vec::with_capacity(values.len());
        for &v in values {
            let e = match axis {
                Axis::ElectricField => v,
                Axis::Pressure => {
                    m.set_pressure(v)?;
                    field.unwrap_or_default()
                }
                Axis::Temperature => {
                    m.set_temperature(v)?;
                    field.unwrap_or_default()
                }
            };
            velocities.push(m.drift_velocity(e)?);
        }
        Ok(velocities)
    });
    if let Ok(v) = &result {
        debug!("sweep done, {} samples", v.len());
    }
    result
}

/// Drift velocity versus electric field (V/cm).
pub fn drift_velocity_vs_field<M: Medium + ?Sized>(
    medium: &mut M,
    electric_fields: &[f64],
    pressure: Option<f64>,
    temperature: Option<f64>,
) -> Result<SweepResult> {
    let fixed = FixedValues {
        electric_field: None,
        pressure,
        temperature,
    };
    sweep(medium, Axis::ElectricField, electric_fields, &fixed)
}

/// Drift velocity versus pressure (bar) at a fixed field.
pub fn drift_velocity_vs_pressure<M: Medium + ?Sized>(
    medium: &mut M,
    pressures: &[f64],
    electric_field: f64,
    temperature: Option<f64>,
) -> Result<SweepResult> {
    let fixed = FixedValues {
        electric_field: Some(electric_field),
        pressure: None,
        temperature,
    };
    sweep(medium, Axis::Pressure, pressures, &fixed)
}

/// Drift velocity versus temperature (K) at a fixed field.
pub fn drift_velocity_vs_temperature<M: Medium + ?Sized>(
    medium: &mut M,
    temperatures: &[f64],
    electric_field: f64,
    pressure: Option<f64>,
) -> Result<SweepResult> {
    let fixed = FixedValues {
        electric_field: Some(electric_field),
        pressure,
        temperature: None,
    };
    sweep(medium, Axis::Temperature, temperatures, &fixed)
}
