//! Tabulated gas medium.
//! Answers drift velocity queries from the table stored in a `.gas` file,
//! scaled to the current pressure and temperature through the reduced field.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::gasfile::{read_gas_file, GasTable};
use crate::medium::Medium;
use crate::units::{bar_to_torr, torr_to_bar};

#[derive(Debug, Clone)]
pub struct Gas {
    name: String,
    source: Option<PathBuf>,
    table: GasTable,
    /// Bar
    pressure: f64,
    /// Kelvin
    temperature: f64,
}

impl Gas {
    /// A gas at the table's reference pressure and temperature.
    pub fn from_table(name: impl Into<String>, table: GasTable) -> Self {
        let pressure = torr_to_bar(table.reference_pressure);
        let temperature = table.reference_temperature;
        Gas {
            name: name.into(),
            source: None,
            table,
            pressure,
            temperature,
        }
    }

    pub(crate) fn load(path: &Path) -> Result<Self> {
        let table = read_gas_file(path)?;
        let name = if table.identifier.is_empty() {
            path.file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("gas")
                .to_string()
        } else {
            table.identifier.clone()
        };
        let mut gas = Gas::from_table(name, table);
        gas.source = Some(path.to_path_buf());
        Ok(gas)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn table(&self) -> &GasTable {
        &self.table
    }

    /// E/p in table units, V/(cm Torr), for a field in V/cm at the current
    /// pressure and temperature.
    pub fn reduced_field(&self, electric_field: f64) -> f64 {
        electric_field / bar_to_torr(self.pressure)
            * (self.temperature / self.table.reference_temperature)
    }

    /// Multi-line description of the loaded table.
    pub fn summary(&self) -> String {
        let (lo, hi) = self.table.field_range();
        let source = self
            .source()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string());
        format!(
            "{self}\n  source: {source}\n  table: {} points, E/p {lo:.3e} .. {hi:.3e} V/(cm Torr)\n  reference: {:.2} Torr, {:.2} K",
            self.table.len(),
            self.table.reference_pressure,
            self.table.reference_temperature,
        )
    }
}

fn check_positive(what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::EngineFailure(format!("{what} must be positive, got {value}")))
    }
}

impl Medium for Gas {
    fn name(&self) -> &str {
        &self.name
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn set_temperature(&mut self, kelvin: f64) -> Result<()> {
        check_positive("temperature", kelvin)?;
        self.temperature = kelvin;
        Ok(())
    }

    fn pressure(&self) -> f64 {
        self.pressure
    }

    fn set_pressure(&mut self, bar: f64) -> Result<()> {
        check_positive("pressure", bar)?;
        self.pressure = bar;
        Ok(())
    }

    fn drift_velocity(&mut self, electric_field: f64) -> Result<f64> {
        if !electric_field.is_finite() {
            return Err(Error::EngineFailure(format!(
                "electric field is not finite: {electric_field}"
            )));
        }
        let v = self.table.velocity_at(self.reduced_field(electric_field));
        if v.is_finite() {
            Ok(v)
        } else {
            Err(Error::EngineFailure(format!(
                "drift velocity diverged at {electric_field} V/cm"
            )))
        }
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Gas: '{}' - Pressure: {:0.2} Bar - Temperature: {:0.2} K",
            self.name, self.pressure, self.temperature
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::drift_velocity_vs_pressure;

    fn table() -> GasTable {
        GasTable::new(
            "Ar 90%, CO2 10%",
            760.0,
            293.15,
            vec![0.1, 1.0, 10.0],
            vec![0.5, 3.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_starts_at_reference() {
        let gas = Gas::from_table("argon", table());
        assert!((gas.pressure() - 1.01325).abs() < 1e-5);
        assert_eq!(gas.temperature(), 293.15);
        assert_eq!(
            gas.to_string(),
            "Gas: 'argon' - Pressure: 1.01 Bar - Temperature: 293.15 K"
        );
    }

    #[test]
    fn test_reference_conditions_hit_table() {
        let mut gas = Gas::from_table("argon", table());
        // 760 V/cm at 760 Torr is E/p = 1.
        let v = gas.drift_velocity(760.0).unwrap();
        assert!((v - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_doubling_pressure_halves_reduced_field() {
        let mut gas = Gas::from_table("argon", table());
        let p = gas.pressure();
        let low = gas.reduced_field(1000.0);
        gas.set_pressure(2.0 * p).unwrap();
        assert!((gas.reduced_field(1000.0) - low / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_pressure_sweep_is_monotonic_and_restores() {
        let mut gas = Gas::from_table("argon", table());
        let before = (gas.pressure(), gas.temperature());
        let v = drift_velocity_vs_pressure(&mut gas, &[0.5, 1.0, 2.0, 4.0], 760.0, None).unwrap();
        assert!(v.windows(2).all(|w| w[1] < w[0]));
        assert_eq!((gas.pressure(), gas.temperature()), before);
    }

    #[test]
    fn test_rejects_bad_state() {
        let mut gas = Gas::from_table("argon", table());
        assert!(gas.set_pressure(0.0).is_err());
        assert!(gas.set_temperature(f64::NAN).is_err());
        assert!(gas.drift_velocity(f64::INFINITY).is_err());
    }
}
