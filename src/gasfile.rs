use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// Fortran-style numbers. Adjacent fields are not always separated by
/// whitespace (`1.5E+00-2.0E-01`), so numbers are matched, not split.
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?(?:\d+\.\d*|\.\d+|\d+)(?:[eEdD][-+]?\d+)?").expect("number regex")
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*Identifier\s*:(.*)$").expect("identifier regex"));

static DIMENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*Dimension\s*:\s*([TF])\s+(\d+)\s+(\d+)\s+(\d+)").expect("dimension regex")
});

/// Drift velocity table read from a `.gas` definition file.
#[derive(Debug, Clone, PartialEq)]
pub struct GasTable {
    pub identifier: String,
    /// Torr
    pub reference_pressure: f64,
    /// Kelvin
    pub reference_temperature: f64,
    /// E/p in V/(cm Torr), strictly increasing, all positive.
    pub reduced_fields: Vec<f64>,
    /// Drift velocity along E in cm/µs, one per reduced field.
    pub drift_velocities: Vec<f64>,
}

impl GasTable {
    pub fn new(
        identifier: impl Into<String>,
        reference_pressure: f64,
        reference_temperature: f64,
        reduced_fields: Vec<f64>,
        drift_velocities: Vec<f64>,
    ) -> std::result::Result<Self, String> {
        let table = GasTable {
            identifier: identifier.into(),
            reference_pressure,
            reference_temperature,
            reduced_fields,
            drift_velocities,
        };
        table.check()?;
        Ok(table)
    }

    fn check(&self) -> std::result::Result<(), String> {
        if !(self.reference_pressure > 0.0 && self.reference_pressure.is_finite()) {
            return Err(format!("bad reference pressure {}", self.reference_pressure));
        }
        if !(self.reference_temperature > 0.0 && self.reference_temperature.is_finite()) {
            return Err(format!("bad reference temperature {}", self.reference_temperature));
        }
        if self.reduced_fields.is_empty() {
            return Err("no field points".to_string());
        }
        if self.reduced_fields.len() != self.drift_velocities.len() {
            return Err(format!(
                "{} field points but {} velocities",
                self.reduced_fields.len(),
                self.drift_velocities.len()
            ));
        }
        if self.reduced_fields[0] <= 0.0 {
            return Err(format!("first field point {} is not positive", self.reduced_fields[0]));
        }
        if self.reduced_fields.windows(2).any(|w| w[1] <= w[0]) {
            return Err("field points are not strictly increasing".to_string());
        }
        if self
            .reduced_fields
            .iter()
            .chain(self.drift_velocities.iter())
            .any(|v| !v.is_finite())
        {
            return Err("table contains non-finite values".to_string());
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.reduced_fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reduced_fields.is_empty()
    }

    /// Tabulated reduced field range, V/(cm Torr).
    pub fn field_range(&self) -> (f64, f64) {
        let xs = &self.reduced_fields;
        (xs[0], xs[xs.len() - 1])
    }

    /// Drift velocity at a reduced field.
    ///
    /// Linear inside the table. Below the first point the mobility is held
    /// constant (v proportional to E), above the last point the final segment
    /// is extended. Odd in the field.
    pub fn velocity_at(&self, reduced_field: f64) -> f64 {
        let sign = reduced_field.signum();
        let x = reduced_field.abs();
        let xs = &self.reduced_fields;
        let ys = &self.drift_velocities;
        let last = xs.len() - 1;

        let v = if x <= xs[0] || last == 0 {
            ys[0] * x / xs[0]
        } else if x >= xs[last] {
            lerp(xs[last - 1], ys[last - 1], xs[last], ys[last], x)
        } else {
            let i = xs.partition_point(|&p| p <= x);
            lerp(xs[i - 1], ys[i - 1], xs[i], ys[i], x)
        };
        sign * v
    }
}

fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

pub fn read_gas_file(path: &Path) -> Result<GasTable> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let table = parse_gas_table(&content).map_err(|reason| Error::gas_file(path, reason))?;
    debug!(
        "read {:?}: '{}', {} field points",
        path,
        table.identifier,
        table.len()
    );
    Ok(table)
}

pub fn parse_gas_table(content: &str) -> std::result::Result<GasTable, String> {
    let identifier = IDENTIFIER
        .captures(content)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let dim = DIMENSION
        .captures(content)
        .ok_or_else(|| "missing Dimension line".to_string())?;
    let n_fields: usize = dim[2].parse().map_err(|e| format!("dimension: {e}"))?;
    let n_angles: usize = dim[3].parse().map_err(|e| format!("dimension: {e}"))?;
    let n_bfields: usize = dim[4].parse().map_err(|e| format!("dimension: {e}"))?;
    if &dim[1] == "T" && (n_angles > 1 || n_bfields > 1) {
        return Err(format!(
            "tables over {n_angles} E-B angles and {n_bfields} B fields are not supported"
        ));
    }
    if n_fields == 0 {
        return Err("Dimension declares no field points".to_string());
    }

    let lines: Vec<&str> = content.lines().collect();

    let efield_start = lines
        .iter()
        .position(|l| l.trim_start().starts_with("E fields"))
        .ok_or_else(|| "missing E fields section".to_string())?;
    let mut reduced_fields = Vec::with_capacity(n_fields);
    for line in &lines[efield_start + 1..] {
        if reduced_fields.len() >= n_fields || starts_with_letter(line) {
            break;
        }
        reduced_fields.extend(numbers(line));
    }
    if reduced_fields.len() != n_fields {
        return Err(format!(
            "expected {n_fields} E fields, found {}",
            reduced_fields.len()
        ));
    }

    let table_start = lines
        .iter()
        .position(|l| l.contains("The gas tables follow:"))
        .ok_or_else(|| "missing gas tables".to_string())?;
    let mut values = Vec::new();
    for line in &lines[table_start + 1..] {
        if starts_with_letter(line) {
            break;
        }
        values.extend(numbers(line));
    }
    if values.is_empty() || values.len() % n_fields != 0 {
        return Err(format!(
            "{} table values do not split into {n_fields} records",
            values.len()
        ));
    }
    let record = values.len() / n_fields;
    let drift_velocities = values.iter().step_by(record).copied().collect();

    let reference_pressure =
        keyword_value(content, "PGAS").ok_or_else(|| "missing PGAS".to_string())?;
    let reference_temperature =
        keyword_value(content, "TGAS").ok_or_else(|| "missing TGAS".to_string())?;

    GasTable::new(
        identifier,
        reference_pressure,
        reference_temperature,
        reduced_fields,
        drift_velocities,
    )
}

fn starts_with_letter(line: &str) -> bool {
    line.trim_start()
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false)
}

fn numbers(line: &str) -> impl Iterator<Item = f64> + '_ {
    NUMBER
        .find_iter(line)
        .filter_map(|m| m.as_str().replace(['d', 'D'], "E").parse::<f64>().ok())
}

fn keyword_value(content: &str, key: &str) -> Option<f64> {
    let escaped = regex::escape(key);
    let re = Regex::new(&format!(r"{escaped}\s*=\s*([-+0-9EeDd\.]+)")).ok()?;
    re.captures(content)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().replace(['d', 'D'], "E").parse::<f64>().ok())
}
