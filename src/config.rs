use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::grid::Spacing;
use crate::repository::DEFAULT_REMOTE_URL;
use crate::sweep::Axis;

fn default_gas_dir() -> PathBuf {
    PathBuf::from("files").join("gas")
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

/// Settings shared by the CLI and the dashboard. Every field has a default,
/// so an empty YAML document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_gas_dir")]
    pub gas_dir: PathBuf,
    #[serde(default = "default_remote_url")]
    pub remote_url: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub defaults: SweepDefaults,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            gas_dir: default_gas_dir(),
            remote_url: default_remote_url(),
            bind: default_bind(),
            defaults: SweepDefaults::default(),
        }
    }
}

/// Initial sweep shown on the dashboard and used by the CLI when flags are
/// left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepDefaults {
    pub axis: Axis,
    pub start: f64,
    pub stop: f64,
    pub count: usize,
    pub spacing: Spacing,
    /// V/cm, used when the swept axis is pressure or temperature.
    pub electric_field: f64,
    /// Bar
    pub pressure: f64,
    /// Kelvin
    pub temperature: f64,
}

impl Default for SweepDefaults {
    fn default() -> Self {
        SweepDefaults {
            axis: Axis::ElectricField,
            start: 10.0,
            stop: 10_000.0,
            count: 50,
            spacing: Spacing::Log,
            electric_field: 1000.0,
            pressure: 1.0,
            temperature: 293.15,
        }
    }
}

impl Settings {
    /// Read settings from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Settings from `path`, or defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let d = &self.defaults;
        if d.count == 0 {
            return Err(Error::Config("defaults.count must be at least 1".into()));
        }
        if d.pressure <= 0.0 || d.temperature <= 0.0 {
            return Err(Error::Config(
                "defaults.pressure and defaults.temperature must be positive".into(),
            ));
        }
        if d.spacing == Spacing::Log && (d.start <= 0.0 || d.stop <= 0.0) {
            return Err(Error::Config("log spacing needs positive start and stop".into()));
        }
        Ok(())
    }
}
