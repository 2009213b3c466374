use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// How sweep values are spread between `start` and `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spacing {
    #[default]
    Linear,
    Log,
}

impl FromStr for Spacing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "linear" | "lin" => Ok(Spacing::Linear),
            "log" | "logarithmic" => Ok(Spacing::Log),
            other => Err(Error::InvalidInput(format!("unknown spacing '{other}'"))),
        }
    }
}

/// `count` values from `start` to `stop`, both ends included.
pub fn sample_points(start: f64, stop: f64, count: usize, spacing: Spacing) -> Result<Vec<f64>> {
    if !start.is_finite() || !stop.is_finite() {
        return Err(Error::InvalidInput(format!(
            "range bounds must be finite, got {start} .. {stop}"
        )));
    }
    match count {
        0 => return Ok(Vec::new()),
        1 => return Ok(vec![start]),
        _ => {}
    }

    let last = (count - 1) as f64;
    match spacing {
        Spacing::Linear => {
            let step = (stop - start) / last;
            Ok((0..count)
                .map(|i| if i + 1 == count { stop } else { start + step * i as f64 })
                .collect())
        }
        Spacing::Log => {
            if start <= 0.0 || stop <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "log spacing needs positive bounds, got {start} .. {stop}"
                )));
            }
            let (a, b) = (start.ln(), stop.ln());
            Ok((0..count)
                .map(|i| match i {
                    0 => start,
                    i if i + 1 == count => stop,
                    i => (a + (b - a) * i as f64 / last).exp(),
                })
                .collect())
        }
    }
}
