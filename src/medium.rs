//! Adapter boundary to the physics engine.
//!
//! A [`Medium`] is stateful: temperature and pressure live on the object and
//! every evaluation reads them. All set-then-evaluate work goes through
//! [`StateGuard`], which puts the medium back the way it found it.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{Error, Result};

/// A gas medium that can report electron drift velocity.
///
/// Units: temperature in Kelvin, pressure in Bar, electric field in V/cm,
/// velocity in cm/µs. Evaluation takes `&mut self` because the underlying
/// engine is not reentrant.
pub trait Medium {
    fn name(&self) -> &str;

    fn temperature(&self) -> f64;
    fn set_temperature(&mut self, kelvin: f64) -> Result<()>;

    fn pressure(&self) -> f64;
    fn set_pressure(&mut self, bar: f64) -> Result<()>;

    fn drift_velocity(&mut self, electric_field: f64) -> Result<f64>;
}

/// One evaluation point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conditions {
    /// V/cm
    pub electric_field: f64,
    /// Bar
    pub pressure: f64,
    /// Kelvin
    pub temperature: f64,
}

impl Conditions {
    /// Conditions at the medium's current pressure and temperature.
    pub fn current<M: Medium + ?Sized>(medium: &M, electric_field: f64) -> Self {
        Conditions {
            electric_field,
            pressure: medium.pressure(),
            temperature: medium.temperature(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("electric field", self.electric_field),
            ("pressure", self.pressure),
            ("temperature", self.temperature),
        ] {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!("{label} is not finite: {value}")));
            }
        }
        Ok(())
    }
}

/// Run `work` against `medium`, then put its pressure and temperature back.
///
/// A restore failure is reported in place of `work`'s own result.
pub fn with_restore<M, T, F>(medium: &mut M, work: F) -> Result<T>
where
    M: Medium + ?Sized,
    F: FnOnce(&mut M) -> Result<T>,
{
    let mut guard = StateGuard::new(medium);
    let outcome = work(guard.medium());
    guard.finish(outcome)
}

/// Evaluate drift velocity at `conditions`, leaving the medium untouched.
pub fn evaluate_at<M: Medium + ?Sized>(medium: &mut M, conditions: &Conditions) -> Result<f64> {
    conditions.validate()?;
    with_restore(medium, |m| {
        m.set_pressure(conditions.pressure)?;
        m.set_temperature(conditions.temperature)?;
        m.drift_velocity(conditions.electric_field)
    })
}

/// Scoped save/restore of a medium's pressure and temperature.
///
/// Call [`StateGuard::finish`] to restore and learn whether restoring worked.
/// If the guard is dropped without `finish` (early return, panic) it restores
/// on drop and logs any failure.
pub struct StateGuard<'a, M: Medium + ?Sized> {
    medium: &'a mut M,
    pressure: f64,
    temperature: f64,
    armed: bool,
}

impl<'a, M: Medium + ?Sized> StateGuard<'a, M> {
    pub fn new(medium: &'a mut M) -> Self {
        let pressure = medium.pressure();
        let temperature = medium.temperature();
        StateGuard {
            medium,
            pressure,
            temperature,
            armed: true,
        }
    }

    pub fn medium(&mut self) -> &mut M {
        self.medium
    }

    /// Restore the saved state, then hand back `outcome`.
    ///
    /// A restore failure wins over whatever `outcome` was.
    pub fn finish<T>(mut self, outcome: Result<T>) -> Result<T> {
        self.armed = false;
        match self.restore() {
            Ok(()) => outcome,
            Err(restore_err) => {
                if let Err(e) = &outcome {
                    error!("evaluation failed before restore failure: {e}");
                }
                error!("{restore_err}");
                Err(restore_err)
            }
        }
    }

    fn restore(&mut self) -> Result<()> {
        let (pressure, temperature) = (self.pressure, self.temperature);
        let fail = move |reason: String| Error::StateRestoreFailure {
            pressure,
            temperature,
            reason,
        };

        if self.medium.pressure() != pressure {
            self.medium
                .set_pressure(pressure)
                .map_err(|e| fail(e.to_string()))?;
        }
        if self.medium.temperature() != temperature {
            self.medium
                .set_temperature(temperature)
                .map_err(|e| fail(e.to_string()))?;
        }

        let (p, t) = (self.medium.pressure(), self.medium.temperature());
        if p != pressure || t != temperature {
            return Err(fail(format!("medium reports {p} bar, {t} K after restore")));
        }
        Ok(())
    }
}

impl<M: Medium + ?Sized> Drop for StateGuard<'_, M> {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            if let Err(e) = self.restore() {
                error!("{e}");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeMedium;
    use super::*;

    #[test]
    fn test_evaluate_at_restores() {
        let mut gas = FakeMedium::new(1.0, 293.15);
        let v = evaluate_at(
            &mut gas,
            &Conditions {
                electric_field: 1000.0,
                pressure: 2.0,
                temperature: 300.0,
            },
        )
        .unwrap();
        assert!(v > 0.0);
        assert_eq!(gas.calls[0].pressure, 2.0);
        assert_eq!(gas.calls[0].temperature, 300.0);
        assert_eq!(gas.pressure, 1.0);
        assert_eq!(gas.temperature, 293.15);
    }

    #[test]
    fn test_evaluate_at_restores_on_setter_error() {
        let mut gas = FakeMedium::new(1.0, 293.15);
        let conditions = Conditions {
            electric_field: 100.0,
            pressure: 3.0,
            temperature: -1.0,
        };
        let err = evaluate_at(&mut gas, &conditions).unwrap_err();
        assert!(matches!(err, Error::EngineFailure(_)));
        assert_eq!(gas.pressure, 1.0);
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mut gas = FakeMedium::new(1.0, 293.15);
        {
            let mut guard = StateGuard::new(&mut gas);
            guard.medium().set_pressure(5.0).unwrap();
            guard.medium().set_temperature(400.0).unwrap();
        }
        assert_eq!(gas.pressure, 1.0);
        assert_eq!(gas.temperature, 293.15);
    }

    #[test]
    fn test_restore_failure_wins() {
        let mut gas = FakeMedium::new(1.0, 293.15);
        gas.reject_restore = true;
        let mut guard = StateGuard::new(&mut gas);
        guard.medium().set_pressure(2.0).unwrap();
        let v = guard.medium().drift_velocity(10.0);
        let err = guard.finish(v).unwrap_err();
        assert!(matches!(err, Error::StateRestoreFailure { .. }));
    }

    #[test]
    fn test_with_restore_reports_restore_failure() {
        let mut gas = FakeMedium::new(1.0, 293.15);
        gas.reject_restore = true;
        let err = with_restore(&mut gas, |m| {
            m.set_pressure(2.0)?;
            m.drift_velocity(10.0)
        })
        .unwrap_err();
        match err {
            Error::StateRestoreFailure {
                pressure,
                temperature,
                ..
            } => {
                assert_eq!(pressure, 1.0);
                assert_eq!(temperature, 293.15);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_conditions_reject_nan() {
        let c = Conditions {
            electric_field: f64::NAN,
            pressure: 1.0,
            temperature: 293.0,
        };
        assert!(matches!(c.validate(), Err(Error::InvalidInput(_))));
    }
}
