use gasdrift::{sweep, Axis, Error, FixedValues, Medium, Result};
use proptest::prelude::*;

/// Medium whose velocity depends on all three inputs and which can be told
/// to fail on a given evaluation.
struct Recorder {
    pressure: f64,
    temperature: f64,
    evaluations: usize,
    fail_at: Option<usize>,
}

impl Recorder {
    fn new(pressure: f64, temperature: f64) -> Self {
        Recorder {
            pressure,
            temperature,
            evaluations: 0,
            fail_at: None,
        }
    }
}

impl Medium for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn temperature(&self) -> f64 {
        self.temperature
    }

    fn set_temperature(&mut self, kelvin: f64) -> Result<()> {
        self.temperature = kelvin;
        Ok(())
    }

    fn pressure(&self) -> f64 {
        self.pressure
    }

    fn set_pressure(&mut self, bar: f64) -> Result<()> {
        self.pressure = bar;
        Ok(())
    }

    fn drift_velocity(&mut self, electric_field: f64) -> Result<f64> {
        let n = self.evaluations;
        self.evaluations += 1;
        if self.fail_at == Some(n) {
            return Err(Error::EngineFailure(format!("evaluation {n} diverged")));
        }
        Ok(electric_field * self.temperature / (self.pressure * 1000.0))
    }
}

fn any_axis() -> impl Strategy<Value = Axis> {
    prop_oneof![
        Just(Axis::ElectricField),
        Just(Axis::Pressure),
        Just(Axis::Temperature)
    ]
}

fn any_fixed() -> impl Strategy<Value = FixedValues> {
    (
        proptest::option::of(1.0f64..1e4),
        proptest::option::of(0.1f64..10.0),
        proptest::option::of(100.0f64..500.0),
    )
        .prop_map(|(electric_field, pressure, temperature)| FixedValues {
            electric_field: electric_field.or(Some(500.0)),
            pressure,
            temperature,
        })
}

proptest! {
    #[test]
    fn result_matches_input_and_state_is_restored(
        axis in any_axis(),
        values in proptest::collection::vec(0.5f64..1000.0, 0..40),
        fixed in any_fixed(),
        p0 in 0.1f64..10.0,
        t0 in 100.0f64..500.0,
    ) {
        let mut medium = Recorder::new(p0, t0);
        let result = sweep(&mut medium, axis, &values, &fixed).unwrap();
        prop_assert_eq!(result.len(), values.len());
        prop_assert_eq!(medium.evaluations, values.len());
        prop_assert_eq!(medium.pressure, p0);
        prop_assert_eq!(medium.temperature, t0);
    }

    #[test]
    fn state_is_restored_after_failure(
        axis in any_axis(),
        values in proptest::collection::vec(0.5f64..1000.0, 1..40),
        fixed in any_fixed(),
        fail_frac in 0.0f64..1.0,
    ) {
        let mut medium = Recorder::new(1.0, 293.15);
        let fail_at = ((values.len() as f64) * fail_frac) as usize;
        medium.fail_at = Some(fail_at);
        let err = sweep(&mut medium, axis, &values, &fixed).unwrap_err();
        prop_assert!(matches!(err, Error::EngineFailure(_)));
        prop_assert_eq!(medium.evaluations, fail_at + 1);
        prop_assert_eq!(medium.pressure, 1.0);
        prop_assert_eq!(medium.temperature, 293.15);
    }

    #[test]
    fn order_follows_input(values in proptest::collection::vec(1.0f64..1e4, 1..30)) {
        let mut medium = Recorder::new(1.0, 300.0);
        let result = sweep(&mut medium, Axis::ElectricField, &values, &FixedValues::default()).unwrap();
        for (e, v) in values.iter().zip(&result) {
            prop_assert_eq!(*v, e * 300.0 / 1000.0);
        }
    }
}
