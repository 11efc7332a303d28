//! Blend coefficient schedules.
//!
//! A schedule is an evenly spaced ramp over `[0, 1]` warped by a power curve
//! centred on `0.5`. An exponent of `1.0` leaves the ramp linear, larger
//! exponents pull the coefficients toward the centre and smaller ones push them
//! toward the endpoints.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest accepted number of interpolation steps.
pub const MIN_STEP_COUNT: usize = 1;
/// Largest accepted number of interpolation steps.
pub const MAX_STEP_COUNT: usize = 20;
/// Number of interpolation steps used when none is given.
pub const DEFAULT_STEP_COUNT: usize = 12;
/// Curve exponent of a plain linear schedule.
pub const DEFAULT_CURVE_EXPONENT: f64 = 1.0;

/// Parameters of a coefficient schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub step_count: usize,
    pub curve_exponent: f64,
}

impl ScheduleConfig {
    /// Builds a validated schedule config.
    pub fn new(step_count: usize, curve_exponent: f64) -> Result<Self> {
        let config = Self {
            step_count,
            curve_exponent,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the step count and exponent bounds.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_STEP_COUNT..=MAX_STEP_COUNT).contains(&self.step_count) {
            return Err(Error::InvalidScheduleConfig(format!(
                "step count must be in [{MIN_STEP_COUNT}, {MAX_STEP_COUNT}], got {}",
                self.step_count
            )));
        }
        if !self.curve_exponent.is_finite() || self.curve_exponent <= 0.0 {
            return Err(Error::InvalidScheduleConfig(format!(
                "curve exponent must be a finite value > 0, got {}",
                self.curve_exponent
            )));
        }
        Ok(())
    }

    /// Generates the coefficients for this config.
    pub fn alphas(&self) -> Result<Vec<f64>> {
        generate(self.step_count, self.curve_exponent)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            step_count: DEFAULT_STEP_COUNT,
            curve_exponent: DEFAULT_CURVE_EXPONENT,
        }
    }
}

/// Produces `step_count` blend coefficients in `[0, 1]`, in schedule order.
///
/// The first coefficient is always `0.0` and, for two or more steps, the last
/// one is always `1.0`.
pub fn generate(step_count: usize, curve_exponent: f64) -> Result<Vec<f64>> {
    ScheduleConfig {
        step_count,
        curve_exponent,
    }
    .validate()?;

    Ok(linspace(step_count)
        .map(|alpha| warp(alpha, curve_exponent))
        .collect())
}

/// Formats coefficients with two decimals, e.g. `[0.00, 0.50, 1.00]`.
pub fn format_alphas(alphas: &[f64]) -> String {
    let joined = alphas
        .iter()
        .map(|alpha| format!("{alpha:.2}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{joined}]")
}

fn linspace(count: usize) -> impl Iterator<Item = f64> {
    let last = count.saturating_sub(1);
    (0..count).map(move |i| {
        if last == 0 {
            0.0
        } else if i == last {
            1.0
        } else {
            i as f64 / last as f64
        }
    })
}

fn warp(alpha: f64, exponent: f64) -> f64 {
    let shifted = alpha * 2.0 - 1.0;
    // f64::signum(0.0) is 1.0, the centre must stay at 0.5
    let sign = if shifted == 0.0 { 0.0 } else { shifted.signum() };
    (sign * shifted.abs().powf(exponent) + 1.0) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(count: usize) -> Vec<f64> {
        if count == 1 {
            return vec![0.0];
        }
        (0..count).map(|i| i as f64 / (count - 1) as f64).collect()
    }

    #[test]
    fn test_identity_curve_is_linear() {
        for count in MIN_STEP_COUNT..=MAX_STEP_COUNT {
            let alphas = generate(count, 1.0).unwrap();
            let expected = linear(count);
            assert_eq!(alphas.len(), count);
            for (a, b) in alphas.iter().zip(expected.iter()) {
                assert!((a - b).abs() < 1e-12, "count={count}: {a} != {b}");
            }
        }
    }

    #[test]
    fn test_endpoints_fixed() {
        for exponent in [0.25, 0.5, 1.0, 1.5, 2.0, 3.7] {
            for count in 2..=MAX_STEP_COUNT {
                let alphas = generate(count, exponent).unwrap();
                assert_eq!(alphas[0], 0.0);
                assert_eq!(alphas[count - 1], 1.0);
            }
        }
    }

    #[test]
    fn test_single_step() {
        assert_eq!(generate(1, 1.0).unwrap(), vec![0.0]);
        assert_eq!(generate(1, 2.5).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_centre_maps_to_half() {
        for exponent in [0.3, 1.0, 2.0, 5.0] {
            let alphas = generate(3, exponent).unwrap();
            assert_eq!(alphas[1], 0.5);
        }
    }

    #[test]
    fn test_exponent_shapes_curve() {
        // count 5 -> linear [0, .25, .5, .75, 1]
        let squared = generate(5, 2.0).unwrap();
        assert!((squared[1] - 0.375).abs() < 1e-12);
        assert!((squared[3] - 0.625).abs() < 1e-12);

        let rooted = generate(5, 0.5).unwrap();
        let expected = (1.0 - 0.5f64.sqrt()) / 2.0;
        assert!((rooted[1] - expected).abs() < 1e-12);
        assert!(rooted[1] < 0.25);
    }

    #[test]
    fn test_alphas_in_unit_range() {
        for exponent in [0.1, 0.9, 1.0, 4.0] {
            for alpha in generate(MAX_STEP_COUNT, exponent).unwrap() {
                assert!((0.0..=1.0).contains(&alpha));
            }
        }
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(generate(0, 1.0), Err(Error::InvalidScheduleConfig(_))));
        assert!(matches!(generate(21, 1.0), Err(Error::InvalidScheduleConfig(_))));
        assert!(matches!(generate(4, 0.0), Err(Error::InvalidScheduleConfig(_))));
        assert!(matches!(generate(4, -1.0), Err(Error::InvalidScheduleConfig(_))));
        assert!(matches!(
            generate(4, f64::NAN),
            Err(Error::InvalidScheduleConfig(_))
        ));
        assert!(ScheduleConfig::new(20, 0.01).is_ok());
    }

    #[test]
    fn test_format_alphas() {
        assert_eq!(format_alphas(&[0.0, 0.5, 1.0]), "[0.00, 0.50, 1.00]");
        assert_eq!(format_alphas(&[]), "[]");
    }
}
