use anyhow::{bail, Result};
use chaos_core::{IntegratorSettings, LorenzParams, PendulumParams};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Driven pendulum run: parameters, release state and sampling grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendulumScenario {
    pub params: PendulumParams,
    /// Release angle in radians.
    pub initial_angle: f64,
    pub initial_velocity: f64,
    pub t_start: f64,
    pub t_end: f64,
    /// Number of evenly spaced sample times, endpoints included.
    pub samples: usize,
    pub settings: IntegratorSettings,
}

impl Default for PendulumScenario {
    fn default() -> Self {
        Self {
            params: PendulumParams::default(),
            initial_angle: PI / 6.0,
            initial_velocity: 0.0,
            t_start: 0.0,
            t_end: 200.0,
            samples: 1000,
            settings: IntegratorSettings::default(),
        }
    }
}

impl PendulumScenario {
    pub fn initial_state(&self) -> [f64; 2] {
        [self.initial_angle, self.initial_velocity]
    }

    pub fn span(&self) -> (f64, f64) {
        (self.t_start, self.t_end)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_grid(self.samples)
    }
}

/// Lorenz run from a single initial condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LorenzScenario {
    pub params: LorenzParams,
    pub initial_state: [f64; 3],
    pub t_start: f64,
    pub t_end: f64,
    pub samples: usize,
    pub settings: IntegratorSettings,
}

impl Default for LorenzScenario {
    fn default() -> Self {
        Self {
            params: LorenzParams::default(),
            initial_state: [0.0, 1.0, 1.0],
            t_start: 0.0,
            t_end: 50.0,
            samples: 1000,
            settings: IntegratorSettings::default(),
        }
    }
}

impl LorenzScenario {
    pub fn span(&self) -> (f64, f64) {
        (self.t_start, self.t_end)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_grid(self.samples)
    }
}

fn validate_grid(samples: usize) -> Result<()> {
    if samples < 2 {
        bail!("A sample grid needs at least two points (got {samples}).");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pendulum_defaults_match_reference_run() {
        let scenario = PendulumScenario::default();
        assert_eq!(scenario.params.damping, 0.5);
        assert_eq!(scenario.params.forcing, 1.37);
        assert_eq!(scenario.params.detuning, 1.0 / 3.0);
        assert_eq!(scenario.initial_state(), [PI / 6.0, 0.0]);
        assert_eq!(scenario.span(), (0.0, 200.0));
        assert_eq!(scenario.samples, 1000);
        assert_eq!(scenario.settings.relative_tolerance, 1e-3);
        assert_eq!(scenario.settings.absolute_tolerance, 1e-6);
    }

    #[test]
    fn lorenz_defaults_match_reference_run() {
        let scenario = LorenzScenario::default();
        assert_eq!(scenario.params.sigma, 10.0);
        assert_eq!(scenario.params.rho, 28.0);
        assert_eq!(scenario.params.beta, 8.0 / 3.0);
        assert_eq!(scenario.initial_state, [0.0, 1.0, 1.0]);
        assert_eq!(scenario.span(), (0.0, 50.0));
    }

    #[test]
    fn grids_need_two_points() {
        let scenario = LorenzScenario {
            samples: 1,
            ..LorenzScenario::default()
        };
        let err = scenario.validate().expect_err("single point grid");
        assert!(err.to_string().contains("at least two points"));
        assert!(PendulumScenario::default().validate().is_ok());
    }
}
