//! Time series extracted from single integrations.
//!
//! Each study integrates once, samples the dense solution on an even grid and
//! hands back plain columns ready for plotting or histogramming elsewhere.

use crate::scenario::{LorenzScenario, PendulumScenario};
use anyhow::{Context, Result};
use chaos_core::{
    integrate, integrate_dense, FlipEvent, ForcedPendulum, IntegrationStats, Lorenz, Samples,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// `count` evenly spaced points from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i + 1 == count { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Maps an angle into (-pi, pi].
pub fn wrap_angle(theta: f64) -> f64 {
    let wrapped = (theta + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

/// Differences between consecutive event times.
pub fn event_gaps(times: &[f64]) -> Vec<f64> {
    times.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendulumSeries {
    pub times: Vec<f64>,
    /// Unwrapped angle as integrated.
    pub angle: Vec<f64>,
    pub wrapped_angle: Vec<f64>,
    pub velocity: Vec<f64>,
    pub stats: IntegrationStats,
}

/// Samples the pendulum angle and velocity on the scenario grid.
pub fn pendulum_series(scenario: &PendulumScenario) -> Result<PendulumSeries> {
    scenario.validate()?;
    let times = linspace(scenario.t_start, scenario.t_end, scenario.samples);
    let run = integrate_dense(
        &ForcedPendulum::new(scenario.params),
        scenario.span(),
        &scenario.initial_state(),
        &scenario.settings,
        Some(&times),
    )
    .context("Pendulum integration rejected its inputs.")?
    .into_result()
    .context("Pendulum integration failed.")?;

    let samples = run.samples.unwrap_or_default();
    let angle = samples.component(0);
    Ok(PendulumSeries {
        wrapped_angle: angle.iter().copied().map(wrap_angle).collect(),
        velocity: samples.component(1),
        angle,
        times: samples.times,
        stats: run.stats,
    })
}

/// Flip times of the pendulum and the waiting time between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlipStatistics {
    pub times: Vec<f64>,
    pub gaps: Vec<f64>,
}

impl FlipStatistics {
    pub fn count(&self) -> usize {
        self.times.len()
    }

    pub fn mean_gap(&self) -> Option<f64> {
        if self.gaps.is_empty() {
            None
        } else {
            Some(self.gaps.iter().sum::<f64>() / self.gaps.len() as f64)
        }
    }
}

/// Integrates the pendulum with flip detection over the scenario span.
pub fn flip_statistics(scenario: &PendulumScenario) -> Result<FlipStatistics> {
    let run = integrate(
        &ForcedPendulum::new(scenario.params),
        scenario.span(),
        &scenario.initial_state(),
        &scenario.settings,
        None,
        Some(&FlipEvent),
    )
    .context("Pendulum integration rejected its inputs.")?
    .into_result()
    .context("Pendulum integration failed.")?;

    let times = run.events.map(|record| record.times()).unwrap_or_default();
    Ok(FlipStatistics {
        gaps: event_gaps(&times),
        times,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LorenzSeries {
    pub times: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub stats: IntegrationStats,
}

/// Samples one Lorenz trajectory on the scenario grid.
pub fn lorenz_series(scenario: &LorenzScenario) -> Result<LorenzSeries> {
    scenario.validate()?;
    let times = linspace(scenario.t_start, scenario.t_end, scenario.samples);
    let run = integrate_dense(
        &Lorenz::new(scenario.params),
        scenario.span(),
        &scenario.initial_state,
        &scenario.settings,
        Some(&times),
    )
    .context("Lorenz integration rejected its inputs.")?
    .into_result()
    .context("Lorenz integration failed.")?;

    let samples: Samples = run.samples.unwrap_or_default();
    Ok(LorenzSeries {
        x: samples.component(0),
        y: samples.component(1),
        z: samples.component(2),
        times: samples.times,
        stats: run.stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_core::IntegratorSettings;

    #[test]
    fn linspace_includes_both_endpoints() {
        let grid = linspace(0.0, 200.0, 1000);
        assert_eq!(grid.len(), 1000);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[999], 200.0);
        assert!((grid[1] - 200.0 / 999.0).abs() < 1e-12);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
        assert!(linspace(3.0, 4.0, 0).is_empty());
    }

    #[test]
    fn wrap_angle_lands_in_half_open_interval() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), PI);
        assert!((wrap_angle(2.0 * PI + 0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_angle(-0.5) + 0.5).abs() < 1e-12);
        for k in -20..20 {
            let wrapped = wrap_angle(0.37 * k as f64);
            assert!(wrapped > -PI && wrapped <= PI);
        }
    }

    #[test]
    fn event_gaps_are_consecutive_differences() {
        assert_eq!(event_gaps(&[1.0, 3.0, 7.5]), vec![2.0, 4.5]);
        assert!(event_gaps(&[1.0]).is_empty());
        assert!(event_gaps(&[]).is_empty());
    }

    #[test]
    fn pendulum_series_samples_full_grid() {
        let scenario = PendulumScenario::default();
        let series = pendulum_series(&scenario).expect("pendulum series");
        assert_eq!(series.times.len(), scenario.samples);
        assert_eq!(series.angle.len(), scenario.samples);
        assert_eq!(series.velocity.len(), scenario.samples);
        assert_eq!(series.angle[0], scenario.initial_angle);
        assert_eq!(series.velocity[0], 0.0);
        assert_eq!(series.times[scenario.samples - 1], scenario.t_end);
        for (raw, wrapped) in series.angle.iter().zip(series.wrapped_angle.iter()) {
            assert!(*wrapped > -PI && *wrapped <= PI);
            assert!((wrapped.sin() - raw.sin()).abs() < 1e-9);
            assert!((wrapped.cos() - raw.cos()).abs() < 1e-9);
        }
        assert!(series.stats.accepted > 0);
    }

    #[test]
    fn flip_statistics_report_gaps_between_flips() {
        let stats = flip_statistics(&PendulumScenario::default()).expect("flip statistics");
        assert!(stats.count() > 1);
        assert_eq!(stats.gaps.len(), stats.count() - 1);
        assert!(stats.gaps.iter().all(|gap| *gap > 0.0));
        assert!(stats.times.iter().all(|t| *t > 0.0 && *t <= 200.0));
        assert!(stats.mean_gap().is_some_and(|mean| mean > 0.0));
    }

    #[test]
    fn lorenz_series_starts_at_initial_condition() {
        let scenario = LorenzScenario::default();
        let series = lorenz_series(&scenario).expect("lorenz series");
        assert_eq!(series.times.len(), scenario.samples);
        assert_eq!([series.x[0], series.y[0], series.z[0]], [0.0, 1.0, 1.0]);
        assert!(series.x.iter().all(|x| x.abs() < 30.0));
        assert!(series.z.iter().all(|z| *z > 0.0 && *z < 50.0));
    }

    #[test]
    fn failed_runs_surface_as_errors() {
        let scenario = LorenzScenario {
            settings: IntegratorSettings {
                max_steps: 1,
                ..IntegratorSettings::default()
            },
            ..LorenzScenario::default()
        };
        let err = lorenz_series(&scenario).expect_err("step limit");
        let message = format!("{err:#}");
        assert!(message.contains("Lorenz integration failed"));
        assert!(message.contains("Step limit"));

        let scenario = PendulumScenario {
            t_end: -1.0,
            ..PendulumScenario::default()
        };
        let err = flip_statistics(&scenario).expect_err("bad span");
        assert!(format!("{err:#}").contains("Invalid time span"));
    }
}
