//! Vector fields studied by the workspace.
//!
//! Each field owns its parameter set, so two integrations with different
//! parameters never share state and can run side by side.

use crate::traits::{constant, DynamicalSystem, EventFunction, EventSample, Scalar};
use serde::{Deserialize, Serialize};

/// Parameters of the dimensionless driven, damped pendulum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendulumParams {
    /// Damping coefficient `K`.
    pub damping: f64,
    /// Forcing amplitude `F`.
    pub forcing: f64,
    /// Forcing-frequency detuning `η`; the drive oscillates as `cos((1 - η) t)`.
    pub detuning: f64,
}

impl Default for PendulumParams {
    fn default() -> Self {
        Self {
            damping: 0.5,
            forcing: 1.37,
            detuning: 1.0 / 3.0,
        }
    }
}

/// theta'' = -K theta' - sin(theta) + F cos((1 - eta) t), as the state [theta, omega].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForcedPendulum {
    pub params: PendulumParams,
}

impl ForcedPendulum {
    pub fn new(params: PendulumParams) -> Self {
        Self { params }
    }
}

impl<T: Scalar> DynamicalSystem<T> for ForcedPendulum {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        let damping = constant::<T>(self.params.damping);
        let forcing = constant::<T>(self.params.forcing);
        let drive_rate = constant::<T>(1.0 - self.params.detuning);

        let (theta, omega) = (x[0], x[1]);
        out[0] = omega;
        out[1] = -damping * omega - theta.sin() + forcing * (drive_rate * t).cos();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LorenzParams {
    pub sigma: f64,
    pub rho: f64,
    pub beta: f64,
}

impl Default for LorenzParams {
    fn default() -> Self {
        Self {
            sigma: 10.0,
            rho: 28.0,
            beta: 8.0 / 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lorenz {
    pub params: LorenzParams,
}

impl Lorenz {
    pub fn new(params: LorenzParams) -> Self {
        Self { params }
    }
}

impl<T: Scalar> DynamicalSystem<T> for Lorenz {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let sigma = constant::<T>(self.params.sigma);
        let rho = constant::<T>(self.params.rho);
        let beta = constant::<T>(self.params.beta);

        let (px, py, pz) = (x[0], x[1], x[2]);
        out[0] = sigma * (py - px);
        out[1] = px * (rho - pz) - py;
        out[2] = px * py - beta * pz;
    }
}

/// Pendulum flip detector.
///
/// The indicator is `theta * omega`, which changes sign whenever the pendulum
/// passes the origin or turns around; only crossings made while `omega > 0`
/// are counted, i.e. forward motion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlipEvent;

impl EventFunction for FlipEvent {
    fn evaluate(&self, _t: f64, x: &[f64]) -> EventSample {
        EventSample {
            indicator: x[0] * x[1],
            direction: x[1] > 0.0,
        }
    }
}
