use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in our vector fields.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Converts an `f64` constant into `T`.
/// A value `T` cannot represent becomes NaN so it surfaces as a non-finite state.
pub fn constant<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Represents a continuous-time dynamical system x' = f(t, x).
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// t: current time
    /// x: current state
    /// out: buffer to write dx/dt
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// Value of an event function at a single point of the trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSample {
    /// Signed indicator; an event is a sign change of this value.
    pub indicator: f64,
    /// Direction filter; a crossing only counts while this holds.
    pub direction: bool,
}

/// A scalar event monitored along an integration.
pub trait EventFunction {
    fn evaluate(&self, t: f64, x: &[f64]) -> EventSample;
}

impl<F> EventFunction for F
where
    F: Fn(f64, &[f64]) -> EventSample,
{
    fn evaluate(&self, t: f64, x: &[f64]) -> EventSample {
        self(t, x)
    }
}
