//! Adaptive integration driver.
//!
//! [`integrate`] validates its inputs, steps the Dormand-Prince pair from t0 to
//! t1 under PI step control, keeps every accepted step as a dense segment and
//! runs event detection after each acceptance.

use crate::dense::{DenseSolution, Segment};
use crate::error::IntegrationError;
use crate::events::{EventDetector, EventRecord};
use crate::solvers::{initial_step, step_underflows, DormandPrince, StepController};
use crate::traits::{DynamicalSystem, EventFunction, EventSample};
use serde::{Deserialize, Serialize};

/// Recognized integrator options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    /// Per-component error floor.
    pub absolute_tolerance: f64,
    /// Per-component error relative to the state magnitude.
    pub relative_tolerance: f64,
    /// Hard ceiling on the step size. Defaults to the span length.
    pub max_step: Option<f64>,
    /// Starting step guess. Estimated from the vector field when absent.
    pub initial_step: Option<f64>,
    /// Ceiling on attempted steps, accepted or rejected.
    pub max_steps: usize,
    /// Stop once this many events have been recorded.
    pub event_limit: Option<usize>,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            absolute_tolerance: 1e-6,
            relative_tolerance: 1e-3,
            max_step: None,
            initial_step: None,
            max_steps: 100_000,
            event_limit: None,
        }
    }
}

impl IntegratorSettings {
    fn validate(&self) -> Result<(), IntegrationError> {
        let invalid = |message: &str| Err(IntegrationError::InvalidSettings(message.to_string()));
        if !(self.absolute_tolerance.is_finite() && self.absolute_tolerance >= 0.0) {
            return invalid("absolute_tolerance must be finite and non-negative.");
        }
        if !(self.relative_tolerance.is_finite() && self.relative_tolerance >= 0.0) {
            return invalid("relative_tolerance must be finite and non-negative.");
        }
        if self.absolute_tolerance == 0.0 && self.relative_tolerance == 0.0 {
            return invalid("absolute_tolerance and relative_tolerance cannot both be zero.");
        }
        if let Some(h) = self.max_step {
            if !(h.is_finite() && h > 0.0) {
                return invalid("max_step must be finite and positive.");
            }
        }
        if let Some(h) = self.initial_step {
            if !(h.is_finite() && h > 0.0) {
                return invalid("initial_step must be finite and positive.");
            }
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be greater than zero.");
        }
        if self.event_limit == Some(0) {
            return invalid("event_limit must be at least one when set.");
        }
        Ok(())
    }
}

/// Counters reported for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    /// Vector field evaluations, including the initial step estimate.
    pub evaluations: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Reached the end of the requested span.
    Completed,
    /// Stopped at the event that reached `event_limit`.
    EventLimit,
    /// Aborted by a fatal numerical failure; everything produced before it is kept.
    Failed(IntegrationError),
}

/// Result of one [`integrate`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct Integration {
    pub solution: DenseSolution,
    /// Present when an event function was supplied.
    pub events: Option<EventRecord>,
    /// States at the requested evaluation times that fall in the covered span.
    pub samples: Option<Samples>,
    pub stats: IntegrationStats,
    pub termination: Termination,
}

impl Integration {
    pub fn failure(&self) -> Option<&IntegrationError> {
        match &self.termination {
            Termination::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Turns a failed run into its error, for callers that only want complete results.
    pub fn into_result(self) -> Result<Self, IntegrationError> {
        match self.termination {
            Termination::Failed(err) => Err(err),
            _ => Ok(self),
        }
    }
}

/// States sampled from the dense solution at caller-chosen times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Samples {
    pub times: Vec<f64>,
    pub states: Vec<Vec<f64>>,
}

impl Samples {
    /// Values of one state component across all samples.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|state| state[index]).collect()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Stand-in event type for runs without event detection.
struct NoEvent;

impl EventFunction for NoEvent {
    fn evaluate(&self, _t: f64, _x: &[f64]) -> EventSample {
        EventSample {
            indicator: 1.0,
            direction: false,
        }
    }
}

/// Integrates without event detection.
pub fn integrate_dense<S>(
    system: &S,
    span: (f64, f64),
    y0: &[f64],
    settings: &IntegratorSettings,
    eval_times: Option<&[f64]>,
) -> Result<Integration, IntegrationError>
where
    S: DynamicalSystem<f64> + ?Sized,
{
    integrate(system, span, y0, settings, eval_times, None::<&NoEvent>)
}

/// Integrates `system` from `y0` over `span`.
///
/// Invalid inputs are rejected with `Err` before any stepping. Fatal numerical
/// failures end the run with `Ok` and [`Termination::Failed`], keeping the
/// partial solution, events and samples.
pub fn integrate<S, E>(
    system: &S,
    span: (f64, f64),
    y0: &[f64],
    settings: &IntegratorSettings,
    eval_times: Option<&[f64]>,
    event: Option<&E>,
) -> Result<Integration, IntegrationError>
where
    S: DynamicalSystem<f64> + ?Sized,
    E: EventFunction + ?Sized,
{
    let (t0, t1) = span;
    if !(t0.is_finite() && t1.is_finite() && t0 < t1) {
        return Err(IntegrationError::InvalidSpan { start: t0, end: t1 });
    }
    let dim = system.dimension();
    if y0.len() != dim {
        return Err(IntegrationError::DimensionMismatch {
            expected: dim,
            found: y0.len(),
        });
    }
    settings.validate()?;
    if let Some(times) = eval_times {
        validate_eval_times(times, span)?;
    }

    let atol = settings.absolute_tolerance;
    let rtol = settings.relative_tolerance;
    let max_step = settings.max_step.unwrap_or(t1 - t0).min(t1 - t0);

    let mut stats = IntegrationStats::default();
    let mut segments: Vec<Segment> = Vec::new();
    let mut detector = event.map(|e| EventDetector::new(e, t0, y0, settings.event_limit));

    let mut stepper = DormandPrince::new(dim);
    let mut controller = StepController::default();
    let mut t = t0;
    let mut y = y0.to_vec();

    let termination = 'run: {
        if !y.iter().all(|v| v.is_finite()) {
            break 'run Termination::Failed(IntegrationError::NonFiniteState { t });
        }
        stepper.prime(system, t, &y);
        stats.evaluations += 1;
        if !stepper.derivative().iter().all(|v| v.is_finite()) {
            break 'run Termination::Failed(IntegrationError::NonFiniteState { t });
        }

        let mut h = match settings.initial_step {
            Some(h) => h.min(max_step),
            None => {
                stats.evaluations += 1;
                initial_step(system, t, &y, stepper.derivative(), max_step, atol, rtol)
            }
        };

        let mut attempts = 0usize;
        loop {
            if attempts >= settings.max_steps {
                break 'run Termination::Failed(IntegrationError::StepLimitExceeded {
                    limit: settings.max_steps,
                    t,
                });
            }
            if !h.is_finite() || step_underflows(t, h) {
                break 'run Termination::Failed(IntegrationError::StepSizeUnderflow { t, step: h });
            }

            let last = t + 1.01 * h >= t1;
            if last {
                h = t1 - t;
            }

            attempts += 1;
            let trial = stepper.attempt(system, t, &y, h, atol, rtol);
            stats.evaluations += 6;
            if !trial.finite {
                break 'run Termination::Failed(IntegrationError::NonFiniteState { t });
            }

            if trial.error_norm > 1.0 {
                stats.rejected += 1;
                h = controller.reject(h, trial.error_norm);
                continue;
            }

            stats.accepted += 1;
            let t_next = if last { t1 } else { t + h };
            let mut segment = stepper.segment(t, t_next, &y, h);
            let h_next = controller.accept(h, trial.error_norm).min(max_step);
            stepper.advance();
            y.copy_from_slice(&segment.y_end);
            t = t_next;

            if let Some(detector) = detector.as_mut() {
                let hit = detector
                    .observe(&segment)
                    .map(|hit| (hit.t, hit.state.clone()));
                if let Some((t_hit, state)) = hit {
                    if detector.limit_reached() {
                        segment.truncate(t_hit, state);
                        segments.push(segment);
                        break 'run Termination::EventLimit;
                    }
                }
            }
            segments.push(segment);

            if last {
                break 'run Termination::Completed;
            }
            h = h_next;
        }
    };

    let solution = DenseSolution::new(span, y0.to_vec(), segments);
    let samples = match eval_times {
        Some(times) => {
            let end = solution.span().1;
            let covered: Vec<f64> = times.iter().copied().take_while(|&q| q <= end).collect();
            let states = solution.sample(&covered)?;
            Some(Samples {
                times: covered,
                states,
            })
        }
        None => None,
    };

    Ok(Integration {
        solution,
        events: detector.map(EventDetector::finish),
        samples,
        stats,
        termination,
    })
}

fn validate_eval_times(times: &[f64], (start, end): (f64, f64)) -> Result<(), IntegrationError> {
    for &time in times {
        if !(time >= start && time <= end) {
            return Err(IntegrationError::EvalTimeOutsideSpan { time, start, end });
        }
    }
    for pair in times.windows(2) {
        if pair[1] < pair[0] {
            return Err(IntegrationError::EvalTimesNotAscending {
                previous: pair[0],
                next: pair[1],
            });
        }
    }
    Ok(())
}
