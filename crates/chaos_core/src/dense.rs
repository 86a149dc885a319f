//! Continuous (dense) representation of an integrated trajectory.
//!
//! Every accepted step is kept as a [`Segment`] carrying the Dormand-Prince
//! interpolation coefficients, so the trajectory can be evaluated at any time
//! it covers without stepping again.

use crate::error::IntegrationError;
use serde::{Deserialize, Serialize};

/// One accepted integration step and its interpolant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub t_start: f64,
    /// End of the interval this segment answers for. Equal to
    /// `t_start + step` unless the run stopped inside the step.
    pub t_end: f64,
    /// Length of the step the interpolant was built for.
    pub step: f64,
    pub y_start: Vec<f64>,
    pub y_end: Vec<f64>,
    /// Dense-output coefficients, one vector per polynomial term.
    pub coefficients: [Vec<f64>; 5],
}

impl Segment {
    pub fn dimension(&self) -> usize {
        self.y_start.len()
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.t_start && t <= self.t_end
    }

    /// Evaluates the interpolant at `t` into `out`.
    /// y(theta) = c0 + theta (c1 + (1 - theta) (c2 + theta (c3 + (1 - theta) c4)))
    pub fn evaluate_into(&self, t: f64, out: &mut [f64]) {
        let theta = (t - self.t_start) / self.step;
        let theta1 = 1.0 - theta;
        let [c0, c1, c2, c3, c4] = &self.coefficients;
        for i in 0..out.len() {
            out[i] = c0[i] + theta * (c1[i] + theta1 * (c2[i] + theta * (c3[i] + theta1 * c4[i])));
        }
    }

    pub fn evaluate(&self, t: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.dimension()];
        self.evaluate_into(t, &mut out);
        out
    }

    /// Cuts the segment short at `t`, keeping the interpolant.
    pub(crate) fn truncate(&mut self, t: f64, state: Vec<f64>) {
        self.t_end = t;
        self.y_end = state;
    }
}

/// Piecewise polynomial solution of one integration call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseSolution {
    requested: (f64, f64),
    initial_state: Vec<f64>,
    segments: Vec<Segment>,
}

impl DenseSolution {
    pub(crate) fn new(
        requested: (f64, f64),
        initial_state: Vec<f64>,
        segments: Vec<Segment>,
    ) -> Self {
        Self {
            requested,
            initial_state,
            segments,
        }
    }

    /// Span the integration was asked to cover.
    pub fn requested_span(&self) -> (f64, f64) {
        self.requested
    }

    /// Span actually covered. Shorter than the requested span when the run
    /// stopped early on an event limit or a fatal failure.
    pub fn span(&self) -> (f64, f64) {
        let start = self.requested.0;
        let end = self.segments.last().map_or(start, |s| s.t_end);
        (start, end)
    }

    pub fn is_complete(&self) -> bool {
        self.span().1 == self.requested.1
    }

    pub fn dimension(&self) -> usize {
        self.initial_state.len()
    }

    pub fn initial_state(&self) -> &[f64] {
        &self.initial_state
    }

    /// State at the end of the covered span.
    pub fn final_state(&self) -> &[f64] {
        self.segments
            .last()
            .map_or(self.initial_state.as_slice(), |s| s.y_end.as_slice())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Times at which the stepper ended an accepted step, starting with t0.
    pub fn step_times(&self) -> Vec<f64> {
        std::iter::once(self.requested.0)
            .chain(self.segments.iter().map(|s| s.t_end))
            .collect()
    }

    /// Evaluates the solution at a single time in the covered span.
    pub fn evaluate(&self, t: f64) -> Result<Vec<f64>, IntegrationError> {
        let mut out = vec![0.0; self.dimension()];
        self.evaluate_into(t, &mut out)?;
        Ok(out)
    }

    pub fn evaluate_into(&self, t: f64, out: &mut [f64]) -> Result<(), IntegrationError> {
        let (start, end) = self.span();
        if !(t >= start && t <= end) {
            return Err(IntegrationError::OutOfRange {
                time: t,
                start,
                end,
            });
        }
        if t == start {
            out.copy_from_slice(&self.initial_state);
            return Ok(());
        }
        let segment = &self.segments[self.locate(t)];
        segment.evaluate_into(t, out);
        Ok(())
    }

    /// Evaluates the solution at each query time, in order. Duplicates yield
    /// duplicate states.
    pub fn sample(&self, times: &[f64]) -> Result<Vec<Vec<f64>>, IntegrationError> {
        times.iter().map(|&t| self.evaluate(t)).collect()
    }

    /// Index of the segment covering `t`, which must lie inside the span.
    fn locate(&self, t: f64) -> usize {
        self.segments
            .partition_point(|s| s.t_start <= t)
            .saturating_sub(1)
            .min(self.segments.len().saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Linear interpolant on [t0, t0 + h]: c1 = y1 - y0, the other terms vanish.
    fn linear_segment(t0: f64, h: f64, y0: f64, y1: f64) -> Segment {
        Segment {
            t_start: t0,
            t_end: t0 + h,
            step: h,
            y_start: vec![y0],
            y_end: vec![y1],
            coefficients: [vec![y0], vec![y1 - y0], vec![0.0], vec![0.0], vec![0.0]],
        }
    }

    fn ramp() -> DenseSolution {
        DenseSolution::new(
            (0.0, 3.0),
            vec![0.0],
            vec![
                linear_segment(0.0, 1.0, 0.0, 1.0),
                linear_segment(1.0, 1.0, 1.0, 3.0),
                linear_segment(2.0, 1.0, 3.0, 6.0),
            ],
        )
    }

    #[test]
    fn evaluate_locates_covering_segment() {
        let solution = ramp();
        assert_eq!(solution.evaluate(0.0).expect("t0"), vec![0.0]);
        assert!((solution.evaluate(0.5).expect("first")[0] - 0.5).abs() < 1e-15);
        assert!((solution.evaluate(1.5).expect("second")[0] - 2.0).abs() < 1e-15);
        assert!((solution.evaluate(2.25).expect("third")[0] - 3.75).abs() < 1e-15);
        assert!((solution.evaluate(3.0).expect("end")[0] - 6.0).abs() < 1e-15);
    }

    #[test]
    fn shared_boundaries_evaluate_consistently() {
        let solution = ramp();
        let segments = solution.segments();
        for pair in segments.windows(2) {
            assert_eq!(pair[0].t_end, pair[1].t_start);
            let left = pair[0].evaluate(pair[0].t_end);
            let right = pair[1].evaluate(pair[1].t_start);
            assert!((left[0] - right[0]).abs() < 1e-15);
        }
    }

    #[test]
    fn sample_keeps_order_and_duplicates() {
        let solution = ramp();
        let states = solution.sample(&[0.5, 0.5, 2.0]).expect("sample");
        assert_eq!(states.len(), 3);
        assert_eq!(states[0], states[1]);
        assert!((states[2][0] - 3.0).abs() < 1e-15);
    }

    #[test]
    fn sample_rejects_times_outside_span() {
        let solution = ramp();
        let err = solution.sample(&[1.0, 3.5]).expect_err("out of range");
        assert_eq!(
            err,
            IntegrationError::OutOfRange {
                time: 3.5,
                start: 0.0,
                end: 3.0
            }
        );
        assert!(solution.evaluate(-0.1).is_err());
        assert!(solution.evaluate(f64::NAN).is_err());
    }

    #[test]
    fn truncated_segment_shrinks_covered_span() {
        let mut segments = vec![linear_segment(0.0, 1.0, 0.0, 1.0)];
        segments[0].truncate(0.4, vec![0.4]);
        assert!(segments[0].contains(0.4));
        assert!(!segments[0].contains(0.5));
        let solution = DenseSolution::new((0.0, 1.0), vec![0.0], segments);
        assert_eq!(solution.requested_span(), (0.0, 1.0));
        assert_eq!(solution.span(), (0.0, 0.4));
        assert!(!solution.is_complete());
        assert_eq!(solution.final_state(), &[0.4]);
        assert!(solution.evaluate(0.5).is_err());
        assert!((solution.evaluate(0.2).expect("inside")[0] - 0.2).abs() < 1e-15);
    }

    #[test]
    fn empty_solution_answers_only_at_start() {
        let solution = DenseSolution::new((1.0, 2.0), vec![4.0, 5.0], Vec::new());
        assert_eq!(solution.span(), (1.0, 1.0));
        assert_eq!(solution.evaluate(1.0).expect("start"), vec![4.0, 5.0]);
        assert!(solution.evaluate(1.5).is_err());
        assert_eq!(solution.step_times(), vec![1.0]);
    }
}
