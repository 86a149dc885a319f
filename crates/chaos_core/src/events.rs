//! Event detection on accepted steps.
//!
//! The event indicator is compared at both ends of every accepted step. A sign
//! change with the direction filter holding at the step end is refined to the
//! zero of the indicator along the step interpolant with Brent's method.

use crate::dense::Segment;
use crate::traits::{EventFunction, EventSample};
use serde::{Deserialize, Serialize};

/// A located event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHit {
    pub t: f64,
    pub state: Vec<f64>,
}

/// Events of one integration, strictly increasing in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    hits: Vec<EventHit>,
}

impl EventRecord {
    pub fn hits(&self) -> &[EventHit] {
        &self.hits
    }

    pub fn times(&self) -> Vec<f64> {
        self.hits.iter().map(|hit| hit.t).collect()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Appends `hit` unless it would break strict time ordering.
    pub(crate) fn push(&mut self, hit: EventHit) -> bool {
        if let Some(last) = self.hits.last() {
            if hit.t <= last.t {
                return false;
            }
        }
        self.hits.push(hit);
        true
    }
}

/// True when the indicator changes sign over a step. An exact zero at the
/// step end counts here; the same zero at the next step's start does not.
pub fn crosses_zero(start: f64, end: f64) -> bool {
    (start < 0.0 && end >= 0.0) || (start > 0.0 && end <= 0.0)
}

/// Tracks the indicator across accepted steps and records crossings.
pub(crate) struct EventDetector<'a, E: EventFunction + ?Sized> {
    event: &'a E,
    previous: EventSample,
    record: EventRecord,
    limit: Option<usize>,
    root_finder: BrentSolver,
}

impl<'a, E: EventFunction + ?Sized> EventDetector<'a, E> {
    pub(crate) fn new(event: &'a E, t0: f64, y0: &[f64], limit: Option<usize>) -> Self {
        Self {
            event,
            previous: event.evaluate(t0, y0),
            record: EventRecord::default(),
            limit,
            root_finder: BrentSolver::default(),
        }
    }

    /// Inspects a freshly accepted segment. Returns the located hit when one is
    /// recorded.
    pub(crate) fn observe(&mut self, segment: &Segment) -> Option<&EventHit> {
        let start = self.previous;
        let end = self.event.evaluate(segment.t_end, &segment.y_end);
        self.previous = end;

        if !(crosses_zero(start.indicator, end.indicator) && end.direction) {
            return None;
        }

        let t = if end.indicator == 0.0 {
            segment.t_end
        } else {
            let mut buffer = vec![0.0; segment.dimension()];
            let event = self.event;
            self.root_finder.find_root(
                |t| {
                    segment.evaluate_into(t, &mut buffer);
                    event.evaluate(t, &buffer).indicator
                },
                segment.t_start,
                segment.t_end,
                start.indicator,
                end.indicator,
            )
        };
        let state = if t == segment.t_end {
            segment.y_end.clone()
        } else {
            segment.evaluate(t)
        };

        if self.record.push(EventHit { t, state }) {
            self.record.hits.last()
        } else {
            None
        }
    }

    pub(crate) fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.record.len() >= limit)
    }

    pub(crate) fn finish(self) -> EventRecord {
        self.record
    }
}

/// Brent's method for root finding
///
/// Combines bisection, secant steps and inverse quadratic interpolation; the
/// bracket shrinks every iteration so the result always lies in [a, b].
///
/// Reference: Brent, R.P. (1973). "Algorithms for Minimization without
/// Derivatives". Prentice-Hall.
#[derive(Debug, Clone, Copy)]
pub struct BrentSolver {
    pub tol: f64,
    pub max_iter: usize,
}

impl Default for BrentSolver {
    fn default() -> Self {
        Self {
            tol: 1e-12,
            max_iter: 100,
        }
    }
}

impl BrentSolver {
    /// Finds a zero of `f` in [a, b] given f(a) = fa and f(b) = fb of opposite
    /// sign. Returns the best estimate when `max_iter` runs out.
    pub fn find_root<F>(&self, mut f: F, a: f64, b: f64, fa: f64, fb: f64) -> f64
    where
        F: FnMut(f64) -> f64,
    {
        if fa == 0.0 {
            return a;
        }
        if fb == 0.0 {
            return b;
        }

        let (mut a, mut b, mut fa, mut fb) = (a, b, fa, fb);
        let (mut c, mut fc) = (b, fb);
        let mut d = b - a;
        let mut e = d;

        for _ in 0..self.max_iter {
            if (fb > 0.0) == (fc > 0.0) {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }

            let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * self.tol;
            let xm = 0.5 * (c - b);
            if xm.abs() <= tol1 || fb == 0.0 {
                return b;
            }

            if e.abs() >= tol1 && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q) = if a == c {
                    // Secant
                    (2.0 * xm * s, 1.0 - s)
                } else {
                    // Inverse quadratic interpolation
                    let qa = fa / fc;
                    let r = fb / fc;
                    (
                        s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0)),
                        (qa - 1.0) * (r - 1.0) * (s - 1.0),
                    )
                };
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * xm * q - (tol1 * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
            fb = f(b);
        }

        b
    }
}
