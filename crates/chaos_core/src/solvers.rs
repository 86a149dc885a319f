use crate::dense::Segment;
use crate::traits::DynamicalSystem;

/// Dormand-Prince 5(4) Solver
///
/// Embedded explicit Runge-Kutta pair with the first-same-as-last property:
/// the seventh stage of an accepted step is the first stage of the next one,
/// so each attempt costs six evaluations of the vector field.
pub struct DormandPrince {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    k7: Vec<f64>,
    y_new: Vec<f64>,
    tmp: Vec<f64>,
}

/// Outcome of one attempted step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    /// Scaled RMS norm of the embedded error estimate; accept when <= 1.
    pub error_norm: f64,
    /// False when the proposed state, the end derivative or the error is NaN/Inf.
    pub finite: bool,
}

impl DormandPrince {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            k7: vec![0.0; dim],
            y_new: vec![0.0; dim],
            tmp: vec![0.0; dim],
        }
    }

    /// Loads f(t, y) as the first stage. Needed once before the first attempt.
    pub fn prime<S>(&mut self, system: &S, t: f64, y: &[f64])
    where
        S: DynamicalSystem<f64> + ?Sized,
    {
        system.apply(t, y, &mut self.k1);
    }

    /// Derivative at the current step start.
    pub fn derivative(&self) -> &[f64] {
        &self.k1
    }

    /// State proposed by the last attempt.
    pub fn proposed(&self) -> &[f64] {
        &self.y_new
    }

    /// Attempts a step of size `h` from (t, y) without committing it.
    pub fn attempt<S>(
        &mut self,
        system: &S,
        t: f64,
        y: &[f64],
        h: f64,
        atol: f64,
        rtol: f64,
    ) -> Trial
    where
        S: DynamicalSystem<f64> + ?Sized,
    {
        let n = y.len();

        // k2
        for i in 0..n {
            self.tmp[i] = y[i] + h * (A21 * self.k1[i]);
        }
        system.apply(t + C2 * h, &self.tmp, &mut self.k2);

        // k3
        for i in 0..n {
            self.tmp[i] = y[i] + h * (A31 * self.k1[i] + A32 * self.k2[i]);
        }
        system.apply(t + C3 * h, &self.tmp, &mut self.k3);

        // k4
        for i in 0..n {
            self.tmp[i] = y[i] + h * (A41 * self.k1[i] + A42 * self.k2[i] + A43 * self.k3[i]);
        }
        system.apply(t + C4 * h, &self.tmp, &mut self.k4);

        // k5
        for i in 0..n {
            self.tmp[i] = y[i]
                + h * (A51 * self.k1[i] + A52 * self.k2[i] + A53 * self.k3[i] + A54 * self.k4[i]);
        }
        system.apply(t + C5 * h, &self.tmp, &mut self.k5);

        // k6
        for i in 0..n {
            self.tmp[i] = y[i]
                + h * (A61 * self.k1[i]
                    + A62 * self.k2[i]
                    + A63 * self.k3[i]
                    + A64 * self.k4[i]
                    + A65 * self.k5[i]);
        }
        system.apply(t + h, &self.tmp, &mut self.k6);

        // 5th order solution, then k7 = f(t + h, y_new)
        for i in 0..n {
            self.y_new[i] = y[i]
                + h * (A71 * self.k1[i]
                    + A73 * self.k3[i]
                    + A74 * self.k4[i]
                    + A75 * self.k5[i]
                    + A76 * self.k6[i]);
        }
        system.apply(t + h, &self.y_new, &mut self.k7);

        let mut sum = 0.0;
        for i in 0..n {
            let estimate = h
                * (E1 * self.k1[i]
                    + E3 * self.k3[i]
                    + E4 * self.k4[i]
                    + E5 * self.k5[i]
                    + E6 * self.k6[i]
                    + E7 * self.k7[i]);
            let scale = atol + rtol * y[i].abs().max(self.y_new[i].abs());
            sum += (estimate / scale) * (estimate / scale);
        }
        let error_norm = if n == 0 { 0.0 } else { (sum / n as f64).sqrt() };

        let finite = error_norm.is_finite()
            && self.y_new.iter().all(|v| v.is_finite())
            && self.k7.iter().all(|v| v.is_finite());

        Trial { error_norm, finite }
    }

    /// Builds the dense-output segment of the last attempt over [t_start, t_end].
    /// `h` is the step that was attempted; it scales the interpolant.
    pub fn segment(&self, t_start: f64, t_end: f64, y: &[f64], h: f64) -> Segment {
        let n = y.len();
        let mut coefficients: [Vec<f64>; 5] = Default::default();
        for c in coefficients.iter_mut() {
            c.reserve_exact(n);
        }
        for i in 0..n {
            let ydiff = self.y_new[i] - y[i];
            let bspl = h * self.k1[i] - ydiff;
            coefficients[0].push(y[i]);
            coefficients[1].push(ydiff);
            coefficients[2].push(bspl);
            coefficients[3].push(ydiff - h * self.k7[i] - bspl);
            coefficients[4].push(
                h * (D1 * self.k1[i]
                    + D3 * self.k3[i]
                    + D4 * self.k4[i]
                    + D5 * self.k5[i]
                    + D6 * self.k6[i]
                    + D7 * self.k7[i]),
            );
        }
        Segment {
            t_start,
            t_end,
            step: h,
            y_start: y.to_vec(),
            y_end: self.y_new.clone(),
            coefficients,
        }
    }

    /// Commits the last attempt: the end derivative becomes the next first stage.
    pub fn advance(&mut self) {
        std::mem::swap(&mut self.k1, &mut self.k7);
    }
}

/// PI step-size controller with Lund stabilization.
#[derive(Debug, Clone, Copy)]
pub struct StepController {
    previous_error: f64,
    rejected_last: bool,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            previous_error: 1e-4,
            rejected_last: false,
        }
    }
}

impl StepController {
    const SAFETY: f64 = 0.9;
    const BETA: f64 = 0.04;
    const MIN_FACTOR: f64 = 0.2;
    const MAX_FACTOR: f64 = 10.0;

    fn exponent() -> f64 {
        0.2 - 0.75 * Self::BETA
    }

    /// Next step size after an accepted step with error norm `err`.
    pub fn accept(&mut self, h: f64, err: f64) -> f64 {
        let proportional = err.powf(Self::exponent());
        let factor = (proportional / self.previous_error.powf(Self::BETA) / Self::SAFETY)
            .clamp(1.0 / Self::MAX_FACTOR, 1.0 / Self::MIN_FACTOR);
        let mut next = h / factor;
        self.previous_error = err.max(1e-4);
        if self.rejected_last {
            next = next.min(h);
            self.rejected_last = false;
        }
        next
    }

    /// Retry step size after a rejected step with error norm `err`.
    pub fn reject(&mut self, h: f64, err: f64) -> f64 {
        self.rejected_last = true;
        let proportional = err.powf(Self::exponent());
        h / (proportional / Self::SAFETY).min(1.0 / Self::MIN_FACTOR)
    }
}

/// Initial step size guess from the local scale of y and its first two derivatives.
pub fn initial_step<S>(
    system: &S,
    t: f64,
    y: &[f64],
    f0: &[f64],
    max_step: f64,
    atol: f64,
    rtol: f64,
) -> f64
where
    S: DynamicalSystem<f64> + ?Sized,
{
    let n = y.len();
    let mut dnf = 0.0;
    let mut dny = 0.0;
    for i in 0..n {
        let sk = atol + rtol * y[i].abs();
        dnf += (f0[i] / sk) * (f0[i] / sk);
        dny += (y[i] / sk) * (y[i] / sk);
    }

    let mut h: f64 = if dnf <= 1e-10 || dny <= 1e-10 {
        1e-6
    } else {
        (dny / dnf).sqrt() * 0.01
    };
    h = h.min(max_step);

    // Explicit Euler probe for the second derivative.
    let probe: Vec<f64> = (0..n).map(|i| y[i] + h * f0[i]).collect();
    let mut f1 = vec![0.0; n];
    system.apply(t + h, &probe, &mut f1);

    let mut der2 = 0.0;
    for i in 0..n {
        let sk = atol + rtol * y[i].abs();
        let df = (f1[i] - f0[i]) / sk;
        der2 += df * df;
    }
    let der2 = der2.sqrt() / h;

    let der12 = der2.max(dnf.sqrt());
    let h1 = if der12 <= 1e-15 {
        (1e-6f64).max(h * 1e-3)
    } else {
        (0.01 / der12).powf(1.0 / ORDER)
    };

    (100.0 * h).min(h1).min(max_step)
}

/// True when `h` can no longer move `t` by a representable amount.
pub fn step_underflows(t: f64, h: f64) -> bool {
    h < f64::MIN_POSITIVE || 0.1 * h <= t.abs() * f64::EPSILON
}

const ORDER: f64 = 5.0;

// Butcher tableau
const C2: f64 = 0.2;
const C3: f64 = 0.3;
const C4: f64 = 0.8;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 0.2;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// Difference between the 5th and embedded 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Dense output
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    struct Oscillator;

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    #[test]
    fn single_step_matches_exponential_decay() {
        let mut stepper = DormandPrince::new(1);
        stepper.prime(&Decay, 0.0, &[1.0]);
        let trial = stepper.attempt(&Decay, 0.0, &[1.0], 0.1, 1e-6, 1e-3);
        assert!(trial.finite);
        assert!((stepper.proposed()[0] - (-0.1f64).exp()).abs() < 1e-7);
        assert!(trial.error_norm < 1.0);
    }

    #[test]
    fn error_estimate_grows_with_step_size() {
        let mut stepper = DormandPrince::new(2);
        stepper.prime(&Oscillator, 0.0, &[1.0, 0.0]);
        let small = stepper.attempt(&Oscillator, 0.0, &[1.0, 0.0], 0.1, 1e-8, 1e-8);
        let large = stepper.attempt(&Oscillator, 0.0, &[1.0, 0.0], 1.0, 1e-8, 1e-8);
        assert!(large.error_norm > small.error_norm * 100.0);
    }

    #[test]
    fn segment_interpolates_between_endpoints() {
        let mut stepper = DormandPrince::new(2);
        let y0 = [1.0, 0.0];
        stepper.prime(&Oscillator, 0.0, &y0);
        stepper.attempt(&Oscillator, 0.0, &y0, 0.1, 1e-10, 1e-10);
        let segment = stepper.segment(0.0, 0.1, &y0, 0.1);

        assert_eq!(segment.evaluate(0.0), y0.to_vec());
        let end = segment.evaluate(0.1);
        for i in 0..2 {
            assert!((end[i] - segment.y_end[i]).abs() < 1e-14);
        }
        let mid = segment.evaluate(0.05);
        assert!((mid[0] - 0.05f64.cos()).abs() < 1e-6);
        assert!((mid[1] + 0.05f64.sin()).abs() < 1e-6);
    }

    #[test]
    fn advance_reuses_end_derivative() {
        let mut stepper = DormandPrince::new(1);
        stepper.prime(&Decay, 0.0, &[1.0]);
        stepper.attempt(&Decay, 0.0, &[1.0], 0.1, 1e-6, 1e-3);
        let y1 = stepper.proposed()[0];
        stepper.advance();
        assert_eq!(stepper.derivative()[0], -y1);
    }

    #[test]
    fn non_finite_stage_is_flagged() {
        struct Blowup;
        impl DynamicalSystem<f64> for Blowup {
            fn dimension(&self) -> usize {
                1
            }
            fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
                out[0] = 1.0 / (x[0] - x[0]);
            }
        }
        let mut stepper = DormandPrince::new(1);
        stepper.prime(&Blowup, 0.0, &[1.0]);
        let trial = stepper.attempt(&Blowup, 0.0, &[1.0], 0.1, 1e-6, 1e-3);
        assert!(!trial.finite);
    }

    #[test]
    fn controller_grows_on_small_error_and_shrinks_on_rejection() {
        let mut controller = StepController::default();
        let grown = controller.accept(0.1, 1e-6);
        assert!(grown > 0.1);
        assert!(grown <= 0.1 * StepController::MAX_FACTOR + 1e-12);

        let shrunk = controller.reject(0.1, 50.0);
        assert!(shrunk < 0.1);
        assert!(shrunk >= 0.1 * StepController::MIN_FACTOR - 1e-12);

        // No growth directly after a rejection.
        let after = controller.accept(shrunk, 1e-6);
        assert!(after <= shrunk);
    }

    #[test]
    fn initial_step_respects_max_step() {
        let mut f0 = [0.0; 2];
        Oscillator.apply(0.0, &[1.0, 0.0], &mut f0);
        let h = initial_step(&Oscillator, 0.0, &[1.0, 0.0], &f0, 0.05, 1e-6, 1e-3);
        assert!(h > 0.0 && h <= 0.05);
    }

    #[test]
    fn underflow_detection_scales_with_time() {
        assert!(step_underflows(1e3, 1e-15));
        assert!(!step_underflows(1e3, 1e-6));
        assert!(step_underflows(0.0, 0.0));
    }
}
