//! ODE solvers for the N-body state vector
//!
//! Provides a 4th-order Adams–Bashforth–Moulton predictor–corrector with
//! per-interval substep control, Fehlberg's adaptive 7(8) Runge–Kutta pair
//! and a fixed-substep classical RK4, all behind the `Solver` trait.
//!
//! Every solver reports values only at the grid times and either returns a
//! full trajectory or an error; a partial trajectory is never handed back.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::configuration::config::IntegratorConfig;
use crate::error::{ConvergenceFailure, SimError, SimResult};
use crate::simulation::ode::{error_norm, OdeSystem, SolverStats, TimeGrid, Trajectory};
use crate::simulation::params::Parameters;
use crate::simulation::states::StateVec;

/// Advances an initial state over a time grid
pub trait Solver {
    fn name(&self) -> &'static str;

    fn solve(&self, system: &dyn OdeSystem, y0: &StateVec, grid: &TimeGrid) -> SimResult<Trajectory>;
}

/// Build the solver selected by `integrator`, taking tolerances and limits
/// from `params`. `substeps` only applies to the grid-subdividing solvers.
pub fn solver_for(integrator: &IntegratorConfig, substeps: Option<usize>, params: &Parameters) -> Box<dyn Solver> {
    match integrator {
        IntegratorConfig::Adams => Box::new(AdamsPece {
            rtol: params.rtol,
            atol: params.atol,
            max_steps: params.max_steps,
            initial_substeps: substeps.unwrap_or(1),
        }),
        IntegratorConfig::Rkf78 => Box::new(Rkf78 {
            rtol: params.rtol,
            atol: params.atol,
            max_steps: params.max_steps,
            h0: params.h0,
        }),
        IntegratorConfig::Rk4 => Box::new(FixedRk4 {
            substeps: substeps.unwrap_or(10),
        }),
    }
}

// helpers ==============================================================================

/// Derivative evaluation with bookkeeping
struct Evaluator<'a> {
    system: &'a dyn OdeSystem,
    stats: SolverStats,
}

impl<'a> Evaluator<'a> {
    fn new(system: &'a dyn OdeSystem) -> Self {
        Self { system, stats: SolverStats::default() }
    }

    fn eval(&mut self, t: f64, y: &StateVec) -> SimResult<StateVec> {
        let mut dydt = StateVec::zeros(y.len());
        self.system.derivatives(t, y, &mut dydt)?;
        self.stats.evaluations += 1;
        Ok(dydt)
    }
}

/// Reject an initial state that does not fit the system before any evaluation
fn check_dimension(system: &dyn OdeSystem, y0: &StateVec) -> SimResult<()> {
    if y0.len() != system.dimension() {
        return Err(SimError::DimensionMismatch {
            expected: system.dimension(),
            found: y0.len(),
        });
    }
    Ok(())
}

/// Smallest step that still moves `t` meaningfully
fn min_step(t: f64) -> f64 {
    16.0 * f64::EPSILON * t.abs().max(1.0)
}

fn step_limit(t: f64, steps: usize) -> SimError {
    SimError::IntegrationFailed {
        t,
        reason: ConvergenceFailure::StepLimitExceeded { steps },
    }
}

fn underflow(t: f64, h: f64) -> SimError {
    SimError::IntegrationFailed {
        t,
        reason: ConvergenceFailure::StepSizeUnderflow { h },
    }
}

/// One classical RK4 step from `(t, y)` with `f0 = f(t, y)` already known
fn rk4_step(ev: &mut Evaluator, t: f64, y: &StateVec, f0: &StateVec, h: f64) -> SimResult<StateVec> {
    let half = 0.5 * h; // half step h/2

    // k1 = f(t, y) is f0
    // k2 = f(t + h/2, y + h/2 k1)
    let mut tmp = y.clone();
    tmp.axpy(half, f0, 1.0);
    let k2 = ev.eval(t + half, &tmp)?;

    // k3 = f(t + h/2, y + h/2 k2)
    tmp.copy_from(y);
    tmp.axpy(half, &k2, 1.0);
    let k3 = ev.eval(t + half, &tmp)?;

    // k4 = f(t + h, y + h k3)
    tmp.copy_from(y);
    tmp.axpy(h, &k3, 1.0);
    let k4 = ev.eval(t + h, &tmp)?;

    // y_n+1 = y_n + h/6 (k1 + 2 k2 + 2 k3 + k4)
    let mut out = y.clone();
    out.axpy(h / 6.0, f0, 1.0);
    out.axpy(h / 3.0, &k2, 1.0);
    out.axpy(h / 3.0, &k3, 1.0);
    out.axpy(h / 6.0, &k4, 1.0);
    Ok(out)
}

// =========================================================================================
// Fixed-substep RK4
// =========================================================================================

/// Classical RK4 with `substeps` equal steps per output interval, no error control
pub struct FixedRk4 {
    pub substeps: usize,
}

impl Solver for FixedRk4 {
    fn name(&self) -> &'static str {
        "rk4"
    }

    fn solve(&self, system: &dyn OdeSystem, y0: &StateVec, grid: &TimeGrid) -> SimResult<Trajectory> {
        check_dimension(system, y0)?;
        let m = self.substeps.max(1);
        let mut ev = Evaluator::new(system);

        let mut y = y0.clone();
        let mut states = Vec::with_capacity(grid.len());
        states.push(y.clone());

        for w in grid.points().windows(2) {
            let (ta, tb) = (w[0], w[1]);
            let h = (tb - ta) / m as f64;
            for s in 0..m {
                // substep start, recomputed from ta to avoid drift
                let t = ta + s as f64 * h;
                let f0 = ev.eval(t, &y)?; // k1 at the substep start
                y = rk4_step(&mut ev, t, &y, &f0, h)?;
                ev.stats.accepted += 1; // every fixed step is accepted
            }
            // record the state at grid time tb
            states.push(y.clone());
        }

        Ok(Trajectory {
            times: grid.points().to_vec(),
            states,
            stats: ev.stats,
        })
    }
}

// =========================================================================================
// Adams–Bashforth–Moulton PECE
// =========================================================================================

/// 4th-order Adams–Bashforth–Moulton predictor–corrector (PECE)
///
/// Each output interval is cut into `m` equal substeps. A substep whose
/// scaled error exceeds 1 rejects the interval, which is then retried with
/// `2m`; an interval accepted with a lot of headroom lets the next one try
/// `m / 2`. The multistep history is only valid for one step size, so a
/// change of `m` (or an uneven grid) restarts it with RK4 steps whose error
/// is estimated by step doubling.
pub struct AdamsPece {
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
    pub initial_substeps: usize,
}

/// Derivatives at `t, t-h, t-2h, t-3h`, newest first
#[derive(Clone)]
struct History {
    h: f64,
    f: VecDeque<StateVec>,
}

impl History {
    fn restart(h: f64, f_now: StateVec) -> Self {
        let mut f = VecDeque::with_capacity(4);
        f.push_front(f_now);
        Self { h, f }
    }

    fn matches(&self, h: f64) -> bool {
        (self.h - h).abs() <= 1e-12 * h.abs()
    }

    fn ready(&self) -> bool {
        self.f.len() >= 4
    }

    fn newest(&self) -> &StateVec {
        &self.f[0]
    }

    fn push(&mut self, f_new: StateVec) {
        self.f.push_front(f_new);
        self.f.truncate(4);
    }
}

struct IntervalOutcome {
    y: StateVec,
    history: History,
    err: f64,
    substeps: usize,
}

// headroom below which the next interval tries half as many substeps
const COARSEN_BELOW: f64 = 1.0 / 64.0;

impl AdamsPece {
    /// Try to cross `[ta, tb]` in `m` substeps. Stops at the first substep
    /// whose error exceeds 1 and reports that error.
    #[allow(clippy::too_many_arguments)]
    fn advance_interval(&self, ev: &mut Evaluator, ta: f64, tb: f64, y0: &StateVec, mut hist: History, m: usize, steps_before: usize) -> SimResult<IntervalOutcome> {
        let h = (tb - ta) / m as f64;
        let mut y = y0.clone();
        let mut err_max: f64 = 0.0;

        for s in 0..m {
            let t = ta + s as f64 * h;
            if steps_before + s >= self.max_steps {
                return Err(step_limit(t, self.max_steps));
            }
            let t_next = if s + 1 == m { tb } else { t + h };

            let (y_next, err, f_next) = if hist.ready() {
                let (f0, f1, f2, f3) = (&hist.f[0], &hist.f[1], &hist.f[2], &hist.f[3]);

                // predict (AB4)
                let mut yp = y.clone();
                yp.axpy(h * 55.0 / 24.0, f0, 1.0);
                yp.axpy(-h * 59.0 / 24.0, f1, 1.0);
                yp.axpy(h * 37.0 / 24.0, f2, 1.0);
                yp.axpy(-h * 9.0 / 24.0, f3, 1.0);
                let fp = ev.eval(t_next, &yp)?;

                // correct (AM4)
                let mut yc = y.clone();
                yc.axpy(h * 9.0 / 24.0, &fp, 1.0);
                yc.axpy(h * 19.0 / 24.0, f0, 1.0);
                yc.axpy(-h * 5.0 / 24.0, f1, 1.0);
                yc.axpy(h / 24.0, f2, 1.0);
                let fc = ev.eval(t_next, &yc)?;

                // Milne's device
                let err = (&yc - &yp) * (19.0 / 270.0);
                (yc, err, fc)
            } else {
                let f_now = hist.newest().clone();
                let full = rk4_step(ev, t, &y, &f_now, h)?;
                let half = rk4_step(ev, t, &y, &f_now, 0.5 * h)?;
                let f_mid = ev.eval(t + 0.5 * h, &half)?;
                let two = rk4_step(ev, t + 0.5 * h, &half, &f_mid, 0.5 * h)?;
                let err = (&two - &full) / 15.0;
                let f_next = ev.eval(t_next, &two)?;
                (two, err, f_next)
            };

            let e = error_norm(&err, &y, &y_next, self.rtol, self.atol);
            err_max = err_max.max(e);
            if e.is_nan() || e > 1.0 {
                return Ok(IntervalOutcome {
                    y: y_next,
                    history: hist,
                    err: if e.is_nan() { f64::INFINITY } else { e },
                    substeps: s + 1,
                });
            }

            hist.push(f_next);
            y = y_next;
        }

        Ok(IntervalOutcome {
            y,
            history: hist,
            err: err_max,
            substeps: m,
        })
    }
}

impl Solver for AdamsPece {
    fn name(&self) -> &'static str {
        "adams"
    }

    fn solve(&self, system: &dyn OdeSystem, y0: &StateVec, grid: &TimeGrid) -> SimResult<Trajectory> {
        check_dimension(system, y0)?;
        let mut ev = Evaluator::new(system);

        let mut m = self.initial_substeps.max(1);
        let mut y = y0.clone();
        let f0 = ev.eval(grid.start(), &y)?;
        let first_h = (grid.points()[1] - grid.start()) / m as f64;
        let mut hist = History::restart(first_h, f0);

        let mut states = Vec::with_capacity(grid.len());
        states.push(y.clone());

        for w in grid.points().windows(2) {
            let (ta, tb) = (w[0], w[1]);
            loop {
                let h = (tb - ta) / m as f64;
                if h < min_step(ta) {
                    warn!(t = ta, h, "adams: step size underflow");
                    return Err(underflow(ta, h));
                }

                let start = if hist.matches(h) {
                    hist.clone()
                } else {
                    History::restart(h, hist.newest().clone())
                };

                let steps_before = ev.stats.steps();
                let out = self.advance_interval(&mut ev, ta, tb, &y, start, m, steps_before)?;

                if out.err <= 1.0 {
                    ev.stats.accepted += out.substeps;
                    y = out.y;
                    hist = out.history;
                    if out.err < COARSEN_BELOW && m > 1 {
                        m /= 2;
                        debug!(t = tb, substeps = m, "adams: coarsening");
                    }
                    break;
                }

                ev.stats.rejected += out.substeps;
                m *= 2;
                debug!(t = ta, err = out.err, substeps = m, "adams: interval rejected");
            }
            states.push(y.clone());
        }

        Ok(Trajectory {
            times: grid.points().to_vec(),
            states,
            stats: ev.stats,
        })
    }
}

// =========================================================================================
// Fehlberg 7(8)
// =========================================================================================

/// Adaptive Runge–Kutta–Fehlberg 7(8), propagating the 8th-order solution
///
/// Steps are truncated so that every grid time is hit exactly. Suited to
/// close encounters where tight local error control decides whether a
/// periodic orbit survives.
pub struct Rkf78 {
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
    pub h0: Option<f64>, // None = automatic initial step
}

const RKF78_C: [f64; 13] = [
    0.0,
    2.0 / 27.0,
    1.0 / 9.0,
    1.0 / 6.0,
    5.0 / 12.0,
    1.0 / 2.0,
    5.0 / 6.0,
    1.0 / 6.0,
    2.0 / 3.0,
    1.0 / 3.0,
    1.0,
    0.0,
    1.0,
];

const RKF78_A: [&[f64]; 13] = [
    &[],
    &[2.0 / 27.0],
    &[1.0 / 36.0, 1.0 / 12.0],
    &[1.0 / 24.0, 0.0, 1.0 / 8.0],
    &[5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0],
    &[1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0],
    &[-25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0],
    &[31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0],
    &[2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0],
    &[-91.0 / 108.0, 0.0, 0.0, 23.0 / 108.0, -976.0 / 135.0, 311.0 / 54.0, -19.0 / 60.0, 17.0 / 6.0, -1.0 / 12.0],
    &[2383.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -301.0 / 82.0, 2133.0 / 4100.0, 45.0 / 82.0, 45.0 / 164.0, 18.0 / 41.0],
    &[3.0 / 205.0, 0.0, 0.0, 0.0, 0.0, -6.0 / 41.0, -3.0 / 205.0, -3.0 / 41.0, 3.0 / 41.0, 6.0 / 41.0, 0.0],
    &[-1777.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -289.0 / 82.0, 2193.0 / 4100.0, 51.0 / 82.0, 33.0 / 164.0, 12.0 / 41.0, 0.0, 1.0],
];

// 8th-order weights
const RKF78_B: [f64; 13] = [
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    34.0 / 105.0,
    9.0 / 35.0,
    9.0 / 35.0,
    9.0 / 280.0,
    9.0 / 280.0,
    0.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

// 8th minus 7th order weights
const RKF78_E: [f64; 13] = [
    -41.0 / 840.0,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    -41.0 / 840.0,
    41.0 / 840.0,
    41.0 / 840.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

impl Rkf78 {
    const ORDER: f64 = 8.0;

    /// One trial step; returns the 8th-order solution and the error estimate
    fn step(&self, ev: &mut Evaluator, t: f64, y: &StateVec, f0: &StateVec, h: f64) -> SimResult<(StateVec, StateVec)> {
        let mut k: Vec<StateVec> = Vec::with_capacity(13);
        k.push(f0.clone());

        let mut ys = y.clone();
        for s in 1..13 {
            ys.copy_from(y);
            for (j, a) in RKF78_A[s].iter().enumerate() {
                if *a != 0.0 {
                    ys.axpy(h * a, &k[j], 1.0);
                }
            }
            k.push(ev.eval(t + RKF78_C[s] * h, &ys)?);
        }

        let mut y_new = y.clone();
        let mut err = StateVec::zeros(y.len());
        for s in 0..13 {
            if RKF78_B[s] != 0.0 {
                y_new.axpy(h * RKF78_B[s], &k[s], 1.0);
            }
            if RKF78_E[s] != 0.0 {
                err.axpy(h * RKF78_E[s], &k[s], 1.0);
            }
        }
        Ok((y_new, err))
    }

    /// Starting step from the scale of `y0` and `f0` plus one trial Euler step
    fn initial_step(&self, ev: &mut Evaluator, t0: f64, y0: &StateVec, f0: &StateVec, span: f64) -> SimResult<f64> {
        let scale = |v: &StateVec| -> f64 {
            let n = v.len().max(1) as f64;
            let sum: f64 = v
                .iter()
                .zip(y0.iter())
                .map(|(c, y)| (c / (self.atol + self.rtol * y.abs())).powi(2))
                .sum();
            (sum / n).sqrt()
        };

        let d0 = scale(y0);
        let d1 = scale(f0);
        // tolerances so small that the scaled norms overflow
        if !(d0.is_finite() && d1.is_finite()) {
            return Ok(1e-6_f64.min(span));
        }
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
        let h0 = h0.min(span);

        let mut y1 = y0.clone();
        y1.axpy(h0, f0, 1.0);
        let f1 = ev.eval(t0 + h0, &y1)?;
        let d2 = scale(&(f1 - f0)) / h0;

        let dmax = d1.max(d2);
        let h1 = if dmax <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / dmax).powf(1.0 / (Self::ORDER + 1.0))
        };
        Ok((100.0 * h0).min(h1).min(span))
    }
}

impl Solver for Rkf78 {
    fn name(&self) -> &'static str {
        "rkf78"
    }

    fn solve(&self, system: &dyn OdeSystem, y0: &StateVec, grid: &TimeGrid) -> SimResult<Trajectory> {
        check_dimension(system, y0)?;
        let mut ev = Evaluator::new(system);

        let mut t = grid.start();
        let mut y = y0.clone();
        let mut f = ev.eval(t, &y)?;

        let span = grid.end() - grid.start();
        let mut h = match self.h0 {
            Some(h0) => h0.min(span),
            None => self.initial_step(&mut ev, t, &y, &f, span)?,
        };

        let mut states = Vec::with_capacity(grid.len());
        states.push(y.clone());

        for &t_out in &grid.points()[1..] {
            while t < t_out {
                if ev.stats.steps() >= self.max_steps {
                    warn!(t, steps = self.max_steps, "rkf78: step limit exceeded");
                    return Err(step_limit(t, self.max_steps));
                }
                if h < min_step(t) {
                    warn!(t, h, "rkf78: step size underflow");
                    return Err(underflow(t, h));
                }

                let remaining = t_out - t;
                let landing = h >= remaining;
                let h_try = if landing { remaining } else { h };

                let (y_new, err) = self.step(&mut ev, t, &y, &f, h_try)?;
                let e = error_norm(&err, &y, &y_new, self.rtol, self.atol);

                if e <= 1.0 {
                    t = if landing { t_out } else { t + h_try };
                    y = y_new;
                    f = ev.eval(t, &y)?;
                    ev.stats.accepted += 1;

                    let factor = if e == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * e.powf(-1.0 / Self::ORDER)).clamp(MIN_FACTOR, MAX_FACTOR)
                    };
                    let proposed = h_try * factor;
                    // a step cut short to land on the grid says little about h
                    h = if landing { proposed.max(h) } else { proposed };
                } else {
                    ev.stats.rejected += 1;
                    let factor = if e.is_finite() {
                        (SAFETY * e.powf(-1.0 / Self::ORDER)).clamp(MIN_FACTOR, 1.0)
                    } else {
                        MIN_FACTOR
                    };
                    h = h_try * factor;
                    debug!(t, err = e, h, "rkf78: step rejected");
                }
            }
            states.push(y.clone());
        }

        Ok(Trajectory {
            times: grid.points().to_vec(),
            states,
            stats: ev.stats,
        })
    }
}
