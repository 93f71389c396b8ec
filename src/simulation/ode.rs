//! First-order ODE plumbing shared by the solvers
//!
//! `OdeSystem` is the right-hand side `dy/dt = f(t, y)`, `TimeGrid` the
//! output samples and `Trajectory` what a solver hands back.

use crate::error::{SimError, SimResult};
use crate::simulation::states::StateVec;

/// A system of first-order ODEs `dy/dt = f(t, y)`
pub trait OdeSystem {
    /// Number of components in the state vector
    fn dimension(&self) -> usize;

    /// Write `f(t, y)` into `dydt`
    fn derivatives(&self, t: f64, y: &StateVec, dydt: &mut StateVec) -> SimResult<()>;
}

/// Ordered, strictly increasing output times
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    points: Vec<f64>,
}

impl TimeGrid {
    /// `n` evenly spaced samples from `t0` to `t1` inclusive
    pub fn linspace(t0: f64, t1: f64, n: usize) -> SimResult<Self> {
        if n < 2 {
            return Err(SimError::InvalidTimeGrid(format!(
                "need at least 2 samples, got {n}"
            )));
        }
        let step = (t1 - t0) / (n - 1) as f64;
        let mut points: Vec<f64> = (0..n).map(|k| t0 + step * k as f64).collect();
        // pin the endpoint against accumulated rounding
        points[n - 1] = t1;
        Self::from_points(points)
    }

    pub fn from_points(points: Vec<f64>) -> SimResult<Self> {
        if points.len() < 2 {
            return Err(SimError::InvalidTimeGrid(format!(
                "need at least 2 samples, got {}",
                points.len()
            )));
        }
        if points.iter().any(|t| !t.is_finite()) {
            return Err(SimError::InvalidTimeGrid("non-finite sample".into()));
        }
        if let Some(k) = points.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SimError::InvalidTimeGrid(format!(
                "samples not strictly increasing at index {}",
                k + 1
            )));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.points[0]
    }

    pub fn end(&self) -> f64 {
        self.points[self.points.len() - 1]
    }
}

/// Step bookkeeping reported alongside a trajectory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

impl SolverStats {
    pub fn steps(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// One state vector per grid sample, immutable once produced
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<StateVec>,
    pub stats: SolverStats,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn initial(&self) -> &StateVec {
        &self.states[0]
    }

    pub fn last(&self) -> &StateVec {
        &self.states[self.states.len() - 1]
    }

    /// Iterate `(t, y)` pairs in time order
    pub fn iter(&self) -> impl Iterator<Item = (f64, &StateVec)> {
        self.times.iter().copied().zip(self.states.iter())
    }
}

/// Scaled RMS norm of a local error estimate
///
/// Each component is weighted by `atol + rtol * max(|y_old|, |y_new|)`;
/// a step is acceptable when the result is at most 1.
pub fn error_norm(err: &StateVec, y_old: &StateVec, y_new: &StateVec, rtol: f64, atol: f64) -> f64 {
    let n = err.len();
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = err
        .iter()
        .zip(y_old.iter().zip(y_new.iter()))
        .map(|(e, (a, b))| {
            let sc = atol + rtol * a.abs().max(b.abs());
            (e / sc).powi(2)
        })
        .sum();
    (sum / n as f64).sqrt()
}
