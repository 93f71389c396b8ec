//! Numerical and physical parameters for a run
//!
//! `Parameters` holds runtime settings:
//! - output grid span and sample count,
//! - error tolerances and step limits for the adaptive solvers,
//! - gravitational constant and optional collision epsilon

use crate::error::SimResult;
use crate::simulation::ode::TimeGrid;

#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct Parameters {
    pub t_start: f64, // time start
    pub t_end: f64, // time end
    pub samples: usize, // output samples, both ends included
    pub h0: Option<f64>, // initial step size, None = automatic
    pub atol: f64, // absolute error tolerance
    pub rtol: f64, // relative error tolerance
    pub max_steps: usize, // accepted + rejected step limit
    pub collision_eps: Option<f64>, // report separations below this as collisions
    pub G: f64, // gravitational constant (1 in dimensionless units)
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            t_start: 0.0,
            t_end: 1.0,
            samples: 100,
            h0: None,
            atol: 1.49e-8,
            rtol: 1.49e-8,
            max_steps: 100_000,
            collision_eps: None,
            G: 1.0,
        }
    }
}

impl Parameters {
    /// Evenly spaced output grid over `[t_start, t_end]`
    pub fn grid(&self) -> SimResult<TimeGrid> {
        TimeGrid::linspace(self.t_start, self.t_end, self.samples)
    }
}
