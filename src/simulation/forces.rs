//! Force / acceleration contributors and the ODE right-hand side
//!
//! Defines the acceleration trait, plain (unsoftened) Newtonian gravity and
//! `NBodyRhs`, which turns an `AccelSet` into the first-order system the
//! solvers integrate

use crate::error::{SimError, SimResult};
use crate::simulation::ode::OdeSystem;
use crate::simulation::states::{NVec2, StateLayout, StateVec, System};

/// Collection of acceleration terms
/// Each term implements [`Acceleration`] and their contributions are summed
/// into a single acceleration vector per body
pub struct AccelSet {
    terms: Vec<Box<dyn Acceleration + Send + Sync>>,
}

impl Default for AccelSet {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelSet {
    /// Create an empty acceleration set
    pub fn new() -> Self {
        Self {
            terms: Vec::new()
        }
    }

    /// Add an acceleration term
    pub fn with<T>(mut self, term: T) -> Self
    where
        T: Acceleration + Send + Sync + 'static,
    {
        self.terms.push(Box::new(term));
        self
    }

    /// Compute total accelerations at time `t` for all bodies in `sys`
    /// - `out[i]` will be set to the sum of contributions from all terms
    pub fn accumulate_accels(&self, t: f64, sys: &System, out: &mut [NVec2]) -> SimResult<()> {
        for a in out.iter_mut() {
            *a = NVec2::zeros();
        }
        for term in &self.terms {
            term.acceleration(t, sys, out)?;
        }
        Ok(())
    }
}

/// Acceleration source operating on a [`System`]
/// Implementations add their contribution into `out[i]` for each body
pub trait Acceleration {
    fn acceleration(&self, t: f64, sys: &System, out: &mut [NVec2]) -> SimResult<()>;
}

/// Newtonian gravity, direct pairwise sum, no softening
///
/// A zero separation is a true singularity: without `collision_eps` the
/// acceleration for that pair is non-finite and the RHS reports it as
/// [`SimError::NonFinite`]. With `collision_eps = Some(eps)` any pair closer
/// than `eps` is reported as [`SimError::Collision`] instead.
#[allow(non_snake_case)]
pub struct NewtonianGravity {
    pub G: f64, // gravitational constant
    pub collision_eps: Option<f64>,
}

impl NewtonianGravity {
    /// Dimensionless gravity (G = 1) with no collision check
    pub fn dimensionless() -> Self {
        Self { G: 1.0, collision_eps: None }
    }
}

impl Acceleration for NewtonianGravity {
    fn acceleration(&self, t: f64, sys: &System, out: &mut [NVec2]) -> SimResult<()> {
        let n = sys.bodies.len();

        // Loop over each unordered pair (i, j) with i < j
        for i in 0..n {
            // bi: body i (left side of the pair)
            let bi = &sys.bodies[i];
            for j in (i + 1)..n {
                // bj: body j (right side of the pair)
                let bj = &sys.bodies[j];

                // r is the displacement from i to j, so i is pulled along +r
                // and j along -r
                let r = bj.x - bi.x;
                let dist = r.norm(); // |r|

                // optional hard floor on the separation
                if let Some(eps) = self.collision_eps {
                    if dist < eps {
                        return Err(SimError::Collision { t, i, j, distance: dist });
                    }
                }

                // 1 / |r|^3, inf at r = 0 and then 0 * inf = NaN below
                let inv_r3 = (dist * dist * dist).recip();
                let coef = self.G * inv_r3; // G / |r|^3

                // a_i += G m_j r / |r|^3
                out[i] += coef * bj.m * r;
                // a_j -= G m_i r / |r|^3 (equal and opposite)
                out[j] -= coef * bi.m * r;
            }
        }
        Ok(())
    }
}

/// First-order reduction of the N-body equations of motion
///
/// Position derivatives are the velocities; velocity derivatives are the
/// accelerations from `forces`. The state vector is read and written through
/// `layout`, and its length must be `4 * masses.len()`.
pub struct NBodyRhs {
    pub masses: Vec<f64>,
    pub layout: StateLayout,
    pub forces: AccelSet,
}

impl NBodyRhs {
    pub fn new(masses: Vec<f64>, layout: StateLayout, forces: AccelSet) -> Self {
        Self { masses, layout, forces }
    }

    pub fn bodies(&self) -> usize {
        self.masses.len()
    }
}

impl OdeSystem for NBodyRhs {
    fn dimension(&self) -> usize {
        4 * self.masses.len()
    }

    fn derivatives(&self, t: f64, y: &StateVec, dydt: &mut StateVec) -> SimResult<()> {
        let n = self.masses.len();
        if dydt.len() != y.len() {
            return Err(SimError::DimensionMismatch {
                expected: y.len(),
                found: dydt.len(),
            });
        }
        let sys = self.layout.unpack(y, &self.masses, t)?;

        let mut acc = vec![NVec2::zeros(); n];
        self.forces.accumulate_accels(t, &sys, &mut acc)?;

        for (i, (b, a)) in sys.bodies.iter().zip(acc.iter()).enumerate() {
            let p = self.layout.position_index(n, i);
            let q = self.layout.velocity_index(n, i);
            // d(x)/dt = v
            dydt[p] = b.v.x;
            dydt[p + 1] = b.v.y;
            // d(v)/dt = a
            dydt[q] = a.x;
            dydt[q + 1] = a.y;
        }

        if let Some(index) = dydt.iter().position(|d| !d.is_finite()) {
            return Err(SimError::NonFinite { t, index });
        }
        Ok(())
    }
}
