//! Core state types for the N-body integration.
//!
//! Defines the planar body/system structs and the layout contract that maps
//! a `System` onto the flat state vector handed to the ODE solvers:
//! - `Body` / `System` using `NVec2`
//! - `StateLayout` for packing/unpacking `StateVec` (length 4N)

use nalgebra::{DVector, Vector2};
use serde::Deserialize;

use crate::error::{SimError, SimResult};

pub type NVec2 = Vector2<f64>;
pub type StateVec = DVector<f64>;

#[derive(Debug, Clone)]
pub struct Body {
    pub x: NVec2, // position
    pub v: NVec2, // velocity
    pub m: f64, // dimensionless mass
}

impl Body {
    pub fn new(x: [f64; 2], v: [f64; 2], m: f64) -> Self {
        Self {
            x: NVec2::new(x[0], x[1]),
            v: NVec2::new(v[0], v[1]),
            m,
        }
    }
}

#[derive(Debug, Clone)]
pub struct System {
    pub bodies: Vec<Body>, // collection of bodies, index is identity
    pub t: f64, // time
}

impl System {
    pub fn new(bodies: Vec<Body>) -> Self {
        Self { bodies, t: 0.0 }
    }

    pub fn masses(&self) -> Vec<f64> {
        self.bodies.iter().map(|b| b.m).collect()
    }

    /// Length of the state vector for this system.
    pub fn state_len(&self) -> usize {
        4 * self.bodies.len()
    }

    /// Reject systems that cannot be integrated: no bodies, non-positive or
    /// non-finite masses, non-finite coordinates.
    pub fn validate(&self) -> SimResult<()> {
        if self.bodies.is_empty() {
            return Err(SimError::InvalidConfig("system has no bodies".into()));
        }
        for (i, b) in self.bodies.iter().enumerate() {
            if !(b.m.is_finite() && b.m > 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "body {i} has invalid mass {}",
                    b.m
                )));
            }
            if !(b.x.iter().all(|c| c.is_finite()) && b.v.iter().all(|c| c.is_finite())) {
                return Err(SimError::InvalidConfig(format!(
                    "body {i} has non-finite initial conditions"
                )));
            }
        }
        Ok(())
    }
}

/// Field order of the flat state vector
///
/// The layout is fixed for the duration of a run: the derivative function,
/// the solver and the post-processor all index the vector through it.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateLayout {
    /// `[x1, y1, ..., xN, yN, vx1, vy1, ..., vxN, vyN]`
    #[serde(rename = "blocked")]
    #[default]
    Blocked,

    /// `[x1, y1, vx1, vy1, x2, y2, vx2, vy2, ...]`
    #[serde(rename = "interleaved")]
    Interleaved,
}

impl StateLayout {
    /// Index of body `i`'s x position; y follows at `+ 1`.
    pub fn position_index(self, _n: usize, i: usize) -> usize {
        match self {
            StateLayout::Blocked => 2 * i,
            StateLayout::Interleaved => 4 * i,
        }
    }

    /// Index of body `i`'s x velocity; y follows at `+ 1`.
    pub fn velocity_index(self, n: usize, i: usize) -> usize {
        match self {
            StateLayout::Blocked => 2 * n + 2 * i,
            StateLayout::Interleaved => 4 * i + 2,
        }
    }

    pub fn position(self, y: &StateVec, n: usize, i: usize) -> NVec2 {
        let k = self.position_index(n, i);
        NVec2::new(y[k], y[k + 1])
    }

    pub fn velocity(self, y: &StateVec, n: usize, i: usize) -> NVec2 {
        let k = self.velocity_index(n, i);
        NVec2::new(y[k], y[k + 1])
    }

    /// Flatten a system into a state vector.
    pub fn pack(self, sys: &System) -> StateVec {
        let n = sys.bodies.len();
        let mut y = StateVec::zeros(sys.state_len());
        for (i, b) in sys.bodies.iter().enumerate() {
            let p = self.position_index(n, i);
            let q = self.velocity_index(n, i);
            y[p] = b.x.x;
            y[p + 1] = b.x.y;
            y[q] = b.v.x;
            y[q + 1] = b.v.y;
        }
        y
    }

    /// Rebuild a system at time `t` from a state vector and the fixed masses.
    pub fn unpack(self, y: &StateVec, masses: &[f64], t: f64) -> SimResult<System> {
        let n = masses.len();
        if y.len() != 4 * n {
            return Err(SimError::DimensionMismatch {
                expected: 4 * n,
                found: y.len(),
            });
        }
        let bodies = masses
            .iter()
            .enumerate()
            .map(|(i, &m)| Body {
                x: self.position(y, n, i),
                v: self.velocity(y, n, i),
                m,
            })
            .collect();
        Ok(System { bodies, t })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_bodies() -> System {
        System::new(vec![
            Body::new([1.0, 2.0], [3.0, 4.0], 1.0),
            Body::new([5.0, 6.0], [7.0, 8.0], 2.0),
            Body::new([9.0, 10.0], [11.0, 12.0], 3.0),
        ])
    }

    #[test]
    fn blocked_puts_positions_first() {
        let y = StateLayout::Blocked.pack(&three_bodies());
        assert_eq!(
            y.as_slice(),
            &[1.0, 2.0, 5.0, 6.0, 9.0, 10.0, 3.0, 4.0, 7.0, 8.0, 11.0, 12.0]
        );
    }

    #[test]
    fn interleaved_groups_by_body() {
        let y = StateLayout::Interleaved.pack(&three_bodies());
        assert_eq!(
            y.as_slice(),
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0]
        );
    }

    #[test]
    fn unpack_rejects_wrong_length() {
        let y = StateVec::zeros(7);
        let err = StateLayout::Blocked.unpack(&y, &[1.0, 1.0], 0.0).unwrap_err();
        assert!(matches!(err, SimError::DimensionMismatch { expected: 8, found: 7 }));
    }

    #[test]
    fn validate_rejects_massless_body() {
        let sys = System::new(vec![Body::new([0.0, 0.0], [0.0, 0.0], 0.0)]);
        assert!(matches!(sys.validate(), Err(SimError::InvalidConfig(_))));
    }
}
