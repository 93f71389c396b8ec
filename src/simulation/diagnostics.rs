//! Conserved quantities and period search
//!
//! An isolated system keeps its total energy, angular momentum, momentum
//! and center-of-mass velocity; drift in these is the regression check for
//! the force law and the solver settings.

use crate::error::SimResult;
use crate::simulation::ode::Trajectory;
use crate::simulation::states::{NVec2, StateLayout, System};

/// Kinetic plus pairwise potential energy
#[allow(non_snake_case)]
pub fn total_energy(sys: &System, G: f64) -> f64 {
    let kinetic: f64 = sys.bodies.iter().map(|b| 0.5 * b.m * b.v.norm_squared()).sum();

    let mut potential = 0.0;
    for (i, bi) in sys.bodies.iter().enumerate() {
        for bj in &sys.bodies[i + 1..] {
            potential -= G * bi.m * bj.m / (bj.x - bi.x).norm();
        }
    }
    kinetic + potential
}

/// z-component of the total angular momentum about the origin
pub fn angular_momentum(sys: &System) -> f64 {
    sys.bodies
        .iter()
        .map(|b| b.m * (b.x.x * b.v.y - b.x.y * b.v.x))
        .sum()
}

pub fn total_momentum(sys: &System) -> NVec2 {
    sys.bodies
        .iter()
        .fold(NVec2::zeros(), |acc, b| acc + b.v * b.m)
}

pub fn total_mass(sys: &System) -> f64 {
    sys.bodies.iter().map(|b| b.m).sum()
}

pub fn center_of_mass(sys: &System) -> NVec2 {
    let weighted = sys
        .bodies
        .iter()
        .fold(NVec2::zeros(), |acc, b| acc + b.x * b.m);
    weighted / total_mass(sys)
}

pub fn center_of_mass_velocity(sys: &System) -> NVec2 {
    total_momentum(sys) / total_mass(sys)
}

/// Worst-case drift of the invariants over a trajectory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConservationReport {
    pub energy_rel_drift: f64, // max |E(t) - E0| / |E0|
    pub angular_momentum_drift: f64, // max |L(t) - L0|, absolute since L0 may be 0
    pub com_drift: f64, // max |COM(t) - (COM0 + V0 t)|
    pub com_velocity_drift: f64, // max |V(t) - V0|
}

#[allow(non_snake_case)]
pub fn conservation_report(traj: &Trajectory, masses: &[f64], layout: StateLayout, G: f64) -> SimResult<ConservationReport> {
    let t0 = traj.times[0];
    let sys0 = layout.unpack(traj.initial(), masses, t0)?;
    let e0 = total_energy(&sys0, G);
    let l0 = angular_momentum(&sys0);
    let com0 = center_of_mass(&sys0);
    let v0 = center_of_mass_velocity(&sys0);

    let mut report = ConservationReport {
        energy_rel_drift: 0.0,
        angular_momentum_drift: 0.0,
        com_drift: 0.0,
        com_velocity_drift: 0.0,
    };

    for (t, y) in traj.iter() {
        let sys = layout.unpack(y, masses, t)?;
        let e = total_energy(&sys, G);
        let de = if e0 != 0.0 { ((e - e0) / e0).abs() } else { (e - e0).abs() };
        let expected_com = com0 + v0 * (t - t0);

        report.energy_rel_drift = report.energy_rel_drift.max(de);
        report.angular_momentum_drift = report
            .angular_momentum_drift
            .max((angular_momentum(&sys) - l0).abs());
        report.com_drift = report
            .com_drift
            .max((center_of_mass(&sys) - expected_com).norm());
        report.com_velocity_drift = report
            .com_velocity_drift
            .max((center_of_mass_velocity(&sys) - v0).norm());
    }
    Ok(report)
}

/// Sample at or after `min_time` whose state is closest to the initial one
///
/// Returns `(time, distance)`; `None` when no sample qualifies. For a
/// periodic orbit the time approximates the period when `min_time` skips
/// the start of the run.
pub fn closest_return(traj: &Trajectory, min_time: f64) -> Option<(f64, f64)> {
    let y0 = traj.initial();
    traj.iter()
        .filter(|(t, _)| *t >= min_time)
        .map(|(t, y)| (t, (y - y0).norm()))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}
