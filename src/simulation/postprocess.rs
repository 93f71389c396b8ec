//! Per-body tracks and the dimensionless-to-physical time conversion
//!
//! With G, the characteristic mass M and length L set to 1, one unit of
//! dimensionless time is `1 / sqrt(G M / L^3)` seconds.

use serde::Serialize;

use crate::configuration::config::UnitsConfig;
use crate::simulation::ode::Trajectory;
use crate::simulation::states::StateLayout;

/// SI gravitational constant (CODATA 2018), m^3 kg^-1 s^-2
pub const G_SI: f64 = 6.674_30e-11;
/// Nominal solar mass, kg
pub const SOLAR_MASS_KG: f64 = 1.988_47e30;
/// Astronomical unit, m
pub const AU_M: f64 = 1.495_978_707e11;
/// Julian year, s
pub const JULIAN_YEAR_S: f64 = 365.25 * 86_400.0;

/// Characteristic scales behind the dimensionless units
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScales {
    pub mass_kg: f64,
    pub length_m: f64,
    pub G_si: f64,
}

impl Default for UnitScales {
    /// One solar mass and one astronomical unit
    fn default() -> Self {
        Self {
            mass_kg: SOLAR_MASS_KG,
            length_m: AU_M,
            G_si: G_SI,
        }
    }
}

impl From<&UnitsConfig> for UnitScales {
    fn from(cfg: &UnitsConfig) -> Self {
        Self {
            mass_kg: cfg.mass_kg,
            length_m: cfg.length_m,
            G_si: G_SI,
        }
    }
}

impl UnitScales {
    /// Seconds per unit of dimensionless time
    pub fn seconds_per_unit(&self) -> f64 {
        1.0 / (self.G_si * self.mass_kg / self.length_m.powi(3)).sqrt()
    }

    /// Julian years per unit of dimensionless time
    pub fn years_per_unit(&self) -> f64 {
        self.seconds_per_unit() / JULIAN_YEAR_S
    }
}

/// Ordered coordinate sequences of one body, one entry per grid sample
#[derive(Debug, Clone, Serialize)]
pub struct BodyTrack {
    pub index: usize,
    pub mass: f64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
}

/// Post-processed view of a trajectory
#[derive(Debug, Clone, Serialize)]
pub struct PostProcessed {
    pub tracks: Vec<BodyTrack>,
    pub times: Vec<f64>,
    pub times_years: Vec<f64>,
    pub years_per_unit: f64,
}

/// Split a trajectory into per-body tracks and rescale its time axis
pub fn post_process(traj: &Trajectory, masses: &[f64], layout: StateLayout, units: &UnitScales) -> PostProcessed {
    let n = masses.len();
    let samples = traj.len();

    let mut tracks: Vec<BodyTrack> = masses
        .iter()
        .enumerate()
        .map(|(index, &mass)| BodyTrack {
            index,
            mass,
            x: Vec::with_capacity(samples),
            y: Vec::with_capacity(samples),
            vx: Vec::with_capacity(samples),
            vy: Vec::with_capacity(samples),
        })
        .collect();

    for state in &traj.states {
        for (i, track) in tracks.iter_mut().enumerate() {
            let p = layout.position(state, n, i);
            let v = layout.velocity(state, n, i);
            track.x.push(p.x);
            track.y.push(p.y);
            track.vx.push(v.x);
            track.vy.push(v.y);
        }
    }

    let years_per_unit = units.years_per_unit();
    PostProcessed {
        tracks,
        times: traj.times.clone(),
        times_years: traj.times.iter().map(|t| t * years_per_unit).collect(),
        years_per_unit,
    }
}
