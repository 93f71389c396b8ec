//! Configuration types for loading integration scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! scenario. A scenario consists of:
//!
//! - [`EngineConfig`]     – solver choice and state-vector layout
//! - [`ParametersConfig`] – output grid, tolerances and physical constants
//! - [`UnitsConfig`]      – characteristic mass/length scales (optional)
//! - [`BodyConfig`]       – initial state for each body
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! A 3-body periodic-orbit scenario matching these types:
//!
//! ```yaml
//! name: "li-liao"
//!
//! engine:
//!   integrator: "rkf78"     # or "adams" / "rk4"
//!   layout: "interleaved"   # or "blocked"
//!
//! parameters:
//!   t_start: 0.0
//!   t_end: 20.0
//!   samples: 1000           # output samples, both ends included
//!   rtol: 1.0e-10
//!   atol: 1.0e-13
//!   max_steps: 100000
//!   G: 1.0
//!
//! units:                    # optional, defaults to 1 solar mass / 1 AU
//!   mass_kg: 1.98847e30
//!   length_m: 1.495978707e11
//!
//! bodies:
//!   - x: [ -1.0, 0.0 ]
//!     v: [ 0.39295, 0.09758 ]
//!     m: 1.0
//!   - x: [  1.0, 0.0 ]
//!     v: [ 0.39295, 0.09758 ]
//!     m: 1.0
//!   - x: [  0.0, 0.0 ]
//!     v: [ -0.7859, -0.19516 ]
//!     m: 1.0
//! ```
//!
//! `Scenario::build_scenario` maps this into the runtime types.

use serde::Deserialize;

use crate::simulation::states::StateLayout;

/// Which ODE solver the engine uses
/// `integrator: "adams"`, `"rkf78"` or `"rk4"`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorConfig {
    #[serde(rename = "adams")] // 4th order Adams–Bashforth–Moulton PECE, substeps adapted per output interval
    Adams,

    #[serde(rename = "rkf78")] // Fehlberg 7(8) adaptive Runge–Kutta, tight tolerances for close encounters
    Rkf78,

    #[serde(rename = "rk4")] // Classical RK4 with fixed substeps, no error control
    Rk4,
}

/// Solver and state-layout selection
#[derive(Deserialize, Debug, Clone)]
pub struct EngineConfig {
    pub integrator: IntegratorConfig, // Solver used to advance the state vector
    #[serde(default)]
    pub layout: StateLayout, // Field order of the state vector
    #[serde(default)]
    pub substeps: Option<usize>, // Initial (adams) or fixed (rk4) substeps per output interval
}

/// Output grid, tolerances and physical constants
#[allow(non_snake_case)]
#[derive(Deserialize, Debug, Clone)]
pub struct ParametersConfig {
    #[serde(default)]
    pub t_start: f64, // time start
    pub t_end: f64, // time end
    pub samples: usize, // number of output samples
    #[serde(default)]
    pub h0: Option<f64>, // initial step, automatic if absent
    #[serde(default = "default_tol")]
    pub atol: f64, // absolute error tolerance
    #[serde(default = "default_tol")]
    pub rtol: f64, // relative error tolerance
    #[serde(default = "default_max_steps")]
    pub max_steps: usize, // accepted + rejected step limit
    #[serde(default)]
    pub collision_eps: Option<f64>, // report closer pairs as collisions
    #[serde(default = "default_g")]
    pub G: f64, // gravitational constant
}

fn default_tol() -> f64 {
    1.49e-8
}

fn default_max_steps() -> usize {
    100_000
}

fn default_g() -> f64 {
    1.0
}

/// Characteristic scales used to turn dimensionless time into years
#[derive(Deserialize, Debug, Clone)]
pub struct UnitsConfig {
    pub mass_kg: f64, // characteristic mass M
    pub length_m: f64, // characteristic length L
}

/// Configuration for a single body's initial state
#[derive(Deserialize, Debug, Clone)]
pub struct BodyConfig {
    pub x: Vec<f64>, // Initial position `[x, y]` in dimensionless units
    pub v: Vec<f64>, // Initial velocity `[vx, vy]` in dimensionless units
    pub m: f64,      // Dimensionless mass
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub engine: EngineConfig, // Solver and layout
    pub parameters: ParametersConfig, // Grid, tolerances and constants
    #[serde(default)]
    pub units: Option<UnitsConfig>, // Unit scales for the years axis
    pub bodies: Vec<BodyConfig>, // Initial state of every body
}

fn default_name() -> String {
    "scenario".to_string()
}

impl ScenarioConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_reader(reader)
    }
}
