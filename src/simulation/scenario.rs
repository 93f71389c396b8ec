//! Build fully-initialized scenarios from configuration or presets
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a runtime `Scenario`
//! containing:
//! - solver choice and state layout
//! - numerical parameters (`Parameters`)
//! - system state (`System` with bodies at t = t_start)
//! - unit scales for the years axis
//!
//! Each scenario owns its configuration; nothing is shared between runs.

use crate::configuration::config::{BodyConfig, IntegratorConfig, ScenarioConfig};
use crate::error::{SimError, SimResult};
use crate::simulation::forces::{AccelSet, NBodyRhs, NewtonianGravity};
use crate::simulation::params::Parameters;
use crate::simulation::postprocess::UnitScales;
use crate::simulation::states::{Body, StateLayout, System};

/// Names accepted by [`Scenario::preset`]
pub const PRESETS: [&str; 3] = ["two-body", "li-liao", "figure-eight"];

/// Published (m3 = 1) configuration: velocity components and period
pub const LI_LIAO_V: (f64, f64) = (0.39295, 0.09758);
pub const LI_LIAO_PERIOD: f64 = 7.0039;
/// Figure-eight choreography: velocity components and period
pub const FIGURE_EIGHT_V: (f64, f64) = (0.347111, 0.532728);
pub const FIGURE_EIGHT_PERIOD: f64 = 6.324449;

/// A fully-initialized run: what to integrate and how
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub integrator: IntegratorConfig,
    pub substeps: Option<usize>,
    pub layout: StateLayout,
    pub parameters: Parameters,
    pub system: System,
    pub units: UnitScales,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> SimResult<Self> {
        // Bodies: map `BodyConfig` -> runtime `Body`
        let bodies = cfg
            .bodies
            .iter()
            .enumerate()
            .map(|(i, bc)| body_from_config(i, bc))
            .collect::<SimResult<Vec<Body>>>()?;

        let p_cfg = cfg.parameters;
        let parameters = Parameters {
            t_start: p_cfg.t_start,
            t_end: p_cfg.t_end,
            samples: p_cfg.samples,
            h0: p_cfg.h0,
            atol: p_cfg.atol,
            rtol: p_cfg.rtol,
            max_steps: p_cfg.max_steps,
            collision_eps: p_cfg.collision_eps,
            G: p_cfg.G,
        };

        // Initial system state at t_start
        let system = System {
            bodies,
            t: parameters.t_start,
        };

        let units = cfg.units.as_ref().map(UnitScales::from).unwrap_or_default();

        Ok(Self {
            name: cfg.name,
            integrator: cfg.engine.integrator,
            substeps: cfg.engine.substeps,
            layout: cfg.engine.layout,
            parameters,
            system,
            units,
        })
    }

    /// Look up a built-in scenario by name
    pub fn preset(name: &str) -> SimResult<Self> {
        match name {
            "two-body" => Ok(two_body_circular()),
            "li-liao" => Ok(li_liao()),
            "figure-eight" => Ok(figure_eight()),
            other => Err(SimError::InvalidConfig(format!(
                "unknown preset '{other}', expected one of {PRESETS:?}"
            ))),
        }
    }

    /// Derivative function for this scenario's bodies and layout
    pub fn rhs(&self) -> NBodyRhs {
        let forces = AccelSet::new().with(NewtonianGravity {
            G: self.parameters.G,
            collision_eps: self.parameters.collision_eps,
        });
        NBodyRhs::new(self.system.masses(), self.layout, forces)
    }
}

fn body_from_config(i: usize, bc: &BodyConfig) -> SimResult<Body> {
    if bc.x.len() != 2 || bc.v.len() != 2 {
        return Err(SimError::InvalidConfig(format!(
            "body {i}: expected 2 position and 2 velocity components, got {} and {}",
            bc.x.len(),
            bc.v.len()
        )));
    }
    Ok(Body::new([bc.x[0], bc.x[1]], [bc.v[0], bc.v[1]], bc.m))
}

// =========================================================================================
// presets
// =========================================================================================

/// Heavy body at rest at the origin, light body on the unit circle
///
/// Two orbits of the light body over 500 samples, Adams PECE.
pub fn two_body_circular() -> Scenario {
    let system = System::new(vec![
        Body::new([0.0, 0.0], [0.0, 0.0], 1.0),
        Body::new([1.0, 0.0], [0.0, 1.0], 3.0e-6),
    ]);
    Scenario {
        name: "two-body".to_string(),
        integrator: IntegratorConfig::Adams,
        substeps: None,
        layout: StateLayout::Blocked,
        parameters: Parameters {
            t_start: 0.0,
            t_end: 4.0 * std::f64::consts::PI,
            samples: 500,
            ..Parameters::default()
        },
        system,
        units: UnitScales::default(),
    }
}

/// Zero-angular-momentum 3-body configuration
///
/// Bodies 1 and 2 have unit mass at (-1, 0) and (1, 0) moving with
/// `(v1, v2)`; body 3 of mass `m3` sits at the origin with the velocity that
/// zeroes total momentum. Both angular momentum and momentum vanish.
pub fn three_body_periodic(m3: f64, v1: f64, v2: f64) -> Scenario {
    let system = System::new(vec![
        Body::new([-1.0, 0.0], [v1, v2], 1.0),
        Body::new([1.0, 0.0], [v1, v2], 1.0),
        Body::new([0.0, 0.0], [-2.0 * v1 / m3, -2.0 * v2 / m3], m3),
    ]);
    Scenario {
        name: format!("three-body(m3={m3}, v1={v1}, v2={v2})"),
        integrator: IntegratorConfig::Rkf78,
        substeps: None,
        layout: StateLayout::Interleaved,
        parameters: Parameters {
            t_start: 0.0,
            t_end: 20.0,
            samples: 1000,
            rtol: 1e-10,
            atol: 1e-13,
            ..Parameters::default()
        },
        system,
        units: UnitScales::default(),
    }
}

/// The published m3 = 1 configuration over 20 time units
pub fn li_liao() -> Scenario {
    let mut s = three_body_periodic(1.0, LI_LIAO_V.0, LI_LIAO_V.1);
    s.name = "li-liao".to_string();
    s
}

/// Figure-eight choreography, integrated a little past one period
pub fn figure_eight() -> Scenario {
    let mut s = three_body_periodic(1.0, FIGURE_EIGHT_V.0, FIGURE_EIGHT_V.1);
    s.name = "figure-eight".to_string();
    s.parameters.t_end = 7.0;
    s.parameters.samples = 7001;
    s
}
