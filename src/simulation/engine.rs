//! Runtime engine: validate, integrate, post-process
//!
//! Built once from a `Scenario`; each run is a single blocking call that
//! either returns a complete `RunResult` or the first error encountered.

use tracing::{info, warn};

use crate::error::{SimError, SimResult};
use crate::simulation::diagnostics::{conservation_report, ConservationReport};
use crate::simulation::forces::NBodyRhs;
use crate::simulation::integrator::{solver_for, Solver};
use crate::simulation::ode::{OdeSystem, TimeGrid, Trajectory};
use crate::simulation::postprocess::{post_process, PostProcessed, UnitScales};
use crate::simulation::scenario::Scenario;
use crate::simulation::states::{StateLayout, StateVec};

/// Everything one run produces
#[derive(Debug, Clone)]
pub struct RunResult {
    pub scenario: String,
    pub solver: &'static str,
    pub trajectory: Trajectory,
    pub output: PostProcessed,
    pub conservation: ConservationReport,
}

pub struct Engine {
    name: String,
    solver: Box<dyn Solver>,
    rhs: NBodyRhs,
    grid: TimeGrid,
    layout: StateLayout,
    initial: StateVec,
    units: UnitScales,
    g: f64,
}

impl Engine {
    pub fn from_scenario(scenario: &Scenario) -> SimResult<Self> {
        scenario.system.validate()?;
        let p = &scenario.parameters;
        if !(p.rtol > 0.0 && p.atol > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "tolerances must be positive (rtol = {}, atol = {})",
                p.rtol, p.atol
            )));
        }
        let grid = p.grid()?;

        Ok(Self {
            name: scenario.name.clone(),
            solver: solver_for(&scenario.integrator, scenario.substeps, p),
            rhs: scenario.rhs(),
            grid,
            layout: scenario.layout,
            initial: scenario.layout.pack(&scenario.system),
            units: scenario.units,
            g: p.G,
        })
    }

    pub fn initial_state(&self) -> &StateVec {
        &self.initial
    }

    /// Integrate from the scenario's own initial conditions
    pub fn run(&self) -> SimResult<RunResult> {
        self.run_state(&self.initial)
    }

    /// Integrate from an explicit state vector
    ///
    /// The length is checked before the first derivative evaluation.
    pub fn run_state(&self, y0: &StateVec) -> SimResult<RunResult> {
        if y0.len() != self.rhs.dimension() {
            warn!(scenario = %self.name, expected = self.rhs.dimension(), found = y0.len(), "state vector length mismatch");
            return Err(SimError::DimensionMismatch {
                expected: self.rhs.dimension(),
                found: y0.len(),
            });
        }

        info!(
            scenario = %self.name,
            solver = self.solver.name(),
            bodies = self.rhs.bodies(),
            samples = self.grid.len(),
            t_end = self.grid.end(),
            "integrating"
        );

        let trajectory = match self.solver.solve(&self.rhs, y0, &self.grid) {
            Ok(traj) => traj,
            Err(e) => {
                warn!(scenario = %self.name, error = %e, "integration failed");
                return Err(e);
            }
        };

        info!(
            scenario = %self.name,
            accepted = trajectory.stats.accepted,
            rejected = trajectory.stats.rejected,
            evaluations = trajectory.stats.evaluations,
            "integration finished"
        );

        let output = post_process(&trajectory, &self.rhs.masses, self.layout, &self.units);
        let conservation = conservation_report(&trajectory, &self.rhs.masses, self.layout, self.g)?;

        Ok(RunResult {
            scenario: self.name.clone(),
            solver: self.solver.name(),
            trajectory,
            output,
            conservation,
        })
    }
}

/// Build an engine for `scenario` and run it once
pub fn run_scenario(scenario: &Scenario) -> SimResult<RunResult> {
    Engine::from_scenario(scenario)?.run()
}
