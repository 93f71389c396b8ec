pub mod error;
pub mod simulation;
pub mod configuration;
pub mod export;
pub mod visualization;
pub mod benchmark;

pub use error::{ConvergenceFailure, SimError, SimResult};

pub use simulation::states::{Body, System, NVec2, StateLayout, StateVec};
pub use simulation::forces::{Acceleration, AccelSet, NewtonianGravity, NBodyRhs};
pub use simulation::ode::{OdeSystem, TimeGrid, Trajectory, SolverStats};
pub use simulation::integrator::{Solver, AdamsPece, Rkf78, FixedRk4, solver_for};
pub use simulation::params::Parameters;
pub use simulation::scenario::{Scenario, two_body_circular, three_body_periodic, li_liao, figure_eight};
pub use simulation::engine::{Engine, RunResult, run_scenario};
pub use simulation::postprocess::{UnitScales, BodyTrack, PostProcessed, post_process};
pub use simulation::diagnostics::{ConservationReport, closest_return};

pub use configuration::config::{IntegratorConfig, EngineConfig, ParametersConfig, UnitsConfig, BodyConfig, ScenarioConfig};

pub use export::write_trajectory_yaml;

#[cfg(feature = "viewer")]
pub use visualization::replay2d::run_replay;

pub use benchmark::benchmark::{bench_solvers, bench_tolerance_curve};
