pub mod states;
pub mod params;
pub mod ode;
pub mod forces;
pub mod integrator;
pub mod scenario;
pub mod engine;
pub mod postprocess;
pub mod diagnostics;
