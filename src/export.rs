//! Trajectory export
//!
//! Writes a finished run as YAML: dimensionless and physical time axes plus
//! the per-body tracks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::SimResult;
use crate::simulation::engine::RunResult;
use crate::simulation::postprocess::BodyTrack;

#[derive(Serialize)]
struct TrajectoryDoc<'a> {
    scenario: &'a str,
    solver: &'a str,
    years_per_unit: f64,
    times: &'a [f64],
    times_years: &'a [f64],
    bodies: &'a [BodyTrack],
}

/// Serialize `result` to a YAML string
pub fn trajectory_yaml(result: &RunResult) -> SimResult<String> {
    let doc = TrajectoryDoc {
        scenario: &result.scenario,
        solver: result.solver,
        years_per_unit: result.output.years_per_unit,
        times: &result.output.times,
        times_years: &result.output.times_years,
        bodies: &result.output.tracks,
    };
    Ok(serde_yaml::to_string(&doc)?)
}

/// Write `result` to `path` as YAML
pub fn write_trajectory_yaml(path: &Path, result: &RunResult) -> SimResult<()> {
    let yaml = trajectory_yaml(result)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(yaml.as_bytes())?;
    writer.flush()?;
    info!(path = %path.display(), samples = result.output.times.len(), "trajectory exported");
    Ok(())
}
