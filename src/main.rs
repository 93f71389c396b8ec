use orbsim::{Scenario, ScenarioConfig, Engine, RunResult};
use orbsim::{bench_solvers, bench_tolerance_curve, write_trajectory_yaml};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Planar gravitational N-body integration")]
struct Args {
    /// Scenario YAML; relative paths resolve under the crate's `scenarios/`
    #[arg(short, long = "file")]
    file_name: Option<String>,

    /// Built-in scenario: two-body, li-liao or figure-eight
    #[arg(short, long, conflicts_with = "file_name")]
    preset: Option<String>,

    /// Write the trajectory to this YAML file
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Replay the trajectory in a window (needs the `viewer` feature)
    #[arg(long)]
    view: bool,

    /// Time the solvers instead of running a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let given = PathBuf::from(file_name);
    let config_path = if given.is_absolute() || given.exists() {
        given
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name)
    };

    let file = File::open(&config_path)
        .with_context(|| format!("opening scenario {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg = ScenarioConfig::from_reader(reader)
        .with_context(|| format!("parsing scenario {}", config_path.display()))?;

    Ok(scenario_cfg)
}

fn report(result: &RunResult) {
    let stats = result.trajectory.stats;
    let t_end = result.output.times.last().copied().unwrap_or_default();
    let years_end = result.output.times_years.last().copied().unwrap_or_default();

    println!("scenario      : {}", result.scenario);
    println!("solver        : {}", result.solver);
    println!("samples       : {}", result.trajectory.len());
    println!("steps         : {} accepted, {} rejected, {} evaluations", stats.accepted, stats.rejected, stats.evaluations);
    println!("t_end         : {t_end} ({years_end:.6} yr, {:.6e} yr/unit)", result.output.years_per_unit);
    println!("energy drift  : {:.3e} (relative)", result.conservation.energy_rel_drift);
    println!("L drift       : {:.3e}", result.conservation.angular_momentum_drift);
    println!("COM drift     : {:.3e}", result.conservation.com_drift);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.bench {
        bench_solvers()?;
        bench_tolerance_curve()?;
        return Ok(());
    }

    let scenario = match (&args.file_name, &args.preset) {
        (Some(file_name), _) => Scenario::build_scenario(load_scenario_from_yaml(file_name)?)?,
        (None, Some(preset)) => Scenario::preset(preset)?,
        (None, None) => Scenario::preset("two-body")?,
    };

    let engine = Engine::from_scenario(&scenario)?;
    let result = engine.run()?;
    report(&result);

    if let Some(path) = &args.export {
        write_trajectory_yaml(path, &result)?;
    }

    if args.view {
        #[cfg(feature = "viewer")]
        orbsim::run_replay(result.output);

        #[cfg(not(feature = "viewer"))]
        anyhow::bail!("--view needs the `viewer` feature");
    }

    Ok(())
}
