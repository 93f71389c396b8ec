use std::time::Instant;

use crate::configuration::config::IntegratorConfig;
use crate::error::SimResult;
use crate::simulation::engine::run_scenario;
use crate::simulation::scenario::{figure_eight, two_body_circular, Scenario};

/// Time every solver on both preset families
pub fn bench_solvers() -> SimResult<()> {
    let solvers = [
        (IntegratorConfig::Adams, None),
        (IntegratorConfig::Rkf78, None),
        (IntegratorConfig::Rk4, Some(20)),
    ];

    for base in [two_body_circular(), figure_eight()] {
        for (integrator, substeps) in solvers {
            let mut scenario = base.clone();
            scenario.integrator = integrator;
            scenario.substeps = substeps;

            // Warm up
            run_scenario(&scenario)?;

            let t0 = Instant::now();
            let result = run_scenario(&scenario)?;
            let elapsed = t0.elapsed().as_secs_f64();

            println!(
                "{:14} {:6}: {:8.4} s, steps = {:7}, evals = {:8}, energy drift = {:.3e}",
                scenario.name,
                result.solver,
                elapsed,
                result.trajectory.stats.steps(),
                result.trajectory.stats.evaluations,
                result.conservation.energy_rel_drift
            );
        }
    }
    Ok(())
}

/// Cost and energy drift of the 3-body run across tolerances
/// Paste output directly into a spreadsheet to graph
pub fn bench_tolerance_curve() -> SimResult<()> {
    println!("rtol,atol,ms,steps,energy_drift");

    for k in 4..=12 {
        let rtol = 10f64.powi(-k);
        let atol = rtol * 1e-3;

        let mut scenario: Scenario = figure_eight();
        scenario.parameters.rtol = rtol;
        scenario.parameters.atol = atol;

        let t0 = Instant::now();
        let result = run_scenario(&scenario)?;
        let ms = t0.elapsed().as_secs_f64() * 1000.0;

        println!(
            "{:e},{:e},{:.3},{},{:e}",
            rtol,
            atol,
            ms,
            result.trajectory.stats.steps(),
            result.conservation.energy_rel_drift
        );
    }
    Ok(())
}
