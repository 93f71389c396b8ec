use approx::{assert_abs_diff_eq, assert_relative_eq};

use orbsim::simulation::diagnostics::closest_return;
use orbsim::simulation::scenario::{FIGURE_EIGHT_PERIOD, LI_LIAO_PERIOD, PRESETS};
use orbsim::{
    figure_eight, li_liao, run_scenario, two_body_circular, AccelSet, Body, ConvergenceFailure, Engine,
    IntegratorConfig, NBodyRhs, NVec2, NewtonianGravity, OdeSystem, Scenario, ScenarioConfig, SimError,
    StateLayout, StateVec, System, UnitScales,
};

/// Build a simple 2-body System at rest, separated along the x-axis
pub fn two_body_system(dist: f64, m1: f64, m2: f64) -> System {
    System::new(vec![
        Body::new([-dist / 2.0, 0.0], [0.0, 0.0], m1),
        Body::new([dist / 2.0, 0.0], [0.0, 0.0], m2),
    ])
}

/// Dimensionless gravity, optionally with a collision epsilon
pub fn gravity_set(collision_eps: Option<f64>) -> AccelSet {
    AccelSet::new().with(NewtonianGravity { collision_eps, ..NewtonianGravity::dimensionless() })
}

pub fn rhs_for(sys: &System, layout: StateLayout, collision_eps: Option<f64>) -> NBodyRhs {
    NBodyRhs::new(sys.masses(), layout, gravity_set(collision_eps))
}

/// Two-body preset with its bodies replaced, integrated with rkf78
pub fn two_body_scenario(bodies: Vec<Body>) -> Scenario {
    let mut s = two_body_circular();
    s.system = System::new(bodies);
    s.integrator = IntegratorConfig::Rkf78;
    s.parameters.rtol = 1e-10;
    s.parameters.atol = 1e-13;
    s.parameters.t_end = 10.0;
    s.parameters.samples = 201;
    s
}

fn accels(sys: &System) -> Vec<NVec2> {
    let mut acc = vec![NVec2::zeros(); sys.bodies.len()];
    gravity_set(None).accumulate_accels(sys.t, sys, &mut acc).unwrap();
    acc
}

// ==================================================================================
// Gravity tests
// ==================================================================================

#[test]
fn gravity_newton_third_law() {
    let sys = two_body_system(1.0, 2.0, 3.0);
    let acc = accels(&sys);

    let net = acc[0] * sys.bodies[0].m + acc[1] * sys.bodies[1].m;

    assert!(net.norm() < 1e-12, "Net force not zero: {:?}", net);
}

#[test]
fn gravity_points_toward_other_body() {
    let sys = two_body_system(2.0, 1.0, 1.0);
    let acc = accels(&sys);

    let dx = sys.bodies[1].x - sys.bodies[0].x;
    assert!(acc[0].dot(&dx) > 0.0, "Acceleration is not toward second body");
}

#[test]
fn gravity_inverse_square_law() {
    let acc_r = accels(&two_body_system(1.0, 1.0, 1.0));
    let acc_2r = accels(&two_body_system(2.0, 1.0, 1.0));

    let ratio = acc_r[0].norm() / acc_2r[0].norm();

    assert_relative_eq!(ratio, 4.0, epsilon = 1e-12);
    // G = 1, m = 1, r = 1
    assert_relative_eq!(acc_r[0].norm(), 1.0, epsilon = 1e-12);
}

// ==================================================================================
// Derivative function tests
// ==================================================================================

#[test]
fn derivative_positions_follow_velocities() {
    let sys = System::new(vec![
        Body::new([-1.0, 0.0], [0.1, 0.2], 1.0),
        Body::new([1.0, 0.0], [0.3, 0.4], 2.0),
        Body::new([0.0, 1.5], [0.5, 0.6], 3.0),
    ]);
    let acc = accels(&sys);

    for layout in [StateLayout::Blocked, StateLayout::Interleaved] {
        let rhs = rhs_for(&sys, layout, None);
        let y = layout.pack(&sys);
        let mut dydt = StateVec::zeros(y.len());
        rhs.derivatives(0.0, &y, &mut dydt).unwrap();

        for (i, b) in sys.bodies.iter().enumerate() {
            assert_eq!(layout.position(&dydt, 3, i), b.v, "{layout:?} body {i}");
            assert_abs_diff_eq!(layout.velocity(&dydt, 3, i), acc[i], epsilon = 1e-15);
        }
    }
}

#[test]
fn coincident_bodies_report_non_finite() {
    let sys = System::new(vec![
        Body::new([0.5, 0.5], [0.0, 0.0], 1.0),
        Body::new([0.5, 0.5], [0.0, 0.0], 1.0),
    ]);
    let rhs = rhs_for(&sys, StateLayout::Blocked, None);
    let y = StateLayout::Blocked.pack(&sys);
    let mut dydt = StateVec::zeros(y.len());

    let err = rhs.derivatives(0.0, &y, &mut dydt).unwrap_err();
    assert!(matches!(err, SimError::NonFinite { .. }), "got {err:?}");
}

#[test]
fn coincident_bodies_fail_the_run() {
    let scenario = two_body_scenario(vec![
        Body::new([0.0, 0.0], [0.0, 0.0], 1.0),
        Body::new([0.0, 0.0], [0.0, 0.0], 1.0),
    ]);
    let err = run_scenario(&scenario).unwrap_err();
    assert!(err.is_singularity(), "got {err:?}");

    let mut adams = scenario.clone();
    adams.integrator = IntegratorConfig::Adams;
    assert!(run_scenario(&adams).unwrap_err().is_singularity());
}

#[test]
fn collision_eps_names_the_pair() {
    let sys = System::new(vec![
        Body::new([5.0, 5.0], [0.0, 0.0], 1.0),
        Body::new([0.0, 0.0], [0.0, 0.0], 1.0),
        Body::new([1e-6, 0.0], [0.0, 0.0], 1.0),
    ]);
    let rhs = rhs_for(&sys, StateLayout::Interleaved, Some(1e-3));
    let y = StateLayout::Interleaved.pack(&sys);
    let mut dydt = StateVec::zeros(y.len());

    match rhs.derivatives(0.25, &y, &mut dydt) {
        Err(SimError::Collision { t, i, j, distance }) => {
            assert_eq!((i, j), (1, 2));
            assert_eq!(t, 0.25);
            assert_relative_eq!(distance, 1e-6, epsilon = 1e-18);
        }
        other => panic!("expected collision, got {other:?}"),
    }
}

#[test]
fn dimension_mismatch_before_integration() {
    let engine = Engine::from_scenario(&two_body_circular()).unwrap();
    assert_eq!(engine.initial_state().len(), 8);

    let err = engine.run_state(&StateVec::zeros(7)).unwrap_err();
    assert!(matches!(err, SimError::DimensionMismatch { expected: 8, found: 7 }), "got {err:?}");
}

#[test]
fn empty_system_is_rejected() {
    let mut s = two_body_circular();
    s.system = System::new(Vec::new());
    assert!(matches!(Engine::from_scenario(&s), Err(SimError::InvalidConfig(_))));
}

// ==================================================================================
// Integrator tests
// ==================================================================================

#[test]
fn two_body_circular_orbit_keeps_radius() {
    let result = run_scenario(&two_body_circular()).unwrap();
    assert_eq!(result.solver, "adams");
    assert_eq!(result.trajectory.len(), 500);

    let heavy = &result.output.tracks[0];
    let light = &result.output.tracks[1];
    for k in 0..result.trajectory.len() {
        let r = ((light.x[k] - heavy.x[k]).powi(2) + (light.y[k] - heavy.y[k]).powi(2)).sqrt();
        assert!((r - 1.0).abs() < 1e-3, "radius {r} at sample {k}");
    }

    // two full orbits end where they started
    let back = (result.trajectory.last() - result.trajectory.initial()).norm();
    assert!(back < 1e-3, "orbit did not close: {back}");

    // one orbit: the light body is on the far side at t = pi
    let half = result
        .trajectory
        .times
        .iter()
        .position(|t| *t >= std::f64::consts::PI)
        .unwrap();
    assert!(light.x[half] < -0.99);
}

#[test]
fn solvers_agree_on_two_body() {
    let base = two_body_circular();
    let adams = run_scenario(&base).unwrap();

    let mut rkf = base.clone();
    rkf.integrator = IntegratorConfig::Rkf78;
    let rkf = run_scenario(&rkf).unwrap();

    let mut rk4 = base.clone();
    rk4.integrator = IntegratorConfig::Rk4;
    rk4.substeps = Some(4);
    let rk4 = run_scenario(&rk4).unwrap();

    assert!((adams.trajectory.last() - rkf.trajectory.last()).norm() < 1e-4);
    assert!((rk4.trajectory.last() - rkf.trajectory.last()).norm() < 1e-4);
}

#[test]
fn energy_and_angular_momentum_are_conserved() {
    let result = run_scenario(&figure_eight()).unwrap();
    let c = result.conservation;
    assert!(c.energy_rel_drift < 1e-7, "energy drift {}", c.energy_rel_drift);
    assert!(c.angular_momentum_drift < 1e-8, "L drift {}", c.angular_momentum_drift);

    let result = run_scenario(&two_body_circular()).unwrap();
    assert!(result.conservation.energy_rel_drift < 1e-4);
}

#[test]
fn center_of_mass_stays_fixed() {
    let result = run_scenario(&figure_eight()).unwrap();
    assert!(result.conservation.com_drift < 1e-10);
    assert!(result.conservation.com_velocity_drift < 1e-10);

    // moving COM: drift is measured against COM0 + V0 t
    let mut s = two_body_scenario(vec![
        Body::new([-1.0, 0.0], [0.3, -0.4], 1.0),
        Body::new([1.0, 0.0], [0.3, 0.4], 2.0),
    ]);
    s.parameters.t_end = 5.0;
    let result = run_scenario(&s).unwrap();
    assert!(result.conservation.com_drift < 1e-10);
    assert!(result.conservation.com_velocity_drift < 1e-10);
}

#[test]
fn swapping_mirrored_equal_masses_relabels_the_trajectory() {
    let a = Body::new([-1.0, 0.0], [0.0, -0.4], 1.0);
    let b = Body::new([1.0, 0.0], [0.0, 0.4], 1.0);

    let ab = run_scenario(&two_body_scenario(vec![a.clone(), b.clone()])).unwrap();
    let ba = run_scenario(&two_body_scenario(vec![b, a])).unwrap();

    for k in 0..ab.trajectory.len() {
        // relabelled run
        assert_abs_diff_eq!(ab.output.tracks[0].x[k], ba.output.tracks[1].x[k], epsilon = 1e-8);
        assert_abs_diff_eq!(ab.output.tracks[0].y[k], ba.output.tracks[1].y[k], epsilon = 1e-8);
        assert_abs_diff_eq!(ab.output.tracks[1].x[k], ba.output.tracks[0].x[k], epsilon = 1e-8);
        assert_abs_diff_eq!(ab.output.tracks[1].y[k], ba.output.tracks[0].y[k], epsilon = 1e-8);

        // point symmetry within a run
        assert_abs_diff_eq!(ab.output.tracks[0].x[k], -ab.output.tracks[1].x[k], epsilon = 1e-12);
        assert_abs_diff_eq!(ab.output.tracks[0].y[k], -ab.output.tracks[1].y[k], epsilon = 1e-12);
    }
}

#[test]
fn figure_eight_returns_at_its_period() {
    let result = run_scenario(&figure_eight()).unwrap();
    let (t, distance) = closest_return(&result.trajectory, 5.0).unwrap();

    assert!((t - FIGURE_EIGHT_PERIOD).abs() < 5e-3, "period {t}");
    assert!(distance < 1e-2, "return distance {distance}");

    // and it does not get close anywhere in the middle of the orbit
    let mid: Vec<f64> = result
        .trajectory
        .iter()
        .filter(|(t, _)| *t > 1.0 && *t < 5.0)
        .map(|(_, y)| (y - result.trajectory.initial()).norm())
        .collect();
    assert!(mid.iter().all(|d| *d > 0.1));
}

#[test]
fn li_liao_configuration_returns_at_its_period() {
    let scenario = li_liao();
    assert_eq!(scenario.parameters.samples, 1000);
    assert_eq!(scenario.parameters.rtol, 1e-10);
    assert_eq!(scenario.parameters.atol, 1e-13);

    // zero angular momentum and momentum by construction
    let sys = &scenario.system;
    assert_abs_diff_eq!(orbsim::simulation::diagnostics::angular_momentum(sys), 0.0, epsilon = 1e-15);
    assert_abs_diff_eq!(orbsim::simulation::diagnostics::total_momentum(sys).norm(), 0.0, epsilon = 1e-15);

    let result = run_scenario(&scenario).unwrap();
    assert_eq!(result.trajectory.len(), 1000);
    assert_eq!(*result.trajectory.times.last().unwrap(), 20.0);
    assert!(result.conservation.energy_rel_drift < 1e-6);
    assert!(result.conservation.angular_momentum_drift < 1e-6);
    assert!(result.conservation.com_drift < 1e-9);

    // back near the start after one published period
    let (t, distance) = closest_return(&result.trajectory, 5.0).unwrap();
    assert!((t - LI_LIAO_PERIOD).abs() < 1e-2, "period {t}");
    assert!(distance < 1e-2, "return distance {distance}");
}

#[test]
fn step_limit_is_an_integration_failure() {
    let mut s = figure_eight();
    s.parameters.max_steps = 5;
    match run_scenario(&s) {
        Err(SimError::IntegrationFailed { reason, .. }) => {
            assert_eq!(reason, ConvergenceFailure::StepLimitExceeded { steps: 5 });
        }
        other => panic!("expected integration failure, got {other:?}"),
    }

    let mut s = two_body_circular();
    s.parameters.max_steps = 5;
    assert!(run_scenario(&s).unwrap_err().is_integration_failure());
}

fn underflow_step(s: &Scenario) -> f64 {
    match run_scenario(s) {
        Err(SimError::IntegrationFailed { reason: ConvergenceFailure::StepSizeUnderflow { h }, .. }) => h,
        other => panic!("expected step size underflow, got {other:?}"),
    }
}

#[test]
fn unreachable_tolerance_underflows_the_step() {
    for integrator in [IntegratorConfig::Adams, IntegratorConfig::Rkf78] {
        let mut s = two_body_circular();
        s.integrator = integrator;
        s.parameters.rtol = 1e-300;
        s.parameters.atol = 1e-300;

        let h = underflow_step(&s);
        // the failing step is a real step, not a NaN or zero start
        assert!(h > 0.0 && h < 1e-12, "{integrator:?}: h = {h}");
    }
}

// ==================================================================================
// Post-processing tests
// ==================================================================================

#[test]
fn solar_units_make_one_orbit_a_year() {
    let units = UnitScales::default();
    assert_relative_eq!(units.seconds_per_unit(), 5.0226e6, max_relative = 1e-3);
    assert_relative_eq!(2.0 * std::f64::consts::PI * units.years_per_unit(), 1.0, max_relative = 1e-3);
}

#[test]
fn tracks_follow_the_layout() {
    let result = run_scenario(&two_body_circular()).unwrap();
    let out = &result.output;

    assert_eq!(out.tracks.len(), 2);
    assert_eq!(out.tracks[1].x.len(), 500);
    assert_eq!(out.tracks[1].x[0], 1.0);
    assert_eq!(out.tracks[1].vy[0], 1.0);
    assert_eq!(out.tracks[1].mass, 3.0e-6);
    assert_relative_eq!(
        *out.times_years.last().unwrap(),
        4.0 * std::f64::consts::PI * out.years_per_unit,
        max_relative = 1e-12
    );
    assert_relative_eq!(*out.times_years.last().unwrap(), 2.0, max_relative = 1e-3);
}

#[test]
fn export_writes_every_body() {
    let mut s = two_body_circular();
    s.parameters.samples = 20;
    let result = run_scenario(&s).unwrap();

    let yaml = orbsim::export::trajectory_yaml(&result).unwrap();
    assert!(yaml.contains("scenario: two-body"));
    assert!(yaml.contains("years_per_unit"));
    assert_eq!(yaml.matches("index:").count(), 2);

    let path = std::env::temp_dir().join("orbsim_export_test.yaml");
    orbsim::write_trajectory_yaml(&path, &result).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, yaml);
    let _ = std::fs::remove_file(&path);
}

// ==================================================================================
// Scenario tests
// ==================================================================================

fn load(name: &str) -> Scenario {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name);
    let text = std::fs::read_to_string(path).unwrap();
    Scenario::build_scenario(ScenarioConfig::from_yaml_str(&text).unwrap()).unwrap()
}

#[test]
fn scenario_files_match_presets() {
    for (file, preset) in [
        ("two_body.yaml", two_body_circular()),
        ("three_body_li_liao.yaml", li_liao()),
        ("figure_eight.yaml", figure_eight()),
    ] {
        let loaded = load(file);
        assert_eq!(loaded.name, preset.name);
        assert_eq!(loaded.integrator, preset.integrator);
        assert_eq!(loaded.layout, preset.layout);
        assert_eq!(loaded.parameters.samples, preset.parameters.samples);
        assert_relative_eq!(loaded.parameters.t_end, preset.parameters.t_end, max_relative = 1e-12);

        let y_file = Engine::from_scenario(&loaded).unwrap().initial_state().clone();
        let y_preset = Engine::from_scenario(&preset).unwrap().initial_state().clone();
        assert!((y_file - y_preset).norm() < 1e-12, "{file}");
    }
}

#[test]
fn presets_resolve_by_name() {
    for name in PRESETS {
        assert_eq!(Scenario::preset(name).unwrap().name, name);
    }
    assert!(matches!(Scenario::preset("four-body"), Err(SimError::InvalidConfig(_))));
}

#[test]
fn body_with_three_coordinates_is_rejected() {
    let yaml = r#"
engine:
  integrator: "rk4"
parameters:
  t_end: 1.0
  samples: 2
bodies:
  - x: [0.0, 0.0, 0.0]
    v: [0.0, 0.0]
    m: 1.0
"#;
    let cfg = ScenarioConfig::from_yaml_str(yaml).unwrap();
    assert!(matches!(Scenario::build_scenario(cfg), Err(SimError::InvalidConfig(_))));
}
