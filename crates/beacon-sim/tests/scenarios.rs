use beacon_core::geometry::position_error;
use beacon_sim::{
    generate_sensor_data, run_filter, run_scenario, simulate_agent, ScenarioConfig, SweepParam,
};

#[test]
fn test_convergence_with_sensor_noise() {
    let scenario = ScenarioConfig::convergence();
    let res = run_scenario(&scenario).unwrap();

    let err = res.final_position_error().unwrap();
    assert!(err < 1.0, "final position error {err} >= 1.0");
    assert!(
        res.final_trace() < res.initial_trace,
        "trace {} did not drop below {}",
        res.final_trace(),
        res.initial_trace
    );
    assert!(res.final_trace() < 15.0);
}

#[test]
fn test_convergence_repeats_with_seed() {
    let scenario = ScenarioConfig::convergence();
    let a = run_scenario(&scenario).unwrap();
    let b = run_scenario(&scenario).unwrap();
    assert_eq!(a.estimate, b.estimate);
    assert_eq!(a.final_samples, b.final_samples);
}

#[test]
fn test_joseph_form_converges() {
    let mut scenario = ScenarioConfig::convergence();
    scenario.covariance_update = beacon_sim::CovarianceForm::Joseph;
    let res = run_scenario(&scenario).unwrap();
    assert!(res.final_position_error().unwrap() < 1.0);
}

#[test]
fn test_arena_tracks_slalom() {
    let scenario = ScenarioConfig::arena();
    let sim = simulate_agent(&scenario.agent_params());
    let data = generate_sensor_data(&sim, &scenario.world().landmarks, &scenario.sensor).unwrap();
    let res = run_filter(&sim, &data, &scenario).unwrap();

    assert_eq!(res.len(), 600);
    let err = res.final_position_error().unwrap();
    assert!(err < 2.0, "arena final error {err}");
    assert!(res.rmse() < 2.0, "arena rmse {}", res.rmse());

    // Truth actually weaves, it does not drive straight.
    let start = sim.pose[0];
    let end = *sim.final_pose().unwrap();
    assert!(position_error(&start, &end) < 600.0);
}

#[test]
fn test_measurement_noise_sweep_runs() {
    let spec = SweepParam::MeasurementNoise.spec();
    for value in [spec.min, 1.0, spec.max] {
        let mut scenario = ScenarioConfig::convergence();
        scenario.apply(SweepParam::MeasurementNoise, value).unwrap();
        let res = run_scenario(&scenario).unwrap();
        assert!(res.rmse().is_finite());
        assert!(res.final_covariance.iter().all(|v| v.is_finite()));
    }
}
