// tests/runner_test.rs
use mc_stream::config::{IntegrationParams, ParameterRecord, PiParams, RunConfig, SimulationKind};
use mc_stream::mc::{RunOutcome, RunState, SimulationEvent, SimulationRunner};
use mc_stream::output::RunRecord;
use mc_stream::McError;
use serde_json::json;

fn pi(n: u64, batch: u64, seed: u64) -> ParameterRecord {
    ParameterRecord::Pi(PiParams {
        run: RunConfig {
            n_simulations: n,
            batch_size: batch,
            update_frequency: batch,
            seed: Some(seed),
        },
    })
}

#[test]
fn test_invalid_bounds_leave_runner_idle() {
    let runner = SimulationRunner::new();
    let params = ParameterRecord::Integration(IntegrationParams {
        lower_bound: 1.0,
        upper_bound: 1.0,
        ..Default::default()
    });
    let error = runner.start(params).err().expect("Equal bounds rejected");
    println!("\nRejected: {}", error);
    assert!(error.is_validation());
    assert_eq!(error.field(), Some("upper_bound"));
    assert_eq!(runner.status().state, RunState::Idle);
    assert_eq!(runner.status().simulation_type, None);
}

#[test]
fn test_cancel_immediately_after_start() {
    let runner = SimulationRunner::new();
    let mut events = runner.start(pi(1_000_000, 1_000, 1)).expect("Valid parameters");

    let first = events.next().expect("started event");
    assert_eq!(first.name(), "started");
    assert!(runner.cancel());

    let rest: Vec<_> = events.collect();
    assert_eq!(rest, vec![SimulationEvent::Stopped { iteration: 0 }]);
    assert_eq!(runner.status().state, RunState::Cancelled);
    assert_eq!(runner.status().iteration, 0);
}

#[test]
fn test_same_seed_replays_every_estimator() {
    for kind in SimulationKind::ALL {
        let mut params = ParameterRecord::defaults(kind).with_seed(Some(42));
        params.run_mut().n_simulations = 20_000;
        params.run_mut().batch_size = 2_500;
        params.run_mut().update_frequency = 5_000;

        let run = |params: ParameterRecord| {
            SimulationRunner::new()
                .start(params)
                .expect("Valid parameters")
                .drain_final()
                .into_results()
                .expect("Run completes")
        };
        let a = run(params.clone());
        let b = run(params);

        println!(
            "{}: {:.6} ± {:.6} over {} points",
            kind,
            a.statistics.estimate,
            a.statistics.std_error,
            a.convergence_history.len()
        );
        assert_eq!(a.convergence_history.len(), 4);
        assert_eq!(a.convergence_history, b.convergence_history, "{} diverged", kind);
        assert_eq!(a.statistics, b.statistics);
        assert_eq!(a.visualization, b.visualization);
    }
}

#[test]
fn test_cancel_from_another_thread() {
    let runner = SimulationRunner::new();
    let handle = runner.handle();
    let (events, worker) = runner
        .spawn(pi(10_000_000, 1_000, 3))
        .expect("Valid parameters");

    let mut names = Vec::new();
    let mut last = None;
    for event in events {
        names.push(event.name());
        if names.len() == 2 {
            assert!(handle.cancel());
        }
        last = Some(event);
    }

    let stopped_at = match last {
        Some(SimulationEvent::Stopped { iteration }) => iteration,
        other => panic!("expected stopped event, got {:?}", other),
    };
    println!("\nCancelled after {} events at iteration {}", names.len(), stopped_at);
    assert_eq!(names[0], "started");
    assert!(names[1..names.len() - 1].iter().all(|n| *n == "progress"));
    assert!(stopped_at >= 1_000 && stopped_at < 10_000_000);
    assert_eq!(stopped_at % 1_000, 0);

    let outcome = worker.join().expect("worker finishes");
    assert_eq!(outcome, RunOutcome::Cancelled { iteration: stopped_at });
    assert_eq!(runner.status().state, RunState::Cancelled);
}

#[test]
fn test_second_start_while_running_rejected() {
    let runner = SimulationRunner::new();
    let mut first = runner.start(pi(10_000, 1_000, 1)).expect("Valid parameters");
    first.next();

    match runner.start(pi(10_000, 1_000, 2)) {
        Err(McError::AlreadyRunning) => {}
        other => panic!("expected AlreadyRunning, got {:?}", other.map(|_| ())),
    }
    let outcome = first.drain_final();
    assert_eq!(outcome.state(), RunState::Completed);
    assert_eq!(runner.status().iteration, 10_000);
}

#[test]
fn test_json_intake() {
    let params = ParameterRecord::from_json(
        "option-pricing",
        &json!({ "n_simulations": 5_000, "option_type": "put", "seed": 9 }),
    )
    .expect("Valid JSON parameters");
    assert_eq!(params.kind(), SimulationKind::OptionPricing);
    assert_eq!(params.run().n_simulations, 5_000);
    assert_eq!(params.run().seed, Some(9));

    let unknown = ParameterRecord::from_json("lottery", &json!({}));
    assert!(matches!(unknown, Err(McError::InvalidConfiguration { .. })));

    let negative_seed = ParameterRecord::from_json("pi", &json!({ "seed": -1 }));
    assert!(matches!(negative_seed, Err(McError::InvalidConfiguration { .. })));

    let too_many = ParameterRecord::from_json("pi", &json!({ "n_simulations": 20_000_000 }));
    match too_many {
        Err(e) => assert_eq!(e.field(), Some("n_simulations")),
        Ok(_) => panic!("n_simulations above the limit accepted"),
    }
}

#[test]
fn test_record_export() {
    let params = ParameterRecord::defaults(SimulationKind::Risk).with_seed(Some(21));
    let results = SimulationRunner::new()
        .start(params.clone())
        .expect("Valid parameters")
        .drain_final()
        .into_results()
        .expect("Run completes");
    let record = RunRecord::new(params, &results);

    let json = record.to_json().expect("record serializes");
    let parsed = RunRecord::from_json(&json).expect("record parses");
    assert_eq!(parsed.simulation_type, SimulationKind::Risk);
    assert_eq!(parsed.total_iterations, 10_000);
    assert_eq!(parsed.convergence_history.len(), 10);
    assert_eq!(parsed.parameters, record.parameters);
    assert!((parsed.statistics.estimate - record.statistics.estimate).abs() < 1e-6);

    let dir = std::env::temp_dir();
    let json_path = dir.join(format!("mc_stream_export_{}.json", std::process::id()));
    let csv_path = json_path.with_extension("csv");
    record.write_json(&json_path).expect("json written");
    record.write_convergence_csv(&csv_path).expect("csv written");

    let csv = std::fs::read_to_string(&csv_path).expect("csv readable");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "iteration,estimate,std_error");
    assert_eq!(lines.len(), 11);
    assert!(lines[1].starts_with("1000,"));
    assert!(lines[10].starts_with("10000,"));

    let reread = std::fs::read_to_string(&json_path).expect("json readable");
    let reread = RunRecord::from_json(&reread).expect("parses");
    assert_eq!(reread.created_at, record.created_at);
    assert_eq!(reread.total_iterations, record.total_iterations);

    let _ = std::fs::remove_file(json_path);
    let _ = std::fs::remove_file(csv_path);
}
