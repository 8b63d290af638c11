// tests/integration_test.rs
use mc_stream::analytics::bs_analytic;
use mc_stream::config::{
    FunctionType, IntegrationParams, MarkovParams, OptionPricingParams, ParameterRecord,
    PiParams, RunConfig, SimulationKind, TargetDistribution,
};
use mc_stream::estimators::Summary;
use mc_stream::mc::{Ensemble, ProgressDetail, SimulationRunner};
use mc_stream::stats::RunningStatistics;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

fn run_config(n: u64, seed: u64) -> RunConfig {
    RunConfig {
        n_simulations: n,
        batch_size: 50_000,
        update_frequency: 50_000,
        seed: Some(seed),
    }
}

fn run_to_end(params: ParameterRecord) -> mc_stream::mc::FinalResults {
    SimulationRunner::with_detail(ProgressDetail::NONE)
        .start(params)
        .expect("Valid parameters")
        .drain_final()
        .into_results()
        .expect("Run completes")
}

#[test]
fn test_running_statistics_partition_invariance() {
    let mut rng = StdRng::seed_from_u64(2024);
    let values: Vec<f64> = (0..10_000).map(|_| rng.gen::<f64>() * 10.0 - 3.0).collect();

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

    let mut one_by_one = RunningStatistics::new();
    for &v in &values {
        one_by_one.update(v);
    }

    // Uneven chunking, merged pairwise
    let mut merged = RunningStatistics::new();
    let mut start = 0;
    while start < values.len() {
        let len = rng.gen_range(1..2_000).min(values.len() - start);
        let mut part = RunningStatistics::new();
        part.update_all(&values[start..start + len]);
        merged = merged.merge(&part);
        start += len;
    }

    println!("\nTwo-pass mean {:.12}, variance {:.12}", mean, var);
    println!("Welford mean  {:.12}, variance {:.12}", one_by_one.estimate(), one_by_one.variance());
    println!("Merged mean   {:.12}, variance {:.12}", merged.estimate(), merged.variance());

    for stats in [&one_by_one, &merged] {
        assert_eq!(stats.count(), 10_000);
        assert!((stats.estimate() - mean).abs() <= 1e-9 * mean.abs().max(1.0));
        assert!((stats.variance() - var).abs() <= 1e-9 * var);
    }
}

#[test]
fn test_pi_interval_coverage() {
    let params = ParameterRecord::Pi(PiParams {
        run: RunConfig {
            n_simulations: 100_000,
            batch_size: 50_000,
            update_frequency: 50_000,
            seed: None,
        },
    });
    // Seeds 42, 43, ...
    let ensemble = Ensemble::run(&params, 42, 1_000).expect("Valid parameters");
    let coverage = ensemble.coverage(PI);
    let pooled = ensemble.pooled_statistics();

    println!("\nπ 95% CI coverage over {} runs: {:.1}%", ensemble.len(), coverage * 100.0);
    println!("Pooled estimate: {:.6} ± {:.6}", pooled.estimate, pooled.std_error);

    assert!(coverage >= 0.93, "Coverage {:.3} below 93%", coverage);
    assert!((pooled.estimate - PI).abs() < 0.005);
}

#[test]
fn test_option_pricing_matches_black_scholes() {
    let option = OptionPricingParams {
        run: run_config(1_000_000, 42),
        ..Default::default()
    };
    let analytic = bs_analytic::bs_call_price(
        option.stock_price,
        option.strike_price,
        option.risk_free_rate,
        option.volatility,
        option.time_to_maturity,
    );
    let results = run_to_end(ParameterRecord::OptionPricing(option));
    let mc_price = results.statistics.estimate;
    let rel_error = (mc_price - analytic).abs() / analytic;

    println!("\nMC Price: {:.6} ± {:.6}", mc_price, results.statistics.std_error);
    println!("Analytic Price: {:.6}", analytic);
    println!("Relative Error: {:.4}%", rel_error * 100.0);

    assert!(rel_error < 0.01, "Relative error {} too high", rel_error);
    match results.summary {
        Summary::OptionPricing(s) => assert!((s.analytical_price - analytic).abs() < 1e-12),
        other => panic!("unexpected summary {:?}", other),
    }
}

#[test]
fn test_integration_converges_for_every_function() {
    let cases = [
        (FunctionType::Gaussian, -2.0, 2.0),
        (FunctionType::Sine, 0.0, PI),
        (FunctionType::Polynomial, -1.0, 2.0),
        (FunctionType::Exponential, -1.0, 3.0),
        (FunctionType::Reciprocal, -1.0, 1.0),
    ];
    for (function_type, lower_bound, upper_bound) in cases {
        let results = run_to_end(ParameterRecord::Integration(IntegrationParams {
            run: run_config(200_000, 7),
            function_type,
            lower_bound,
            upper_bound,
        }));
        let analytic = match results.summary {
            Summary::Integration(s) => s.analytical_result,
            other => panic!("unexpected summary {:?}", other),
        };
        let stats = results.statistics;
        println!(
            "{:?} on [{}, {}]: MC {:.6} ± {:.6}, analytic {:.6}",
            function_type, lower_bound, upper_bound, stats.estimate, stats.std_error, analytic
        );
        assert!(
            (stats.estimate - analytic).abs() < 5.0 * stats.std_error.max(1e-6),
            "{:?} off by more than 5 SE",
            function_type
        );
    }
}

#[test]
fn test_hypothesis_power_tracks_theory() {
    let mut params = ParameterRecord::defaults(SimulationKind::Hypothesis).with_seed(Some(5));
    params.run_mut().n_simulations = 100_000;
    params.run_mut().batch_size = 10_000;
    params.run_mut().update_frequency = 10_000;
    let results = run_to_end(params);
    let theory = match results.summary {
        Summary::Hypothesis(s) => s.theoretical_power,
        other => panic!("unexpected summary {:?}", other),
    };
    println!(
        "\nEmpirical power {:.4} ± {:.4}, theoretical {:.4}",
        results.statistics.estimate, results.statistics.std_error, theory
    );
    assert!((results.statistics.estimate - theory).abs() < 0.01);
}

#[test]
fn test_markov_chain_recovers_target_moments() {
    for target in [TargetDistribution::Normal, TargetDistribution::Gamma] {
        let results = run_to_end(ParameterRecord::Markov(MarkovParams {
            run: run_config(400_000, 11),
            distribution_type: target,
            burn_in: 2_000,
            step_size: 1.0,
            ..Default::default()
        }));
        let summary = match results.summary {
            Summary::Markov(s) => s,
            other => panic!("unexpected summary {:?}", other),
        };
        let mean = results.statistics.estimate;
        let expected = summary.theoretical_mean.expect("Target has a mean");
        println!(
            "{:?}: mean {:.4} (theory {:.4}), acceptance {:.3}, ESS {:.0}",
            target, mean, expected, summary.acceptance_rate, summary.effective_sample_size
        );
        assert_eq!(summary.post_burn_in_samples, 398_000);
        assert!((mean - expected).abs() < 0.1);
        assert!(summary.acceptance_rate > 0.2 && summary.acceptance_rate < 0.95);
    }
}

#[test]
fn test_markov_burn_in_covers_whole_run() {
    let results = run_to_end(ParameterRecord::Markov(MarkovParams {
        run: run_config(1_000, 3),
        burn_in: 1_000,
        ..Default::default()
    }));
    assert_eq!(results.total_iterations, 1_000);
    assert_eq!(results.running.count(), 0);
    assert_eq!(results.statistics.estimate, 0.0);
    assert_eq!(results.statistics.std_error, 0.0);
}

#[test]
fn test_risk_expected_shortfall_exceeds_var() {
    let mut params = ParameterRecord::defaults(SimulationKind::Risk).with_seed(Some(8));
    params.run_mut().n_simulations = 200_000;
    params.run_mut().batch_size = 20_000;
    params.run_mut().update_frequency = 20_000;
    let results = run_to_end(params);
    let summary = match results.summary {
        Summary::Risk(s) => s,
        other => panic!("unexpected summary {:?}", other),
    };
    let analytic = summary.analytical_var.expect("Normal returns have a closed form");
    println!(
        "\nVaR {:.2} (analytic {:.2}), ES {:.2}",
        summary.value_at_risk, analytic, summary.expected_shortfall
    );
    assert!(summary.expected_shortfall > summary.value_at_risk);
    assert!((summary.value_at_risk - analytic).abs() / analytic < 0.05);
    assert!(summary.retained_samples <= 100_000);
}
