// scripts/benchmark.rs
use mc_stream::config::{ParameterRecord, SimulationKind};
use mc_stream::estimators::Summary;
use mc_stream::math_utils::Timer;
use mc_stream::mc::{Ensemble, ProgressDetail, RunOutcome, SimulationRunner};
use std::env;
use std::f64::consts::PI;
use std::fs::File;
use std::io::{self, Write};
use std::process::Command;

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_model: String,
    cpu_cores: usize,
    rust_version: String,
    rustc_flags: String,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_model: Self::get_cpu_model(),
            cpu_cores: num_cpus::get(),
            rust_version: Self::get_rust_version(),
            rustc_flags: env::var("RUSTFLAGS").unwrap_or_else(|_| "default".to_string()),
            rayon_threads: rayon::current_num_threads(),
        }
    }

    fn get_cpu_model() -> String {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/cpuinfo")
                .ok()
                .and_then(|content| {
                    content
                        .lines()
                        .find(|line| line.starts_with("model name"))
                        .and_then(|line| line.split(':').nth(1))
                        .map(|s| s.trim().to_string())
                })
                .unwrap_or_else(|| "Unknown CPU".to_string())
        }

        #[cfg(target_os = "macos")]
        {
            Command::new("sysctl")
                .args(["-n", "machdep.cpu.brand_string"])
                .output()
                .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
                .unwrap_or_else(|_| "Unknown CPU".to_string())
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            "Unknown CPU".to_string()
        }
    }

    fn get_rust_version() -> String {
        Command::new("rustc")
            .arg("--version")
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
            .unwrap_or_else(|_| "Unknown Rust version".to_string())
    }
}

#[derive(Debug)]
struct BenchmarkResult {
    name: String,
    samples: u64,
    time_ms: f64,
    throughput_samples_per_sec: f64,
    value: f64,
    reference_value: Option<f64>,
    relative_error: Option<f64>,
}

/// Reference value carried by each variant's summary, where one exists
fn reference_of(summary: &Summary) -> Option<f64> {
    match summary {
        Summary::Pi(s) => Some(s.true_value),
        Summary::Integration(s) => Some(s.analytical_result),
        Summary::OptionPricing(s) => Some(s.analytical_price),
        Summary::Hypothesis(s) => Some(s.theoretical_power),
        Summary::Risk(s) => s.analytical_var,
        Summary::Markov(s) => s.theoretical_mean,
    }
}

fn run_estimator_benchmarks() -> Vec<BenchmarkResult> {
    let mut results = Vec::new();
    let sample_counts = [100_000, 1_000_000];

    for &n in &sample_counts {
        println!("Running estimator benchmarks with {} samples...", n);
        for kind in SimulationKind::ALL {
            let mut params = ParameterRecord::defaults(kind).with_seed(Some(42));
            params.run_mut().n_simulations = n;
            params.run_mut().batch_size = 50_000;
            params.run_mut().update_frequency = 50_000;

            let runner = SimulationRunner::with_detail(ProgressDetail::NONE);
            let mut timer = Timer::new();
            timer.start();
            let outcome = match runner.start(params) {
                Ok(events) => events.drain_final(),
                Err(e) => {
                    eprintln!("  {} rejected: {}", kind, e);
                    continue;
                }
            };
            let time_ms = timer.elapsed_ms();

            let results_of_run = match outcome {
                RunOutcome::Completed(r) => r,
                other => {
                    eprintln!("  {} did not complete: {:?}", kind, other.state());
                    continue;
                }
            };
            let value = results_of_run.statistics.estimate;
            let reference_value = reference_of(&results_of_run.summary);
            results.push(BenchmarkResult {
                name: format!("{} ({}k samples)", kind, n / 1000),
                samples: n,
                time_ms,
                throughput_samples_per_sec: n as f64 / (time_ms / 1000.0),
                value,
                reference_value,
                relative_error: reference_value
                    .filter(|r| *r != 0.0)
                    .map(|r| (value - r).abs() / r.abs()),
            });
        }
    }

    results
}

fn run_ensemble_benchmark() -> Vec<BenchmarkResult> {
    let replications = 100;
    let n = 100_000;
    println!(
        "Running π ensemble: {} replications x {} samples on {} threads...",
        replications,
        n,
        rayon::current_num_threads()
    );

    let mut params = ParameterRecord::defaults(SimulationKind::Pi);
    params.run_mut().n_simulations = n;
    params.run_mut().batch_size = 50_000;
    params.run_mut().update_frequency = 50_000;

    let mut timer = Timer::new();
    timer.start();
    let ensemble = match Ensemble::run(&params, 42, replications) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("  ensemble failed: {}", e);
            return Vec::new();
        }
    };
    let time_ms = timer.elapsed_ms();
    let total = n * replications as u64;
    let pooled = ensemble.pooled_statistics();
    println!("  95% CI coverage of π: {:.1}%", ensemble.coverage(PI) * 100.0);

    vec![BenchmarkResult {
        name: format!("pi ensemble ({} runs)", replications),
        samples: total,
        time_ms,
        throughput_samples_per_sec: total as f64 / (time_ms / 1000.0),
        value: pooled.estimate,
        reference_value: Some(PI),
        relative_error: Some((pooled.estimate - PI).abs() / PI),
    }]
}

fn write_results_to_csv(
    results: &[BenchmarkResult],
    system_info: &SystemInfo,
    filename: &str,
) -> io::Result<()> {
    let mut file = File::create(filename)?;

    // System information as comments
    writeln!(file, "# System Information")?;
    writeln!(file, "# OS: {}", system_info.os)?;
    writeln!(file, "# CPU: {}", system_info.cpu_model)?;
    writeln!(file, "# CPU Cores: {}", system_info.cpu_cores)?;
    writeln!(file, "# Rust Version: {}", system_info.rust_version)?;
    writeln!(file, "# RUSTFLAGS: {}", system_info.rustc_flags)?;
    writeln!(file, "# Rayon Threads: {}", system_info.rayon_threads)?;
    writeln!(
        file,
        "# Benchmark Date: {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    writeln!(file, "#")?;

    writeln!(
        file,
        "Benchmark,Samples,Time_ms,Throughput_samples_per_sec,Value,Reference_Value,Relative_Error"
    )?;
    for result in results {
        writeln!(
            file,
            "{},{},{:.2},{:.0},{:.6},{},{}",
            result.name,
            result.samples,
            result.time_ms,
            result.throughput_samples_per_sec,
            result.value,
            result
                .reference_value
                .map(|v| format!("{:.6}", v))
                .unwrap_or_else(|| "N/A".to_string()),
            result
                .relative_error
                .map(|e| format!("{:.6}", e))
                .unwrap_or_else(|| "N/A".to_string())
        )?;
    }
    Ok(())
}

fn main() {
    println!("mc-stream Benchmark Suite");
    println!("=========================\n");

    let system_info = SystemInfo::gather();
    println!("System Information:");
    println!("  OS: {}", system_info.os);
    println!("  CPU: {}", system_info.cpu_model);
    println!("  CPU Cores: {}", system_info.cpu_cores);
    println!("  Rust Version: {}", system_info.rust_version);
    println!("  RUSTFLAGS: {}", system_info.rustc_flags);
    println!("  Rayon Threads: {}", system_info.rayon_threads);
    println!();

    let mut all_results = run_estimator_benchmarks();
    println!();
    all_results.extend(run_ensemble_benchmark());

    println!("\n{:=<96}", "");
    println!("BENCHMARK RESULTS");
    println!("{:=<96}", "");
    println!(
        "{:<32} {:>10} {:>12} {:>15} {:>10} {:>10} {:>12}",
        "Benchmark", "Samples", "Time (ms)", "Throughput", "Value", "Reference", "Rel Error"
    );
    println!("{:-<96}", "");
    for result in &all_results {
        println!(
            "{:<32} {:>10} {:>12.2} {:>15.0} {:>10.4} {:>10} {:>12}",
            result.name,
            result.samples,
            result.time_ms,
            result.throughput_samples_per_sec,
            result.value,
            result
                .reference_value
                .map(|v| format!("{:.4}", v))
                .unwrap_or_else(|| "N/A".to_string()),
            result
                .relative_error
                .map(|e| format!("{:.2}%", e * 100.0))
                .unwrap_or_else(|| "N/A".to_string())
        );
    }
    println!("{:=<96}", "");

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("benchmark_results_{}.csv", timestamp);
    match write_results_to_csv(&all_results, &system_info, &filename) {
        Ok(()) => println!("\nResults saved to: {}", filename),
        Err(e) => eprintln!("\nCould not write {}: {}", filename, e),
    }
    println!("Run with: cargo run --bin benchmark --release");
}
