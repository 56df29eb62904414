//! Traffic Lookout Simulator CLI
//!
//! Runs the traffic scenarios over one or more consecutive seeds and exits
//! non-zero when any run fails.

use clap::Parser;
use lookout_sim::scenarios::ScenarioId;
use lookout_sim::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Traffic Lookout Deterministic Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "lookout-sim")]
#[command(about = "Run deterministic traffic scenarios for Traffic Lookout", long_about = None)]
struct Args {
    /// Master seed (0 = derive one from the wall clock)
    #[arg(short, long, default_value = "42")]
    seed: u64,
    
    /// Number of simulated drivers
    #[arg(short, long, default_value = "20")]
    drivers: usize,
    
    /// Scenario name, or "all"
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,
    
    /// How many consecutive seeds to run, starting at --seed
    #[arg(long, default_value = "1")]
    seeds: usize,
    
    /// Simulated duration in seconds
    #[arg(short = 'D', long, default_value = "7200")]
    duration: f64,
    
    /// Virtual seconds per tick
    #[arg(short, long, default_value = "60")]
    tick_secs: u64,
    
    /// Debug-level logging (RUST_LOG takes precedence when set)
    #[arg(short, long)]
    verbose: bool,
    
    /// Print a JSON summary instead of log lines
    #[arg(long)]
    json: bool,
}

/// One run in the JSON summary.
#[derive(Debug, Serialize)]
struct RunRecord<'a> {
    scenario: &'static str,
    seed: u64,
    passed: bool,
    ticks: u64,
    time_secs: f64,
    drivers: usize,
    failure_reason: Option<&'a str>,
    metrics: &'a ScenarioMetrics,
}

impl<'a> From<&'a ScenarioResult> for RunRecord<'a> {
    fn from(result: &'a ScenarioResult) -> Self {
        Self {
            scenario: result.scenario.name(),
            seed: result.seed,
            passed: result.passed,
            ticks: result.total_ticks,
            time_secs: result.final_time_secs,
            drivers: result.final_driver_count,
            failure_reason: result.failure_reason.as_deref(),
            metrics: &result.metrics,
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    total: usize,
    passed: usize,
    failed: usize,
    results: Vec<RunRecord<'a>>,
}

impl<'a> Summary<'a> {
    fn new(results: &'a [ScenarioResult]) -> Self {
        let failed = results.iter().filter(|r| !r.passed).count();
        Self {
            total: results.len(),
            passed: results.len() - failed,
            failed,
            results: results.iter().map(RunRecord::from).collect(),
        }
    }
}

fn select_scenarios(name: &str) -> Result<Vec<ScenarioId>, String> {
    if name.eq_ignore_ascii_case("all") {
        Ok(ScenarioId::all())
    } else {
        name.parse().map(|scenario| vec![scenario])
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    
    if let Err(err) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Failed to set tracing subscriber: {}", err);
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    
    let scenarios = match select_scenarios(&args.scenario) {
        Ok(scenarios) => scenarios,
        Err(e) => {
            eprintln!("Error: {}", e);
            for scenario in ScenarioId::all() {
                eprintln!("  {:<20} {}", scenario.name(), scenario.description());
            }
            std::process::exit(2);
        }
    };
    
    let base_seed = match args.seed {
        0 => std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42),
        seed => seed,
    };
    
    if !args.json {
        info!(
            "Traffic Lookout Simulator v{}: {} scenario(s) x {} seed(s) from {}",
            env!("CARGO_PKG_VERSION"),
            scenarios.len(),
            args.seeds,
            base_seed
        );
    }
    
    let results: Vec<ScenarioResult> = (0..args.seeds as u64)
        .map(|offset| base_seed.wrapping_add(offset))
        .flat_map(|seed| {
            let runner = ScenarioRunner::new(seed, args.drivers)
                .with_tick(Duration::from_secs(args.tick_secs))
                .with_duration(args.duration);
            scenarios.iter().map(move |scenario| runner.run(*scenario)).collect::<Vec<_>>()
        })
        .collect();
    
    let summary = Summary::new(&results);
    
    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(err) => eprintln!("Failed to encode summary: {}", err),
        }
    } else {
        for run in summary.results.iter() {
            if run.passed {
                info!("PASS {} seed={} ({} ticks)", run.scenario, run.seed, run.ticks);
            } else {
                error!("FAIL {} seed={}: {}", run.scenario, run.seed, run.failure_reason.unwrap_or("unknown"));
            }
        }
        info!("{}/{} runs passed", summary.passed, summary.total);
    }
    
    if summary.failed > 0 {
        std::process::exit(1);
    }
}
