// Pacing Benchmark Runner - Monte Carlo comparison of pacing algorithms on the simulated marketplace
// Poisson traffic, seedable PRNG, per-day reports per run
//
// Usage:
//   cargo run --release --bin pacing-bench                                  # All scenarios, all algorithms
//   cargo run --release --bin pacing-bench -- --runs 3                      # Quick mode
//   cargo run --release --bin pacing-bench -- --algorithm mystique-linear   # Single algorithm
//   cargo run --release --bin pacing-bench -- --config market.json traffic  # Custom base config, filter by name

mod monte_carlo;
mod report;
mod scenarios;

use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pacing_engine::marketplace::MarketplaceConfig;
use pacing_engine::PacingAlgorithm;

use report::{AlgorithmReport, BenchReport, Stats};
use scenarios::{scenarios, Scenario};

// ─── CLI Parsing ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "pacing-bench")]
#[command(about = "Compare budget pacing algorithms across seeded marketplace runs")]
struct Args {
    /// Runs per scenario and algorithm
    #[arg(long, default_value_t = 10)]
    runs: usize,

    /// Seed of the first run; run i uses seed + i
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Simulated days per run (defaults to the config's value)
    #[arg(long)]
    days: Option<u64>,

    /// JSON marketplace config used as the base for every scenario
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pacing algorithms to run (repeatable); all of them when omitted
    #[arg(long = "algorithm")]
    algorithms: Vec<PacingAlgorithm>,

    /// Skip the run without any pacing system
    #[arg(long)]
    no_baseline: bool,

    /// Include per-campaign reports in the JSON output
    #[arg(long)]
    per_campaign: bool,

    #[arg(long, default_value = "benchmark-results")]
    out_dir: PathBuf,

    /// Only run scenarios whose name, label or category contains this
    filter: Option<String>,
}

fn selected_scenarios(all: &[Scenario], filter: Option<&str>) -> Vec<usize> {
    match filter {
        Some(f) => {
            let f = f.to_lowercase();
            all.iter()
                .enumerate()
                .filter(|(_, s)| {
                    s.name.to_lowercase().contains(&f)
                        || s.label.to_lowercase().contains(&f)
                        || s.category.to_lowercase().contains(&f)
                })
                .map(|(i, _)| i)
                .collect()
        }
        None => (0..all.len()).collect(),
    }
}

fn print_row(report: &AlgorithmReport) {
    let ci = |s: &Stats| (s.ci_upper - s.ci_lower) / 2.0;
    println!(
        "  {:<30} {:<36} {:>11.2} {:>8.2}% {:>7.1}±{:<5.1} {:>7.4} {:>6.0}ms",
        report.label,
        report.pacing,
        report.spend.mean,
        report.overspend_ratio.mean * 100.0,
        report.mean_budget_utilization.mean * 100.0,
        ci(&report.mean_budget_utilization) * 100.0,
        report.cpm.mean,
        report.elapsed_ms.mean,
    );
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "pacing_engine=warn,pacing_bench=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut base = match &args.config {
        Some(path) => MarketplaceConfig::from_json_file(path)
            .with_context(|| format!("loading marketplace config {}", path.display()))?,
        None => MarketplaceConfig::default(),
    };
    if let Some(days) = args.days {
        base.days = days;
    }

    let algorithms: Vec<Option<PacingAlgorithm>> = {
        let chosen = if args.algorithms.is_empty() { PacingAlgorithm::ALL.to_vec() } else { args.algorithms.clone() };
        let baseline = (!args.no_baseline).then_some(None);
        baseline.into_iter().chain(chosen.into_iter().map(Some)).collect()
    };

    let all_scenarios = scenarios();
    let to_run = selected_scenarios(&all_scenarios, args.filter.as_deref());
    if to_run.is_empty() {
        anyhow::bail!("no scenarios match filter: {:?}", args.filter);
    }

    println!("\n  Pacing Benchmark Runner v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {} | Days: {}",
        args.runs, args.seed, base.days
    );
    println!("  Running {} scenario(s) x {} pacing setup(s)...\n", to_run.len(), algorithms.len());
    println!(
        "  {:<30} {:<36} {:>11} {:>9} {:>13} {:>7} {:>8}",
        "Scenario", "Pacing", "Spend", "Overspd", "Util%", "CPM", "Time"
    );
    println!("  {}", "-".repeat(122));

    let suite_start = Instant::now();
    let mut results = Vec::new();

    for &i in &to_run {
        let scenario = &all_scenarios[i];
        let config = scenario.config(&base);
        config.validate().with_context(|| format!("scenario {} has an invalid config", scenario.name))?;
        for &algorithm in &algorithms {
            let report =
                monte_carlo::run_monte_carlo(scenario, &config, algorithm, args.runs, args.seed, args.per_campaign)?;
            print_row(&report);
            results.push(report);
        }
    }

    println!("  {}", "-".repeat(122));
    println!("  Suite time: {:.1}s\n", suite_start.elapsed().as_secs_f64());

    // ─── Write JSON Report ──────────────────────────────────────────────

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_millis()
        .to_string();

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        n_runs_per_scenario: args.runs,
        days: base.days,
        base_seed: args.seed,
        results,
    };

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let path = args.out_dir.join(format!("pacing-{timestamp}.json"));
    let json = serde_json::to_string_pretty(&report).context("serializing benchmark report")?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "benchmark report written");
    println!("  Results saved to: {}\n", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_name_label_and_category() {
        let all = scenarios();
        assert_eq!(selected_scenarios(&all, None).len(), all.len());
        assert_eq!(selected_scenarios(&all, Some("baseline")), vec![0]);
        assert!(selected_scenarios(&all, Some("budgets")).len() >= 2);
        assert!(selected_scenarios(&all, Some("nothing-like-this")).is_empty());
    }

    #[test]
    fn algorithm_flags_parse_labels() {
        let args = Args::parse_from([
            "pacing-bench",
            "--algorithm",
            "mystique-linear",
            "--algorithm",
            "mystique-hard-throttling-non-linear",
            "--runs",
            "2",
        ]);
        assert_eq!(
            args.algorithms,
            vec![PacingAlgorithm::MystiqueLinear, PacingAlgorithm::MystiqueHardThrottlingNonLinear]
        );
        assert_eq!(args.runs, 2);
        assert!(args.filter.is_none());
    }
}
