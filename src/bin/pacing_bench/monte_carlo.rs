// Monte Carlo Infrastructure - N seeded marketplace runs per scenario and pacing algorithm
// Seeds base..base+N (wrapping) are shared across algorithms, so every algorithm faces the same campaigns.

use std::time::Instant;

use anyhow::Context;
use tracing::debug;

use pacing_engine::adapter::from_decimal;
use pacing_engine::marketplace::{Marketplace, MarketplaceConfig};
use pacing_engine::PacingAlgorithm;

use crate::report::{AlgorithmReport, RunResult};
use crate::scenarios::Scenario;

/// Label used for runs without a pacing system.
pub const NO_PACING: &str = "no-pacing";

pub fn pacing_label(algorithm: Option<PacingAlgorithm>) -> &'static str {
    algorithm.map_or(NO_PACING, |a| a.label())
}

/// Run a single scenario iteration with a specific seed.
pub fn run_single(
    scenario: &Scenario,
    config: &MarketplaceConfig,
    algorithm: Option<PacingAlgorithm>,
    seed: u64,
    per_campaign: bool,
) -> anyhow::Result<RunResult> {
    let start = Instant::now();
    let config = MarketplaceConfig { seed, ..config.clone() };
    let mut market = Marketplace::with_generated_campaigns(&config, config.build_pacing(algorithm))
        .with_context(|| format!("building marketplace for {} (seed {seed})", scenario.name))?;
    market.run_days(config.days);

    let days_detail = market.day_reports();
    let overall = market.overall_report();
    let spend = from_decimal(overall.spend);
    let overspend = from_decimal(overall.overspend);
    let budget_constrained_campaign_days =
        days_detail.iter().filter_map(|d| d.budget_constrained_campaigns).sum();

    debug!(scenario = scenario.name, pacing = pacing_label(algorithm), seed, spend, overspend, "run complete");

    Ok(RunResult {
        scenario: scenario.name.to_string(),
        pacing: pacing_label(algorithm).to_string(),
        seed,
        days: config.days,
        campaigns: market.serving().all_campaigns().count(),
        auctions_run: market.auctions_run(),
        auctions_cleared: market.auctions_cleared(),
        spend,
        overspend,
        overspend_ratio: if spend > 0.0 { overspend / spend } else { 0.0 },
        mean_budget_utilization: overall.mean_budget_utilization.unwrap_or(0.0),
        cpm: overall.cpm.unwrap_or(0.0),
        budget_constrained_campaign_days,
        overall,
        elapsed_ms: start.elapsed().as_millis(),
        days_detail,
        campaigns_detail: if per_campaign { market.campaign_reports() } else { Vec::new() },
    })
}

pub fn run_monte_carlo(
    scenario: &Scenario,
    config: &MarketplaceConfig,
    algorithm: Option<PacingAlgorithm>,
    n_runs: usize,
    base_seed: u64,
    per_campaign: bool,
) -> anyhow::Result<AlgorithmReport> {
    let mut results = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        let seed = base_seed.wrapping_add(i as u64);
        results.push(run_single(scenario, config, algorithm, seed, per_campaign)?);
    }
    Ok(AlgorithmReport::aggregate(
        scenario.name,
        scenario.label,
        scenario.category,
        pacing_label(algorithm),
        results,
    ))
}
