// Benchmark Report Types
// Structured output comparing pacing algorithms across seeded marketplace runs

use serde::Serialize;

use pacing_engine::marketplace::{CampaignReport, DayReport, OverallReport};

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let half_width = 1.96 * std_dev / (n as f64).sqrt(); // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - half_width,
            ci_upper: mean + half_width,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub scenario: String,
    pub pacing: String,
    pub seed: u64,
    pub days: u64,
    pub campaigns: usize,
    pub auctions_run: u64,
    pub auctions_cleared: u64,
    pub overall: OverallReport,
    pub spend: f64,
    pub overspend: f64,
    /// Overspend as a fraction of spend.
    pub overspend_ratio: f64,
    pub mean_budget_utilization: f64,
    pub cpm: f64,
    pub budget_constrained_campaign_days: u32,
    pub elapsed_ms: u128,
    pub days_detail: Vec<DayReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub campaigns_detail: Vec<CampaignReport>,
}

// ─── Monte Carlo Report (per scenario × pacing aggregation) ─────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AlgorithmReport {
    pub scenario_name: String,
    pub label: String,
    pub category: String,
    pub pacing: String,
    pub n_runs: usize,
    pub spend: Stats,
    pub overspend: Stats,
    pub overspend_ratio: Stats,
    pub mean_budget_utilization: Stats,
    pub cpm: Stats,
    pub budget_constrained_campaign_days: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<RunResult>,
}

impl AlgorithmReport {
    pub fn aggregate(
        scenario_name: &str,
        label: &str,
        category: &str,
        pacing: &str,
        runs: Vec<RunResult>,
    ) -> Self {
        let metric = |f: fn(&RunResult) -> f64| Stats::from_samples(&runs.iter().map(f).collect::<Vec<_>>());
        Self {
            scenario_name: scenario_name.to_string(),
            label: label.to_string(),
            category: category.to_string(),
            pacing: pacing.to_string(),
            n_runs: runs.len(),
            spend: metric(|r| r.spend),
            overspend: metric(|r| r.overspend),
            overspend_ratio: metric(|r| r.overspend_ratio),
            mean_budget_utilization: metric(|r| r.mean_budget_utilization),
            cpm: metric(|r| r.cpm),
            budget_constrained_campaign_days: metric(|r| f64::from(r.budget_constrained_campaign_days)),
            elapsed_ms: metric(|r| r.elapsed_ms as f64),
            individual_runs: runs,
        }
    }
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub n_runs_per_scenario: usize,
    pub days: u64,
    pub base_seed: u64,
    pub results: Vec<AlgorithmReport>,
}
