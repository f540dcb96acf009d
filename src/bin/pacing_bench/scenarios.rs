// Scenario Definitions - marketplace variants every pacing algorithm is run against
// Each scenario only edits the base configuration; the engine is untouched.

use pacing_engine::marketplace::{AudienceConfig, LogNormal, MarketplaceConfig};

// ─── Scenario Configuration ─────────────────────────────────────────────────

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub category: &'static str,
    pub configure: fn(&mut MarketplaceConfig),
}

impl Scenario {
    /// The base configuration with this scenario's edits applied.
    pub fn config(&self, base: &MarketplaceConfig) -> MarketplaceConfig {
        let mut config = base.clone();
        (self.configure)(&mut config);
        config
    }
}

// ─── Edits ──────────────────────────────────────────────────────────────────

fn baseline(_: &mut MarketplaceConfig) {}

fn scarce_traffic(c: &mut MarketplaceConfig) {
    c.traffic.dc /= 4.0;
}

fn flat_traffic(c: &mut MarketplaceConfig) {
    c.traffic.amplitude = 0.0;
}

fn sharp_peak(c: &mut MarketplaceConfig) {
    c.traffic.amplitude = 1.0;
}

fn heavy_competition(c: &mut MarketplaceConfig) {
    c.untracked_bids.factor = 1.0;
    c.untracked_bids.bids = LogNormal { mu: -3.0, sigma: 1.0 };
}

fn high_budgets(c: &mut MarketplaceConfig) {
    // above the controller's high-budget threshold: campaigns start fully open
    c.campaigns.min_daily_budget = 12_000.0;
    c.campaigns.max_daily_budget = 40_000.0;
    c.campaigns.count = 10;
    c.traffic.dc *= 10.0;
}

fn targeted_audiences(c: &mut MarketplaceConfig) {
    c.audience = AudienceConfig {
        properties: [
            ("age_group".to_string(), vec![0.15, 0.3, 0.3, 0.25]),
            ("device".to_string(), vec![0.6, 0.3, 0.1]),
            ("region".to_string(), vec![0.4, 0.35, 0.25]),
        ]
        .into_iter()
        .collect(),
    };
    c.campaigns.target_audiences = true;
}

fn staggered_run_periods(c: &mut MarketplaceConfig) {
    c.campaigns.min_run_period = 1;
    c.campaigns.max_run_period = c.days.max(1) as u32;
}

// ─── Registry ───────────────────────────────────────────────────────────────

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario { name: "BASELINE", label: "Baseline marketplace", category: "traffic", configure: baseline },
        Scenario { name: "SCARCE_TRAFFIC", label: "Scarce traffic (dc / 4)", category: "traffic", configure: scarce_traffic },
        Scenario { name: "FLAT_TRAFFIC", label: "Flat traffic", category: "traffic", configure: flat_traffic },
        Scenario { name: "SHARP_PEAK", label: "Full-amplitude daily peak", category: "traffic", configure: sharp_peak },
        Scenario { name: "HEAVY_COMPETITION", label: "Heavy untracked competition", category: "competition", configure: heavy_competition },
        Scenario { name: "HIGH_BUDGETS", label: "High budgets (open start)", category: "budgets", configure: high_budgets },
        Scenario { name: "TARGETED_AUDIENCES", label: "Audience-targeted campaigns", category: "competition", configure: targeted_audiences },
        Scenario { name: "STAGGERED_RUNS", label: "Staggered run periods", category: "budgets", configure: staggered_run_periods },
    ]
}
