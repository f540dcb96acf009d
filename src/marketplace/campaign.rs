// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Campaigns
//
// Advertiser campaigns and their per-day ledgers. Money is exact Decimal; the
// pacing boundary converts to f64 through `crate::adapter`.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::audience::{AudienceConfig, TargetingGroups, UserProperties};
use super::traffic::LogNormal;
use super::SimulationError;
use crate::adapter::{from_decimal, to_decimal, MINIMAL_BID};
use crate::pacing::PacedCampaign;

// ─── Day Ledger ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayLedger {
    pub spend: Decimal,
    pub wins: u32,
    /// Minutes that closed with the campaign still under its daily budget.
    /// The last minute of the day is never counted: a campaign alive at its
    /// end was already counted for the minute before.
    pub minutes_alive: u32,
}

// ─── Campaign ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    id: String,
    total_budget: Decimal,
    daily_budget: Decimal,
    run_period: u32,
    max_bid: Option<f64>,
    bids: LogNormal,
    targeting: TargetingGroups,

    today: DayLedger,
    history: Vec<DayLedger>,
    days_left_to_run: u32,
    day_started: Option<u64>,
    day_ended: Option<u64>,
}

impl Campaign {
    /// A campaign spending `total_budget` evenly over `run_period` days.
    pub fn new(
        id: impl Into<String>,
        total_budget: Decimal,
        run_period: u32,
        bids: LogNormal,
        max_bid: Option<f64>,
    ) -> Result<Self, SimulationError> {
        let id = id.into();
        if run_period == 0 {
            return Err(SimulationError::InvalidCampaign { id, reason: "run period must be at least one day".into() });
        }
        if let Some(max) = max_bid {
            if max.is_nan() || max < from_decimal(MINIMAL_BID) {
                return Err(SimulationError::InvalidCampaign {
                    id,
                    reason: format!("max bid {max} is below the minimal bid {MINIMAL_BID}"),
                });
            }
        }
        let daily_budget = total_budget / Decimal::from(run_period);
        if daily_budget < MINIMAL_BID {
            return Err(SimulationError::InvalidCampaign {
                id,
                reason: format!("daily budget {daily_budget} is below the minimal bid {MINIMAL_BID}"),
            });
        }
        Ok(Self {
            id,
            total_budget,
            daily_budget,
            run_period,
            max_bid,
            bids,
            targeting: TargetingGroups::new(),
            today: DayLedger::default(),
            history: Vec::new(),
            days_left_to_run: run_period,
            day_started: None,
            day_ended: None,
        })
    }

    /// Restrict the campaign to auctions whose user matches `targeting`.
    pub fn with_targeting(mut self, targeting: TargetingGroups) -> Self {
        self.targeting = targeting;
        self
    }

    // -- Bidding -------------------------------------------------------------

    pub fn is_relevant_auction(&self, user: &UserProperties) -> bool {
        self.targeting.matches(user)
    }

    /// Draw a bid, capped at `max_bid`. `None` when the draw is below the
    /// minimal bid.
    pub fn bid(&self, rng: &mut ChaCha8Rng) -> Option<f64> {
        let mut amount = self.bids.sample(rng);
        if let Some(max) = self.max_bid {
            amount = amount.min(max);
        }
        (amount >= from_decimal(MINIMAL_BID)).then_some(amount)
    }

    pub fn pay(&mut self, amount: f64) {
        self.today.spend += to_decimal(amount);
        self.today.wins += 1;
    }

    pub fn is_under_daily_budget(&self) -> bool {
        self.today.spend < self.daily_budget
    }

    pub(crate) fn mark_minute_alive(&mut self) {
        self.today.minutes_alive += 1;
    }

    // -- Lifecycle -----------------------------------------------------------

    pub(crate) fn start(&mut self, day: u64) {
        self.day_started.get_or_insert(day);
    }

    /// Archive today's ledger and count down the run period.
    pub fn prepare_for_new_day(&mut self, day: u64) {
        self.day_started.get_or_insert(day);
        self.days_left_to_run = self.days_left_to_run.saturating_sub(1);
        if self.days_left_to_run == 0 {
            self.day_ended = Some(day);
        }
        self.history.push(std::mem::take(&mut self.today));
    }

    pub fn is_finished(&self) -> bool {
        self.days_left_to_run == 0
    }

    // -- Accessors -----------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn total_budget(&self) -> Decimal {
        self.total_budget
    }

    pub fn daily_budget(&self) -> Decimal {
        self.daily_budget
    }

    pub fn run_period(&self) -> u32 {
        self.run_period
    }

    pub fn max_bid(&self) -> Option<f64> {
        self.max_bid
    }

    pub fn targeting(&self) -> &TargetingGroups {
        &self.targeting
    }

    pub fn days_left_to_run(&self) -> u32 {
        self.days_left_to_run
    }

    pub fn day_started(&self) -> Option<u64> {
        self.day_started
    }

    pub fn day_ended(&self) -> Option<u64> {
        self.day_ended
    }

    pub fn today(&self) -> &DayLedger {
        &self.today
    }

    pub fn spent_today(&self) -> Decimal {
        self.today.spend
    }

    pub fn history(&self) -> &[DayLedger] {
        &self.history
    }

    // -- Derived daily histories --------------------------------------------

    /// Cost per thousand wins per completed day; `None` on days without wins.
    pub fn cpm_daily_history(&self) -> Vec<Option<f64>> {
        self.history
            .iter()
            .map(|d| (d.wins > 0).then(|| 1000.0 * from_decimal(d.spend) / d.wins as f64))
            .collect()
    }

    pub fn budget_utilization_daily_history(&self) -> Vec<f64> {
        self.history.iter().map(|d| from_decimal(d.spend / self.daily_budget)).collect()
    }

    /// Spend above the daily budget per completed day (zero when within budget).
    pub fn overspend_daily_history(&self) -> Vec<Decimal> {
        self.history
            .iter()
            .map(|d| (d.spend - self.daily_budget).max(Decimal::ZERO))
            .collect()
    }
}

impl PacedCampaign for Campaign {
    fn id(&self) -> &str {
        &self.id
    }

    fn daily_budget(&self) -> f64 {
        from_decimal(self.daily_budget)
    }
}

// ─── Generation ─────────────────────────────────────────────────────────────

/// Population parameters for randomly generated campaigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignGenerationConfig {
    pub count: usize,
    pub min_daily_budget: f64,
    pub max_daily_budget: f64,
    pub min_run_period: u32,
    pub max_run_period: u32,
    /// Daily budgets below this bid from `low_budget_bids`.
    pub medium_budget_from: f64,
    /// Daily budgets at or above this bid from `high_budget_bids`.
    pub high_budget_from: f64,
    pub low_budget_bids: LogNormal,
    pub medium_budget_bids: LogNormal,
    pub high_budget_bids: LogNormal,
    /// `max_bid = factor · mean bid`.
    pub max_bid_factor: f64,
    /// Draw random targeting groups over the marketplace audience.
    pub target_audiences: bool,
}

impl Default for CampaignGenerationConfig {
    fn default() -> Self {
        Self {
            count: 50,
            min_daily_budget: 10.0,
            max_daily_budget: 1_000.0,
            min_run_period: 7,
            max_run_period: 7,
            medium_budget_from: 50.0,
            high_budget_from: 300.0,
            low_budget_bids: LogNormal { mu: -4.0, sigma: 0.75 },
            medium_budget_bids: LogNormal { mu: -3.5, sigma: 0.75 },
            high_budget_bids: LogNormal { mu: -3.0, sigma: 0.75 },
            max_bid_factor: 3.0,
            target_audiences: true,
        }
    }
}

impl CampaignGenerationConfig {
    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |msg: String| Err(SimulationError::InvalidConfig(msg));
        if !(self.min_daily_budget > 0.0 && self.min_daily_budget <= self.max_daily_budget) {
            return invalid(format!(
                "daily budget range [{}, {}] is empty or non-positive",
                self.min_daily_budget, self.max_daily_budget
            ));
        }
        if self.min_run_period == 0 || self.min_run_period > self.max_run_period {
            return invalid(format!(
                "run period range [{}, {}] is empty or starts at zero",
                self.min_run_period, self.max_run_period
            ));
        }
        for bids in [&self.low_budget_bids, &self.medium_budget_bids, &self.high_budget_bids] {
            LogNormal::new(bids.mu, bids.sigma)?;
        }
        Ok(())
    }

    pub fn bids_for_budget(&self, daily_budget: f64) -> LogNormal {
        if daily_budget < self.medium_budget_from {
            self.low_budget_bids
        } else if daily_budget < self.high_budget_from {
            self.medium_budget_bids
        } else {
            self.high_budget_bids
        }
    }

    /// Generate `count` campaigns named `campaign_<i>`. Daily budgets are
    /// log-uniform over the configured range; targeting groups are drawn over
    /// `audience` when `target_audiences` is set.
    pub fn generate(&self, audience: &AudienceConfig, rng: &mut ChaCha8Rng) -> Result<Vec<Campaign>, SimulationError> {
        self.validate()?;
        let (lo, hi) = (self.min_daily_budget.ln(), self.max_daily_budget.ln());
        (0..self.count)
            .map(|i| -> Result<Campaign, SimulationError> {
                let daily_budget = if hi > lo { rng.gen_range(lo..hi).exp() } else { self.min_daily_budget };
                let run_period = rng.gen_range(self.min_run_period..=self.max_run_period);
                let bids = self.bids_for_budget(daily_budget);
                let total_budget = to_decimal(daily_budget).round_dp(2) * Decimal::from(run_period);
                let targeting = if self.target_audiences {
                    TargetingGroups::generate(audience, rng)
                } else {
                    TargetingGroups::new()
                };
                let campaign = Campaign::new(
                    format!("campaign_{i}"),
                    total_budget,
                    run_period,
                    bids,
                    Some(bids.mean() * self.max_bid_factor),
                )?;
                Ok(campaign.with_targeting(targeting))
            })
            .collect()
    }
}
