// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Pacing Systems

//! Budget pacing: per-minute bid throttling so that each campaign spends its
//! daily budget along a target curve.
//!
//! The bidding layer multiplies every bid by [`PacingSystem::get_pacing_signal`].
//! The driver reports each campaign's spend once per simulated minute through
//! [`PacingSystem::end_iteration`] and then advances its [`Clock`].

pub mod hard_throttling;
pub mod mystique;
pub mod params;
pub mod target_slope;
pub mod tracked_campaign;
pub mod util;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

pub use hard_throttling::MystiqueHardThrottlingPacingSystem;
pub use mystique::{ErrorSignals, MystiquePacingSystem, PacingDecision};
pub use params::{NonLinearParams, PacingParams};
pub use target_slope::{HourlyCurve, TargetSpendStrategy};
pub use tracked_campaign::TrackedCampaign;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PacingError {
    #[error("campaign {0} is already tracked")]
    DuplicateCampaign(String),

    #[error("campaign {id}: daily budget must be positive and finite, got {budget}")]
    InvalidDailyBudget { id: String, budget: f64 },

    #[error("campaign {0} is not tracked")]
    UnknownCampaign(String),

    #[error("unknown pacing algorithm: {0}")]
    UnknownAlgorithm(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// What a pacing system needs to know about a campaign to start tracking it.
pub trait PacedCampaign {
    fn id(&self) -> &str;
    fn daily_budget(&self) -> f64;
}

/// A budget pacing controller driven one simulated minute at a time.
pub trait PacingSystem: Send {
    /// Start tracking `campaign` from the day `now` falls on.
    fn add_campaign(&mut self, now: &Clock, campaign: &dyn PacedCampaign) -> Result<(), PacingError>;

    /// Report the spend of `campaign_id` during the minute `now` and
    /// recompute its signal. Reports for untracked ids are ignored.
    fn end_iteration(&mut self, now: &Clock, campaign_id: &str, spend_since_last_iteration: f64);

    /// Current bid multiplier in `[0, 1]`; 0 for untracked ids.
    fn get_pacing_signal(&self, campaign_id: &str) -> f64;

    fn get_pacing_statistics(&self, campaign_id: &str) -> Result<PacingStatistics, PacingError>;

    fn get_global_pacing_statistics(&self, now: &Clock) -> GlobalPacingStatistics;

    /// Stop tracking a campaign. Returns whether it was tracked.
    fn remove_campaign(&mut self, campaign_id: &str) -> bool;

    /// Short name used in logs and reports.
    fn name(&self) -> String;
}

/// Minimal [`PacedCampaign`] for callers that have no campaign type of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSpec {
    id: String,
    daily_budget: f64,
}

impl CampaignSpec {
    pub fn new(id: impl Into<String>, daily_budget: f64) -> Result<Self, PacingError> {
        let id = id.into();
        validate_daily_budget(&id, daily_budget)?;
        Ok(Self { id, daily_budget })
    }
}

impl PacedCampaign for CampaignSpec {
    fn id(&self) -> &str {
        &self.id
    }

    fn daily_budget(&self) -> f64 {
        self.daily_budget
    }
}

pub(crate) fn validate_daily_budget(id: &str, budget: f64) -> Result<(), PacingError> {
    if budget.is_finite() && budget > 0.0 {
        Ok(())
    } else {
        Err(PacingError::InvalidDailyBudget { id: id.to_string(), budget })
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Completed-day histories of one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingStatistics {
    pub spend_history: Vec<Vec<f64>>,
    pub target_spend_history: Vec<HourlyCurve>,
    pub target_slope_history: Vec<HourlyCurve>,
    pub pacing_signal_history: Vec<Vec<f64>>,
}

impl PacingStatistics {
    pub fn from_campaign(campaign: &TrackedCampaign) -> Self {
        Self {
            spend_history: campaign.spend_history().to_vec(),
            target_spend_history: campaign.target_spend_history().to_vec(),
            target_slope_history: campaign.target_slope_history().to_vec(),
            pacing_signal_history: campaign.ps_history().to_vec(),
        }
    }
}

/// Per global day: how many campaigns ran budget-constrained (mean daily
/// signal under the threshold) and how many did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPacingStatistics {
    pub budget_constrained_per_day: Vec<u32>,
    pub not_budget_constrained_per_day: Vec<u32>,
}

impl GlobalPacingStatistics {
    pub fn days(&self) -> usize {
        self.budget_constrained_per_day.len()
    }
}

// ---------------------------------------------------------------------------
// Algorithm selection
// ---------------------------------------------------------------------------

/// The pacing systems a simulation can be run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacingAlgorithm {
    MystiqueLinear,
    MystiqueNonLinear,
    MystiqueHardThrottlingLinear,
    MystiqueHardThrottlingNonLinear,
}

impl PacingAlgorithm {
    pub const ALL: [PacingAlgorithm; 4] = [
        Self::MystiqueLinear,
        Self::MystiqueNonLinear,
        Self::MystiqueHardThrottlingLinear,
        Self::MystiqueHardThrottlingNonLinear,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::MystiqueLinear => "mystique-linear",
            Self::MystiqueNonLinear => "mystique-non-linear",
            Self::MystiqueHardThrottlingLinear => "mystique-hard-throttling-linear",
            Self::MystiqueHardThrottlingNonLinear => "mystique-hard-throttling-non-linear",
        }
    }

    pub fn build(
        &self,
        params: PacingParams,
        non_linear: NonLinearParams,
    ) -> Box<dyn PacingSystem> {
        let strategy = match self {
            Self::MystiqueLinear | Self::MystiqueHardThrottlingLinear => TargetSpendStrategy::Linear,
            Self::MystiqueNonLinear | Self::MystiqueHardThrottlingNonLinear => {
                TargetSpendStrategy::NonLinear(non_linear)
            }
        };
        match self {
            Self::MystiqueLinear | Self::MystiqueNonLinear => {
                Box::new(MystiquePacingSystem::with_params(strategy, params))
            }
            Self::MystiqueHardThrottlingLinear | Self::MystiqueHardThrottlingNonLinear => {
                Box::new(MystiqueHardThrottlingPacingSystem::with_params(strategy, params))
            }
        }
    }
}

impl fmt::Display for PacingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PacingAlgorithm {
    type Err = PacingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.label() == s)
            .ok_or_else(|| PacingError::UnknownAlgorithm(s.to_string()))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn campaign_spec_rejects_bad_budgets() {
        assert!(CampaignSpec::new("a", 10.0).is_ok());
        for budget in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            match CampaignSpec::new("a", budget) {
                Err(PacingError::InvalidDailyBudget { id, .. }) => assert_eq!(id, "a"),
                other => panic!("budget {budget} accepted: {other:?}"),
            }
        }
    }

    #[test]
    fn algorithm_labels_round_trip() {
        for algorithm in PacingAlgorithm::ALL {
            assert_eq!(algorithm.label().parse::<PacingAlgorithm>(), Ok(algorithm));
        }
        assert_eq!(
            "pid".parse::<PacingAlgorithm>(),
            Err(PacingError::UnknownAlgorithm("pid".into()))
        );
    }

    #[test]
    fn algorithm_serde_matches_label() {
        let json = serde_json::to_string(&PacingAlgorithm::MystiqueHardThrottlingNonLinear)
            .expect("test: serialize");
        assert_eq!(json, "\"mystique-hard-throttling-non-linear\"");
    }

    #[test]
    fn built_systems_start_empty() {
        let clock = Clock::new();
        for algorithm in PacingAlgorithm::ALL {
            let system = algorithm.build(PacingParams::default(), NonLinearParams::default());
            assert_eq!(system.get_pacing_signal("nope"), 0.0);
            assert_eq!(system.get_global_pacing_statistics(&clock).days(), 0);
            assert!(system.name().starts_with("mystique"));
        }
    }
}
