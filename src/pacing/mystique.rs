// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Mystique Controller
//
// Discrete-time feedback controller. Each simulated minute it compares the
// campaign's cumulative spend against the target spend curve (spend error)
// and its latest spend rate against the target slope (gradient error), then
// nudges the pacing signal down when ahead of target and up when behind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::params::PacingParams;
use super::target_slope::TargetSpendStrategy;
use super::tracked_campaign::TrackedCampaign;
use super::util::{is_close, mean, sign};
use super::{
    validate_daily_budget, GlobalPacingStatistics, PacedCampaign, PacingError, PacingStatistics,
    PacingSystem,
};
use crate::clock::{Clock, MINUTES_PER_DAY};

/// Error terms of one full correction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSignals {
    pub percent_depleted: f64,
    pub target_slope: f64,
    pub target_spend: f64,
    pub spend_error: f64,
    pub spend_derivative: f64,
    pub gradient_error: f64,
    pub estimated_intervals: f64,
}

/// Which rule produced a new pacing signal.
#[derive(Debug, Clone, PartialEq)]
pub enum PacingDecision {
    /// Last minutes of the day: hold the day's below-threshold average.
    EndOfDayStabilization,
    /// Budget already spent: keep the current signal.
    BudgetExhausted,
    /// Spending far above target slope and already ahead: stop bidding.
    RunawayTrain(ErrorSignals),
    /// Regular weighted correction.
    Corrected(ErrorSignals),
}

impl PacingDecision {
    pub fn error_signals(&self) -> Option<&ErrorSignals> {
        match self {
            Self::RunawayTrain(s) | Self::Corrected(s) => Some(s),
            Self::EndOfDayStabilization | Self::BudgetExhausted => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MystiquePacingSystem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MystiquePacingSystem {
    campaigns: HashMap<String, TrackedCampaign>,
    strategy: TargetSpendStrategy,
    params: PacingParams,
}

impl MystiquePacingSystem {
    pub fn new(strategy: TargetSpendStrategy) -> Self {
        Self::with_params(strategy, PacingParams::default())
    }

    pub fn with_params(strategy: TargetSpendStrategy, params: PacingParams) -> Self {
        Self { campaigns: HashMap::new(), strategy, params }
    }

    pub fn strategy(&self) -> &TargetSpendStrategy {
        &self.strategy
    }

    pub fn params(&self) -> &PacingParams {
        &self.params
    }

    pub fn campaign(&self, campaign_id: &str) -> Option<&TrackedCampaign> {
        self.campaigns.get(campaign_id)
    }

    pub fn campaign_ids(&self) -> impl Iterator<Item = &str> {
        self.campaigns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    /// Decide the signal for the minute `now`, given that this minute's
    /// spend has already been recorded on `campaign`.
    pub fn calculate_new_pacing_signal(
        &self,
        now: &Clock,
        campaign: &TrackedCampaign,
    ) -> (f64, PacingDecision) {
        let p = &self.params;

        if now.minute_in_day() >= p.end_of_day_start() {
            if let Some(avg) = campaign.get_avg_daily_ps_below_threshold() {
                return (avg.min(p.max_ps), PacingDecision::EndOfDayStabilization);
            }
        }

        let today_spend = campaign.get_today_spend();
        let daily_budget = campaign.daily_budget();
        if is_close(today_spend, daily_budget, 0.0) || today_spend > daily_budget {
            return (campaign.ps(), PacingDecision::BudgetExhausted);
        }

        let percent_depleted = today_spend / daily_budget;
        let (target_slope, target_spend) = self.strategy.get_target_slope_and_spend(now, campaign);
        let spend_error = Self::spend_error(percent_depleted, target_spend);
        let spend_derivative =
            Self::spend_derivative(campaign.get_spend_in_last_time_interval(), daily_budget);
        let gradient_error = Self::gradient_error(spend_derivative, target_slope);
        let estimated_intervals = self.estimated_intervals_until_target_hit(spend_error, gradient_error);

        let signals = ErrorSignals {
            percent_depleted,
            target_slope,
            target_spend,
            spend_error,
            spend_derivative,
            gradient_error,
            estimated_intervals,
        };

        if gradient_error > p.runaway_gradient_error
            && estimated_intervals < p.runaway_max_intervals
            && percent_depleted > target_spend.min(1.0)
        {
            return (0.0, PacingDecision::RunawayTrain(signals));
        }

        let (w1, w2) = self.correction_weights(estimated_intervals);
        let new_ps =
            self.new_pacing_signal(campaign.last_positive_ps(), spend_error, gradient_error, w1, w2);
        (new_ps, PacingDecision::Corrected(signals))
    }

    // -- Correction terms ----------------------------------------------------

    pub fn spend_error(percent_depleted: f64, target_spend: f64) -> f64 {
        percent_depleted - target_spend
    }

    /// Latest spend rate in daily budgets per day; 0 when nothing was spent.
    pub fn spend_derivative(last_spend: f64, daily_budget: f64) -> f64 {
        if is_close(last_spend, 0.0, 0.0) {
            return 0.0;
        }
        (last_spend / daily_budget) / (1.0 / MINUTES_PER_DAY as f64)
    }

    pub fn gradient_error(spend_derivative: f64, target_slope: f64) -> f64 {
        spend_derivative - target_slope
    }

    /// Minutes until the spend error closes at the current gradient error.
    /// Negative when the two errors share a sign (the gap is widening).
    pub fn estimated_intervals_until_target_hit(&self, spend_error: f64, gradient_error: f64) -> f64 {
        if is_close(gradient_error, 0.0, self.params.gradient_zero_tolerance) {
            return self.params.max_interval();
        }
        -(MINUTES_PER_DAY as f64) * spend_error / gradient_error
    }

    /// `(w1, w2)`: weights of the spend-error and gradient-error corrections.
    pub fn correction_weights(&self, estimated_intervals: f64) -> (f64, f64) {
        if estimated_intervals < 0.0 {
            return (0.5, 0.5);
        }
        let w1 = self
            .params
            .max_spend_error_weight
            .min(self.params.spend_error_weight_factor * estimated_intervals);
        (w1, 1.0 - w1)
    }

    pub fn new_pacing_signal(
        &self,
        last_positive_ps: f64,
        spend_error: f64,
        gradient_error: f64,
        w1: f64,
        w2: f64,
    ) -> f64 {
        let p = &self.params;
        let spend_correction =
            p.max_ps_correction * (spend_error.abs() / p.spend_error_for_max_correction).min(1.0);
        let gradient_correction = p
            .minimal_gradient_correction
            .max(p.max_ps_correction * gradient_error.abs().min(1.0) / p.gradient_error_for_max_correction);

        let calculated = last_positive_ps
            - w1 * spend_correction * sign(spend_error)
            - w2 * gradient_correction * sign(gradient_error);
        calculated.max(p.minimal_ps_value).min(p.max_ps)
    }
}

impl PacingSystem for MystiquePacingSystem {
    fn add_campaign(&mut self, now: &Clock, campaign: &dyn PacedCampaign) -> Result<(), PacingError> {
        let id = campaign.id();
        if self.campaigns.contains_key(id) {
            return Err(PacingError::DuplicateCampaign(id.to_string()));
        }
        validate_daily_budget(id, campaign.daily_budget())?;

        let mut tracked = TrackedCampaign::new(campaign.daily_budget(), now.days(), &self.params);
        tracked.set_today_start_minute(now.minute_in_day());
        self.strategy.initialize_slope(&mut tracked);
        debug!(
            campaign = id,
            daily_budget = campaign.daily_budget(),
            ps = tracked.ps(),
            day = now.days(),
            "tracking campaign"
        );
        self.campaigns.insert(id.to_string(), tracked);
        Ok(())
    }

    fn end_iteration(&mut self, now: &Clock, campaign_id: &str, spend_since_last_iteration: f64) {
        let Some(campaign) = self.campaigns.get_mut(campaign_id) else {
            trace!(campaign = campaign_id, "spend report for untracked campaign ignored");
            return;
        };
        campaign.update_spend(spend_since_last_iteration);

        // Decide on a shared borrow; the strategy reads the campaign too.
        let (new_ps, decision) = match self.campaigns.get(campaign_id) {
            Some(campaign) => self.calculate_new_pacing_signal(now, campaign),
            None => return,
        };
        match &decision {
            PacingDecision::RunawayTrain(s) => debug!(
                campaign = campaign_id,
                minute = now.minute_in_day(),
                gradient_error = s.gradient_error,
                percent_depleted = s.percent_depleted,
                "runaway spend, pausing campaign"
            ),
            PacingDecision::BudgetExhausted => {
                trace!(campaign = campaign_id, minute = now.minute_in_day(), "budget exhausted, signal frozen")
            }
            _ => {}
        }

        let strategy = &self.strategy;
        let Some(campaign) = self.campaigns.get_mut(campaign_id) else {
            return;
        };
        if let Some(signals) = decision.error_signals() {
            campaign.record_error_signals(Some(signals.clone()));
        }
        campaign.update_pacing_signal(new_ps);

        if now.is_last_minute_of_day() {
            strategy.update_slope(campaign);
            campaign.new_day_init(false);
            debug!(
                campaign = campaign_id,
                day = now.days(),
                seeded_ps = campaign.previous_ps(),
                "campaign day rolled"
            );
        }
    }

    fn get_pacing_signal(&self, campaign_id: &str) -> f64 {
        let ps = self.campaigns.get(campaign_id).map_or(0.0, TrackedCampaign::ps);
        debug_assert!((0.0..=self.params.max_ps).contains(&ps), "pacing signal {ps} out of bounds");
        ps
    }

    fn get_pacing_statistics(&self, campaign_id: &str) -> Result<PacingStatistics, PacingError> {
        self.campaigns
            .get(campaign_id)
            .map(PacingStatistics::from_campaign)
            .ok_or_else(|| PacingError::UnknownCampaign(campaign_id.to_string()))
    }

    fn get_global_pacing_statistics(&self, now: &Clock) -> GlobalPacingStatistics {
        let days = self
            .campaigns
            .values()
            .map(|c| c.day_started() as usize + c.ps_history().len())
            .fold(now.days() as usize, usize::max);

        let mut stats = GlobalPacingStatistics {
            budget_constrained_per_day: vec![0; days],
            not_budget_constrained_per_day: vec![0; days],
        };
        for campaign in self.campaigns.values() {
            for (offset, day_ps) in campaign.ps_history().iter().enumerate() {
                let Some(avg) = mean(day_ps) else { continue };
                let day = campaign.day_started() as usize + offset;
                if avg < self.params.budget_constrained_threshold {
                    stats.budget_constrained_per_day[day] += 1;
                } else {
                    stats.not_budget_constrained_per_day[day] += 1;
                }
            }
        }
        stats
    }

    fn remove_campaign(&mut self, campaign_id: &str) -> bool {
        self.campaigns.remove(campaign_id).is_some()
    }

    fn name(&self) -> String {
        format!("mystique-{}", self.strategy.label().replace('_', "-"))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::CampaignSpec;

    fn system() -> MystiquePacingSystem {
        MystiquePacingSystem::new(TargetSpendStrategy::Linear)
    }

    fn add(system: &mut MystiquePacingSystem, now: &Clock, id: &str, budget: f64) {
        let spec = CampaignSpec::new(id, budget).expect("test: valid budget");
        system.add_campaign(now, &spec).expect("test: fresh id");
    }

    #[test]
    fn spend_derivative_zero_when_nothing_spent() {
        assert_eq!(MystiquePacingSystem::spend_derivative(0.0, 100.0), 0.0);
        // one full budget per minute is 1440 budgets per day
        assert!((MystiquePacingSystem::spend_derivative(100.0, 100.0) - 1440.0).abs() < 1e-9);
    }

    #[test]
    fn estimated_intervals_sentinel_on_zero_gradient() {
        let s = system();
        assert_eq!(s.estimated_intervals_until_target_hit(0.3, 0.0), 1441.0);
        assert_eq!(s.estimated_intervals_until_target_hit(0.3, 5e-10), 1441.0);
        // ahead of target and spending too fast: diverging
        assert!(s.estimated_intervals_until_target_hit(0.1, 2.0) < 0.0);
        // ahead of target but slowing down: converging in 72 minutes
        assert!((s.estimated_intervals_until_target_hit(0.1, -2.0) - 72.0).abs() < 1e-9);
    }

    #[test]
    fn correction_weights() {
        let s = system();
        assert_eq!(s.correction_weights(-3.0), (0.5, 0.5));
        let (w1, w2) = s.correction_weights(2.0);
        assert!((w1 - 0.4).abs() < 1e-12);
        assert!((w2 - 0.6).abs() < 1e-12);
        assert_eq!(s.correction_weights(1441.0), (0.9, 1.0 - 0.9));
    }

    #[test]
    fn new_signal_moves_against_errors() {
        let s = system();
        // behind target, spending too slowly: signal goes up
        let up = s.new_pacing_signal(0.5, -0.1, -1.0, 0.5, 0.5);
        assert!(up > 0.5);
        // ahead of target, spending too fast: signal goes down
        let down = s.new_pacing_signal(0.5, 0.1, 1.0, 0.5, 0.5);
        assert!(down < 0.5);
        // spend error saturates at 0.25, gradient error at 1.0
        let max_up = s.new_pacing_signal(0.5, -10.0, -10.0, 0.5, 0.5);
        let expected = 0.5 + 0.5 * 0.025 + 0.5 * 0.01_f64.max(0.025 / 1.5);
        assert!((max_up - expected).abs() < 1e-12);
    }

    #[test]
    fn new_signal_is_clamped() {
        let s = system();
        assert_eq!(s.new_pacing_signal(1.0, -1.0, -1.0, 0.5, 0.5), 1.0);
        assert_eq!(s.new_pacing_signal(0.0001, 1.0, 1.0, 0.5, 0.5), 0.0001);
    }

    #[test]
    fn zero_errors_still_apply_no_correction() {
        let s = system();
        // sign(0) == 0 so neither term contributes
        assert_eq!(s.new_pacing_signal(0.4, 0.0, 0.0, 0.9, 0.1), 0.4);
    }

    #[test]
    fn on_target_spend_gives_sentinel_interval() {
        let mut s = system();
        let now = Clock::at(1);
        add(&mut s, &Clock::new(), "c", 1440.0);
        let campaign = s.campaigns.get_mut("c").expect("test: tracked");
        campaign.update_spend(1.0);
        let campaign = s.campaign("c").expect("test: tracked");
        let (_, decision) = s.calculate_new_pacing_signal(&now, campaign);
        let signals = decision.error_signals().expect("test: full correction").clone();
        assert!(signals.gradient_error.abs() < 1e-9);
        assert_eq!(signals.estimated_intervals, 1441.0);
    }

    #[test]
    fn runaway_spend_stops_bidding() {
        let mut s = system();
        add(&mut s, &Clock::new(), "c", 100.0);
        s.end_iteration(&Clock::at(10), "c", 50.0);
        assert_eq!(s.get_pacing_signal("c"), 0.0);
        let signals = s.campaign("c").and_then(|c| c.last_error_signals()).expect("test: signals");
        assert!(signals.gradient_error > 12.0);
    }

    #[test]
    fn exhausted_budget_freezes_signal() {
        let mut s = system();
        add(&mut s, &Clock::new(), "c", 100.0);
        s.end_iteration(&Clock::at(0), "c", 0.0);
        let before = s.get_pacing_signal("c");
        s.end_iteration(&Clock::at(1), "c", 100.0);
        assert_eq!(s.get_pacing_signal("c"), before);
        s.end_iteration(&Clock::at(2), "c", 0.0);
        assert_eq!(s.get_pacing_signal("c"), before);
    }

    #[test]
    fn end_of_day_window_uses_daily_average() {
        let mut s = system();
        add(&mut s, &Clock::new(), "c", 1_000_000.0);
        for m in 0..1437 {
            s.end_iteration(&Clock::at(m), "c", 0.0);
        }
        let avg = s
            .campaign("c")
            .and_then(TrackedCampaign::get_avg_daily_ps_below_threshold)
            .expect("test: samples under threshold");
        s.end_iteration(&Clock::at(1437), "c", 0.0);
        assert!((s.get_pacing_signal("c") - avg.min(1.0)).abs() < 1e-12);
    }

    #[test]
    fn unknown_ids() {
        let mut s = system();
        s.end_iteration(&Clock::new(), "ghost", 5.0);
        assert_eq!(s.get_pacing_signal("ghost"), 0.0);
        assert_eq!(
            s.get_pacing_statistics("ghost"),
            Err(PacingError::UnknownCampaign("ghost".into()))
        );
        assert!(!s.remove_campaign("ghost"));
    }

    #[test]
    fn duplicate_campaign_rejected() {
        let mut s = system();
        let now = Clock::new();
        add(&mut s, &now, "c", 100.0);
        let spec = CampaignSpec::new("c", 200.0).expect("test: valid budget");
        assert_eq!(s.add_campaign(&now, &spec), Err(PacingError::DuplicateCampaign("c".into())));
        assert_eq!(s.campaign("c").map(TrackedCampaign::daily_budget), Some(100.0));
    }

    #[test]
    fn name_reflects_strategy() {
        assert_eq!(system().name(), "mystique-linear");
        assert_eq!(
            MystiquePacingSystem::new(TargetSpendStrategy::non_linear()).name(),
            "mystique-non-linear"
        );
    }
}
