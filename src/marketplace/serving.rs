// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Serving System
//
// Collects bids for each auction, credits winners, and feeds per-minute spend
// to the pacing system. Campaigns whose run period ends are retired at the
// day boundary but stay available for reporting.

use std::collections::HashSet;

use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::auction::{AuctionWinner, Bid, Bidder};
use super::audience::UserProperties;
use super::campaign::Campaign;
use super::traffic::LogNormal;
use super::SimulationError;
use crate::adapter::{from_decimal, to_decimal};
use crate::clock::Clock;
use crate::pacing::{PacingStatistics, PacingSystem};

/// Competing demand that is not paced by this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UntrackedBidsConfig {
    /// Untracked bids per auction = `round(factor · relevant campaigns)`.
    pub factor: f64,
    pub bids: LogNormal,
}

impl Default for UntrackedBidsConfig {
    fn default() -> Self {
        Self { factor: 0.2, bids: LogNormal { mu: -3.5, sigma: 1.0 } }
    }
}

impl UntrackedBidsConfig {
    pub fn count_for(&self, relevant_campaigns: usize) -> u32 {
        (self.factor * relevant_campaigns as f64).round().max(0.0) as u32
    }
}

pub struct ServingSystem {
    pacing: Option<Box<dyn PacingSystem>>,
    active: Vec<Campaign>,
    retired: Vec<Campaign>,
    known_ids: HashSet<String>,
    /// Spend per active slot not yet reported to the pacing system.
    pending_spend: Vec<Decimal>,
    untracked: UntrackedBidsConfig,
}

impl ServingSystem {
    pub fn new(pacing: Option<Box<dyn PacingSystem>>, untracked: UntrackedBidsConfig) -> Self {
        Self {
            pacing,
            active: Vec::new(),
            retired: Vec::new(),
            known_ids: HashSet::new(),
            pending_spend: Vec::new(),
            untracked,
        }
    }

    pub fn add_campaign(&mut self, now: &Clock, mut campaign: Campaign) -> Result<(), SimulationError> {
        if self.known_ids.contains(campaign.id()) {
            return Err(SimulationError::DuplicateCampaign(campaign.id().to_string()));
        }
        if let Some(pacing) = self.pacing.as_mut() {
            pacing.add_campaign(now, &campaign)?;
        }
        campaign.start(now.days());
        self.known_ids.insert(campaign.id().to_string());
        self.active.push(campaign);
        self.pending_spend.push(Decimal::ZERO);
        Ok(())
    }

    // -- Per-auction ---------------------------------------------------------

    /// Fill `bids` with one bid per eligible campaign (scaled by its pacing
    /// signal) followed by the untracked competitors.
    ///
    /// Only campaigns targeting `user` take part. Untracked competition is
    /// sized by how many of them there are, exhausted ones included.
    pub fn collect_bids(&self, rng: &mut ChaCha8Rng, user: &UserProperties, bids: &mut Vec<Bid>) {
        bids.clear();
        let mut relevant = 0;
        for (slot, campaign) in self.active.iter().enumerate() {
            if !campaign.is_relevant_auction(user) {
                continue;
            }
            relevant += 1;
            if !campaign.is_under_daily_budget() {
                continue;
            }
            let Some(mut amount) = campaign.bid(rng) else { continue };
            if let Some(pacing) = self.pacing.as_ref() {
                amount *= pacing.get_pacing_signal(campaign.id());
            }
            if amount > 0.0 {
                bids.push(Bid { bidder: Bidder::Tracked(slot), amount });
            }
        }
        let untracked = self.untracked.count_for(relevant);
        for i in 0..untracked {
            bids.push(Bid { bidder: Bidder::Untracked(i), amount: self.untracked.bids.sample(rng) });
        }
    }

    pub fn credit_winner(&mut self, winner: &AuctionWinner) {
        if let Bidder::Tracked(slot) = winner.bid.bidder {
            if let Some(campaign) = self.active.get_mut(slot) {
                campaign.pay(winner.payment);
                self.pending_spend[slot] += to_decimal(winner.payment);
            }
        }
    }

    // -- Per-minute ----------------------------------------------------------

    /// Close the minute `now`: update minutes alive, report spend to the
    /// pacing system, and run the day-end updates on the last minute.
    pub fn end_iteration(&mut self, now: &Clock) {
        if !now.is_last_minute_of_day() {
            for campaign in self.active.iter_mut().filter(|c| c.is_under_daily_budget()) {
                campaign.mark_minute_alive();
            }
        }

        if let Some(pacing) = self.pacing.as_mut() {
            for (campaign, pending) in self.active.iter().zip(self.pending_spend.iter_mut()) {
                pacing.end_iteration(now, campaign.id(), from_decimal(std::mem::take(pending)));
            }
        } else {
            self.pending_spend.iter_mut().for_each(|p| *p = Decimal::ZERO);
        }

        if now.is_last_minute_of_day() {
            self.end_of_day(now);
        }
    }

    fn end_of_day(&mut self, now: &Clock) {
        let day = now.days();
        for campaign in &mut self.active {
            campaign.prepare_for_new_day(day);
        }
        let (finished, active): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.active).into_iter().partition(Campaign::is_finished);
        for campaign in &finished {
            debug!(campaign = campaign.id(), day, "campaign run period ended");
        }
        self.active = active;
        self.pending_spend = vec![Decimal::ZERO; self.active.len()];
        self.retired.extend(finished);
        info!(day, active = self.active.len(), retired = self.retired.len(), "serving day closed");
    }

    // -- Accessors -----------------------------------------------------------

    pub fn pacing(&self) -> Option<&dyn PacingSystem> {
        self.pacing.as_deref()
    }

    pub fn pacing_name(&self) -> String {
        self.pacing.as_ref().map_or_else(|| "no-pacing".to_string(), |p| p.name())
    }

    pub fn active_campaigns(&self) -> &[Campaign] {
        &self.active
    }

    pub fn retired_campaigns(&self) -> &[Campaign] {
        &self.retired
    }

    pub fn all_campaigns(&self) -> impl Iterator<Item = &Campaign> {
        self.active.iter().chain(self.retired.iter())
    }

    pub fn pacing_statistics(&self, campaign_id: &str) -> Option<PacingStatistics> {
        self.pacing.as_ref().and_then(|p| p.get_pacing_statistics(campaign_id).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::audience::TargetingGroups;
    use crate::pacing::{MystiquePacingSystem, TargetSpendStrategy};
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn campaign(id: &str, total: rust_decimal::Decimal, run_period: u32) -> Campaign {
        Campaign::new(id, total, run_period, LogNormal { mu: -1.0, sigma: 0.0 }, None)
            .expect("test: valid campaign")
    }

    fn paced() -> ServingSystem {
        ServingSystem::new(
            Some(Box::new(MystiquePacingSystem::new(TargetSpendStrategy::Linear))),
            UntrackedBidsConfig { factor: 0.0, ..Default::default() },
        )
    }

    #[test]
    fn duplicate_ids_rejected_even_after_retirement() {
        let mut s = paced();
        let now = Clock::new();
        s.add_campaign(&now, campaign("a", dec!(10), 1)).expect("test: fresh id");
        assert!(matches!(
            s.add_campaign(&now, campaign("a", dec!(10), 1)),
            Err(SimulationError::DuplicateCampaign(_))
        ));
        s.end_iteration(&Clock::at(1439));
        assert_eq!(s.retired_campaigns().len(), 1);
        assert!(s.add_campaign(&now, campaign("a", dec!(10), 1)).is_err());
    }

    #[test]
    fn bids_are_scaled_by_pacing_signal() {
        let mut s = paced();
        s.add_campaign(&Clock::new(), campaign("a", dec!(100), 1)).expect("test: fresh id");
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut bids = Vec::new();
        s.collect_bids(&mut rng, &UserProperties::new(), &mut bids);
        assert_eq!(bids.len(), 1);
        // sigma 0: every draw is e^-1, times the bootstrap signal
        assert!((bids[0].amount - (-1.0_f64).exp() * 0.0001).abs() < 1e-12);
    }

    #[test]
    fn untracked_bids_scale_with_campaigns() {
        let mut s = ServingSystem::new(None, UntrackedBidsConfig { factor: 1.5, ..Default::default() });
        for id in ["a", "b"] {
            s.add_campaign(&Clock::new(), campaign(id, dec!(100), 1)).expect("test: fresh id");
        }
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut bids = Vec::new();
        s.collect_bids(&mut rng, &UserProperties::new(), &mut bids);
        let untracked = bids.iter().filter(|b| matches!(b.bidder, Bidder::Untracked(_))).count();
        assert_eq!(untracked, 3);
        assert_eq!(bids.len(), 5);
    }

    #[test]
    fn exhausted_campaigns_do_not_bid() {
        let mut s = ServingSystem::new(None, UntrackedBidsConfig { factor: 0.0, ..Default::default() });
        s.add_campaign(&Clock::new(), campaign("a", dec!(1), 1)).expect("test: fresh id");
        let winner = AuctionWinner { bid: Bid { bidder: Bidder::Tracked(0), amount: 1.0 }, payment: 1.0 };
        s.credit_winner(&winner);
        let mut bids = Vec::new();
        s.collect_bids(&mut ChaCha8Rng::seed_from_u64(3), &UserProperties::new(), &mut bids);
        assert!(bids.is_empty());
    }

    #[test]
    fn spend_is_reported_once_per_minute() {
        let mut s = paced();
        s.add_campaign(&Clock::new(), campaign("a", dec!(100), 2)).expect("test: fresh id");
        let winner = AuctionWinner { bid: Bid { bidder: Bidder::Tracked(0), amount: 0.5 }, payment: 0.5 };
        s.credit_winner(&winner);
        s.credit_winner(&winner);
        s.end_iteration(&Clock::at(0));
        s.end_iteration(&Clock::at(1));

        let tracked = s.pacing().and_then(|p| p.get_pacing_statistics("a").ok());
        assert!(tracked.is_some());
        let active = &s.active_campaigns()[0];
        assert_eq!(active.today().minutes_alive, 2);
        assert_eq!(active.spent_today(), dec!(1.0));
    }

    #[test]
    fn only_targeted_campaigns_bid() {
        let mut s = ServingSystem::new(None, UntrackedBidsConfig { factor: 0.0, ..Default::default() });
        let now = Clock::new();
        s.add_campaign(&now, campaign("everyone", dec!(100), 1)).expect("test: fresh id");
        let mobile = campaign("mobile", dec!(100), 1).with_targeting(TargetingGroups::new().with("device", [4, 5, 6]));
        s.add_campaign(&now, mobile).expect("test: fresh id");

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut bids = Vec::new();
        let bidders = |bids: &[Bid]| bids.iter().map(|b| b.bidder).collect::<Vec<_>>();

        s.collect_bids(&mut rng, &UserProperties::from([("device".to_string(), 1)]), &mut bids);
        assert_eq!(bidders(&bids), vec![Bidder::Tracked(0)]);

        for v in [4, 5, 6] {
            s.collect_bids(&mut rng, &UserProperties::from([("device".to_string(), v)]), &mut bids);
            assert_eq!(bidders(&bids), vec![Bidder::Tracked(0), Bidder::Tracked(1)]);
        }

        s.collect_bids(&mut rng, &UserProperties::from([("device_other".to_string(), 4)]), &mut bids);
        assert_eq!(bidders(&bids), vec![Bidder::Tracked(0)]);
    }

    #[test]
    fn untracked_bids_count_relevant_campaigns_only() {
        let mut s = ServingSystem::new(None, UntrackedBidsConfig { factor: 2.0, ..Default::default() });
        let now = Clock::new();
        let targeted = |id: &str| campaign(id, dec!(100), 1).with_targeting(TargetingGroups::new().with("device", [1]));
        s.add_campaign(&now, targeted("a")).expect("test: fresh id");
        s.add_campaign(&now, targeted("b")).expect("test: fresh id");
        s.add_campaign(&now, campaign("c", dec!(100), 1)).expect("test: fresh id");

        let untracked = |bids: &[Bid]| bids.iter().filter(|b| matches!(b.bidder, Bidder::Untracked(_))).count();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut bids = Vec::new();

        s.collect_bids(&mut rng, &UserProperties::from([("device".to_string(), 1)]), &mut bids);
        assert_eq!(untracked(&bids), 6);
        s.collect_bids(&mut rng, &UserProperties::from([("device".to_string(), 0)]), &mut bids);
        assert_eq!(untracked(&bids), 2);

        // an exhausted campaign still counts as relevant competition
        let winner = AuctionWinner { bid: Bid { bidder: Bidder::Tracked(2), amount: 100.0 }, payment: 100.0 };
        s.credit_winner(&winner);
        s.collect_bids(&mut rng, &UserProperties::from([("device".to_string(), 0)]), &mut bids);
        assert_eq!(untracked(&bids), 2);
        assert!(!bids.iter().any(|b| b.bidder == Bidder::Tracked(2)));
    }

    #[test]
    fn minutes_alive_skip_exhausting_and_last_minute() {
        let mut s = ServingSystem::new(None, UntrackedBidsConfig { factor: 0.0, ..Default::default() });
        let now = Clock::new();
        s.add_campaign(&now, campaign("steady", dec!(100), 2)).expect("test: fresh id");
        s.add_campaign(&now, campaign("burst", dec!(100), 2)).expect("test: fresh id");

        let mut clock = Clock::new();
        for _ in 0..crate::clock::MINUTES_PER_DAY {
            if clock.minute_in_day() == 10 {
                let winner = AuctionWinner { bid: Bid { bidder: Bidder::Tracked(1), amount: 100.0 }, payment: 100.0 };
                s.credit_winner(&winner);
            }
            s.end_iteration(&clock);
            clock.advance();
        }

        let history = |i: usize| s.active_campaigns()[i].history()[0].minutes_alive;
        assert_eq!(history(0), 1439);
        // minutes 0..=9 closed under budget; minute 10 spent it all
        assert_eq!(history(1), 10);
    }

    #[test]
    fn day_end_retires_finished_campaigns() {
        let mut s = paced();
        let now = Clock::new();
        s.add_campaign(&now, campaign("short", dec!(10), 1)).expect("test: fresh id");
        s.add_campaign(&now, campaign("long", dec!(20), 2)).expect("test: fresh id");
        s.end_iteration(&Clock::at(1439));
        assert_eq!(s.active_campaigns().len(), 1);
        assert_eq!(s.active_campaigns()[0].id(), "long");
        assert_eq!(s.retired_campaigns()[0].day_ended(), Some(0));
        assert_eq!(s.all_campaigns().count(), 2);
        // retired campaigns keep their pacing history
        let stats = s.pacing_statistics("short").expect("test: still tracked by pacing");
        assert_eq!(stats.pacing_signal_history.len(), 1);
    }
}
