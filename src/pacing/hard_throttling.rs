// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Hard Throttling

//! All-or-nothing variant of the Mystique controller.
//!
//! Some bidders cannot scale a bid, only place it or skip it. This system runs
//! the continuous controller unchanged and turns its signal into a `{0, 1}`
//! gate by first-order error diffusion: every minute the continuous signal is
//! added to a per-campaign credit, and the gate opens (spending one unit of
//! credit) whenever a full unit is available. Over any window the number of
//! open minutes trails the summed continuous signal by less than one.

use std::collections::HashMap;

use tracing::trace;

use super::mystique::MystiquePacingSystem;
use super::params::PacingParams;
use super::target_slope::TargetSpendStrategy;
use super::util::is_close;
use super::{GlobalPacingStatistics, PacedCampaign, PacingError, PacingStatistics, PacingSystem};
use crate::clock::Clock;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Gate {
    credit: f64,
    open: bool,
}

impl Gate {
    fn step(&mut self, ps: f64) {
        self.credit += ps;
        self.open = self.credit >= 1.0;
        if self.open {
            self.credit -= 1.0;
        }
    }
}

#[derive(Debug, Clone)]
pub struct MystiqueHardThrottlingPacingSystem {
    inner: MystiquePacingSystem,
    gates: HashMap<String, Gate>,
}

impl MystiqueHardThrottlingPacingSystem {
    pub fn new(strategy: TargetSpendStrategy) -> Self {
        Self::with_params(strategy, PacingParams::default())
    }

    pub fn with_params(strategy: TargetSpendStrategy, params: PacingParams) -> Self {
        Self { inner: MystiquePacingSystem::with_params(strategy, params), gates: HashMap::new() }
    }

    /// The controller whose signal is being gated.
    pub fn continuous(&self) -> &MystiquePacingSystem {
        &self.inner
    }

    pub fn continuous_signal(&self, campaign_id: &str) -> f64 {
        self.inner.get_pacing_signal(campaign_id)
    }
}

impl PacingSystem for MystiqueHardThrottlingPacingSystem {
    fn add_campaign(&mut self, now: &Clock, campaign: &dyn PacedCampaign) -> Result<(), PacingError> {
        self.inner.add_campaign(now, campaign)?;
        let ps = self.inner.get_pacing_signal(campaign.id());
        let gate = Gate { credit: 0.0, open: is_close(ps, self.inner.params().max_ps, 0.0) };
        self.gates.insert(campaign.id().to_string(), gate);
        Ok(())
    }

    fn end_iteration(&mut self, now: &Clock, campaign_id: &str, spend_since_last_iteration: f64) {
        self.inner.end_iteration(now, campaign_id, spend_since_last_iteration);
        let ps = self.inner.get_pacing_signal(campaign_id);
        if let Some(gate) = self.gates.get_mut(campaign_id) {
            gate.step(ps);
            trace!(campaign = campaign_id, ps, open = gate.open, credit = gate.credit, "gate stepped");
        }
    }

    fn get_pacing_signal(&self, campaign_id: &str) -> f64 {
        match self.gates.get(campaign_id) {
            Some(gate) if gate.open => 1.0,
            _ => 0.0,
        }
    }

    fn get_pacing_statistics(&self, campaign_id: &str) -> Result<PacingStatistics, PacingError> {
        self.inner.get_pacing_statistics(campaign_id)
    }

    fn get_global_pacing_statistics(&self, now: &Clock) -> GlobalPacingStatistics {
        self.inner.get_global_pacing_statistics(now)
    }

    fn remove_campaign(&mut self, campaign_id: &str) -> bool {
        self.gates.remove(campaign_id);
        self.inner.remove_campaign(campaign_id)
    }

    fn name(&self) -> String {
        format!("mystique-hard-throttling-{}", self.inner.strategy().label().replace('_', "-"))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
