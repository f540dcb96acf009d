// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine

pub mod adapter;
pub mod clock;
pub mod pacing;

// The marketplace harness samples with ChaCha8Rng, which is a native-only
// dependency.
#[cfg(not(target_arch = "wasm32"))]
pub mod marketplace;

pub use clock::Clock;
pub use pacing::{
    CampaignSpec, GlobalPacingStatistics, MystiqueHardThrottlingPacingSystem, MystiquePacingSystem,
    PacedCampaign, PacingAlgorithm, PacingError, PacingParams, PacingStatistics, PacingSystem,
    TargetSpendStrategy,
};

use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────

/// Browser-facing wrapper: one clock plus one pacing system.
///
/// The host reports spend for each campaign, calls `advance` once per
/// simulated minute, and reads signals back.
#[wasm_bindgen]
pub struct PacingSimulation {
    algorithm: PacingAlgorithm,
    clock: Clock,
    system: Box<dyn PacingSystem>,
}

#[wasm_bindgen]
impl PacingSimulation {
    /// `algorithm` is one of the [`PacingAlgorithm`] labels, e.g.
    /// `"mystique-linear"`.
    #[wasm_bindgen(constructor)]
    pub fn new(algorithm: &str) -> Result<PacingSimulation, JsError> {
        #[cfg(target_arch = "wasm32")]
        std::panic::set_hook(Box::new(console_error_panic_hook::hook));

        let algorithm: PacingAlgorithm = algorithm.parse()?;
        Ok(Self::with_algorithm(algorithm))
    }

    pub fn add_campaign(&mut self, campaign_id: &str, daily_budget: f64) -> Result<(), JsError> {
        let spec = CampaignSpec::new(campaign_id, daily_budget)?;
        self.system.add_campaign(&self.clock, &spec)?;
        Ok(())
    }

    pub fn remove_campaign(&mut self, campaign_id: &str) -> bool {
        self.system.remove_campaign(campaign_id)
    }

    /// Report a campaign's spend for the current minute.
    pub fn end_iteration(&mut self, campaign_id: &str, spend: f64) {
        self.system.end_iteration(&self.clock, campaign_id, spend);
    }

    /// Move to the next minute.
    pub fn advance(&mut self) {
        self.clock.advance();
    }

    pub fn get_pacing_signal(&self, campaign_id: &str) -> f64 {
        self.system.get_pacing_signal(campaign_id)
    }

    pub fn iterations(&self) -> f64 {
        self.clock.iterations() as f64
    }

    pub fn day(&self) -> u32 {
        self.clock.days() as u32
    }

    pub fn minute_in_day(&self) -> u32 {
        self.clock.minute_in_day() as u32
    }

    pub fn algorithm(&self) -> String {
        self.algorithm.label().to_string()
    }

    pub fn get_pacing_statistics(&self, campaign_id: &str) -> JsValue {
        match self.system.get_pacing_statistics(campaign_id) {
            Ok(stats) => serde_wasm_bindgen::to_value(&stats).unwrap_or(JsValue::NULL),
            Err(_) => JsValue::NULL,
        }
    }

    pub fn get_global_pacing_statistics(&self) -> JsValue {
        let stats = self.system.get_global_pacing_statistics(&self.clock);
        serde_wasm_bindgen::to_value(&stats).unwrap_or(JsValue::NULL)
    }

    /// Reset to minute zero with no tracked campaigns.
    pub fn reset(&mut self) {
        *self = Self::with_algorithm(self.algorithm);
    }
}

impl PacingSimulation {
    pub fn with_algorithm(algorithm: PacingAlgorithm) -> Self {
        Self {
            algorithm,
            clock: Clock::new(),
            system: algorithm.build(PacingParams::default(), pacing::NonLinearParams::default()),
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn system(&self) -> &dyn PacingSystem {
        self.system.as_ref()
    }
}
