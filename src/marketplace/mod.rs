// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Marketplace Simulation

//! Discrete-minute ad marketplace used to exercise the pacing systems.
//!
//! Each minute the marketplace draws a Poisson number of auctions around a
//! daily cosine traffic wave, draws the user properties of each auction,
//! collects bids from the campaigns targeting that user, clears each auction
//! first-price, and then closes the minute (spend reported to the pacing
//! system, clock advanced).

pub mod auction;
pub mod audience;
pub mod campaign;
pub mod serving;
pub mod stats;
pub mod traffic;

use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::clock::{Clock, MINUTES_PER_DAY};
use crate::pacing::{NonLinearParams, PacingAlgorithm, PacingError, PacingParams, PacingSystem};

pub use auction::{AuctionType, AuctionWinner, Bid, Bidder};
pub use audience::{AudienceConfig, TargetingGroups, UserProperties};
pub use campaign::{Campaign, CampaignGenerationConfig, DayLedger};
pub use serving::{ServingSystem, UntrackedBidsConfig};
pub use stats::{CampaignReport, DayReport, OverallReport};
pub use traffic::{DailyCosineWave, LogNormal};

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid campaign {id}: {reason}")]
    InvalidCampaign { id: String, reason: String },

    #[error("campaign {0} already exists")]
    DuplicateCampaign(String),

    #[error(transparent)]
    Pacing(#[from] PacingError),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

// ─── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub seed: u64,
    pub days: u64,
    pub auction: AuctionType,
    pub traffic: DailyCosineWave,
    pub audience: AudienceConfig,
    pub campaigns: CampaignGenerationConfig,
    pub untracked_bids: UntrackedBidsConfig,
    pub pacing: PacingParams,
    pub non_linear: NonLinearParams,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            days: 7,
            auction: AuctionType::default(),
            traffic: DailyCosineWave::default(),
            audience: AudienceConfig::default(),
            campaigns: CampaignGenerationConfig::default(),
            untracked_bids: UntrackedBidsConfig::default(),
            pacing: PacingParams::default(),
            non_linear: NonLinearParams::default(),
        }
    }
}

impl MarketplaceConfig {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        self.traffic.validate()?;
        self.audience.validate()?;
        self.campaigns.validate()?;
        LogNormal::new(self.untracked_bids.bids.mu, self.untracked_bids.bids.sigma)?;
        if self.untracked_bids.factor.is_nan() || self.untracked_bids.factor < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "untracked bid factor must be non-negative, got {}",
                self.untracked_bids.factor
            )));
        }
        Ok(())
    }

    pub fn build_pacing(&self, algorithm: Option<PacingAlgorithm>) -> Option<Box<dyn PacingSystem>> {
        algorithm.map(|a| a.build(self.pacing.clone(), self.non_linear.clone()))
    }
}

// ─── Marketplace ────────────────────────────────────────────────────────────

pub struct Marketplace {
    clock: Clock,
    rng: ChaCha8Rng,
    traffic: DailyCosineWave,
    audience: AudienceConfig,
    auction: AuctionType,
    serving: ServingSystem,
    user: UserProperties,
    bids: Vec<Bid>,
    auctions_run: u64,
    auctions_cleared: u64,
}

impl Marketplace {
    pub fn new(config: &MarketplaceConfig, pacing: Option<Box<dyn PacingSystem>>) -> Result<Self, SimulationError> {
        config.validate()?;
        Ok(Self {
            clock: Clock::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            traffic: config.traffic,
            audience: config.audience.clone(),
            auction: config.auction,
            serving: ServingSystem::new(pacing, config.untracked_bids.clone()),
            user: UserProperties::new(),
            bids: Vec::new(),
            auctions_run: 0,
            auctions_cleared: 0,
        })
    }

    /// Marketplace pre-populated with the configured generated campaigns.
    ///
    /// Campaigns come from their own RNG stream, so every algorithm run with
    /// the same seed faces the same campaigns.
    pub fn with_generated_campaigns(
        config: &MarketplaceConfig,
        pacing: Option<Box<dyn PacingSystem>>,
    ) -> Result<Self, SimulationError> {
        let mut market = Self::new(config, pacing)?;
        let mut campaign_rng = ChaCha8Rng::seed_from_u64(config.seed);
        campaign_rng.set_stream(1);
        for campaign in config.campaigns.generate(&config.audience, &mut campaign_rng)? {
            market.add_campaign(campaign)?;
        }
        Ok(market)
    }

    pub fn add_campaign(&mut self, campaign: Campaign) -> Result<(), SimulationError> {
        self.serving.add_campaign(&self.clock, campaign)
    }

    /// Simulate one minute.
    pub fn run_iteration(&mut self) {
        let lambda = self.traffic.value_at(&self.clock);
        let n_auctions = traffic::poisson_sample(&mut self.rng, lambda);
        for _ in 0..n_auctions {
            self.audience.sample_into(&mut self.rng, &mut self.user);
            self.serving.collect_bids(&mut self.rng, &self.user, &mut self.bids);
            self.auctions_run += 1;
            if let Some(winner) = self.auction.run(&self.bids) {
                self.serving.credit_winner(&winner);
                self.auctions_cleared += 1;
            }
        }
        self.serving.end_iteration(&self.clock);
        self.clock.advance();

        if self.clock.minute_in_day() == 0 {
            info!(
                day = self.clock.days(),
                pacing = %self.serving.pacing_name(),
                auctions = self.auctions_run,
                cleared = self.auctions_cleared,
                "marketplace day complete"
            );
        }
    }

    pub fn run_days(&mut self, days: u64) {
        for _ in 0..days * MINUTES_PER_DAY {
            self.run_iteration();
        }
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn serving(&self) -> &ServingSystem {
        &self.serving
    }

    pub fn auctions_run(&self) -> u64 {
        self.auctions_run
    }

    pub fn auctions_cleared(&self) -> u64 {
        self.auctions_cleared
    }

    pub fn campaign_reports(&self) -> Vec<CampaignReport> {
        stats::campaign_reports(&self.serving)
    }

    pub fn day_reports(&self) -> Vec<DayReport> {
        stats::day_reports(&self.serving, &self.clock)
    }

    pub fn overall_report(&self) -> OverallReport {
        stats::overall_report(&self.serving, &self.day_reports())
    }
}
