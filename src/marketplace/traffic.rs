// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Traffic & Bid Sampling
//
// Seedable auction arrivals (Poisson around a daily cosine wave) and the
// log-normal bid distributions used by campaigns and untracked bidders.

use std::f64::consts::PI;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::SimulationError;
use crate::clock::{Clock, MINUTES_PER_DAY};

// ─── Daily Cosine Wave ──────────────────────────────────────────────────────

/// Expected auctions per minute: `dc · (1 + amplitude · cos(2π(m/1440 + phase)))`.
///
/// `amplitude` is a fraction of `dc`; `phase` shifts the wave by a fraction
/// of the day (0.5 puts the trough at midnight and the peak at noon).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyCosineWave {
    pub dc: f64,
    pub amplitude: f64,
    pub phase: f64,
}

impl Default for DailyCosineWave {
    fn default() -> Self {
        Self { dc: 200.0, amplitude: 0.5, phase: 0.5 }
    }
}

impl DailyCosineWave {
    pub fn new(dc: f64, amplitude: f64, phase: f64) -> Result<Self, SimulationError> {
        let wave = Self { dc, amplitude, phase };
        wave.validate()?;
        Ok(wave)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.dc > 0.0 && self.dc.is_finite()) {
            return Err(SimulationError::InvalidConfig(format!("traffic dc must be positive, got {}", self.dc)));
        }
        if !(0.0..=1.0).contains(&self.amplitude) {
            return Err(SimulationError::InvalidConfig(format!(
                "traffic amplitude must be in [0, 1], got {}",
                self.amplitude
            )));
        }
        if !(0.0..=1.0).contains(&self.phase) {
            return Err(SimulationError::InvalidConfig(format!(
                "traffic phase must be in [0, 1], got {}",
                self.phase
            )));
        }
        Ok(())
    }

    pub fn value_at(&self, now: &Clock) -> f64 {
        let fraction = now.minute_in_day() as f64 / MINUTES_PER_DAY as f64;
        self.dc * (1.0 + self.amplitude * (2.0 * PI * (fraction + self.phase)).cos())
    }
}

// ─── Sampling ───────────────────────────────────────────────────────────────

/// Poisson sampling via Knuth algorithm.
/// For λ < 30, uses direct method. For larger λ, uses normal approximation.
pub fn poisson_sample(rng: &mut ChaCha8Rng, lambda: f64) -> u32 {
    if lambda <= 0.0 {
        return 0;
    }
    if lambda < 30.0 {
        let l = (-lambda).exp();
        let mut k: u32 = 0;
        let mut p: f64 = 1.0;
        loop {
            k += 1;
            p *= rng.gen::<f64>();
            if p <= l {
                return k - 1;
            }
        }
    } else {
        let result = lambda + lambda.sqrt() * standard_normal(rng);
        result.round().max(0.0) as u32
    }
}

/// Box-Muller standard normal draw.
pub fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
    // gen::<f64>() is in [0, 1); ln(0) must be avoided
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Distribution of `exp(N(mu, sigma²))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormal {
    pub mu: f64,
    pub sigma: f64,
}

impl LogNormal {
    pub fn new(mu: f64, sigma: f64) -> Result<Self, SimulationError> {
        if !(mu.is_finite() && sigma.is_finite() && sigma >= 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "log-normal parameters must be finite with sigma >= 0, got mu={mu} sigma={sigma}"
            )));
        }
        Ok(Self { mu, sigma })
    }

    pub fn mean(&self) -> f64 {
        (self.mu + self.sigma * self.sigma / 2.0).exp()
    }

    pub fn median(&self) -> f64 {
        self.mu.exp()
    }

    pub fn sample(&self, rng: &mut ChaCha8Rng) -> f64 {
        (self.mu + self.sigma * standard_normal(rng)).exp()
    }
}
