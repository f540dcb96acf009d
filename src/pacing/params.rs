// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Controller Parameters

//! Tuned policy constants of the Mystique controller.
//!
//! Every threshold the correction loop depends on lives here so a scenario can
//! override it from configuration. The `Default` impls carry the values the
//! controller was tuned with.

use serde::{Deserialize, Serialize};

use crate::clock::MINUTES_PER_DAY;

// ---------------------------------------------------------------------------
// PacingParams
// ---------------------------------------------------------------------------

/// Thresholds and gains of the per-minute correction step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingParams {
    /// Upper bound of the pacing signal.
    pub max_ps: f64,
    /// Floor applied to every corrected signal (runaway stops bypass it).
    pub minimal_ps_value: f64,
    /// Bootstrap signal for campaigns at or below the high-budget threshold.
    pub initial_ps: f64,
    /// Daily budgets above this start at `max_ps` instead of `initial_ps`.
    pub high_budget_threshold: f64,
    /// Fraction of budget below which a PS sample counts toward the daily average.
    pub budget_spend_threshold: f64,
    /// Mean daily PS below this marks a campaign as budget-constrained.
    pub budget_constrained_threshold: f64,
    /// Number of trailing minutes of the day that use the stabilization rule.
    pub end_of_day_window: u64,
    /// Largest single-step correction.
    pub max_ps_correction: f64,
    /// Smallest gradient correction applied on any step.
    pub minimal_gradient_correction: f64,
    /// Spend error magnitude that earns `max_ps_correction`.
    pub spend_error_for_max_correction: f64,
    /// Gradient error magnitude that earns `max_ps_correction`.
    pub gradient_error_for_max_correction: f64,
    /// Cap on the spend-error weight `w1`.
    pub max_spend_error_weight: f64,
    /// `w1 = factor * estimated_intervals`, before the cap.
    pub spend_error_weight_factor: f64,
    /// Gradient error above which the runaway rule may fire.
    pub runaway_gradient_error: f64,
    /// Estimated intervals below which the runaway rule may fire.
    pub runaway_max_intervals: f64,
    /// Absolute tolerance for treating the gradient error as zero.
    pub gradient_zero_tolerance: f64,
}

impl Default for PacingParams {
    fn default() -> Self {
        Self {
            max_ps: 1.0,
            minimal_ps_value: 0.0001,
            initial_ps: 0.0001,
            high_budget_threshold: 10_000.0,
            budget_spend_threshold: 0.95,
            budget_constrained_threshold: 0.95,
            end_of_day_window: 3,
            max_ps_correction: 0.025,
            minimal_gradient_correction: 0.01,
            spend_error_for_max_correction: 0.25,
            gradient_error_for_max_correction: 1.5,
            max_spend_error_weight: 0.9,
            spend_error_weight_factor: 0.2,
            runaway_gradient_error: 12.0,
            runaway_max_intervals: 3600.0,
            gradient_zero_tolerance: 1e-9,
        }
    }
}

impl PacingParams {
    /// Sentinel returned when the gradient error is zero: one more than a day.
    pub fn max_interval(&self) -> f64 {
        MINUTES_PER_DAY as f64 + 1.0
    }

    /// First minute of the day handled by the end-of-day stabilization rule.
    pub fn end_of_day_start(&self) -> u64 {
        MINUTES_PER_DAY.saturating_sub(self.end_of_day_window)
    }
}

// ---------------------------------------------------------------------------
// NonLinearParams
// ---------------------------------------------------------------------------

/// Knobs of the adaptive hourly target-slope update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonLinearParams {
    pub min_slope: f64,
    pub max_slope: f64,
    /// Cap on the per-day multiplicative update of an hour's slope.
    pub max_update_factor: f64,
    /// Weight moved from an hour onto its two neighbours when smoothing.
    pub smoothing_factor: f64,
    /// Averages below this are too small to derive a ratio from.
    pub epsilon: f64,
}

impl Default for NonLinearParams {
    fn default() -> Self {
        Self {
            min_slope: 0.1,
            max_slope: 12.0,
            max_update_factor: 2.0,
            smoothing_factor: 0.5,
            epsilon: 0.0002,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
