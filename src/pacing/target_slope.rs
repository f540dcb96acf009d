// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Target Spend Strategies

//! Target spend curves.
//!
//! A strategy answers two questions for the controller: how fast should the
//! campaign be spending right now (target slope, in daily budgets per day) and
//! what fraction of the daily budget should be gone by now (target spend).
//!
//! * `Linear` spends evenly across the day.
//! * `NonLinear` learns an hourly slope shape from the previous day: hours in
//!   which the signal ran below the day's average (supply was plentiful and
//!   bids were throttled) get a higher slope, hours in which it ran above
//!   average get a lower one.

use serde::{Deserialize, Serialize};

use super::params::NonLinearParams;
use super::tracked_campaign::TrackedCampaign;
use crate::clock::{Clock, HOURS_PER_DAY, MINUTES_PER_HOUR};

/// One value per hour of the day.
pub type HourlyCurve = [f64; HOURS_PER_DAY];

/// Slope of a campaign that spends evenly: one daily budget per day.
pub const FLAT_SLOPE: HourlyCurve = [1.0; HOURS_PER_DAY];

/// Cumulative target spend fraction at the end of each hour:
/// `curve[h] = sum(slope[0..=h]) / 24`.
pub fn target_spend_curve(slope: &HourlyCurve) -> HourlyCurve {
    let mut curve = [0.0; HOURS_PER_DAY];
    let mut acc = 0.0;
    for (out, s) in curve.iter_mut().zip(slope.iter()) {
        acc += s / HOURS_PER_DAY as f64;
        *out = acc;
    }
    curve
}

// ---------------------------------------------------------------------------
// TargetSpendStrategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetSpendStrategy {
    Linear,
    NonLinear(NonLinearParams),
}

impl Default for TargetSpendStrategy {
    fn default() -> Self {
        Self::Linear
    }
}

impl TargetSpendStrategy {
    pub fn non_linear() -> Self {
        Self::NonLinear(NonLinearParams::default())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::NonLinear(_) => "non_linear",
        }
    }

    /// Install the starting curves on a newly tracked campaign.
    pub fn initialize_slope(&self, campaign: &mut TrackedCampaign) {
        campaign.initialize_target_curves(FLAT_SLOPE);
    }

    /// End-of-day update from the day that is about to be archived.
    ///
    /// Always archives the active curves, so curve history stays one entry
    /// per completed day for both strategies.
    pub fn update_slope(&self, campaign: &mut TrackedCampaign) {
        let next = match self {
            Self::Linear => *campaign.current_target_slope(),
            Self::NonLinear(params) => adapted_slope(campaign, params),
        };
        campaign.update_target_curves(next);
    }

    /// `(target_slope, target_spend_fraction)` for the minute `now`.
    pub fn get_target_slope_and_spend(&self, now: &Clock, campaign: &TrackedCampaign) -> (f64, f64) {
        match self {
            Self::Linear => (1.0, now.fraction_of_day()),
            Self::NonLinear(_) => {
                let hour = now.hour_in_day();
                let slope = campaign.current_target_slope()[hour];
                let curve = campaign.current_target_spend_curve();
                let start = if hour == 0 { 0.0 } else { curve[hour - 1] };
                let progress = now.minute_in_hour() as f64 / MINUTES_PER_HOUR as f64;
                (slope, start + (curve[hour] - start) * progress)
            }
        }
    }
}

/// Scale each hour's slope by `avg_daily_ps / avg_hourly_ps`, raising hours
/// whose signal ran below the day's average and lowering those above it.
/// Hours without samples keep their slope. Then clamp and smooth circularly.
fn adapted_slope(campaign: &TrackedCampaign, params: &NonLinearParams) -> HourlyCurve {
    let avg_daily_ps = campaign.get_avg_daily_ps_below_threshold().unwrap_or(0.0);
    let avg_hourly_ps = campaign.get_avg_hourly_ps();

    let mut slope = *campaign.current_target_slope();
    for (hour, s) in slope.iter_mut().enumerate() {
        let update_factor = match avg_hourly_ps.get(hour) {
            Some(&Some(hourly)) if avg_daily_ps >= params.epsilon && hourly >= params.epsilon => {
                (avg_daily_ps / hourly).min(params.max_update_factor)
            }
            _ => 1.0,
        };
        *s = (*s * update_factor).clamp(params.min_slope, params.max_slope);
    }

    smooth_circular(&slope, params.smoothing_factor)
}

/// `s[i] = (f/2)·(x[i-1] + x[i+1]) + (1-f)·x[i]`, indices wrapping around the day.
fn smooth_circular(slope: &HourlyCurve, factor: f64) -> HourlyCurve {
    let n = slope.len();
    let mut smoothed = [0.0; HOURS_PER_DAY];
    for (i, out) in smoothed.iter_mut().enumerate() {
        let prev = slope[(i + n - 1) % n];
        let next = slope[(i + 1) % n];
        *out = factor / 2.0 * (prev + next) + (1.0 - factor) * slope[i];
    }
    smoothed
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MINUTES_PER_DAY;
    use crate::pacing::params::PacingParams;

    fn tracked(budget: f64) -> TrackedCampaign {
        TrackedCampaign::new(budget, 0, &PacingParams::default())
    }

    /// Fill a full day of zero-spend samples with a per-hour signal.
    fn fill_day(c: &mut TrackedCampaign, ps_for_hour: impl Fn(usize) -> f64) {
        for minute in 0..MINUTES_PER_DAY {
            c.update_spend(0.0);
            c.update_pacing_signal(ps_for_hour((minute / MINUTES_PER_HOUR) as usize));
        }
    }

    #[test]
    fn flat_spend_curve_reaches_one() {
        let curve = target_spend_curve(&FLAT_SLOPE);
        assert!((curve[0] - 1.0 / 24.0).abs() < 1e-12);
        assert!((curve[11] - 0.5).abs() < 1e-12);
        assert!((curve[23] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spend_curve_is_non_decreasing_and_sums_slope() {
        let mut slope = FLAT_SLOPE;
        slope[3] = 0.1;
        slope[17] = 5.0;
        let curve = target_spend_curve(&slope);
        assert!(curve.windows(2).all(|w| w[1] >= w[0]));
        let expected: f64 = slope.iter().sum::<f64>() / 24.0;
        assert!((curve[23] - expected).abs() < 1e-12);
    }

    #[test]
    fn linear_initialization() {
        let mut c = tracked(10.0);
        TargetSpendStrategy::Linear.initialize_slope(&mut c);
        assert_eq!(c.current_target_slope(), &FLAT_SLOPE);
        for (h, v) in c.current_target_spend_curve().iter().enumerate() {
            assert!((v - (h + 1) as f64 / 24.0).abs() < 1e-12);
        }
        assert!(c.target_slope_history().is_empty());
        assert!(c.target_spend_history().is_empty());
    }

    #[test]
    fn linear_update_keeps_curve_and_grows_history() {
        let mut c = tracked(10.0);
        let s = TargetSpendStrategy::Linear;
        s.initialize_slope(&mut c);
        s.update_slope(&mut c);
        s.update_slope(&mut c);
        assert_eq!(c.current_target_slope(), &FLAT_SLOPE);
        assert_eq!(c.target_slope_history().len(), 2);
        assert_eq!(c.target_spend_history().len(), 2);
    }

    #[test]
    fn linear_target_tracks_elapsed_fraction() {
        let c = tracked(10.0);
        let s = TargetSpendStrategy::Linear;
        assert_eq!(s.get_target_slope_and_spend(&Clock::new(), &c), (1.0, 0.0));
        for m in [1_u64, 34, 720, 1439] {
            let (slope, spend) = s.get_target_slope_and_spend(&Clock::at(m), &c);
            assert_eq!(slope, 1.0);
            assert_eq!(spend, m as f64 / 1440.0);
        }
        // Second day starts over.
        let (_, spend) = s.get_target_slope_and_spend(&Clock::at(MINUTES_PER_DAY + 1), &c);
        assert_eq!(spend, 1.0 / 1440.0);
    }

    #[test]
    fn non_linear_flat_curve_matches_linear_target() {
        let mut c = tracked(10.0);
        let s = TargetSpendStrategy::non_linear();
        s.initialize_slope(&mut c);
        for m in [0_u64, 1, 59, 60, 61, 600, 1439] {
            let (slope, spend) = s.get_target_slope_and_spend(&Clock::at(m), &c);
            assert_eq!(slope, 1.0);
            assert!((spend - m as f64 / 1440.0).abs() < 1e-12, "minute {m}: {spend}");
        }
    }

    #[test]
    fn non_linear_uses_hourly_slope() {
        let mut c = tracked(10.0);
        let mut slope = FLAT_SLOPE;
        slope[2] = 3.0;
        c.initialize_target_curves(slope);
        let s = TargetSpendStrategy::non_linear();
        let (target_slope, spend) = s.get_target_slope_and_spend(&Clock::at(2 * 60 + 30), &c);
        assert_eq!(target_slope, 3.0);
        // two flat hours, then half of a triple-rate hour
        let expected = 2.0 / 24.0 + 0.5 * 3.0 / 24.0;
        assert!((spend - expected).abs() < 1e-12);
    }

    #[test]
    fn non_linear_update_raises_hours_below_average_signal() {
        let mut c = tracked(1_000_000.0);
        let s = TargetSpendStrategy::non_linear();
        s.initialize_slope(&mut c);
        fill_day(&mut c, |h| if h < 12 { 0.4 } else { 0.6 });

        s.update_slope(&mut c);
        let new = c.current_target_slope();
        let old = &c.target_slope_history()[0];
        assert_eq!(c.target_slope_history().len(), 1);
        assert_eq!(c.target_spend_history().len(), 1);
        for h in 0..24 {
            if h < 12 {
                assert!(new[h] > old[h], "hour {h}: {} <= {}", new[h], old[h]);
            } else {
                assert!(new[h] < old[h], "hour {h}: {} >= {}", new[h], old[h]);
            }
        }
        // Interior hours see no smoothing: 0.5 / 0.4 = 1.25
        assert!((new[5] - 1.25).abs() < 1e-9);
        // Spend curve is re-derived from the new slope.
        let expected: f64 = new.iter().sum::<f64>() / 24.0;
        assert!((c.current_target_spend_curve()[23] - expected).abs() < 1e-12);
    }

    #[test]
    fn non_linear_update_leaves_unobserved_hours_alone() {
        let mut c = tracked(1_000_000.0);
        let s = TargetSpendStrategy::non_linear();
        s.initialize_slope(&mut c);
        // tracked from noon: the morning has no samples
        c.set_today_start_minute(12 * MINUTES_PER_HOUR);
        for minute in 12 * MINUTES_PER_HOUR..MINUTES_PER_DAY {
            c.update_spend(0.0);
            c.update_pacing_signal(if minute < 18 * MINUTES_PER_HOUR { 0.2 } else { 0.6 });
        }
        s.update_slope(&mut c);
        let new = c.current_target_slope();
        for h in 1..=10 {
            assert!((new[h] - 1.0).abs() < 1e-12, "hour {h} had no samples: {}", new[h]);
        }
        // afternoon ran below the 0.4 average, evening above it
        assert!(new[14] > 1.0);
        assert!(new[20] < 1.0);
    }

    #[test]
    fn non_linear_update_factor_is_capped() {
        let mut c = tracked(1_000_000.0);
        let s = TargetSpendStrategy::non_linear();
        s.initialize_slope(&mut c);
        // hour 0 runs at 0.01 while the rest run at 1: ratio far above 2
        fill_day(&mut c, |h| if h == 0 { 0.01 } else { 1.0 });
        s.update_slope(&mut c);
        let new = c.current_target_slope();
        // raw hour 0 = 2.0 (capped), neighbours ~0.96
        assert!(new[0] < 2.0);
        assert!(new[0] > 1.0);
        assert!(new.iter().all(|v| *v >= 0.1 && *v <= 12.0));
    }

    #[test]
    fn non_linear_update_without_samples_only_smooths() {
        let mut c = tracked(100.0);
        let s = TargetSpendStrategy::non_linear();
        s.initialize_slope(&mut c);
        s.update_slope(&mut c);
        // A flat curve is a fixed point of the smoothing pass.
        for v in c.current_target_slope() {
            assert!((v - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn smoothing_is_circular() {
        let mut slope = FLAT_SLOPE;
        slope[0] = 3.0;
        let smoothed = smooth_circular(&slope, 0.5);
        assert!((smoothed[0] - 2.0).abs() < 1e-12);
        assert!((smoothed[1] - 1.5).abs() < 1e-12);
        assert!((smoothed[23] - 1.5).abs() < 1e-12);
        assert!((smoothed[12] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn strategy_config_round_trip() {
        let s: TargetSpendStrategy =
            serde_json::from_str(r#"{ "type": "non_linear", "max_slope": 6.0 }"#)
                .expect("test: valid strategy json");
        match s {
            TargetSpendStrategy::NonLinear(p) => {
                assert_eq!(p.max_slope, 6.0);
                assert_eq!(p.min_slope, 0.1);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }
}
