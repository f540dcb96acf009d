// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Tracked Campaign State

//! Per-campaign controller state.
//!
//! A [`TrackedCampaign`] holds today's per-minute spend and pacing-signal
//! samples, the completed-day history, the active target curves, and the
//! running "average PS while under the spend threshold" accumulator that
//! seeds the next day's signal.

use serde::{Deserialize, Serialize};

use super::mystique::ErrorSignals;
use super::params::PacingParams;
use super::target_slope::{target_spend_curve, HourlyCurve, FLAT_SLOPE};
use crate::clock::MINUTES_PER_HOUR;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedCampaign {
    daily_budget: f64,
    day_started: u64,

    ps: f64,
    previous_ps: f64,
    last_positive_ps: f64,
    bootstrap_ps: f64,
    max_ps: f64,
    budget_spend_threshold: f64,

    today_spend: Vec<f64>,
    today_ps: Vec<f64>,
    /// Minute of the day of today's first sample.
    today_start_minute: u64,
    spend_history: Vec<Vec<f64>>,
    ps_history: Vec<Vec<f64>>,

    current_target_slope: HourlyCurve,
    current_target_spend_curve: HourlyCurve,
    target_slope_history: Vec<HourlyCurve>,
    target_spend_history: Vec<HourlyCurve>,

    sum_ps_below_threshold: f64,
    count_ps_below_threshold: u32,

    last_error_signals: Option<ErrorSignals>,
}

impl TrackedCampaign {
    /// Create the state for a campaign registered on clock day `day_started`.
    ///
    /// Budgets above `params.high_budget_threshold` start fully open; all
    /// others start from the small bootstrap signal and ramp up.
    pub fn new(daily_budget: f64, day_started: u64, params: &PacingParams) -> Self {
        debug_assert!(daily_budget > 0.0, "daily budget must be positive");
        let bootstrap_ps = if daily_budget > params.high_budget_threshold {
            params.max_ps
        } else {
            params.initial_ps
        };
        let mut campaign = Self {
            daily_budget,
            day_started,
            ps: params.initial_ps,
            previous_ps: params.initial_ps,
            last_positive_ps: params.initial_ps,
            bootstrap_ps,
            max_ps: params.max_ps,
            budget_spend_threshold: params.budget_spend_threshold,
            today_spend: Vec::new(),
            today_ps: Vec::new(),
            today_start_minute: 0,
            spend_history: Vec::new(),
            ps_history: Vec::new(),
            current_target_slope: FLAT_SLOPE,
            current_target_spend_curve: target_spend_curve(&FLAT_SLOPE),
            target_slope_history: Vec::new(),
            target_spend_history: Vec::new(),
            sum_ps_below_threshold: 0.0,
            count_ps_below_threshold: 0,
            last_error_signals: None,
        };
        campaign.new_day_init(true);
        campaign
    }

    // -- Per-iteration updates ---------------------------------------------

    pub fn update_spend(&mut self, amount: f64) {
        debug_assert!(amount >= 0.0, "reported spend must be non-negative");
        self.today_spend.push(amount);
    }

    /// Install the signal computed for this iteration.
    ///
    /// Must run after [`update_spend`](Self::update_spend) for the same
    /// iteration: the below-threshold accumulator reads today's spend.
    pub fn update_pacing_signal(&mut self, new_ps: f64) {
        debug_assert!(
            (0.0..=self.max_ps).contains(&new_ps),
            "pacing signal {new_ps} out of bounds"
        );
        self.previous_ps = self.ps;
        if self.ps > 0.0 {
            self.last_positive_ps = self.ps;
        }
        self.ps = new_ps;
        self.today_ps.push(new_ps);

        if self.get_today_spend() / self.daily_budget < self.budget_spend_threshold {
            self.sum_ps_below_threshold += self.ps;
            self.count_ps_below_threshold += 1;
        }
    }

    pub(crate) fn record_error_signals(&mut self, signals: Option<ErrorSignals>) {
        self.last_error_signals = signals;
    }

    // -- Day lifecycle -------------------------------------------------------

    /// Start a new day. A new campaign first resets its signals to the
    /// budget-tier bootstrap value; every call then rolls the day.
    pub fn new_day_init(&mut self, is_new_campaign: bool) {
        if is_new_campaign {
            self.ps = self.bootstrap_ps;
            self.previous_ps = self.bootstrap_ps;
            self.last_positive_ps = self.bootstrap_ps;
        }
        self.roll_day();
    }

    /// Seed tomorrow's signals from today's below-threshold average, archive
    /// today's samples, and clear the accumulators.
    pub fn roll_day(&mut self) {
        match self.get_avg_daily_ps_below_threshold() {
            Some(avg) => {
                let seeded = avg.min(self.max_ps);
                self.previous_ps = seeded;
                self.last_positive_ps = seeded;
            }
            None => {
                self.previous_ps = self.last_positive_ps.min(self.max_ps);
            }
        }

        if !self.today_ps.is_empty() {
            self.ps_history.push(std::mem::take(&mut self.today_ps));
        }
        if !self.today_spend.is_empty() {
            self.spend_history.push(std::mem::take(&mut self.today_spend));
        }

        self.today_start_minute = 0;
        self.sum_ps_below_threshold = 0.0;
        self.count_ps_below_threshold = 0;
    }

    /// Align today's samples to the clock for a campaign tracked mid-day.
    pub fn set_today_start_minute(&mut self, minute_in_day: u64) {
        debug_assert!(self.today_ps.is_empty(), "samples already recorded today");
        self.today_start_minute = minute_in_day;
    }

    // -- Target curves -------------------------------------------------------

    /// Set the curves without archiving the previous ones.
    pub fn initialize_target_curves(&mut self, slope: HourlyCurve) {
        self.current_target_slope = slope;
        self.current_target_spend_curve = target_spend_curve(&slope);
    }

    /// Archive the active curves and install `slope` with its derived
    /// cumulative spend curve.
    pub fn update_target_curves(&mut self, slope: HourlyCurve) {
        self.target_slope_history.push(self.current_target_slope);
        self.target_spend_history.push(self.current_target_spend_curve);
        self.initialize_target_curves(slope);
    }

    // -- Accessors -----------------------------------------------------------

    pub fn daily_budget(&self) -> f64 {
        self.daily_budget
    }

    pub fn day_started(&self) -> u64 {
        self.day_started
    }

    pub fn ps(&self) -> f64 {
        self.ps
    }

    pub fn previous_ps(&self) -> f64 {
        self.previous_ps
    }

    pub fn last_positive_ps(&self) -> f64 {
        self.last_positive_ps
    }

    pub fn today_spend(&self) -> &[f64] {
        &self.today_spend
    }

    pub fn today_ps(&self) -> &[f64] {
        &self.today_ps
    }

    pub fn spend_history(&self) -> &[Vec<f64>] {
        &self.spend_history
    }

    pub fn ps_history(&self) -> &[Vec<f64>] {
        &self.ps_history
    }

    pub fn current_target_slope(&self) -> &HourlyCurve {
        &self.current_target_slope
    }

    pub fn current_target_spend_curve(&self) -> &HourlyCurve {
        &self.current_target_spend_curve
    }

    pub fn target_slope_history(&self) -> &[HourlyCurve] {
        &self.target_slope_history
    }

    pub fn target_spend_history(&self) -> &[HourlyCurve] {
        &self.target_spend_history
    }

    pub fn last_error_signals(&self) -> Option<&ErrorSignals> {
        self.last_error_signals.as_ref()
    }

    pub fn get_today_spend(&self) -> f64 {
        self.today_spend.iter().sum()
    }

    pub fn get_spend_in_last_time_interval(&self) -> f64 {
        self.today_spend.last().copied().unwrap_or(0.0)
    }

    /// Mean PS over today's iterations that ended under the spend threshold,
    /// or `None` when there were none.
    pub fn get_avg_daily_ps_below_threshold(&self) -> Option<f64> {
        if self.count_ps_below_threshold == 0 {
            return None;
        }
        Some(self.sum_ps_below_threshold / self.count_ps_below_threshold as f64)
    }

    /// Mean PS per clock hour so far today, indexed by hour of the day.
    /// Hours without samples (before a mid-day start) are `None`.
    pub fn get_avg_hourly_ps(&self) -> Vec<Option<f64>> {
        let mut buckets: Vec<(f64, u32)> = Vec::new();
        for (i, ps) in self.today_ps.iter().enumerate() {
            let hour = ((self.today_start_minute + i as u64) / MINUTES_PER_HOUR) as usize;
            if buckets.len() <= hour {
                buckets.resize(hour + 1, (0.0, 0));
            }
            buckets[hour].0 += ps;
            buckets[hour].1 += 1;
        }
        buckets.into_iter().map(|(sum, n)| (n > 0).then(|| sum / n as f64)).collect()
    }

    pub fn today_start_minute(&self) -> u64 {
        self.today_start_minute
    }
}

// ===========================================================================
// Tests
// ===========================================================================
