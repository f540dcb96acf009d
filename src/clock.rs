// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Simulation Clock

use serde::{Deserialize, Serialize};

pub const MINUTES_PER_HOUR: u64 = 60;
pub const HOURS_PER_DAY: usize = 24;
pub const MINUTES_PER_DAY: u64 = HOURS_PER_DAY as u64 * MINUTES_PER_HOUR;

/// Discrete simulation clock. One iteration is one simulated minute.
///
/// The driver owns the clock and is its only writer; every pacing call takes
/// it by reference, so independent simulations never share time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    iterations: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock positioned at an absolute iteration count.
    pub fn at(iterations: u64) -> Self {
        Self { iterations }
    }

    pub fn advance(&mut self) {
        self.iterations += 1;
    }

    pub fn reset(&mut self) {
        self.iterations = 0;
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn minute_in_day(&self) -> u64 {
        self.iterations % MINUTES_PER_DAY
    }

    pub fn minute_in_hour(&self) -> u64 {
        self.minute_in_day() % MINUTES_PER_HOUR
    }

    pub fn hour_in_day(&self) -> usize {
        (self.minute_in_day() / MINUTES_PER_HOUR) as usize
    }

    pub fn days(&self) -> u64 {
        self.iterations / MINUTES_PER_DAY
    }

    /// Whether the current minute is the last one of the day.
    pub fn is_last_minute_of_day(&self) -> bool {
        self.minute_in_day() == MINUTES_PER_DAY - 1
    }

    /// Fraction of the day elapsed at the start of the current minute.
    pub fn fraction_of_day(&self) -> f64 {
        self.minute_in_day() as f64 / MINUTES_PER_DAY as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_values_at_start() {
        let c = Clock::new();
        assert_eq!(c.minute_in_day(), 0);
        assert_eq!(c.hour_in_day(), 0);
        assert_eq!(c.minute_in_hour(), 0);
        assert_eq!(c.days(), 0);
    }

    #[test]
    fn derived_values_mid_day() {
        // day 2, 13:07
        let c = Clock::at(2 * MINUTES_PER_DAY + 13 * 60 + 7);
        assert_eq!(c.days(), 2);
        assert_eq!(c.hour_in_day(), 13);
        assert_eq!(c.minute_in_hour(), 7);
        assert_eq!(c.minute_in_day(), 13 * 60 + 7);
    }

    #[test]
    fn advance_rolls_day() {
        let mut c = Clock::at(MINUTES_PER_DAY - 1);
        assert!(c.is_last_minute_of_day());
        c.advance();
        assert_eq!(c.days(), 1);
        assert_eq!(c.minute_in_day(), 0);
        assert!(!c.is_last_minute_of_day());
    }

    #[test]
    fn reset_returns_to_zero() {
        let mut c = Clock::at(12_345);
        c.reset();
        assert_eq!(c, Clock::new());
    }

    #[test]
    fn fraction_of_day() {
        assert_eq!(Clock::new().fraction_of_day(), 0.0);
        assert!((Clock::at(720).fraction_of_day() - 0.5).abs() < 1e-12);
    }
}
