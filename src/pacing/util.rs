// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Numeric Helpers

/// Relative tolerance used by [`is_close`].
const REL_TOLERANCE: f64 = 1e-9;

/// Approximate equality: `|a - b| <= max(1e-9 * max(|a|, |b|), abs_tol)`.
pub fn is_close(a: f64, b: f64, abs_tol: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= (REL_TOLERANCE * a.abs().max(b.abs())).max(abs_tol)
}

/// Three-valued sign; unlike [`f64::signum`], zero maps to zero.
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
