//! Adapter layer: converts between the controller's f64 world and the
//! marketplace's Decimal money.

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Smallest bid an auction accepts and smallest daily budget a campaign may have.
pub const MINIMAL_BID: Decimal = dec!(0.01);

/// Convert f64 to Decimal (lossy but sufficient for simulation).
/// Non-finite and out-of-range values map to zero.
pub fn to_decimal(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
}

/// Convert Decimal to f64.
pub fn from_decimal(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Sum a slice of Decimal amounts.
pub fn sum_decimal(values: &[Decimal]) -> Decimal {
    values.iter().copied().sum()
}
