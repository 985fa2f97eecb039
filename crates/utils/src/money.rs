//! Rounding helpers for currency amounts.

/// Round to two decimals, half away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Tax on an already-rounded subtotal.
pub fn tax_on(subtotal: f64, rate: f64) -> f64 {
    round2(subtotal * rate)
}
