/// Relative tolerance used when comparing products computed along different
/// rotations of the same loop. Multiplication order changes the rounding, not the value.
pub const PRODUCT_TOLERANCE: f64 = 1e-9;

/// Returns true if `rate` can be used as an edge weight: positive and finite.
pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

/// Multiplies rates left to right, starting from 1.0.
///
/// An empty slice yields 1.0 (the neutral product).
pub fn product_of(rates: &[f64]) -> f64 {
    rates.iter().fold(1.0, |acc, rate| acc * rate)
}

/// Converts a product multiplier into a percentage gain (1.08 -> 8.0).
pub fn profit_percentage(product: f64) -> f64 {
    (product - 1.0) * 100.0
}

/// Relative comparison of two products.
pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= tolerance * scale
}
