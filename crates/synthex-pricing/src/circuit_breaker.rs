//! Price-deviation circuit breaker.

use rust_decimal::Decimal;

/// True when `rate` deviates from `anchor` by a factor of at least
/// `threshold_factor` in either direction.
///
/// A zero on either side always counts as deviated. An asset without an
/// anchor has no last exchange rate to compare against, so callers skip the
/// check rather than pass zero.
#[must_use]
pub fn is_deviation_above_threshold(
    anchor: Decimal,
    rate: Decimal,
    threshold_factor: Decimal,
) -> bool {
    if anchor <= Decimal::ZERO || rate <= Decimal::ZERO {
        return true;
    }
    let (hi, lo) = if rate > anchor {
        (rate, anchor)
    } else {
        (anchor, rate)
    };
    match hi.checked_div(lo) {
        Some(factor) => factor >= threshold_factor,
        None => true,
    }
}
