//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Truncate a f64 toward zero and clamp it to the i32 range, returning 0 for NaN values.
#[must_use]
pub fn trunc_f64_to_i32(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    let min = cast::<i32, f64>(i32::MIN).unwrap_or(f64::MIN);
    let max = cast::<i32, f64>(i32::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).trunc();
    cast::<f64, i32>(clamped).unwrap_or(0)
}

/// Scale an integer speed by a factor, truncating toward zero like the physics expects.
#[must_use]
pub fn scale_i32(value: i32, factor: f64) -> i32 {
    trunc_f64_to_i32(f64::from(value) * factor)
}

/// Share of `part` in `part + other`, falling back to an even split when both are zero.
#[must_use]
pub fn proportion(part: i32, other: i32) -> f64 {
    let total = f64::from(part) + f64::from(other);
    if total == 0.0 {
        return 0.5;
    }
    f64::from(part) / total
}
