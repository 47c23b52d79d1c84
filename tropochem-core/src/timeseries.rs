//! Scalar aliases and time-axis helpers shared by every model.

pub type FloatValue = f64;
/// Model time, in seconds unless stated otherwise
pub type Time = f64;

/// Number of seconds in one day
pub const SECONDS_PER_DAY: Time = 24.0 * 60.0 * 60.0;

/// Convert a time in seconds to days
pub fn seconds_to_days(t: Time) -> Time {
    t / SECONDS_PER_DAY
}

/// Returns true if `values` is strictly increasing
pub fn is_strictly_increasing(values: &[Time]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
