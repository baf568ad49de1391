//! Fire intensity: normalized pressure of a friction signal

use canopy_common::{Signal, UnitScore};

/// Saturation point of a single indicator
pub const INDICATOR_CAP: u32 = 5;

/// Indicators contributing to intensity
pub const INDICATOR_COUNT: u32 = 5;

/// Normalized intensity of a signal in `[0, 1]`
///
/// Each indicator contributes at most [`INDICATOR_CAP`] points. Urgency is a
/// flag that contributes the full cap when high or critical.
pub fn fire_intensity(signal: &Signal) -> UnitScore {
    let urgency = if signal.urgency.is_urgent() {
        INDICATOR_CAP
    } else {
        0
    };

    let points: u32 = [
        signal.frustration_count,
        signal.attempts,
        signal.help_requests,
        urgency,
        signal.error_count,
    ]
    .iter()
    .map(|count| (*count).min(INDICATOR_CAP))
    .sum();

    UnitScore::new(points as f64 / (INDICATOR_CAP * INDICATOR_COUNT) as f64)
}
