//! Measure normalisation

use bgdv_common::{GeometryParameter, ParameterValue};
use tracing::debug;

pub const INCHES_TO_MM: f64 = 25.4;

/// Tolerance when matching a reading in inches with one in millimetres
const UNIT_TOLERANCE_MM: f64 = 1.0;

/// Collapse a two-element range that is one measurement in inches and
/// millimetres (`[39.92, 1014]`) to the millimetre value
pub fn normalise_range_measure(parameter: &mut GeometryParameter) {
    let (first, second) = match parameter.normalised_value() {
        Some(ParameterValue::Range(values)) if values.len() == 2 => (values[0], values[1]),
        _ => return,
    };

    let millimetres = if (first * INCHES_TO_MM - second).abs() <= UNIT_TOLERANCE_MM {
        second
    } else if (second * INCHES_TO_MM - first).abs() <= UNIT_TOLERANCE_MM {
        first
    } else {
        return;
    };

    debug!(
        "GeometryParameter('{}') range [{}, {}] is one measure in two units, keeping {}",
        parameter.name(),
        first,
        second,
        millimetres
    );

    if let Err(e) = parameter.set_normalised_value(millimetres) {
        debug!("{}", e);
    }
}
