//! Number normalisation
//!
//! Raw readings arrive as free text: `"A 190,1aa$"`, `"135 - 110mm"`,
//! `"39.92 / 1014"`. A reading with a `/` or `-` between two numbers is a
//! range and becomes a list; anything else is reduced to its first number.

use super::measure::normalise_range_measure;
use bgdv_common::GeometryParameter;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+.*[/-].*[0-9]+.*").expect("range pattern is valid"));

static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?(?:(?:\d*\.\d+)|(?:\d+\.?))(?:[Ee][+-]?\d+)?").expect("number pattern is valid")
});

/// Normalise a number parameter from its original reading
///
/// On failure the parameter keeps its text form.
pub fn normalise_number(parameter: &mut GeometryParameter) {
    let original = match parameter.original_value() {
        Some(original) if !original.is_empty() => original.to_string(),
        _ => return,
    };

    if is_range(&original) {
        if normalise_range(parameter, &original) {
            normalise_range_measure(parameter);
        }
    } else {
        normalise_float(parameter, &original);
    }
}

/// Whether a reading looks like a range ("170/180", "170 - 180")
pub fn is_range(raw: &str) -> bool {
    RANGE_PATTERN.is_match(raw)
}

/// First number in the text, if any
pub fn first_number(raw: &str) -> Option<f64> {
    NUMBER_PATTERN
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Parse a scalar reading: `,` is a decimal separator, apostrophes are
/// dropped, the first number wins
pub fn parse_float(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', ".").replace('\'', "");
    first_number(&cleaned)
}

/// Parse a range reading: split on `/` and `-`, first number of each part
///
/// Fails if any part has no number.
pub fn parse_range(raw: &str) -> Option<Vec<f64>> {
    raw.replace('-', "/").split('/').map(first_number).collect()
}

/// Returns whether the parameter was updated
pub fn normalise_float(parameter: &mut GeometryParameter, raw: &str) -> bool {
    match parse_float(raw) {
        Some(value) => update(parameter, value),
        None => {
            debug!("GeometryParameter('{}') has no number in '{}'", parameter.name(), raw);
            false
        }
    }
}

/// Returns whether the parameter was updated
pub fn normalise_range(parameter: &mut GeometryParameter, raw: &str) -> bool {
    match parse_range(raw) {
        Some(values) => update(parameter, values),
        None => {
            debug!("GeometryParameter('{}') has no range in '{}'", parameter.name(), raw);
            false
        }
    }
}

fn update(parameter: &mut GeometryParameter, value: impl Into<bgdv_common::ParameterValue>) -> bool {
    match parameter.set_normalised_value(value) {
        Ok(()) => true,
        Err(e) => {
            debug!("{}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgdv_common::{ParameterType, ParameterValue};

    fn parameter(name: &str, raw: &str) -> GeometryParameter {
        GeometryParameter::new(name, Some(raw), ParameterType::Number)
    }

    #[test]
    fn test_normalise_number() {
        let mut head_tube = parameter("head_tube", "A 190.1aa$");
        normalise_number(&mut head_tube);
        assert_eq!(head_tube.value(), Some(ParameterValue::Number(190.1)));

        let mut head_angle = parameter("head_angle", "70");
        normalise_number(&mut head_angle);
        assert_eq!(head_angle.value(), Some(ParameterValue::Number(70.0)));

        let mut negative = parameter("head_tube", "A -190,1aa$");
        assert!(!is_range("A -190,1aa$"));
        normalise_number(&mut negative);
        assert_eq!(negative.value(), Some(ParameterValue::Number(-190.1)));
    }

    #[test]
    fn test_normalise_float() {
        let mut head_tube = parameter("head_tube", "A 190,1aa$");
        assert!(normalise_float(&mut head_tube, "A 190,1aa$"));
        assert_eq!(head_tube.value(), Some(ParameterValue::Number(190.1)));

        assert_eq!(parse_float("19'5"), Some(195.0));
        assert_eq!(parse_float("1.5e2 mm"), Some(150.0));
        assert_eq!(parse_float("no digits"), None);
    }

    #[test]
    fn test_normalise_range() {
        for (raw, expected) in [
            ("135/110", vec![135.0, 110.0]),
            ("135 - 110mm", vec![135.0, 110.0]),
            ("135Â°-110.2m/90.", vec![135.0, 110.2, 90.0]),
            ("135 mm / 110.2m ", vec![135.0, 110.2]),
        ] {
            assert!(is_range(raw), "{} should be a range", raw);
            let mut axle_spacing = parameter("axle_spacing", raw);
            assert!(normalise_range(&mut axle_spacing, raw));
            assert_eq!(axle_spacing.value(), Some(ParameterValue::Range(expected)));
        }
    }

    #[test]
    fn test_unparsable_values_stay_text() {
        let mut reach = parameter("reach", "n/a");
        normalise_number(&mut reach);
        assert_eq!(reach.value(), Some(ParameterValue::Text("n/a".to_string())));

        // One part of the range has no number
        assert_eq!(parse_range("135/ mm /110"), None);
        let mut axle_spacing = parameter("axle_spacing", "135/ mm /110");
        normalise_number(&mut axle_spacing);
        assert_eq!(
            axle_spacing.value(),
            Some(ParameterValue::Text("135/ mm /110".to_string()))
        );
    }
}
