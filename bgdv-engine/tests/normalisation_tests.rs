//! Normalisation of raw readings, end to end through the geometry dict

mod helpers;

use bgdv_common::{GeometryParameter, ParameterValue, ReferenceData, ValidationConfig};
use bgdv_engine::normalisation::{normalise_bike_geometry, normalise_parameter};
use helpers::geometry;
use serde_json::{json, Map, Value};

fn normalised(name: &str, raw: &str) -> Option<ParameterValue> {
    let mut bike = geometry(&[(name, raw)], ValidationConfig::default());
    normalise_bike_geometry(&mut bike);
    bike.get_parameter_value(name)
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn test_scalar_readings() {
    assert_eq!(normalised("head_tube", "A 190.1aa$"), Some(ParameterValue::Number(190.1)));
    assert_eq!(normalised("head_tube", "A 190,1aa$"), Some(ParameterValue::Number(190.1)));
    assert_eq!(normalised("head_tube", "A -190,1aa$"), Some(ParameterValue::Number(-190.1)));
    assert_eq!(normalised("head_angle", "70"), Some(ParameterValue::Number(70.0)));
    assert_eq!(normalised("seat_angle", "73.5°"), Some(ParameterValue::Number(73.5)));
}

// ============================================================================
// Ranges
// ============================================================================

#[test]
fn test_range_readings() {
    assert_eq!(
        normalised("axle_spacing", "135/110"),
        Some(ParameterValue::Range(vec![135.0, 110.0]))
    );
    assert_eq!(
        normalised("axle_spacing", "135 - 110mm"),
        Some(ParameterValue::Range(vec![135.0, 110.0]))
    );
    assert_eq!(
        normalised("axle_spacing", "135Â°-110.2m/90."),
        Some(ParameterValue::Range(vec![135.0, 110.2, 90.0]))
    );
    assert_eq!(
        normalised("axle_spacing", "135 mm / 110.2m "),
        Some(ParameterValue::Range(vec![135.0, 110.2]))
    );
}

#[test]
fn test_inches_and_millimetres_collapse() {
    assert_eq!(normalised("wheelbase", "39.92 / 1014"), Some(ParameterValue::Number(1014.0)));
    assert_eq!(normalised("stack", "20.98 / 533"), Some(ParameterValue::Number(533.0)));
}

// ============================================================================
// Text
// ============================================================================

#[test]
fn test_text_parameters_are_untouched() {
    assert_eq!(
        normalised("slug", "bike-135/110"),
        Some(ParameterValue::Text("bike-135/110".to_string()))
    );
    assert_eq!(
        normalised("reach", "unknown"),
        Some(ParameterValue::Text("unknown".to_string()))
    );
}

#[test]
fn test_empty_parameter_round_trips() {
    let reference = ReferenceData::builtin();
    let dict: Map<String, Value> = json!({ "p": "head_tube", "v": "" })
        .as_object()
        .cloned()
        .unwrap();

    let mut parameter = GeometryParameter::from_dict(&dict, &reference).unwrap();
    normalise_parameter(&mut parameter);

    assert_eq!(parameter.to_dict(true), dict);
}

#[test]
fn test_normalised_dict() {
    let mut bike = geometry(&[("head_angle", "70"), ("axle_spacing", "135/110")], ValidationConfig::default());
    normalise_bike_geometry(&mut bike);

    let dict = bike.to_dict(true);
    assert_eq!(
        dict["parameter_list"],
        json!([
            { "p": "axle_spacing", "original_v": "135/110", "v": "[135, 110]" },
            { "p": "head_angle", "v": "70" }
        ])
    );
}
