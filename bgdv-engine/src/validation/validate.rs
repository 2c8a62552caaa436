//! Validation orchestrator
//!
//! Validating a geometry runs two phases and modifies it in place:
//!
//! **Derivation.** Missing validatable parameters, plus number parameters that
//! look invalid, are calculated from the equations. Each newly derived value
//! can unlock further equations, so the pass repeats until the number of
//! missing parameters stops changing.
//!
//! **Scoring.** Every number parameter the derivation left untouched is solved
//! for again using everything else; the root closest to its reading becomes
//! its calculated value and the similarity of the two its confidence.
//! Parameters no equation covers are scored on their deviation from the
//! statistics instead.
//!
//! After validation, [`BikeGeometry::get_confidence_score`] gives the score of
//! the whole geometry.

use super::constraints::{check_parameter_constraints, get_parameter_deviation};
use super::equations::{get_equations, solve_equation};
use super::roots::RootFinder;
use super::similarity::{similarity_to, RangeReduction};
use bgdv_common::{BikeGeometry, GeometryParameter, ParameterValue};
use tracing::{debug, info, warn};

/// Validate a geometry in place
pub fn validate_bike_geometry(geometry: &mut BikeGeometry, finder: &RootFinder) {
    // The missing count never grows, so this terminates
    loop {
        let missing = geometry.get_missing_parameter_list().len();
        calculate_missing_parameters(geometry, finder, true);
        if geometry.get_missing_parameter_list().len() == missing {
            break;
        }
    }

    let names: Vec<String> = geometry
        .get_parameter_list(true)
        .iter()
        .map(|parameter| parameter.name().to_string())
        .collect();

    for name in names {
        validate_geometry_parameter(&name, geometry, finder);
    }

    info!("BikeGeometry validated");
}

/// Score one parameter against the rest of the geometry
///
/// Skips text parameters and parameters that already have a calculated value.
pub fn validate_geometry_parameter(name: &str, geometry: &mut BikeGeometry, finder: &RootFinder) {
    match geometry.get_parameter(name) {
        Some(parameter) if parameter.is_number() && parameter.calculated_value().is_none() => {}
        _ => return,
    }

    let equations = {
        let known = geometry.get_parameter_list(true);
        get_equations(name, Some(known.as_slice()))
    };

    if equations.is_empty() {
        // No maths available: fall back on the statistics
        set_confidence_from_deviation(name, geometry);
        return;
    }

    for formula in equations {
        let roots = solve_equation(formula, name, geometry, finder, true);
        if roots.is_empty() {
            set_confidence_from_deviation(name, geometry);
            continue;
        }

        let parameter = match geometry.get_parameter_mut(name) {
            Some(parameter) => parameter,
            None => return,
        };

        if parameter.calculated_value().is_some() {
            break;
        }

        if parameter.value().is_none() {
            set_calculated_value(parameter, ParameterValue::Range(roots), true);
            continue;
        }

        score_against_roots(parameter, &roots);
    }
}

/// Pick the root closest to the reading and score the parameter with the
/// mean similarity over every (reading, root) pair
fn score_against_roots(parameter: &mut GeometryParameter, roots: &[f64]) {
    let readings = parameter
        .normalised_value()
        .and_then(|value| value.numbers())
        .unwrap_or_default();

    let scored: Vec<(f64, f64)> = readings
        .iter()
        .flat_map(|reading| {
            roots.iter().filter_map(move |root| {
                similarity_to(*reading, &ParameterValue::Number(*root), RangeReduction::Min)
                    .map(|similarity| (similarity, *root))
            })
        })
        .collect();

    let best = scored.iter().copied().fold(None, |best: Option<(f64, f64)>, candidate| {
        match best {
            Some(current) if current.0 >= candidate.0 => Some(current),
            _ => Some(candidate),
        }
    });

    if let Some((_, root)) = best {
        let mean = scored.iter().map(|(similarity, _)| similarity).sum::<f64>() / scored.len() as f64;
        parameter.set_confidence(mean, false);
        set_calculated_value(parameter, ParameterValue::Number(root), false);
    }
}

/// Calculate every missing validatable parameter, and optionally every
/// invalid number parameter
pub fn calculate_missing_parameters(
    geometry: &mut BikeGeometry,
    finder: &RootFinder,
    include_invalid: bool,
) {
    let mut names = geometry.get_missing_parameter_list();
    if include_invalid {
        names.extend(get_invalid_parameters(geometry));
    }

    for name in names {
        calculate_parameter(&name, geometry, finder);
    }
}

/// Derive a parameter from the equations
///
/// Creates the parameter when the geometry lacks it. A parameter that already
/// has a calculated value is left alone. Its statistical confidence is set
/// first so it keeps a score even when no equation helps.
pub fn calculate_parameter(name: &str, geometry: &mut BikeGeometry, finder: &RootFinder) {
    match geometry.get_parameter(name) {
        Some(parameter) if parameter.calculated_value().is_some() => return,
        Some(_) => {}
        None => {
            let parameter = GeometryParameter::with_reference(name, None, geometry.reference());
            if let Err(e) = geometry.set_parameter(parameter) {
                warn!("Cannot calculate GeometryParameter('{}'): {}", name, e);
                return;
            }
        }
    }

    set_confidence_from_deviation(name, geometry);

    let equations = {
        let known = geometry.get_parameter_list(true);
        get_equations(name, Some(known.as_slice()))
    };

    for formula in equations {
        let roots = solve_equation(formula, name, geometry, finder, true);
        if roots.is_empty() {
            continue;
        }

        if let Some(parameter) = geometry.get_parameter_mut(name) {
            set_calculated_value(parameter, ParameterValue::Range(roots), true);
            if parameter.calculated_value().is_some() {
                break;
            }
        }
    }
}

/// Names of the number parameters that are currently invalid
pub fn get_invalid_parameters(geometry: &BikeGeometry) -> Vec<String> {
    geometry
        .get_parameter_list(true)
        .into_iter()
        .filter(|parameter| parameter.is_number() && is_parameter_invalid(parameter, geometry))
        .map(|parameter| parameter.name().to_string())
        .collect()
}

/// A parameter is invalid when it breaks its constraints (and is the likely
/// culprit) or its confidence is below the parameter threshold
pub fn is_parameter_invalid(parameter: &GeometryParameter, geometry: &BikeGeometry) -> bool {
    let below_threshold = parameter
        .confidence()
        .map_or(false, |confidence| confidence < geometry.config().parameter_threshold);

    !check_parameter_constraints(parameter.name(), geometry) || below_threshold
}

fn set_confidence_from_deviation(name: &str, geometry: &mut BikeGeometry) {
    let confidence = geometry
        .get_parameter(name)
        .and_then(|parameter| get_parameter_deviation(parameter, geometry.reference(), true));

    if let (Some(confidence), Some(parameter)) = (confidence, geometry.get_parameter_mut(name)) {
        debug!(
            "GeometryParameter('{}') confidence from statistics: {}",
            name, confidence
        );
        parameter.set_confidence(confidence, false);
    }
}

fn set_calculated_value(parameter: &mut GeometryParameter, value: ParameterValue, change_confidence: bool) {
    if let Err(e) = parameter.set_calculated_value(value, change_confidence) {
        warn!("{}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgdv_common::ReferenceData;
    use std::sync::Arc;

    fn geometry(values: &[(&str, &str)]) -> BikeGeometry {
        BikeGeometry::from_parameter_map(
            values.iter().copied(),
            Arc::new(ReferenceData::builtin()),
        )
    }

    #[test]
    fn test_calculate_missing_parameter() {
        let mut bike = geometry(&[("stack", "500"), ("reach", "400"), ("seat_angle", "73")]);
        let finder = RootFinder::default();

        calculate_parameter("top_tube", &mut bike, &finder);

        let top_tube = bike.get_parameter("top_tube").unwrap();
        let expected = 400.0 + 500.0 * 17.0f64.to_radians().tan();
        let calculated = top_tube.calculated_value().unwrap().as_number().unwrap();
        assert!((calculated - expected).abs() < 1e-6);
        // Calculated from nothing: default confidence, since nothing can be compared
        assert_eq!(top_tube.confidence(), Some(0.75));
    }

    #[test]
    fn test_calculate_parameter_skips_calculated() {
        let mut bike = geometry(&[("stack", "500"), ("reach", "400"), ("seat_angle", "73")]);
        let finder = RootFinder::default();

        let mut top_tube = GeometryParameter::with_reference("top_tube", None, bike.reference());
        top_tube.set_calculated_value(1.0, false).unwrap();
        bike.set_parameter(top_tube).unwrap();

        calculate_parameter("top_tube", &mut bike, &finder);
        assert_eq!(bike.get_parameter_value("top_tube"), Some(ParameterValue::Number(1.0)));
        assert_eq!(bike.get_parameter("top_tube").unwrap().confidence(), None);
    }

    #[test]
    fn test_invalid_parameters() {
        let mut bike = geometry(&[("chainstay", "425"), ("wheelbase", "100"), ("front_centre", "600")]);
        assert_eq!(get_invalid_parameters(&bike), vec!["wheelbase".to_string()]);

        bike.get_parameter_mut("front_centre").unwrap().set_confidence(0.1, false);
        assert_eq!(
            get_invalid_parameters(&bike),
            vec!["front_centre".to_string(), "wheelbase".to_string()]
        );
    }

    #[test]
    fn test_score_against_roots() {
        let mut parameter = GeometryParameter::new("reach", Some("400"), bgdv_common::ParameterType::Number);
        score_against_roots(&mut parameter, &[200.0, 390.0]);

        assert_eq!(parameter.calculated_value(), Some(&ParameterValue::Number(390.0)));
        let expected = (0.5 + 390.0 / 400.0) / 2.0;
        assert!((parameter.confidence().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_score_against_range_reading() {
        let mut parameter = GeometryParameter::new("reach", None, bgdv_common::ParameterType::Number);
        parameter.set_normalised_value(vec![400.0, 380.0]).unwrap();
        score_against_roots(&mut parameter, &[385.0]);

        assert_eq!(parameter.calculated_value(), Some(&ParameterValue::Number(385.0)));
        let expected = (385.0 / 400.0 + 380.0 / 385.0) / 2.0;
        assert!((parameter.confidence().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_text_reading_is_not_scored() {
        let mut parameter = GeometryParameter::new("reach", Some("about four hundred"), bgdv_common::ParameterType::Number);
        score_against_roots(&mut parameter, &[400.0]);

        assert_eq!(parameter.calculated_value(), None);
        assert_eq!(parameter.confidence(), None);
    }
}
