//! Geometry constraints and statistics
//!
//! Constraints are inequalities between parameters (`chainstay < wheelbase`).
//! When a value breaks one, the statistics decide who is to blame: the
//! parameter that deviates most from its reference mean/median is the likely
//! culprit.
//!
//! Deviation runs from 0 (right on the reference values) to 1 (nowhere near
//! them); confidence derived from it is `1 - deviation`.

use super::similarity::{similarity_to, RangeReduction};
use bgdv_common::reference::Constraint;
use bgdv_common::{BikeGeometry, GeometryParameter, ParameterValue, ReferenceData};
use tracing::debug;

/// Keep the values that satisfy every constraint registered for `name`
///
/// Used to discard impossible roots. Unconstrained parameters keep every
/// value.
pub fn filter_by_constraints(values: Vec<f64>, name: &str, geometry: &BikeGeometry) -> Vec<f64> {
    let constraints = match geometry.reference().constraints(name) {
        Some(constraints) => constraints,
        None => return values,
    };

    let filtered: Vec<f64> = values
        .iter()
        .copied()
        .filter(|value| check_constraint_list(*value, constraints, geometry))
        .collect();

    debug!(
        "GeometryParameter('{}') - list of values {:?} filtered to {:?} with geometry constraints",
        name, values, filtered
    );

    filtered
}

/// Whether the current value of `name` satisfies its constraints
///
/// A value breaking a constraint still passes when another parameter of the
/// constraint deviates further from the statistics than this one. Every
/// element of a range must pass. Text and empty values have nothing to
/// disprove and pass.
pub fn check_parameter_constraints(name: &str, geometry: &BikeGeometry) -> bool {
    let constraints = match geometry.reference().constraints(name) {
        Some(constraints) => constraints,
        None => return true,
    };

    let values = match geometry.get_parameter_value(name).and_then(|v| v.numbers()) {
        Some(values) => values,
        None => return true,
    };

    let satisfied = values.iter().all(|value| {
        check_constraint_list(*value, constraints, geometry)
            || check_constraint_statistics(name, *value, geometry)
    });

    debug!(
        "GeometryParameter('{}') {} the geometry constraints",
        name,
        if satisfied { "satisfies" } else { "does NOT satisfy" }
    );

    satisfied
}

/// Deviation of a parameter from the statistics
///
/// `None` when the parameter is unconstrained, has no statistics or no
/// numeric value. With `invert` the result is `1 - deviation`, usable as a
/// confidence.
pub fn get_parameter_deviation(
    parameter: &GeometryParameter,
    reference: &ReferenceData,
    invert: bool,
) -> Option<f64> {
    if !reference.is_constrained(parameter.name()) {
        return None;
    }

    let value = parameter.value()?;
    let deviation = deviation(reference, parameter.name(), &value)?;
    debug!(
        "GeometryParameter('{}') has a deviation of {} from statistics (0 - 1)",
        parameter.name(),
        deviation
    );

    Some(if invert { 1.0 - deviation } else { deviation })
}

/// `1 - mean(similarity(value, mean), similarity(value, median))`
///
/// A range averages the similarity of its elements.
pub fn deviation(reference: &ReferenceData, name: &str, value: &ParameterValue) -> Option<f64> {
    let statistics = reference.statistics(name)?;
    let to_mean = similarity_to(statistics.mean, value, RangeReduction::Mean)?;
    let to_median = similarity_to(statistics.median, value, RangeReduction::Mean)?;
    Some(1.0 - (to_mean + to_median) / 2.0)
}

fn check_constraint_list(value: f64, constraints: &[Constraint], geometry: &BikeGeometry) -> bool {
    constraints
        .iter()
        .all(|constraint| check_constraint(value, constraint, geometry))
}

/// `value <op> other` for every element of the other parameter
///
/// An empty or text other parameter cannot disprove the constraint.
fn check_constraint(value: f64, constraint: &Constraint, geometry: &BikeGeometry) -> bool {
    match geometry
        .get_parameter_value(&constraint.other)
        .and_then(|v| v.numbers())
    {
        Some(others) => others
            .iter()
            .all(|other| constraint.operator.holds(value, *other)),
        None => true,
    }
}

/// Whether another parameter of the constraints deviates more than `value`
///
/// Only meaningful once the constraint check itself failed.
fn check_constraint_statistics(name: &str, value: f64, geometry: &BikeGeometry) -> bool {
    let reference = geometry.reference();
    let own = match deviation(reference, name, &ParameterValue::Number(value)) {
        Some(own) => own,
        None => return false,
    };

    let worst_other = reference
        .constraints(name)
        .unwrap_or_default()
        .iter()
        .filter_map(|constraint| {
            let other = geometry.get_parameter_value(&constraint.other)?;
            deviation(reference, &constraint.other, &other)
        })
        .fold(None, |worst: Option<f64>, d| Some(worst.map_or(d, |w| w.max(d))));

    match worst_other {
        Some(worst) => worst > own,
        None => false,
    }
}
