//! Equation selection and solving
//!
//! Solving is read-only on the geometry: every referenced parameter except the
//! target is bound to its current value, and the resulting one-variable
//! equation goes to the [`RootFinder`]. Nonlinear equations can yield several
//! roots (`SQRT` terms), which the constraints then narrow down.

use super::constraints::filter_by_constraints;
use super::formulae::{formulae, Formula};
use super::roots::RootFinder;
use bgdv_common::{BikeGeometry, GeometryParameter};
use tracing::{debug, error};

/// Equations that can be solved for `name`
///
/// An equation qualifies when it references `name` exactly once. With a
/// `filter_by` list of non-empty parameters, only equations whose other
/// parameters are (almost) all known are kept, see [`filter_equations`].
pub fn get_equations(name: &str, filter_by: Option<&[&GeometryParameter]>) -> Vec<&'static Formula> {
    let equations: Vec<&'static Formula> = formulae()
        .iter()
        .filter(|formula| formula.references(name) && formula.expr.occurrences(name) == 1)
        .collect();

    match filter_by {
        Some(known) => filter_equations(equations, known, Some(name)),
        None => equations,
    }
}

/// Keep equations whose parameters are covered by `filter_by`
///
/// An equation is kept when the number of its parameters found among the
/// known ones (excluding `name`) is at least its parameter count minus one.
/// An empty `filter_by` keeps every equation.
pub fn filter_equations<'a>(
    equations: Vec<&'a Formula>,
    filter_by: &[&GeometryParameter],
    name: Option<&str>,
) -> Vec<&'a Formula> {
    if equations.is_empty() || filter_by.is_empty() {
        return equations;
    }

    let known: Vec<&str> = filter_by
        .iter()
        .filter(|parameter| parameter.value().is_some())
        .map(|parameter| parameter.name())
        .filter(|known| Some(*known) != name)
        .collect();

    equations
        .into_iter()
        .filter(|formula| {
            let covered = known.iter().filter(|known| formula.references(known)).count();
            covered + 1 >= formula.parameters.len()
        })
        .collect()
}

/// Solve `formula` for `target` using the current values of `geometry`
///
/// Ranges contribute their first element. A parameter without a numeric value
/// makes the equation unsolvable, which is logged and yields no roots. With
/// `force_constraints`, roots violating the constraints of `target` are
/// dropped.
pub fn solve_equation(
    formula: &Formula,
    target: &str,
    geometry: &BikeGeometry,
    finder: &RootFinder,
    force_constraints: bool,
) -> Vec<f64> {
    let lookup = |name: &str| {
        geometry
            .get_parameter_value(name)
            .and_then(|value| value.first_number())
    };

    let roots = match formula.expr.bind(target, &lookup) {
        Ok(bound) => {
            let domain = geometry.reference().solve_domain(target);
            let roots = finder.find_roots(|x| bound.eval(x), domain);
            debug!("Solved '{}' for '{}' = {:?}", bound, target, roots);
            roots
        }
        Err(e) => {
            error!(
                "There was an error solving the following equation for '{}': {}: {}",
                target, formula.equation, e
            );
            Vec::new()
        }
    };

    if force_constraints {
        filter_by_constraints(roots, target, geometry)
    } else {
        roots
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

    fn equations_of(name: &str) -> Vec<&'static str> {
        get_equations(name, None).iter().map(|f| f.equation).collect()
    }

    #[test]
    fn test_get_equations() {
        assert_eq!(equations_of("stack").len(), 5);
        assert_eq!(equations_of("chainstay").len(), 1);
        assert_eq!(equations_of("head_tube").len(), 1);
        assert!(equations_of("year").is_empty());

        // bb_drop appears twice in two equations and once in the third
        assert_eq!(equations_of("bb_drop").len(), 1);
        assert!(equations_of("bb_drop")[0].starts_with("SIN"));
        // head_angle appears twice in the stack equation
        assert_eq!(equations_of("head_angle").len(), 1);
        assert!(equations_of("head_angle")[0].starts_with("(ATAN2"));
    }

    #[test]
    fn test_filter_equations() {
        let bike = geometry(&[("stack", "500"), ("reach", "400"), ("seat_angle", "73")]);
        let known = bike.get_parameter_list(true);

        // Every parameter but the target must be known
        let equations = get_equations("top_tube", Some(known.as_slice()));
        assert_eq!(equations.len(), 1);
        assert!(equations[0].equation.starts_with("{top_tube} - {stack}"));

        let bike = geometry(&[("stack", "500"), ("reach", "400")]);
        let known = bike.get_parameter_list(true);
        assert!(get_equations("top_tube", Some(known.as_slice())).is_empty());

        // Nothing is known: filtering is skipped
        let empty = geometry(&[]);
        let known = empty.get_parameter_list(true);
        assert_eq!(get_equations("top_tube", Some(known.as_slice())).len(), 2);
    }

    #[test]
    fn test_solve_linear_equation() {
        let bike = geometry(&[("stack", "500"), ("reach", "400"), ("seat_angle", "73")]);
        let formula = get_equations("top_tube", None)[0];
        let finder = RootFinder::default();

        let roots = solve_equation(formula, "top_tube", &bike, &finder, true);
        let expected = 400.0 + 500.0 * (17.0f64 / 180.0 * std::f64::consts::PI).tan();
        assert_eq!(roots.len(), 1);
        assert!((roots[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_solve_for_angle() {
        let bike = geometry(&[("stack", "500"), ("seat_tube_length_eff", "522.85")]);
        let formula = get_equations("seat_angle", None)
            .into_iter()
            .find(|f| f.equation.starts_with("{stack} / COS"))
            .unwrap();
        let finder = RootFinder::default();

        // cos(90 - a) = 500 / 522.85 has a root either side of 90°
        let roots = solve_equation(formula, "seat_angle", &bike, &finder, true);
        let a = 90.0 - (500.0f64 / 522.85).acos().to_degrees();
        assert_eq!(roots.len(), 2);
        assert!((roots[0] - a).abs() < 1e-6);
        assert!((roots[1] - (180.0 - a)).abs() < 1e-6);
    }

    #[test]
    fn test_solve_with_multiple_roots_and_constraints() {
        // chainstay^2 = bb^2 + (wb - sqrt(fc^2 - bb^2))^2, solved for wheelbase
        let bike = geometry(&[("bb_drop", "70"), ("chainstay", "425"), ("front_centre", "683")]);
        let formula = get_equations("wheelbase", None)[0];
        let finder = RootFinder::default();

        let horizontal_front = (683.0f64.powi(2) - 70.0f64.powi(2)).sqrt();
        let horizontal_rear = (425.0f64.powi(2) - 70.0f64.powi(2)).sqrt();

        let all = solve_equation(formula, "wheelbase", &bike, &finder, false);
        assert_eq!(all.len(), 2);
        assert!((all[0] - (horizontal_front - horizontal_rear)).abs() < 1e-6);
        assert!((all[1] - (horizontal_front + horizontal_rear)).abs() < 1e-6);

        // wheelbase must exceed chainstay and front_centre
        let filtered = solve_equation(formula, "wheelbase", &bike, &finder, true);
        assert_eq!(filtered.len(), 1);
        assert!((filtered[0] - (horizontal_front + horizontal_rear)).abs() < 1e-6);
    }

    #[test]
    fn test_unsolvable_equation_yields_no_roots() {
        let bike = geometry(&[("stack", "not a number"), ("reach", "400")]);
        let formula = get_equations("top_tube", None)[0];
        let finder = RootFinder::default();

        assert!(solve_equation(formula, "top_tube", &bike, &finder, true).is_empty());
    }

    #[test]
    fn test_range_uses_first_element() {
        let mut bike = geometry(&[("stack", "500"), ("reach", "400"), ("seat_angle", "73")]);
        bike.get_parameter_mut("stack")
            .unwrap()
            .set_normalised_value(vec![500.0, 520.0])
            .unwrap();

        let formula = get_equations("top_tube", None)[0];
        let roots = solve_equation(formula, "top_tube", &bike, &RootFinder::default(), false);
        let expected = 400.0 + 500.0 * (17.0f64.to_radians()).tan();
        assert!((roots[0] - expected).abs() < 1e-6);
    }
}
