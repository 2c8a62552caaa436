//! Equation catalog
//!
//! The mathematical model of a bike frame. Each template is an expression
//! equal to zero; the solver rearranges it numerically for whichever
//! parameter it needs, so a relationship is written once.
//!
//! Every extra equation multiplies the work done per geometry (equations ×
//! candidate roots), so prefer tangents and `ATAN2` over inverse sines or
//! cosines and do not add derived forms of equations already listed.

use super::expression::Expr;
use once_cell::sync::Lazy;
use tracing::error;

const VALIDATION_FORMULAE: &[&str] = &[
    "{top_tube} - {stack} * TAN((90 - {seat_angle}) / 180 * PI) - {reach}",
    "SQRT( {bb_drop}^2 + ({wheelbase} - SQRT( {front_centre}^2 - {bb_drop}^2 ))^2 ) - {chainstay}",
    "SQRT({seat_tube_length_eff}^2 - {stack}^2) + {reach} - {top_tube}",
    "SIN({head_angle} / 180 * PI) * ({head_tube} + {fork_length} - {fork_rake} * COS({head_angle} / 180 * PI)) + {bb_drop} - {stack}",
    "{stack} / COS((90 - {seat_angle}) / 180 * PI) - {seat_tube_length_eff}",
    "(ATAN2( ( {stack} - {bb_drop} ) , ( SQRT( {front_centre}^2 - {bb_drop}^2 ) - {reach} - {fork_rake} ) ) * 180 / PI) - {head_angle}",
];

/// A parsed equation template
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub equation: &'static str,
    pub expr: Expr,
    /// Distinct parameters referenced by the equation
    pub parameters: Vec<String>,
}

impl Formula {
    pub fn references(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p == name)
    }
}

static FORMULAE: Lazy<Vec<Formula>> = Lazy::new(|| {
    VALIDATION_FORMULAE
        .iter()
        .copied()
        .filter_map(|equation| match Expr::parse(equation) {
            Ok(expr) => Some(Formula {
                equation,
                parameters: expr.parameters(),
                expr,
            }),
            Err(e) => {
                error!("Equation '{}' could not be parsed, skipping it: {}", equation, e);
                None
            }
        })
        .collect()
});

/// The equation catalog, parsed on first use
pub fn formulae() -> &'static [Formula] {
    &FORMULAE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_equation_parses() {
        assert_eq!(formulae().len(), VALIDATION_FORMULAE.len());
    }

    #[test]
    fn test_formula_parameters() {
        let chainstay = &formulae()[1];
        assert_eq!(
            chainstay.parameters,
            vec!["bb_drop", "wheelbase", "front_centre", "chainstay"]
        );
        assert!(chainstay.references("wheelbase"));
        assert!(!chainstay.references("reach"));

        let seat_tube = &formulae()[4];
        assert_eq!(seat_tube.parameters, vec!["stack", "seat_angle", "seat_tube_length_eff"]);
    }

    #[test]
    fn test_equations_hold_for_a_consistent_frame() {
        // Frame built from the equations themselves (mm, degrees)
        let stack = 576.6137f64;
        let reach = 400.0;
        let seat_angle = 73.0f64;
        let top_tube = reach + stack * (17.0f64.to_radians()).tan();

        let lookup = |name: &str| match name {
            "stack" => Some(stack),
            "reach" => Some(reach),
            "seat_angle" => Some(seat_angle),
            _ => None,
        };

        let bound = formulae()[0].expr.bind("top_tube", &lookup).unwrap();
        assert!(bound.eval(top_tube).abs() < 1e-9);
    }
}
