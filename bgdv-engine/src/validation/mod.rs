//! Validation of bike geometries
//!
//! - `expression`: equation template parsing and evaluation
//! - `formulae`: the equation catalog
//! - `roots`: numeric real-root finder
//! - `similarity`: closeness of two values
//! - `constraints`: inequality constraints and deviation from statistics
//! - `equations`: equation selection and solving
//! - `validate`: the two-phase orchestrator

pub mod constraints;
pub mod equations;
pub mod expression;
pub mod formulae;
pub mod roots;
pub mod similarity;
pub mod validate;

pub use constraints::{check_parameter_constraints, filter_by_constraints, get_parameter_deviation};
pub use equations::{get_equations, solve_equation};
pub use roots::RootFinder;
pub use validate::{
    calculate_missing_parameters, calculate_parameter, get_invalid_parameters, is_parameter_invalid,
    validate_bike_geometry, validate_geometry_parameter,
};
