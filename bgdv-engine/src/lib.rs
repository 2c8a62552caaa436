//! bgdv-engine - bike geometry normalisation and validation
//!
//! A geometry goes through two steps:
//!
//! 1. [`normalisation`] turns raw readings into numbers and ranges.
//! 2. [`validation`] derives missing parameters from the geometry equations
//!    and scores every parameter against what the others imply.
//!
//! [`GeometryValidator`] runs both over the JSON request envelope.

pub mod normalisation;
pub mod request;
pub mod validation;

pub use normalisation::normalise_bike_geometry;
pub use request::GeometryValidator;
pub use validation::{validate_bike_geometry, RootFinder};
