//! HTTP handlers

pub mod health;
pub mod validation;

pub use health::health_routes;
pub use validation::validation_routes;
