//! # BGDV Common Library
//!
//! Shared code for the bike geometry data validation service:
//! - Error taxonomy
//! - Configuration loading (TOML bootstrap, validation defaults, solver settings)
//! - Reference data (parameter vocabulary, statistics, constraints)
//! - Data model (`GeometryParameter`, `BikeGeometry`)

pub mod config;
pub mod error;
pub mod geometry;
pub mod parameter;
pub mod reference;

pub use config::{SolverSettings, TomlConfig, ValidationConfig};
pub use error::{Error, Result};
pub use geometry::{BikeGeometry, ConfidenceScore};
pub use parameter::{GeometryParameter, ParameterValue};
pub use reference::{ParameterType, ReferenceData};
