//! Common error types for BGDV

use thiserror::Error;

/// Common result type for BGDV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the BGDV crates
///
/// None of these reach the caller of a validation request: the engine catches
/// them at the parameter or equation level and degrades confidence instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML file could not be parsed
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Value could not be cast to the declared type of a parameter
    #[error("Cannot cast value '{value}' of GeometryParameter('{parameter}')")]
    TypeCast { parameter: String, value: String },

    /// Parameter name outside the known vocabulary
    #[error("Unknown GeometryParameter('{0}')")]
    UnknownParameter(String),

    /// Parameter entry without the mandatory `p`/`v` fields
    #[error("Malformed parameter entry: {0}")]
    MalformedParameter(String),

    /// Equation template could not be parsed or substituted
    #[error("Expression error: {0}")]
    Expression(String),

    /// Invalid user input or request structure
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build a `TypeCast` error from anything displayable
    pub fn type_cast(parameter: &str, value: impl std::fmt::Display) -> Self {
        Error::TypeCast {
            parameter: parameter.to_string(),
            value: value.to_string(),
        }
    }
}
