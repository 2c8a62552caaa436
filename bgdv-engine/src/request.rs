//! Request envelope
//!
//! ```json
//! {
//!     "geometries": [
//!         { "parameter_list": [{ "p": "reach", "v": "371" }], "id": 1 }
//!     ],
//!     "request_id": "opaque"
//! }
//! ```
//!
//! Each geometry is replaced by its validated form, other top-level fields are
//! echoed back. Geometries are independent and validated in parallel.

use crate::normalisation::normalise_bike_geometry;
use crate::validation::{validate_bike_geometry, RootFinder};
use bgdv_common::{BikeGeometry, Error, ReferenceData, Result, TomlConfig, ValidationConfig};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Normalises and validates geometries with a fixed reference and defaults
#[derive(Debug, Clone)]
pub struct GeometryValidator {
    reference: Arc<ReferenceData>,
    defaults: ValidationConfig,
    finder: RootFinder,
}

impl Default for GeometryValidator {
    fn default() -> Self {
        Self::new(
            Arc::new(ReferenceData::builtin()),
            ValidationConfig::default(),
            RootFinder::default(),
        )
    }
}

impl GeometryValidator {
    pub fn new(reference: Arc<ReferenceData>, defaults: ValidationConfig, finder: RootFinder) -> Self {
        Self {
            reference,
            defaults,
            finder,
        }
    }

    /// Build a validator from the service configuration
    ///
    /// Loads `[reference] path` when set, the built-in tables otherwise.
    pub fn from_config(config: &TomlConfig) -> Result<Self> {
        let reference = match &config.reference.path {
            Some(path) => ReferenceData::load(path)?,
            None => ReferenceData::builtin(),
        };

        Ok(Self::new(
            Arc::new(reference),
            config.validation,
            RootFinder::new(config.solver),
        ))
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn defaults(&self) -> &ValidationConfig {
        &self.defaults
    }

    pub fn finder(&self) -> &RootFinder {
        &self.finder
    }

    /// Parse, normalise and validate one geometry
    pub fn validate_geometry(&self, dict: &Map<String, Value>) -> BikeGeometry {
        let mut geometry = BikeGeometry::from_json(dict, self.defaults, Arc::clone(&self.reference));
        normalise_bike_geometry(&mut geometry);
        validate_bike_geometry(&mut geometry, &self.finder);
        geometry
    }

    /// Validate one geometry dict and return its validated dict
    pub fn validate_bike_geometry(&self, dict: &Map<String, Value>) -> Map<String, Value> {
        self.validate_geometry(dict).to_dict(true)
    }

    /// Validate a list of geometry dicts, keeping their order
    ///
    /// An entry that is not an object validates as an empty geometry.
    pub fn validate_bike_geometry_list(&self, geometries: &[Value]) -> Vec<Value> {
        let empty = Map::new();

        geometries
            .par_iter()
            .enumerate()
            .map(|(index, entry)| {
                let dict = entry.as_object().unwrap_or_else(|| {
                    warn!("Geometry #{} is not an object, validating it as empty", index);
                    &empty
                });
                Value::Object(self.validate_bike_geometry(dict))
            })
            .collect()
    }

    /// Validate every geometry of a request envelope
    ///
    /// Fails only when `geometries` is missing or not a list.
    pub fn request_validate_bike_geometry(&self, request: Value) -> Result<Value> {
        let mut request = match request {
            Value::Object(request) => request,
            other => {
                return Err(Error::InvalidInput(format!(
                    "request must be an object, got {}",
                    type_name(&other)
                )))
            }
        };

        let validated = match request.get("geometries") {
            Some(Value::Array(geometries)) => {
                debug!("Validating {} geometries", geometries.len());
                self.validate_bike_geometry_list(geometries)
            }
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "'geometries' must be a list, got {}",
                    type_name(other)
                )))
            }
            None => return Err(Error::InvalidInput("'geometries' is missing".to_string())),
        };

        info!("Validated {} geometries", validated.len());
        request.insert("geometries".to_string(), Value::Array(validated));
        Ok(Value::Object(request))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_keeps_top_level_fields() {
        let validator = GeometryValidator::default();
        let response = validator
            .request_validate_bike_geometry(json!({
                "geometries": [{ "parameter_list": [{ "p": "reach", "v": "371" }], "id": 7 }],
                "request_id": "abc"
            }))
            .unwrap();

        assert_eq!(response["request_id"], "abc");
        assert_eq!(response["geometries"][0]["id"], 7);
        assert_eq!(response["geometries"][0]["parameter_list"][0]["p"], "reach");
    }

    #[test]
    fn test_request_without_geometries_is_rejected() {
        let validator = GeometryValidator::default();

        assert!(matches!(
            validator.request_validate_bike_geometry(json!({ "request_id": "abc" })),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            validator.request_validate_bike_geometry(json!({ "geometries": {} })),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            validator.request_validate_bike_geometry(json!([])),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_non_object_geometry_validates_as_empty() {
        let validator = GeometryValidator::default();
        let validated = validator.validate_bike_geometry_list(&[json!("not a geometry")]);

        assert_eq!(validated.len(), 1);
        assert_eq!(validated[0]["parameter_list"], json!([]));
        assert!(validated[0].get("confidence").is_none());
    }

    #[test]
    fn test_from_config_uses_solver_and_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [validation]
            parameter_threshold = 0.5

            [solver]
            grid_step = 0.25
            "#,
        )
        .unwrap();

        let validator = GeometryValidator::from_config(&config).unwrap();
        assert_eq!(validator.defaults().parameter_threshold, 0.5);
        assert_eq!(validator.finder().settings().grid_step, 0.25);
        assert!(validator.reference().is_known("reach"));
    }
}
