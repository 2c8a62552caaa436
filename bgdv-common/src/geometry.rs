//! Bike geometry record
//!
//! A `BikeGeometry` maps names from the reference vocabulary to at most one
//! [`GeometryParameter`] each, together with the per-geometry
//! [`ValidationConfig`] and any top-level fields the caller sent along (an
//! external id for instance), which are echoed back untouched.
//!
//! Input format:
//! ```json
//! {
//!     "parameter_list": [
//!         { "p": "reach", "v": "371", "id": "any-value" },
//!         { "p": "stack", "v": "533", "id": "any-value" }
//!     ],
//!     "parameter_threshold": 0.6,
//!     "id": "external-id"
//! }
//! ```

use crate::config::{ValidationConfig, VALIDATION_CONFIG_KEYS};
use crate::parameter::{GeometryParameter, ParameterValue};
use crate::reference::ReferenceData;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Aggregate confidence of a geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceScore {
    /// Score in 0..=1
    pub score: f64,
    /// Number parameters that contributed a confidence
    pub validated: usize,
}

/// One bike geometry and its parameters
#[derive(Debug, Clone)]
pub struct BikeGeometry {
    parameters: IndexMap<String, GeometryParameter>,
    config: ValidationConfig,
    extra_values: Map<String, Value>,
    reference: Arc<ReferenceData>,
}

impl BikeGeometry {
    /// Empty geometry with the given config
    pub fn new(config: ValidationConfig, reference: Arc<ReferenceData>) -> Self {
        Self {
            parameters: IndexMap::new(),
            config,
            extra_values: Map::new(),
            reference,
        }
    }

    /// Build a geometry from its JSON form
    ///
    /// `defaults` supplies the config values the dict does not override.
    /// Unknown parameter names and entries without `p`/`v` are dropped with a
    /// warning.
    pub fn from_json(
        dict: &Map<String, Value>,
        defaults: ValidationConfig,
        reference: Arc<ReferenceData>,
    ) -> Self {
        let mut geometry = Self::new(defaults.with_overrides(dict), reference);

        for (key, value) in dict {
            if key == "parameter_list" {
                geometry.set_parameters(value);
            } else if !VALIDATION_CONFIG_KEYS.contains(&key.as_str()) {
                geometry.extra_values.insert(key.clone(), value.clone());
            }
        }

        geometry
    }

    /// Build a geometry from a flat `name -> value` map
    ///
    /// ```ignore
    /// let bike = BikeGeometry::from_parameter_map([("reach", "371"), ("stack", "533")], reference);
    /// ```
    pub fn from_parameter_map<K, V>(
        map: impl IntoIterator<Item = (K, V)>,
        reference: Arc<ReferenceData>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let parameter_list: Vec<Value> = map
            .into_iter()
            .map(|(name, value)| {
                let mut entry = Map::new();
                entry.insert("p".to_string(), Value::String(name.into()));
                entry.insert("v".to_string(), value.into());
                Value::Object(entry)
            })
            .collect();

        let mut dict = Map::new();
        dict.insert("parameter_list".to_string(), Value::Array(parameter_list));
        Self::from_json(&dict, ValidationConfig::default(), reference)
    }

    fn set_parameters(&mut self, list: &Value) {
        let entries = match list.as_array() {
            Some(entries) => entries,
            None => {
                warn!("'parameter_list' is not a list, ignoring it");
                return;
            }
        };

        for entry in entries {
            let parameter = match entry.as_object() {
                Some(dict) => GeometryParameter::from_dict(dict, &self.reference),
                None => Err(Error::MalformedParameter(entry.to_string())),
            };

            match parameter {
                Ok(parameter) => {
                    if let Err(e) = self.set_parameter(parameter) {
                        warn!("{}, ignoring it", e);
                    }
                }
                Err(e) => warn!("{}, ignoring it", e),
            }
        }
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn extra_values(&self) -> &Map<String, Value> {
        &self.extra_values
    }

    /// Parameter by name, `None` if it was never set
    pub fn get_parameter(&self, name: &str) -> Option<&GeometryParameter> {
        self.parameters.get(name)
    }

    pub fn get_parameter_mut(&mut self, name: &str) -> Option<&mut GeometryParameter> {
        self.parameters.get_mut(name)
    }

    /// Effective value of a parameter, `None` if unset or empty
    pub fn get_parameter_value(&self, name: &str) -> Option<ParameterValue> {
        match self.parameters.get(name) {
            Some(parameter) => parameter.value(),
            None => {
                if !self.reference.is_known(name) {
                    warn!(
                        "Trying to retrieve unknown GeometryParameter('{}'), defaulting to None",
                        name
                    );
                } else {
                    debug!("GeometryParameter('{}') empty, defaulting to None", name);
                }
                None
            }
        }
    }

    /// Set a parameter, replacing any previous one of the same name
    pub fn set_parameter(&mut self, parameter: GeometryParameter) -> Result<()> {
        if !self.reference.is_known(parameter.name()) {
            return Err(Error::UnknownParameter(parameter.name().to_string()));
        }
        self.parameters.insert(parameter.name().to_string(), parameter);
        Ok(())
    }

    /// Parameters in vocabulary order, skipping empty ones if `filter_empty`
    pub fn get_parameter_list(&self, filter_empty: bool) -> Vec<&GeometryParameter> {
        self.reference
            .parameter_names()
            .filter_map(|name| self.parameters.get(name))
            .filter(|parameter| !filter_empty || !parameter.is_empty())
            .collect()
    }

    /// Every set parameter, for in-place updates
    pub fn parameters_mut(&mut self) -> impl Iterator<Item = &mut GeometryParameter> {
        self.parameters.values_mut()
    }

    /// Whether a parameter is unset, valueless or an empty string
    pub fn is_parameter_empty(&self, name: &str) -> bool {
        self.parameters
            .get(name)
            .map_or(true, GeometryParameter::is_empty)
    }

    /// Validatable parameter names that are currently empty
    pub fn get_missing_parameter_list(&self) -> Vec<String> {
        self.reference
            .validatable()
            .iter()
            .filter(|name| self.is_parameter_empty(name))
            .cloned()
            .collect()
    }

    /// Aggregate confidence, `None` until some parameter has been scored
    ///
    /// Recomputed from the current parameter state on every call.
    pub fn get_confidence_score(&self) -> Option<f64> {
        self.confidence_summary().map(|summary| summary.score)
    }

    /// Aggregate confidence and the number of parameters behind it
    ///
    /// Collects the number parameters that carry both a confidence and a
    /// normalised value, then averages their confidences over:
    /// - the collected parameters (optimistic validation)
    /// - every scored number parameter, calculated ones included
    ///   (count calculated params)
    /// - the full validatable list otherwise
    pub fn confidence_summary(&self) -> Option<ConfidenceScore> {
        let scored: Vec<(&str, f64)> = self
            .get_parameter_list(true)
            .into_iter()
            .filter(|p| p.is_number() && p.normalised_value().is_some())
            .filter_map(|p| p.confidence().map(|c| (p.name(), c)))
            .collect();

        if scored.is_empty() {
            return None;
        }

        let total: f64 = scored.iter().map(|(_, confidence)| confidence).sum();
        let total_validatable = self.reference.total_validatable();

        let score = if self.config.optimistic_validation {
            total / scored.len() as f64
        } else if self.config.count_calculated_params {
            let scored_or_calculated = self
                .get_parameter_list(true)
                .into_iter()
                .filter(|p| p.is_number() && p.confidence().is_some())
                .count();
            total / scored_or_calculated as f64
        } else {
            total / total_validatable.max(1) as f64
        };

        info!(
            "BikeGeometry confidence score = {} (validated params = {}/{})",
            score,
            scored.len(),
            total_validatable
        );
        debug!(
            "GeometryParameters validated: {:?}",
            scored.iter().map(|(name, _)| *name).collect::<Vec<_>>()
        );

        Some(ConfidenceScore {
            score,
            validated: scored.len(),
        })
    }

    /// JSON form ready for a response
    ///
    /// Every set parameter is serialised (scored ones gain an `invalid` flag
    /// against the parameter threshold), followed by the config fields and
    /// the extra fields. Once the geometry has a confidence score, the score,
    /// its `invalid` flag and the validated/validatable counts are added.
    pub fn to_dict(&self, string_values: bool) -> Map<String, Value> {
        let parameter_list: Vec<Value> = self
            .get_parameter_list(false)
            .into_iter()
            .map(|parameter| {
                let mut dict = parameter.to_dict(string_values);
                if let Some(confidence) = parameter.confidence() {
                    dict.insert(
                        "invalid".to_string(),
                        Value::Bool(confidence < self.config.parameter_threshold),
                    );
                }
                Value::Object(dict)
            })
            .collect();

        let mut dict = Map::new();
        dict.insert("parameter_list".to_string(), Value::Array(parameter_list));
        self.config.write_to(&mut dict);
        for (key, value) in &self.extra_values {
            dict.insert(key.clone(), value.clone());
        }

        if let Some(summary) = self.confidence_summary() {
            dict.insert("confidence".to_string(), Value::from(summary.score));
            dict.insert(
                "invalid".to_string(),
                Value::Bool(summary.score < self.config.geometry_threshold),
            );
            dict.insert("validated_parameters".to_string(), Value::from(summary.validated));
            dict.insert(
                "validatable_parameters".to_string(),
                Value::from(self.reference.total_validatable()),
            );
        }

        dict
    }
}
