//! Geometry parameter model
//!
//! A `GeometryParameter` is one named measurement of a bike geometry. It keeps
//! the raw input next to its normalised form, an optional calculated (derived)
//! value and a confidence score.
//!
//! # Value resolution
//! The effective value ([`GeometryParameter::value`]) is, in order:
//! 1. the calculated value, if one was derived
//! 2. the normalised value, if normalisation succeeded
//! 3. the original text, if it is not empty
//! 4. nothing
//!
//! # Write-once calculated value
//! The first calculated value wins. Later calls to
//! [`GeometryParameter::set_calculated_value`] are logged and ignored; there is
//! no way to clear it short of building a new parameter.

use crate::reference::{ParameterType, ReferenceData};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Confidence given to a freshly calculated value when nothing else scored it
pub const DEFAULT_CALCULATED_CONFIDENCE: f64 = 0.75;

/// Typed value of a parameter
///
/// `Range` holds an ordered list of readings (e.g. "135/110" or the same
/// measurement in two units).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Number(f64),
    Range(Vec<f64>),
    Text(String),
}

impl ParameterValue {
    /// Empty text counts as no value at all
    pub fn is_empty(&self) -> bool {
        matches!(self, ParameterValue::Text(s) if s.is_empty())
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, ParameterValue::Text(_))
    }

    /// Scalar number, `None` for ranges and text
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(x) => Some(*x),
            _ => None,
        }
    }

    /// All numeric readings: a scalar yields one element, text yields none
    pub fn numbers(&self) -> Option<Vec<f64>> {
        match self {
            ParameterValue::Number(x) => Some(vec![*x]),
            ParameterValue::Range(list) => Some(list.clone()),
            ParameterValue::Text(_) => None,
        }
    }

    /// Scalar, or the first element of a range
    pub fn first_number(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(x) => Some(*x),
            ParameterValue::Range(list) => list.first().copied(),
            ParameterValue::Text(_) => None,
        }
    }

    /// String form used in responses ("1.000000" becomes "1")
    pub fn format(&self) -> String {
        match self {
            ParameterValue::Number(x) => format_number(*x),
            ParameterValue::Range(list) => format!(
                "[{}]",
                list.iter()
                    .map(|x| format_number(*x))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ParameterValue::Text(s) => s.clone(),
        }
    }

    /// Raw JSON form (numbers stay numbers)
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Number(value)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(value: Vec<f64>) -> Self {
        ParameterValue::Range(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

/// Format a number without trailing zeros or a trailing decimal point
pub fn format_number(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// One named measurement of a bike geometry
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryParameter {
    name: String,
    original_value: Option<String>,
    value: Option<ParameterValue>,
    calculated_value: Option<ParameterValue>,
    kind: ParameterType,
    confidence: Option<f64>,
    extra_values: Map<String, Value>,
}

impl GeometryParameter {
    /// Create a parameter with an explicit type
    ///
    /// The raw value is cast to the declared type straight away; values that
    /// need normalisation (e.g. "A 190aa$") stay as text until the normaliser
    /// runs.
    pub fn new(name: &str, value: Option<&str>, kind: ParameterType) -> Self {
        let mut parameter = Self {
            name: name.to_string(),
            original_value: value.map(str::to_string),
            value: None,
            calculated_value: None,
            kind,
            confidence: None,
            extra_values: Map::new(),
        };

        if let Some(raw) = value {
            if let Err(e) = parameter.set_normalised_value(raw) {
                if !raw.is_empty() {
                    debug!(
                        parameter = %parameter.name,
                        value = %raw,
                        kind = ?parameter.kind,
                        "GeometryParameter needs normalisation: {}",
                        e
                    );
                }
            }
        }

        parameter
    }

    /// Create a parameter whose type is resolved from the reference vocabulary
    ///
    /// Unknown names default to text.
    pub fn with_reference(name: &str, value: Option<&str>, reference: &ReferenceData) -> Self {
        let kind = reference.parameter_type(name).unwrap_or_else(|| {
            warn!("Unknown GeometryParameter name '{}', defaulting to type text", name);
            ParameterType::Text
        });
        Self::new(name, value, kind)
    }

    /// Create a parameter from its JSON form
    ///
    /// ```json
    /// { "p": "head_tube", "v": "190", "id": "any extra field" }
    /// ```
    ///
    /// Fields other than `p` and `v` are kept verbatim and written back by
    /// [`to_dict`](Self::to_dict).
    pub fn from_dict(dict: &Map<String, Value>, reference: &ReferenceData) -> Result<Self> {
        let name = match dict.get("p") {
            Some(Value::String(name)) => name.clone(),
            _ => return Err(Error::MalformedParameter(Value::Object(dict.clone()).to_string())),
        };

        let raw = match dict.get("v") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Null) => None,
            _ => return Err(Error::MalformedParameter(Value::Object(dict.clone()).to_string())),
        };

        let mut parameter = Self::with_reference(&name, raw.as_deref(), reference);
        parameter.extra_values = dict
            .iter()
            .filter(|(key, _)| key.as_str() != "p" && key.as_str() != "v")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(parameter)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParameterType {
        self.kind
    }

    /// Number parameters are the ones normalised, solved for and scored
    pub fn is_number(&self) -> bool {
        self.kind == ParameterType::Number
    }

    /// Raw input exactly as received
    pub fn original_value(&self) -> Option<&str> {
        self.original_value.as_deref()
    }

    /// Normalised value, falling back to the original text when normalisation
    /// has not succeeded (ignores any calculated value)
    pub fn normalised_value(&self) -> Option<ParameterValue> {
        match (&self.value, &self.original_value) {
            (Some(value), _) => Some(value.clone()),
            (None, Some(original)) if !original.is_empty() => {
                Some(ParameterValue::Text(original.clone()))
            }
            _ => None,
        }
    }

    pub fn calculated_value(&self) -> Option<&ParameterValue> {
        self.calculated_value.as_ref()
    }

    /// Most up to date value: calculated, then normalised, then original text
    pub fn value(&self) -> Option<ParameterValue> {
        match &self.calculated_value {
            Some(calculated) => Some(calculated.clone()),
            None => self.normalised_value(),
        }
    }

    /// No value at all, or an empty string
    pub fn is_empty(&self) -> bool {
        self.value().map_or(true, |v| v.is_empty())
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn extra_values(&self) -> &Map<String, Value> {
        &self.extra_values
    }

    /// Set the normalised value, casting it to the declared type
    ///
    /// Accepts a scalar or a range. Fails with `TypeCast` when the value is
    /// empty or cannot be converted; the parameter is left unchanged.
    pub fn set_normalised_value(&mut self, value: impl Into<ParameterValue>) -> Result<()> {
        let value = self.cast(value.into())?;
        self.value = Some(value);
        Ok(())
    }

    /// Set the calculated value (first call wins)
    ///
    /// A singleton range is unwrapped to a scalar. If `change_confidence` is
    /// set and nothing scored the parameter yet, confidence becomes
    /// [`DEFAULT_CALCULATED_CONFIDENCE`].
    pub fn set_calculated_value(
        &mut self,
        value: impl Into<ParameterValue>,
        change_confidence: bool,
    ) -> Result<()> {
        let value = value.into();

        if let Some(current) = &self.calculated_value {
            warn!(
                "GeometryParameter('{}') already has a calculated value (current={}, new={})",
                self.name,
                current.format(),
                value.format()
            );
            return Ok(());
        }

        let value = match value {
            ParameterValue::Range(list) if list.len() == 1 => ParameterValue::Number(list[0]),
            other => other,
        };
        let value = self.cast(value)?;

        if self.value.is_none() {
            info!(
                "GeometryParameter('{}') has a new calculated value: {}",
                self.name,
                value.format()
            );
        }
        self.calculated_value = Some(value);

        if change_confidence && self.confidence.is_none() {
            self.set_confidence(DEFAULT_CALCULATED_CONFIDENCE, false);
        }

        Ok(())
    }

    /// Set the confidence score
    ///
    /// Only applies when no confidence is set yet, when `force` is given, or
    /// while there is no calculated value. A previous confidence is averaged
    /// with the new one so repeated signals smooth out. The result is clamped
    /// to 0..=1.
    pub fn set_confidence(&mut self, confidence: f64, force: bool) {
        if confidence.is_nan() {
            warn!("GeometryParameter('{}') ignoring NaN confidence", self.name);
            return;
        }

        if self.confidence.is_some() && !force && self.calculated_value.is_some() {
            return;
        }

        let updated = match self.confidence {
            None => confidence,
            Some(previous) => (previous + confidence) / 2.0,
        };

        if !(0.0..=1.0).contains(&updated) {
            warn!(
                "GeometryParameter('{}') has confidence value of '{}' (outside the 0-1 range)",
                self.name, updated
            );
        }

        self.confidence = Some(updated.clamp(0.0, 1.0));
    }

    /// JSON form ready for a response
    ///
    /// Emits `p`, the extra fields, `v` (effective value), `original_v` when
    /// the input differs from `v`, `calculated_v` when a value was derived (in
    /// which case `v` reverts to the normalised reading) and `confidence`.
    /// The `invalid` flag is added by the owning geometry, which knows the
    /// threshold.
    pub fn to_dict(&self, string_values: bool) -> Map<String, Value> {
        let render = |value: &ParameterValue| {
            if string_values {
                Value::String(value.format())
            } else {
                value.to_json()
            }
        };

        let mut dict = Map::new();
        dict.insert("p".to_string(), Value::String(self.name.clone()));
        for (key, value) in &self.extra_values {
            dict.insert(key.clone(), value.clone());
        }

        let v = match self.value() {
            Some(value) => render(&value),
            None => Value::String(String::new()),
        };

        let original = match &self.original_value {
            Some(original) => Value::String(original.clone()),
            None => Value::Null,
        };
        if original != v {
            dict.insert("original_v".to_string(), original);
        }
        dict.insert("v".to_string(), v);

        if let Some(calculated) = &self.calculated_value {
            let shown = self.value.as_ref().unwrap_or(calculated);
            dict.insert("v".to_string(), render(shown));
            dict.insert("calculated_v".to_string(), render(calculated));
        }

        if let Some(confidence) = self.confidence {
            dict.insert("confidence".to_string(), Value::from(confidence));
        }

        dict
    }

    /// Cast a value to the declared type of this parameter
    fn cast(&self, value: ParameterValue) -> Result<ParameterValue> {
        let fail = |v: &dyn std::fmt::Display| Error::type_cast(&self.name, v);

        match (self.kind, value) {
            (ParameterType::Number, ParameterValue::Number(x)) if x.is_finite() => {
                Ok(ParameterValue::Number(x))
            }
            (ParameterType::Number, ParameterValue::Number(x)) => Err(fail(&x)),
            (ParameterType::Number, ParameterValue::Range(list)) => {
                if list.is_empty() || list.iter().any(|x| !x.is_finite()) {
                    Err(fail(&format!("{:?}", list)))
                } else {
                    Ok(ParameterValue::Range(list))
                }
            }
            (ParameterType::Number, ParameterValue::Text(s)) => match s.trim().parse::<f64>() {
                Ok(x) if x.is_finite() => Ok(ParameterValue::Number(x)),
                _ => Err(fail(&s)),
            },
            (ParameterType::Text, ParameterValue::Text(s)) if s.is_empty() => Err(fail(&s)),
            (ParameterType::Text, ParameterValue::Text(s)) => Ok(ParameterValue::Text(s)),
            (ParameterType::Text, other) => Ok(ParameterValue::Text(other.format())),
        }
    }
}
