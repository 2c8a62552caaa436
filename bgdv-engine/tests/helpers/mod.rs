//! Shared test helpers

#![allow(dead_code)]

pub mod log_capture;

use bgdv_common::{BikeGeometry, ReferenceData, ValidationConfig};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Load a JSON fixture from `tests/fixtures`
pub fn fixture(name: &str) -> Value {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {:?}: {}", path, e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {:?}: {}", path, e))
}

/// Geometry from `(name, raw value)` pairs with the built-in reference data
pub fn geometry(values: &[(&str, &str)], config: ValidationConfig) -> BikeGeometry {
    let parameter_list: Vec<Value> = values
        .iter()
        .map(|(name, value)| serde_json::json!({ "p": name, "v": value }))
        .collect();

    let mut dict = Map::new();
    dict.insert("parameter_list".to_string(), Value::Array(parameter_list));
    BikeGeometry::from_json(&dict, config, Arc::new(ReferenceData::builtin()))
}
