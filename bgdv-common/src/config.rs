//! Configuration loading for BGDV
//!
//! Bootstrap configuration comes from a TOML file. Every section and key is
//! optional; missing values fall back to built-in defaults.
//!
//! # Config file resolution
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`BGDV_CONFIG`)
//! 3. `~/.config/bgdv/config.toml`, then `/etc/bgdv/config.toml`
//! 4. Built-in defaults (no file)
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5730
//!
//! [validation]
//! parameter_threshold = 0.6
//!
//! [solver]
//! grid_step = 0.25
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "BGDV_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub validation: ValidationConfig,
    pub solver: SolverSettings,
    pub reference: ReferenceConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Default: 5730
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound on one validation request, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Thresholds and scoring switches of one geometry
///
/// The `[validation]` section holds the service-wide defaults; each geometry
/// in a request may override any of them.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct ValidationConfig {
    /// Geometries scoring below this are flagged invalid
    #[serde(default = "default_threshold")]
    pub geometry_threshold: f64,

    /// Parameters scoring below this are flagged invalid and retried
    #[serde(default = "default_threshold")]
    pub parameter_threshold: f64,

    /// Score the geometry only over the parameters that carry a confidence
    #[serde(default)]
    pub optimistic_validation: bool,

    /// Divide by the number of scored parameters instead of the full
    /// validatable list
    #[serde(default)]
    pub count_calculated_params: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            geometry_threshold: default_threshold(),
            parameter_threshold: default_threshold(),
            optimistic_validation: false,
            count_calculated_params: false,
        }
    }
}

/// Keys of [`ValidationConfig`] as they appear in a geometry dict
pub const VALIDATION_CONFIG_KEYS: [&str; 4] = [
    "geometry_threshold",
    "parameter_threshold",
    "optimistic_validation",
    "count_calculated_params",
];

impl ValidationConfig {
    /// Copy of this config with the overrides found in a geometry dict
    ///
    /// Thresholds must be numbers, switches may be booleans or numbers
    /// (non-zero is true). A malformed value keeps the current setting.
    pub fn with_overrides(&self, dict: &Map<String, Value>) -> Self {
        let mut config = *self;

        if let Some(value) = dict.get("geometry_threshold") {
            override_threshold(&mut config.geometry_threshold, "geometry_threshold", value);
        }
        if let Some(value) = dict.get("parameter_threshold") {
            override_threshold(&mut config.parameter_threshold, "parameter_threshold", value);
        }
        if let Some(value) = dict.get("optimistic_validation") {
            override_switch(&mut config.optimistic_validation, "optimistic_validation", value);
        }
        if let Some(value) = dict.get("count_calculated_params") {
            override_switch(&mut config.count_calculated_params, "count_calculated_params", value);
        }

        config
    }

    /// Write the config fields into a geometry dict
    pub fn write_to(&self, dict: &mut Map<String, Value>) {
        dict.insert("geometry_threshold".to_string(), Value::from(self.geometry_threshold));
        dict.insert("parameter_threshold".to_string(), Value::from(self.parameter_threshold));
        dict.insert("optimistic_validation".to_string(), Value::from(self.optimistic_validation));
        dict.insert(
            "count_calculated_params".to_string(),
            Value::from(self.count_calculated_params),
        );
    }
}

fn override_threshold(slot: &mut f64, key: &str, value: &Value) {
    let threshold = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => value.as_f64(),
    };
    match threshold {
        Some(threshold) if threshold.is_finite() => *slot = threshold,
        _ => warn!("Malformed {} '{}', keeping default {}", key, value, slot),
    }
}

fn override_switch(slot: &mut bool, key: &str, value: &Value) {
    match value {
        Value::Bool(flag) => *slot = *flag,
        Value::Number(n) => match n.as_f64() {
            Some(x) => *slot = x != 0.0,
            None => warn!("Malformed {} '{}', keeping default {}", key, value, slot),
        },
        _ => warn!("Malformed {} '{}', keeping default {}", key, value, slot),
    }
}

/// Numeric root finder settings
///
/// The finder samples a solve domain on a linear grid of `grid_step` up to
/// `dense_limit`, then geometrically by `growth_factor`. Sign changes are
/// refined by bisection; a candidate whose residual exceeds
/// `residual_tolerance` is treated as a pole and dropped.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct SolverSettings {
    #[serde(default = "default_grid_step")]
    pub grid_step: f64,

    #[serde(default = "default_dense_limit")]
    pub dense_limit: f64,

    #[serde(default = "default_growth_factor")]
    pub growth_factor: f64,

    #[serde(default = "default_bisection_iterations")]
    pub bisection_iterations: u32,

    #[serde(default = "default_residual_tolerance")]
    pub residual_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            grid_step: default_grid_step(),
            dense_limit: default_dense_limit(),
            growth_factor: default_growth_factor(),
            bisection_iterations: default_bisection_iterations(),
            residual_tolerance: default_residual_tolerance(),
        }
    }
}

impl SolverSettings {
    /// Reject settings that would make the root finder loop forever or skip
    /// the whole domain
    pub fn check(&self) -> Result<()> {
        if !(self.grid_step.is_finite() && self.grid_step > 0.0) {
            return Err(Error::Config(format!(
                "solver.grid_step must be positive, got {}",
                self.grid_step
            )));
        }
        if !(self.growth_factor.is_finite() && self.growth_factor > 1.0) {
            return Err(Error::Config(format!(
                "solver.growth_factor must be greater than 1, got {}",
                self.growth_factor
            )));
        }
        if !(self.dense_limit.is_finite() && self.dense_limit > 0.0) {
            return Err(Error::Config(format!(
                "solver.dense_limit must be positive, got {}",
                self.dense_limit
            )));
        }
        if self.bisection_iterations == 0 {
            return Err(Error::Config("solver.bisection_iterations must be at least 1".to_string()));
        }
        if !(self.residual_tolerance.is_finite() && self.residual_tolerance > 0.0) {
            return Err(Error::Config(format!(
                "solver.residual_tolerance must be positive, got {}",
                self.residual_tolerance
            )));
        }
        Ok(())
    }
}

/// Reference data source
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReferenceConfig {
    /// TOML file merged over the built-in tables
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5730
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_threshold() -> f64 {
    0.7
}

fn default_grid_step() -> f64 {
    0.5
}

fn default_dense_limit() -> f64 {
    2500.0
}

fn default_growth_factor() -> f64 {
    1.02
}

fn default_bisection_iterations() -> u32 {
    100
}

fn default_residual_tolerance() -> f64 {
    1e-3
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.solver.check()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    /// Resolve and load configuration
    ///
    /// An explicitly named file (argument or environment) must exist. When no
    /// file is found in the default locations, built-in defaults are used.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match resolve_config_path(cli_arg) {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                Ok((Self::load(&path)?, Some(path)))
            }
            None => {
                warn!("No config file found, using built-in defaults");
                Ok((Self::default(), None))
            }
        }
    }
}

/// Config file path following the documented priority order
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: user, then system config file
    let user_config = dirs::config_dir().map(|d| d.join("bgdv").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/bgdv/config.toml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.server.port, 5730);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.validation.parameter_threshold, 0.7);
        assert_eq!(config.validation.geometry_threshold, 0.7);
        assert!(!config.validation.optimistic_validation);
        assert!(!config.validation.count_calculated_params);
        assert_eq!(config.solver.grid_step, 0.5);
        assert_eq!(config.solver.bisection_iterations, 100);
        assert!(config.reference.path.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config = TomlConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [validation]
            optimistic_validation = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.validation.optimistic_validation);
        assert_eq!(config.validation.parameter_threshold, 0.7);
        assert_eq!(config.solver, SolverSettings::default());
    }

    #[test]
    fn test_invalid_solver_settings_rejected() {
        let result = TomlConfig::from_toml_str("[solver]\ngrowth_factor = 1.0\n");
        assert!(matches!(result, Err(Error::Config(_))));

        let result = TomlConfig::from_toml_str("[solver]\ngrid_step = -0.5\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unparsable_toml_rejected() {
        let result = TomlConfig::from_toml_str("[server\nport = ");
        assert!(matches!(result, Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_validation_overrides() {
        let defaults = ValidationConfig::default();
        let dict = json!({
            "geometry_threshold": 0.5,
            "parameter_threshold": 0.2,
            "optimistic_validation": true,
            "count_calculated_params": 1
        });

        let config = defaults.with_overrides(dict.as_object().unwrap());
        assert_eq!(config.geometry_threshold, 0.5);
        assert_eq!(config.parameter_threshold, 0.2);
        assert!(config.optimistic_validation);
        assert!(config.count_calculated_params);
    }

    #[test]
    fn test_malformed_overrides_keep_defaults() {
        let defaults = ValidationConfig::default();
        let dict = json!({
            "geometry_threshold": "high",
            "optimistic_validation": "yes",
            "count_calculated_params": null
        });

        let config = defaults.with_overrides(dict.as_object().unwrap());
        assert_eq!(config, defaults);
    }

    #[test]
    fn test_numeric_string_thresholds() {
        let defaults = ValidationConfig::default();
        let dict = json!({
            "geometry_threshold": "0.5",
            "parameter_threshold": " 0.25 ",
        });

        let config = defaults.with_overrides(dict.as_object().unwrap());
        assert_eq!(config.geometry_threshold, 0.5);
        assert_eq!(config.parameter_threshold, 0.25);

        let dict = json!({ "geometry_threshold": "NaN" });
        assert_eq!(defaults.with_overrides(dict.as_object().unwrap()), defaults);
    }

    #[test]
    fn test_write_to_dict() {
        let mut dict = Map::new();
        ValidationConfig::default().write_to(&mut dict);
        assert_eq!(dict["parameter_threshold"], json!(0.7));
        assert_eq!(dict["optimistic_validation"], json!(false));
    }
}
