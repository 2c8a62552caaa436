//! Reference data for bike geometry validation
//!
//! Static lookup tables the validation engine reads but never mutates:
//! - Parameter vocabulary with declared types (the closed set of record fields)
//! - Geometry statistics (mean/median per parameter)
//! - Geometry constraints (inequalities between parameters)
//! - Validatable parameter list (what the mathematical model can derive/score)
//! - Solve domains (bracket searched by the numeric root finder)
//!
//! The built-in tables are compiled defaults. A TOML file can replace or extend
//! them (see [`ReferenceData::load`]); the result is shared read-only as
//! `Arc<ReferenceData>` across every validation.

use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Declared type of a geometry parameter
///
/// Only `Number` parameters are normalised, solved for and scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Number,
    Text,
}

/// Reference statistics for one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub mean: f64,
    pub median: f64,
}

/// Comparison operator of a geometry constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintOperator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl ConstraintOperator {
    /// Evaluate `lhs <op> rhs`
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            ConstraintOperator::Lt => lhs < rhs,
            ConstraintOperator::Le => lhs <= rhs,
            ConstraintOperator::Gt => lhs > rhs,
            ConstraintOperator::Ge => lhs >= rhs,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ConstraintOperator::Lt => "<",
            ConstraintOperator::Le => "<=",
            ConstraintOperator::Gt => ">",
            ConstraintOperator::Ge => ">=",
        }
    }
}

/// A required inequality between the owning parameter and `other`
///
/// Deserializes from either `{ operator = "<", other = "wheelbase" }` or the
/// compact array form `["<", "wheelbase"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub operator: ConstraintOperator,
    pub other: String,
}

impl Constraint {
    pub fn new(operator: ConstraintOperator, other: &str) -> Self {
        Self {
            operator,
            other: other.to_string(),
        }
    }
}

/// Half-open bracket `(lower, upper]` searched when solving for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveDomain {
    pub lower: f64,
    pub upper: f64,
}

impl SolveDomain {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Both bounds finite and `lower < upper`
    pub fn check(&self, label: &str) -> Result<()> {
        if !(self.lower.is_finite() && self.upper.is_finite()) {
            return Err(Error::Config(format!(
                "{} must have finite bounds, got ({}, {}]",
                label, self.lower, self.upper
            )));
        }
        if !(self.lower < self.upper) {
            return Err(Error::Config(format!(
                "{} is empty ({}, {}]",
                label, self.lower, self.upper
            )));
        }
        Ok(())
    }
}

/// Default bracket for lengths: strictly positive, generous upper bound
pub const DEFAULT_SOLVE_DOMAIN: SolveDomain = SolveDomain::new(0.0, 100_000.0);

/// Angles are expressed in degrees
const ANGLE_SOLVE_DOMAIN: SolveDomain = SolveDomain::new(0.0, 180.0);

/// Record vocabulary in output order, with declared types
const BUILTIN_PARAMETERS: &[(&str, ParameterType)] = &[
    ("slug", ParameterType::Text),
    ("alt_size", ParameterType::Text),
    ("axle_spacing", ParameterType::Number),
    ("axle_to_crown", ParameterType::Number),
    ("bb_drop", ParameterType::Number),
    ("bb_height", ParameterType::Number),
    ("bb_type", ParameterType::Text),
    ("bike_slug", ParameterType::Text),
    ("chainstay", ParameterType::Number),
    ("crank_length", ParameterType::Number),
    ("fork_length", ParameterType::Number),
    ("fork_rake", ParameterType::Number),
    ("front_centre", ParameterType::Number),
    ("front_sus_travel", ParameterType::Number),
    ("handlebar_drop", ParameterType::Number),
    ("handlebar_reach", ParameterType::Number),
    ("handlebar_width", ParameterType::Number),
    ("head_angle", ParameterType::Number),
    ("head_tube", ParameterType::Number),
    ("pad_reach", ParameterType::Number),
    ("pad_stack", ParameterType::Number),
    ("reach", ParameterType::Number),
    ("rear_sus_travel", ParameterType::Number),
    ("saddle_height", ParameterType::Number),
    ("seat_angle", ParameterType::Number),
    ("seat_clamp_size", ParameterType::Number),
    ("seat_tube_length", ParameterType::Number),
    ("seat_tube_length_cc", ParameterType::Number),
    ("seat_tube_length_eff", ParameterType::Number),
    ("seatpost_diameter", ParameterType::Number),
    ("seatpost_length", ParameterType::Number),
    ("seatpost_offset", ParameterType::Number),
    ("shock_size", ParameterType::Text),
    ("size", ParameterType::Text),
    ("stack", ParameterType::Number),
    ("standover", ParameterType::Number),
    ("stem_angle", ParameterType::Number),
    ("stem_length", ParameterType::Number),
    ("top_tube", ParameterType::Number),
    ("top_tube_actual", ParameterType::Number),
    ("trail", ParameterType::Number),
    ("type", ParameterType::Text),
    ("tyre_width", ParameterType::Number),
    ("wheel_size", ParameterType::Text),
    ("wheelbase", ParameterType::Number),
    ("year", ParameterType::Number),
];

/// Illustrative statistics (mm and degrees) standing in for the production tables
const BUILTIN_STATISTICS: &[(&str, f64, f64)] = &[
    ("bb_drop", 68.0, 70.0),
    ("chainstay", 430.0, 425.0),
    ("fork_length", 395.0, 395.0),
    ("fork_rake", 46.0, 45.0),
    ("front_centre", 605.0, 600.0),
    ("head_angle", 71.0, 71.5),
    ("head_tube", 140.0, 135.0),
    ("reach", 390.0, 388.0),
    ("seat_angle", 73.5, 73.5),
    ("seat_tube_length", 500.0, 500.0),
    ("seat_tube_length_cc", 480.0, 480.0),
    ("seat_tube_length_eff", 600.0, 595.0),
    ("stack", 580.0, 575.0),
    ("top_tube", 565.0, 560.0),
    ("top_tube_actual", 545.0, 540.0),
    ("wheelbase", 1060.0, 1050.0),
];

const BUILTIN_VALIDATABLE: &[&str] = &[
    "bb_drop",
    "chainstay",
    "front_centre",
    "fork_length",
    "fork_rake",
    "head_angle",
    "head_tube",
    "reach",
    "stack",
    "seat_angle",
    "seat_tube_length",
    "seat_tube_length_cc",
    "seat_tube_length_eff",
    "top_tube",
    "wheelbase",
];

fn builtin_constraints() -> IndexMap<String, Vec<Constraint>> {
    use ConstraintOperator::{Gt, Lt};

    let table: [(&str, Vec<Constraint>); 8] = [
        ("chainstay", vec![Constraint::new(Lt, "wheelbase")]),
        ("front_centre", vec![Constraint::new(Lt, "wheelbase")]),
        (
            "seat_tube_length",
            vec![
                Constraint::new(Gt, "seat_tube_length_cc"),
                Constraint::new(Lt, "seat_tube_length_eff"),
            ],
        ),
        (
            "seat_tube_length_cc",
            vec![
                Constraint::new(Lt, "seat_tube_length"),
                Constraint::new(Lt, "seat_tube_length_eff"),
            ],
        ),
        (
            "seat_tube_length_eff",
            vec![
                Constraint::new(Gt, "seat_tube_length"),
                Constraint::new(Gt, "seat_tube_length_cc"),
            ],
        ),
        ("top_tube", vec![Constraint::new(Gt, "top_tube_actual")]),
        ("top_tube_actual", vec![Constraint::new(Lt, "top_tube")]),
        (
            "wheelbase",
            vec![
                Constraint::new(Gt, "chainstay"),
                Constraint::new(Gt, "front_centre"),
            ],
        ),
    ];

    table
        .into_iter()
        .map(|(name, list)| (name.to_string(), list))
        .collect()
}

/// Read-only reference tables consumed by the data model and the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceData {
    parameters: IndexMap<String, ParameterType>,
    statistics: HashMap<String, Statistics>,
    constraints: IndexMap<String, Vec<Constraint>>,
    validatable: Vec<String>,
    domains: HashMap<String, SolveDomain>,
    default_domain: SolveDomain,
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::builtin()
    }
}

/// On-disk shape of a reference data file
///
/// Every section is optional. `parameters`, `statistics` and `domains` extend
/// (and override entry by entry) the built-in tables; `constraints` replaces
/// the constraint list of each parameter it names; `validatable` replaces the
/// whole list.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReferenceFile {
    pub parameters: IndexMap<String, ParameterType>,
    pub statistics: HashMap<String, Statistics>,
    pub constraints: IndexMap<String, Vec<Constraint>>,
    pub validatable: Option<Vec<String>>,
    pub domains: HashMap<String, SolveDomain>,
    pub default_domain: Option<SolveDomain>,
}

impl ReferenceData {
    /// Compiled-in reference tables
    pub fn builtin() -> Self {
        let parameters = BUILTIN_PARAMETERS
            .iter()
            .map(|(name, kind)| (name.to_string(), *kind))
            .collect();

        let statistics = BUILTIN_STATISTICS
            .iter()
            .map(|(name, mean, median)| {
                (
                    name.to_string(),
                    Statistics {
                        mean: *mean,
                        median: *median,
                    },
                )
            })
            .collect();

        let domains = ["seat_angle", "head_angle", "stem_angle"]
            .iter()
            .map(|name| (name.to_string(), ANGLE_SOLVE_DOMAIN))
            .collect();

        Self {
            parameters,
            statistics,
            constraints: builtin_constraints(),
            validatable: BUILTIN_VALIDATABLE.iter().map(|s| s.to_string()).collect(),
            domains,
            default_domain: DEFAULT_SOLVE_DOMAIN,
        }
    }

    /// Load a reference file and merge it over the built-in tables
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read reference data {} failed: {}", path.display(), e)))?;
        let data = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            parameters = data.parameters.len(),
            validatable = data.validatable.len(),
            "Reference data loaded"
        );
        Ok(data)
    }

    /// Parse reference overrides from TOML and merge them over the built-in tables
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ReferenceFile = toml::from_str(content)?;
        let mut data = Self::builtin();
        data.merge(file)?;
        Ok(data)
    }

    fn merge(&mut self, file: ReferenceFile) -> Result<()> {
        self.parameters.extend(file.parameters);
        self.statistics.extend(file.statistics);
        self.domains.extend(file.domains);

        for (name, list) in file.constraints {
            debug!(parameter = %name, count = list.len(), "Overriding geometry constraints");
            self.constraints.insert(name, list);
        }

        if let Some(list) = file.validatable {
            self.validatable = list;
        }
        if let Some(domain) = file.default_domain {
            self.default_domain = domain;
        }

        self.check()
    }

    /// Cross-table consistency: everything referenced must be in the vocabulary
    fn check(&self) -> Result<()> {
        for name in &self.validatable {
            if self.parameter_type(name) != Some(ParameterType::Number) {
                return Err(Error::Config(format!(
                    "Validatable parameter '{}' must be a known number parameter",
                    name
                )));
            }
        }

        for (name, list) in &self.constraints {
            for constraint in std::iter::once(name).chain(list.iter().map(|c| &c.other)) {
                if !self.is_known(constraint) {
                    return Err(Error::Config(format!(
                        "Constraint references unknown parameter '{}'",
                        constraint
                    )));
                }
            }
        }

        for (name, domain) in &self.domains {
            domain.check(&format!("Solve domain of '{}'", name))?;
        }
        self.default_domain.check("default_domain")?;

        Ok(())
    }

    /// Whether the name belongs to the record vocabulary
    pub fn is_known(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Declared type of a parameter, `None` for names outside the vocabulary
    pub fn parameter_type(&self, name: &str) -> Option<ParameterType> {
        self.parameters.get(name).copied()
    }

    /// Vocabulary names in record order
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    pub fn statistics(&self, name: &str) -> Option<&Statistics> {
        self.statistics.get(name)
    }

    /// Constraints registered for a parameter, `None` if unconstrained
    pub fn constraints(&self, name: &str) -> Option<&[Constraint]> {
        self.constraints.get(name).map(Vec::as_slice)
    }

    pub fn is_constrained(&self, name: &str) -> bool {
        self.constraints.contains_key(name)
    }

    pub fn validatable(&self) -> &[String] {
        &self.validatable
    }

    pub fn is_validatable(&self, name: &str) -> bool {
        self.validatable.iter().any(|v| v == name)
    }

    /// Size of the validatable vocabulary (pessimistic confidence denominator)
    pub fn total_validatable(&self) -> usize {
        self.validatable.len()
    }

    /// Bracket searched when solving for a parameter
    pub fn solve_domain(&self, name: &str) -> SolveDomain {
        self.domains.get(name).copied().unwrap_or(self.default_domain)
    }
}
