// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// src/monitoring/quality.rs - Request schema validation and data-quality counters

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::errors::{MonitorError, MonitorResult};
use crate::metrics::names;
use crate::metrics::{MetricsReporter, MetricsSink};

/// Closed set of primitive types a feature can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "double", alias = "number")]
    Float,
    #[serde(alias = "str")]
    String,
    #[serde(alias = "bool")]
    Boolean,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Integer => "integer",
            FeatureType::Float => "float",
            FeatureType::String => "string",
            FeatureType::Boolean => "boolean",
        }
    }

    /// Whether a JSON value has this type. Any JSON number is a valid float;
    /// integers must be integral.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FeatureType::Integer => value.is_i64() || value.is_u64(),
            FeatureType::Float => value.is_number(),
            FeatureType::String => value.is_string(),
            FeatureType::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureType {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(FeatureType::Integer),
            "float" | "double" | "number" => Ok(FeatureType::Float),
            "str" | "string" => Ok(FeatureType::String),
            "bool" | "boolean" => Ok(FeatureType::Boolean),
            other => Err(MonitorError::Configuration(format!(
                "unknown feature type '{}'",
                other
            ))),
        }
    }
}

/// Ordered feature name -> type declarations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDefinition {
    fields: Vec<(String, FeatureType)>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        feature_type: FeatureType,
    ) -> MonitorResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(MonitorError::Configuration(
                "schema field names must not be empty".to_string(),
            ));
        }
        if self.get(&name).is_some() {
            return Err(MonitorError::Configuration(format!(
                "schema declares '{}' twice",
                name
            )));
        }
        self.fields.push((name, feature_type));
        Ok(self)
    }

    pub fn from_fields<I, S>(fields: I) -> MonitorResult<Self>
    where
        I: IntoIterator<Item = (S, FeatureType)>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .try_fold(Self::new(), |schema, (name, ty)| schema.with_field(name, ty))
    }

    pub fn get(&self, name: &str) -> Option<FeatureType> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| *ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FeatureType)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Per-feature value check, run only on values that passed the type check
pub type RangePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Inclusive numeric bounds; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Predicate form; non-numeric values are out of range
    pub fn into_predicate(self) -> RangePredicate {
        Arc::new(move |value: &Value| value.as_f64().map_or(false, |v| self.contains(v)))
    }
}

/// Feature names per issue category for one record; every list is always present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssues {
    pub missing: Vec<String>,
    pub type_error: Vec<String>,
    pub out_of_range: Vec<String>,
    /// Fields the schema does not declare
    pub unexpected: Vec<String>,
}

impl QualityIssues {
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.missing.len() + self.type_error.len() + self.out_of_range.len() + self.unexpected.len()
    }

    pub fn to_map(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut map = BTreeMap::new();
        map.insert("missing", self.missing.clone());
        map.insert("type_error", self.type_error.clone());
        map.insert("out_of_range", self.out_of_range.clone());
        map.insert("unexpected", self.unexpected.clone());
        map
    }
}

/// Monotonic violation counters since construction or the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssueTally {
    pub missing: HashMap<String, u64>,
    pub type_error: HashMap<String, u64>,
    pub out_of_range: HashMap<String, u64>,
    pub schema_mismatch: u64,
    pub records_validated: u64,
}

impl QualityIssueTally {
    pub fn missing_count(&self, feature: &str) -> u64 {
        self.missing.get(feature).copied().unwrap_or(0)
    }

    pub fn type_error_count(&self, feature: &str) -> u64 {
        self.type_error.get(feature).copied().unwrap_or(0)
    }

    pub fn out_of_range_count(&self, feature: &str) -> u64 {
        self.out_of_range.get(feature).copied().unwrap_or(0)
    }

    fn record(&mut self, issues: &QualityIssues, schema_mismatch: bool) {
        self.records_validated += 1;
        for feature in &issues.missing {
            *self.missing.entry(feature.clone()).or_insert(0) += 1;
        }
        for feature in &issues.type_error {
            *self.type_error.entry(feature.clone()).or_insert(0) += 1;
        }
        for feature in &issues.out_of_range {
            *self.out_of_range.entry(feature.clone()).or_insert(0) += 1;
        }
        if schema_mismatch {
            self.schema_mismatch += 1;
        }
    }
}

/// Checks request records against a declared schema
pub struct DataQualityValidator {
    schema: SchemaDefinition,
    ranges: HashMap<String, RangePredicate>,
    tally: Mutex<QualityIssueTally>,
    reporter: MetricsReporter,
}

impl DataQualityValidator {
    pub fn new(schema: SchemaDefinition, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            schema,
            ranges: HashMap::new(),
            tally: Mutex::new(QualityIssueTally::default()),
            reporter: MetricsReporter::new(sink),
        }
    }

    /// Register a range predicate for a declared feature
    pub fn with_range(mut self, feature: &str, predicate: RangePredicate) -> MonitorResult<Self> {
        if self.schema.get(feature).is_none() {
            return Err(MonitorError::Configuration(format!(
                "range predicate for undeclared feature '{}'",
                feature
            )));
        }
        self.ranges.insert(feature.to_string(), predicate);
        Ok(self)
    }

    pub fn with_numeric_range(self, feature: &str, range: NumericRange) -> MonitorResult<Self> {
        self.with_range(feature, range.into_predicate())
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    fn lock_tally(&self) -> MutexGuard<'_, QualityIssueTally> {
        self.tally.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check one record. Never fails: every problem is reported in the result
    /// and counted in the tally.
    pub fn validate(&self, record: &Value) -> QualityIssues {
        let mut issues = QualityIssues::default();
        let empty = serde_json::Map::new();
        let (fields, is_object) = match record.as_object() {
            Some(map) => (map, true),
            None => (&empty, false),
        };

        for (name, feature_type) in self.schema.iter() {
            match fields.get(name) {
                None | Some(Value::Null) => issues.missing.push(name.to_string()),
                Some(value) if !feature_type.matches(value) => {
                    issues.type_error.push(name.to_string())
                }
                Some(value) => {
                    if let Some(predicate) = self.ranges.get(name) {
                        if !predicate(value) {
                            issues.out_of_range.push(name.to_string());
                        }
                    }
                }
            }
        }

        let declared: HashSet<&str> = self.schema.iter().map(|(name, _)| name).collect();
        let mut unexpected: Vec<String> = fields
            .keys()
            .filter(|key| !declared.contains(key.as_str()))
            .cloned()
            .collect();
        unexpected.sort();
        issues.unexpected = unexpected;

        let schema_mismatch = !is_object || !issues.unexpected.is_empty();
        self.lock_tally().record(&issues, schema_mismatch);
        self.report(&issues, schema_mismatch, is_object);
        issues
    }

    fn report(&self, issues: &QualityIssues, schema_mismatch: bool, is_object: bool) {
        self.reporter.inc(names::QUALITY_RECORDS_VALIDATED_TOTAL, &[]);
        for feature in &issues.missing {
            self.reporter
                .inc(names::QUALITY_MISSING_TOTAL, &[("feature", feature.as_str())]);
        }
        for feature in &issues.type_error {
            self.reporter
                .inc(names::QUALITY_TYPE_ERROR_TOTAL, &[("feature", feature.as_str())]);
        }
        for feature in &issues.out_of_range {
            self.reporter
                .inc(names::QUALITY_OUT_OF_RANGE_TOTAL, &[("feature", feature.as_str())]);
        }

        if schema_mismatch {
            self.reporter.inc(names::QUALITY_SCHEMA_MISMATCH_TOTAL, &[]);
            warn!(
                is_object,
                unexpected = ?issues.unexpected,
                "Record does not match declared schema"
            );
        }

        if !issues.is_clean() {
            debug!(
                missing = ?issues.missing,
                type_error = ?issues.type_error,
                out_of_range = ?issues.out_of_range,
                "Data quality issues found"
            );
        }
    }

    pub fn tally(&self) -> QualityIssueTally {
        self.lock_tally().clone()
    }

    pub fn reset_tally(&self) {
        *self.lock_tally() = QualityIssueTally::default();
        info!("Data quality tally reset");
    }
}

impl fmt::Debug for DataQualityValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ranged: Vec<&String> = self.ranges.keys().collect();
        ranged.sort();
        f.debug_struct("DataQualityValidator")
            .field("schema", &self.schema)
            .field("ranged_features", &ranged)
            .finish()
    }
}
