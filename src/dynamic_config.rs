use serde_json::{Map, Value};

use crate::evaluation_details::{EvaluationDetails, EvaluationReason};
use crate::snapshot::{ConfigRecord, SecondaryExposure};
use crate::values;

/// The result of evaluating a dynamic config or experiment for a user: a bag
/// of typed parameters with per-field defaults.
///
/// Typed getters never fail: a missing field or a type mismatch resolves to
/// the caller-supplied default.
#[derive(Debug, Clone)]
pub struct DynamicConfig {
    name: String,
    value: Map<String, Value>,
    rule_id: String,
    group_name: Option<String>,
    details: EvaluationDetails,
    secondary_exposures: Vec<SecondaryExposure>,
    is_user_in_experiment: bool,
    is_experiment_active: bool,
}

impl DynamicConfig {
    pub(crate) fn from_record(
        name: &str,
        record: &ConfigRecord,
        details: EvaluationDetails,
    ) -> DynamicConfig {
        DynamicConfig {
            name: name.to_owned(),
            value: record.value.clone(),
            rule_id: record.rule_id.clone(),
            group_name: record.group_name.clone(),
            details,
            secondary_exposures: record.secondary_exposures.clone(),
            is_user_in_experiment: record.is_user_in_experiment,
            is_experiment_active: record.is_experiment_active,
        }
    }

    /// Synthesized result for a name absent from the snapshot: an empty bag
    /// with the sentinel rule marker. Every getter resolves to its default.
    pub(crate) fn not_found(name: &str, reason: EvaluationReason) -> DynamicConfig {
        DynamicConfig {
            name: name.to_owned(),
            value: Map::new(),
            rule_id: "default".to_owned(),
            group_name: None,
            details: EvaluationDetails::new(reason),
            secondary_exposures: Vec::new(),
            is_user_in_experiment: false,
            is_experiment_active: false,
        }
    }

    pub(crate) fn overridden(name: &str, value: Map<String, Value>) -> DynamicConfig {
        DynamicConfig {
            name: name.to_owned(),
            value,
            rule_id: "override".to_owned(),
            group_name: None,
            details: EvaluationDetails::new(EvaluationReason::LocalOverride),
            secondary_exposures: Vec::new(),
            is_user_in_experiment: false,
            is_experiment_active: false,
        }
    }

    /// Gets a value from the config, falling back to the provided default
    /// value.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        values::get_bool(&self.value, key).or_default(default)
    }

    /// Gets a value from the config, falling back to the provided default
    /// value. Satisfied only by integer-valued fields that fit in `i32`.
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        values::get_int(&self.value, key).or_default(default)
    }

    /// Gets a value from the config, falling back to the provided default
    /// value. Satisfied by any integer-valued field.
    pub fn get_long(&self, key: &str, default: i64) -> i64 {
        values::get_long(&self.value, key).or_default(default)
    }

    /// Gets a value from the config, falling back to the provided default
    /// value. Integer-valued fields do not satisfy a double request.
    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        values::get_double(&self.value, key).or_default(default)
    }

    /// Gets a value from the config, falling back to the provided default
    /// value.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        values::get_string(&self.value, key).or_default(default.to_owned())
    }

    /// Gets a string array from the config, falling back to the provided
    /// default. Element order is preserved; non-string elements fall back to
    /// the default.
    pub fn get_string_array(&self, key: &str, default: Vec<String>) -> Vec<String> {
        values::get_string_array(&self.value, key).or_default(default)
    }

    /// Gets a dictionary from the config, falling back to the provided
    /// default value.
    pub fn get_dictionary(
        &self,
        key: &str,
        default: Map<String, Value>,
    ) -> Map<String, Value> {
        values::get_object(&self.value, key).or_default(default)
    }

    /// Gets a value from the config as a nested `DynamicConfig`.
    ///
    /// Always returns a facade: when the field is absent or not an object,
    /// the facade wraps an empty bag, so chained lookups resolve every leaf
    /// to its default instead of failing. Rule and exposure metadata are
    /// inherited from this config.
    pub fn get_config(&self, key: &str) -> DynamicConfig {
        let nested = values::get_object(&self.value, key).or_default(Map::new());
        DynamicConfig::nested(key, nested, &self.rule_id, self.details)
    }

    /// Facade over a nested mapping, inheriting rule and details from the
    /// parent record.
    pub(crate) fn nested(
        name: &str,
        value: Map<String, Value>,
        rule_id: &str,
        details: EvaluationDetails,
    ) -> DynamicConfig {
        DynamicConfig {
            name: name.to_owned(),
            value,
            rule_id: rule_id.to_owned(),
            group_name: None,
            details,
            secondary_exposures: Vec::new(),
            is_user_in_experiment: false,
            is_experiment_active: false,
        }
    }

    /// The whole value bag backing this config.
    pub fn get_value(&self) -> &Map<String, Value> {
        &self.value
    }

    /// The client-facing config name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the server rule that produced this result.
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    /// Experiment group the user was assigned to, if any.
    pub fn group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }

    /// Where this result came from.
    pub fn details(&self) -> EvaluationDetails {
        self.details
    }

    /// Whether the user is allocated to the experiment backing this config.
    pub fn is_user_in_experiment(&self) -> bool {
        self.is_user_in_experiment
    }

    /// Whether the experiment backing this config is still active.
    pub fn is_experiment_active(&self) -> bool {
        self.is_experiment_active
    }

    pub(crate) fn secondary_exposures(&self) -> &[SecondaryExposure] {
        &self.secondary_exposures
    }
}
