use std::sync::Arc;

use serde_json::{Map, Value};

use crate::dynamic_config::DynamicConfig;
use crate::evaluation_details::{EvaluationDetails, EvaluationReason};
use crate::event_logger::{EventLogger, LayerExposure};
use crate::snapshot::{ConfigRecord, SecondaryExposure};
use crate::user::User;
use crate::values::{self, Resolution};

/// The result of evaluating a layer for a user.
///
/// A layer parameter may be sourced from an allocated experiment or from the
/// layer defaults. Reading a parameter through the typed getters logs a layer
/// exposure attributed accordingly; reads that fall back to the caller
/// default log nothing.
#[derive(Clone)]
pub struct Layer {
    name: String,
    value: Map<String, Value>,
    rule_id: String,
    details: EvaluationDetails,
    secondary_exposures: Vec<SecondaryExposure>,
    undelegated_secondary_exposures: Vec<SecondaryExposure>,
    is_user_in_experiment: bool,
    is_experiment_active: bool,
    allocated_experiment_name: Option<String>,
    explicit_parameters: Vec<String>,
    user: User,
    /// Absent for locally overridden layers, which log no exposures.
    logger: Option<Arc<EventLogger>>,
}

impl Layer {
    pub(crate) fn from_record(
        name: &str,
        record: &ConfigRecord,
        details: EvaluationDetails,
        user: User,
        logger: Arc<EventLogger>,
    ) -> Layer {
        Layer {
            name: name.to_owned(),
            value: record.value.clone(),
            rule_id: record.rule_id.clone(),
            details,
            secondary_exposures: record.secondary_exposures.clone(),
            undelegated_secondary_exposures: record.undelegated_secondary_exposures.clone(),
            is_user_in_experiment: record.is_user_in_experiment,
            is_experiment_active: record.is_experiment_active,
            allocated_experiment_name: record.allocated_experiment_name.clone(),
            explicit_parameters: record.explicit_parameters.clone(),
            user,
            logger: Some(logger),
        }
    }

    pub(crate) fn not_found(
        name: &str,
        reason: EvaluationReason,
        user: User,
        logger: Arc<EventLogger>,
    ) -> Layer {
        Layer {
            name: name.to_owned(),
            value: Map::new(),
            rule_id: "default".to_owned(),
            details: EvaluationDetails::new(reason),
            secondary_exposures: Vec::new(),
            undelegated_secondary_exposures: Vec::new(),
            is_user_in_experiment: false,
            is_experiment_active: false,
            allocated_experiment_name: None,
            explicit_parameters: Vec::new(),
            user,
            logger: Some(logger),
        }
    }

    pub(crate) fn overridden(name: &str, value: Map<String, Value>, user: User) -> Layer {
        Layer {
            name: name.to_owned(),
            value,
            rule_id: "override".to_owned(),
            details: EvaluationDetails::new(EvaluationReason::LocalOverride),
            secondary_exposures: Vec::new(),
            undelegated_secondary_exposures: Vec::new(),
            is_user_in_experiment: false,
            is_experiment_active: false,
            allocated_experiment_name: None,
            explicit_parameters: Vec::new(),
            user,
            logger: None,
        }
    }

    /// Gets a value from the layer, falling back to the provided default
    /// value.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.exposed(key, values::get_bool(&self.value, key))
            .or_default(default)
    }

    /// Gets a value from the layer, falling back to the provided default
    /// value. Satisfied only by integer-valued fields that fit in `i32`.
    pub fn get_int(&self, key: &str, default: i32) -> i32 {
        self.exposed(key, values::get_int(&self.value, key))
            .or_default(default)
    }

    /// Gets a value from the layer, falling back to the provided default
    /// value. Satisfied by any integer-valued field.
    pub fn get_long(&self, key: &str, default: i64) -> i64 {
        self.exposed(key, values::get_long(&self.value, key))
            .or_default(default)
    }

    /// Gets a value from the layer, falling back to the provided default
    /// value. Integer-valued fields do not satisfy a double request.
    pub fn get_double(&self, key: &str, default: f64) -> f64 {
        self.exposed(key, values::get_double(&self.value, key))
            .or_default(default)
    }

    /// Gets a value from the layer, falling back to the provided default
    /// value.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.exposed(key, values::get_string(&self.value, key))
            .or_default(default.to_owned())
    }

    /// Gets a string array from the layer, falling back to the provided
    /// default value.
    pub fn get_string_array(&self, key: &str, default: Vec<String>) -> Vec<String> {
        self.exposed(key, values::get_string_array(&self.value, key))
            .or_default(default)
    }

    /// Gets a dictionary from the layer, falling back to the provided
    /// default value.
    pub fn get_dictionary(
        &self,
        key: &str,
        default: Map<String, Value>,
    ) -> Map<String, Value> {
        self.exposed(key, values::get_object(&self.value, key))
            .or_default(default)
    }

    /// Gets a value from the layer as a nested `DynamicConfig` facade.
    ///
    /// Reading the parameter logs a layer exposure; reads on the returned
    /// facade do not log further.
    pub fn get_config(&self, key: &str) -> DynamicConfig {
        let nested = self
            .exposed(key, values::get_object(&self.value, key))
            .or_default(Map::new());
        DynamicConfig::nested(key, nested, &self.rule_id, self.details)
    }

    /// The client-facing layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the server rule that produced this result.
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    /// Where this result came from.
    pub fn details(&self) -> EvaluationDetails {
        self.details
    }

    /// Whether the user is allocated to the experiment backing this layer.
    pub fn is_user_in_experiment(&self) -> bool {
        self.is_user_in_experiment
    }

    /// Whether the experiment backing this layer is still active.
    pub fn is_experiment_active(&self) -> bool {
        self.is_experiment_active
    }

    /// Name of the experiment allocated for this layer, if any.
    pub fn allocated_experiment_name(&self) -> Option<&str> {
        self.allocated_experiment_name.as_deref()
    }

    fn exposed<T>(&self, key: &str, resolution: Resolution<T>) -> Resolution<T> {
        if resolution.is_resolved() {
            self.log_parameter_exposure(key);
        }
        resolution
    }

    fn log_parameter_exposure(&self, key: &str) {
        let Some(logger) = &self.logger else {
            return;
        };
        let attribution = attribute_parameter(
            &self.explicit_parameters,
            self.allocated_experiment_name.as_deref(),
            &self.secondary_exposures,
            &self.undelegated_secondary_exposures,
            key,
        );
        logger.log_layer_exposure(
            &self.user,
            LayerExposure {
                layer_name: &self.name,
                rule_id: &self.rule_id,
                allocated_experiment: attribution.allocated_experiment,
                parameter_name: key,
                is_explicit_parameter: attribution.is_explicit,
                details: self.details,
                secondary_exposures: attribution.secondary_exposures,
            },
        );
    }
}

pub(crate) struct ParameterAttribution<'a> {
    pub allocated_experiment: &'a str,
    pub is_explicit: bool,
    pub secondary_exposures: &'a [SecondaryExposure],
}

/// Decide what a layer parameter read is attributed to.
///
/// A parameter listed in the layer's explicit parameters while an experiment
/// is allocated came from that experiment: the exposure names the experiment
/// and carries the full secondary exposures. Any other read is a layer
/// default: attributed to the layer itself with the undelegated secondary
/// exposures.
pub(crate) fn attribute_parameter<'a>(
    explicit_parameters: &[String],
    allocated_experiment: Option<&'a str>,
    secondary_exposures: &'a [SecondaryExposure],
    undelegated_secondary_exposures: &'a [SecondaryExposure],
    parameter: &str,
) -> ParameterAttribution<'a> {
    let allocated = allocated_experiment.filter(|name| !name.is_empty());
    match allocated {
        Some(experiment) if explicit_parameters.iter().any(|p| p == parameter) => {
            ParameterAttribution {
                allocated_experiment: experiment,
                is_explicit: true,
                secondary_exposures,
            }
        }
        _ => ParameterAttribution {
            allocated_experiment: "",
            is_explicit: false,
            secondary_exposures: undelegated_secondary_exposures,
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::snapshot::SecondaryExposure;

    use super::attribute_parameter;

    fn exposure(gate: &str) -> SecondaryExposure {
        SecondaryExposure {
            gate: gate.to_owned(),
            gate_value: "true".to_owned(),
            rule_id: "rule".to_owned(),
        }
    }

    #[test]
    fn explicit_parameter_with_allocation_attributes_to_the_experiment() {
        let secondary = [exposure("holdout")];
        let undelegated = [exposure("targeting")];

        let attribution = attribute_parameter(
            &["an_int".to_owned()],
            Some("the_allocated_exp"),
            &secondary,
            &undelegated,
            "an_int",
        );

        assert!(attribution.is_explicit);
        assert_eq!(attribution.allocated_experiment, "the_allocated_exp");
        assert_eq!(attribution.secondary_exposures, &secondary[..]);
    }

    #[test]
    fn implicit_parameter_attributes_to_the_layer() {
        let secondary = [exposure("holdout")];
        let undelegated = [exposure("targeting")];

        let attribution = attribute_parameter(
            &["an_int".to_owned()],
            Some("the_allocated_exp"),
            &secondary,
            &undelegated,
            "a_string",
        );

        assert!(!attribution.is_explicit);
        assert_eq!(attribution.allocated_experiment, "");
        assert_eq!(attribution.secondary_exposures, &undelegated[..]);
    }

    #[test]
    fn explicit_parameter_without_allocation_attributes_to_the_layer() {
        let secondary = [exposure("holdout")];
        let undelegated = [exposure("targeting")];

        for allocated in [None, Some("")] {
            let attribution = attribute_parameter(
                &["an_int".to_owned()],
                allocated,
                &secondary,
                &undelegated,
                "an_int",
            );
            assert!(!attribution.is_explicit);
            assert_eq!(attribution.allocated_experiment, "");
            assert_eq!(attribution.secondary_exposures, &undelegated[..]);
        }
    }
}
