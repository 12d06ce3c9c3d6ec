use crate::evaluation_details::{EvaluationDetails, EvaluationReason};
use crate::snapshot::{GateRecord, SecondaryExposure};

/// The result of evaluating a feature gate for a user.
#[derive(Debug, Clone)]
pub struct FeatureGate {
    name: String,
    value: bool,
    rule_id: String,
    details: EvaluationDetails,
    secondary_exposures: Vec<SecondaryExposure>,
}

impl FeatureGate {
    pub(crate) fn from_record(
        name: &str,
        record: &GateRecord,
        details: EvaluationDetails,
    ) -> FeatureGate {
        FeatureGate {
            name: name.to_owned(),
            value: record.value,
            rule_id: record.rule_id.clone(),
            details,
            secondary_exposures: record.secondary_exposures.clone(),
        }
    }

    /// Synthesized result for a name absent from the snapshot: off, with the
    /// sentinel rule marker.
    pub(crate) fn not_found(name: &str, reason: EvaluationReason) -> FeatureGate {
        FeatureGate {
            name: name.to_owned(),
            value: false,
            rule_id: "default".to_owned(),
            details: EvaluationDetails::new(reason),
            secondary_exposures: Vec::new(),
        }
    }

    pub(crate) fn overridden(name: &str, value: bool) -> FeatureGate {
        FeatureGate {
            name: name.to_owned(),
            value,
            rule_id: "override".to_owned(),
            details: EvaluationDetails::new(EvaluationReason::LocalOverride),
            secondary_exposures: Vec::new(),
        }
    }

    /// The client-facing gate name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the gate is on for the user.
    pub fn value(&self) -> bool {
        self.value
    }

    /// Identifier of the server rule that produced this result.
    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    /// Where this result came from.
    pub fn details(&self) -> EvaluationDetails {
        self.details
    }

    pub(crate) fn secondary_exposures(&self) -> &[SecondaryExposure] {
        &self.secondary_exposures
    }
}
