//! Server-computed evaluation results: the wire format and the immutable,
//! lookup-ready form installed into the snapshot store.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::evaluation_details::EvaluationReason;
use crate::hashing::{hashed_name, HashAlgorithm};

/// `TryParse` allows a subfield to fail parsing without failing the parsing
/// of the whole structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TryParse<T> {
    /// The record parsed successfully.
    Parsed(T),
    /// The raw JSON of a record that did not match the expected shape.
    ParseFailed(Value),
}

impl<T> From<TryParse<T>> for Option<T> {
    fn from(value: TryParse<T>) -> Self {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

/// A reference to another evaluation this result depends on (e.g. a holdout
/// or targeting gate), reported alongside exposures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecondaryExposure {
    /// Name of the gate this evaluation depended on.
    pub gate: String,
    /// The value that gate evaluated to, as a string.
    #[serde(rename = "gateValue")]
    pub gate_value: String,
    /// The rule that produced that value.
    #[serde(rename = "ruleID")]
    pub rule_id: String,
}

/// Server-computed result for a single feature gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateRecord {
    /// Server-qualified name; may differ from the client-facing name.
    #[serde(default)]
    pub name: String,
    /// Whether the gate is on for the user the snapshot was computed for.
    #[serde(default)]
    pub value: bool,
    /// Identifier of the server rule that produced this result.
    #[serde(rename = "ruleID", default)]
    pub rule_id: String,
    /// Evaluations this result depends on.
    #[serde(default)]
    pub secondary_exposures: Vec<SecondaryExposure>,
}

/// Server-computed result for a dynamic config, experiment or layer.
///
/// The same record shape serves all three: the layer-only fields
/// (`undelegated_secondary_exposures`, `allocated_experiment_name`,
/// `explicit_parameters`) default to empty for plain configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    /// Server-qualified name; may differ from the client-facing name.
    #[serde(default)]
    pub name: String,
    /// The value bag: field name to untyped value.
    #[serde(default)]
    pub value: Map<String, Value>,
    /// Identifier of the server rule that produced this result.
    #[serde(rename = "ruleID", default)]
    pub rule_id: String,
    /// Experiment group the user was assigned to, if any.
    #[serde(default)]
    pub group_name: Option<String>,
    /// Evaluations this result depends on.
    #[serde(default)]
    pub secondary_exposures: Vec<SecondaryExposure>,
    /// Dependency exposures to report for layer-default parameter reads.
    #[serde(default)]
    pub undelegated_secondary_exposures: Vec<SecondaryExposure>,
    /// Whether the user is allocated to the backing experiment.
    #[serde(default)]
    pub is_user_in_experiment: bool,
    /// Whether the backing experiment is still active.
    #[serde(default)]
    pub is_experiment_active: bool,
    /// Experiment allocated for this layer, if any. Layers only.
    #[serde(default)]
    pub allocated_experiment_name: Option<String>,
    /// Field names legally sourced from the allocated experiment rather than
    /// the layer defaults.
    #[serde(default)]
    pub explicit_parameters: Vec<String>,
}

/// The evaluation snapshot as returned by the server.
///
/// Record keys are digests of the client-facing names per `hash_used`. Field
/// absence is legal everywhere and maps to default behavior, not failure.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    /// Gate results, keyed by digested name.
    #[serde(default)]
    pub feature_gates: HashMap<String, TryParse<GateRecord>>,
    /// Config and experiment results, keyed by digested name.
    #[serde(default)]
    pub dynamic_configs: HashMap<String, TryParse<ConfigRecord>>,
    /// Layer results, keyed by digested name.
    #[serde(default)]
    pub layer_configs: HashMap<String, TryParse<ConfigRecord>>,
    /// The algorithm the server applied to record keys.
    #[serde(default)]
    pub hash_used: HashAlgorithm,
    /// Server-side generation time, also used as a version token.
    #[serde(default)]
    pub time: u64,
    /// False when the server had nothing newer than what the client holds.
    #[serde(default = "default_has_updates")]
    pub has_updates: bool,
}

fn default_has_updates() -> bool {
    true
}

/// An installed snapshot: immutable, shared by `Arc`, replaced as a whole.
#[derive(Debug)]
pub struct Snapshot {
    gates: HashMap<String, GateRecord>,
    configs: HashMap<String, ConfigRecord>,
    layers: HashMap<String, ConfigRecord>,
    hash_used: HashAlgorithm,
    /// Whether this snapshot was fetched from the server or supplied by the
    /// host, reported in evaluation details.
    pub(crate) reason: EvaluationReason,
    /// Server version token of this snapshot.
    pub time: u64,
    /// When this snapshot was received by the client.
    pub received_at: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot from a server response.
    pub fn from_response(response: SnapshotResponse) -> Snapshot {
        Snapshot::build(response, EvaluationReason::Network)
    }

    /// Build a snapshot from a response the host obtained through its own
    /// transport.
    pub fn from_bootstrap(response: SnapshotResponse) -> Snapshot {
        Snapshot::build(response, EvaluationReason::Bootstrap)
    }

    fn build(response: SnapshotResponse, reason: EvaluationReason) -> Snapshot {
        let hash_used = response.hash_used;
        Snapshot {
            gates: collect_records(response.feature_gates, hash_used),
            configs: collect_records(response.dynamic_configs, hash_used),
            layers: collect_records(response.layer_configs, hash_used),
            hash_used,
            reason,
            time: response.time,
            received_at: Utc::now(),
        }
    }

    /// Look up a gate record by its client-facing name.
    pub fn gate(&self, name: &str) -> Option<&GateRecord> {
        self.gates.get(&self.lookup_key(name))
    }

    /// Look up a config or experiment record by its client-facing name.
    pub fn config(&self, name: &str) -> Option<&ConfigRecord> {
        self.configs.get(&self.lookup_key(name))
    }

    /// Look up a layer record by its client-facing name.
    pub fn layer(&self, name: &str) -> Option<&ConfigRecord> {
        self.layers.get(&self.lookup_key(name))
    }

    fn lookup_key(&self, name: &str) -> String {
        hashed_name(name, self.hash_used)
    }
}

/// Drop records that failed to parse and normalize keys for lookup.
///
/// With `HashAlgorithm::None` the server keys are plain names that may carry
/// a trailing `!` rule-versioning qualifier; the qualifier is stripped here so
/// records are keyed by the client-facing name and the qualifier never reaches
/// the host. Digest keys are kept verbatim.
fn collect_records<T>(
    wire: HashMap<String, TryParse<T>>,
    hash_used: HashAlgorithm,
) -> HashMap<String, T> {
    wire.into_iter()
        .filter_map(|(key, record)| match record {
            TryParse::Parsed(record) => {
                let key = match hash_used {
                    HashAlgorithm::None => key.strip_suffix('!').unwrap_or(&key).to_owned(),
                    _ => key,
                };
                Some((key, record))
            }
            TryParse::ParseFailed(_) => {
                log::warn!(target: "gatekit", key; "dropping snapshot record that failed to parse");
                None
            }
        })
        .collect()
}
