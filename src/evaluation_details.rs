use serde::Serialize;

/// Where an evaluation result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EvaluationReason {
    /// Served from a snapshot fetched from the server.
    Network,
    /// Served from a snapshot supplied by the host (see
    /// `GatekitClient::initialize_with_snapshot`).
    Bootstrap,
    /// A local override set by the host was applied.
    LocalOverride,
    /// The name was absent from the snapshot; defaults were synthesized.
    /// Absence is itself meaningful telemetry and is still logged.
    Unrecognized,
    /// No snapshot has been installed yet.
    Uninitialized,
}

impl EvaluationReason {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            EvaluationReason::Network => "Network",
            EvaluationReason::Bootstrap => "Bootstrap",
            EvaluationReason::LocalOverride => "LocalOverride",
            EvaluationReason::Unrecognized => "Unrecognized",
            EvaluationReason::Uninitialized => "Uninitialized",
        }
    }
}

impl std::fmt::Display for EvaluationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details attached to every evaluation result and mirrored into exposure
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluationDetails {
    /// Where the result came from.
    pub reason: EvaluationReason,
    /// Epoch milliseconds at evaluation time.
    pub time: i64,
}

impl EvaluationDetails {
    pub(crate) fn new(reason: EvaluationReason) -> EvaluationDetails {
        EvaluationDetails {
            reason,
            time: chrono::Utc::now().timestamp_millis(),
        }
    }
}
