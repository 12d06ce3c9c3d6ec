//! Evaluation: name lookup against the current snapshot, default synthesis
//! for unknown names, facade construction, and the exposure side effect.
use std::sync::Arc;

use crate::dynamic_config::DynamicConfig;
use crate::evaluation_details::{EvaluationDetails, EvaluationReason};
use crate::event_logger::EventLogger;
use crate::gate::FeatureGate;
use crate::layer::Layer;
use crate::overrides::OverrideStore;
use crate::snapshot::Snapshot;
use crate::snapshot_store::SnapshotStore;
use crate::user::User;

/// Evaluates gates, configs and layers against the current snapshot and
/// enqueues the corresponding exposure entries.
///
/// Evaluation is synchronous and non-blocking: it reads the in-memory
/// snapshot and appends to the in-memory event buffer, never touching the
/// network. Every call returns a usable facade; absence from the snapshot
/// synthesizes defaults and is logged as an exposure of its own.
pub(crate) struct Evaluator {
    store: Arc<SnapshotStore>,
    overrides: Arc<OverrideStore>,
    logger: Arc<EventLogger>,
}

impl Evaluator {
    pub fn new(
        store: Arc<SnapshotStore>,
        overrides: Arc<OverrideStore>,
        logger: Arc<EventLogger>,
    ) -> Evaluator {
        Evaluator {
            store,
            overrides,
            logger,
        }
    }

    pub fn check_gate(&self, user: &User, name: &str) -> FeatureGate {
        let gate = if let Some(value) = self.overrides.gate(name) {
            FeatureGate::overridden(name, value)
        } else {
            match self.store.get_snapshot() {
                Some(snapshot) => match snapshot.gate(name) {
                    Some(record) => {
                        FeatureGate::from_record(name, record, details_for(&snapshot))
                    }
                    None => FeatureGate::not_found(name, EvaluationReason::Unrecognized),
                },
                None => FeatureGate::not_found(name, EvaluationReason::Uninitialized),
            }
        };

        self.logger.log_gate_exposure(user, name, &gate);
        gate
    }

    pub fn get_config(&self, user: &User, name: &str) -> DynamicConfig {
        let config = if let Some(value) = self.overrides.config(name) {
            DynamicConfig::overridden(name, value)
        } else {
            match self.store.get_snapshot() {
                Some(snapshot) => match snapshot.config(name) {
                    Some(record) => {
                        DynamicConfig::from_record(name, record, details_for(&snapshot))
                    }
                    None => DynamicConfig::not_found(name, EvaluationReason::Unrecognized),
                },
                None => DynamicConfig::not_found(name, EvaluationReason::Uninitialized),
            }
        };

        self.logger.log_config_exposure(user, name, &config);
        config
    }

    /// Layers log exposures per parameter read, not at evaluation time, so
    /// the returned facade carries what it needs to attribute them.
    pub fn get_layer(&self, user: &User, name: &str) -> Layer {
        if let Some(value) = self.overrides.layer(name) {
            return Layer::overridden(name, value, user.clone());
        }
        match self.store.get_snapshot() {
            Some(snapshot) => match snapshot.layer(name) {
                Some(record) => Layer::from_record(
                    name,
                    record,
                    details_for(&snapshot),
                    user.clone(),
                    self.logger.clone(),
                ),
                None => Layer::not_found(
                    name,
                    EvaluationReason::Unrecognized,
                    user.clone(),
                    self.logger.clone(),
                ),
            },
            None => Layer::not_found(
                name,
                EvaluationReason::Uninitialized,
                user.clone(),
                self.logger.clone(),
            ),
        }
    }
}

fn details_for(snapshot: &Snapshot) -> EvaluationDetails {
    EvaluationDetails::new(snapshot.reason)
}
