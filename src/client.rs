use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::dynamic_config::DynamicConfig;
use crate::evaluator::Evaluator;
use crate::event_logger::{EventLogger, EventLoggerConfig};
use crate::events::{EventValue, LogBatch};
use crate::gate::FeatureGate;
use crate::layer::Layer;
use crate::network::ApiClient;
use crate::overrides::OverrideStore;
use crate::poller::{PollerThread, PollerThreadConfig};
use crate::snapshot::{Snapshot, SnapshotResponse};
use crate::snapshot_store::SnapshotStore;
use crate::user::User;
use crate::{ClientConfig, Error, Result};

/// A client for the Gatekit API.
///
/// The client holds an evaluation snapshot for the current user and serves
/// gate/config/layer lookups from it synchronously, without a network
/// round-trip per call. Every evaluation enqueues an exposure entry into the
/// logging pipeline; the host can also log custom events.
///
/// A client is an explicitly owned object with an init/shutdown lifecycle:
/// create one per process (or several isolated ones in tests), call
/// [`initialize`](GatekitClient::initialize) (or
/// [`initialize_with_snapshot`](GatekitClient::initialize_with_snapshot)),
/// and call [`shutdown`](GatekitClient::shutdown) before teardown to drain
/// buffered log entries.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// # Examples
/// ```no_run
/// # use gatekit::{ClientConfig, GatekitClient, User};
/// # fn test() -> gatekit::Result<()> {
/// let client = ClientConfig::from_sdk_key("client-sdk-key").to_client()?;
/// client.initialize(User::with_user_id("user-1"))?;
/// if client.check_gate("new_checkout")? {
///     // ...
/// }
/// client.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct GatekitClient {
    api: Arc<ApiClient>,
    store: Arc<SnapshotStore>,
    overrides: Arc<OverrideStore>,
    logger: Arc<EventLogger>,
    evaluator: Evaluator,
    user: Arc<RwLock<User>>,
    initialized: AtomicBool,
    shutdown_timeout: Duration,
}

impl GatekitClient {
    /// Create a new `GatekitClient` using the specified configuration.
    ///
    /// The client starts with an empty snapshot; call
    /// [`initialize`](GatekitClient::initialize) before evaluating.
    pub fn new(config: ClientConfig) -> Result<GatekitClient> {
        let api = Arc::new(ApiClient::new(&config.base_url, &config.sdk_key)?);

        let transport: Box<dyn crate::LogTransport + Send + Sync> = match config.log_transport {
            Some(transport) => transport,
            None => {
                let api = Arc::clone(&api);
                Box::new(move |batch: &LogBatch| api.post_events(batch))
            }
        };
        let logger = Arc::new(EventLogger::new(EventLoggerConfig {
            transport,
            flush_interval: config.event_flush_interval,
            flush_threshold: config.event_flush_threshold,
            max_buffer_size: config.max_event_buffer_size,
        }));

        let store = Arc::new(SnapshotStore::new());
        let overrides = Arc::new(OverrideStore::new());
        let evaluator = Evaluator::new(store.clone(), overrides.clone(), logger.clone());

        Ok(GatekitClient {
            api,
            store,
            overrides,
            logger,
            evaluator,
            user: Arc::new(RwLock::new(User::default())),
            initialized: AtomicBool::new(false),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Initialize the client for `user`: fetch the evaluation snapshot and
    /// install it.
    ///
    /// An SDK lifecycle marker is enqueued before any other entry. If the
    /// fetch fails the error is returned, but the client stays usable:
    /// evaluation resolves to defaults (reason `Uninitialized`) until a
    /// snapshot is installed, e.g. by the poller.
    pub fn initialize(&self, user: User) -> Result<()> {
        self.begin(user);
        self.refresh()
    }

    /// Initialize the client with a snapshot response the host obtained
    /// through its own transport. No network request is made.
    pub fn initialize_with_snapshot(&self, user: User, response: SnapshotResponse) {
        self.begin(user);
        self.store
            .set_snapshot(Arc::new(Snapshot::from_bootstrap(response)));
    }

    fn begin(&self, user: User) {
        *self.user.write().unwrap() = user;
        let was_initialized = self.initialized.swap(true, Ordering::SeqCst);
        if !was_initialized {
            let user = self.user.read().unwrap().clone();
            self.logger.log_diagnostics(&user, "initialize");
        }
    }

    /// Switch to a new user: clears exposure dedupe state and fetches a
    /// fresh snapshot. The previous snapshot keeps serving until the new one
    /// is installed.
    pub fn update_user(&self, user: User) -> Result<()> {
        self.enforce_initialized()?;
        *self.user.write().unwrap() = user;
        self.logger.on_update_user();
        self.refresh()
    }

    fn refresh(&self) -> Result<()> {
        let user = self.user.read().unwrap().clone();
        let response = self.api.fetch_snapshot(&user)?;
        if response.has_updates {
            self.store
                .set_snapshot(Arc::new(Snapshot::from_response(response)));
        }
        Ok(())
    }

    /// Whether the named gate is on for the current user. Logs a gate
    /// exposure.
    ///
    /// Total after initialization: an unknown gate is off, never an error.
    pub fn check_gate(&self, name: &str) -> Result<bool> {
        Ok(self.get_feature_gate(name)?.value())
    }

    /// The full result of evaluating the named gate, including rule ID and
    /// evaluation details. Logs a gate exposure.
    pub fn get_feature_gate(&self, name: &str) -> Result<FeatureGate> {
        self.enforce_initialized()?;
        let user = self.user.read().unwrap().clone();
        Ok(self.evaluator.check_gate(&user, name))
    }

    /// The named dynamic config for the current user. Logs a config
    /// exposure.
    pub fn get_config(&self, name: &str) -> Result<DynamicConfig> {
        self.enforce_initialized()?;
        let user = self.user.read().unwrap().clone();
        Ok(self.evaluator.get_config(&user, name))
    }

    /// The named experiment for the current user. Experiments share the
    /// config record shape; allocation state is exposed through
    /// [`DynamicConfig::is_user_in_experiment`] and
    /// [`DynamicConfig::is_experiment_active`].
    pub fn get_experiment(&self, name: &str) -> Result<DynamicConfig> {
        self.get_config(name)
    }

    /// The named layer for the current user. Layer exposures are logged per
    /// parameter read, attributed to the allocated experiment for explicit
    /// parameters and to the layer itself otherwise.
    pub fn get_layer(&self, name: &str) -> Result<Layer> {
        self.enforce_initialized()?;
        let user = self.user.read().unwrap().clone();
        Ok(self.evaluator.get_layer(&user, name))
    }

    /// Log a custom event with an optional value and metadata. The entry is
    /// buffered and delivered with the next flush.
    pub fn log_event(
        &self,
        event_name: &str,
        value: Option<EventValue>,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<()> {
        self.enforce_initialized()?;
        let user = self.user.read().unwrap().clone();
        self.logger.log_event(&user, event_name, value, metadata);
        Ok(())
    }

    /// Synchronously flush buffered log entries through the transport.
    pub fn flush(&self) {
        self.logger.flush();
    }

    /// Drain all buffered log entries and stop the flush timer.
    ///
    /// Every buffered entry is attempted before this returns, bounded by the
    /// configured shutdown timeout; on timeout the remainder is dropped and
    /// counted rather than hanging teardown.
    pub fn shutdown(&self) {
        self.logger.shutdown(self.shutdown_timeout);
    }

    /// Start a poller thread that keeps the snapshot fresh for the current
    /// user.
    pub fn start_poller(&self) -> Result<PollerThread> {
        self.enforce_initialized()?;
        PollerThread::start(PollerThreadConfig {
            store: self.store.clone(),
            api: self.api.clone(),
            user: self.user.clone(),
        })
    }

    /// Force the named gate to `value` locally. Applies until removed; the
    /// result carries rule ID `"override"`.
    pub fn override_gate(&self, name: &str, value: bool) {
        self.overrides.set_gate(name, value);
    }

    /// Force the named config to `value` locally.
    pub fn override_config(&self, name: &str, value: Map<String, Value>) {
        self.overrides.set_config(name, value);
    }

    /// Force the named layer to `value` locally. Overridden layers log no
    /// parameter exposures.
    pub fn override_layer(&self, name: &str, value: Map<String, Value>) {
        self.overrides.set_layer(name, value);
    }

    /// Remove any local override stored under `name`.
    pub fn remove_override(&self, name: &str) {
        self.overrides.remove(name);
    }

    /// Remove all local overrides.
    pub fn remove_all_overrides(&self) {
        self.overrides.remove_all();
    }

    /// Number of log entries dropped so far (buffer overflow, failed
    /// batches, shutdown timeout).
    pub fn dropped_events(&self) -> u64 {
        self.logger.dropped_events()
    }

    fn enforce_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Uninitialized)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::events::LogEvent;
    use crate::snapshot::SnapshotResponse;
    use crate::user::User;
    use crate::{ClientConfig, Error, GatekitClient, LogBatch, Result};

    fn capturing_client() -> (GatekitClient, Arc<Mutex<Vec<LogEvent>>>) {
        let events: Arc<Mutex<Vec<LogEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut config = ClientConfig::from_sdk_key("client-test");
        // Nothing listens here: tests bootstrap snapshots and capture batches
        // through the transport below, and any accidental network call fails
        // fast.
        config.base_url("http://localhost:1");
        config.log_transport(move |batch: &LogBatch| -> Result<()> {
            sink.lock().unwrap().extend(batch.events.iter().cloned());
            Ok(())
        });
        let client = config.to_client().unwrap();
        (client, events)
    }

    fn snapshot() -> SnapshotResponse {
        serde_json::from_str(
            r#"
              {
                "featureGates": {
                  "true_gate!": {
                    "name": "true_gate!",
                    "value": true,
                    "ruleID": "rule_1",
                    "secondaryExposures": [
                      {"gate": "dependent_gate", "gateValue": "true", "ruleID": "rule_id_1"}
                    ]
                  },
                  "false_gate!": {"name": "false_gate!", "value": false, "ruleID": "rule_2"}
                },
                "dynamicConfigs": {
                  "config!": {
                    "name": "config!",
                    "value": {
                      "a_bool": true,
                      "an_int": 1,
                      "a_double": 1.0,
                      "a_string": "val",
                      "an_array": ["a", "b"],
                      "an_object": {"a_key": "val"}
                    },
                    "ruleID": "default"
                  }
                },
                "layerConfigs": {
                  "layer!": {
                    "name": "layer!",
                    "value": {"an_int": 99, "a_string": "value"},
                    "ruleID": "default",
                    "secondaryExposures": [
                      {"gate": "holdout", "gateValue": "true", "ruleID": "h_rule"}
                    ],
                    "undelegatedSecondaryExposures": [
                      {"gate": "targeting", "gateValue": "true", "ruleID": "t_rule"}
                    ],
                    "allocatedExperimentName": "the_allocated_exp",
                    "explicitParameters": ["an_int"]
                  }
                },
                "hashUsed": "none",
                "time": 1
              }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn evaluation_before_initialize_is_an_error() {
        let (client, _events) = capturing_client();

        assert!(matches!(client.check_gate("gate"), Err(Error::Uninitialized)));
        assert!(matches!(client.get_config("config"), Err(Error::Uninitialized)));
        assert!(matches!(client.get_layer("layer"), Err(Error::Uninitialized)));
        assert!(matches!(
            client.log_event("event", None, None),
            Err(Error::Uninitialized)
        ));
    }

    #[test]
    fn gates_resolve_by_client_facing_name() {
        let (client, _events) = capturing_client();
        client.initialize_with_snapshot(User::with_user_id("123"), snapshot());

        assert!(client.check_gate("true_gate").unwrap());
        assert!(!client.check_gate("false_gate").unwrap());
        // Absent names are off, not errors.
        assert!(!client.check_gate("not_a_valid_gate_name").unwrap());
    }

    #[test]
    fn configs_round_trip_typed_values() {
        let (client, _events) = capturing_client();
        client.initialize_with_snapshot(User::with_user_id("123"), snapshot());

        let config = client.get_config("config").unwrap();
        assert_eq!(config.name(), "config");
        assert_eq!(config.rule_id(), "default");
        assert!(config.get_bool("a_bool", false));
        assert_eq!(config.get_int("an_int", 0), 1);
        assert_eq!(config.get_long("an_int", 0), 1);
        assert_eq!(config.get_double("a_double", 0.0), 1.0);
        assert_eq!(config.get_string("a_string", "err"), "val");
        assert_eq!(
            config.get_string_array("an_array", vec![]),
            vec!["a".to_owned(), "b".to_owned()]
        );

        let nested = config.get_config("an_object");
        assert_eq!(nested.get_string("a_key", "err"), "val");
    }

    #[test]
    fn absent_config_resolves_every_getter_to_defaults() {
        let (client, _events) = capturing_client();
        client.initialize_with_snapshot(User::with_user_id("123"), snapshot());

        let config = client.get_config("not_a_valid_config").unwrap();
        assert_eq!(config.name(), "not_a_valid_config");
        assert_eq!(config.rule_id(), "default");
        assert!(!config.get_bool("anything", false));
        assert_eq!(config.get_int("anything", 12), 12);
        assert_eq!(config.get_string("anything", "fallback"), "fallback");
        assert_eq!(
            config.details().reason,
            crate::EvaluationReason::Unrecognized
        );
    }

    #[test]
    fn flushed_stream_preserves_append_order_with_marker_first() {
        let (client, events) = capturing_client();
        client.initialize_with_snapshot(User::with_user_id("123"), snapshot());

        assert!(client.check_gate("true_gate").unwrap());
        client
            .log_event("test_event1", Some(1.0.into()), Some(HashMap::from([
                ("key".to_owned(), "value".to_owned()),
            ])))
            .unwrap();
        client.log_event("test_event2", Some("1".into()), None).unwrap();
        client.shutdown();

        let events = events.lock().unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "gatekit::diagnostics",
                "gatekit::gate_exposure",
                "test_event1",
                "test_event2",
            ]
        );

        let exposure = &events[1];
        let metadata = exposure.metadata.as_ref().unwrap();
        assert_eq!(metadata["gate"], "true_gate");
        assert_eq!(metadata["gateValue"], "true");
        assert_eq!(metadata["ruleID"], "rule_1");
        assert_eq!(
            exposure.secondary_exposures.as_ref().unwrap()[0].gate,
            "dependent_gate"
        );
        assert_eq!(
            exposure.user.as_ref().unwrap().user_id.as_deref(),
            Some("123")
        );

        let custom = &events[2];
        assert_eq!(custom.value, Some(1.0.into()));
        assert_eq!(custom.metadata.as_ref().unwrap()["key"], "value");
        assert!(custom.secondary_exposures.is_none());
    }

    #[test]
    fn layer_parameter_reads_attribute_exposures() {
        let (client, events) = capturing_client();
        client.initialize_with_snapshot(User::with_user_id("123"), snapshot());

        let layer = client.get_layer("layer").unwrap();
        assert_eq!(layer.get_int("an_int", 0), 99);
        assert_eq!(layer.get_string("a_string", "err"), "value");
        // Resolving to the default logs nothing.
        assert_eq!(layer.get_string("missing", "d"), "d");
        assert_eq!(layer.get_string("an_int", "d"), "d");
        client.shutdown();

        let events = events.lock().unwrap();
        let exposures: Vec<&LogEvent> = events
            .iter()
            .filter(|e| e.event_name == "gatekit::layer_exposure")
            .collect();
        assert_eq!(exposures.len(), 2);

        let explicit = exposures[0].metadata.as_ref().unwrap();
        assert_eq!(explicit["config"], "layer");
        assert_eq!(explicit["parameterName"], "an_int");
        assert_eq!(explicit["isExplicitParameter"], "true");
        assert_eq!(explicit["allocatedExperiment"], "the_allocated_exp");
        assert_eq!(
            exposures[0].secondary_exposures.as_ref().unwrap()[0].gate,
            "holdout"
        );

        let implicit = exposures[1].metadata.as_ref().unwrap();
        assert_eq!(implicit["parameterName"], "a_string");
        assert_eq!(implicit["isExplicitParameter"], "false");
        assert_eq!(implicit["allocatedExperiment"], "");
        assert_eq!(
            exposures[1].secondary_exposures.as_ref().unwrap()[0].gate,
            "targeting"
        );
    }

    #[test]
    fn shutdown_drains_all_custom_events() {
        let (client, events) = capturing_client();
        client.initialize_with_snapshot(User::with_user_id("123"), snapshot());

        for i in 0..20 {
            client
                .log_event(&format!("event_{i}"), None, None)
                .unwrap();
        }
        client.shutdown();

        let events = events.lock().unwrap();
        let custom: Vec<&str> = events
            .iter()
            .map(|e| e.event_name.as_str())
            .filter(|name| name.starts_with("event_"))
            .collect();
        let expected: Vec<String> = (0..20).map(|i| format!("event_{i}")).collect();
        assert_eq!(custom, expected);
        assert_eq!(client.dropped_events(), 0);
    }

    #[test]
    fn overrides_take_precedence_until_removed() {
        let (client, _events) = capturing_client();
        client.initialize_with_snapshot(User::with_user_id("123"), snapshot());

        client.override_gate("false_gate", true);
        let gate = client.get_feature_gate("false_gate").unwrap();
        assert!(gate.value());
        assert_eq!(gate.rule_id(), "override");
        assert_eq!(
            gate.details().reason,
            crate::EvaluationReason::LocalOverride
        );

        client.remove_override("false_gate");
        assert!(!client.check_gate("false_gate").unwrap());
    }

    #[test]
    fn stale_snapshot_serves_after_failed_refresh() {
        // update_user hits the network and fails (nothing is listening), but
        // the previously installed snapshot keeps serving.
        let (client, _events) = capturing_client();
        client.initialize_with_snapshot(User::with_user_id("123"), snapshot());

        // Dedupe state is per user, and the refresh failure is reported...
        assert!(client.update_user(User::with_user_id("456")).is_err());
        // ...while evaluation stays total on the stale snapshot.
        assert!(client.check_gate("true_gate").unwrap());
    }
}
