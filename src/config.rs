use std::time::Duration;

use crate::event_logger::{FLUSH_INTERVAL, MAX_EVENTS_BEFORE_FLUSH_ATTEMPT, MAX_EVENT_BUFFER_SIZE};
use crate::transport::{LogTransport, NoopLogTransport};
use crate::{GatekitClient, Result};

/// Configuration for [`GatekitClient`].
pub struct ClientConfig {
    pub(crate) sdk_key: String,
    pub(crate) base_url: String,
    pub(crate) event_flush_interval: Duration,
    pub(crate) event_flush_threshold: usize,
    pub(crate) max_event_buffer_size: usize,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) log_transport: Option<Box<dyn LogTransport + Send + Sync>>,
}

impl ClientConfig {
    /// Default base URL for API calls.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.gatekit.dev/v1";

    /// Default bound on the final flush performed by shutdown.
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

    /// Create a default Gatekit configuration using the specified SDK key.
    ///
    /// ```
    /// # use gatekit::ClientConfig;
    /// ClientConfig::from_sdk_key("client-sdk-key");
    /// ```
    pub fn from_sdk_key(sdk_key: impl Into<String>) -> Self {
        ClientConfig {
            sdk_key: sdk_key.into(),
            base_url: ClientConfig::DEFAULT_BASE_URL.to_owned(),
            event_flush_interval: FLUSH_INTERVAL,
            event_flush_threshold: MAX_EVENTS_BEFORE_FLUSH_ATTEMPT,
            max_event_buffer_size: MAX_EVENT_BUFFER_SIZE,
            shutdown_timeout: ClientConfig::DEFAULT_SHUTDOWN_TIMEOUT,
            log_transport: None,
        }
    }

    /// Override base URL for API calls. Clients should use the default
    /// setting in most cases.
    pub fn base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the default HTTP log transport with a custom one.
    ///
    /// The transport receives whole batches and reports success or failure
    /// per batch; implementations should bound their own I/O time.
    ///
    /// ```
    /// # use gatekit::{ClientConfig, LogBatch};
    /// let mut config = ClientConfig::from_sdk_key("client-sdk-key");
    /// config.log_transport(|batch: &LogBatch| -> gatekit::Result<()> {
    ///     println!("{} events", batch.events.len());
    ///     Ok(())
    /// });
    /// ```
    pub fn log_transport(
        &mut self,
        transport: impl LogTransport + Send + Sync + 'static,
    ) -> &mut Self {
        self.log_transport = Some(Box::new(transport));
        self
    }

    /// Discard log entries instead of delivering them. Exposures and custom
    /// events are still buffered and drained, but every batch is dropped at
    /// the transport.
    pub fn disable_event_logging(&mut self) -> &mut Self {
        self.log_transport = Some(Box::new(NoopLogTransport));
        self
    }

    /// How often the event buffer is flushed in the absence of other
    /// triggers.
    pub fn event_flush_interval(&mut self, interval: Duration) -> &mut Self {
        self.event_flush_interval = interval;
        self
    }

    /// Buffer size at which a background flush is triggered.
    pub fn event_flush_threshold(&mut self, threshold: usize) -> &mut Self {
        self.event_flush_threshold = threshold;
        self
    }

    /// Hard cap on buffered events; the oldest entries beyond it are dropped
    /// and counted.
    pub fn max_event_buffer_size(&mut self, size: usize) -> &mut Self {
        self.max_event_buffer_size = size;
        self
    }

    /// Bound on the final flush performed by `shutdown`.
    pub fn shutdown_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Create a new [`GatekitClient`] using the specified configuration.
    pub fn to_client(self) -> Result<GatekitClient> {
        GatekitClient::new(self)
    }
}
