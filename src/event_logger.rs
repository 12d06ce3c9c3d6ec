//! Ordered, batched delivery of log entries to the logging transport.
//!
//! Entries are buffered in append order and flushed as whole batches when the
//! buffer reaches a threshold, when the flush timer elapses, on explicit
//! `flush()`, and on shutdown. Appends never perform I/O: threshold flushes
//! are signaled to a background thread. Failed batches are dropped and
//! counted; nothing in this pipeline surfaces to evaluation call sites.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::dynamic_config::DynamicConfig;
use crate::evaluation_details::{EvaluationDetails, EvaluationReason};
use crate::events::{
    EventValue, LogBatch, LogEvent, SdkMetadata, CONFIG_EXPOSURE_EVENT, DIAGNOSTICS_EVENT,
    GATE_EXPOSURE_EVENT, LAYER_EXPOSURE_EVENT,
};
use crate::gate::FeatureGate;
use crate::snapshot::SecondaryExposure;
use crate::transport::LogTransport;
use crate::user::User;

pub(crate) const MAX_EVENTS_BEFORE_FLUSH_ATTEMPT: usize = 50;
pub(crate) const MAX_EVENT_BUFFER_SIZE: usize = 1000;
pub(crate) const FLUSH_INTERVAL: Duration = Duration::from_secs(60);

const EXPOSURE_DEDUPE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Identity of an exposure for deduplication. Re-exposing the same result
/// within [`EXPOSURE_DEDUPE_INTERVAL`] is not logged again.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ExposureKey {
    Gate {
        name: String,
        value: bool,
        rule_id: String,
        reason: EvaluationReason,
    },
    Config {
        name: String,
        rule_id: String,
        reason: EvaluationReason,
    },
    Layer {
        name: String,
        rule_id: String,
        allocated_experiment: String,
        parameter: String,
        is_explicit: bool,
        reason: EvaluationReason,
    },
}

/// A layer parameter exposure, already attributed to the allocated experiment
/// or to the layer itself.
pub(crate) struct LayerExposure<'a> {
    pub layer_name: &'a str,
    pub rule_id: &'a str,
    pub allocated_experiment: &'a str,
    pub parameter_name: &'a str,
    pub is_explicit_parameter: bool,
    pub details: EvaluationDetails,
    pub secondary_exposures: &'a [SecondaryExposure],
}

enum Command {
    Flush,
    Stop,
}

pub(crate) struct EventLoggerConfig {
    pub transport: Box<dyn LogTransport + Send + Sync>,
    pub flush_interval: Duration,
    pub flush_threshold: usize,
    pub max_buffer_size: usize,
}

/// Accumulates log entries and delivers them to the transport in batches.
pub struct EventLogger {
    inner: Arc<Inner>,
    command_sender: SyncSender<Command>,
    timer_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

struct Inner {
    transport: Box<dyn LogTransport + Send + Sync>,
    queue: Mutex<VecDeque<LogEvent>>,
    /// Serializes flushes so batches leave in FIFO order. Held across the
    /// transport call; the queue lock is not.
    flush_lock: Mutex<()>,
    logged_exposures: Mutex<HashMap<ExposureKey, Instant>>,
    dropped_events: AtomicU64,
    flush_threshold: usize,
    max_buffer_size: usize,
}

impl EventLogger {
    pub(crate) fn new(config: EventLoggerConfig) -> EventLogger {
        let inner = Arc::new(Inner {
            transport: config.transport,
            queue: Mutex::new(VecDeque::new()),
            flush_lock: Mutex::new(()),
            logged_exposures: Mutex::new(HashMap::new()),
            dropped_events: AtomicU64::new(0),
            flush_threshold: config.flush_threshold,
            max_buffer_size: config.max_buffer_size,
        });

        // Buffer size of 1 is enough: a pending Flush command already
        // guarantees a wakeup, and Stop is retried with a blocking send.
        let (command_sender, command_receiver) = std::sync::mpsc::sync_channel::<Command>(1);

        let timer_thread = {
            let inner = Arc::clone(&inner);
            let flush_interval = config.flush_interval;
            std::thread::Builder::new()
                .name("gatekit-event-logger".to_owned())
                .spawn(move || loop {
                    match command_receiver.recv_timeout(flush_interval) {
                        Ok(Command::Flush) | Err(RecvTimeoutError::Timeout) => {
                            inner.flush(None);
                        }
                        Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => {
                            return;
                        }
                    }
                })
                .expect("failed to spawn event logger thread")
        };

        EventLogger {
            inner,
            command_sender,
            timer_thread: Mutex::new(Some(timer_thread)),
        }
    }

    /// Append an entry to the buffer. Never blocks on I/O: if the buffer
    /// reached the flush threshold, the background thread is signaled to
    /// flush.
    pub(crate) fn enqueue(&self, event: LogEvent) {
        let should_flush = {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.push_back(event);
            if queue.len() > self.inner.max_buffer_size {
                // Drop the oldest events.
                let excess = queue.len() - self.inner.max_buffer_size;
                queue.drain(..excess);
                self.inner
                    .dropped_events
                    .fetch_add(excess as u64, Ordering::Relaxed);
                log::warn!(target: "gatekit", excess; "event buffer overflow, dropping oldest events");
            }
            queue.len() >= self.inner.flush_threshold
        };

        if should_flush {
            match self.command_sender.try_send(Command::Flush) {
                Ok(()) | Err(TrySendError::Full(_)) => {
                    // A full buffer means a wakeup is already pending.
                }
                Err(TrySendError::Disconnected(_)) => {
                    // Logger is shutting down; the final drain picks the
                    // entry up.
                }
            }
        }
    }

    /// Synchronously drain the buffer through the transport.
    pub fn flush(&self) {
        self.inner.flush(None);
    }

    /// Drain the buffer and stop the flush timer.
    ///
    /// All buffered entries are attempted before this returns. The wait is
    /// bounded by `timeout`: entries that cannot be attempted before the
    /// deadline are dropped and counted, and shutdown proceeds rather than
    /// hanging the host's teardown.
    pub fn shutdown(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;

        // Stop the timer thread first so the final drain is not raced by a
        // timer flush. Ignore send failure: it means the thread is already
        // gone.
        let _ = self.command_sender.send(Command::Stop);
        let thread = self.timer_thread.lock().unwrap().take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                log::warn!(target: "gatekit", "event logger thread panicked");
            }
        }

        self.inner.flush(Some(deadline));
    }

    /// Number of entries dropped so far: buffer overflow, failed batches, and
    /// entries abandoned by a shutdown deadline.
    pub fn dropped_events(&self) -> u64 {
        self.inner.dropped_events.load(Ordering::Relaxed)
    }

    /// Forget exposure dedupe state. Called when the user changes: the same
    /// exposure for a new user is a new exposure.
    pub(crate) fn on_update_user(&self) {
        self.inner.logged_exposures.lock().unwrap().clear();
    }

    pub(crate) fn log_gate_exposure(&self, user: &User, name: &str, gate: &FeatureGate) {
        let key = ExposureKey::Gate {
            name: name.to_owned(),
            value: gate.value(),
            rule_id: gate.rule_id().to_owned(),
            reason: gate.details().reason,
        };
        if !self.should_log_exposure(key) {
            return;
        }

        let mut event = LogEvent::new(GATE_EXPOSURE_EVENT);
        event.user = Some(user.copy_for_logging());
        event.metadata = Some(HashMap::from([
            ("gate".to_owned(), name.to_owned()),
            ("gateValue".to_owned(), gate.value().to_string()),
            ("ruleID".to_owned(), gate.rule_id().to_owned()),
            ("reason".to_owned(), gate.details().reason.to_string()),
            ("time".to_owned(), gate.details().time.to_string()),
        ]));
        event.secondary_exposures = Some(gate.secondary_exposures().to_vec());
        self.enqueue(event);
    }

    pub(crate) fn log_config_exposure(&self, user: &User, name: &str, config: &DynamicConfig) {
        let key = ExposureKey::Config {
            name: name.to_owned(),
            rule_id: config.rule_id().to_owned(),
            reason: config.details().reason,
        };
        if !self.should_log_exposure(key) {
            return;
        }

        let mut event = LogEvent::new(CONFIG_EXPOSURE_EVENT);
        event.user = Some(user.copy_for_logging());
        event.metadata = Some(HashMap::from([
            ("config".to_owned(), name.to_owned()),
            ("ruleID".to_owned(), config.rule_id().to_owned()),
            ("reason".to_owned(), config.details().reason.to_string()),
            ("time".to_owned(), config.details().time.to_string()),
        ]));
        event.secondary_exposures = Some(config.secondary_exposures().to_vec());
        self.enqueue(event);
    }

    pub(crate) fn log_layer_exposure(&self, user: &User, exposure: LayerExposure<'_>) {
        let key = ExposureKey::Layer {
            name: exposure.layer_name.to_owned(),
            rule_id: exposure.rule_id.to_owned(),
            allocated_experiment: exposure.allocated_experiment.to_owned(),
            parameter: exposure.parameter_name.to_owned(),
            is_explicit: exposure.is_explicit_parameter,
            reason: exposure.details.reason,
        };
        if !self.should_log_exposure(key) {
            return;
        }

        let mut event = LogEvent::new(LAYER_EXPOSURE_EVENT);
        event.user = Some(user.copy_for_logging());
        event.metadata = Some(HashMap::from([
            ("config".to_owned(), exposure.layer_name.to_owned()),
            ("ruleID".to_owned(), exposure.rule_id.to_owned()),
            (
                "allocatedExperiment".to_owned(),
                exposure.allocated_experiment.to_owned(),
            ),
            ("parameterName".to_owned(), exposure.parameter_name.to_owned()),
            (
                "isExplicitParameter".to_owned(),
                exposure.is_explicit_parameter.to_string(),
            ),
            ("reason".to_owned(), exposure.details.reason.to_string()),
            ("time".to_owned(), exposure.details.time.to_string()),
        ]));
        event.secondary_exposures = Some(exposure.secondary_exposures.to_vec());
        self.enqueue(event);
    }

    /// Append a custom event logged by the host. Custom events are never
    /// deduplicated.
    pub(crate) fn log_event(
        &self,
        user: &User,
        event_name: &str,
        value: Option<EventValue>,
        metadata: Option<HashMap<String, String>>,
    ) {
        let mut event = LogEvent::new(event_name);
        event.user = Some(user.copy_for_logging());
        event.value = value;
        event.metadata = metadata;
        self.enqueue(event);
    }

    /// SDK lifecycle marker, enqueued at initialize time so it precedes any
    /// host-logged event in the flushed stream.
    pub(crate) fn log_diagnostics(&self, user: &User, context: &str) {
        let mut event = LogEvent::new(DIAGNOSTICS_EVENT);
        event.user = Some(user.copy_for_logging());
        event.metadata = Some(HashMap::from([(
            "context".to_owned(),
            context.to_owned(),
        )]));
        self.enqueue(event);
    }

    fn should_log_exposure(&self, key: ExposureKey) -> bool {
        let now = Instant::now();
        let mut logged = self.inner.logged_exposures.lock().unwrap();
        match logged.get(&key) {
            Some(last) if now.duration_since(*last) < EXPOSURE_DEDUPE_INTERVAL => false,
            _ => {
                logged.insert(key, now);
                true
            }
        }
    }
}

impl Inner {
    /// Drain the queue through the transport, batch by batch, preserving
    /// append order. With a deadline, entries that cannot be attempted in
    /// time are dropped and counted.
    fn flush(&self, deadline: Option<Instant>) {
        let _guard = self.flush_lock.lock().unwrap();

        loop {
            let batch: Vec<LogEvent> = {
                let mut queue = self.queue.lock().unwrap();
                queue.drain(..).collect()
            };
            if batch.is_empty() {
                return;
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                self.dropped_events
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                log::warn!(target: "gatekit",
                           count = batch.len();
                           "shutdown deadline exceeded, dropping unflushed events");
                return;
            }

            let count = batch.len();
            let batch = LogBatch {
                events: batch,
                sdk_metadata: SdkMetadata::CURRENT,
            };
            match self.transport.send_events(&batch) {
                Ok(()) => {
                    log::debug!(target: "gatekit", count; "flushed event batch");
                }
                Err(err) => {
                    // Failed batches are dropped, not re-queued; re-queueing
                    // would reorder them behind entries appended since.
                    self.dropped_events
                        .fetch_add(count as u64, Ordering::Relaxed);
                    log::warn!(target: "gatekit", count; "failed to flush event batch: {:?}", err);
                }
            }
        }
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        // Disconnect the command channel so the timer thread exits even if
        // shutdown() was never called. Buffered events are not drained here;
        // drop without shutdown is not a normal teardown.
        let thread = self.timer_thread.lock().unwrap().take();
        if thread.is_some() {
            let _ = self.command_sender.send(Command::Stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::events::LogBatch;
    use crate::user::User;
    use crate::{Error, Result};

    use super::{EventLogger, EventLoggerConfig};

    fn capturing_logger(
        flush_threshold: usize,
    ) -> (EventLogger, Arc<Mutex<Vec<Vec<String>>>>) {
        let batches: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = batches.clone();
        let logger = EventLogger::new(EventLoggerConfig {
            transport: Box::new(move |batch: &LogBatch| -> Result<()> {
                sink.lock().unwrap().push(
                    batch
                        .events
                        .iter()
                        .map(|event| event.event_name.clone())
                        .collect(),
                );
                Ok(())
            }),
            // Long enough that the timer never fires during a test.
            flush_interval: Duration::from_secs(3600),
            flush_threshold,
            max_buffer_size: 10,
        });
        (logger, batches)
    }

    #[test]
    fn shutdown_drains_in_append_order() {
        let (logger, batches) = capturing_logger(100);
        let user = User::with_user_id("123");

        logger.log_event(&user, "e1", None, None);
        logger.log_event(&user, "e2", None, None);
        logger.shutdown(Duration::from_secs(3));

        let batches = batches.lock().unwrap();
        let flat: Vec<&str> = batches
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        assert_eq!(flat, ["e1", "e2"]);
    }

    #[test]
    fn threshold_triggers_background_flush() {
        let (logger, batches) = capturing_logger(2);
        let user = User::with_user_id("123");

        logger.log_event(&user, "e1", None, None);
        logger.log_event(&user, "e2", None, None);

        // The flush happens on the background thread; poll briefly.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while batches.lock().unwrap().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        let flat: Vec<String> = batches.lock().unwrap().iter().flatten().cloned().collect();
        assert_eq!(flat, ["e1", "e2"]);
    }

    #[test]
    fn buffer_overflow_drops_oldest_and_counts() {
        let (logger, _batches) = capturing_logger(100);
        let user = User::with_user_id("123");

        for i in 0..12 {
            logger.log_event(&user, &format!("e{i}"), None, None);
        }

        // max_buffer_size is 10: the two oldest entries were dropped.
        assert_eq!(logger.dropped_events(), 2);
    }

    #[test]
    fn failed_batches_are_dropped_with_a_counter() {
        let attempts = Arc::new(AtomicU64::new(0));
        let seen = attempts.clone();
        let logger = EventLogger::new(EventLoggerConfig {
            transport: Box::new(move |batch: &LogBatch| -> Result<()> {
                seen.fetch_add(batch.events.len() as u64, Ordering::SeqCst);
                Err(Error::Uninitialized)
            }),
            flush_interval: Duration::from_secs(3600),
            flush_threshold: 100,
            max_buffer_size: 100,
        });
        let user = User::with_user_id("123");

        logger.log_event(&user, "e1", None, None);
        logger.log_event(&user, "e2", None, None);
        logger.shutdown(Duration::from_secs(3));

        // Both entries were attempted exactly once, then dropped.
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(logger.dropped_events(), 2);
    }

    #[test]
    fn exposures_are_deduplicated_until_user_changes() {
        let (logger, batches) = capturing_logger(100);
        let user = User::with_user_id("123");
        let gate = crate::gate::FeatureGate::not_found(
            "a_gate",
            crate::evaluation_details::EvaluationReason::Unrecognized,
        );

        logger.log_gate_exposure(&user, "a_gate", &gate);
        logger.log_gate_exposure(&user, "a_gate", &gate);
        logger.on_update_user();
        logger.log_gate_exposure(&user, "a_gate", &gate);
        logger.shutdown(Duration::from_secs(3));

        let count: usize = batches.lock().unwrap().iter().map(Vec::len).sum();
        assert_eq!(count, 2);
    }
}
