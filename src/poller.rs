//! A background thread that periodically refetches the evaluation snapshot
//! for the current user and installs it into the snapshot store.
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::Duration;

use rand::{thread_rng, Rng};

use crate::network::ApiClient;
use crate::snapshot::Snapshot;
use crate::snapshot_store::SnapshotStore;
use crate::user::User;
use crate::{Error, Result};

pub(crate) struct PollerThreadConfig {
    pub store: Arc<SnapshotStore>,
    pub api: Arc<ApiClient>,
    pub user: Arc<RwLock<User>>,
}

const POLL_INTERVAL: Duration = Duration::from_secs(60);
const POLL_JITTER: Duration = Duration::from_secs(10);

/// A snapshot poller thread.
///
/// Use `GatekitClient::start_poller` to get an instance of it. Evaluation
/// calls are decoupled from the refresh: the poller installs each new
/// snapshot atomically and readers never block on it.
pub struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the poller thread.
    stop_sender: std::sync::mpsc::Sender<()>,

    /// Holds `None` if a snapshot hasn't been fetched yet. Holds
    /// `Some(Ok(()))` after the first successful fetch. Holds `Some(Err(..))`
    /// if the first fetch failed with an unrecoverable error.
    result: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

impl PollerThread {
    pub(crate) fn start(config: PollerThreadConfig) -> Result<PollerThread> {
        let (stop_sender, stop_receiver) = std::sync::mpsc::channel::<()>();

        let result = Arc::new((Mutex::new(None), Condvar::new()));

        let join_handle = {
            // Cloning Arc for move into thread
            let result = Arc::clone(&result);
            let update_result = move |value| {
                *result.0.lock().unwrap() = Some(value);
                result.1.notify_all();
            };

            std::thread::Builder::new()
                .name("gatekit-poller".to_owned())
                .spawn(move || loop {
                    log::debug!(target: "gatekit", "fetching new snapshot");
                    let user = config.user.read().unwrap().clone();
                    match config.api.fetch_snapshot(&user) {
                        Ok(response) => {
                            if response.has_updates {
                                config
                                    .store
                                    .set_snapshot(Arc::new(Snapshot::from_response(response)));
                            }
                            update_result(Ok(()));
                        }
                        Err(err @ Error::Unauthorized) => {
                            // Unauthorized means that the SDK key is not
                            // valid and thus is not recoverable. Stop the
                            // poller thread.
                            update_result(Err(err));
                            return;
                        }
                        Err(err) => {
                            // Other errors are retryable: the stale snapshot
                            // keeps serving reads until a fetch succeeds.
                            log::warn!(target: "gatekit", "error while fetching new snapshot: {:?}", err);
                        }
                    }

                    let timeout = jitter(POLL_INTERVAL, POLL_JITTER);
                    match stop_receiver.recv_timeout(timeout) {
                        Err(RecvTimeoutError::Timeout) => {
                            // Timed out. Loop to fetch a new snapshot.
                        }
                        Ok(()) => {
                            log::debug!(target: "gatekit", "poller thread received stop command");
                            return;
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            // When the other end of channel disconnects,
                            // calls to .recv_timeout() return immediately.
                            // Use normal thread sleep in this case.
                            std::thread::sleep(timeout);
                        }
                    }
                })?
        };

        Ok(PollerThread {
            join_handle,
            stop_sender,
            result,
        })
    }

    /// Block waiting for the first snapshot fetch to complete.
    pub fn wait_for_snapshot(&self) -> Result<()> {
        let mut lock = self
            .result
            .0
            .lock()
            .map_err(|_| Error::BackgroundThreadPanicked)?;
        loop {
            match &*lock {
                Some(result) => {
                    // The poller has already fetched a snapshot. Return
                    // Ok(()) or a possible error.
                    return result.clone();
                }
                None => {
                    // Block waiting for the snapshot to get fetched.
                    lock = self
                        .result
                        .1
                        .wait(lock)
                        .map_err(|_| Error::BackgroundThreadPanicked)?;
                }
            }
        }
    }

    /// Stop the poller thread.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        // Error means that the receiver was dropped (thread exited). Ignoring
        // it as there's nothing useful we can do.
        let _ = self.stop_sender.send(());
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// If you don't need to wait for the thread to exit, use
    /// [`PollerThread::stop`] instead.
    pub fn shutdown(self) -> Result<()> {
        // Send stop signal in case it wasn't sent before.
        self.stop();

        // Error means that the thread has panicked and there's nothing useful
        // we can do in that case.
        self.join_handle
            .join()
            .map_err(|_| Error::BackgroundThreadPanicked)?;

        Ok(())
    }
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}
