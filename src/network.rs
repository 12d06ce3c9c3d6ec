//! The default HTTP implementation of the network collaborators: snapshot
//! fetch and log-batch delivery.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::{StatusCode, Url};

use crate::events::{LogBatch, SdkMetadata};
use crate::snapshot::SnapshotResponse;
use crate::user::User;
use crate::{Error, Result};

const INITIALIZE_ENDPOINT: &str = "/initialize";
const LOG_EVENT_ENDPOINT: &str = "/log_event";

const API_KEY_HEADER: &str = "gatekit-api-key";

// Bounds every request, which in turn bounds flush and shutdown waits.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A client for the Gatekit API.
pub(crate) struct ApiClient {
    // Client holds a connection pool internally, so we're reusing the client
    // between requests.
    client: reqwest::blocking::Client,
    initialize_url: Url,
    log_event_url: Url,
    sdk_key: String,
    /// If we receive a 401 Unauthorized error during a request, it means the
    /// SDK key is not valid. We cache this error so we don't issue additional
    /// requests to the server.
    unauthorized: AtomicBool,
}

impl ApiClient {
    pub fn new(base_url: &str, sdk_key: &str) -> Result<ApiClient> {
        let metadata = SdkMetadata::CURRENT;
        let initialize_url = Url::parse_with_params(
            &format!("{}{}", base_url, INITIALIZE_ENDPOINT),
            &[
                ("sdkName", metadata.sdk_name),
                ("sdkVersion", metadata.sdk_version),
            ],
        )
        .map_err(Error::InvalidBaseUrl)?;
        let log_event_url = Url::parse_with_params(
            &format!("{}{}", base_url, LOG_EVENT_ENDPOINT),
            &[
                ("sdkName", metadata.sdk_name),
                ("sdkVersion", metadata.sdk_version),
            ],
        )
        .map_err(Error::InvalidBaseUrl)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(ApiClient {
            client,
            initialize_url,
            log_event_url,
            sdk_key: sdk_key.to_owned(),
            unauthorized: AtomicBool::new(false),
        })
    }

    /// Fetch the evaluation snapshot for `user`.
    pub fn fetch_snapshot(&self, user: &User) -> Result<SnapshotResponse> {
        if self.unauthorized.load(Ordering::Relaxed) {
            return Err(Error::Unauthorized);
        }

        log::debug!(target: "gatekit", "fetching evaluation snapshot");
        let body = serde_json::json!({
            "user": user,
            "hash": "sha256",
            "sdkMetadata": SdkMetadata::CURRENT,
        });
        let response = self
            .client
            .post(self.initialize_url.clone())
            .header(API_KEY_HEADER, &self.sdk_key)
            .json(&body)
            .send()?;

        let response = self.check_status(response)?;
        Ok(response.json()?)
    }

    /// Deliver one log batch. Success or failure applies to the batch as a
    /// whole.
    pub fn post_events(&self, batch: &LogBatch) -> Result<()> {
        if self.unauthorized.load(Ordering::Relaxed) {
            return Err(Error::Unauthorized);
        }

        let response = self
            .client
            .post(self.log_event_url.clone())
            .header(API_KEY_HEADER, &self.sdk_key)
            .json(batch)
            .send()?;

        self.check_status(response)?;
        Ok(())
    }

    fn check_status(&self, response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
        response.error_for_status().map_err(|err| {
            if err.status() == Some(StatusCode::UNAUTHORIZED) {
                log::warn!(target: "gatekit", "client is not authorized. Check your SDK key");
                self.unauthorized.store(true, Ordering::Relaxed);
                Error::Unauthorized
            } else {
                log::warn!(target: "gatekit", "received error response from the server: {:?}", err);
                Error::from(err)
            }
        })
    }
}
