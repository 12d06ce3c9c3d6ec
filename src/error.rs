use std::sync::Arc;

use thiserror::Error;

/// Result type used throughout the SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the Gatekit SDK.
///
/// Note that per-field value resolution (a missing key, a type mismatch) is
/// never an error: typed getters fall back to the caller-supplied default.
/// The only error an evaluation call can return is [`Error::Uninitialized`].
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// An evaluation or logging method was called before the client was
    /// initialized.
    #[error("client is not initialized, call initialize() first")]
    Uninitialized,

    /// Invalid base_url configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// The request was unauthorized, possibly due to an invalid SDK key.
    #[error("unauthorized, sdk_key is likely invalid")]
    Unauthorized,

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),

    /// An I/O error.
    // std::io::Error is not clonable, so we're wrapping it in an Arc.
    #[error(transparent)]
    Io(Arc<std::io::Error>),

    /// Indicates that a background thread panicked. This should normally
    /// never happen.
    #[error("background thread panicked")]
    BackgroundThreadPanicked,
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}
