//! The Rust SDK for Gatekit, a feature gating and experimentation platform.
//!
//! # Overview
//!
//! The SDK revolves around a [`GatekitClient`] that answers three questions
//! for the current [`User`]: is a gate on ([`GatekitClient::check_gate`]),
//! what config values apply ([`GatekitClient::get_config`]), and what
//! layer/experiment parameters apply ([`GatekitClient::get_layer`]). Answers
//! are served from a locally cached snapshot of server-computed evaluation
//! results, so no evaluation call ever waits on the network.
//!
//! Every evaluation enqueues an exposure entry, and the host can log custom
//! events with [`GatekitClient::log_event`]. Entries are buffered and
//! delivered to the logging transport in ordered batches; calling
//! [`GatekitClient::shutdown`] drains the buffer before teardown.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! Evaluation is total: missing names and mismatched field types resolve to
//! caller-supplied defaults, never errors. The only error an evaluation call
//! can return is [`Error::Uninitialized`], for calls made before
//! [`GatekitClient::initialize`].
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for
//! diagnostic messages. Consider integrating a `log`-compatible logger
//! implementation for better visibility into SDK operations.
//!
//! # Examples
//!
//! A runnable example can be found in the `demos` directory of the crate
//! repository.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod client;
mod config;
mod dynamic_config;
mod error;
mod evaluation_details;
mod event_logger;
mod events;
mod evaluator;
mod gate;
pub mod hashing;
mod layer;
mod network;
mod overrides;
mod poller;
mod snapshot;
mod snapshot_store;
mod transport;
mod user;
mod values;

pub use client::GatekitClient;
pub use config::ClientConfig;
pub use dynamic_config::DynamicConfig;
pub use error::{Error, Result};
pub use evaluation_details::{EvaluationDetails, EvaluationReason};
pub use events::{EventValue, LogBatch, LogEvent, SdkMetadata};
pub use gate::FeatureGate;
pub use layer::Layer;
pub use poller::PollerThread;
pub use snapshot::{
    ConfigRecord, GateRecord, SecondaryExposure, Snapshot, SnapshotResponse, TryParse,
};
pub use transport::LogTransport;
pub use user::{AttributeValue, Attributes, User};
