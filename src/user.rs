use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Key-value attributes describing a user.
pub type Attributes = HashMap<String, AttributeValue>;

/// A single user attribute value.
#[derive(Debug, Serialize, Deserialize, PartialEq, PartialOrd, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// The user that gates, configs and layers are evaluated for.
///
/// The server computes evaluation results per user; the snapshot held by the
/// client is only valid for the user it was fetched for. Updating the user
/// requires fetching a fresh snapshot (see `GatekitClient::update_user`).
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Primary identifier. Optional: device-scoped evaluation is possible
    /// with custom IDs only.
    #[serde(rename = "userID", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Additional unit identifiers (e.g. a company ID), keyed by ID type.
    #[serde(rename = "customIDs", default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_ids: HashMap<String, String>,

    /// Arbitrary attributes used by server-side targeting rules. Included in
    /// log entries.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: Attributes,

    /// Attributes used for targeting but stripped from anything that leaves
    /// the device through the logging pipeline.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub private_attributes: Attributes,
}

impl User {
    /// Create a user with the given primary identifier.
    pub fn with_user_id(user_id: impl Into<String>) -> User {
        User {
            user_id: Some(user_id.into()),
            ..User::default()
        }
    }

    /// Copy of this user suitable for embedding in log entries: private
    /// attributes are stripped.
    ///
    /// Log entries store the copy by value, so mutating the user afterwards
    /// cannot retroactively alter an already-queued entry.
    pub(crate) fn copy_for_logging(&self) -> User {
        User {
            user_id: self.user_id.clone(),
            custom_ids: self.custom_ids.clone(),
            custom: self.custom.clone(),
            private_attributes: HashMap::new(),
        }
    }

    /// The unit identifier used for bucketing: the custom ID of `id_type` if
    /// given, the primary user ID otherwise.
    pub fn unit_id(&self, id_type: Option<&str>) -> Option<&str> {
        match id_type {
            Some(t) => self.custom_ids.get(t).map(String::as_str),
            None => self.user_id.as_deref(),
        }
    }
}
