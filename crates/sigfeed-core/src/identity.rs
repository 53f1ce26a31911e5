//! Per-connection client identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const CLIENT_ID_PREFIX: &str = "client_";
const CLIENT_ID_SUFFIX_LEN: usize = 9;

/// Short random identity generated once per connection manager.
///
/// Appended to the endpoint path and stamped onto every outbound message.
/// The same identity is reused across reconnects so the server can keep
/// correlating the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a new identity: `client_` followed by 9 lower-case
    /// alphanumerics.
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{CLIENT_ID_PREFIX}{}",
            &uuid[..CLIENT_ID_SUFFIX_LEN]
        ))
    }

    /// Wrap an existing identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
