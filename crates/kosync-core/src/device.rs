//! Device and account identity
//!
//! The sync service tags every progress record with the pushing device and
//! authenticates each request with a username and an MD5 auth key.

use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Device name used when none is configured
pub const DEFAULT_DEVICE_NAME: &str = "kosync";

/// This device as the sync service sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable identifier (32 upper-case hex characters when generated)
    pub id: String,
    /// Human-readable name shown to other devices
    pub name: String,
}

impl Device {
    /// Device with a caller-supplied identifier
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Device with a freshly generated identifier
    pub fn generate(name: impl Into<String>) -> Self {
        Self::new(generate_device_id(), name)
    }
}

/// Generate a random device identifier
pub fn generate_device_id() -> String {
    Uuid::new_v4().simple().to_string().to_ascii_uppercase()
}

/// Check that an identifier looks like one we would generate
pub fn is_valid_device_id(id: &str) -> bool {
    id.len() == 32
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b.is_ascii_uppercase() && b.is_ascii_hexdigit()))
}

/// Account credentials as sent to the service
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    /// Hex MD5 of the plaintext password
    pub auth_key: String,
}

impl Credentials {
    /// Derive credentials from a plaintext password
    pub fn from_password(username: impl Into<String>, password: &str) -> Self {
        Self {
            username: username.into(),
            auth_key: hex::encode(Md5::digest(password.as_bytes())),
        }
    }

    /// Use an already hashed auth key
    pub fn from_auth_key(username: impl Into<String>, auth_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth_key: auth_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("auth_key", &"<redacted>")
            .finish()
    }
}
