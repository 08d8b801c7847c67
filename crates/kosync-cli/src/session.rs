//! Credentials and device identity for CLI sessions
//!
//! Credentials come from the environment only. The device id is generated
//! on first use and kept in the data directory so every run reports the
//! same device to the service.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use kosync_core::device::{generate_device_id, is_valid_device_id};
use kosync_core::{Config, Credentials};

const USER_VAR: &str = "KOSYNC_USER";
const PASSWORD_VAR: &str = "KOSYNC_PASSWORD";

/// Read credentials from `KOSYNC_USER` and `KOSYNC_PASSWORD`
pub fn credentials_from_env() -> Result<Credentials> {
    let username = std::env::var(USER_VAR).unwrap_or_default();
    let password = std::env::var(PASSWORD_VAR).unwrap_or_default();
    credentials_from(&username, &password)
}

fn credentials_from(username: &str, password: &str) -> Result<Credentials> {
    if username.is_empty() || password.is_empty() {
        bail!(
            "Missing credentials. Set {} and {} to your sync account.",
            USER_VAR,
            PASSWORD_VAR
        );
    }
    Ok(Credentials::from_password(username, password))
}

/// Load the persisted device id, creating one if needed
pub fn load_or_create_device_id(config: &Config) -> Result<String> {
    config.ensure_data_dir()?;
    load_or_create_at(&config.device_id_path())
}

fn load_or_create_at(path: &Path) -> Result<String> {
    if path.exists() {
        let stored = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read device id: {:?}", path))?;
        let stored = stored.trim();
        if is_valid_device_id(stored) {
            debug!(device_id = stored, "using stored device id");
            return Ok(stored.to_string());
        }
        warn!(path = ?path, "stored device id is malformed, generating a new one");
    }

    let id = generate_device_id();
    std::fs::write(path, &id).with_context(|| format!("Failed to write device id: {:?}", path))?;
    debug!(device_id = %id, "generated device id");
    Ok(id)
}
