//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use kosync_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "server_url, data_dir, device_name, identity_strategy, debounce_seconds, \
                          min_page_delta, adopt_remote_threshold, request_timeout_secs, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "server_url": config.server_url,
                    "data_dir": config.data_dir,
                    "device_name": config.device_name,
                    "identity_strategy": config.identity_strategy,
                    "debounce_seconds": config.debounce_seconds,
                    "min_page_delta": config.min_page_delta,
                    "adopt_remote_threshold": config.adopt_remote_threshold,
                    "request_timeout_secs": config.request_timeout_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.server_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  server_url:             {}", config.server_url);
            println!("  data_dir:               {}", config.data_dir.display());
            println!("  device_name:            {}", config.device_name);
            println!("  identity_strategy:      {}", config.identity_strategy);
            println!("  debounce_seconds:       {}", config.debounce_seconds);
            println!("  min_page_delta:         {}", config.min_page_delta);
            println!("  adopt_remote_threshold: {}", config.adopt_remote_threshold);
            println!("  request_timeout_secs:   {}", config.request_timeout_secs);
            println!(
                "  log_file:               {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply_setting(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "server_url" => {
            if value.is_empty() {
                bail!("server_url cannot be empty");
            }
            config.server_url = value.to_string();
        }
        "data_dir" => {
            config.data_dir = value.into();
        }
        "device_name" => {
            config.device_name = value.to_string();
        }
        "identity_strategy" => {
            config.identity_strategy = value
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
        }
        "debounce_seconds" => {
            config.debounce_seconds = value
                .parse()
                .context("Invalid value for debounce_seconds. Use a whole number of seconds.")?;
        }
        "min_page_delta" => {
            config.min_page_delta = value
                .parse()
                .context("Invalid value for min_page_delta. Use a whole number of pages.")?;
        }
        "adopt_remote_threshold" => {
            let threshold: f64 = value
                .parse()
                .context("Invalid value for adopt_remote_threshold. Use a ratio such as 0.02.")?;
            if !(0.0..=1.0).contains(&threshold) {
                bail!("adopt_remote_threshold must be between 0 and 1");
            }
            config.adopt_remote_threshold = threshold;
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = value
                .parse()
                .context("Invalid value for request_timeout_secs. Use a whole number of seconds.")?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }

    Ok(())
}
