//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use zettel_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "notes_dir": config.notes_dir,
                    "rescan_interval_secs": config.rescan_interval_secs,
                    "debounce_ms": config.debounce_ms,
                    "allocation_attempts": config.allocation_attempts,
                    "allocation_backoff_ms": config.allocation_backoff_ms,
                    "log_file": config.log_file,
                    "log_level": config.log_level
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.notes_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  notes_dir:             {}", config.notes_dir.display());
            println!("  rescan_interval_secs:  {}", config.rescan_interval_secs);
            println!("  debounce_ms:           {}", config.debounce_ms);
            println!("  allocation_attempts:   {}", config.allocation_attempts);
            println!("  allocation_backoff_ms: {}", config.allocation_backoff_ms);
            println!(
                "  log_file:              {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  log_level:             {}", config.log_level);
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

    apply(&mut config, &key, &value)?;

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

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "notes_dir" => {
            config.notes_dir = value.into();
        }
        "rescan_interval_secs" => {
            config.rescan_interval_secs = parse_number(key, value)?;
        }
        "debounce_ms" => {
            config.debounce_ms = parse_number(key, value)?;
        }
        "allocation_attempts" => {
            config.allocation_attempts = parse_number(key, value)?;
        }
        "allocation_backoff_ms" => {
            config.allocation_backoff_ms = parse_number(key, value)?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        "log_level" => {
            config.log_level = value.to_string();
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: notes_dir, rescan_interval_secs, debounce_ms, \
                 allocation_attempts, allocation_backoff_ms, log_file, log_level",
                key
            );
        }
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid value for {}: expected a number", key))
}
