//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use mdstudio_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!(config));
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:           {}", config.data_dir.display());
            println!("  api_url:            {}", config.api_url);
            println!("  repo_name:          {}", config.repo_name);
            println!("  debounce_ms:        {}", config.debounce_ms);
            println!("  max_backoff_secs:   {}", config.max_backoff_secs);
            println!("  provision_delay_ms: {}", config.provision_delay_ms);
            println!("  share_base_url:     {}", config.share_base_url);
            println!(
                "  log_file:           {}",
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

    apply(&mut config, &key, &value)?;

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
        "data_dir" => config.data_dir = value.into(),
        "api_url" => config.api_url = value.trim_end_matches('/').to_string(),
        "repo_name" => {
            if value.is_empty() {
                bail!("repo_name cannot be empty");
            }
            config.repo_name = value.to_string();
        }
        "debounce_ms" => {
            config.debounce_ms = value
                .parse()
                .context("Invalid value for debounce_ms. Use a number of milliseconds.")?;
        }
        "max_backoff_secs" => {
            config.max_backoff_secs = value
                .parse()
                .context("Invalid value for max_backoff_secs. Use a number of seconds.")?;
        }
        "provision_delay_ms" => {
            config.provision_delay_ms = value
                .parse()
                .context("Invalid value for provision_delay_ms. Use a number of milliseconds.")?;
        }
        "share_base_url" => config.share_base_url = value.to_string(),
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, api_url, repo_name, debounce_ms, max_backoff_secs, \
                 provision_delay_ms, share_base_url, log_file",
                key
            );
        }
    }
    Ok(())
}
