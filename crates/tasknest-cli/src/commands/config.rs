//! Config show/validate/init commands.

use std::path::{Path, PathBuf};

use anyhow::Result;
use secrecy::ExposeSecret;
use tasknest_core::Config;
use tasknest_server::auth::TokenCodec;

use crate::ui;

/// Config actions.
#[derive(Debug, Clone, Copy, Default)]
pub enum ConfigAction {
    /// Print the effective configuration.
    #[default]
    Show,
    /// Parse and validate the config file.
    Validate,
    /// Write a default config file with a fresh JWT secret.
    Init {
        /// Overwrite an existing file.
        force: bool,
    },
}

/// Run a config command against `path` (the default location if `None`).
///
/// # Errors
///
/// Returns error if the file cannot be read or written.
pub fn run_config(path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    let path = path.unwrap_or_else(Config::default_path);
    match action {
        ConfigAction::Show => show_config(&path),
        ConfigAction::Validate => validate_config(&path),
        ConfigAction::Init { force } => init_config(&path, force),
    }
}

/// Show the effective configuration with the secret redacted.
fn show_config(path: &Path) -> Result<()> {
    let config = if path.exists() {
        Config::load(path)?
    } else {
        ui::warning(&format!("Config file not found: {}", path.display()));
        ui::info("Showing defaults. Run 'tasknest config init' to create one.");
        Config::default()
    }
    .with_env_overrides();

    let mut value = serde_json::to_value(&config)?;
    if let Some(secret) = value.pointer_mut("/auth/jwtSecret") {
        if !secret.is_null() {
            *secret = serde_json::Value::String("[REDACTED]".to_string());
        }
    }
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn validate_config(path: &Path) -> Result<()> {
    ui::header("Validating Configuration");

    if !path.exists() {
        ui::error(&format!("Config file not found: {}", path.display()));
        return Ok(());
    }

    match Config::load(path) {
        Ok(config) => {
            ui::success("Configuration is valid");
            ui::kv("Address", &config.server.address());
            ui::kv("Data", &config.data_dir().display().to_string());
            if config.auth.jwt_secret.is_none() {
                ui::warning("No jwtSecret: a new one is generated on every start");
            }
            Ok(())
        }
        Err(e) => {
            ui::error(&format!("{e}"));
            anyhow::bail!("Invalid configuration")
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    let mut config = Config::default();
    config.auth.jwt_secret = Some(TokenCodec::generate_hex_secret().expose_secret().to_string());
    config.save(path)?;

    ui::success(&format!("Wrote {}", path.display()));
    Ok(())
}
