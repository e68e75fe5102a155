//! Status command - probe a running server.

use std::time::Duration;

use anyhow::Result;
use tasknest_core::Config;

use crate::ui::{self, HealthStatus};

/// Server status result.
enum ServerStatus {
    Running { version: Option<String> },
    Unhealthy(String),
    NotRunning,
}

/// Show server and configuration status.
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built.
pub async fn run_status(config: &Config) -> Result<()> {
    ui::header("Tasknest Status");

    println!();
    ui::info("Server");
    let host = match config.server.bind_address.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    };
    let base_url = format!("http://{host}:{}", config.server.port);

    match probe_health(&base_url).await? {
        ServerStatus::Running { version } => {
            ui::health_check("Status", HealthStatus::Ok, Some("running"));
            ui::kv("  URL", &base_url);
            if let Some(v) = version {
                ui::kv("  Version", &v);
            }
        }
        ServerStatus::Unhealthy(detail) => {
            ui::health_check("Status", HealthStatus::Error, Some(&detail));
        }
        ServerStatus::NotRunning => {
            ui::health_check("Status", HealthStatus::Warning, Some("not running"));
            ui::info("  Start with: tasknest serve");
        }
    }

    println!();
    ui::info("Configuration");
    let path = Config::default_path();
    if path.exists() {
        ui::health_check("Config", HealthStatus::Ok, Some(&path.display().to_string()));
    } else {
        ui::health_check("Config", HealthStatus::Warning, Some("using defaults"));
    }
    if config.auth.jwt_secret.is_some() {
        ui::health_check("JWT secret", HealthStatus::Ok, Some("configured"));
    } else {
        ui::health_check("JWT secret", HealthStatus::Warning, Some("generated per start"));
    }
    ui::kv("  Data", &config.data_dir().display().to_string());

    Ok(())
}

async fn probe_health(base_url: &str) -> Result<ServerStatus> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let resp = match client.get(format!("{base_url}/health")).send().await {
        Ok(resp) => resp,
        Err(e) if e.is_connect() || e.is_timeout() => return Ok(ServerStatus::NotRunning),
        Err(e) => return Ok(ServerStatus::Unhealthy(e.to_string())),
    };

    if !resp.status().is_success() {
        return Ok(ServerStatus::Unhealthy(format!("HTTP {}", resp.status())));
    }

    let body: serde_json::Value = resp.json().await.unwrap_or_default();
    let version = body
        .get("version")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Ok(ServerStatus::Running { version })
}
