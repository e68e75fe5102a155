//! Serve command - run the HTTP server.

use anyhow::Result;
use tasknest_core::Config;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
}

/// Start the server with the loaded config plus CLI overrides.
///
/// # Errors
///
/// Returns error if the port is taken or the server fails to start.
pub async fn run_serve(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    let address = config.server.address();
    tracing::debug!(address = %address, data = %config.data_dir().display(), "serve requested");
    if std::net::TcpListener::bind(&address).is_err() {
        anyhow::bail!("Address {address} is already in use");
    }

    ui::header("Starting Tasknest");
    ui::kv("Address", &format!("http://{address}"));
    ui::kv("Data", &config.data_dir().display().to_string());
    if config.auth.jwt_secret.is_none() {
        ui::warning("No jwtSecret configured; sessions end when the server restarts");
    }
    ui::info("Press Ctrl+C to stop");
    println!();

    tasknest_server::start(config).await?;
    Ok(())
}
