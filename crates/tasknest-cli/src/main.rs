//! Tasknest CLI - run the server and manage users and configuration.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tasknest_core::Config;
use tasknest_core::config::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::config::ConfigAction;
use commands::serve::ServeArgs;
use commands::users::UsersAction;

#[derive(Parser)]
#[command(name = "tasknest")]
#[command(about = "Tasknest - personal task manager")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.tasknest/tasknest.json)
    #[arg(long, global = true, env = "TASKNEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },

    /// User management (run while the server is stopped)
    Users {
        #[command(subcommand)]
        action: UsersCommands,
    },

    /// Configuration file
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },

    /// Check whether the server is running
    Status,
}

#[derive(Subcommand)]
enum UsersCommands {
    /// Create a new user
    Create {
        /// Username
        #[arg(long)]
        username: String,

        /// Email address
        #[arg(long)]
        email: String,

        /// Display name
        #[arg(long)]
        full_name: Option<String>,

        /// Password (generated if omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// List all users
    List,

    /// Delete a user with all their subjects, labels and tasks
    Delete {
        /// Username of the user to delete
        #[arg(long)]
        username: String,
    },

    /// Set a new password
    ResetPassword {
        /// Username of the user
        #[arg(long)]
        username: String,

        /// New password (generated if omitted)
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show effective configuration
    Show,

    /// Validate configuration
    Validate,

    /// Write a default config with a generated JWT secret
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?.with_env_overrides(),
        None => Config::load_default()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_logging(verbose: bool, config: Option<&Config>) {
    let debug = verbose || config.is_some_and(|c| c.settings.debug);
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.map(|c| c.settings.log_format) {
        Some(LogFormat::Json) => registry.with(fmt::layer().json()).init(),
        _ => registry.with(fmt::layer().with_target(false)).init(),
    }
}

impl From<UsersCommands> for UsersAction {
    fn from(command: UsersCommands) -> Self {
        match command {
            UsersCommands::Create {
                username,
                email,
                full_name,
                password,
            } => Self::Create {
                username,
                email,
                full_name,
                password,
            },
            UsersCommands::List => Self::List,
            UsersCommands::Delete { username } => Self::Delete { username },
            UsersCommands::ResetPassword { username, password } => {
                Self::ResetPassword { username, password }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    let config_path = cli.config;

    let setup = || -> anyhow::Result<Config> {
        let config = load_config(config_path.as_ref())?;
        init_logging(verbose, Some(&config));
        Ok(config)
    };

    match cli.command {
        Commands::Serve { port, bind } => {
            commands::run_serve(setup()?, ServeArgs { port, bind }).await?;
        }

        Commands::Users { action } => commands::run_users(&setup()?, action.into())?,

        Commands::Status => commands::run_status(&setup()?).await?,

        // Must work with a missing or broken config file
        Commands::Config { action } => {
            init_logging(verbose, None);
            let action = match action {
                None | Some(ConfigCommands::Show) => ConfigAction::Show,
                Some(ConfigCommands::Validate) => ConfigAction::Validate,
                Some(ConfigCommands::Init { force }) => ConfigAction::Init { force },
            };
            commands::run_config(config_path.clone(), action)?;
        }
    }

    Ok(())
}
