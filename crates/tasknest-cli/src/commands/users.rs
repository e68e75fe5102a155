//! User management commands.
//!
//! These open the database directly, so the server must not be running.

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rand::Rng;
use tasknest_core::validation::{self, limits};
use tasknest_core::{Config, TaskStore};
use tasknest_server::auth::{NewUser, PasswordHasher, UserStore};

use crate::ui;

/// User actions.
#[derive(Debug, Clone)]
pub enum UsersAction {
    /// Create a user.
    Create {
        /// Username.
        username: String,
        /// Email.
        email: String,
        /// Display name.
        full_name: Option<String>,
        /// Password; generated when absent.
        password: Option<String>,
    },
    /// List users.
    List,
    /// Delete a user and everything they own.
    Delete {
        /// Username.
        username: String,
    },
    /// Set a new password.
    ResetPassword {
        /// Username.
        username: String,
        /// New password; generated when absent.
        password: Option<String>,
    },
}

struct Stores {
    users: UserStore,
    tasks: TaskStore,
    hasher: PasswordHasher,
}

impl Stores {
    fn open(config: &Config) -> Result<Self> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;

        let db = tasknest_core::open_db(&data_dir).with_context(|| {
            format!(
                "Failed to open database at {} (is the server running?)",
                data_dir.display()
            )
        })?;

        Ok(Self {
            users: UserStore::with_db(db.clone())?,
            tasks: TaskStore::with_db(db)?,
            hasher: PasswordHasher::new(config.auth.hasher)?,
        })
    }
}

/// Run a user command.
///
/// # Errors
///
/// Returns error if the database cannot be opened or the operation fails.
pub fn run_users(config: &Config, action: UsersAction) -> Result<()> {
    let stores = Stores::open(config)?;

    match action {
        UsersAction::Create {
            username,
            email,
            full_name,
            password,
        } => create_user(&stores, &username, &email, full_name.as_deref(), password),
        UsersAction::List => list_users(&stores),
        UsersAction::Delete { username } => delete_user(&stores, &username),
        UsersAction::ResetPassword { username, password } => {
            reset_password(&stores, &username, password)
        }
    }
}

/// Random password from an unambiguous alphabet.
pub fn generate_password(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

fn password_or_generated(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        validation::validate_password(&password)?;
        return Ok(password);
    }
    let generated = generate_password(16);
    ui::success(&format!("Generated password: {generated}"));
    Ok(generated)
}

fn create_user(
    stores: &Stores,
    username: &str,
    email: &str,
    full_name: Option<&str>,
    password: Option<String>,
) -> Result<()> {
    let username = validation::validate_username(username)?;
    let email = validation::validate_email(email)?;
    let full_name = validation::optional_text("Full name", full_name, limits::MAX_FULL_NAME)?;
    let password = password_or_generated(password)?;

    let user = stores.users.create(NewUser {
        username,
        email,
        full_name,
        password_hash: stores.hasher.hash(&password)?,
    })?;

    ui::success(&format!("Created user '{}' (id {})", user.username, user.id));
    Ok(())
}

fn list_users(stores: &Stores) -> Result<()> {
    let users = stores.users.list()?;

    if users.is_empty() {
        ui::info("No users yet.");
        ui::info("Register in the browser or run 'tasknest users create'.");
        return Ok(());
    }

    ui::info(&format!("Users ({}):", users.len()));
    println!();
    println!(
        "{:<6} {:<20} {:<30} {:<6} {:<20}",
        "ID", "USERNAME", "EMAIL", "OPEN", "CREATED"
    );
    println!("{}", "-".repeat(86));

    for user in users {
        let open = stores.tasks.count_open(user.id)?;
        println!(
            "{:<6} {:<20} {:<30} {:<6} {:<20}",
            user.id,
            user.username,
            user.email,
            open,
            user.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

fn delete_user(stores: &Stores, username: &str) -> Result<()> {
    let user = stores
        .users
        .get_by_username(username)?
        .ok_or_else(|| anyhow!("User not found: {username}"))?;

    let removed = stores.tasks.purge_user(user.id)?;
    stores.users.delete(user.id)?;

    ui::success(&format!(
        "Deleted user '{username}' and {removed} owned record(s)"
    ));
    Ok(())
}

fn reset_password(stores: &Stores, username: &str, password: Option<String>) -> Result<()> {
    let mut user = stores
        .users
        .get_by_username(username)?
        .ok_or_else(|| anyhow!("User not found: {username}"))?;

    let password = password_or_generated(password)?;
    user.password_hash = stores.hasher.hash(&password)?;
    user.updated_at = Some(Utc::now());
    stores.users.update(&user)?;

    ui::success(&format!("Password reset for user '{username}'"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_password() {
        let a = generate_password(16);
        let b = generate_password(16);
        assert_eq!(a.chars().count(), 16);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(validation::validate_password(&a).is_ok());
    }
}
