//! User model and storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tasknest_core::RecordId;

use super::AuthError;

const USER_PREFIX: &[u8] = b"user:";

/// User account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: RecordId,
    /// Username for login.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Argon2 password hash (stored in DB, not exposed in public API).
    pub password_hash: String,
    /// Display name.
    pub full_name: Option<String>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the profile last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a safe version of user for API responses (no password hash).
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            created_at: self.created_at,
        }
    }

    /// Full name if set, otherwise the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.username)
    }
}

/// Public user representation (for API responses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    /// Unique user ID.
    pub id: RecordId,
    /// Username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: Option<String>,
    /// When created.
    pub created_at: DateTime<Utc>,
}

/// A validated registration, already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Username.
    pub username: String,
    /// Email (lowercased).
    pub email: String,
    /// Display name.
    pub full_name: Option<String>,
    /// PHC password hash.
    pub password_hash: String,
}

fn user_key(id: RecordId) -> Vec<u8> {
    let mut key = USER_PREFIX.to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn username_index(username: &str) -> String {
    format!("idx:username:{username}")
}

fn email_index(email: &str) -> String {
    format!("idx:email:{}", email.to_lowercase())
}

/// User store backed by sled.
#[derive(Clone)]
pub struct UserStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl UserStore {
    /// Create a new user store with an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if tree cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, AuthError> {
        let tree = db
            .open_tree("users")
            .map_err(|e| AuthError::Storage(format!("Failed to open users tree: {e}")))?;

        Ok(Self { db, tree })
    }

    /// Get the underlying sled database.
    #[must_use]
    pub const fn db(&self) -> &sled::Db {
        &self.db
    }

    /// Check if any users exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Count total users.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tree.scan_prefix(USER_PREFIX).count()
    }

    /// Claim a unique index key for `id`. Returns `false` if already taken.
    fn claim_index(&self, index_key: &str, id: RecordId) -> Result<bool, AuthError> {
        let claimed = self
            .tree
            .compare_and_swap(
                index_key.as_bytes(),
                None as Option<&[u8]>,
                Some(&id.to_be_bytes()[..]),
            )
            .map_err(|e| AuthError::Storage(format!("Index error: {e}")))?;
        Ok(claimed.is_ok())
    }

    /// Create a new user.
    ///
    /// Username and email are claimed atomically, so two concurrent
    /// registrations for the same name cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns `UserExists` or `EmailExists` on a duplicate, or a storage error.
    pub fn create(&self, new: NewUser) -> Result<User, AuthError> {
        let id = self.db.generate_id()? + 1;

        let username_key = username_index(&new.username);
        if !self.claim_index(&username_key, id)? {
            return Err(AuthError::UserExists(new.username));
        }

        let email_key = email_index(&new.email);
        if !self.claim_index(&email_key, id)? {
            self.tree
                .remove(username_key.as_bytes())
                .map_err(|e| AuthError::Storage(format!("Index remove error: {e}")))?;
            return Err(AuthError::EmailExists(new.email));
        }

        let user = User {
            id,
            username: new.username,
            email: new.email.to_lowercase(),
            password_hash: new.password_hash,
            full_name: new.full_name,
            created_at: Utc::now(),
            updated_at: None,
        };

        let value = serde_json::to_vec(&user)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;
        self.tree
            .insert(user_key(id), value)
            .map_err(|e| AuthError::Storage(format!("Insert error: {e}")))?;

        self.tree
            .flush()
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;

        tracing::info!(user_id = id, username = %user.username, "Created user");
        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get(&self, id: RecordId) -> Result<Option<User>, AuthError> {
        match self.tree.get(user_key(id)) {
            Ok(Some(value)) => {
                let user: User = serde_json::from_slice(&value)
                    .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Get error: {e}"))),
        }
    }

    fn get_by_index(&self, index_key: &str) -> Result<Option<User>, AuthError> {
        match self.tree.get(index_key.as_bytes()) {
            Ok(Some(id_bytes)) => {
                let bytes: [u8; 8] = id_bytes.as_ref().try_into().map_err(|_| {
                    AuthError::Storage(format!("Corrupt index entry: {index_key}"))
                })?;
                self.get(RecordId::from_be_bytes(bytes))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(AuthError::Storage(format!("Index lookup error: {e}"))),
        }
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        self.get_by_index(&username_index(username))
    }

    /// Get a user by email.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn get_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        self.get_by_index(&email_index(email))
    }

    /// Update an existing user. Username is immutable; email changes move the index.
    ///
    /// # Errors
    ///
    /// Returns error if user doesn't exist, the new email is taken, or storage fails.
    pub fn update(&self, user: &User) -> Result<(), AuthError> {
        let existing = self
            .get(user.id)?
            .ok_or_else(|| AuthError::UserNotFound(user.id.to_string()))?;

        if existing.email != user.email {
            if !self.claim_index(&email_index(&user.email), user.id)? {
                return Err(AuthError::EmailExists(user.email.clone()));
            }
            self.tree
                .remove(email_index(&existing.email).as_bytes())
                .map_err(|e| AuthError::Storage(format!("Index remove error: {e}")))?;
        }

        let mut updated = user.clone();
        updated.username = existing.username;
        updated.updated_at = Some(Utc::now());

        let value = serde_json::to_vec(&updated)
            .map_err(|e| AuthError::Storage(format!("Serialization error: {e}")))?;
        self.tree
            .insert(user_key(user.id), value)
            .map_err(|e| AuthError::Storage(format!("Update error: {e}")))?;

        self.tree
            .flush()
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;

        Ok(())
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn delete(&self, id: RecordId) -> Result<bool, AuthError> {
        let Some(user) = self.get(id)? else {
            return Ok(false);
        };

        for index_key in [username_index(&user.username), email_index(&user.email)] {
            self.tree
                .remove(index_key.as_bytes())
                .map_err(|e| AuthError::Storage(format!("Index remove error: {e}")))?;
        }

        let removed = self
            .tree
            .remove(user_key(id))
            .map_err(|e| AuthError::Storage(format!("Delete error: {e}")))?
            .is_some();

        self.tree
            .flush()
            .map_err(|e| AuthError::Storage(format!("Flush error: {e}")))?;

        tracing::info!(user_id = id, username = %user.username, "Deleted user");
        Ok(removed)
    }

    /// List all users, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub fn list(&self) -> Result<Vec<User>, AuthError> {
        let mut users = Vec::new();

        for result in self.tree.scan_prefix(USER_PREFIX) {
            let (_, value) = result.map_err(|e| AuthError::Storage(format!("Iter error: {e}")))?;
            let user: User = serde_json::from_slice(&value)
                .map_err(|e| AuthError::Storage(format!("Deserialization error: {e}")))?;
            users.push(user);
        }

        Ok(users)
    }
}

impl std::fmt::Debug for UserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStore")
            .field("user_count", &self.count())
            .finish_non_exhaustive()
    }
}
