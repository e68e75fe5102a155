//! Input validation and sanitization.
//!
//! Every form field passes through here before it reaches storage.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use validator::ValidateEmail;

/// Validation error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is empty after trimming.
    #[error("{field} is required")]
    Empty {
        /// Field name.
        field: &'static str,
    },

    /// Input exceeds maximum allowed length.
    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },

    /// Input is shorter than allowed.
    #[error("{field} must be at least {min} characters")]
    TooShort {
        /// Field name.
        field: &'static str,
        /// Minimum allowed length.
        min: usize,
    },

    /// Username contains characters outside the allowed set.
    #[error("Username may only contain letters, digits, '_', '.' and '-'")]
    InvalidUsername,

    /// Not a valid email address.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Not a `#RRGGBB` colour.
    #[error("Invalid color '{0}', expected #RRGGBB")]
    InvalidColor(String),
}

/// Length limits per field, in characters.
pub mod limits {
    /// Username minimum.
    pub const MIN_USERNAME: usize = 3;
    /// Username maximum.
    pub const MAX_USERNAME: usize = 50;
    /// Email maximum.
    pub const MAX_EMAIL: usize = 100;
    /// Password minimum.
    pub const MIN_PASSWORD: usize = 6;
    /// Password maximum (bounds hashing cost).
    pub const MAX_PASSWORD: usize = 1024;
    /// Full name maximum.
    pub const MAX_FULL_NAME: usize = 100;
    /// Subject name maximum.
    pub const MAX_SUBJECT_NAME: usize = 100;
    /// Label name maximum.
    pub const MAX_LABEL_NAME: usize = 50;
    /// Task title maximum.
    pub const MAX_TITLE: usize = 200;
    /// Description and note maximum.
    pub const MAX_NOTE: usize = 10_000;
}

/// Sanitize free text.
///
/// Strips control characters (except newlines and tabs), applies NFKC
/// normalization and trims surrounding whitespace.
///
/// # Errors
///
/// Returns `ValidationError::TooLong` if the result exceeds `max_len` characters.
pub fn sanitize_text(
    field: &'static str,
    input: &str,
    max_len: usize,
) -> Result<String, ValidationError> {
    let sanitized: String = input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
        .collect();

    let normalized: String = sanitized.nfkc().collect();
    let trimmed = normalized.trim();

    let actual = trimmed.chars().count();
    if actual > max_len {
        return Err(ValidationError::TooLong {
            field,
            max: max_len,
            actual,
        });
    }
    Ok(trimmed.to_string())
}

/// Sanitize a required single-line field.
///
/// # Errors
///
/// Returns error if empty or too long.
pub fn required_text(
    field: &'static str,
    input: &str,
    max_len: usize,
) -> Result<String, ValidationError> {
    let value = sanitize_text(field, input, max_len)?;
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(value)
}

/// Sanitize an optional field. Blank input becomes `None`.
///
/// # Errors
///
/// Returns error if too long.
pub fn optional_text(
    field: &'static str,
    input: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, ValidationError> {
    match input {
        None => Ok(None),
        Some(raw) => {
            let value = sanitize_text(field, raw, max_len)?;
            Ok((!value.is_empty()).then_some(value))
        }
    }
}

/// Validate a username.
///
/// # Errors
///
/// Returns error if the length is out of range or it contains disallowed characters.
pub fn validate_username(input: &str) -> Result<String, ValidationError> {
    let username = input.trim();
    let len = username.chars().count();
    if len < limits::MIN_USERNAME {
        return Err(ValidationError::TooShort {
            field: "Username",
            min: limits::MIN_USERNAME,
        });
    }
    if len > limits::MAX_USERNAME {
        return Err(ValidationError::TooLong {
            field: "Username",
            max: limits::MAX_USERNAME,
            actual: len,
        });
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(username.to_string())
}

/// Validate and lowercase an email address.
///
/// # Errors
///
/// Returns error if too long or not a valid address.
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    let email = input.trim().to_lowercase();
    let len = email.chars().count();
    if len > limits::MAX_EMAIL {
        return Err(ValidationError::TooLong {
            field: "Email",
            max: limits::MAX_EMAIL,
            actual: len,
        });
    }
    if !email.validate_email() {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email)
}

/// Validate a plaintext password. The password itself is never altered.
///
/// # Errors
///
/// Returns error if too short or too long.
pub fn validate_password(input: &str) -> Result<(), ValidationError> {
    let len = input.chars().count();
    if len < limits::MIN_PASSWORD {
        return Err(ValidationError::TooShort {
            field: "Password",
            min: limits::MIN_PASSWORD,
        });
    }
    if len > limits::MAX_PASSWORD {
        return Err(ValidationError::TooLong {
            field: "Password",
            max: limits::MAX_PASSWORD,
            actual: len,
        });
    }
    Ok(())
}

/// Validate a `#RRGGBB` colour, normalised to uppercase.
///
/// # Errors
///
/// Returns `ValidationError::InvalidColor` for anything else.
pub fn validate_color(input: &str) -> Result<String, ValidationError> {
    let color = input.trim();
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::InvalidColor(color.to_string()));
    }
    Ok(color.to_uppercase())
}
