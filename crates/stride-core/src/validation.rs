//! # Validation Module
//!
//! Input validation for the auth forms (sign-in, sign-up, password reset).
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend form                                                │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: SessionAuthority (Rust)                                      │
//! │  └── THIS MODULE: checked before any provider call                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Auth provider                                                │
//! │  └── Account rules, rate limits, password policy                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stride_core::validation::{validate_email, validate_password};
//!
//! validate_email("ada@example.com").unwrap();
//! validate_password("correct horse").unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::SignUpMetadata;
use crate::{MAX_EMAIL_LENGTH, MAX_NAME_LENGTH, MIN_PASSWORD_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an email address and returns it trimmed.
///
/// ## Rules
/// - Must not be empty
/// - At most 254 characters
/// - Exactly one `@`, a non-empty local part, and a dotted domain
///
/// ## Example
/// ```rust
/// use stride_core::validation::validate_email;
///
/// assert!(validate_email("ada@example.com").is_ok());
/// assert!(validate_email("ada@localhost").is_err());
/// assert!(validate_email("").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
        });
    }

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing @"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("expected name@domain"));
    }

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(email.to_string())
}

/// Validates a password.
///
/// ## Rules
/// - Must not be empty
/// - At least 6 characters (the provider's minimum)
///
/// Passwords are never trimmed; leading spaces are significant.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LENGTH,
        });
    }

    Ok(())
}

/// Validates an optional name field and returns it trimmed.
///
/// Blank names collapse to `None`.
pub fn validate_name(field: &str, name: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(Some(name.to_string()))
}

/// Validates sign-up metadata and returns the normalized copy.
pub fn validate_sign_up_metadata(metadata: &SignUpMetadata) -> ValidationResult<SignUpMetadata> {
    Ok(SignUpMetadata {
        first_name: validate_name("first_name", metadata.first_name.as_deref())?,
        last_name: validate_name("last_name", metadata.last_name.as_deref())?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
