//! Shared validation utilities
//!
//! Field checks used by the customer commands.
//!
//! ```rust,ignore
//! use csv_import_server::features::shared::validation::{validate_required, validate_email};
//!
//! validate_required(&command.first_name, "firstName")?;
//! validate_email(&command.email)?;
//! ```

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors produced by field validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldValidationError {
    #[error("{field} is required and cannot be empty")]
    Required { field: String },

    #[error("{field} must be at most {max_length} characters")]
    TooLong { field: String, max_length: usize },

    #[error("'{value}' is not a valid email address")]
    InvalidEmail { value: String },

    #[error("{field} is not a valid http(s) URL")]
    InvalidUrl { field: String },
}

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

/// Reject blank values
pub fn validate_required(value: &str, field: &str) -> Result<(), FieldValidationError> {
    if value.trim().is_empty() {
        return Err(FieldValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Reject values longer than `max_length` characters
pub fn validate_max_length(value: &str, field: &str, max_length: usize) -> Result<(), FieldValidationError> {
    if value.chars().count() > max_length {
        return Err(FieldValidationError::TooLong {
            field: field.to_string(),
            max_length,
        });
    }
    Ok(())
}

/// Syntactic email check
pub fn validate_email(email: &str) -> Result<(), FieldValidationError> {
    if email_regex().is_some_and(|re| re.is_match(email.trim())) {
        Ok(())
    } else {
        Err(FieldValidationError::InvalidEmail {
            value: email.to_string(),
        })
    }
}

/// Validate a URL field
///
/// Empty strings are accepted; anything else must parse as an absolute
/// http or https URL with a host.
pub fn validate_url(url: &str, field: &str) -> Result<(), FieldValidationError> {
    if url.is_empty() {
        return Ok(());
    }

    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some() => {
            Ok(())
        },
        _ => Err(FieldValidationError::InvalidUrl {
            field: field.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_required() {
        assert!(validate_required("Ada", "firstName").is_ok());
        assert_eq!(
            validate_required("   ", "firstName"),
            Err(FieldValidationError::Required {
                field: "firstName".to_string()
            })
        );
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("zunigavanessa@smith.info").is_ok());
        assert!(validate_email("first.last+tag@sub.example.co").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("", "website").is_ok());
        assert!(validate_url("http://www.stephenson.com/", "website").is_ok());
        assert!(validate_url("https://example.com/path?q=1", "website").is_ok());
        assert!(validate_url("ftp://example.com", "website").is_err());
        assert!(validate_url("example.com", "website").is_err());
    }

    #[test]
    fn test_validate_max_length_counts_chars() {
        assert!(validate_max_length("héllo", "city", 5).is_ok());
        assert!(validate_max_length("héllo!", "city", 5).is_err());
    }
}
