//! Shared utilities and types for feature modules
//!
//! - **pagination**: page parameters and metadata for list queries
//! - **validation**: field validation for commands
//! - **error_helpers**: database error classification

pub mod error_helpers;
pub mod pagination;
pub mod validation;

pub use pagination::{Paginated, PaginationMetadata, PaginationParams};
pub use validation::{validate_email, validate_required, validate_url, FieldValidationError};
