//! Feature modules implementing the import server API
//!
//! Each feature is a vertical slice with its own commands, queries and routes.
//!
//! # Features
//!
//! - **customers**: create, update, list and fetch customers
//! - **imports**: start a CSV import and report its progress
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//! - `types.rs` - Shared types (if needed)
//!
//! Routes call each slice's `handle` function directly. Commands and queries
//! also implement `mediator::Request`, and [`crate::cqrs::build_mediator`]
//! registers those same handlers for callers outside the HTTP layer.

pub mod customers;
pub mod imports;
pub mod shared;

use axum::Router;
use std::sync::Arc;

use crate::ingest::JobCoordinator;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// PostgreSQL connection pool for the customer endpoints
    pub db: sqlx::PgPool,
    /// Starts imports and reports their progress
    pub coordinator: Arc<JobCoordinator>,
}

/// Creates the API router with all feature routes mounted
///
/// - `/customers` - Customer management
/// - `/import` - CSV import trigger and progress
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/customers", customers::customers_routes().with_state(state.db.clone()))
        .nest("/import", imports::imports_routes().with_state(state.coordinator.clone()))
}
