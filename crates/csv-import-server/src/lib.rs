//! CSV Import Server Library
//!
//! HTTP server that bulk-loads customer records from large CSV files into
//! PostgreSQL.
//!
//! # Overview
//!
//! - **Ingestion**: streaming CSV reader, row transformer, fixed-size batches and
//!   a deduplicating writer, run by a single background worker
//! - **Jobs**: one import at a time, with persisted progress, rate and ETA
//! - **API Endpoints**: start an import, poll its progress, manage customers
//! - **Database Management**: PostgreSQL integration with SQLx
//! - **Configuration**: Environment-based configuration management
//! - **Middleware**: CORS and request logging
//!
//! # Architecture
//!
//! Requests are split into **commands** (write operations) and **queries**
//! (read operations), each implemented as a standalone async handler in its
//! feature slice under [`features`]. The ingestion pipeline in [`ingest`] is
//! independent of HTTP and talks to storage only through the traits in
//! [`ingest::store`].
//!
//! # Example
//!
//! ```no_run
//! use csv_import_server::{config::Config, db};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     db::run_migrations(&pool).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;

pub use error::{AppError, ServerResult};
