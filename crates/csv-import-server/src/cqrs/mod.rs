pub use mediator::DefaultAsyncMediator;
use sqlx::PgPool;
use std::sync::Arc;

use crate::ingest::JobCoordinator;

pub mod middleware;

pub type AppMediator = DefaultAsyncMediator;

pub fn build_mediator(pool: PgPool, coordinator: Arc<JobCoordinator>) -> AppMediator {
    DefaultAsyncMediator::builder()
        // Customers
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::customers::commands::create::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |cmd| {
                let pool = pool.clone();
                async move { crate::features::customers::commands::update::handle(pool, cmd).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::customers::queries::get::handle(pool, query).await }
            }
        })
        .add_handler({
            let pool = pool.clone();
            move |query| {
                let pool = pool.clone();
                async move { crate::features::customers::queries::list::handle(pool, query).await }
            }
        })
        // Imports
        .add_handler({
            let coordinator = coordinator.clone();
            move |cmd| {
                let coordinator = coordinator.clone();
                async move {
                    crate::features::imports::commands::start_import::handle(coordinator, cmd).await
                }
            }
        })
        .add_handler({
            let coordinator = coordinator.clone();
            move |query| {
                let coordinator = coordinator.clone();
                async move {
                    crate::features::imports::queries::get_progress::handle(coordinator, query).await
                }
            }
        })
        .build()
}
