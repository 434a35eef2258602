use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::customers::types::{CustomerResponse, CUSTOMER_COLUMNS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCustomerQuery {
    pub id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetCustomerError {
    #[error("Customer '{0}' not found")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<CustomerResponse, GetCustomerError>> for GetCustomerQuery {}

impl crate::cqrs::middleware::Query for GetCustomerQuery {}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    query: GetCustomerQuery,
) -> Result<CustomerResponse, GetCustomerError> {
    let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");

    sqlx::query_as::<_, CustomerResponse>(&sql)
        .bind(query.id)
        .fetch_optional(&pool)
        .await?
        .ok_or(GetCustomerError::NotFound(query.id))
}
