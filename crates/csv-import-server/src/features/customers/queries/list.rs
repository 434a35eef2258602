//! List customers, newest first

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::features::customers::types::{CustomerResponse, CUSTOMER_COLUMNS};
use crate::features::shared::pagination::{Paginated, PaginationParams};

/// `limit` is accepted in place of `per_page`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCustomersQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(alias = "limit", skip_serializing_if = "Option::is_none")]
    pub per_page: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListCustomersError {
    #[error("{0}")]
    InvalidPagination(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<Paginated<CustomerResponse>, ListCustomersError>> for ListCustomersQuery {}

impl crate::cqrs::middleware::Query for ListCustomersQuery {}

impl ListCustomersQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    pub fn validate(&self) -> Result<(), ListCustomersError> {
        self.pagination()
            .validate()
            .map_err(ListCustomersError::InvalidPagination)
    }
}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    query: ListCustomersQuery,
) -> Result<Paginated<CustomerResponse>, ListCustomersError> {
    query.validate()?;
    let params = query.pagination();

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM customers")
        .fetch_one(&pool)
        .await?;

    let sql = format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers \
         ORDER BY created_at DESC, id \
         LIMIT $1 OFFSET $2"
    );
    let items = sqlx::query_as::<_, CustomerResponse>(&sql)
        .bind(params.per_page())
        .bind(params.offset())
        .fetch_all(&pool)
        .await?;

    Ok(Paginated::from_items(items, &params, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_an_alias_for_per_page() {
        let query: ListCustomersQuery = serde_json::from_str(r#"{"page": 3, "limit": 10}"#).unwrap();
        assert_eq!(query.pagination().per_page(), 10);
        assert_eq!(query.pagination().offset(), 20);
    }

    #[test]
    fn test_validate() {
        assert!(ListCustomersQuery::default().validate().is_ok());

        let query = ListCustomersQuery {
            page: Some(0),
            per_page: None,
        };
        assert!(matches!(query.validate(), Err(ListCustomersError::InvalidPagination(_))));

        let query = ListCustomersQuery {
            page: None,
            per_page: Some(101),
        };
        assert!(query.validate().is_err());
    }
}
