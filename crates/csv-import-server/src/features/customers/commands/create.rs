//! Create customer command

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::features::customers::types::{CustomerFields, CustomerResponse, CUSTOMER_COLUMNS};
use crate::features::shared::error_helpers::map_unique_violation;
use crate::features::shared::validation::FieldValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerCommand {
    #[serde(flatten)]
    pub fields: CustomerFields,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateCustomerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] FieldValidationError),

    #[error("Customer with customerId '{0}' already exists")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<CustomerResponse, CreateCustomerError>> for CreateCustomerCommand {}

impl crate::cqrs::middleware::Command for CreateCustomerCommand {}

impl CreateCustomerCommand {
    pub fn validate(&self) -> Result<(), CreateCustomerError> {
        self.fields.validate()?;
        Ok(())
    }
}

#[tracing::instrument(skip(pool, command), fields(customer_id = %command.fields.customer_id))]
pub async fn handle(
    pool: PgPool,
    command: CreateCustomerCommand,
) -> Result<CustomerResponse, CreateCustomerError> {
    command.validate()?;

    let f = &command.fields;
    let sql = format!(
        "INSERT INTO customers (customer_id, first_name, last_name, phone1, phone2, company, \
         city, country, email, subscription_date, website, description, import_job_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {CUSTOMER_COLUMNS}"
    );

    let customer = sqlx::query_as::<_, CustomerResponse>(&sql)
        .bind(&f.customer_id)
        .bind(&f.first_name)
        .bind(&f.last_name)
        .bind(&f.phone1)
        .bind(&f.phone2)
        .bind(&f.company)
        .bind(&f.city)
        .bind(&f.country)
        .bind(&f.email)
        .bind(f.subscription_date)
        .bind(&f.website)
        .bind(&f.description)
        .bind(f.import_job_id)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                CreateCustomerError::Duplicate(f.customer_id.clone()),
                CreateCustomerError::Database,
            )
        })?;

    tracing::info!(id = %customer.id, "Customer created");
    Ok(customer)
}
