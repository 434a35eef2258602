//! Update customer command
//!
//! Replaces every editable field of an existing customer. The body carries the
//! same payload as create; the id comes from the path.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::customers::types::{CustomerFields, CustomerResponse, CUSTOMER_COLUMNS};
use crate::features::shared::error_helpers::map_unique_violation;
use crate::features::shared::validation::FieldValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCustomerCommand {
    /// Set from the path parameter
    #[serde(skip)]
    pub id: Uuid,

    #[serde(flatten)]
    pub fields: CustomerFields,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateCustomerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] FieldValidationError),

    #[error("Customer '{0}' not found")]
    NotFound(Uuid),

    #[error("Customer with customerId '{0}' already exists")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<CustomerResponse, UpdateCustomerError>> for UpdateCustomerCommand {}

impl crate::cqrs::middleware::Command for UpdateCustomerCommand {}

impl UpdateCustomerCommand {
    pub fn validate(&self) -> Result<(), UpdateCustomerError> {
        self.fields.validate()?;
        Ok(())
    }
}

#[tracing::instrument(skip(pool, command), fields(id = %command.id))]
pub async fn handle(
    pool: PgPool,
    command: UpdateCustomerCommand,
) -> Result<CustomerResponse, UpdateCustomerError> {
    command.validate()?;

    let f = &command.fields;
    let sql = format!(
        "UPDATE customers SET customer_id = $2, first_name = $3, last_name = $4, phone1 = $5, \
         phone2 = $6, company = $7, city = $8, country = $9, email = $10, \
         subscription_date = $11, website = $12, description = $13, import_job_id = $14, \
         updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {CUSTOMER_COLUMNS}"
    );

    let customer = sqlx::query_as::<_, CustomerResponse>(&sql)
        .bind(command.id)
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
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                UpdateCustomerError::Duplicate(f.customer_id.clone()),
                UpdateCustomerError::Database,
            )
        })?
        .ok_or(UpdateCustomerError::NotFound(command.id))?;

    tracing::info!(customer_id = %customer.customer_id, "Customer updated");
    Ok(customer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::customers::types::sample_fields;

    #[test]
    fn test_id_is_not_read_from_body() {
        let mut body = serde_json::to_value(sample_fields()).unwrap();
        body["id"] = serde_json::json!(Uuid::new_v4());
        let cmd: UpdateCustomerCommand = serde_json::from_value(body).unwrap();
        assert!(cmd.id.is_nil());
    }

    #[test]
    fn test_validation_rejects_bad_email() {
        let mut fields = sample_fields();
        fields.email = "missing-at.example.com".to_string();
        let cmd = UpdateCustomerCommand {
            id: Uuid::new_v4(),
            fields,
        };
        assert!(matches!(
            cmd.validate(),
            Err(UpdateCustomerError::Validation(FieldValidationError::InvalidEmail { .. }))
        ));
    }
}
