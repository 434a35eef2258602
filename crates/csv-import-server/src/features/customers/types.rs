//! Types shared by the customer commands and queries

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::shared::validation::{
    validate_email, validate_max_length, validate_required, validate_url, FieldValidationError,
};

/// Column list selected by every customer read
pub(crate) const CUSTOMER_COLUMNS: &str = "id, customer_id, first_name, last_name, phone1, phone2, \
     company, city, country, email, subscription_date, website, description, import_job_id, \
     created_at, updated_at";

const MAX_TEXT_LENGTH: usize = 255;

/// Editable customer fields, used as the body of create and update
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFields {
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone1: String,
    #[serde(default)]
    pub phone2: String,
    pub company: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub subscription_date: NaiveDate,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_job_id: Option<Uuid>,
}

impl CustomerFields {
    pub fn validate(&self) -> Result<(), FieldValidationError> {
        let required = [
            (&self.customer_id, "customerId"),
            (&self.first_name, "firstName"),
            (&self.last_name, "lastName"),
            (&self.phone1, "phone1"),
            (&self.company, "company"),
            (&self.city, "city"),
            (&self.country, "country"),
        ];
        for (value, field) in required {
            validate_required(value, field)?;
            validate_max_length(value, field, MAX_TEXT_LENGTH)?;
        }

        validate_max_length(&self.phone2, "phone2", MAX_TEXT_LENGTH)?;
        validate_email(&self.email)?;
        validate_url(&self.website, "website")?;
        Ok(())
    }
}

/// A stored customer as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub id: Uuid,
    pub customer_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone1: String,
    pub phone2: String,
    pub company: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub subscription_date: NaiveDate,
    pub website: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_job_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) fn sample_fields() -> CustomerFields {
    CustomerFields {
        customer_id: "DD37Cf93aecA6Dc".to_string(),
        first_name: "Sheryl".to_string(),
        last_name: "Baxter".to_string(),
        phone1: "229.077.5154".to_string(),
        phone2: String::new(),
        company: "Rasmussen Group".to_string(),
        city: "East Leonard".to_string(),
        country: "Chile".to_string(),
        email: "zunigavanessa@smith.info".to_string(),
        subscription_date: NaiveDate::from_ymd_opt(2020, 8, 24).unwrap_or_default(),
        website: "http://www.stephenson.com/".to_string(),
        description: String::new(),
        import_job_id: None,
    }
}
