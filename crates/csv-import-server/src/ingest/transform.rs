//! Row transformer
//!
//! Maps a raw CSV row to a [`CustomerRecord`]. The mapping never fails: missing
//! optional fields become empty strings and an unparseable subscription date
//! becomes [`invalid_date_sentinel`]. Anything that was substituted is reported
//! as a [`TransformWarning`] so the caller can log it without aborting the stream.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use uuid::Uuid;

use super::models::CustomerRecord;

pub const HEADER_CUSTOMER_ID: &str = "Customer Id";
pub const HEADER_FIRST_NAME: &str = "First Name";
pub const HEADER_LAST_NAME: &str = "Last Name";
pub const HEADER_PHONE_1: &str = "Phone 1";
pub const HEADER_PHONE_2: &str = "Phone 2";
pub const HEADER_COMPANY: &str = "Company";
pub const HEADER_CITY: &str = "City";
pub const HEADER_COUNTRY: &str = "Country";
pub const HEADER_EMAIL: &str = "Email";
pub const HEADER_SUBSCRIPTION_DATE: &str = "Subscription Date";
pub const HEADER_WEBSITE: &str = "Website";
pub const HEADER_DESCRIPTION: &str = "About Customer";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Date stored when the source value is missing or unparseable (1970-01-01)
pub fn invalid_date_sentinel() -> NaiveDate {
    NaiveDate::default()
}

/// Read access to one source row by header name
///
/// Header lookup is case-sensitive.
pub trait RawRow {
    fn field(&self, header: &str) -> Option<&str>;
}

impl RawRow for HashMap<String, String> {
    fn field(&self, header: &str) -> Option<&str> {
        self.get(header).map(String::as_str)
    }
}

/// Header name to column position, built once per file
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut positions = HashMap::new();
        for (i, name) in headers.into_iter().enumerate() {
            // First occurrence wins for repeated headers
            positions.entry(name.trim_start_matches('\u{feff}').to_string()).or_insert(i);
        }
        Self { positions }
    }

    pub fn position(&self, header: &str) -> Option<usize> {
        self.positions.get(header).copied()
    }
}

/// A CSV record viewed through its file's header index
pub struct CsvRow<'a> {
    pub index: &'a HeaderIndex,
    pub record: &'a csv_async::StringRecord,
}

impl RawRow for CsvRow<'_> {
    fn field(&self, header: &str) -> Option<&str> {
        self.index.position(header).and_then(|i| self.record.get(i))
    }
}

/// A substitution made while transforming a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformWarning {
    /// A required column was absent or blank; an empty string was used
    MissingRequiredField { field: &'static str },
    /// The subscription date was absent
    MissingDate,
    /// The subscription date could not be parsed
    InvalidDate { value: String },
}

impl std::fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformWarning::MissingRequiredField { field } => {
                write!(f, "missing required field '{}'", field)
            },
            TransformWarning::MissingDate => write!(f, "missing subscription date"),
            TransformWarning::InvalidDate { value } => {
                write!(f, "unparseable subscription date '{}'", value)
            },
        }
    }
}

/// Transformed record plus whatever had to be substituted
#[derive(Debug, Clone)]
pub struct Transformed {
    pub record: CustomerRecord,
    pub warnings: Vec<TransformWarning>,
}

impl Transformed {
    /// Whether the record carries a customer id to deduplicate on
    pub fn has_natural_key(&self) -> bool {
        !self.record.customer_id.is_empty()
    }
}

/// Map a raw row to a customer record, discarding warnings
pub fn transform<R: RawRow + ?Sized>(row: &R, job_id: Uuid) -> CustomerRecord {
    transform_with_warnings(row, job_id).record
}

/// Map a raw row to a customer record and report substitutions
pub fn transform_with_warnings<R: RawRow + ?Sized>(row: &R, job_id: Uuid) -> Transformed {
    let mut warnings = Vec::new();

    let mut required = |header: &str, field: &'static str| -> String {
        let value = text(row, header);
        if value.is_empty() {
            warnings.push(TransformWarning::MissingRequiredField { field });
        }
        value
    };

    let customer_id = required(HEADER_CUSTOMER_ID, "customerId");
    let first_name = required(HEADER_FIRST_NAME, "firstName");
    let last_name = required(HEADER_LAST_NAME, "lastName");
    let email = required(HEADER_EMAIL, "email");

    let subscription_date = match row.field(HEADER_SUBSCRIPTION_DATE).map(str::trim) {
        None | Some("") => {
            warnings.push(TransformWarning::MissingDate);
            invalid_date_sentinel()
        },
        Some(raw) => parse_date(raw).unwrap_or_else(|| {
            warnings.push(TransformWarning::InvalidDate {
                value: raw.to_string(),
            });
            invalid_date_sentinel()
        }),
    };

    let record = CustomerRecord {
        customer_id,
        first_name,
        last_name,
        phone1: text(row, HEADER_PHONE_1),
        phone2: text(row, HEADER_PHONE_2),
        company: text(row, HEADER_COMPANY),
        city: text(row, HEADER_CITY),
        country: text(row, HEADER_COUNTRY),
        email,
        subscription_date,
        website: text(row, HEADER_WEBSITE),
        description: text(row, HEADER_DESCRIPTION),
        import_job_id: Some(job_id),
    };

    Transformed { record, warnings }
}

/// Parse a subscription date in any of the accepted layouts
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn text<R: RawRow + ?Sized>(row: &R, header: &str) -> String {
    row.field(header).map(str::trim).unwrap_or_default().to_string()
}
