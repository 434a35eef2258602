//! Postgres-backed stores

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use super::{CustomerStore, InsertOutcome, JobStore, StoreError, StoreResult};
use crate::ingest::models::{CustomerRecord, ImportJob, ImportStatus, NewImportJob};

const JOB_COLUMNS: &str = "id, file_path, status, started_at, finished_at, total_rows, \
                           processed_rows, error, created_at";

#[derive(Debug, Clone)]
pub struct PgCustomerStore {
    pool: PgPool,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerStore for PgCustomerStore {
    async fn existing_customer_ids(&self, customer_ids: &[String]) -> StoreResult<HashSet<String>> {
        if customer_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT customer_id FROM customers WHERE customer_id = ANY($1)")
                .bind(customer_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::from_sqlx(e, "customer lookup"))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert_batch(&self, records: &[CustomerRecord]) -> StoreResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let columns = CustomerColumns::from_records(records);

        // Single statement, so the batch lands entirely or not at all
        let result = sqlx::query(
            r#"
            INSERT INTO customers (
                customer_id, first_name, last_name, phone1, phone2, company,
                city, country, email, subscription_date, website, description,
                import_job_id
            )
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::text[], $5::text[], $6::text[],
                $7::text[], $8::text[], $9::text[], $10::date[], $11::text[], $12::text[],
                $13::uuid[]
            )
            ON CONFLICT (customer_id) DO NOTHING
            "#,
        )
        .bind(columns.customer_id)
        .bind(columns.first_name)
        .bind(columns.last_name)
        .bind(columns.phone1)
        .bind(columns.phone2)
        .bind(columns.company)
        .bind(columns.city)
        .bind(columns.country)
        .bind(columns.email)
        .bind(columns.subscription_date)
        .bind(columns.website)
        .bind(columns.description)
        .bind(columns.import_job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "customer batch insert"))?;

        Ok(result.rows_affected())
    }

    async fn insert_one(&self, record: &CustomerRecord) -> StoreResult<InsertOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO customers (
                customer_id, first_name, last_name, phone1, phone2, company,
                city, country, email, subscription_date, website, description,
                import_job_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&record.customer_id)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(&record.phone1)
        .bind(&record.phone2)
        .bind(&record.company)
        .bind(&record.city)
        .bind(&record.country)
        .bind(&record.email)
        .bind(record.subscription_date)
        .bind(&record.website)
        .bind(&record.description)
        .bind(record.import_job_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) => match StoreError::from_sqlx(e, &record.customer_id) {
                StoreError::UniqueViolation(_) => Ok(InsertOutcome::Duplicate),
                other => Err(other),
            },
        }
    }
}

/// Column-major view of a batch for `UNNEST`
#[derive(Default)]
struct CustomerColumns {
    customer_id: Vec<String>,
    first_name: Vec<String>,
    last_name: Vec<String>,
    phone1: Vec<String>,
    phone2: Vec<String>,
    company: Vec<String>,
    city: Vec<String>,
    country: Vec<String>,
    email: Vec<String>,
    subscription_date: Vec<NaiveDate>,
    website: Vec<String>,
    description: Vec<String>,
    import_job_id: Vec<Option<Uuid>>,
}

impl CustomerColumns {
    fn from_records(records: &[CustomerRecord]) -> Self {
        let mut cols = Self::default();
        for r in records {
            cols.customer_id.push(r.customer_id.clone());
            cols.first_name.push(r.first_name.clone());
            cols.last_name.push(r.last_name.clone());
            cols.phone1.push(r.phone1.clone());
            cols.phone2.push(r.phone2.clone());
            cols.company.push(r.company.clone());
            cols.city.push(r.city.clone());
            cols.country.push(r.country.clone());
            cols.email.push(r.email.clone());
            cols.subscription_date.push(r.subscription_date);
            cols.website.push(r.website.clone());
            cols.description.push(r.description.clone());
            cols.import_job_id.push(r.import_job_id);
        }
        cols
    }
}

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, clause: &str, job_id: Option<Uuid>) -> StoreResult<Option<ImportJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM import_jobs {clause}");
        let mut query = sqlx::query_as::<_, ImportJobRow>(&sql);
        if let Some(id) = job_id {
            query = query.bind(id);
        }
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "import job lookup"))?;

        row.map(ImportJob::try_from).transpose()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn find_in_progress(&self) -> StoreResult<Option<ImportJob>> {
        self.fetch_one_where("WHERE status = 'IN_PROGRESS' LIMIT 1", None)
            .await
    }

    async fn create(&self, job: NewImportJob) -> StoreResult<ImportJob> {
        let sql = format!(
            "INSERT INTO import_jobs (file_path, status, started_at, total_rows, processed_rows) \
             VALUES ($1, 'IN_PROGRESS', NOW(), $2, 0) \
             RETURNING {JOB_COLUMNS}"
        );

        let row = sqlx::query_as::<_, ImportJobRow>(&sql)
            .bind(&job.file_path)
            .bind(job.total_rows)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, "an import is already in progress"))?;

        ImportJob::try_from(row)
    }

    async fn latest(&self) -> StoreResult<Option<ImportJob>> {
        self.fetch_one_where("ORDER BY created_at DESC, started_at DESC LIMIT 1", None)
            .await
    }

    async fn get(&self, job_id: Uuid) -> StoreResult<Option<ImportJob>> {
        self.fetch_one_where("WHERE id = $1", Some(job_id)).await
    }

    async fn increment_processed(&self, job_id: Uuid, rows: i64) -> StoreResult<i64> {
        let processed: Option<(i64,)> = sqlx::query_as(
            "UPDATE import_jobs SET processed_rows = processed_rows + $2 \
             WHERE id = $1 RETURNING processed_rows",
        )
        .bind(job_id)
        .bind(rows)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "import job progress"))?;

        processed
            .map(|(n,)| n)
            .ok_or_else(|| StoreError::NotFound(format!("Import job '{}'", job_id)))
    }

    async fn complete(&self, job_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE import_jobs SET status = 'COMPLETED', finished_at = NOW() \
             WHERE id = $1 AND status = 'IN_PROGRESS'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "import job completion"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail(&self, job_id: Uuid, error: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE import_jobs SET status = 'FAILED', finished_at = NOW(), error = $2 \
             WHERE id = $1 AND status = 'IN_PROGRESS'",
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "import job failure"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail_in_progress(&self, error: &str) -> StoreResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "UPDATE import_jobs SET status = 'FAILED', finished_at = NOW(), error = $1 \
             WHERE status = 'IN_PROGRESS' RETURNING id",
        )
        .bind(error)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, "import job recovery"))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImportJobRow {
    id: Uuid,
    file_path: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    total_rows: i64,
    processed_rows: i64,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ImportJobRow> for ImportJob {
    type Error = StoreError;

    fn try_from(row: ImportJobRow) -> Result<Self, Self::Error> {
        let status: ImportStatus = row
            .status
            .parse()
            .map_err(|e: anyhow::Error| StoreError::Database(sqlx::Error::Decode(e.into())))?;

        Ok(ImportJob {
            id: row.id,
            file_path: row.file_path,
            status,
            started_at: row.started_at,
            finished_at: row.finished_at,
            total_rows: row.total_rows,
            processed_rows: row.processed_rows,
            error: row.error,
            created_at: row.created_at,
        })
    }
}
