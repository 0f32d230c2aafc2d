use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tracing::warn;
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{
    hospitals_from_value, BloodRequest, BloodType, Hospital, OwnerId, RequestDetails, RequestId,
    RequestStatus, SubmissionKey, Urgency,
};

const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

const SELECT_REQUEST_COLUMNS: &str = "SELECT id, owner_id, patient_name, age, blood_type, urgency, units_needed,
        contact_number, address, medical_notes, status, selected_hospitals, created_at
 FROM blood_requests";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct CreateOutcome {
    pub request: BloodRequest,
    /// True when the submission key had already been used by this owner and
    /// the earlier record was returned instead of inserting a new one.
    pub replayed: bool,
}

impl CreateOutcome {
    /// A replay whose stored details differ from the ones just submitted,
    /// meaning the submission key was reused for a different request.
    pub fn conflicts_with(&self, details: &RequestDetails) -> bool {
        self.replayed && self.request.details != *details
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    fn resulting_status(self) -> RequestStatus {
        match self {
            ReviewDecision::Approve => RequestStatus::Approved,
            ReviewDecision::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    Reviewed(BloodRequest),
    AlreadyReviewed(RequestStatus),
    NotFound,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every in-memory connection is its own database, so keep exactly one alive
        let pool_options = if database_url.starts_with(MEMORY_DATABASE_URL) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_blood_request(
        &self,
        owner_id: &OwnerId,
        details: &RequestDetails,
        submission_key: SubmissionKey,
    ) -> Result<CreateOutcome> {
        let request_id = RequestId::new();
        let inserted = sqlx::query(
            "INSERT INTO blood_requests (id, submission_key, owner_id, patient_name, age, blood_type, urgency,
                 units_needed, contact_number, address, medical_notes, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(owner_id, submission_key) DO NOTHING",
        )
        .bind(request_id.to_string())
        .bind(submission_key.to_string())
        .bind(owner_id.as_str())
        .bind(&details.patient_name)
        .bind(details.age.map(i64::from))
        .bind(details.blood_type.label())
        .bind(details.urgency.label())
        .bind(details.units_needed.map(i64::from))
        .bind(&details.contact_number)
        .bind(details.address.as_deref())
        .bind(details.medical_notes.as_deref())
        .bind(RequestStatus::Pending.label())
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .context("failed to insert blood request")?;

        let replayed = inserted.rows_affected() == 0;
        let row = sqlx::query(&format!(
            "{SELECT_REQUEST_COLUMNS} WHERE owner_id = ? AND submission_key = ?"
        ))
        .bind(owner_id.as_str())
        .bind(submission_key.to_string())
        .fetch_one(&self.pool)
        .await
        .context("failed to load blood request after insert")?;

        Ok(CreateOutcome {
            request: decode_request(&row)?,
            replayed,
        })
    }

    pub async fn get_blood_request(&self, request_id: RequestId) -> Result<Option<BloodRequest>> {
        let row = sqlx::query(&format!("{SELECT_REQUEST_COLUMNS} WHERE id = ?"))
            .bind(request_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_request).transpose()
    }

    /// Replaces the hospital snapshot list of one record. Returns false when
    /// no record has that id.
    pub async fn attach_hospitals(
        &self,
        request_id: RequestId,
        hospitals: &[Hospital],
    ) -> Result<bool> {
        let encoded =
            serde_json::to_string(hospitals).context("failed to encode selected hospitals")?;
        let updated = sqlx::query("UPDATE blood_requests SET selected_hospitals = ? WHERE id = ?")
            .bind(encoded)
            .bind(request_id.to_string())
            .execute(&self.pool)
            .await
            .context("failed to update selected hospitals")?;
        Ok(updated.rows_affected() > 0)
    }

    /// Newest first; rows created in the same microsecond keep insertion order.
    /// Rows that cannot be decoded are skipped.
    pub async fn list_blood_requests_for_owner(
        &self,
        owner_id: &OwnerId,
    ) -> Result<Vec<BloodRequest>> {
        let rows = sqlx::query(&format!(
            "{SELECT_REQUEST_COLUMNS} WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(owner_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .filter_map(|row| match decode_request(row) {
                Ok(request) => Some(request),
                Err(error) => {
                    warn!(
                        owner_id = %owner_id,
                        error = %format!("{error:#}"),
                        "skipping unreadable blood request row"
                    );
                    None
                }
            })
            .collect())
    }

    pub async fn review_blood_request(
        &self,
        request_id: RequestId,
        decision: ReviewDecision,
    ) -> Result<ReviewOutcome> {
        let updated =
            sqlx::query("UPDATE blood_requests SET status = ? WHERE id = ? AND status = ?")
                .bind(decision.resulting_status().label())
                .bind(request_id.to_string())
                .bind(RequestStatus::Pending.label())
                .execute(&self.pool)
                .await
                .context("failed to review blood request")?;

        let current = self.get_blood_request(request_id).await?;
        Ok(match current {
            None => ReviewOutcome::NotFound,
            Some(request) if updated.rows_affected() > 0 => ReviewOutcome::Reviewed(request),
            Some(request) => ReviewOutcome::AlreadyReviewed(request.status),
        })
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_request(row: &SqliteRow) -> Result<BloodRequest> {
    let id: String = row.try_get("id")?;
    let request_id = id
        .parse::<RequestId>()
        .with_context(|| format!("invalid blood request id '{id}'"))?;
    let blood_type: String = row.try_get("blood_type")?;
    let blood_type = BloodType::from_str(&blood_type)
        .with_context(|| format!("blood request {id} has an invalid blood type"))?;
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .with_context(|| format!("blood request {id} has an invalid created_at '{created_at}'"))?
        .with_timezone(&Utc);
    let selected_hospitals = row
        .try_get::<Option<String>, _>("selected_hospitals")?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .and_then(hospitals_from_value);

    Ok(BloodRequest {
        id: request_id,
        owner_id: OwnerId(row.try_get("owner_id")?),
        details: RequestDetails {
            patient_name: row.try_get("patient_name")?,
            age: optional_u32(row, "age")?,
            blood_type,
            urgency: Urgency::from_label(&row.try_get::<String, _>("urgency")?),
            units_needed: optional_u32(row, "units_needed")?,
            contact_number: row.try_get("contact_number")?,
            address: row.try_get("address")?,
            medical_notes: row.try_get("medical_notes")?,
        },
        status: RequestStatus::from_label(&row.try_get::<String, _>("status")?),
        selected_hospitals,
        created_at,
    })
}

fn optional_u32(row: &SqliteRow, column: &str) -> Result<Option<u32>> {
    row.try_get::<Option<i64>, _>(column)?
        .map(|value| {
            u32::try_from(value).with_context(|| format!("column {column} out of range: {value}"))
        })
        .transpose()
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(MEMORY_DATABASE_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
