use chrono::{DateTime, Utc};
use modera_core::{AppError, Branch, BranchState, VerdictRecord, VerdictStatus};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Repository for persisted moderation verdicts
#[derive(Clone)]
pub struct VerdictRepository {
    pool: PgPool,
}

/// Row metadata not carried by the record itself
#[derive(Debug, Clone)]
pub struct StoredVerdict {
    pub record: VerdictRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerdictRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace the verdict for `record.content_id`.
    ///
    /// Writing the same record twice leaves exactly one row.
    #[tracing::instrument(skip(self, record), fields(content_id = %record.content_id))]
    pub async fn upsert(&self, record: &VerdictRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO moderation_verdicts (
                content_id, final_status, text_labels, image_labels, video_labels,
                severity_flags, toxicity_flags, branch_states, verdict_timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (content_id) DO UPDATE SET
                final_status = EXCLUDED.final_status,
                text_labels = EXCLUDED.text_labels,
                image_labels = EXCLUDED.image_labels,
                video_labels = EXCLUDED.video_labels,
                severity_flags = EXCLUDED.severity_flags,
                toxicity_flags = EXCLUDED.toxicity_flags,
                branch_states = EXCLUDED.branch_states,
                verdict_timestamp = EXCLUDED.verdict_timestamp,
                updated_at = NOW()
            "#,
        )
        .bind(&record.content_id)
        .bind(record.final_status.to_string())
        .bind(&record.text_labels)
        .bind(&record.image_labels)
        .bind(&record.video_labels)
        .bind(&record.severity_flags)
        .bind(&record.toxicity_flags)
        .bind(Json(&record.branch_states))
        .bind(&record.timestamp)
        .execute(&self.pool)
        .await?;

        tracing::debug!(status = %record.final_status, "Verdict row upserted");
        Ok(())
    }

    /// Get the verdict for a content id
    pub async fn get(&self, content_id: &str) -> Result<Option<StoredVerdict>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT content_id, final_status, text_labels, image_labels, video_labels,
                   severity_flags, toxicity_flags, branch_states, verdict_timestamp,
                   created_at, updated_at
            FROM moderation_verdicts
            WHERE content_id = $1
            "#,
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.get("final_status");
        let final_status = VerdictStatus::from_str(&status)
            .map_err(|e| AppError::Internal(format!("Corrupt verdict row {}: {}", content_id, e)))?;
        let Json(branch_states): Json<BTreeMap<Branch, BranchState>> = row.get("branch_states");

        Ok(Some(StoredVerdict {
            record: VerdictRecord {
                content_id: row.get("content_id"),
                text_labels: row.get("text_labels"),
                image_labels: row.get("image_labels"),
                video_labels: row.get("video_labels"),
                final_status,
                timestamp: row.get("verdict_timestamp"),
                severity_flags: row.get("severity_flags"),
                toxicity_flags: row.get("toxicity_flags"),
                branch_states,
            },
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }
}
