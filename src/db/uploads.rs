//! Postgres upload store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::UploadStore;
use crate::error::{ModerationError, Result};
use crate::models::{
    CaseDecision, Fingerprint, ForbiddenReason, Outcome, PublicationStatus, TriggerRecord, Upload,
};

const UPLOAD_COLUMNS: &str = "id, user_id, outcome, applied_triggers, suggested_triggers, \
     forbidden_reasons, review_case_id, fingerprint, matched_upload_id, review_status, \
     publication_status, approved_at, created_at";

#[derive(FromRow)]
pub(crate) struct UploadRow {
    id: Uuid,
    user_id: Option<String>,
    outcome: String,
    applied_triggers: Json<Vec<TriggerRecord>>,
    suggested_triggers: Json<Vec<TriggerRecord>>,
    forbidden_reasons: Json<Vec<ForbiddenReason>>,
    review_case_id: Option<Uuid>,
    fingerprint: Json<Fingerprint>,
    matched_upload_id: Option<Uuid>,
    review_status: Option<String>,
    publication_status: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl UploadRow {
    pub(crate) fn into_upload(self) -> Result<Upload> {
        let outcome = Outcome::parse(&self.outcome).ok_or_else(|| {
            ModerationError::Internal(format!("unknown upload outcome {:?}", self.outcome))
        })?;
        let review_status = self
            .review_status
            .as_deref()
            .map(|s| {
                CaseDecision::parse(s).ok_or_else(|| {
                    ModerationError::Internal(format!("unknown review status {:?}", s))
                })
            })
            .transpose()?;
        let publication_status = self
            .publication_status
            .as_deref()
            .map(|s| {
                PublicationStatus::parse(s).ok_or_else(|| {
                    ModerationError::Internal(format!("unknown publication status {:?}", s))
                })
            })
            .transpose()?;
        Ok(Upload {
            id: self.id,
            user_id: self.user_id,
            outcome,
            applied_triggers: self.applied_triggers.0,
            suggested_triggers: self.suggested_triggers.0,
            forbidden_reasons: self.forbidden_reasons.0,
            review_case_id: self.review_case_id,
            fingerprint: self.fingerprint.0,
            matched_upload_id: self.matched_upload_id,
            review_status,
            publication_status,
            approved_at: self.approved_at,
            created_at: self.created_at,
        })
    }
}

pub struct PgUploadStore {
    pool: Arc<PgPool>,
}

impl PgUploadStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UploadStore for PgUploadStore {
    async fn insert(&self, upload: &Upload) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO uploads (
                id, user_id, outcome, applied_triggers, suggested_triggers,
                forbidden_reasons, review_case_id, fingerprint, matched_upload_id,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(upload.id)
        .bind(&upload.user_id)
        .bind(upload.outcome.as_str())
        .bind(Json(&upload.applied_triggers))
        .bind(Json(&upload.suggested_triggers))
        .bind(Json(&upload.forbidden_reasons))
        .bind(upload.review_case_id)
        .bind(Json(&upload.fingerprint))
        .bind(upload.matched_upload_id)
        .bind(upload.created_at)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Upload>> {
        let row = sqlx::query_as::<_, UploadRow>(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;
        row.map(UploadRow::into_upload).transpose()
    }

    async fn find_by_content_hash(&self, content_hash: &str) -> Result<Option<Upload>> {
        let row = sqlx::query_as::<_, UploadRow>(&format!(
            r#"
            SELECT {UPLOAD_COLUMNS} FROM uploads
            WHERE fingerprint->>'contentHash' = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(content_hash)
        .fetch_optional(&*self.pool)
        .await?;
        row.map(UploadRow::into_upload).transpose()
    }

    async fn find_by_perceptual_prefix(&self, prefix: &str, limit: i64) -> Result<Vec<Upload>> {
        let rows = sqlx::query_as::<_, UploadRow>(&format!(
            r#"
            SELECT {UPLOAD_COLUMNS} FROM uploads
            WHERE fingerprint->>'perceptualPrefix' = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(prefix)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;
        rows.into_iter().map(UploadRow::into_upload).collect()
    }

    async fn update_publication_status(
        &self,
        id: Uuid,
        status: PublicationStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE uploads SET publication_status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
