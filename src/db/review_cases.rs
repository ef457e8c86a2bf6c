//! Postgres review case store.
//!
//! Claim, release, decide, and admission each run as a single transaction
//! over a `SELECT ... FOR UPDATE` snapshot; the state machine itself lives
//! on the `ReviewCase` model and is applied to that snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CaseAdmission, DecidedCase, ReviewCaseStore};
use crate::error::{ModerationError, Result};
use crate::models::{
    CaseDecision, CaseLock, CaseStatus, ClaimOutcome, DecisionInput, Fingerprint, ReviewCase,
};

const CASE_COLUMNS: &str = "id, user_id, status, fingerprints, linked_upload_ids, claim_lock, \
     decision_message_public, decision_reasons, moderator_note_internal, decided_by_uid, \
     decided_by_email, decided_at, created_at, updated_at";

#[derive(FromRow)]
struct CaseRow {
    id: Uuid,
    user_id: String,
    status: String,
    fingerprints: Json<Vec<Fingerprint>>,
    linked_upload_ids: Vec<Uuid>,
    claim_lock: Option<Json<CaseLock>>,
    decision_message_public: Option<String>,
    decision_reasons: Option<Json<Vec<String>>>,
    moderator_note_internal: Option<String>,
    decided_by_uid: Option<String>,
    decided_by_email: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CaseRow {
    fn into_case(self) -> Result<ReviewCase> {
        let status = CaseStatus::parse(&self.status).ok_or_else(|| {
            ModerationError::Internal(format!("unknown case status {:?}", self.status))
        })?;
        Ok(ReviewCase {
            id: self.id,
            user_id: self.user_id,
            status,
            fingerprints: self.fingerprints.0,
            linked_upload_ids: self.linked_upload_ids,
            lock: self.claim_lock.map(|l| l.0),
            decision_message_public: self.decision_message_public,
            decision_reasons: self.decision_reasons.map(|r| r.0),
            moderator_note_internal: self.moderator_note_internal,
            decided_by_uid: self.decided_by_uid,
            decided_by_email: self.decided_by_email,
            decided_at: self.decided_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct PgReviewCaseStore {
    pool: Arc<PgPool>,
}

impl PgReviewCaseStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn lock_case(
        tx: &mut Transaction<'_, Postgres>,
        case_id: Uuid,
    ) -> Result<ReviewCase> {
        let row = sqlx::query_as::<_, CaseRow>(&format!(
            "SELECT {CASE_COLUMNS} FROM review_cases WHERE id = $1 FOR UPDATE"
        ))
        .bind(case_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| ModerationError::NotFound(format!("review case {} not found", case_id)))?;
        row.into_case()
    }

    /// Write back every mutable field of the case snapshot.
    async fn persist_case(
        tx: &mut Transaction<'_, Postgres>,
        case: &ReviewCase,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE review_cases
            SET status = $2,
                fingerprints = $3,
                linked_upload_ids = $4,
                claim_lock = $5,
                decision_message_public = $6,
                decision_reasons = $7,
                moderator_note_internal = $8,
                decided_by_uid = $9,
                decided_by_email = $10,
                decided_at = $11,
                updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(case.id)
        .bind(case.status.as_str())
        .bind(Json(&case.fingerprints))
        .bind(&case.linked_upload_ids)
        .bind(case.lock.as_ref().map(Json))
        .bind(&case.decision_message_public)
        .bind(case.decision_reasons.as_ref().map(Json))
        .bind(&case.moderator_note_internal)
        .bind(&case.decided_by_uid)
        .bind(&case.decided_by_email)
        .bind(case.decided_at)
        .bind(case.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ReviewCaseStore for PgReviewCaseStore {
    async fn get(&self, id: Uuid) -> Result<Option<ReviewCase>> {
        let row = sqlx::query_as::<_, CaseRow>(&format!(
            "SELECT {CASE_COLUMNS} FROM review_cases WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;
        row.map(CaseRow::into_case).transpose()
    }

    async fn find_open_for_user(&self, user_id: &str) -> Result<Option<ReviewCase>> {
        let row = sqlx::query_as::<_, CaseRow>(&format!(
            r#"
            SELECT {CASE_COLUMNS} FROM review_cases
            WHERE user_id = $1 AND status = 'in_review'
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?;
        row.map(CaseRow::into_case).transpose()
    }

    async fn create_for_user(
        &self,
        user_id: &str,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<CaseAdmission> {
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent admissions for the same user on their state
        // row; requests for different users do not contend.
        sqlx::query(
            r#"
            INSERT INTO user_moderation (user_id, open_review_count, false_appeal_count,
                                         review_rights_level, updated_at)
            VALUES ($1, 0, 0, 1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let state = super::user_state::lock_state(&mut tx, user_id).await?;

        let existing = sqlx::query_as::<_, CaseRow>(&format!(
            r#"
            SELECT {CASE_COLUMNS} FROM review_cases
            WHERE user_id = $1 AND status = 'in_review'
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = existing {
            tx.commit().await?;
            return Ok(CaseAdmission::Existing(row.into_case()?));
        }

        if !state.can_open_case(now) {
            tx.commit().await?;
            return Ok(CaseAdmission::Refused);
        }

        let case = ReviewCase::open(user_id, fingerprint.clone(), now);
        sqlx::query(
            r#"
            INSERT INTO review_cases (id, user_id, status, fingerprints, linked_upload_ids,
                                      created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(case.id)
        .bind(&case.user_id)
        .bind(case.status.as_str())
        .bind(Json(&case.fingerprints))
        .bind(&case.linked_upload_ids)
        .bind(case.created_at)
        .bind(case.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE user_moderation SET open_review_count = 1, updated_at = $2 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(case_id = %case.id, user_id, "review case opened");
        Ok(CaseAdmission::Created(case))
    }

    async fn claim(
        &self,
        case_id: Uuid,
        uid: &str,
        email: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<ClaimOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut case = Self::lock_case(&mut tx, case_id).await?;
        let outcome = case.try_claim(uid, email, now, lease)?;
        if matches!(outcome, ClaimOutcome::Granted { .. }) {
            Self::persist_case(&mut tx, &case).await?;
        }
        tx.commit().await?;
        Ok(outcome)
    }

    async fn release(&self, case_id: Uuid, uid: &str, now: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let mut case = Self::lock_case(&mut tx, case_id).await?;
        if case.release(uid, now) {
            Self::persist_case(&mut tx, &case).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn decide(
        &self,
        case_id: Uuid,
        input: &DecisionInput,
        now: DateTime<Utc>,
    ) -> Result<DecidedCase> {
        let mut tx = self.pool.begin().await?;
        let mut case = Self::lock_case(&mut tx, case_id).await?;
        case.apply_decision(input, now)?;

        let upload_id = case.linked_upload_ids.first().copied().ok_or_else(|| {
            ModerationError::Validation("review case has no linked upload".to_string())
        })?;

        let approved = input.decision == CaseDecision::Approved;
        sqlx::query(
            r#"
            UPDATE uploads
            SET review_status = $2,
                publication_status = $3,
                approved_at = $4,
                review_case_id = $5
            WHERE id = $1
            "#,
        )
        .bind(upload_id)
        .bind(input.decision.as_str())
        .bind(if approved { "pending" } else { "blocked" })
        .bind(approved.then_some(now))
        .bind(case.id)
        .execute(&mut *tx)
        .await?;

        Self::persist_case(&mut tx, &case).await?;

        // The case is no longer open; free the user's review slot in the
        // same transaction.
        sqlx::query(
            "UPDATE user_moderation SET open_review_count = 0, updated_at = $2 WHERE user_id = $1",
        )
        .bind(&case.user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(
            case_id = %case.id,
            decision = input.decision.as_str(),
            decided_by = %input.moderator_email,
            "review case decided"
        );

        let user_id = case.user_id.clone();
        Ok(DecidedCase {
            case,
            upload_id,
            user_id,
            decision: input.decision,
        })
    }

    async fn link_upload(
        &self,
        case_id: Uuid,
        upload_id: Uuid,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let mut case = Self::lock_case(&mut tx, case_id).await?;
        if case.link_upload(upload_id, fingerprint, now) {
            Self::persist_case(&mut tx, &case).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
