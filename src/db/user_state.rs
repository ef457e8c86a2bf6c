//! Postgres user moderation state store.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::sync::Arc;

use crate::db::UserStateStore;
use crate::error::Result;
use crate::models::UserModerationState;

const STATE_COLUMNS: &str =
    "user_id, open_review_count, cooldown_until, false_appeal_count, review_rights_level, \
     updated_at";

#[derive(FromRow)]
struct StateRow {
    user_id: String,
    open_review_count: i32,
    cooldown_until: Option<DateTime<Utc>>,
    false_appeal_count: i32,
    review_rights_level: i32,
    updated_at: DateTime<Utc>,
}

impl From<StateRow> for UserModerationState {
    fn from(row: StateRow) -> Self {
        UserModerationState {
            user_id: row.user_id,
            open_review_count: row.open_review_count,
            cooldown_until: row.cooldown_until,
            false_appeal_count: row.false_appeal_count,
            review_rights_level: row.review_rights_level,
            updated_at: row.updated_at,
        }
    }
}

async fn ensure_row(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
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
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Read the user's state row under a row lock; callers mutate the snapshot
/// and write it back inside the same transaction.
pub(crate) async fn lock_state(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
) -> Result<UserModerationState> {
    let row = sqlx::query_as::<_, StateRow>(&format!(
        "SELECT {STATE_COLUMNS} FROM user_moderation WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row.into())
}

pub struct PgUserStateStore {
    pool: Arc<PgPool>,
}

impl PgUserStateStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStateStore for PgUserStateStore {
    async fn get_or_init(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserModerationState> {
        let mut tx = self.pool.begin().await?;
        ensure_row(&mut tx, user_id, now).await?;
        let row = sqlx::query_as::<_, StateRow>(&format!(
            "SELECT {STATE_COLUMNS} FROM user_moderation WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn record_false_appeal(
        &self,
        user_id: &str,
        threshold: i32,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<UserModerationState> {
        let mut tx = self.pool.begin().await?;
        ensure_row(&mut tx, user_id, now).await?;
        let mut state = lock_state(&mut tx, user_id).await?;
        let cooldown_set = state.record_false_appeal(now, threshold, cooldown);
        sqlx::query(
            r#"
            UPDATE user_moderation
            SET false_appeal_count = $2, cooldown_until = $3, updated_at = $4
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(state.false_appeal_count)
        .bind(state.cooldown_until)
        .bind(state.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if cooldown_set {
            tracing::info!(
                user_id,
                false_appeal_count = state.false_appeal_count,
                "false-appeal threshold reached, cooldown set"
            );
        } else {
            tracing::info!(
                user_id,
                false_appeal_count = state.false_appeal_count,
                "false appeal recorded"
            );
        }
        Ok(state)
    }
}
