//! Postgres notification sink: per-user moderation message threads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::NotificationSink;
use crate::error::Result;
use crate::models::{DecisionMessage, ModerationMessage};

#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    user_id: String,
    thread_key: String,
    payload: Json<DecisionMessage>,
    unread: bool,
    resolved: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for ModerationMessage {
    fn from(row: MessageRow) -> Self {
        ModerationMessage {
            id: row.id,
            user_id: row.user_id,
            thread_key: row.thread_key,
            payload: row.payload.0,
            unread: row.unread,
            resolved: row.resolved,
            created_at: row.created_at,
        }
    }
}

pub struct PgNotificationSink {
    pool: Arc<PgPool>,
}

impl PgNotificationSink {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationSink for PgNotificationSink {
    async fn post(
        &self,
        user_id: &str,
        thread_key: &str,
        message: &DecisionMessage,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO moderation_messages (id, user_id, thread_key, payload, unread,
                                             resolved, created_at)
            VALUES ($1, $2, $3, $4, true, false, $5)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(thread_key)
        .bind(Json(message))
        .bind(now)
        .execute(&*self.pool)
        .await?;
        Ok(id)
    }

    async fn find_message(
        &self,
        user_id: &str,
        message_id: Uuid,
    ) -> Result<Option<ModerationMessage>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, user_id, thread_key, payload, unread, resolved, created_at
            FROM moderation_messages
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(row.map(ModerationMessage::from))
    }

    async fn resolve_message(
        &self,
        user_id: &str,
        message_id: Uuid,
        resolved: bool,
        _now: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE moderation_messages
            SET unread = false, resolved = resolved OR $3
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(resolved)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}
