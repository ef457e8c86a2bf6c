//! Per-user risk state: cooldowns and false-appeal accounting.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::db::UserStateStore;
use crate::error::Result;
use crate::models::UserModerationState;

pub struct UserRiskService {
    store: Arc<dyn UserStateStore>,
    false_appeal_threshold: i32,
    cooldown: Duration,
}

impl UserRiskService {
    pub fn new(
        store: Arc<dyn UserStateStore>,
        false_appeal_threshold: i32,
        cooldown: Duration,
    ) -> Self {
        Self {
            store,
            false_appeal_threshold,
            cooldown,
        }
    }

    pub async fn get_or_init(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserModerationState> {
        self.store.get_or_init(user_id, now).await
    }

    /// Count a false appeal: the user re-triggered the forbidden path while
    /// their linked case was already rejected.
    pub async fn record_false_appeal(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UserModerationState> {
        self.store
            .record_false_appeal(user_id, self.false_appeal_threshold, self.cooldown, now)
            .await
    }
}
