use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Per-user moderation risk state. Created lazily on first reference.
///
/// `open_review_count` is capped at 1 by construction: a user has at most
/// one open review case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserModerationState {
    pub user_id: String,
    pub open_review_count: i32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub false_appeal_count: i32,
    pub review_rights_level: i32,
    pub updated_at: DateTime<Utc>,
}

impl UserModerationState {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            open_review_count: 0,
            cooldown_until: None,
            false_appeal_count: 0,
            review_rights_level: 1,
            updated_at: now,
        }
    }

    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map_or(false, |until| until > now)
    }

    /// Whether admission may open a new case for this user.
    pub fn can_open_case(&self, now: DateTime<Utc>) -> bool {
        self.review_rights_level > 0 && self.open_review_count < 1 && !self.is_in_cooldown(now)
    }

    /// Count a false appeal. At or past the threshold the cooldown is set,
    /// and a lapsed cooldown is renewed; a still-active cooldown is never
    /// shortened. Returns whether the cooldown was set by this call.
    pub fn record_false_appeal(
        &mut self,
        now: DateTime<Utc>,
        threshold: i32,
        cooldown: Duration,
    ) -> bool {
        self.false_appeal_count += 1;
        self.updated_at = now;
        if self.false_appeal_count >= threshold && !self.is_in_cooldown(now) {
            self.cooldown_until = Some(now + cooldown);
            return true;
        }
        false
    }
}
