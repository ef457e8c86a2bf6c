use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::review_case::CaseDecision;

/// Actions the uploader may take on a decision message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionActions {
    pub can_publish_now: bool,
    pub can_save_draft: bool,
}

/// Decision notification payload appended to the user's moderation thread
/// after a decide transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub decision: CaseDecision,
    pub title: String,
    pub message: String,
    pub reasons: Vec<String>,
    pub upload_id: Uuid,
    pub review_case_id: Uuid,
    pub actions: DecisionActions,
}

impl DecisionMessage {
    pub fn new(
        decision: CaseDecision,
        public_message: &str,
        reasons: &[String],
        upload_id: Uuid,
        review_case_id: Uuid,
    ) -> Self {
        let approved = decision == CaseDecision::Approved;
        let title = if approved {
            "Your photo has been approved"
        } else {
            "Your photo was not approved"
        };
        Self {
            message_type: "moderation_decision".to_string(),
            decision,
            title: title.to_string(),
            message: public_message.to_string(),
            reasons: reasons.to_vec(),
            upload_id,
            review_case_id,
            actions: DecisionActions {
                can_publish_now: approved,
                can_save_draft: approved,
            },
        }
    }
}

/// Stored message in a per-user thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationMessage {
    pub id: Uuid,
    pub user_id: String,
    pub thread_key: String,
    pub payload: DecisionMessage,
    pub unread: bool,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}
