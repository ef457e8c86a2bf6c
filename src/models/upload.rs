use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::review_case::CaseDecision;
use super::trigger::{ForbiddenReason, Outcome, TriggerRecord};
use super::Fingerprint;

/// Publication state of an upload after a review decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PublicationStatus {
    Pending,
    Blocked,
    Published,
    Draft,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Pending => "pending",
            PublicationStatus::Blocked => "blocked",
            PublicationStatus::Published => "published",
            PublicationStatus::Draft => "draft",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PublicationStatus::Pending),
            "blocked" => Some(PublicationStatus::Blocked),
            "published" => Some(PublicationStatus::Published),
            "draft" => Some(PublicationStatus::Draft),
            _ => None,
        }
    }
}

/// One record per moderation request. Created once; only the review decision
/// step mutates `review_status`, `publication_status` and `approved_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub outcome: Outcome,
    pub applied_triggers: Vec<TriggerRecord>,
    pub suggested_triggers: Vec<TriggerRecord>,
    pub forbidden_reasons: Vec<ForbiddenReason>,
    pub review_case_id: Option<Uuid>,
    pub fingerprint: Fingerprint,
    pub matched_upload_id: Option<Uuid>,
    pub review_status: Option<CaseDecision>,
    pub publication_status: Option<PublicationStatus>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
