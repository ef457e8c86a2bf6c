//! Review case workflow: admission, lease-based claiming, decisions, and
//! the uploader's follow-up actions on a decision message.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{
    CaseAdmission, DecidedCase, NotificationSink, ReviewCaseStore, UploadStore,
};
use crate::error::{ModerationError, Result};
use crate::models::{
    CaseDecision, CaseStatus, ClaimOutcome, DecisionInput, DecisionMessage, Fingerprint,
    PublicationStatus,
};
use crate::services::risk::UserRiskService;

const MODERATION_THREAD_KEY: &str = "moderation";
const MAX_PUBLIC_MESSAGE_CHARS: usize = 280;
const MAX_DECISION_REASONS: usize = 3;

/// Resolved moderator identity, established by an external collaborator.
#[derive(Debug, Clone)]
pub struct Moderator {
    pub uid: String,
    pub email: String,
}

/// Outcome of the admission flow for a forbidden verdict.
#[derive(Debug, Clone, Default)]
pub struct AdmissionDecision {
    pub review_case_id: Option<Uuid>,
    pub can_request_review: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClaimResult {
    pub claimed: bool,
    pub claimed_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DecideCommand {
    pub decision: CaseDecision,
    pub public_message: String,
    pub reasons: Vec<String>,
    pub internal_note: Option<String>,
}

/// Uploader action on a decision message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecisionAction {
    PublishNow,
    SaveDraft,
    Dismiss,
}

pub struct ReviewCaseService {
    cases: Arc<dyn ReviewCaseStore>,
    uploads: Arc<dyn UploadStore>,
    notifications: Arc<dyn NotificationSink>,
    risk: UserRiskService,
    lock_duration: Duration,
}

impl ReviewCaseService {
    pub fn new(
        cases: Arc<dyn ReviewCaseStore>,
        uploads: Arc<dyn UploadStore>,
        notifications: Arc<dyn NotificationSink>,
        risk: UserRiskService,
        lock_duration: Duration,
    ) -> Self {
        Self {
            cases,
            uploads,
            notifications,
            risk,
            lock_duration,
        }
    }

    /// Admission flow for a forbidden verdict. At most one open case per
    /// user; cooldown and rights refuse silently (reported through
    /// `can_request_review`).
    pub async fn admission(
        &self,
        user_id: &str,
        fingerprint: &Fingerprint,
        cached_case_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<AdmissionDecision> {
        // False-appeal accounting runs before admission is evaluated: a
        // re-trigger against an already-rejected case may set the cooldown
        // that the admission check below then honors.
        if let Some(case_id) = cached_case_id {
            if let Some(case) = self.cases.get(case_id).await? {
                if case.user_id == user_id {
                    match case.status {
                        CaseStatus::Rejected => {
                            self.risk.record_false_appeal(user_id, now).await?;
                        }
                        CaseStatus::InReview => {
                            return Ok(AdmissionDecision {
                                review_case_id: Some(case.id),
                                can_request_review: false,
                            });
                        }
                        CaseStatus::Approved => {}
                    }
                }
            }
        }

        if let Some(open) = self.cases.find_open_for_user(user_id).await? {
            return Ok(AdmissionDecision {
                review_case_id: Some(open.id),
                can_request_review: false,
            });
        }

        let state = self.risk.get_or_init(user_id, now).await?;
        if !state.can_open_case(now) {
            if state.is_in_cooldown(now) {
                tracing::info!(user_id, "review admission refused: user in cooldown");
            }
            return Ok(AdmissionDecision::default());
        }

        match self.cases.create_for_user(user_id, fingerprint, now).await? {
            CaseAdmission::Created(case) | CaseAdmission::Existing(case) => Ok(AdmissionDecision {
                review_case_id: Some(case.id),
                can_request_review: false,
            }),
            CaseAdmission::Refused => Ok(AdmissionDecision::default()),
        }
    }

    pub async fn link_upload(
        &self,
        case_id: Uuid,
        upload_id: Uuid,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.cases
            .link_upload(case_id, upload_id, fingerprint, now)
            .await
    }

    pub async fn claim(&self, case_id: Uuid, moderator: &Moderator) -> Result<ClaimResult> {
        let now = Utc::now();
        let outcome = self
            .cases
            .claim(
                case_id,
                &moderator.uid,
                &moderator.email,
                now,
                self.lock_duration,
            )
            .await?;
        Ok(match outcome {
            ClaimOutcome::Granted { .. } => ClaimResult {
                claimed: true,
                claimed_by: Some(moderator.email.clone()),
            },
            ClaimOutcome::Held { claimed_by_email } => ClaimResult {
                claimed: false,
                claimed_by: Some(claimed_by_email),
            },
        })
    }

    pub async fn release(&self, case_id: Uuid, moderator: &Moderator) -> Result<()> {
        self.cases
            .release(case_id, &moderator.uid, Utc::now())
            .await
    }

    /// Validate and commit a decision, then emit the decision message.
    /// Notification failure never rolls back the committed decision; the
    /// case state machine is the source of truth.
    pub async fn decide(
        &self,
        case_id: Uuid,
        moderator: &Moderator,
        command: DecideCommand,
    ) -> Result<DecidedCase> {
        let public_message = command.public_message.trim().to_string();
        if public_message.is_empty() {
            return Err(ModerationError::Validation(
                "decision message is required".to_string(),
            ));
        }
        if public_message.chars().count() > MAX_PUBLIC_MESSAGE_CHARS {
            return Err(ModerationError::Validation(format!(
                "decision message must be at most {} characters",
                MAX_PUBLIC_MESSAGE_CHARS
            )));
        }
        if command.reasons.len() > MAX_DECISION_REASONS {
            return Err(ModerationError::Validation(format!(
                "at most {} decision reasons allowed",
                MAX_DECISION_REASONS
            )));
        }

        let now = Utc::now();
        let input = DecisionInput {
            moderator_uid: moderator.uid.clone(),
            moderator_email: moderator.email.clone(),
            decision: command.decision,
            public_message: public_message.clone(),
            reasons: command.reasons.clone(),
            internal_note: command.internal_note.clone(),
        };
        let decided = self.cases.decide(case_id, &input, now).await?;

        let message = DecisionMessage::new(
            decided.decision,
            &public_message,
            &command.reasons,
            decided.upload_id,
            decided.case.id,
        );
        if let Err(e) = self
            .notifications
            .post(&decided.user_id, MODERATION_THREAD_KEY, &message, now)
            .await
        {
            tracing::warn!(
                case_id = %decided.case.id,
                "decision notification failed: {}",
                e
            );
        }

        Ok(decided)
    }

    /// Uploader follow-up on a decision message: publish now, save as
    /// draft, or dismiss the message.
    pub async fn resolve_decision(
        &self,
        user_id: &str,
        message_id: Uuid,
        upload_id: Uuid,
        action: DecisionAction,
    ) -> Result<()> {
        let now = Utc::now();
        let message = self
            .notifications
            .find_message(user_id, message_id)
            .await?
            .ok_or_else(|| ModerationError::NotFound("message not found".to_string()))?;
        let upload = self
            .uploads
            .find_by_id(upload_id)
            .await?
            .ok_or_else(|| ModerationError::NotFound("upload not found".to_string()))?;

        if message.payload.upload_id != upload_id || upload.user_id.as_deref() != Some(user_id) {
            return Err(ModerationError::Forbidden(
                "not authorized for this action".to_string(),
            ));
        }

        match action {
            DecisionAction::PublishNow | DecisionAction::SaveDraft => {
                if upload.review_status != Some(CaseDecision::Approved) {
                    return Err(ModerationError::Conflict(
                        "upload is not approved".to_string(),
                    ));
                }
                let status = if action == DecisionAction::PublishNow {
                    PublicationStatus::Published
                } else {
                    PublicationStatus::Draft
                };
                self.uploads
                    .update_publication_status(upload_id, status)
                    .await?;
                self.notifications
                    .resolve_message(user_id, message_id, true, now)
                    .await?;
            }
            DecisionAction::Dismiss => {
                self.notifications
                    .resolve_message(user_id, message_id, false, now)
                    .await?;
            }
        }
        Ok(())
    }
}
