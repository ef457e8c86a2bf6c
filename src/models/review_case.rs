use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ModerationError, Result};
use crate::models::Fingerprint;

/// Review case lifecycle: `in_review -> {approved, rejected}`, terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseStatus {
    InReview,
    Approved,
    Rejected,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::InReview => "in_review",
            CaseStatus::Approved => "approved",
            CaseStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_review" => Some(CaseStatus::InReview),
            "approved" => Some(CaseStatus::Approved),
            "rejected" => Some(CaseStatus::Rejected),
            _ => None,
        }
    }
}

/// Moderator decision on a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseDecision {
    Approved,
    Rejected,
}

impl CaseDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseDecision::Approved => "approved",
            CaseDecision::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(CaseDecision::Approved),
            "rejected" => Some(CaseDecision::Rejected),
            _ => None,
        }
    }
}

impl From<CaseDecision> for CaseStatus {
    fn from(decision: CaseDecision) -> Self {
        match decision {
            CaseDecision::Approved => CaseStatus::Approved,
            CaseDecision::Rejected => CaseStatus::Rejected,
        }
    }
}

/// Time-bounded lease on a review case. Absence or expiry means unlocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseLock {
    pub claimed_by_uid: String,
    pub claimed_by_email: String,
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CaseLock {
    pub fn new(uid: &str, email: &str, now: DateTime<Utc>, lease: Duration) -> Self {
        Self {
            claimed_by_uid: uid.to_string(),
            claimed_by_email: email.to_string(),
            claimed_at: now,
            expires_at: now + lease,
        }
    }

    /// An expired lock is simply ignored by the next claimant.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn is_held_by(&self, uid: &str) -> bool {
        self.claimed_by_uid == uid
    }
}

/// Result of a claim attempt. Contention is a normal signal, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Granted { lock: CaseLock },
    Held { claimed_by_email: String },
}

/// Validated moderator decision, applied inside the decide transaction.
#[derive(Debug, Clone)]
pub struct DecisionInput {
    pub moderator_uid: String,
    pub moderator_email: String,
    pub decision: CaseDecision,
    pub public_message: String,
    pub reasons: Vec<String>,
    pub internal_note: Option<String>,
}

/// Human-review workflow unit created for a forbidden verdict.
///
/// All state transitions go through the methods below; stores call them
/// inside a single transactional read-modify-write so lock checks and
/// writes are never separated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCase {
    pub id: Uuid,
    pub user_id: String,
    pub status: CaseStatus,
    pub fingerprints: Vec<Fingerprint>,
    pub linked_upload_ids: Vec<Uuid>,
    pub lock: Option<CaseLock>,
    pub decision_message_public: Option<String>,
    pub decision_reasons: Option<Vec<String>>,
    pub moderator_note_internal: Option<String>,
    pub decided_by_uid: Option<String>,
    pub decided_by_email: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewCase {
    pub fn open(user_id: &str, fingerprint: Fingerprint, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            status: CaseStatus::InReview,
            fingerprints: vec![fingerprint],
            linked_upload_ids: Vec::new(),
            lock: None,
            decision_message_public: None,
            decision_reasons: None,
            moderator_note_internal: None,
            decided_by_uid: None,
            decided_by_email: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn active_foreign_lock(&self, uid: &str, now: DateTime<Utc>) -> Option<&CaseLock> {
        self.lock
            .as_ref()
            .filter(|lock| lock.is_active(now) && !lock.is_held_by(uid))
    }

    /// Attempt to claim the case for a moderator. Renews the lease when the
    /// same moderator re-claims.
    pub fn try_claim(
        &mut self,
        uid: &str,
        email: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<ClaimOutcome> {
        if self.status != CaseStatus::InReview {
            return Err(ModerationError::Conflict(
                "review case is not in review".to_string(),
            ));
        }
        if let Some(holder) = self.active_foreign_lock(uid, now) {
            return Ok(ClaimOutcome::Held {
                claimed_by_email: holder.claimed_by_email.clone(),
            });
        }
        let lock = CaseLock::new(uid, email, now, lease);
        self.lock = Some(lock.clone());
        self.updated_at = now;
        Ok(ClaimOutcome::Granted { lock })
    }

    /// Clear the lock only when held by `uid`; never force-clears another
    /// holder's lock.
    pub fn release(&mut self, uid: &str, now: DateTime<Utc>) -> bool {
        match &self.lock {
            Some(lock) if lock.is_held_by(uid) => {
                self.lock = None;
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// Apply a moderator decision: transition to the terminal status and
    /// clear any lock. The foreign-lock check establishes the right to
    /// decide; an expired or absent lease does not block.
    pub fn apply_decision(&mut self, input: &DecisionInput, now: DateTime<Utc>) -> Result<()> {
        if self.status != CaseStatus::InReview {
            return Err(ModerationError::Conflict(
                "review case already decided".to_string(),
            ));
        }
        if let Some(holder) = self.active_foreign_lock(&input.moderator_uid, now) {
            return Err(ModerationError::Locked(holder.claimed_by_email.clone()));
        }
        self.status = input.decision.into();
        self.decision_message_public = Some(input.public_message.clone());
        self.decision_reasons = Some(input.reasons.clone());
        self.moderator_note_internal = input.internal_note.clone();
        self.decided_by_uid = Some(input.moderator_uid.clone());
        self.decided_by_email = Some(input.moderator_email.clone());
        self.decided_at = Some(now);
        self.lock = None;
        self.updated_at = now;
        Ok(())
    }

    /// Link an upload and its fingerprint into the case. Set-union
    /// semantics, safe to retry.
    pub fn link_upload(
        &mut self,
        upload_id: Uuid,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> bool {
        let mut changed = false;
        if !self.linked_upload_ids.contains(&upload_id) {
            self.linked_upload_ids.push(upload_id);
            changed = true;
        }
        if !self.fingerprints.contains(fingerprint) {
            self.fingerprints.push(fingerprint.clone());
            changed = true;
        }
        if changed {
            self.updated_at = now;
        }
        changed
    }
}
