//! Store ports and their Postgres implementations.
//!
//! `ReviewCase` and `UserModerationState` are the only mutable shared
//! documents; every mutation of them goes through a transactional
//! read-modify-write (`SELECT ... FOR UPDATE`) so lock and state
//! transitions are never clobbered by a concurrent writer.

pub mod messages;
pub mod review_cases;
pub mod uploads;
pub mod user_state;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CaseDecision, ClaimOutcome, DecisionInput, DecisionMessage, Fingerprint, ModerationMessage,
    PublicationStatus, ReviewCase, Upload, UserModerationState,
};

pub use messages::PgNotificationSink;
pub use review_cases::PgReviewCaseStore;
pub use uploads::PgUploadStore;
pub use user_state::PgUserStateStore;

/// Result of an admission attempt for a user.
#[derive(Debug, Clone)]
pub enum CaseAdmission {
    /// A new case was opened and `open_review_count` set in the same
    /// transaction.
    Created(ReviewCase),
    /// The user already has an open case; its id is returned instead.
    Existing(ReviewCase),
    /// Rights, open-count, or cooldown refused a new case.
    Refused,
}

/// A committed decision: the terminal case plus the upload it resolved.
#[derive(Debug, Clone)]
pub struct DecidedCase {
    pub case: ReviewCase,
    pub upload_id: Uuid,
    pub user_id: String,
    pub decision: CaseDecision,
}

#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn insert(&self, upload: &Upload) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Upload>>;
    /// Exact content-hash match, most recent first.
    async fn find_by_content_hash(&self, content_hash: &str) -> Result<Option<Upload>>;
    /// Bounded candidate set sharing the perceptual prefix.
    async fn find_by_perceptual_prefix(&self, prefix: &str, limit: i64) -> Result<Vec<Upload>>;
    /// Post-decision publication transition (publish-now / save-draft).
    /// Returns false when the upload does not exist.
    async fn update_publication_status(
        &self,
        id: Uuid,
        status: PublicationStatus,
    ) -> Result<bool>;
}

#[async_trait]
pub trait ReviewCaseStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ReviewCase>>;
    async fn find_open_for_user(&self, user_id: &str) -> Result<Option<ReviewCase>>;
    /// Atomically open a case for the user, serialized against concurrent
    /// admissions for the same user via the user-state row.
    async fn create_for_user(
        &self,
        user_id: &str,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<CaseAdmission>;
    async fn claim(
        &self,
        case_id: Uuid,
        uid: &str,
        email: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<ClaimOutcome>;
    async fn release(&self, case_id: Uuid, uid: &str, now: DateTime<Utc>) -> Result<()>;
    /// The decide transaction: case transition, upload review fields, and
    /// the user's open-review count move together or not at all.
    async fn decide(
        &self,
        case_id: Uuid,
        input: &DecisionInput,
        now: DateTime<Utc>,
    ) -> Result<DecidedCase>;
    /// Idempotent set-union linking of an upload into the case.
    async fn link_upload(
        &self,
        case_id: Uuid,
        upload_id: Uuid,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<()>;
}

#[async_trait]
pub trait UserStateStore: Send + Sync {
    /// Lazy creation with defaults on first read.
    async fn get_or_init(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserModerationState>;
    async fn record_false_appeal(
        &self,
        user_id: &str,
        threshold: i32,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<UserModerationState>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Append a decision message to the user's thread.
    async fn post(
        &self,
        user_id: &str,
        thread_key: &str,
        message: &DecisionMessage,
        now: DateTime<Utc>,
    ) -> Result<Uuid>;
    async fn find_message(
        &self,
        user_id: &str,
        message_id: Uuid,
    ) -> Result<Option<ModerationMessage>>;
    /// Mark a message read, and resolved when `resolved` is set.
    async fn resolve_message(
        &self,
        user_id: &str,
        message_id: Uuid,
        resolved: bool,
        now: DateTime<Utc>,
    ) -> Result<()>;
}
