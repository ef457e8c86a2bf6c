pub mod fingerprint;
pub mod message;
pub mod review_case;
pub mod trigger;
pub mod upload;
pub mod user_state;

pub use fingerprint::Fingerprint;
pub use message::{DecisionMessage, ModerationMessage};
pub use review_case::{
    CaseDecision, CaseLock, CaseStatus, ClaimOutcome, DecisionInput, ReviewCase,
};
pub use trigger::{ForbiddenReason, Outcome, TriggerRecord, TriggerSource};
pub use upload::{PublicationStatus, Upload};
pub use user_state::UserModerationState;
