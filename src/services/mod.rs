pub mod classification;
pub mod dedup;
pub mod fingerprint;
pub mod pipeline;
pub mod review;
pub mod risk;

pub use classification::{Classification, Thresholds, TriggerClassifier};
pub use dedup::{DuplicateMatch, DuplicateResolver};
pub use pipeline::{ClassificationSource, ModerationPipeline, ModerationRequest, ModerationVerdict};
pub use review::{
    AdmissionDecision, ClaimResult, DecideCommand, DecisionAction, Moderator, ReviewCaseService,
};
pub use risk::UserRiskService;
