use serde::{Deserialize, Serialize};

/// Provenance of a trigger signal. Preserved on every record so verdicts
/// stay auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerSource {
    MakerTag,
    VisionSafety,
    VisionLabel,
    GenerativeClassifier,
}

/// A trigger with its score and source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub trigger: String,
    pub score: f64,
    pub source: TriggerSource,
}

impl TriggerRecord {
    pub fn new(trigger: impl Into<String>, score: f64, source: TriggerSource) -> Self {
        Self {
            trigger: trigger.into(),
            score,
            source,
        }
    }
}

/// A reason the verdict turned forbidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForbiddenReason {
    pub trigger: String,
    pub reason: String,
    pub score: f64,
}

/// Final moderation verdict for an upload.
///
/// Any single forbidden signal overrides any number of merely-suggested ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Allowed,
    Suggested,
    Forbidden,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Suggested => "suggested",
            Outcome::Forbidden => "forbidden",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "allowed" => Some(Outcome::Allowed),
            "suggested" => Some(Outcome::Suggested),
            "forbidden" => Some(Outcome::Forbidden),
            _ => None,
        }
    }
}
