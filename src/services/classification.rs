//! Trigger classification engine: fuses maker-declared tags with vision
//! safety, vision label, and generative classifier signals into a verdict
//! under fixed thresholds.

use std::sync::Arc;

use crate::clients::{
    GenerativeClassifierPort, GenerativeSeverity, GenerativeVerdict, LabelAnnotation,
    SafetyAnnotation, VisionLabelPort, VisionSafetyPort,
};
use crate::models::{ForbiddenReason, Outcome, TriggerRecord, TriggerSource};

const NEEDLES_KEYWORDS: &[&str] = &[
    "needle",
    "syringe",
    "injection",
    "injections",
    "hypodermic",
    "vaccination",
];
const SPIDERS_KEYWORDS: &[&str] = &[
    "spider",
    "spiders",
    "insect",
    "insects",
    "bug",
    "bugs",
    "beetle",
    "mosquito",
    "cockroach",
    "ant",
    "fly",
];

struct LabelCategory {
    trigger: &'static str,
    reason: &'static str,
    keywords: &'static [&'static str],
}

const LABEL_CATEGORIES: &[LabelCategory] = &[
    LabelCategory {
        trigger: "needlesInjections",
        reason: "vision labels",
        keywords: NEEDLES_KEYWORDS,
    },
    LabelCategory {
        trigger: "spidersInsects",
        reason: "vision labels",
        keywords: SPIDERS_KEYWORDS,
    },
];

/// Classification thresholds, injected from config.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub suggest: f64,
    pub forbidden: f64,
    pub medium_log: f64,
}

/// Fused classification result.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub applied_triggers: Vec<TriggerRecord>,
    pub suggested_triggers: Vec<TriggerRecord>,
    pub forbidden_reasons: Vec<ForbiddenReason>,
}

impl Classification {
    /// Forbidden beats suggested beats allowed; a single forbidden signal
    /// overrides any number of merely-suggested ones.
    pub fn outcome(&self) -> Outcome {
        if !self.forbidden_reasons.is_empty() {
            Outcome::Forbidden
        } else if !self.suggested_triggers.is_empty() {
            Outcome::Suggested
        } else {
            Outcome::Allowed
        }
    }
}

/// Accumulates (trigger, score) signals under the threshold policy.
pub struct VerdictBuilder {
    thresholds: Thresholds,
    classification: Classification,
}

impl VerdictBuilder {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            classification: Classification::default(),
        }
    }

    /// Maker tags are authoritative: applied unconditionally at score 1.0,
    /// never thresholded, and never flipping the outcome by themselves.
    pub fn apply_maker_tags(&mut self, tags: &[String]) {
        for tag in tags {
            self.classification.applied_triggers.push(TriggerRecord::new(
                tag.clone(),
                1.0,
                TriggerSource::MakerTag,
            ));
        }
    }

    /// Threshold a classifier signal. Floor comparisons are inclusive.
    pub fn add_signal(&mut self, trigger: &str, score: f64, source: TriggerSource, reason: &str) {
        if score >= self.thresholds.medium_log {
            tracing::info!(
                trigger,
                score,
                source = ?source,
                "signal crossed medium observability threshold"
            );
        }
        if score >= self.thresholds.forbidden {
            self.classification
                .applied_triggers
                .push(TriggerRecord::new(trigger, score, source));
            self.classification.forbidden_reasons.push(ForbiddenReason {
                trigger: trigger.to_string(),
                reason: reason.to_string(),
                score,
            });
        } else if score >= self.thresholds.suggest {
            self.classification
                .suggested_triggers
                .push(TriggerRecord::new(trigger, score, source));
        }
    }

    pub fn add_forbidden_reason(&mut self, trigger: &str, reason: &str, score: f64) {
        self.classification.forbidden_reasons.push(ForbiddenReason {
            trigger: trigger.to_string(),
            reason: reason.to_string(),
            score,
        });
    }

    pub fn finish(self) -> Classification {
        self.classification
    }
}

/// Normalize maker-declared tags: trim, lowercase, drop empties, dedup
/// preserving first occurrence.
pub fn normalize_maker_tags(raw: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

fn max_label_score(labels: &[LabelAnnotation], keywords: &[&str]) -> f64 {
    labels
        .iter()
        .filter(|label| {
            let description = label.description.to_lowercase();
            keywords.iter().any(|kw| description.contains(kw))
        })
        .fold(0.0, |max, label| max.max(label.score))
}

pub struct TriggerClassifier {
    safety: Arc<dyn VisionSafetyPort>,
    labels: Arc<dyn VisionLabelPort>,
    generative: Option<Arc<dyn GenerativeClassifierPort>>,
    thresholds: Thresholds,
    max_label_results: u32,
}

impl TriggerClassifier {
    pub fn new(
        safety: Arc<dyn VisionSafetyPort>,
        labels: Arc<dyn VisionLabelPort>,
        generative: Option<Arc<dyn GenerativeClassifierPort>>,
        thresholds: Thresholds,
        max_label_results: u32,
    ) -> Self {
        Self {
            safety,
            labels,
            generative,
            thresholds,
            max_label_results,
        }
    }

    /// Run all classifier ports and fuse their signals. Port calls are
    /// concurrent and fail in isolation; a failed source contributes
    /// nothing.
    pub async fn classify(
        &self,
        image: &[u8],
        mime_type: &str,
        maker_tags: &[String],
    ) -> Classification {
        let mut builder = VerdictBuilder::new(self.thresholds);
        builder.apply_maker_tags(maker_tags);

        let generative_fut = async {
            match &self.generative {
                Some(port) => port.classify(image, mime_type, maker_tags).await,
                None => Ok(None),
            }
        };
        let (safety, labels, generative) = tokio::join!(
            self.safety.classify(image),
            self.labels.classify(image, self.max_label_results),
            generative_fut,
        );

        match safety {
            Ok(annotation) => self.fuse_safety(&mut builder, &annotation),
            Err(e) => tracing::warn!("vision safety classification failed: {}", e),
        }
        match labels {
            Ok(labels) => self.fuse_labels(&mut builder, &labels),
            Err(e) => tracing::warn!("vision label classification failed: {}", e),
        }
        match generative {
            Ok(Some(verdict)) => self.fuse_generative(&mut builder, &verdict),
            Ok(None) => {}
            Err(e) => tracing::warn!("generative classification failed: {}", e),
        }

        builder.finish()
    }

    fn fuse_safety(&self, builder: &mut VerdictBuilder, annotation: &SafetyAnnotation) {
        builder.add_signal(
            "nudityErotic",
            annotation.racy.score(),
            TriggerSource::VisionSafety,
            "vision safety racy",
        );
        builder.add_signal(
            "explicit18",
            annotation.adult.score(),
            TriggerSource::VisionSafety,
            "vision safety adult",
        );
    }

    fn fuse_labels(&self, builder: &mut VerdictBuilder, labels: &[LabelAnnotation]) {
        for category in LABEL_CATEGORIES {
            let score = max_label_score(labels, category.keywords);
            builder.add_signal(
                category.trigger,
                score,
                TriggerSource::VisionLabel,
                category.reason,
            );
        }
    }

    fn fuse_generative(&self, builder: &mut VerdictBuilder, verdict: &GenerativeVerdict) {
        for item in &verdict.triggers {
            let trigger = item.trigger.trim();
            if trigger.is_empty() {
                continue;
            }
            if item.severity == GenerativeSeverity::Forbidden
                && item.confidence < self.thresholds.forbidden
            {
                tracing::debug!(
                    trigger,
                    confidence = item.confidence,
                    "generative severity says forbidden but confidence is below threshold"
                );
            }
            builder.add_signal(
                trigger,
                item.confidence,
                TriggerSource::GenerativeClassifier,
                "generative classifier",
            );
        }
        for reason in &verdict.forbidden_reasons {
            let reason = reason.trim();
            if !reason.is_empty() {
                builder.add_forbidden_reason("generativeClassifier", reason, 1.0);
            }
        }
    }
}
