//! Moderation orchestrator: fingerprint, dedup, classify-or-reuse, review
//! admission, persistence, and case linking for one request.

use chrono::Utc;
use uuid::Uuid;

use crate::db::UploadStore;
use crate::error::Result;
use crate::models::{
    Fingerprint, ForbiddenReason, Outcome, TriggerRecord, TriggerSource, Upload,
};
use crate::services::classification::{normalize_maker_tags, Classification, TriggerClassifier};
use crate::services::dedup::DuplicateResolver;
use crate::services::review::ReviewCaseService;
use crate::services::fingerprint;
use std::sync::Arc;

/// One moderation request, adapter-agnostic.
#[derive(Debug, Clone)]
pub struct ModerationRequest {
    pub image: Vec<u8>,
    pub mime_type: String,
    pub maker_tags: Vec<String>,
    pub user_id: Option<String>,
}

/// The synchronous contract back to the caller. Always reflects the best
/// classification achievable from whatever signals succeeded.
#[derive(Debug, Clone)]
pub struct ModerationVerdict {
    pub outcome: Outcome,
    pub applied_triggers: Vec<TriggerRecord>,
    pub suggested_triggers: Vec<TriggerRecord>,
    pub forbidden_reasons: Vec<ForbiddenReason>,
    pub can_request_review: bool,
    pub review_case_id: Option<Uuid>,
    pub fingerprint: Fingerprint,
    pub upload_id: Option<Uuid>,
}

/// Where the verdict came from: a fresh classifier run, or a cached verdict
/// reused from an exact or near-duplicate upload.
#[derive(Debug, Clone)]
pub enum ClassificationSource {
    Fresh(Classification),
    Reused {
        upload_id: Uuid,
        review_case_id: Option<Uuid>,
        outcome: Outcome,
        cached: Classification,
        distance: u32,
    },
}

pub struct ModerationPipeline {
    dedup: DuplicateResolver,
    classifier: TriggerClassifier,
    uploads: Arc<dyn UploadStore>,
    review: Arc<ReviewCaseService>,
}

impl ModerationPipeline {
    pub fn new(
        dedup: DuplicateResolver,
        classifier: TriggerClassifier,
        uploads: Arc<dyn UploadStore>,
        review: Arc<ReviewCaseService>,
    ) -> Self {
        Self {
            dedup,
            classifier,
            uploads,
            review,
        }
    }

    /// Resolve the classification source: cached verdict for a known image,
    /// fresh classifier run otherwise. Classifiers are never re-run for a
    /// duplicate.
    async fn classification_source(
        &self,
        request: &ModerationRequest,
        fingerprint: &Fingerprint,
        maker_tags: &[String],
    ) -> ClassificationSource {
        if let Some(matched) = self.dedup.resolve(fingerprint).await {
            tracing::info!(
                matched_upload_id = %matched.upload.id,
                distance = matched.distance,
                "reusing cached verdict for duplicate image"
            );
            return ClassificationSource::Reused {
                upload_id: matched.upload.id,
                review_case_id: matched.upload.review_case_id,
                outcome: matched.upload.outcome,
                cached: Classification {
                    applied_triggers: matched.upload.applied_triggers,
                    suggested_triggers: matched.upload.suggested_triggers,
                    forbidden_reasons: matched.upload.forbidden_reasons,
                },
                distance: matched.distance,
            };
        }
        ClassificationSource::Fresh(
            self.classifier
                .classify(&request.image, &request.mime_type, maker_tags)
                .await,
        )
    }

    pub async fn moderate(&self, request: ModerationRequest) -> Result<ModerationVerdict> {
        let now = Utc::now();
        // Fingerprinting is foundational: a decode failure is a hard error.
        let fingerprint = fingerprint::fingerprint(&request.image)?;
        let maker_tags = normalize_maker_tags(&request.maker_tags);

        let source = self
            .classification_source(&request, &fingerprint, &maker_tags)
            .await;

        let (outcome, mut applied, suggested, reasons, cached_case_id, matched_upload_id) =
            match source {
                ClassificationSource::Fresh(classification) => (
                    classification.outcome(),
                    classification.applied_triggers,
                    classification.suggested_triggers,
                    classification.forbidden_reasons,
                    None,
                    None,
                ),
                ClassificationSource::Reused {
                    upload_id,
                    review_case_id,
                    outcome,
                    cached,
                    ..
                } => (
                    outcome,
                    cached.applied_triggers,
                    cached.suggested_triggers,
                    cached.forbidden_reasons,
                    review_case_id,
                    Some(upload_id),
                ),
            };

        // Maker tags are request-specific even for a duplicate image; the
        // fresh path already applied them inside the classifier. Union by
        // (trigger, source).
        if matched_upload_id.is_some() {
            for tag in &maker_tags {
                let present = applied
                    .iter()
                    .any(|t| t.trigger == *tag && t.source == TriggerSource::MakerTag);
                if !present {
                    applied.push(TriggerRecord::new(
                        tag.clone(),
                        1.0,
                        TriggerSource::MakerTag,
                    ));
                }
            }
        }

        let mut review_case_id = cached_case_id;
        let mut can_request_review = outcome == Outcome::Forbidden;
        if outcome == Outcome::Forbidden {
            if let Some(user_id) = &request.user_id {
                match self
                    .review
                    .admission(user_id, &fingerprint, cached_case_id, now)
                    .await
                {
                    Ok(decision) => {
                        // Admission owns the case reference from here on; a
                        // terminal cached case is not handed back.
                        review_case_id = decision.review_case_id;
                        can_request_review = decision.can_request_review;
                    }
                    // Admission is best-effort from the caller's view; the
                    // verdict still goes back.
                    Err(e) => tracing::warn!(%user_id, "review admission failed: {}", e),
                }
            }
        }

        let upload = Upload {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            outcome,
            applied_triggers: applied.clone(),
            suggested_triggers: suggested.clone(),
            forbidden_reasons: reasons.clone(),
            review_case_id,
            fingerprint: fingerprint.clone(),
            matched_upload_id,
            review_status: None,
            publication_status: None,
            approved_at: None,
            created_at: now,
        };
        let upload_id = match self.uploads.insert(&upload).await {
            Ok(()) => Some(upload.id),
            Err(e) => {
                // The synchronous response is the primary contract; a
                // persistence failure does not demote the verdict.
                tracing::warn!("upload persistence failed: {}", e);
                None
            }
        };

        if let (Some(case_id), Some(upload_id)) = (review_case_id, upload_id) {
            if let Err(e) = self
                .review
                .link_upload(case_id, upload_id, &fingerprint, now)
                .await
            {
                tracing::warn!(case_id = %case_id, "linking upload into case failed: {}", e);
            }
        }

        Ok(ModerationVerdict {
            outcome,
            applied_triggers: applied,
            suggested_triggers: suggested,
            forbidden_reasons: reasons,
            can_request_review,
            review_case_id,
            fingerprint,
            upload_id,
        })
    }
}
