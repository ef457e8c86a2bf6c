//! End-to-end pipeline behavior over in-memory stores: verdict fusion,
//! duplicate reuse, and review-case admission from a forbidden verdict.

mod common;

use common::{pattern_png, StubGenerative, StubLabels, StubSafety, TestEnv};
use moderation_service::clients::{
    GenerativeSeverity, GenerativeTrigger, GenerativeVerdict, Likelihood,
};
use moderation_service::models::{CaseStatus, Outcome, TriggerSource};

#[tokio::test]
async fn clean_image_is_allowed_and_persisted() {
    let env = TestEnv::new(StubSafety::clean(), StubLabels::empty());

    let verdict = env
        .pipeline
        .moderate(env.request(pattern_png(0, 128), Some("user-1")))
        .await
        .unwrap();

    assert_eq!(verdict.outcome, Outcome::Allowed);
    assert!(verdict.applied_triggers.is_empty());
    assert!(verdict.suggested_triggers.is_empty());
    assert!(!verdict.can_request_review);
    assert!(verdict.review_case_id.is_none());

    let upload = env.uploads.get(verdict.upload_id.unwrap()).unwrap();
    assert_eq!(upload.outcome, Outcome::Allowed);
    assert_eq!(upload.user_id.as_deref(), Some("user-1"));
    assert!(upload.matched_upload_id.is_none());
}

#[tokio::test]
async fn maker_tags_apply_without_forbidding() {
    let env = TestEnv::new(StubSafety::clean(), StubLabels::empty());
    let mut request = env.request(pattern_png(0, 128), Some("user-1"));
    request.maker_tags = vec![" Nudity ".to_string(), "nudity".to_string()];

    let verdict = env.pipeline.moderate(request).await.unwrap();

    // Tags are normalized, deduplicated, applied at full confidence, and
    // never escalate the outcome on their own.
    assert_eq!(verdict.outcome, Outcome::Allowed);
    assert_eq!(verdict.applied_triggers.len(), 1);
    let tag = &verdict.applied_triggers[0];
    assert_eq!(tag.trigger, "nudity");
    assert_eq!(tag.score, 1.0);
    assert_eq!(tag.source, TriggerSource::MakerTag);
    assert!(verdict.forbidden_reasons.is_empty());
}

#[tokio::test]
async fn racy_possible_lands_in_suggestion_band() {
    let env = TestEnv::new(
        StubSafety::new(Likelihood::VeryUnlikely, Likelihood::Possible),
        StubLabels::empty(),
    );

    let verdict = env
        .pipeline
        .moderate(env.request(pattern_png(0, 128), Some("user-1")))
        .await
        .unwrap();

    assert_eq!(verdict.outcome, Outcome::Suggested);
    assert_eq!(verdict.suggested_triggers.len(), 1);
    assert_eq!(verdict.suggested_triggers[0].trigger, "nudityErotic");
    assert!(verdict.applied_triggers.is_empty());
    assert!(verdict.review_case_id.is_none());
}

#[tokio::test]
async fn adult_very_likely_forbids_and_opens_case() {
    let env = TestEnv::new(
        StubSafety::new(Likelihood::VeryLikely, Likelihood::VeryUnlikely),
        StubLabels::empty(),
    );

    let verdict = env
        .pipeline
        .moderate(env.request(pattern_png(0, 128), Some("user-1")))
        .await
        .unwrap();

    assert_eq!(verdict.outcome, Outcome::Forbidden);
    assert_eq!(verdict.applied_triggers[0].trigger, "explicit18");
    assert_eq!(verdict.forbidden_reasons[0].trigger, "explicit18");
    assert!(!verdict.can_request_review);

    let case_id = verdict.review_case_id.unwrap();
    let case = env.cases.case_of(case_id).unwrap();
    assert_eq!(case.status, CaseStatus::InReview);
    assert_eq!(case.user_id, "user-1");
    assert_eq!(case.linked_upload_ids, vec![verdict.upload_id.unwrap()]);

    let upload = env.uploads.get(verdict.upload_id.unwrap()).unwrap();
    assert_eq!(upload.review_case_id, Some(case_id));
}

#[tokio::test]
async fn forbidden_without_user_reports_review_available() {
    let env = TestEnv::new(
        StubSafety::new(Likelihood::VeryLikely, Likelihood::VeryUnlikely),
        StubLabels::empty(),
    );

    let verdict = env
        .pipeline
        .moderate(env.request(pattern_png(0, 128), None))
        .await
        .unwrap();

    assert_eq!(verdict.outcome, Outcome::Forbidden);
    // No identity, no case; the caller is still told review exists.
    assert!(verdict.review_case_id.is_none());
    assert!(verdict.can_request_review);
}

#[tokio::test]
async fn spider_label_forbids_under_category_mapping() {
    let env = TestEnv::new(
        StubSafety::clean(),
        StubLabels::new(vec![("Tarantula spider", 0.95), ("Macro lens", 0.9)]),
    );

    let verdict = env
        .pipeline
        .moderate(env.request(pattern_png(0, 128), Some("user-1")))
        .await
        .unwrap();

    assert_eq!(verdict.outcome, Outcome::Forbidden);
    assert_eq!(verdict.applied_triggers.len(), 1);
    assert_eq!(verdict.applied_triggers[0].trigger, "spidersInsects");
    assert_eq!(verdict.applied_triggers[0].source, TriggerSource::VisionLabel);
}

#[tokio::test]
async fn generative_triggers_use_uniform_thresholds() {
    let verdict = GenerativeVerdict {
        triggers: vec![
            GenerativeTrigger {
                trigger: "weapons".to_string(),
                confidence: 0.8,
                severity: GenerativeSeverity::Suggest,
            },
            GenerativeTrigger {
                trigger: "gore".to_string(),
                confidence: 0.5,
                severity: GenerativeSeverity::Forbidden,
            },
        ],
        forbidden_reasons: Vec::new(),
    };
    let env = TestEnv::with_generative(
        StubSafety::clean(),
        StubLabels::empty(),
        Some(StubGenerative {
            verdict: Some(verdict),
        }),
    );

    let result = env
        .pipeline
        .moderate(env.request(pattern_png(0, 128), Some("user-1")))
        .await
        .unwrap();

    // 0.8 crosses the forbidden threshold regardless of the reported
    // severity; 0.5 only reaches the suggestion band despite "forbidden".
    assert_eq!(result.outcome, Outcome::Forbidden);
    assert_eq!(result.applied_triggers[0].trigger, "weapons");
    assert_eq!(
        result.applied_triggers[0].source,
        TriggerSource::GenerativeClassifier
    );
    assert_eq!(result.suggested_triggers[0].trigger, "gore");
}

#[tokio::test]
async fn exact_duplicate_reuses_verdict_without_classifier_calls() {
    let env = TestEnv::new(
        StubSafety::new(Likelihood::VeryUnlikely, Likelihood::Possible),
        StubLabels::empty(),
    );
    let image = pattern_png(0, 128);

    let first = env
        .pipeline
        .moderate(env.request(image.clone(), Some("user-1")))
        .await
        .unwrap();
    assert_eq!(env.safety.call_count(), 1);
    assert_eq!(env.labels.call_count(), 1);

    let second = env
        .pipeline
        .moderate(env.request(image, Some("user-2")))
        .await
        .unwrap();

    assert_eq!(env.safety.call_count(), 1);
    assert_eq!(env.labels.call_count(), 1);
    assert_eq!(second.outcome, first.outcome);
    assert_eq!(second.suggested_triggers, first.suggested_triggers);

    let reused = env.uploads.get(second.upload_id.unwrap()).unwrap();
    assert_eq!(reused.matched_upload_id, first.upload_id);
}

#[tokio::test]
async fn near_duplicate_matches_within_hamming_threshold() {
    let env = TestEnv::new(StubSafety::clean(), StubLabels::empty());

    let first = env
        .pipeline
        .moderate(env.request(pattern_png(0, 128), Some("user-1")))
        .await
        .unwrap();

    // Same perceptual prefix, 8 differing bits: inside the threshold.
    let second = env
        .pipeline
        .moderate(env.request(pattern_png(0xff, 128), Some("user-2")))
        .await
        .unwrap();
    assert_eq!(env.safety.call_count(), 1);
    let reused = env.uploads.get(second.upload_id.unwrap()).unwrap();
    assert_eq!(reused.matched_upload_id, first.upload_id);

    // 10 bits from the nearest stored hash: past the threshold,
    // classified fresh.
    let third = env
        .pipeline
        .moderate(env.request(pattern_png(0x3ffff, 128), Some("user-3")))
        .await
        .unwrap();
    assert_eq!(env.safety.call_count(), 2);
    let fresh = env.uploads.get(third.upload_id.unwrap()).unwrap();
    assert!(fresh.matched_upload_id.is_none());
}

#[tokio::test]
async fn same_structure_different_bytes_matches_by_perceptual_hash() {
    let env = TestEnv::new(StubSafety::clean(), StubLabels::empty());

    let first = env
        .pipeline
        .moderate(env.request(pattern_png(0xAB, 128), Some("user-1")))
        .await
        .unwrap();
    let second = env
        .pipeline
        .moderate(env.request(pattern_png(0xAB, 120), Some("user-2")))
        .await
        .unwrap();

    assert_ne!(second.fingerprint.content_hash, first.fingerprint.content_hash);
    assert_eq!(
        second.fingerprint.perceptual_hash,
        first.fingerprint.perceptual_hash
    );
    assert_eq!(env.safety.call_count(), 1);
    let reused = env.uploads.get(second.upload_id.unwrap()).unwrap();
    assert_eq!(reused.matched_upload_id, first.upload_id);
}

#[tokio::test]
async fn duplicate_of_forbidden_upload_reuses_case_for_same_user() {
    let env = TestEnv::new(
        StubSafety::new(Likelihood::VeryLikely, Likelihood::VeryUnlikely),
        StubLabels::empty(),
    );
    let image = pattern_png(0, 128);

    let first = env
        .pipeline
        .moderate(env.request(image.clone(), Some("user-1")))
        .await
        .unwrap();
    let case_id = first.review_case_id.unwrap();

    let second = env
        .pipeline
        .moderate(env.request(image, Some("user-1")))
        .await
        .unwrap();

    assert_eq!(second.review_case_id, Some(case_id));
    assert_eq!(env.cases.open_case_count("user-1"), 1);
    // Both uploads are linked into the one case.
    let case = env.cases.case_of(case_id).unwrap();
    assert_eq!(case.linked_upload_ids.len(), 2);
}

#[tokio::test]
async fn undecodable_image_is_a_hard_failure() {
    let env = TestEnv::new(StubSafety::clean(), StubLabels::empty());

    let result = env
        .pipeline
        .moderate(env.request(b"not an image".to_vec(), Some("user-1")))
        .await;

    assert!(result.is_err());
    assert_eq!(env.uploads.len(), 0);
}

#[tokio::test]
async fn persistence_failure_still_returns_verdict() {
    let env = TestEnv::new(StubSafety::clean(), StubLabels::empty());
    env.uploads
        .fail_inserts
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let verdict = env
        .pipeline
        .moderate(env.request(pattern_png(0, 128), Some("user-1")))
        .await
        .unwrap();

    assert_eq!(verdict.outcome, Outcome::Allowed);
    assert!(verdict.upload_id.is_none());
}
