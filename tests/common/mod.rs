//! In-memory store and classifier-port fakes used by the integration
//! tests. They implement the same ports as the Postgres stores and route
//! state transitions through the same model methods.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use moderation_service::clients::{
    GenerativeClassifierPort, GenerativeVerdict, LabelAnnotation, Likelihood, SafetyAnnotation,
    VisionLabelPort, VisionSafetyPort,
};
use moderation_service::db::{
    CaseAdmission, DecidedCase, NotificationSink, ReviewCaseStore, UploadStore, UserStateStore,
};
use moderation_service::error::{ModerationError, Result};
use moderation_service::models::{
    CaseDecision, CaseStatus, ClaimOutcome, DecisionInput, DecisionMessage, Fingerprint,
    ModerationMessage, PublicationStatus, ReviewCase, Upload, UserModerationState,
};
use moderation_service::services::{
    DuplicateResolver, ModerationPipeline, ModerationRequest, ReviewCaseService, Thresholds,
    TriggerClassifier, UserRiskService,
};

#[derive(Default)]
pub struct InMemoryUploadStore {
    uploads: Mutex<Vec<Upload>>,
    pub fail_inserts: AtomicBool,
}

impl InMemoryUploadStore {
    pub fn get(&self, id: Uuid) -> Option<Upload> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl UploadStore for InMemoryUploadStore {
    async fn insert(&self, upload: &Upload) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(ModerationError::Internal("store offline".to_string()));
        }
        self.uploads.lock().unwrap().push(upload.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Upload>> {
        Ok(self.get(id))
    }

    async fn find_by_content_hash(&self, content_hash: &str) -> Result<Option<Upload>> {
        Ok(self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.fingerprint.content_hash == content_hash)
            .max_by_key(|u| u.created_at)
            .cloned())
    }

    async fn find_by_perceptual_prefix(&self, prefix: &str, limit: i64) -> Result<Vec<Upload>> {
        Ok(self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.fingerprint.perceptual_prefix == prefix)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_publication_status(
        &self,
        id: Uuid,
        status: PublicationStatus,
    ) -> Result<bool> {
        let mut uploads = self.uploads.lock().unwrap();
        match uploads.iter_mut().find(|u| u.id == id) {
            Some(upload) => {
                upload.publication_status = Some(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryStateStore {
    states: Mutex<HashMap<String, UserModerationState>>,
}

impl InMemoryStateStore {
    pub fn state_of(&self, user_id: &str) -> Option<UserModerationState> {
        self.states.lock().unwrap().get(user_id).cloned()
    }

    pub fn set(&self, state: UserModerationState) {
        self.states
            .lock()
            .unwrap()
            .insert(state.user_id.clone(), state);
    }

    fn with_state<T>(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut UserModerationState) -> T,
    ) -> T {
        let mut states = self.states.lock().unwrap();
        let state = states
            .entry(user_id.to_string())
            .or_insert_with(|| UserModerationState::new(user_id, now));
        f(state)
    }
}

#[async_trait]
impl UserStateStore for InMemoryStateStore {
    async fn get_or_init(&self, user_id: &str, now: DateTime<Utc>) -> Result<UserModerationState> {
        Ok(self.with_state(user_id, now, |state| state.clone()))
    }

    async fn record_false_appeal(
        &self,
        user_id: &str,
        threshold: i32,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> Result<UserModerationState> {
        Ok(self.with_state(user_id, now, |state| {
            state.record_false_appeal(now, threshold, cooldown);
            state.clone()
        }))
    }
}

pub struct InMemoryCaseStore {
    cases: Mutex<HashMap<Uuid, ReviewCase>>,
    states: Arc<InMemoryStateStore>,
    uploads: Arc<InMemoryUploadStore>,
}

impl InMemoryCaseStore {
    pub fn new(states: Arc<InMemoryStateStore>, uploads: Arc<InMemoryUploadStore>) -> Self {
        Self {
            cases: Mutex::new(HashMap::new()),
            states,
            uploads,
        }
    }

    pub fn case_of(&self, id: Uuid) -> Option<ReviewCase> {
        self.cases.lock().unwrap().get(&id).cloned()
    }

    pub fn insert_case(&self, case: ReviewCase) {
        self.cases.lock().unwrap().insert(case.id, case);
    }

    pub fn open_case_count(&self, user_id: &str) -> usize {
        self.cases
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id && c.status == CaseStatus::InReview)
            .count()
    }
}

#[async_trait]
impl ReviewCaseStore for InMemoryCaseStore {
    async fn get(&self, id: Uuid) -> Result<Option<ReviewCase>> {
        Ok(self.case_of(id))
    }

    async fn find_open_for_user(&self, user_id: &str) -> Result<Option<ReviewCase>> {
        Ok(self
            .cases
            .lock()
            .unwrap()
            .values()
            .find(|c| c.user_id == user_id && c.status == CaseStatus::InReview)
            .cloned())
    }

    async fn create_for_user(
        &self,
        user_id: &str,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<CaseAdmission> {
        if let Some(existing) = self.find_open_for_user(user_id).await? {
            return Ok(CaseAdmission::Existing(existing));
        }
        let can_open = self
            .states
            .with_state(user_id, now, |state| state.can_open_case(now));
        if !can_open {
            return Ok(CaseAdmission::Refused);
        }
        let case = ReviewCase::open(user_id, fingerprint.clone(), now);
        self.insert_case(case.clone());
        self.states.with_state(user_id, now, |state| {
            state.open_review_count = 1;
            state.updated_at = now;
        });
        Ok(CaseAdmission::Created(case))
    }

    async fn claim(
        &self,
        case_id: Uuid,
        uid: &str,
        email: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<ClaimOutcome> {
        let mut cases = self.cases.lock().unwrap();
        let case = cases
            .get_mut(&case_id)
            .ok_or_else(|| ModerationError::NotFound("review case not found".to_string()))?;
        case.try_claim(uid, email, now, lease)
    }

    async fn release(&self, case_id: Uuid, uid: &str, now: DateTime<Utc>) -> Result<()> {
        let mut cases = self.cases.lock().unwrap();
        let case = cases
            .get_mut(&case_id)
            .ok_or_else(|| ModerationError::NotFound("review case not found".to_string()))?;
        case.release(uid, now);
        Ok(())
    }

    async fn decide(
        &self,
        case_id: Uuid,
        input: &DecisionInput,
        now: DateTime<Utc>,
    ) -> Result<DecidedCase> {
        let case = {
            let mut cases = self.cases.lock().unwrap();
            let case = cases
                .get_mut(&case_id)
                .ok_or_else(|| ModerationError::NotFound("review case not found".to_string()))?;
            case.apply_decision(input, now)?;
            case.clone()
        };
        let upload_id = case.linked_upload_ids.first().copied().ok_or_else(|| {
            ModerationError::Validation("review case has no linked upload".to_string())
        })?;

        let approved = input.decision == CaseDecision::Approved;
        {
            let mut uploads = self.uploads.uploads.lock().unwrap();
            if let Some(upload) = uploads.iter_mut().find(|u| u.id == upload_id) {
                upload.review_status = Some(input.decision);
                upload.publication_status = Some(if approved {
                    PublicationStatus::Pending
                } else {
                    PublicationStatus::Blocked
                });
                upload.approved_at = approved.then_some(now);
                upload.review_case_id = Some(case.id);
            }
        }
        self.states.with_state(&case.user_id, now, |state| {
            state.open_review_count = 0;
            state.updated_at = now;
        });

        let user_id = case.user_id.clone();
        Ok(DecidedCase {
            case,
            upload_id,
            user_id,
            decision: input.decision,
        })
    }

    async fn link_upload(
        &self,
        case_id: Uuid,
        upload_id: Uuid,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut cases = self.cases.lock().unwrap();
        let case = cases
            .get_mut(&case_id)
            .ok_or_else(|| ModerationError::NotFound("review case not found".to_string()))?;
        case.link_upload(upload_id, fingerprint, now);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySink {
    messages: Mutex<Vec<ModerationMessage>>,
    pub fail_posts: AtomicBool,
}

impl InMemorySink {
    pub fn messages_for(&self, user_id: &str) -> Vec<ModerationMessage> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationSink for InMemorySink {
    async fn post(
        &self,
        user_id: &str,
        thread_key: &str,
        message: &DecisionMessage,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(ModerationError::Internal("sink offline".to_string()));
        }
        let id = Uuid::new_v4();
        self.messages.lock().unwrap().push(ModerationMessage {
            id,
            user_id: user_id.to_string(),
            thread_key: thread_key.to_string(),
            payload: message.clone(),
            unread: true,
            resolved: false,
            created_at: now,
        });
        Ok(id)
    }

    async fn find_message(
        &self,
        user_id: &str,
        message_id: Uuid,
    ) -> Result<Option<ModerationMessage>> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == message_id && m.user_id == user_id)
            .cloned())
    }

    async fn resolve_message(
        &self,
        user_id: &str,
        message_id: Uuid,
        resolved: bool,
        _now: DateTime<Utc>,
    ) -> Result<()> {
        let mut messages = self.messages.lock().unwrap();
        if let Some(message) = messages
            .iter_mut()
            .find(|m| m.id == message_id && m.user_id == user_id)
        {
            message.unread = false;
            message.resolved = message.resolved || resolved;
        }
        Ok(())
    }
}

pub struct StubSafety {
    pub annotation: SafetyAnnotation,
    pub calls: AtomicUsize,
}

impl StubSafety {
    pub fn new(adult: Likelihood, racy: Likelihood) -> Self {
        Self {
            annotation: SafetyAnnotation { adult, racy },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn clean() -> Self {
        Self::new(Likelihood::VeryUnlikely, Likelihood::VeryUnlikely)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionSafetyPort for StubSafety {
    async fn classify(&self, _image: &[u8]) -> Result<SafetyAnnotation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.annotation.clone())
    }
}

pub struct StubLabels {
    pub labels: Vec<LabelAnnotation>,
    pub calls: AtomicUsize,
}

impl StubLabels {
    pub fn new(labels: Vec<(&str, f64)>) -> Self {
        Self {
            labels: labels
                .into_iter()
                .map(|(description, score)| LabelAnnotation {
                    description: description.to_string(),
                    score,
                })
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionLabelPort for StubLabels {
    async fn classify(&self, _image: &[u8], _max_results: u32) -> Result<Vec<LabelAnnotation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.labels.clone())
    }
}

pub struct StubGenerative {
    pub verdict: Option<GenerativeVerdict>,
}

#[async_trait]
impl GenerativeClassifierPort for StubGenerative {
    async fn classify(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _maker_tags: &[String],
    ) -> Result<Option<GenerativeVerdict>> {
        Ok(self.verdict.clone())
    }
}

/// Full pipeline wired over the in-memory fakes, with production-default
/// thresholds.
pub struct TestEnv {
    pub uploads: Arc<InMemoryUploadStore>,
    pub cases: Arc<InMemoryCaseStore>,
    pub states: Arc<InMemoryStateStore>,
    pub sink: Arc<InMemorySink>,
    pub safety: Arc<StubSafety>,
    pub labels: Arc<StubLabels>,
    pub review: Arc<ReviewCaseService>,
    pub pipeline: ModerationPipeline,
}

pub const FALSE_APPEAL_THRESHOLD: i32 = 2;
pub const COOLDOWN_DAYS: i64 = 7;
pub const LOCK_MINUTES: i64 = 10;

impl TestEnv {
    pub fn new(safety: StubSafety, labels: StubLabels) -> Self {
        Self::with_generative(safety, labels, None)
    }

    pub fn with_generative(
        safety: StubSafety,
        labels: StubLabels,
        generative: Option<StubGenerative>,
    ) -> Self {
        let uploads = Arc::new(InMemoryUploadStore::default());
        let states = Arc::new(InMemoryStateStore::default());
        let cases = Arc::new(InMemoryCaseStore::new(states.clone(), uploads.clone()));
        let sink = Arc::new(InMemorySink::default());
        let safety = Arc::new(safety);
        let labels = Arc::new(labels);

        let risk = UserRiskService::new(
            states.clone(),
            FALSE_APPEAL_THRESHOLD,
            Duration::days(COOLDOWN_DAYS),
        );
        let review = Arc::new(ReviewCaseService::new(
            cases.clone(),
            uploads.clone(),
            sink.clone(),
            risk,
            Duration::minutes(LOCK_MINUTES),
        ));
        let classifier = TriggerClassifier::new(
            safety.clone(),
            labels.clone(),
            generative.map(|g| Arc::new(g) as Arc<dyn GenerativeClassifierPort>),
            Thresholds {
                suggest: 0.45,
                forbidden: 0.70,
                medium_log: 0.55,
            },
            15,
        );
        let dedup = DuplicateResolver::new(uploads.clone(), 8);
        let pipeline =
            ModerationPipeline::new(dedup, classifier, uploads.clone(), review.clone());

        Self {
            uploads,
            cases,
            states,
            sink,
            safety,
            labels,
            review,
            pipeline,
        }
    }

    pub fn request(&self, image: Vec<u8>, user_id: Option<&str>) -> ModerationRequest {
        ModerationRequest {
            image,
            mime_type: "image/png".to_string(),
            maker_tags: Vec::new(),
            user_id: user_id.map(str::to_string),
        }
    }
}

/// A 9x8 grayscale PNG whose perceptual hash is exactly `bits`: each bit
/// picks whether a pixel is brighter or darker than its right neighbor.
/// `base` shifts all pixel values without changing any comparison, so two
/// bases give different content hashes over the same perceptual hash.
pub fn pattern_png(bits: u64, base: u8) -> Vec<u8> {
    let mut rows = [[0u8; 9]; 8];
    for (y, row) in rows.iter_mut().enumerate() {
        row[0] = base;
        for x in 0..8 {
            let bit = (bits >> (63 - (y * 8 + x))) & 1;
            // bit set: left brighter than right
            row[x + 1] = if bit == 1 {
                row[x] - 12
            } else {
                row[x] + 12
            };
        }
    }
    let img = image::GrayImage::from_fn(9, 8, |x, y| {
        image::Luma([rows[y as usize][x as usize]])
    });
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}
