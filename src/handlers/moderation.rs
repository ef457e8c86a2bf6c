//! Upload moderation endpoint and the uploader's follow-up on a decision.

use actix_web::{web, HttpResponse};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ModerationError, Result};
use crate::handlers::auth::AuthenticatedUser;
use crate::models::{Fingerprint, ForbiddenReason, TriggerRecord};
use crate::services::{DecisionAction, ModerationPipeline, ModerationRequest, ReviewCaseService};

static DATA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/(png|jpe?g|webp);base64,([A-Za-z0-9+/=]+)$")
        .expect("data url regex must compile")
});

/// Maker tags arrive either as an array or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MakerTags {
    List(Vec<String>),
    Csv(String),
}

impl MakerTags {
    fn into_vec(self) -> Vec<String> {
        match self {
            MakerTags::List(tags) => tags,
            MakerTags::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateImageRequest {
    pub image: String,
    pub maker_tags: Option<MakerTags>,
    /// Fallback identity for callers behind an edge that does not forward
    /// identity headers. The header wins when both are present.
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateImageResponse {
    pub outcome: String,
    pub applied_triggers: Vec<TriggerRecord>,
    pub suggested_triggers: Vec<TriggerRecord>,
    pub forbidden_reasons: Vec<ForbiddenReason>,
    pub show_suggestion_ui: bool,
    pub can_request_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_case_id: Option<Uuid>,
    pub fingerprints: Fingerprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<Uuid>,
}

fn decode_data_url(image: &str) -> Result<(Vec<u8>, String)> {
    let captures = DATA_URL_RE.captures(image.trim()).ok_or_else(|| {
        ModerationError::Validation(
            "image must be a base64 data url (png, jpeg, or webp)".to_string(),
        )
    })?;
    let mime_type = format!("image/{}", &captures[1]);
    let bytes = BASE64
        .decode(&captures[2])
        .map_err(|_| ModerationError::Validation("invalid base64 image payload".to_string()))?;
    if bytes.is_empty() {
        return Err(ModerationError::Validation(
            "image payload is empty".to_string(),
        ));
    }
    Ok((bytes, mime_type))
}

pub async fn moderate_image(
    user: Option<AuthenticatedUser>,
    pipeline: web::Data<ModerationPipeline>,
    body: web::Json<ModerateImageRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let (image, mime_type) = decode_data_url(&body.image)?;
    let maker_tags = body.maker_tags.map(MakerTags::into_vec).unwrap_or_default();
    let user_id = user.map(|u| u.uid).or(body.user_id);

    let verdict = pipeline
        .moderate(ModerationRequest {
            image,
            mime_type,
            maker_tags,
            user_id,
        })
        .await?;

    let show_suggestion_ui = !verdict.suggested_triggers.is_empty();
    Ok(HttpResponse::Ok().json(ModerateImageResponse {
        outcome: verdict.outcome.as_str().to_string(),
        applied_triggers: verdict.applied_triggers,
        suggested_triggers: verdict.suggested_triggers,
        forbidden_reasons: verdict.forbidden_reasons,
        show_suggestion_ui,
        can_request_review: verdict.can_request_review,
        review_case_id: verdict.review_case_id,
        fingerprints: verdict.fingerprint,
        upload_id: verdict.upload_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveDecisionRequest {
    pub message_id: Uuid,
    pub upload_id: Uuid,
    pub action: DecisionAction,
}

pub async fn resolve_decision(
    user: AuthenticatedUser,
    review: web::Data<ReviewCaseService>,
    body: web::Json<ResolveDecisionRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    review
        .resolve_decision(&user.uid, body.message_id, body.upload_id, body.action)
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}
