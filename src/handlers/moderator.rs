//! Moderator console endpoints: claim, release, decide, and the identity
//! probe the console uses to gate its UI.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::handlers::auth::{is_moderator, AuthenticatedUser, ModeratorIdentity};
use crate::models::CaseDecision;
use crate::services::{DecideCommand, ReviewCaseService};

pub async fn claim_case(
    moderator: ModeratorIdentity,
    review: web::Data<ReviewCaseService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let result = review.claim(path.into_inner(), &moderator.0).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "claimed": result.claimed,
        "claimedBy": result.claimed_by,
    })))
}

pub async fn release_case(
    moderator: ModeratorIdentity,
    review: web::Data<ReviewCaseService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    review.release(path.into_inner(), &moderator.0).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideRequest {
    pub decision: CaseDecision,
    pub public_message: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub internal_note: Option<String>,
}

pub async fn decide_case(
    moderator: ModeratorIdentity,
    review: web::Data<ReviewCaseService>,
    path: web::Path<Uuid>,
    body: web::Json<DecideRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let decided = review
        .decide(
            path.into_inner(),
            &moderator.0,
            DecideCommand {
                decision: body.decision,
                public_message: body.public_message,
                reasons: body.reasons,
                internal_note: body.internal_note,
            },
        )
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "reviewCaseId": decided.case.id,
        "uploadId": decided.upload_id,
        "userId": decided.user_id,
    })))
}

pub async fn moderator_me(
    user: AuthenticatedUser,
    config: web::Data<Config>,
) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "isModerator": is_moderator(&user, &config),
    })))
}
