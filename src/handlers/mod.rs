pub mod auth;
pub mod moderation;
pub mod moderator;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/moderation")
            .route("/images", web::post().to(moderation::moderate_image))
            .route(
                "/decisions/resolve",
                web::post().to(moderation::resolve_decision),
            )
            .route(
                "/cases/{case_id}/claim",
                web::post().to(moderator::claim_case),
            )
            .route(
                "/cases/{case_id}/release",
                web::post().to(moderator::release_case),
            )
            .route(
                "/cases/{case_id}/decide",
                web::post().to(moderator::decide_case),
            )
            .route("/moderators/me", web::get().to(moderator::moderator_me)),
    );
}
