//! Identity extraction. The service sits behind a gateway that verifies
//! tokens and forwards the caller identity in headers; moderator status is
//! resolved against the configured allowlist.

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};

use crate::config::Config;
use crate::error::ModerationError;
use crate::services::Moderator;

const USER_ID_HEADER: &str = "x-user-id";
const USER_EMAIL_HEADER: &str = "x-user-email";

fn header_value(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub uid: String,
    pub email: Option<String>,
}

impl FromRequest for AuthenticatedUser {
    type Error = ModerationError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = match header_value(req, USER_ID_HEADER) {
            Some(uid) => Ok(AuthenticatedUser {
                uid,
                email: header_value(req, USER_EMAIL_HEADER),
            }),
            None => Err(ModerationError::Unauthorized(
                "authentication required".to_string(),
            )),
        };
        ready(result)
    }
}

/// A caller whose email is on the moderator allowlist.
#[derive(Debug, Clone)]
pub struct ModeratorIdentity(pub Moderator);

impl FromRequest for ModeratorIdentity {
    type Error = ModerationError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let uid = match header_value(req, USER_ID_HEADER) {
            Some(uid) => uid,
            None => {
                return ready(Err(ModerationError::Unauthorized(
                    "authentication required".to_string(),
                )))
            }
        };
        let config = match req.app_data::<web::Data<Config>>() {
            Some(config) => config,
            None => {
                return ready(Err(ModerationError::Internal(
                    "configuration not available".to_string(),
                )))
            }
        };
        let result = match header_value(req, USER_EMAIL_HEADER) {
            Some(email) if config.is_moderator_email(&email) => {
                Ok(ModeratorIdentity(Moderator { uid, email }))
            }
            _ => Err(ModerationError::Forbidden("not a moderator".to_string())),
        };
        ready(result)
    }
}

/// Whether the caller would pass moderator extraction, without failing the
/// request when they would not.
pub fn is_moderator(user: &AuthenticatedUser, config: &Config) -> bool {
    user.email
        .as_deref()
        .map(|email| config.is_moderator_email(email))
        .unwrap_or(false)
}
