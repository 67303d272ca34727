pub mod session;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization, Cookie};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::Role, state::AppState};

pub const SESSION_COOKIE_NAME: &str = "session";

/// Identity resolved from the session cookie, passed explicitly into every
/// component call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub org_id: Uuid,
    pub roles: Vec<Role>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts, state).await?;

        let claims = state
            .sessions
            .verify(&token)
            .map_err(|_| AppError::unauthorized())?;

        // The registry is the source of truth for name and current roles;
        // a session whose user has been removed is no longer valid.
        let user = state
            .registry
            .user(claims.sub)
            .await
            .ok_or_else(AppError::unauthorized)?;

        Ok(AuthenticatedIdentity {
            user_id: user.id,
            email: user.email,
            name: user.name,
            org_id: user.org_id,
            roles: user.roles,
        })
    }
}

/// Browser clients send the session cookie; non-browser callers may use a
/// bearer header instead.
async fn session_token(parts: &mut Parts, state: &AppState) -> Result<String, AppError> {
    if let Ok(TypedHeader(cookies)) =
        TypedHeader::<Cookie>::from_request_parts(parts, state).await
    {
        if let Some(value) = cookies.get(SESSION_COOKIE_NAME) {
            return Ok(value.to_string());
        }
    }

    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::unauthorized())?;

    Ok(bearer.token().to_string())
}
