use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::access;
use crate::auth::AuthenticatedIdentity;
use crate::error::{AppError, AppResult};
use crate::invites;
use crate::models::{Invite, Role};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateInviteRequest {
    pub email: String,
    #[serde(default = "default_invite_role")]
    pub role: Role,
}

fn default_invite_role() -> Role {
    Role::Seller
}

#[derive(Serialize)]
pub struct InviteResponse {
    #[serde(flatten)]
    pub invite: Invite,
    pub link: String,
}

pub async fn create_invite(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
    Json(payload): Json<CreateInviteRequest>,
) -> AppResult<(StatusCode, Json<InviteResponse>)> {
    let property = state
        .registry
        .property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_org_agent(&identity, &property)?;

    let invite = invites::create(&state, &property, &payload.email, payload.role).await?;
    let link = state.config.invite_link(&invite.token);

    Ok((StatusCode::CREATED, Json(InviteResponse { invite, link })))
}

pub async fn get_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<Invite>> {
    Ok(Json(invites::get(&state, &token).await?))
}

pub async fn accept_invite(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(token): Path<String>,
) -> AppResult<Json<Value>> {
    let property_id = invites::accept(&state, &identity, &token).await?;
    Ok(Json(json!({ "propertyId": property_id })))
}

pub async fn revoke_invite(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(token): Path<String>,
) -> AppResult<Json<Invite>> {
    let invite = state
        .registry
        .invite(&token)
        .await
        .ok_or_else(AppError::not_found)?;
    let property = state
        .registry
        .property(invite.property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_org_agent(&identity, &property)?;

    Ok(Json(invites::revoke(&state, &token).await?))
}
