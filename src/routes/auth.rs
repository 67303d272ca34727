use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::{auth::AuthenticatedIdentity, error::AppResult, models::Role};

#[derive(Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
}

pub async fn me(identity: AuthenticatedIdentity) -> AppResult<Json<MeResponse>> {
    Ok(Json(MeResponse {
        id: identity.user_id,
        email: identity.email,
        name: identity.name,
        roles: identity.roles,
    }))
}
