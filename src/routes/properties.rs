use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::access;
use crate::auth::AuthenticatedIdentity;
use crate::checklist::{self, ChecklistItem, Progress};
use crate::error::{AppError, AppResult};
use crate::models::{Property, Role};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePropertyRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub address: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub seller_email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetailResponse {
    #[serde(flatten)]
    pub property: Property,
    pub checklist: Vec<ChecklistItem>,
    pub progress: Progress,
}

pub async fn list_properties(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
) -> AppResult<Json<Vec<Property>>> {
    Ok(Json(visible_properties(&state, &identity).await))
}

pub async fn create_property(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Json(payload): Json<CreatePropertyRequest>,
) -> AppResult<(StatusCode, Json<Property>)> {
    if !access::is_agent_or_admin(&identity) {
        return Err(AppError::forbidden());
    }

    let title = payload.title.trim().to_string();
    let address = payload.address.trim().to_string();
    if title.is_empty() || address.is_empty() {
        return Err(AppError::bad_request("title_address_required"));
    }

    let kind = payload
        .kind
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "house".to_string());

    // Optional seller must already exist in the caller's org; the grant is
    // created alongside the property.
    let seller = match payload.seller_email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => Some(
            state
                .registry
                .org_user_by_email(identity.org_id, email)
                .await
                .ok_or_else(|| AppError::bad_request("seller not found"))?,
        ),
        _ => None,
    };

    let property = Property {
        id: Uuid::new_v4(),
        org_id: identity.org_id,
        title,
        address,
        kind,
        created_at: Utc::now(),
    };
    state.registry.insert_property(property.clone()).await;

    if let Some(seller) = seller {
        state
            .registry
            .grant_role(seller.id, property.id, Role::Seller)
            .await;
    }

    info!(property_id = %property.id, org_id = %property.org_id, "property created");

    Ok((StatusCode::CREATED, Json(property)))
}

pub async fn get_property(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<PropertyDetailResponse>> {
    let property = state
        .registry
        .property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_property_read(&state.registry, &identity, &property).await?;

    if !checklist::is_known_type(&property.kind) {
        warn!(
            property_id = %property.id,
            property_type = %property.kind,
            "unknown property type; applying baseline checklist rules"
        );
    }

    let documents = state.registry.live_documents_for(property.id).await;
    let evaluation = checklist::evaluate(&property.kind, &documents);

    Ok(Json(PropertyDetailResponse {
        property,
        checklist: evaluation.checklist,
        progress: evaluation.progress,
    }))
}

pub async fn delete_property(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let property = state
        .registry
        .property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_org_agent(&identity, &property)?;

    let cascade = state
        .registry
        .delete_property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;

    // Artifact blobs and staged uploads die with the property; content
    // blobs stay (shared, and GC is deferred).
    for key in cascade.artifact_keys.iter().chain(&cascade.staged_keys) {
        if let Err(err) = state.storage.delete_object(key).await {
            warn!(key = %key, error = %err, "failed to delete storage object during cascade");
        }
    }

    info!(property_id = %property_id, "property deleted");

    Ok(Json(json!({ "id": property_id, "deleted": true })))
}

pub(crate) async fn visible_properties(
    state: &AppState,
    identity: &AuthenticatedIdentity,
) -> Vec<Property> {
    if access::is_agent_or_admin(identity) {
        state.registry.properties_in_org(identity.org_id).await
    } else {
        let mut properties = Vec::new();
        for property_id in state.registry.granted_property_ids(identity.user_id).await {
            if let Some(property) = state.registry.property(property_id).await {
                properties.push(property);
            }
        }
        properties.sort_by_key(|property| property.created_at);
        properties
    }
}
