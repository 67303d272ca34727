use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use tracing::warn;
use uuid::Uuid;

use crate::access;
use crate::auth::AuthenticatedIdentity;
use crate::checklist;
use crate::error::{AppError, AppResult};
use crate::models::{Artifact, ArtifactKind, Property};
use crate::routes::documents::inline_content_disposition;
use crate::state::AppState;

async fn build(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    property_id: Uuid,
    kind: ArtifactKind,
) -> AppResult<Artifact> {
    let property = state
        .registry
        .property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_org_agent(identity, &property)?;

    if !checklist::is_known_type(&property.kind) {
        warn!(
            property_id = %property.id,
            property_type = %property.kind,
            "unknown property type; building against baseline checklist rules"
        );
    }

    let artifact = state
        .builds
        .build(
            &state.registry,
            state.storage.clone(),
            &property,
            kind,
            identity.user_id,
        )
        .await?;

    Ok(artifact)
}

async fn latest(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    property_id: Uuid,
    kind: ArtifactKind,
) -> AppResult<Artifact> {
    let property = state
        .registry
        .property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_property_read(&state.registry, identity, &property).await?;

    state
        .registry
        .latest_artifact(property_id, kind)
        .await
        .ok_or_else(AppError::not_found)
}

async fn readable_artifact(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    artifact_id: Uuid,
    kind: ArtifactKind,
) -> AppResult<(Artifact, Property)> {
    let artifact = state
        .registry
        .artifact(artifact_id)
        .await
        .filter(|artifact| artifact.kind == kind)
        .ok_or_else(AppError::not_found)?;

    let property = state
        .registry
        .property(artifact.property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_property_read(&state.registry, identity, &property).await?;

    Ok((artifact, property))
}

async fn download(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    artifact_id: Uuid,
    kind: ArtifactKind,
) -> AppResult<(HeaderMap, Vec<u8>)> {
    let (artifact, _property) = readable_artifact(state, identity, artifact_id, kind).await?;

    let bytes = state
        .storage
        .get_object(&artifact.blob_key)
        .await
        .map_err(|err| AppError::internal(format!("failed to read artifact blob: {err}")))?;

    let filename = format!(
        "{}-v{}.{}",
        kind.as_str().replace('_', "-"),
        artifact.version,
        kind.file_extension()
    );

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(kind.content_type()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(disposition) = inline_content_disposition(&filename) {
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok((headers, bytes))
}

pub async fn build_form2(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<Artifact>> {
    Ok(Json(
        build(&state, &identity, property_id, ArtifactKind::Form2).await?,
    ))
}

pub async fn latest_form2(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<Artifact>> {
    Ok(Json(
        latest(&state, &identity, property_id, ArtifactKind::Form2).await?,
    ))
}

pub async fn build_serve_pack(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<Artifact>> {
    Ok(Json(
        build(&state, &identity, property_id, ArtifactKind::ServePack).await?,
    ))
}

pub async fn latest_serve_pack(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<Artifact>> {
    Ok(Json(
        latest(&state, &identity, property_id, ArtifactKind::ServePack).await?,
    ))
}

pub async fn download_form2(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(artifact_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    download(&state, &identity, artifact_id, ArtifactKind::Form2).await
}

pub async fn download_serve_pack(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(artifact_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    download(&state, &identity, artifact_id, ArtifactKind::ServePack).await
}
