use std::time::Duration;

use axum::extract::{Json, Multipart, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::access;
use crate::auth::AuthenticatedIdentity;
use crate::error::{AppError, AppResult};
use crate::models::{Document, Property};
use crate::state::AppState;
use crate::uploads::{self, CompleteRequest, PresignRequest, PresignResponse};

pub(crate) fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "inline; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

async fn writable_property(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    property_id: Uuid,
) -> AppResult<Property> {
    let property = state
        .registry
        .property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_property_write(&state.registry, identity, &property).await?;
    Ok(property)
}

pub async fn list_documents(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
) -> AppResult<Json<Vec<Document>>> {
    let property = state
        .registry
        .property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_property_read(&state.registry, &identity, &property).await?;

    Ok(Json(state.registry.live_documents_for(property_id).await))
}

pub async fn presign_upload(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
    Json(payload): Json<PresignRequest>,
) -> AppResult<Json<PresignResponse>> {
    let property = writable_property(&state, &identity, property_id).await?;
    let response = uploads::presign(&state, &property, payload).await?;
    Ok(Json(response))
}

pub async fn complete_upload(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
    Json(payload): Json<CompleteRequest>,
) -> AppResult<(StatusCode, Json<Document>)> {
    let property = writable_property(&state, &identity, property_id).await?;
    let document = uploads::complete(&state, identity.user_id, &property, payload).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn upload_document(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(property_id): Path<Uuid>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<Document>)> {
    let property = writable_property(&state, &identity, property_id).await?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut kind = "supporting".to_string();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        let msg = format!("invalid multipart data: {err}");
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(msg)
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(|n| n.to_string());
                let data = field.bytes().await.map_err(|err| {
                    let msg = format!("failed to read file bytes: {err}");
                    error!(error = %err, "failed to read file bytes");
                    AppError::bad_request(msg)
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("kind") => {
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid kind field: {err}"))
                })?;
                if !value.trim().is_empty() {
                    kind = value.trim().to_string();
                }
            }
            _ => {}
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| AppError::bad_request("file field is required"))?;
    let filename = filename.ok_or_else(|| AppError::bad_request("filename is required"))?;

    let document =
        uploads::upload_proxied(&state, identity.user_id, &property, filename, &kind, file_bytes)
            .await?;

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn delete_document(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(document_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let document = state
        .registry
        .document(document_id)
        .await
        .ok_or_else(AppError::not_found)?;
    if document.is_deleted() {
        return Err(AppError::not_found());
    }
    writable_property(&state, &identity, document.property_id).await?;

    state
        .registry
        .soft_delete_document(document_id, Utc::now())
        .await
        .ok_or_else(AppError::not_found)?;

    info!(document_id = %document_id, "document soft-deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUrlResponse {
    pub url: String,
    pub expires_in: u64,
}

pub async fn document_url(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path((property_id, document_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<DocumentUrlResponse>> {
    let property = state
        .registry
        .property(property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_property_read(&state.registry, &identity, &property).await?;

    let document = state
        .registry
        .document(document_id)
        .await
        .filter(|doc| doc.property_id == property_id && !doc.is_deleted())
        .ok_or_else(AppError::not_found)?;

    let expires_in = state.config.download_url_expiry_seconds;
    let url = state
        .content
        .presign_get(&document.sha256, Duration::from_secs(expires_in))
        .await
        .map_err(|err| AppError::internal(format!("failed to generate download URL: {err}")))?;

    Ok(Json(DocumentUrlResponse { url, expires_in }))
}

pub async fn download_document(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
    Path(document_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let document = state
        .registry
        .document(document_id)
        .await
        .filter(|doc| !doc.is_deleted())
        .ok_or_else(AppError::not_found)?;

    let property = state
        .registry
        .property(document.property_id)
        .await
        .ok_or_else(AppError::not_found)?;
    access::ensure_property_read(&state.registry, &identity, &property).await?;

    let bytes = state
        .content
        .get(&document.sha256)
        .await
        .map_err(|err| AppError::internal(format!("failed to read document blob: {err}")))?;

    let content_type = mime_guess::from_path(&document.filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(disposition) = inline_content_disposition(&document.filename) {
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    Ok((headers, bytes))
}
