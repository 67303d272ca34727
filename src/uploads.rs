use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::content;
use crate::error::{AppError, AppResult};
use crate::models::{Document, DocumentKind, PendingUpload, Property};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PresignRequest {
    pub filename: String,
    pub kind: String,
    pub size: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub upload_url: String,
    pub key: String,
    pub content_type: String,
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    pub key: String,
    pub filename: String,
    pub kind: String,
    pub sha256: String,
}

fn parse_kind(value: &str) -> AppResult<DocumentKind> {
    DocumentKind::parse(value)
        .ok_or_else(|| AppError::bad_request(format!("unsupported document kind: {value}")))
}

fn check_size(size: i64, max: i64) -> AppResult<()> {
    if size <= 0 {
        return Err(AppError::bad_request("file must not be empty"));
    }
    if size > max {
        return Err(AppError::bad_request(format!(
            "file exceeds maximum upload size of {max} bytes"
        )));
    }
    Ok(())
}

fn guessed_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Phase one of the presigned path: validate, stage a key, hand the client a
/// time-scoped PUT credential. Long-expired pending uploads are swept here
/// so their staged objects do not pile up.
pub async fn presign(
    state: &AppState,
    property: &Property,
    request: PresignRequest,
) -> AppResult<PresignResponse> {
    let kind = parse_kind(&request.kind)?;
    check_size(request.size, state.config.max_upload_bytes)?;
    if request.filename.trim().is_empty() {
        return Err(AppError::bad_request("filename is required"));
    }

    sweep_stale_uploads(state).await;

    let key = format!("staging/{}/{}", property.id, Uuid::new_v4());
    let content_type = guessed_content_type(&request.filename);
    let expiry = Duration::from_secs(state.config.presign_expiry_seconds);

    let upload_url = state
        .storage
        .presign_put_object(&key, Some(content_type.clone()), expiry)
        .await
        .map_err(|err| AppError::internal(format!("failed to presign upload: {err}")))?;

    let expires_at =
        Utc::now() + ChronoDuration::seconds(state.config.presign_expiry_seconds as i64);
    state
        .registry
        .insert_pending_upload(PendingUpload {
            key: key.clone(),
            property_id: property.id,
            filename: request.filename.trim().to_string(),
            kind,
            size: request.size,
            expires_at,
        })
        .await;

    info!(property_id = %property.id, key = %key, kind = %kind.as_str(), "issued presigned upload");

    Ok(PresignResponse {
        upload_url,
        key,
        content_type,
    })
}

/// Phase two of the presigned path: verify the staged object, recompute its
/// hash (the client-asserted hash is never trusted), promote the bytes into
/// the content store, then register the document. A mismatched hash leaves
/// the staged object orphaned and creates nothing.
pub async fn complete(
    state: &AppState,
    actor: Uuid,
    property: &Property,
    request: CompleteRequest,
) -> AppResult<Document> {
    let kind = parse_kind(&request.kind)?;

    let pending = state
        .registry
        .take_pending_upload(&request.key, property.id)
        .await
        .ok_or_else(AppError::not_found)?;

    let now = Utc::now();
    if now > pending.expires_at {
        // The staged object (if any) is abandoned; delete it eagerly.
        if let Err(err) = state.storage.delete_object(&pending.key).await {
            warn!(key = %pending.key, error = %err, "failed to delete expired staged upload");
        }
        return Err(AppError::gone("upload_expired"));
    }

    let bytes = state
        .storage
        .get_object(&pending.key)
        .await
        .map_err(|_| AppError::not_found())?;

    check_size(bytes.len() as i64, state.config.max_upload_bytes)?;

    let actual_hash = content::hash_bytes(&bytes);
    if !actual_hash.eq_ignore_ascii_case(request.sha256.trim()) {
        warn!(
            property_id = %property.id,
            key = %pending.key,
            "hash mismatch on upload completion"
        );
        return Err(AppError::conflict("hash mismatch"));
    }

    let content_type = guessed_content_type(&request.filename);
    state
        .content
        .put(&bytes, Some(content_type))
        .await
        .map_err(AppError::from)?;

    // The staging copy is redundant once the blob is durable.
    if let Err(err) = state.storage.delete_object(&pending.key).await {
        warn!(key = %pending.key, error = %err, "failed to delete staged upload");
    }

    let document = register(state, actor, property, kind, request.filename, actual_hash, bytes.len() as i64).await;

    Ok(document)
}

/// Proxied path: the server hashes and stores the bytes itself, so there is
/// no window where an unverified object exists.
pub async fn upload_proxied(
    state: &AppState,
    actor: Uuid,
    property: &Property,
    filename: String,
    kind: &str,
    bytes: Vec<u8>,
) -> AppResult<Document> {
    let kind = parse_kind(kind)?;
    check_size(bytes.len() as i64, state.config.max_upload_bytes)?;
    if filename.trim().is_empty() {
        return Err(AppError::bad_request("filename is required"));
    }

    let content_type = guessed_content_type(&filename);
    let hash = state
        .content
        .put(&bytes, Some(content_type))
        .await
        .map_err(AppError::from)?;

    let document = register(state, actor, property, kind, filename, hash, bytes.len() as i64).await;

    Ok(document)
}

async fn register(
    state: &AppState,
    actor: Uuid,
    property: &Property,
    kind: DocumentKind,
    filename: String,
    sha256: String,
    size: i64,
) -> Document {
    let document = Document {
        id: Uuid::new_v4(),
        property_id: property.id,
        kind,
        filename: filename.trim().to_string(),
        sha256,
        size,
        created_at: Utc::now(),
        created_by: actor,
        deleted_at: None,
    };
    state.registry.register_document(document.clone()).await;
    info!(
        document_id = %document.id,
        property_id = %property.id,
        kind = %kind.as_str(),
        sha256 = %document.sha256,
        "document registered"
    );
    document
}

/// Removes pending uploads that expired at least one full expiry window ago
/// and deletes their staged objects. Recently expired entries are kept so
/// `complete` can still answer with 410 rather than 404.
async fn sweep_stale_uploads(state: &AppState) {
    let cutoff = Utc::now() - ChronoDuration::seconds(state.config.presign_expiry_seconds as i64);
    let stale = state.registry.sweep_expired_uploads(cutoff).await;
    for upload in stale {
        if let Err(err) = state.storage.delete_object(&upload.key).await {
            warn!(key = %upload.key, error = %err, "failed to delete stale staged upload");
        }
    }
}
