mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_to_string, body_to_vec, TestApp};
use disclosure_backend::content::hash_bytes;
use disclosure_backend::models::Role;
use disclosure_backend::storage::ObjectStorage;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentInfo {
    id: Uuid,
    property_id: Uuid,
    kind: String,
    filename: String,
    sha256: String,
    size: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresignInfo {
    upload_url: String,
    key: String,
    content_type: String,
}

#[derive(Deserialize)]
struct Progress {
    completed: usize,
    total: usize,
}

#[derive(Deserialize)]
struct PropertyDetail {
    progress: Progress,
}

async fn seed_property(app: &TestApp, session: &str, kind: &str) -> Result<Uuid> {
    #[derive(Deserialize)]
    struct Created {
        id: Uuid,
    }

    let response = app
        .post_json(
            "/api/properties",
            &json!({ "title": "10 Example St", "address": "10 Example St, Brisbane", "type": kind }),
            Some(session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Created = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    Ok(created.id)
}

async fn progress_for(app: &TestApp, session: &str, property_id: Uuid) -> Result<Progress> {
    let response = app
        .get(&format!("/api/properties/{property_id}"), Some(session))
        .await?;
    let detail: PropertyDetail = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    Ok(detail.progress)
}

#[tokio::test]
async fn proxied_upload_registers_a_document_and_advances_progress() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let bytes = b"title search report";
    let response = app
        .upload_multipart(
            &format!("/api/properties/{property_id}/upload"),
            "title.pdf",
            "application/pdf",
            bytes,
            Some("title_search"),
            &session,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let document: DocumentInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(document.property_id, property_id);
    assert_eq!(document.kind, "title_search");
    assert_eq!(document.filename, "title.pdf");
    assert_eq!(document.sha256, hash_bytes(bytes));
    assert_eq!(document.size, bytes.len() as i64);

    let progress = progress_for(&app, &session, property_id).await?;
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.total, 2);

    // The blob lives under its content hash.
    let stored = app
        .storage()
        .get(&format!("content/{}", document.sha256))
        .await
        .expect("content blob stored");
    assert_eq!(stored.bytes, bytes);
    Ok(())
}

#[tokio::test]
async fn identical_bytes_share_one_blob() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let bytes = b"same underlying report";
    for filename in ["first.pdf", "second.pdf"] {
        let response = app
            .upload_multipart(
                &format!("/api/properties/{property_id}/upload"),
                filename,
                "application/pdf",
                bytes,
                Some("supporting"),
                &session,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .get(
            &format!("/api/properties/{property_id}/documents"),
            Some(&session),
        )
        .await?;
    let listed: Vec<DocumentInfo> = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].sha256, listed[1].sha256);

    // Two documents, one content object.
    assert_eq!(app.storage().object_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn presigned_flow_promotes_staged_bytes() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let bytes = b"smoke alarm compliance certificate";
    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/presign"),
            &json!({ "filename": "alarm.pdf", "kind": "smoke_alarm", "size": bytes.len() }),
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let presign: PresignInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(presign.key.starts_with(&format!("staging/{property_id}/")));
    assert!(presign.upload_url.contains(&presign.key));
    assert_eq!(presign.content_type, "application/pdf");

    // Simulate the client PUT against the presigned URL.
    app.state
        .storage
        .put_object(&presign.key, bytes.to_vec(), None, None)
        .await?;

    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/complete"),
            &json!({
                "key": presign.key,
                "filename": "alarm.pdf",
                "kind": "smoke_alarm",
                "sha256": hash_bytes(bytes),
            }),
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let document: DocumentInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(document.kind, "smoke_alarm");

    // Staging copy is gone; only the content blob remains.
    assert!(app.storage().get(&presign.key).await.is_none());
    assert!(app
        .storage()
        .get(&format!("content/{}", document.sha256))
        .await
        .is_some());
    Ok(())
}

#[tokio::test]
async fn hash_mismatch_creates_nothing() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let bytes = b"actual bytes";
    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/presign"),
            &json!({ "filename": "doc.pdf", "kind": "supporting", "size": bytes.len() }),
            Some(&session),
        )
        .await?;
    let presign: PresignInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    app.state
        .storage
        .put_object(&presign.key, bytes.to_vec(), None, None)
        .await?;

    let complete = json!({
        "key": presign.key,
        "filename": "doc.pdf",
        "kind": "supporting",
        "sha256": hash_bytes(b"some other bytes"),
    });
    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/complete"),
            &complete,
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_to_string(response.into_body()).await?;
    assert!(body.contains("hash mismatch"));

    let response = app
        .get(
            &format!("/api/properties/{property_id}/documents"),
            Some(&session),
        )
        .await?;
    let listed: Vec<DocumentInfo> = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(listed.is_empty());

    // The pending record is consumed on first use; retrying is a 404.
    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/complete"),
            &complete,
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn complete_against_the_wrong_property_keeps_the_upload_pending() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let first = seed_property(&app, &session, "house").await?;
    let second = seed_property(&app, &session, "house").await?;

    let bytes = b"belongs to the first property";
    let response = app
        .post_json(
            &format!("/api/properties/{first}/documents/presign"),
            &json!({ "filename": "doc.pdf", "kind": "supporting", "size": bytes.len() }),
            Some(&session),
        )
        .await?;
    let presign: PresignInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    app.state
        .storage
        .put_object(&presign.key, bytes.to_vec(), None, None)
        .await?;

    let complete = json!({
        "key": presign.key,
        "filename": "doc.pdf",
        "kind": "supporting",
        "sha256": hash_bytes(bytes),
    });

    // A key presented against the wrong property is rejected without
    // consuming the pending upload.
    let response = app
        .post_json(
            &format!("/api/properties/{second}/documents/complete"),
            &complete,
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .post_json(
            &format!("/api/properties/{first}/documents/complete"),
            &complete,
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn completing_after_the_presign_window_is_gone() -> Result<()> {
    let app = TestApp::with_config(|config| config.presign_expiry_seconds = 0)?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let bytes = b"arrived too late";
    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/presign"),
            &json!({ "filename": "doc.pdf", "kind": "supporting", "size": bytes.len() }),
            Some(&session),
        )
        .await?;
    let presign: PresignInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    app.state
        .storage
        .put_object(&presign.key, bytes.to_vec(), None, None)
        .await?;

    let complete = json!({
        "key": presign.key,
        "filename": "doc.pdf",
        "kind": "supporting",
        "sha256": hash_bytes(bytes),
    });
    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/complete"),
            &complete,
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::GONE);
    let body = body_to_string(response.into_body()).await?;
    assert!(body.contains("upload_expired"));

    // The staged object is abandoned and deleted; nothing was registered.
    assert!(app.storage().get(&presign.key).await.is_none());
    let response = app
        .get(
            &format!("/api/properties/{property_id}/documents"),
            Some(&session),
        )
        .await?;
    let listed: Vec<DocumentInfo> = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(listed.is_empty());

    // The expired record was consumed; retrying is a 404.
    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/complete"),
            &complete,
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn presign_rejects_bad_requests() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/presign"),
            &json!({ "filename": "doc.pdf", "kind": "certificate", "size": 10 }),
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_to_string(response.into_body()).await?;
    assert!(body.contains("unsupported document kind"));

    // Max upload size in the harness config is 1 MiB.
    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/presign"),
            &json!({ "filename": "doc.pdf", "kind": "supporting", "size": 2 * 1024 * 1024 }),
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json(
            &format!("/api/properties/{property_id}/documents/presign"),
            &json!({ "filename": "", "kind": "supporting", "size": 10 }),
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn soft_delete_hides_the_document_and_rolls_back_progress() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let response = app
        .upload_multipart(
            &format!("/api/properties/{property_id}/upload"),
            "title.pdf",
            "application/pdf",
            b"title search report",
            Some("title_search"),
            &session,
        )
        .await?;
    let document: DocumentInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(progress_for(&app, &session, property_id).await?.completed, 1);

    let response = app
        .delete(&format!("/api/documents/{}", document.id), Some(&session))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(
            &format!("/api/properties/{property_id}/documents"),
            Some(&session),
        )
        .await?;
    let listed: Vec<DocumentInfo> = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(listed.is_empty());
    assert_eq!(progress_for(&app, &session, property_id).await?.completed, 0);

    // Deleting again is a 404, and the blob itself is retained.
    let response = app
        .delete(&format!("/api/documents/{}", document.id), Some(&session))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app
        .storage()
        .get(&format!("content/{}", document.sha256))
        .await
        .is_some());
    Ok(())
}

#[tokio::test]
async fn download_streams_bytes_with_inline_disposition() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let bytes = b"report body";
    let response = app
        .upload_multipart(
            &format!("/api/properties/{property_id}/upload"),
            "report.pdf",
            "application/pdf",
            bytes,
            Some("supporting"),
            &session,
        )
        .await?;
    let document: DocumentInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    let response = app
        .get(
            &format!("/api/documents/{}/download", document.id),
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/pdf")
    );
    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.starts_with("inline;"));
    assert!(disposition.contains("report.pdf"));
    assert_eq!(body_to_vec(response.into_body()).await?, bytes);
    Ok(())
}

#[tokio::test]
async fn document_url_returns_a_scoped_link() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let session = app.session_for(agent).await?;
    let property_id = seed_property(&app, &session, "house").await?;

    let response = app
        .upload_multipart(
            &format!("/api/properties/{property_id}/upload"),
            "report.pdf",
            "application/pdf",
            b"report body",
            Some("supporting"),
            &session,
        )
        .await?;
    let document: DocumentInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct UrlInfo {
        url: String,
        expires_in: u64,
    }

    let response = app
        .get(
            &format!(
                "/api/properties/{property_id}/documents/{}/url",
                document.id
            ),
            Some(&session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let info: UrlInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(info.url.contains(&document.sha256));
    assert_eq!(info.expires_in, 300);
    Ok(())
}

#[tokio::test]
async fn sellers_without_a_grant_cannot_touch_documents() -> Result<()> {
    let app = TestApp::new()?;
    let org = Uuid::new_v4();
    let agent = app
        .insert_user("agent@example.com", "Avery Agent", org, vec![Role::Agent])
        .await;
    let outsider = app
        .insert_user("other@example.com", "Olive Other", org, vec![Role::Seller])
        .await;
    let agent_session = app.session_for(agent).await?;
    let outsider_session = app.session_for(outsider).await?;
    let property_id = seed_property(&app, &agent_session, "house").await?;

    let response = app
        .get(
            &format!("/api/properties/{property_id}/documents"),
            Some(&outsider_session),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .upload_multipart(
            &format!("/api/properties/{property_id}/upload"),
            "sneaky.pdf",
            "application/pdf",
            b"not allowed",
            Some("supporting"),
            &outsider_session,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}
