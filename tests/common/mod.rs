use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use disclosure_backend::auth::session::SessionService;
use disclosure_backend::config::AppConfig;
use disclosure_backend::models::{Role, User};
use disclosure_backend::routes;
use disclosure_backend::state::AppState;
use disclosure_backend::storage::{MemoryStorage, ObjectStorage};
use http_body_util::BodyExt;
use serde::Serialize;
use tower::util::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<MemoryStorage>,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_config(|_| {})
    }

    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let mut config = AppConfig {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            session_secret: "test-secret".to_string(),
            session_issuer: "test-issuer".to_string(),
            session_audience: "test-audience".to_string(),
            session_expiry_minutes: 60,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: None,
            max_upload_bytes: 1024 * 1024,
            presign_expiry_seconds: 300,
            download_url_expiry_seconds: 300,
            invite_ttl_days: 7,
            build_workers: 2,
            app_origin: "http://localhost:3000".to_string(),
        };
        adjust(&mut config);

        let storage = Arc::new(MemoryStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let sessions = SessionService::from_config(&config)?;
        let state = AppState::new(config, storage_for_state, sessions);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            storage,
        })
    }

    pub fn storage(&self) -> Arc<MemoryStorage> {
        self.storage.clone()
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn insert_user(
        &self,
        email: &str,
        name: &str,
        org_id: Uuid,
        roles: Vec<Role>,
    ) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            org_id,
            roles,
        };
        let user_id = user.id;
        self.state.registry.upsert_user(user).await;
        user_id
    }

    pub async fn session_for(&self, user_id: Uuid) -> Result<String> {
        let user = self
            .state
            .registry
            .user(user_id)
            .await
            .ok_or_else(|| anyhow!("user {user_id} not seeded"))?;
        Ok(self
            .state
            .sessions
            .issue(user.id, &user.email, user.org_id, &user.roles)?)
    }

    pub async fn get(&self, path: &str, session: Option<&str>) -> Result<hyper::Response<Body>> {
        self.request(Method::GET, path, None, None, session).await
    }

    pub async fn delete(&self, path: &str, session: Option<&str>) -> Result<hyper::Response<Body>> {
        self.request(Method::DELETE, path, None, None, session).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        session: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.request(
            Method::POST,
            path,
            Some(body),
            Some("application/json".to_string()),
            session,
        )
        .await
    }

    pub async fn post_empty(
        &self,
        path: &str,
        session: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.request(Method::POST, path, None, None, session).await
    }

    pub async fn upload_multipart(
        &self,
        path: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
        kind: Option<&str>,
        session: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        body.extend(format!("--{boundary}\r\n").as_bytes());
        body.extend(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend(data);
        body.extend(b"\r\n");

        if let Some(kind) = kind {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(b"Content-Disposition: form-data; name=\"kind\"\r\n\r\n");
            body.extend(kind.as_bytes());
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("cookie", format!("session={session}"))
            .body(Body::from(body))?;

        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        content_type: Option<String>,
        session: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        if let Some(session) = session {
            builder = builder.header("cookie", format!("session={session}"));
        }
        let request = builder.body(match body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        })?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_to_string(body: Body) -> Result<String> {
    Ok(String::from_utf8_lossy(&body_to_vec(body).await?).into_owned())
}
