use std::env;

use anyhow::{Context, Result};

pub const DEFAULT_MAX_UPLOAD_BYTES: i64 = 25 * 1024 * 1024;
pub const DEFAULT_BUILD_WORKERS: usize = 2;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    pub session_secret: String,
    pub session_issuer: String,
    pub session_audience: String,
    pub session_expiry_minutes: i64,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: Option<String>,
    pub max_upload_bytes: i64,
    pub presign_expiry_seconds: u64,
    pub download_url_expiry_seconds: u64,
    pub invite_ttl_days: i64,
    pub build_workers: usize,
    pub app_origin: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let session_secret = env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?;
        let session_issuer =
            env::var("SESSION_ISSUER").unwrap_or_else(|_| "disclosure-backend".to_string());
        let session_audience =
            env::var("SESSION_AUDIENCE").unwrap_or_else(|_| "disclosure-clients".to_string());
        let session_expiry_minutes = env::var("SESSION_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "480".to_string())
            .parse()
            .context("SESSION_EXPIRY_MINUTES must be an integer")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let aws_endpoint_url = env::var("AWS_ENDPOINT_URL").ok();
        let aws_access_key_id = env::var("AWS_ACCESS_KEY_ID").ok();
        let aws_secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok();
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_bucket = env::var("S3_BUCKET").ok();
        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let presign_expiry_seconds = env::var("PRESIGN_EXPIRY_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .context("PRESIGN_EXPIRY_SECONDS must be an integer")?;
        let download_url_expiry_seconds = env::var("DOWNLOAD_URL_EXPIRY_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .context("DOWNLOAD_URL_EXPIRY_SECONDS must be an integer")?;
        let invite_ttl_days = env::var("INVITE_TTL_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .context("INVITE_TTL_DAYS must be an integer")?;
        let build_workers = env::var("BUILD_WORKERS")
            .ok()
            .and_then(|value| value.parse().ok())
            .filter(|workers| *workers > 0)
            .unwrap_or(DEFAULT_BUILD_WORKERS);
        let app_origin =
            env::var("APP_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            server_host,
            server_port,
            session_secret,
            session_issuer,
            session_audience,
            session_expiry_minutes,
            cors_allowed_origin,
            aws_endpoint_url,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            s3_bucket,
            max_upload_bytes,
            presign_expiry_seconds,
            download_url_expiry_seconds,
            invite_ttl_days,
            build_workers,
            app_origin,
        })
    }

    /// Link shown to the inviting agent (and logged); email delivery is
    /// handled elsewhere.
    pub fn invite_link(&self, token: &str) -> String {
        format!("{}/invites/{token}", self.app_origin.trim_end_matches('/'))
    }
}
