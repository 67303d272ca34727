use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use disclosure_backend::{
    auth::session::SessionService,
    config::AppConfig,
    routes,
    state::AppState,
    storage::{MemoryStorage, ObjectStorage, S3Storage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        host = %config.server_host,
        port = config.server_port,
        s3_bucket = config.s3_bucket.as_deref().unwrap_or("(memory)"),
        build_workers = config.build_workers,
        "loaded configuration"
    );

    let storage: Arc<dyn ObjectStorage> = match config.s3_bucket.clone() {
        Some(bucket) => Arc::new(S3Storage::connect(&config, bucket).await?),
        None => {
            tracing::warn!("S3_BUCKET not set; using in-process storage (non-durable)");
            Arc::new(MemoryStorage::default())
        }
    };

    let sessions = SessionService::from_config(&config)?;
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(config, storage, sessions);
    let router = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
