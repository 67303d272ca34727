use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedIdentity, state::AppState};

pub mod artifacts;
pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod health;
pub mod invites;
pub mod properties;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let properties_routes = Router::new()
        .route(
            "/",
            get(properties::list_properties).post(properties::create_property),
        )
        .route(
            "/:id",
            get(properties::get_property).delete(properties::delete_property),
        )
        .route("/:id/documents", get(documents::list_documents))
        .route("/:id/documents/presign", post(documents::presign_upload))
        .route("/:id/documents/complete", post(documents::complete_upload))
        .route("/:id/documents/:doc_id/url", get(documents::document_url))
        .route("/:id/upload", post(documents::upload_document))
        .route("/:id/form2/build", post(artifacts::build_form2))
        .route("/:id/form2/latest", get(artifacts::latest_form2))
        .route("/:id/serve/build", post(artifacts::build_serve_pack))
        .route("/:id/serve/latest", get(artifacts::latest_serve_pack))
        .route("/:id/invite", post(invites::create_invite));

    let documents_routes = Router::new()
        .route("/:id", delete(documents::delete_document))
        .route("/:id/download", get(documents::download_document));

    let artifact_download_routes = Router::new()
        .route("/form2/:id/download", get(artifacts::download_form2))
        .route("/serve/:id/download", get(artifacts::download_serve_pack));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .route("/api/me", get(auth::me))
        .route("/api/dashboard/summary", get(dashboard::summary))
        .nest("/api/properties", properties_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api", artifact_download_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedIdentity, _>(protected_state));

    // Invite lookup stays public: the acceptance page shows the invite
    // before the visitor has logged in. Accept and revoke authenticate
    // through their handler extractors instead of the middleware nest.
    Router::new()
        .merge(protected_routes)
        .route(
            "/api/invites/:token",
            get(invites::get_invite).delete(invites::revoke_invite),
        )
        .route("/api/invites/:token/accept", post(invites::accept_invite))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 64))
}
