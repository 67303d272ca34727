use axum::extract::{Json, State};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthenticatedIdentity;
use crate::checklist::{self, Progress};
use crate::error::AppResult;
use crate::routes::properties::visible_properties;
use crate::state::AppState;

#[derive(Serialize)]
pub struct DashboardProperty {
    pub id: Uuid,
    pub title: String,
    pub address: String,
    pub progress: Progress,
}

#[derive(Serialize)]
pub struct DashboardSummary {
    pub overall: Progress,
    pub properties: Vec<DashboardProperty>,
}

pub async fn summary(
    State(state): State<AppState>,
    identity: AuthenticatedIdentity,
) -> AppResult<Json<DashboardSummary>> {
    let mut overall = Progress {
        completed: 0,
        total: 0,
    };
    let mut properties = Vec::new();

    for property in visible_properties(&state, &identity).await {
        let documents = state.registry.live_documents_for(property.id).await;
        let evaluation = checklist::evaluate(&property.kind, &documents);
        overall.completed += evaluation.progress.completed;
        overall.total += evaluation.progress.total;
        properties.push(DashboardProperty {
            id: property.id,
            title: property.title,
            address: property.address,
            progress: evaluation.progress,
        });
    }

    Ok(Json(DashboardSummary {
        overall,
        properties,
    }))
}
