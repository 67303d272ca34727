use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::checklist::{self, Evaluation};
use crate::error::AppError;
use crate::models::{Artifact, ArtifactKind, Document, Property};
use crate::registry::Registry;
use crate::storage::ObjectStorage;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A build with a different fingerprint is already in flight for this
    /// slot; the caller's inputs are stale.
    #[error("build in progress")]
    InProgress,
    #[error("checklist incomplete")]
    ChecklistIncomplete,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<BuildError> for AppError {
    fn from(value: BuildError) -> Self {
        match value {
            BuildError::InProgress => AppError::conflict("build in progress"),
            BuildError::ChecklistIncomplete => AppError::unprocessable("checklist incomplete"),
            BuildError::Storage(err) => AppError::internal(err),
        }
    }
}

#[derive(Clone, Default)]
struct Slot {
    lock: Arc<Mutex<()>>,
    in_flight: Arc<StdMutex<Option<String>>>,
}

fn in_flight_guard(slot: &StdMutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks the slot's in-flight fingerprint and clears it on drop. The marker
/// must not outlive the render, including when the caller's future is
/// dropped mid-build (client disconnect), or the slot stays wedged.
struct InFlightMark {
    slot: Arc<StdMutex<Option<String>>>,
}

impl InFlightMark {
    fn set(slot: Arc<StdMutex<Option<String>>>, fingerprint: String) -> Self {
        *in_flight_guard(&slot) = Some(fingerprint);
        Self { slot }
    }
}

impl Drop for InFlightMark {
    fn drop(&mut self) {
        *in_flight_guard(&self.slot) = None;
    }
}

/// Versioned artifact builds with single-flight de-duplication per
/// (property, kind) slot. Rendering runs on a bounded pool; the caller
/// awaits completion. Slots for different properties or kinds never
/// contend.
pub struct BuildService {
    slots: Mutex<HashMap<(Uuid, ArtifactKind), Slot>>,
    workers: Arc<Semaphore>,
}

impl BuildService {
    pub fn new(workers: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub async fn build(
        &self,
        registry: &Registry,
        storage: Arc<dyn ObjectStorage>,
        property: &Property,
        kind: ArtifactKind,
        actor: Uuid,
    ) -> Result<Artifact, BuildError> {
        let documents = registry.live_documents_for(property.id).await;
        let evaluation = checklist::evaluate(&property.kind, &documents);

        // The client gates the button on progress, but its state can be
        // stale; the authoritative check lives here.
        if kind == ArtifactKind::Form2
            && evaluation.progress.completed < evaluation.progress.total
        {
            return Err(BuildError::ChecklistIncomplete);
        }

        let fingerprint = fingerprint(property, &documents);

        // Unchanged state: hand back the existing version, no rebuild.
        if let Some(latest) = registry.latest_artifact(property.id, kind).await {
            if latest.fingerprint == fingerprint {
                return Ok(latest);
            }
        }

        let slot = self.slot(property.id, kind).await;

        {
            let in_flight = in_flight_guard(&slot.in_flight);
            if let Some(building) = in_flight.as_deref() {
                if building != fingerprint {
                    return Err(BuildError::InProgress);
                }
            }
        }

        // Same-fingerprint callers queue here and pick up the fresh latest
        // below instead of rebuilding.
        let _guard = slot.lock.lock().await;

        if let Some(latest) = registry.latest_artifact(property.id, kind).await {
            if latest.fingerprint == fingerprint {
                return Ok(latest);
            }
        }

        let _in_flight = InFlightMark::set(slot.in_flight.clone(), fingerprint.clone());

        let result = self
            .render_and_store(registry, storage, property, kind, actor, &fingerprint, &evaluation, &documents)
            .await;

        match &result {
            Ok(artifact) => info!(
                property_id = %property.id,
                kind = %kind.as_str(),
                version = artifact.version,
                fingerprint = %artifact.fingerprint,
                "artifact built"
            ),
            Err(err) => warn!(
                property_id = %property.id,
                kind = %kind.as_str(),
                error = %err,
                "artifact build failed"
            ),
        }

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn render_and_store(
        &self,
        registry: &Registry,
        storage: Arc<dyn ObjectStorage>,
        property: &Property,
        kind: ArtifactKind,
        actor: Uuid,
        fingerprint: &str,
        evaluation: &Evaluation,
        documents: &[Document],
    ) -> Result<Artifact, BuildError> {
        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| anyhow::anyhow!("build worker pool closed: {err}"))?;

        let render_property = property.clone();
        let render_evaluation = evaluation.clone();
        let render_documents = documents.to_vec();
        let bytes = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            match kind {
                ArtifactKind::Form2 => render_form2(&render_property, &render_evaluation),
                ArtifactKind::ServePack => render_serve_pack(&render_property, &render_documents),
            }
        })
        .await
        .map_err(|err| anyhow::anyhow!("build task panicked: {err}"))??;

        let blob_key = format!(
            "artifacts/{}/{}/{fingerprint}.{}",
            property.id,
            kind.as_str(),
            kind.file_extension()
        );
        storage
            .put_object(
                &blob_key,
                bytes,
                Some(kind.content_type().to_string()),
                None,
            )
            .await?;

        // Version allocation happens only after the blob is durable; failed
        // builds never advance the counter.
        let artifact = registry
            .append_artifact(
                property.id,
                kind,
                fingerprint.to_string(),
                blob_key,
                actor,
            )
            .await;

        Ok(artifact)
    }

    async fn slot(&self, property_id: Uuid, kind: ArtifactKind) -> Slot {
        let mut slots = self.slots.lock().await;
        slots
            .entry((property_id, kind))
            .or_default()
            .clone()
    }
}

/// Stable hash over everything that affects a build's output: property
/// metadata plus the sorted (kind, sha256) pairs of live documents. Used as
/// the cache and version key, so identical state never bumps a version.
pub fn fingerprint(property: &Property, documents: &[Document]) -> String {
    let mut entries: Vec<(&str, &str)> = documents
        .iter()
        .filter(|doc| !doc.is_deleted())
        .map(|doc| (doc.kind.as_str(), doc.sha256.as_str()))
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    hasher.update(property.id.as_bytes());
    hasher.update(property.title.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(property.address.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(property.kind.as_bytes());
    for (kind, sha256) in entries {
        hasher.update(b"\x1e");
        hasher.update(kind.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(sha256.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Placeholder Form 2 rendering: a deterministic single-page PDF skeleton
/// carrying the disclosure summary. The real layout is out of scope.
fn render_form2(property: &Property, evaluation: &Evaluation) -> anyhow::Result<Vec<u8>> {
    let mut body = String::new();
    body.push_str("%PDF-1.4\n% Form 2 disclosure\n");
    body.push_str(&format!(
        "% property: {} | {} | {}\n",
        property.title, property.address, property.kind
    ));
    for item in &evaluation.checklist {
        body.push_str(&format!(
            "% item: {} required={} complete={}\n",
            item.id.as_str(),
            item.required,
            item.complete
        ));
    }
    body.push_str("%%EOF\n");
    Ok(body.into_bytes())
}

/// Placeholder serve pack: a deterministic manifest of the documents the
/// pack would bundle. The zip container format is out of scope.
fn render_serve_pack(property: &Property, documents: &[Document]) -> anyhow::Result<Vec<u8>> {
    let mut entries: Vec<serde_json::Value> = documents
        .iter()
        .filter(|doc| !doc.is_deleted())
        .map(|doc| {
            serde_json::json!({
                "kind": doc.kind.as_str(),
                "filename": doc.filename,
                "sha256": doc.sha256,
                "size": doc.size,
            })
        })
        .collect();
    entries.sort_by_key(|entry| {
        (
            entry["kind"].as_str().map(str::to_string),
            entry["sha256"].as_str().map(str::to_string),
        )
    });

    let manifest = serde_json::json!({
        "property": {
            "id": property.id,
            "title": property.title,
            "address": property.address,
            "type": property.kind,
        },
        "documents": entries,
    });
    Ok(serde_json::to_vec_pretty(&manifest)?)
}
