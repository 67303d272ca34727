use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Artifact, ArtifactKind, Document, Invite, PendingUpload, Property, Role, User,
};

/// Keys left behind in object storage when a property is deleted; the caller
/// owns deleting the objects.
#[derive(Debug, Default)]
pub struct CascadeDelete {
    pub artifact_keys: Vec<String>,
    pub staged_keys: Vec<String>,
}

/// In-memory catalog of all property-scoped state. Each collection sits
/// behind its own lock; cross-collection operations (cascade delete, version
/// allocation) take one write lock at a time in a fixed order.
#[derive(Default)]
pub struct Registry {
    users: RwLock<HashMap<Uuid, User>>,
    properties: RwLock<HashMap<Uuid, Property>>,
    documents: RwLock<Vec<Document>>,
    artifacts: RwLock<Vec<Artifact>>,
    invites: RwLock<HashMap<String, Invite>>,
    grants: RwLock<HashMap<(Uuid, Uuid), Role>>,
    pending_uploads: RwLock<HashMap<String, PendingUpload>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- users ----

    pub async fn upsert_user(&self, user: User) {
        let mut users = self.users.write().await;
        users.insert(user.id, user);
    }

    pub async fn user(&self, id: Uuid) -> Option<User> {
        let users = self.users.read().await;
        users.get(&id).cloned()
    }

    pub async fn org_user_by_email(&self, org_id: Uuid, email: &str) -> Option<User> {
        let users = self.users.read().await;
        users
            .values()
            .find(|user| user.org_id == org_id && user.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    // ---- properties ----

    pub async fn insert_property(&self, property: Property) {
        let mut properties = self.properties.write().await;
        properties.insert(property.id, property);
    }

    pub async fn property(&self, id: Uuid) -> Option<Property> {
        let properties = self.properties.read().await;
        properties.get(&id).cloned()
    }

    pub async fn properties_in_org(&self, org_id: Uuid) -> Vec<Property> {
        let properties = self.properties.read().await;
        let mut list: Vec<Property> = properties
            .values()
            .filter(|property| property.org_id == org_id)
            .cloned()
            .collect();
        list.sort_by_key(|property| property.created_at);
        list
    }

    /// Removes the property and everything it owns. Returns the storage keys
    /// the caller should clean up.
    pub async fn delete_property(&self, id: Uuid) -> Option<CascadeDelete> {
        let mut properties = self.properties.write().await;
        properties.remove(&id)?;
        drop(properties);

        let mut cascade = CascadeDelete::default();

        let mut documents = self.documents.write().await;
        documents.retain(|doc| doc.property_id != id);
        drop(documents);

        let mut artifacts = self.artifacts.write().await;
        artifacts.retain(|artifact| {
            if artifact.property_id == id {
                cascade.artifact_keys.push(artifact.blob_key.clone());
                false
            } else {
                true
            }
        });
        drop(artifacts);

        let mut invites = self.invites.write().await;
        invites.retain(|_, invite| invite.property_id != id);
        drop(invites);

        let mut grants = self.grants.write().await;
        grants.retain(|(_, property_id), _| *property_id != id);
        drop(grants);

        let mut pending = self.pending_uploads.write().await;
        pending.retain(|key, upload| {
            if upload.property_id == id {
                cascade.staged_keys.push(key.clone());
                false
            } else {
                true
            }
        });

        Some(cascade)
    }

    // ---- documents ----

    pub async fn register_document(&self, document: Document) {
        let mut documents = self.documents.write().await;
        documents.push(document);
    }

    pub async fn document(&self, id: Uuid) -> Option<Document> {
        let documents = self.documents.read().await;
        documents.iter().find(|doc| doc.id == id).cloned()
    }

    /// Creation-ordered documents for a property, soft-deleted ones included.
    pub async fn documents_for(&self, property_id: Uuid) -> Vec<Document> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .filter(|doc| doc.property_id == property_id)
            .cloned()
            .collect()
    }

    pub async fn live_documents_for(&self, property_id: Uuid) -> Vec<Document> {
        let documents = self.documents.read().await;
        documents
            .iter()
            .filter(|doc| doc.property_id == property_id && !doc.is_deleted())
            .cloned()
            .collect()
    }

    pub async fn soft_delete_document(&self, id: Uuid, now: DateTime<Utc>) -> Option<Document> {
        let mut documents = self.documents.write().await;
        let doc = documents.iter_mut().find(|doc| doc.id == id)?;
        if doc.deleted_at.is_none() {
            doc.deleted_at = Some(now);
        }
        Some(doc.clone())
    }

    // ---- artifacts ----

    /// Allocates the next version for (property, kind) and stores the
    /// artifact in one critical section, so versions stay gap-free even when
    /// competing builds race.
    pub async fn append_artifact(
        &self,
        property_id: Uuid,
        kind: ArtifactKind,
        fingerprint: String,
        blob_key: String,
        built_by: Uuid,
    ) -> Artifact {
        let mut artifacts = self.artifacts.write().await;
        let version = artifacts
            .iter()
            .filter(|artifact| artifact.property_id == property_id && artifact.kind == kind)
            .map(|artifact| artifact.version)
            .max()
            .unwrap_or(0)
            + 1;
        let artifact = Artifact {
            id: Uuid::new_v4(),
            property_id,
            kind,
            version,
            fingerprint,
            blob_key,
            built_at: Utc::now(),
            built_by,
        };
        artifacts.push(artifact.clone());
        artifact
    }

    pub async fn latest_artifact(
        &self,
        property_id: Uuid,
        kind: ArtifactKind,
    ) -> Option<Artifact> {
        let artifacts = self.artifacts.read().await;
        artifacts
            .iter()
            .filter(|artifact| artifact.property_id == property_id && artifact.kind == kind)
            .max_by_key(|artifact| artifact.version)
            .cloned()
    }

    pub async fn artifact(&self, id: Uuid) -> Option<Artifact> {
        let artifacts = self.artifacts.read().await;
        artifacts.iter().find(|artifact| artifact.id == id).cloned()
    }

    // ---- invites ----

    pub async fn insert_invite(&self, invite: Invite) {
        let mut invites = self.invites.write().await;
        invites.insert(invite.token.clone(), invite);
    }

    pub async fn invite(&self, token: &str) -> Option<Invite> {
        let invites = self.invites.read().await;
        invites.get(token).cloned()
    }

    /// Applies `update` to the invite under the write lock and returns the
    /// updated copy; the closure sees the current state, so status checks
    /// inside it are race-free.
    pub async fn update_invite<F>(&self, token: &str, update: F) -> Option<Invite>
    where
        F: FnOnce(&mut Invite),
    {
        let mut invites = self.invites.write().await;
        let invite = invites.get_mut(token)?;
        update(invite);
        Some(invite.clone())
    }

    // ---- grants ----

    pub async fn grant_role(&self, user_id: Uuid, property_id: Uuid, role: Role) {
        let mut grants = self.grants.write().await;
        grants.insert((user_id, property_id), role);
    }

    pub async fn granted_role(&self, user_id: Uuid, property_id: Uuid) -> Option<Role> {
        let grants = self.grants.read().await;
        grants.get(&(user_id, property_id)).copied()
    }

    pub async fn granted_property_ids(&self, user_id: Uuid) -> Vec<Uuid> {
        let grants = self.grants.read().await;
        grants
            .keys()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, property)| *property)
            .collect()
    }

    // ---- pending uploads ----

    pub async fn insert_pending_upload(&self, upload: PendingUpload) {
        let mut pending = self.pending_uploads.write().await;
        pending.insert(upload.key.clone(), upload);
    }

    /// Removes and returns the pending upload for `key` when it belongs to
    /// `property_id`; completion is single-shot. A key presented against the
    /// wrong property leaves the record in place.
    pub async fn take_pending_upload(
        &self,
        key: &str,
        property_id: Uuid,
    ) -> Option<PendingUpload> {
        let mut pending = self.pending_uploads.write().await;
        if pending.get(key)?.property_id != property_id {
            return None;
        }
        pending.remove(key)
    }

    /// Drops expired pending uploads and returns them so the staged objects
    /// can be deleted.
    pub async fn sweep_expired_uploads(&self, now: DateTime<Utc>) -> Vec<PendingUpload> {
        let mut pending = self.pending_uploads.write().await;
        let expired_keys: Vec<String> = pending
            .values()
            .filter(|upload| upload.expires_at < now)
            .map(|upload| upload.key.clone())
            .collect();
        expired_keys
            .into_iter()
            .filter_map(|key| pending.remove(&key))
            .collect()
    }
}
