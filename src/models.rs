use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Roles granted either org-wide (on the user record) or per property
/// (through an accepted invite).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Agent,
    Seller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    TitleSearch,
    PoolSafety,
    SmokeAlarm,
    Supporting,
}

impl DocumentKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "title_search" => Some(Self::TitleSearch),
            "pool_safety" => Some(Self::PoolSafety),
            "smoke_alarm" => Some(Self::SmokeAlarm),
            "supporting" => Some(Self::Supporting),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TitleSearch => "title_search",
            Self::PoolSafety => "pool_safety",
            Self::SmokeAlarm => "smoke_alarm",
            Self::Supporting => "supporting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Form2,
    ServePack,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form2 => "form2",
            Self::ServePack => "serve_pack",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Form2 => "pdf",
            Self::ServePack => "zip",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Form2 => "application/pdf",
            Self::ServePack => "application/zip",
        }
    }
}

/// Identity record for a user the external auth provider has vouched for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub org_id: Uuid,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    pub address: String,
    /// Free-form lowercase type string ("house", "unit", "house_pool", ...).
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub property_id: Uuid,
    pub kind: DocumentKind,
    pub filename: String,
    pub sha256: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: Uuid,
    pub property_id: Uuid,
    pub kind: ArtifactKind,
    pub version: i32,
    pub fingerprint: String,
    pub blob_key: String,
    pub built_at: DateTime<Utc>,
    pub built_by: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub token: String,
    pub property_id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<Uuid>,
}

impl Invite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == InviteStatus::Pending && now > self.expires_at
    }
}

/// Upload issued through the presigned path but not yet completed. The
/// staged object lives under `key` until `complete` promotes or abandons it.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub key: String,
    pub property_id: Uuid,
    pub filename: String,
    pub kind: DocumentKind,
    pub size: i64,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::DocumentKind;

    #[test]
    fn parses_known_kinds() {
        assert_eq!(
            DocumentKind::parse("title_search"),
            Some(DocumentKind::TitleSearch)
        );
        assert_eq!(
            DocumentKind::parse(" pool_safety "),
            Some(DocumentKind::PoolSafety)
        );
        assert_eq!(DocumentKind::parse("certificate"), None);
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            DocumentKind::TitleSearch,
            DocumentKind::PoolSafety,
            DocumentKind::SmokeAlarm,
            DocumentKind::Supporting,
        ] {
            assert_eq!(DocumentKind::parse(kind.as_str()), Some(kind));
        }
    }
}
