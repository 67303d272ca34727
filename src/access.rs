use crate::auth::AuthenticatedIdentity;
use crate::error::{AppError, AppResult};
use crate::models::{Property, Role};
use crate::registry::Registry;

pub fn is_agent_or_admin(identity: &AuthenticatedIdentity) -> bool {
    identity
        .roles
        .iter()
        .any(|role| matches!(role, Role::Agent | Role::Admin))
}

/// Agents and admins act within their own org only.
pub fn ensure_org_agent(identity: &AuthenticatedIdentity, property: &Property) -> AppResult<()> {
    if identity.org_id == property.org_id && is_agent_or_admin(identity) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

/// Read access: org agents/admins, or anyone holding a per-property grant
/// (sellers arrive here through accepted invites).
pub async fn ensure_property_read(
    registry: &Registry,
    identity: &AuthenticatedIdentity,
    property: &Property,
) -> AppResult<()> {
    if identity.org_id == property.org_id && is_agent_or_admin(identity) {
        return Ok(());
    }
    if registry
        .granted_role(identity.user_id, property.id)
        .await
        .is_some()
    {
        return Ok(());
    }
    Err(AppError::forbidden())
}

/// Write access (document upload/delete): same population as read — sellers
/// granted onto a property supply its supporting documents.
pub async fn ensure_property_write(
    registry: &Registry,
    identity: &AuthenticatedIdentity,
    property: &Property,
) -> AppResult<()> {
    ensure_property_read(registry, identity, property).await
}
