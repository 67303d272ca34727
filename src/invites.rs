use chrono::{Duration as ChronoDuration, Utc};
use rand::{rngs::OsRng, RngCore};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthenticatedIdentity;
use crate::error::{AppError, AppResult};
use crate::models::{Invite, InviteStatus, Property, Role};
use crate::state::AppState;

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub async fn create(
    state: &AppState,
    property: &Property,
    email: &str,
    role: Role,
) -> AppResult<Invite> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }

    let now = Utc::now();
    let invite = Invite {
        token: generate_token(),
        property_id: property.id,
        email,
        role,
        status: InviteStatus::Pending,
        created_at: now,
        expires_at: now + ChronoDuration::days(state.config.invite_ttl_days),
        accepted_by: None,
    };
    state.registry.insert_invite(invite.clone()).await;

    // Email delivery is out of scope; the link is logged for development.
    info!(
        property_id = %property.id,
        email = %invite.email,
        link = %state.config.invite_link(&invite.token),
        "invite created"
    );

    Ok(invite)
}

/// Unknown tokens answer a bare 404 so callers cannot probe for property
/// existence.
pub async fn get(state: &AppState, token: &str) -> AppResult<Invite> {
    let invite = state
        .registry
        .invite(token)
        .await
        .ok_or_else(AppError::not_found)?;

    if invite.is_expired(Utc::now()) {
        return Err(AppError::gone("invite expired"));
    }

    Ok(invite)
}

/// Accepting transitions pending -> accepted and grants the invite's role
/// on the property. Only a pending invite can be accepted, and only by the
/// invited email.
pub async fn accept(
    state: &AppState,
    identity: &AuthenticatedIdentity,
    token: &str,
) -> AppResult<Uuid> {
    let invite = state
        .registry
        .invite(token)
        .await
        .ok_or_else(AppError::not_found)?;

    match invite.status {
        InviteStatus::Accepted => return Err(AppError::conflict("invite already accepted")),
        InviteStatus::Revoked => return Err(AppError::gone("invite revoked")),
        InviteStatus::Expired => return Err(AppError::gone("invite expired")),
        InviteStatus::Pending => {}
    }

    let now = Utc::now();
    if invite.is_expired(now) {
        state
            .registry
            .update_invite(token, |invite| invite.status = InviteStatus::Expired)
            .await;
        return Err(AppError::gone("invite expired"));
    }

    if !identity.email.eq_ignore_ascii_case(&invite.email) {
        return Err(AppError::new(
            axum::http::StatusCode::FORBIDDEN,
            "invite email mismatch",
        ));
    }

    let accepted = state
        .registry
        .update_invite(token, |stored| {
            // Re-check under the write lock; a concurrent accept may have
            // won the race.
            if stored.status == InviteStatus::Pending {
                stored.status = InviteStatus::Accepted;
                stored.accepted_by = Some(identity.user_id);
            }
        })
        .await
        .ok_or_else(AppError::not_found)?;

    if accepted.accepted_by != Some(identity.user_id) {
        return Err(AppError::conflict("invite already accepted"));
    }

    state
        .registry
        .grant_role(identity.user_id, invite.property_id, invite.role)
        .await;

    info!(
        property_id = %invite.property_id,
        user_id = %identity.user_id,
        role = ?invite.role,
        "invite accepted"
    );

    Ok(invite.property_id)
}

/// Explicit termination of a pending invite; terminal like acceptance.
pub async fn revoke(state: &AppState, token: &str) -> AppResult<Invite> {
    let invite = state
        .registry
        .invite(token)
        .await
        .ok_or_else(AppError::not_found)?;

    match invite.status {
        InviteStatus::Accepted => return Err(AppError::conflict("invite already accepted")),
        InviteStatus::Revoked | InviteStatus::Expired => return Ok(invite),
        InviteStatus::Pending => {}
    }

    state
        .registry
        .update_invite(token, |stored| {
            if stored.status == InviteStatus::Pending {
                stored.status = InviteStatus::Revoked;
            }
        })
        .await
        .ok_or_else(AppError::not_found)
}
