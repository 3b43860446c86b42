// Role and ownership checks applied after a session has been established.

use anyhow::Result;
use quill_core::errors::QuillError;
use tracing::debug;

use crate::user::{Identity, Role};

pub fn require_role(identity: &Identity, role: Role) -> Result<()> {
    if identity.role() == role {
        return Ok(());
    }
    debug!(user = identity.id(), have = %identity.role(), need = %role, "role check failed");
    Err(QuillError::forbidden("Admin access required").into_anyhow())
}

pub fn require_admin(identity: &Identity) -> Result<()> {
    require_role(identity, Role::Admin)
}

/// Allow the user themself or any admin.
pub fn require_self_or_admin(identity: &Identity, target_user_id: &str) -> Result<()> {
    if identity.id() == target_user_id || identity.is_admin() {
        return Ok(());
    }
    debug!(user = identity.id(), target = target_user_id, "ownership check failed");
    Err(QuillError::forbidden("You can only modify your own account").into_anyhow())
}

/// Only admins may set a role field on any account.
pub fn ensure_can_assign_role(identity: &Identity) -> Result<()> {
    if identity.is_admin() {
        return Ok(());
    }
    Err(QuillError::forbidden("Only admins can change roles").into_anyhow())
}
