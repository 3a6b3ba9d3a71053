//! Scoped permission evaluation.
//!
//! User and service principals are judged by their roles alone: a role implies a
//! system-wide level, independent of the resource instance. Temporary principals are
//! judged by their scoped grants alone: a grant for one instance says nothing about any other.

use crate::context::AuthorizationContext;
use crate::permission::{ContentPermission, Permission};
use crate::roles::highest_permission;
use crate::token::Principal;

/// Permission `ctx` holds on `(resource_type, resource_id)`.
#[must_use]
pub fn effective_permission(
    ctx: &AuthorizationContext,
    resource_type: &str,
    resource_id: &str,
) -> Permission {
    let Some(token) = ctx.token() else {
        return Permission::None;
    };

    match token.principal() {
        Principal::User(_) | Principal::Service(_) => highest_permission(token.authorities()),
        Principal::Temporary(_) => ctx
            .scoped_permission(resource_type, resource_id)
            .map_or(Permission::None, |p| p.permission),
    }
}

/// Whether `ctx` holds at least `required` on `(resource_type, resource_id)`.
#[must_use]
pub fn has_permission(
    ctx: &AuthorizationContext,
    resource_type: &str,
    resource_id: &str,
    required: Permission,
) -> bool {
    let held = effective_permission(ctx, resource_type, resource_id);
    let granted = held.at_least(required);
    tracing::trace!(
        principal = ctx.principal_name(),
        resource_type,
        resource_id,
        %held,
        %required,
        granted,
        "evaluated scoped permission"
    );
    granted
}

/// Content-lattice check, bridged through [`Permission::content_permission`].
#[must_use]
pub fn has_content_permission(
    ctx: &AuthorizationContext,
    resource_type: &str,
    resource_id: &str,
    required: ContentPermission,
) -> bool {
    effective_permission(ctx, resource_type, resource_id)
        .content_permission()
        .at_least(required)
}
