//! Repository security model.
//!
//! - [`Token`] - a validated principal (user, service or temporary grant)
//! - [`AuthorizationContext`] - the per-request identity handed to business logic
//! - [`Permission`] / [`ContentPermission`] - the two permission lattices
//! - [`evaluator`] - "does this context hold at least P on (type, id)?"
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod context;
pub mod error;
pub mod evaluator;
pub mod permission;
pub mod roles;
pub mod token;

pub use context::{ANONYMOUS_PRINCIPAL, AuthorizationContext};
pub use error::TokenError;
pub use evaluator::{effective_permission, has_content_permission, has_permission};
pub use permission::{ContentPermission, Permission, ScopedPermission};
pub use roles::{RepoServiceRole, RepoUserRole};
pub use token::{
    Principal, ServicePrincipal, TemporaryPrincipal, Token, TokenParts, TokenVariant,
    UserPrincipal,
};
