//! Permission lattices and resource-scoped grants.
//!
//! Two lattices live here as separate types:
//!
//! - [`Permission`] (`NONE < READ < WRITE < ADMINISTRATE`) is the ACL lattice used by
//!   scoped grants, access control entries and role-derived levels.
//! - [`ContentPermission`] (`NONE < READ < APPEND < WRITE`) is the legacy per-content lattice.
//!
//! They never compare with each other. The only bridge is
//! [`Permission::content_permission`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// ACL permission level. Ordered by declaration: `None < Read < Write < Administrate`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    #[default]
    None,
    Read,
    Write,
    Administrate,
}

impl Permission {
    /// All levels in ascending order.
    pub const ALL: [Self; 4] = [Self::None, Self::Read, Self::Write, Self::Administrate];

    /// Whether this (held) level satisfies `required`.
    #[must_use]
    pub fn at_least(self, required: Self) -> bool {
        self >= required
    }

    /// Position in the lattice, starting at zero for `None`.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Maps an ACL level onto the content lattice.
    ///
    /// `Administrate` covers everything a content lattice can express, so it maps to `Write`.
    /// Nothing maps to `Append`; a `Write` grant implies it through ordering.
    #[must_use]
    pub const fn content_permission(self) -> ContentPermission {
        match self {
            Self::None => ContentPermission::None,
            Self::Read => ContentPermission::Read,
            Self::Write | Self::Administrate => ContentPermission::Write,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Administrate => "ADMINISTRATE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legacy content permission level. Ordered by declaration: `None < Read < Append < Write`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentPermission {
    #[default]
    None,
    Read,
    Append,
    Write,
}

impl ContentPermission {
    #[must_use]
    pub fn at_least(self, required: Self) -> bool {
        self >= required
    }
}

/// A permission limited to a single resource instance.
///
/// Equality is structural over all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScopedPermission {
    pub resource_type: String,
    pub resource_id: String,
    pub permission: Permission,
}

impl ScopedPermission {
    #[must_use]
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        permission: Permission,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            permission,
        }
    }

    /// Whether this grant targets `(resource_type, resource_id)`.
    #[must_use]
    pub fn applies_to(&self, resource_type: &str, resource_id: &str) -> bool {
        self.resource_type == resource_type && self.resource_id == resource_id
    }
}
