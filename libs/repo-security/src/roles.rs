//! Role vocabulary and the system-wide permission level each role implies.

use std::str::FromStr;

use crate::permission::Permission;

/// Roles granted to interactive users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoUserRole {
    Administrator,
    Curator,
    User,
    Guest,
    NoAccess,
}

impl RepoUserRole {
    pub const ALL: [Self; 5] = [
        Self::Administrator,
        Self::Curator,
        Self::User,
        Self::Guest,
        Self::NoAccess,
    ];

    /// Authority string as carried in the `roles` claim.
    #[must_use]
    pub const fn authority(self) -> &'static str {
        match self {
            Self::Administrator => "ROLE_ADMINISTRATOR",
            Self::Curator => "ROLE_CURATOR",
            Self::User => "ROLE_USER",
            Self::Guest => "ROLE_GUEST",
            Self::NoAccess => "ROLE_NO_ACCESS",
        }
    }

    /// Resource-independent level this role grants.
    #[must_use]
    pub const fn permission(self) -> Permission {
        match self {
            Self::Administrator => Permission::Administrate,
            Self::Curator => Permission::Write,
            Self::User | Self::Guest => Permission::Read,
            Self::NoAccess => Permission::None,
        }
    }
}

impl FromStr for RepoUserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.authority() == s)
            .ok_or_else(|| UnknownRole(s.to_owned()))
    }
}

/// Roles granted to machine-to-machine service principals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoServiceRole {
    ServiceAdministrator,
    ServiceWrite,
    ServiceRead,
}

impl RepoServiceRole {
    pub const ALL: [Self; 3] = [
        Self::ServiceAdministrator,
        Self::ServiceWrite,
        Self::ServiceRead,
    ];

    #[must_use]
    pub const fn authority(self) -> &'static str {
        match self {
            Self::ServiceAdministrator => "ROLE_SERVICE_ADMINISTRATOR",
            Self::ServiceWrite => "ROLE_SERVICE_WRITE",
            Self::ServiceRead => "ROLE_SERVICE_READ",
        }
    }

    #[must_use]
    pub const fn permission(self) -> Permission {
        match self {
            Self::ServiceAdministrator => Permission::Administrate,
            Self::ServiceWrite => Permission::Write,
            Self::ServiceRead => Permission::Read,
        }
    }
}

impl FromStr for RepoServiceRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.authority() == s)
            .ok_or_else(|| UnknownRole(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

/// Level implied by a single authority string. Unknown authorities imply nothing.
#[must_use]
pub fn authority_permission(authority: &str) -> Permission {
    if let Ok(role) = authority.parse::<RepoUserRole>() {
        return role.permission();
    }
    authority
        .parse::<RepoServiceRole>()
        .map_or(Permission::None, RepoServiceRole::permission)
}

/// Highest level implied by any of `authorities`.
#[must_use]
pub fn highest_permission<'a, I>(authorities: I) -> Permission
where
    I: IntoIterator<Item = &'a String>,
{
    authorities
        .into_iter()
        .map(|a| authority_permission(a.as_str()))
        .max()
        .unwrap_or_default()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn user_roles_round_trip_through_authority_strings() {
        for role in RepoUserRole::ALL {
            assert_eq!(role.authority().parse::<RepoUserRole>(), Ok(role));
        }
        for role in RepoServiceRole::ALL {
            assert_eq!(role.authority().parse::<RepoServiceRole>(), Ok(role));
        }
    }

    #[test]
    fn unknown_authority_grants_nothing() {
        assert_eq!(authority_permission("ROLE_SUPERHERO"), Permission::None);
        assert_eq!(authority_permission("administrator"), Permission::None);
    }

    #[test]
    fn highest_permission_takes_maximum() {
        let roles = vec!["ROLE_GUEST".to_owned(), "ROLE_SERVICE_WRITE".to_owned()];
        assert_eq!(highest_permission(&roles), Permission::Write);
        assert_eq!(highest_permission(&Vec::<String>::new()), Permission::None);
    }
}
