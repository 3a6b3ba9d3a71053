//! Field-level authority policies.

use std::collections::BTreeSet;

/// Roles permitted to change one top-level field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPolicy {
    field: String,
    allowed: BTreeSet<String>,
}

impl FieldPolicy {
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Empty for a field nobody may change.
    #[must_use]
    pub fn allowed_roles(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    /// Whether any of `authorities` may change the field.
    #[must_use]
    pub fn permits<I, S>(&self, authorities: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        authorities
            .into_iter()
            .any(|a| self.allowed.contains(a.as_ref()))
    }
}

/// Per-type table of guarded fields, in declaration order.
///
/// Fields without an entry are open to every caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityPolicy {
    fields: Vec<FieldPolicy>,
}

impl AuthorityPolicy {
    #[must_use]
    pub fn builder() -> AuthorityPolicyBuilder {
        AuthorityPolicyBuilder::default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldPolicy> {
        self.fields.iter()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldPolicy> {
        self.fields.iter().find(|p| p.field == field)
    }

    #[must_use]
    pub fn is_guarded(&self, field: &str) -> bool {
        self.get(field).is_some()
    }
}

#[derive(Debug, Default)]
pub struct AuthorityPolicyBuilder {
    fields: Vec<FieldPolicy>,
}

impl AuthorityPolicyBuilder {
    /// Guards `field`, allowing changes by any of `roles`. Redeclaring a field replaces it.
    #[must_use]
    pub fn field<I, S>(mut self, field: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let policy = FieldPolicy {
            field: field.into(),
            allowed: roles.into_iter().map(Into::into).collect(),
        };
        match self.fields.iter_mut().find(|p| p.field == policy.field) {
            Some(existing) => *existing = policy,
            None => self.fields.push(policy),
        }
        self
    }

    /// Guards `field` against every caller.
    #[must_use]
    pub fn forbidden(self, field: impl Into<String>) -> Self {
        self.field(field, std::iter::empty::<String>())
    }

    #[must_use]
    pub fn build(self) -> AuthorityPolicy {
        AuthorityPolicy {
            fields: self.fields,
        }
    }
}

/// A domain type whose top-level fields are guarded by a static [`AuthorityPolicy`].
///
/// ```ignore
/// static POLICY: LazyLock<AuthorityPolicy> = LazyLock::new(|| {
///     AuthorityPolicy::builder()
///         .forbidden("id")
///         .field("state", ["ROLE_ADMINISTRATOR"])
///         .build()
/// });
///
/// impl SecureUpdate for DataResource {
///     fn authority_policy() -> &'static AuthorityPolicy {
///         &POLICY
///     }
/// }
/// ```
pub trait SecureUpdate {
    fn authority_policy() -> &'static AuthorityPolicy;
}
