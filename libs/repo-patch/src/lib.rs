//! Secure partial updates.
//!
//! A JSON Patch document is applied to a serialized copy of a domain value. The result is
//! accepted only if every guarded field it changes is covered by the caller's authorities,
//! per the type's [`AuthorityPolicy`].
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod enforcer;
pub mod error;
pub mod json_patch;
pub mod policy;

pub use enforcer::{apply_patch, apply_patch_for};
pub use error::PatchError;
pub use json_patch::{JsonPatchError, Patch, PatchOperation};
pub use policy::{AuthorityPolicy, FieldPolicy, SecureUpdate};
