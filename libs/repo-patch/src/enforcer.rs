//! Secure patch enforcement.

use repo_security::AuthorizationContext;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::PatchError;
use crate::json_patch::Patch;
use crate::policy::SecureUpdate;

/// Applies `patch` to `original` and returns the patched value.
///
/// Every guarded field whose value differs between `original` and the patched result must be
/// permitted by at least one of `authorities`. The scan follows the policy's declaration order
/// and stops at the first violation. `original` is never modified.
///
/// # Errors
///
/// - [`PatchError::PatchApplication`] when the patch fails or its result does not fit `T`
/// - [`PatchError::UpdateForbidden`] naming the first guarded field the caller may not change
pub fn apply_patch<T, I, S>(original: &T, patch: &Patch, authorities: I) -> Result<T, PatchError>
where
    T: SecureUpdate + Serialize + DeserializeOwned,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let before = to_tree(original)?;
    let patched = patch.apply(&before)?;
    let candidate: T = serde_json::from_value(patched)
        .map_err(|e| PatchError::PatchApplication(format!("patched document does not fit: {e}")))?;

    // Compare against the re-serialized candidate: fields `T` does not know are gone.
    let after = to_tree(&candidate)?;
    let authorities: Vec<String> = authorities
        .into_iter()
        .map(|a| a.as_ref().to_owned())
        .collect();

    for policy in T::authority_policy().fields() {
        let field = policy.field();
        if before.get(field) == after.get(field) {
            continue;
        }
        if !policy.permits(&authorities) {
            tracing::debug!(field, "patch touches a field the caller may not change");
            return Err(PatchError::UpdateForbidden {
                field: field.to_owned(),
            });
        }
    }
    Ok(candidate)
}

/// [`apply_patch`] with the authorities of `ctx`.
///
/// # Errors
///
/// See [`apply_patch`].
pub fn apply_patch_for<T>(
    original: &T,
    patch: &Patch,
    ctx: &AuthorizationContext,
) -> Result<T, PatchError>
where
    T: SecureUpdate + Serialize + DeserializeOwned,
{
    apply_patch(original, patch, ctx.authorities())
}

fn to_tree<T: Serialize>(value: &T) -> Result<Value, PatchError> {
    serde_json::to_value(value)
        .map_err(|e| PatchError::PatchApplication(format!("value is not serializable: {e}")))
}
