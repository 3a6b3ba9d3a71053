use http::StatusCode;
use thiserror::Error;

use crate::json_patch::JsonPatchError;

/// Failure of a secure patch. The original value is never modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    /// The patch document could not be applied or its result does not fit the target type.
    #[error("patch could not be applied: {0}")]
    PatchApplication(String),

    /// The patch changes a field the caller may not change.
    #[error("update of field '{field}' is forbidden")]
    UpdateForbidden { field: String },
}

impl PatchError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::PatchApplication(_) => StatusCode::BAD_REQUEST,
            Self::UpdateForbidden { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl From<JsonPatchError> for PatchError {
    fn from(e: JsonPatchError) -> Self {
        Self::PatchApplication(e.to_string())
    }
}
