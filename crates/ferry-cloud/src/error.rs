//! Error mapping between object_store and the core error kinds

use ferry_core::Error;

/// True when the backend reports the object or bucket as absent
pub(crate) fn is_not_found(err: &object_store::Error) -> bool {
    matches!(err, object_store::Error::NotFound { .. })
}

/// True when the backend refused to overwrite an existing object
pub(crate) fn is_already_exists(err: &object_store::Error) -> bool {
    matches!(err, object_store::Error::AlreadyExists { .. })
}

pub(crate) fn upload_error(err: object_store::Error) -> Error {
    Error::UploadFailed(err.to_string())
}
