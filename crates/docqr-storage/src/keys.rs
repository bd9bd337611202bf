//! Shared validation for container names and object keys.
//!
//! Keys are flat names such as `{document_id}.pdf`; both backends reject anything
//! that could escape its container.

use crate::StorageError;

fn validate_segment(kind: &str, value: &str) -> Result<(), StorageError> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{} must not be empty", kind)));
    }

    if value.starts_with('/')
        || value.starts_with('\\')
        || value.contains('\0')
        || value.split(['/', '\\']).any(|part| part == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "{} contains invalid characters",
            kind
        )));
    }

    Ok(())
}

pub fn validate_container(container: &str) -> Result<(), StorageError> {
    validate_segment("Container name", container)?;
    if container.contains(['/', '\\']) {
        return Err(StorageError::InvalidKey(
            "Container name must be a single path segment".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_key(key: &str) -> Result<(), StorageError> {
    validate_segment("Storage key", key)
}
