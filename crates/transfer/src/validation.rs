use std::path::{Component, Path};

use crate::{TransferError, TransferSpec};

/// Validates the file name declared at session initiation.
///
/// The server stores it as metadata only, so it must be a single plain name:
/// - not empty
/// - not absolute
/// - no `..`, directory separators or Windows prefixes
pub fn validate_file_name(file_name: &str) -> Result<(), TransferError> {
    if file_name.is_empty() {
        return Err(TransferError::InvalidFileName("empty file name".into()));
    }

    let path = Path::new(file_name);
    if path.is_absolute() {
        return Err(TransferError::InvalidFileName(format!(
            "absolute path not allowed: {file_name}"
        )));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) | (Some(_), Some(Component::ParentDir)) => Err(
            TransferError::InvalidFileName(format!("parent directory not allowed: {file_name}")),
        ),
        (Some(Component::Prefix(_)), _) | (Some(Component::RootDir), _) => Err(
            TransferError::InvalidFileName(format!("absolute path not allowed: {file_name}")),
        ),
        _ => Err(TransferError::InvalidFileName(format!(
            "expected a bare file name: {file_name}"
        ))),
    }
}

/// Checks a [`TransferSpec`] before any request is made.
pub fn validate_spec(spec: &TransferSpec) -> Result<(), TransferError> {
    if spec.chunk_size == 0 {
        return Err(TransferError::InvalidConfig(
            "chunk size must be at least 1 byte".into(),
        ));
    }
    if spec.max_attempts == 0 {
        return Err(TransferError::InvalidConfig(
            "max attempts must be at least 1".into(),
        ));
    }
    if !spec.backoff_base.is_finite() || spec.backoff_base <= 1.0 {
        return Err(TransferError::InvalidConfig(format!(
            "backoff base must be greater than 1 second, got {}",
            spec.backoff_base
        )));
    }
    if spec.content_type.trim().is_empty() {
        return Err(TransferError::InvalidConfig("content type is empty".into()));
    }
    if spec.name.trim().is_empty() {
        return Err(TransferError::InvalidConfig("display name is empty".into()));
    }
    validate_file_name(&spec.file_name)
}
