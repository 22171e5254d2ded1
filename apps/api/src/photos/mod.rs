//! Profile photos in the blob store.
//!
//! Photos live under `{user_id}/{uuid}.{ext}` in the configured bucket and are
//! referenced from `PersonalInfo::photo_url` by their public URL, which the
//! exporter later fetches as an embedded image.

pub mod handlers;

use uuid::Uuid;

use crate::errors::AppError;

pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Accepts `image/*` uploads up to 5 MB.
pub fn validate_photo(content_type: Option<&str>, len: usize) -> Result<(), AppError> {
    match content_type {
        Some(ct) if ct.starts_with("image/") => {}
        _ => {
            return Err(AppError::Validation(
                "Only image files can be used as a profile photo".to_string(),
            ))
        }
    }
    if len == 0 {
        return Err(AppError::Validation("Photo file is empty".to_string()));
    }
    if len > MAX_PHOTO_BYTES {
        return Err(AppError::Validation(format!(
            "Photo must be at most {} MB",
            MAX_PHOTO_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Object key for a new upload. The extension comes from the uploaded file
/// name, falling back to the content type's subtype.
pub fn photo_object_key(user_id: Uuid, file_name: Option<&str>, content_type: &str) -> String {
    let ext = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .or_else(|| content_type.strip_prefix("image/"))
        .unwrap_or("img")
        .to_ascii_lowercase();
    format!("{user_id}/{}.{ext}", Uuid::new_v4())
}

pub fn public_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", base.trim_end_matches('/'))
}

/// A key may only be removed by the user whose id prefixes it.
pub fn ensure_key_owner(user_id: Uuid, key: &str) -> Result<(), AppError> {
    let prefix = format!("{user_id}/");
    if key.starts_with(&prefix) && !key.contains("..") {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
