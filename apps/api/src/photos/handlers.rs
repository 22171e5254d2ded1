//! Axum route handlers for profile-photo upload and removal.

use aws_sdk_s3::primitives::ByteStream;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::curricula::handlers::UserIdQuery;
use crate::errors::AppError;
use crate::photos::{ensure_key_owner, photo_object_key, public_url, validate_photo};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct DeletePhotoQuery {
    pub user_id: Uuid,
    pub key: String,
}

/// POST /api/v1/photos?user_id=
///
/// Multipart field `file`. Returns the object key and its public URL.
pub async fn handle_upload_photo(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PhotoResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read photo: {e}")))?;

        validate_photo(content_type.as_deref(), data.len())?;
        let content_type = content_type.unwrap_or_default();
        let key = photo_object_key(params.user_id, file_name.as_deref(), &content_type);

        state
            .s3
            .put_object()
            .bucket(&state.config.s3_bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(&content_type)
            .send()
            .await
            .map_err(|e| AppError::S3(format!("Photo upload failed: {e}")))?;

        let url = public_url(&state.config.s3_public_url, &state.config.s3_bucket, &key);
        info!("Uploaded profile photo s3://{}/{}", state.config.s3_bucket, key);
        return Ok((StatusCode::CREATED, Json(PhotoResponse { key, url })));
    }

    Err(AppError::Validation("Field 'file' is required".to_string()))
}

/// DELETE /api/v1/photos?user_id=&key=
pub async fn handle_delete_photo(
    State(state): State<AppState>,
    Query(params): Query<DeletePhotoQuery>,
) -> Result<StatusCode, AppError> {
    ensure_key_owner(params.user_id, &params.key)?;

    state
        .s3
        .delete_object()
        .bucket(&state.config.s3_bucket)
        .key(&params.key)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("Photo removal failed: {e}")))?;

    info!("Removed profile photo s3://{}/{}", state.config.s3_bucket, params.key);
    Ok(StatusCode::NO_CONTENT)
}
