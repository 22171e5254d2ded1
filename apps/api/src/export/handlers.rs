//! Axum route handlers for region registration and document export.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::raster::decode_limited;
use crate::export::region::{EmbeddedImage, RegionStyle, RenderRegion};
use crate::state::AppState;

/// Decode limits for uploaded snapshots.
const MAX_SNAPSHOT_SIDE_PX: u32 = 16_384;
const MAX_SNAPSHOT_BYTES_DECODED: u64 = 16_000_000 * 4;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RegionResponse {
    pub region_id: String,
    pub style: RegionStyle,
    pub visible: bool,
    pub width: u32,
    pub height: u32,
}

impl From<&RenderRegion> for RegionResponse {
    fn from(region: &RenderRegion) -> Self {
        let layout = region.layout();
        RegionResponse {
            region_id: region.id.clone(),
            style: region.style.clone(),
            visible: region.visible,
            width: layout.width,
            height: layout.height,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub region_id: String,
    pub file_name: String,
}

/// Fields collected from a region upload before the snapshot is decoded.
#[derive(Default)]
struct RegionUpload {
    id: Option<String>,
    style: Option<RegionStyle>,
    embedded: Vec<EmbeddedImage>,
    visible: Option<bool>,
    snapshot: Option<bytes::Bytes>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/regions
///
/// Multipart fields: `snapshot` (PNG/JPEG, required), `id`, `style` (JSON),
/// `embedded` (JSON array), `visible` (`true`/`false`).
pub async fn handle_attach_region(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RegionResponse>), AppError> {
    let mut upload = RegionUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;

        match name.as_str() {
            "snapshot" => upload.snapshot = Some(data),
            "id" => upload.id = Some(field_text(&name, &data)?.trim().to_string()),
            "style" => upload.style = Some(field_json(&name, &data)?),
            "embedded" => upload.embedded = field_json(&name, &data)?,
            "visible" => {
                upload.visible = Some(field_text(&name, &data)?.trim().parse().map_err(|_| {
                    AppError::Validation("Field 'visible' must be true or false".to_string())
                })?)
            }
            _ => {}
        }
    }

    let raw = upload
        .snapshot
        .ok_or_else(|| AppError::Validation("Field 'snapshot' is required".to_string()))?;
    let snapshot = tokio::task::spawn_blocking(move || {
        decode_limited(&raw, MAX_SNAPSHOT_SIDE_PX, MAX_SNAPSHOT_BYTES_DECODED)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("snapshot decode task failed: {e}")))?
    .map_err(|e| AppError::Validation(format!("Snapshot is not a readable image: {e}")))?;

    let id = upload
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut region = RenderRegion::new(id, snapshot);
    region.style = upload.style.unwrap_or_default();
    region.embedded = upload.embedded;
    region.visible = upload.visible.unwrap_or(true);
    state
        .exporter
        .ensure_within_budget(&region)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let response = RegionResponse::from(&region);
    if state.regions.attach(region).is_some() {
        info!("Replaced region '{}'", response.region_id);
    } else {
        info!(
            "Attached region '{}' ({}x{})",
            response.region_id, response.width, response.height
        );
    }

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/v1/regions/:id
pub async fn handle_get_region(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RegionResponse>, AppError> {
    let region = state
        .regions
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Region {id} not found")))?;
    Ok(Json(RegionResponse::from(&region)))
}

/// DELETE /api/v1/regions/:id
pub async fn handle_detach_region(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .regions
        .detach(&id)
        .ok_or_else(|| AppError::NotFound(format!("Region {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/export
///
/// Responds with the PDF as an attachment named `{file_name}.pdf`.
pub async fn handle_export(
    State(state): State<AppState>,
    Json(request): Json<ExportRequest>,
) -> Result<Response, AppError> {
    if request.file_name.trim().is_empty() {
        return Err(AppError::Validation("file_name must not be empty".to_string()));
    }

    let artifact = state
        .exporter
        .export(&request.region_id, &request.file_name)
        .await?;
    info!(
        "Exported region '{}' as {} ({} page(s), {} bytes)",
        request.region_id,
        artifact.file_name,
        artifact.page_count,
        artifact.bytes.len()
    );

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.file_name),
        ),
        (
            HeaderName::from_static("x-page-count"),
            artifact.page_count.to_string(),
        ),
    ];
    Ok((StatusCode::OK, headers, artifact.bytes).into_response())
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

fn field_text<'a>(name: &str, data: &'a [u8]) -> Result<&'a str, AppError> {
    std::str::from_utf8(data)
        .map_err(|_| AppError::Validation(format!("Field '{name}' must be UTF-8 text")))
}

fn field_json<T: serde::de::DeserializeOwned>(name: &str, data: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(data)
        .map_err(|e| AppError::Validation(format!("Field '{name}' is not valid JSON: {e}")))
}

/// `attachment` disposition with an ASCII fallback name and the exact UTF-8
/// name in `filename*`.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded: String = file_name
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect();
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
