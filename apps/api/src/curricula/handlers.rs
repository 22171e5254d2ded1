//! Axum route handlers for the Curricula API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::curricula::store::{
    create_curriculum, default_name, delete_curriculum, get_curriculum, list_curricula,
    update_curriculum,
};
use crate::curricula::validate_form;
use crate::errors::AppError;
use crate::models::curriculum::{CurriculumRow, FormData, TemplateId};
use crate::state::AppState;

/// The caller's identity as resolved by the upstream auth provider.
#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SaveCurriculumRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub template: TemplateId,
    pub form: FormData,
}

/// GET /api/v1/curricula
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<CurriculumRow>>, AppError> {
    Ok(Json(list_curricula(&state.db, params.user_id).await?))
}

/// POST /api/v1/curricula
pub async fn handle_create(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<SaveCurriculumRequest>,
) -> Result<(StatusCode, Json<CurriculumRow>), AppError> {
    validate_form(&req.form).into_result()?;
    let name = req
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| default_name(req.template));
    let row = create_curriculum(&state.db, params.user_id, &name, req.template, &req.form).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/curricula/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<CurriculumRow>, AppError> {
    Ok(Json(get_curriculum(&state.db, params.user_id, id).await?))
}

/// PUT /api/v1/curricula/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<SaveCurriculumRequest>,
) -> Result<Json<CurriculumRow>, AppError> {
    validate_form(&req.form).into_result()?;
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let row = update_curriculum(&state.db, params.user_id, id, name, req.template, &req.form).await?;
    Ok(Json(row))
}

/// DELETE /api/v1/curricula/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    delete_curriculum(&state.db, params.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
