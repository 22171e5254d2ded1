//! Axum route handlers for the Drafts API (wizard state between steps).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::curricula::handlers::UserIdQuery;
use crate::curricula::store::{create_curriculum, default_name, get_curriculum, update_curriculum};
use crate::curricula::validate_form;
use crate::drafts::session::{DraftSession, WizardStep};
use crate::errors::AppError;
use crate::models::curriculum::{CurriculumRow, FormData, TemplateId};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateDraftRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub template: TemplateId,
}

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub draft: DraftSession,
    pub next_step: WizardStep,
}

impl From<DraftSession> for DraftResponse {
    fn from(draft: DraftSession) -> Self {
        let next_step = draft.next_step();
        DraftResponse { draft, next_step }
    }
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub form: FormData,
    pub template: TemplateId,
    pub skills: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/drafts
pub async fn handle_create_draft(
    State(state): State<AppState>,
    Json(req): Json<CreateDraftRequest>,
) -> Result<(StatusCode, Json<DraftResponse>), AppError> {
    let draft = DraftSession::new(req.user_id);
    state.drafts.save(&draft).await?;
    info!("Opened draft {} for user {}", draft.id, draft.user_id);
    Ok((StatusCode::CREATED, Json(draft.into())))
}

/// GET /api/v1/drafts/:id
pub async fn handle_get_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DraftResponse>, AppError> {
    let draft = load_owned(&state, id, params.user_id).await?;
    Ok(Json(draft.into()))
}

/// PUT /api/v1/drafts/:id/form
pub async fn handle_put_form(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(form): Json<FormData>,
) -> Result<Json<DraftResponse>, AppError> {
    validate_form(&form).into_result()?;
    let mut draft = load_owned(&state, id, params.user_id).await?;
    draft.set_form(form);
    state.drafts.save(&draft).await?;
    Ok(Json(draft.into()))
}

/// PUT /api/v1/drafts/:id/template
pub async fn handle_put_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<TemplateRequest>,
) -> Result<Json<DraftResponse>, AppError> {
    let mut draft = load_owned(&state, id, params.user_id).await?;
    draft.set_template(req.template);
    state.drafts.save(&draft).await?;
    Ok(Json(draft.into()))
}

/// POST /api/v1/drafts/:id/edit/:curriculum_id
///
/// Seeds the draft from a saved curriculum; a later save updates that record.
pub async fn handle_edit_curriculum(
    State(state): State<AppState>,
    Path((id, curriculum_id)): Path<(Uuid, Uuid)>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DraftResponse>, AppError> {
    let mut draft = load_owned(&state, id, params.user_id).await?;
    let row = get_curriculum(&state.db, params.user_id, curriculum_id).await?;
    draft.load_curriculum(&row);
    state.drafts.save(&draft).await?;
    Ok(Json(draft.into()))
}

/// GET /api/v1/drafts/:id/preview
pub async fn handle_preview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<PreviewResponse>, AppError> {
    let draft = load_owned(&state, id, params.user_id).await?;
    let (form, template) = draft.preview()?;
    let form = form.normalized();
    Ok(Json(PreviewResponse {
        skills: form.skills_list(),
        form,
        template,
    }))
}

/// POST /api/v1/drafts/:id/save
///
/// Creates a curriculum (or updates the one being edited) and closes the draft.
pub async fn handle_save_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<(StatusCode, Json<CurriculumRow>), AppError> {
    let draft = load_owned(&state, id, params.user_id).await?;
    let (form, template) = draft.preview()?;
    validate_form(form).into_result()?;

    let (status, row) = match draft.editing_id {
        Some(curriculum_id) => {
            let row =
                update_curriculum(&state.db, draft.user_id, curriculum_id, None, template, form)
                    .await?;
            (StatusCode::OK, row)
        }
        None => {
            let name = default_name(template);
            let row = create_curriculum(&state.db, draft.user_id, &name, template, form).await?;
            (StatusCode::CREATED, row)
        }
    };

    state.drafts.discard(id).await?;
    info!("Draft {id} saved as curriculum {}", row.id);
    Ok((status, Json(row)))
}

/// DELETE /api/v1/drafts/:id
pub async fn handle_discard_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    load_owned(&state, id, params.user_id).await?;
    state.drafts.discard(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

async fn load_owned(state: &AppState, id: Uuid, user_id: Uuid) -> Result<DraftSession, AppError> {
    let draft = state
        .drafts
        .load(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Draft {id} not found or expired")))?;
    draft.ensure_owner(user_id)?;
    Ok(draft)
}
