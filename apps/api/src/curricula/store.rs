//! Document-store adapter for saved curricula.
//!
//! Backing table `curricula`: `id uuid pk, user_id uuid, name text, model text,
//! personal_info jsonb, education jsonb, experience jsonb, courses jsonb,
//! skills text, created_at timestamptz, updated_at timestamptz`.
//! Every query is scoped by `user_id`; a record owned by someone else is
//! indistinguishable from a missing one.

use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::curriculum::{CurriculumRow, FormData, TemplateId};

/// Default record name, e.g. `Currículo moderno`.
pub fn default_name(template: TemplateId) -> String {
    format!("Currículo {template}")
}

pub async fn create_curriculum(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    template: TemplateId,
    form: &FormData,
) -> Result<CurriculumRow, AppError> {
    let form = form.normalized();
    let row: CurriculumRow = sqlx::query_as(
        r#"
        INSERT INTO curricula
            (id, user_id, name, model, personal_info, education, experience, courses, skills)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .bind(template.as_str())
    .bind(Json(&form.personal))
    .bind(Json(&form.education))
    .bind(Json(&form.experience))
    .bind(Json(&form.courses))
    .bind(&form.skills)
    .fetch_one(pool)
    .await?;

    info!("Created curriculum {} for user {user_id}", row.id);
    Ok(row)
}

/// Newest first, matching the dashboard listing.
pub async fn list_curricula(pool: &PgPool, user_id: Uuid) -> Result<Vec<CurriculumRow>, AppError> {
    let rows = sqlx::query_as("SELECT * FROM curricula WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_curriculum(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<CurriculumRow, AppError> {
    sqlx::query_as("SELECT * FROM curricula WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Curriculum {id} not found")))
}

pub async fn update_curriculum(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
    name: Option<&str>,
    template: TemplateId,
    form: &FormData,
) -> Result<CurriculumRow, AppError> {
    let form = form.normalized();
    let row: Option<CurriculumRow> = sqlx::query_as(
        r#"
        UPDATE curricula
        SET name = COALESCE($3, name),
            model = $4,
            personal_info = $5,
            education = $6,
            experience = $7,
            courses = $8,
            skills = $9,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(template.as_str())
    .bind(Json(&form.personal))
    .bind(Json(&form.education))
    .bind(Json(&form.experience))
    .bind(Json(&form.courses))
    .bind(&form.skills)
    .fetch_optional(pool)
    .await?;

    let row = row.ok_or_else(|| AppError::NotFound(format!("Curriculum {id} not found")))?;
    info!("Updated curriculum {id} for user {user_id}");
    Ok(row)
}

pub async fn delete_curriculum(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM curricula WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Curriculum {id} not found")));
    }
    info!("Deleted curriculum {id} for user {user_id}");
    Ok(())
}
