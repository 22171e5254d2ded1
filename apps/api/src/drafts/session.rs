//! The typed draft session.
//!
//! # Wizard steps
//! - `Form`     — no form data yet
//! - `Template` — form filled, no template picked
//! - `Preview`  — both present; the résumé can be rendered and saved
//!
//! Loading a saved curriculum (edit or view from the dashboard) fills both
//! and records which record a later save should update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::curriculum::{CurriculumRow, FormData, TemplateId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Form,
    Template,
    Preview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub form: Option<FormData>,
    pub template: Option<TemplateId>,
    /// Set when the draft started from a saved record; saving updates it.
    pub editing_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl DraftSession {
    pub fn new(user_id: Uuid) -> Self {
        DraftSession {
            id: Uuid::new_v4(),
            user_id,
            form: None,
            template: None,
            editing_id: None,
            updated_at: Utc::now(),
        }
    }

    pub fn next_step(&self) -> WizardStep {
        match (&self.form, self.template) {
            (None, _) => WizardStep::Form,
            (Some(_), None) => WizardStep::Template,
            (Some(_), Some(_)) => WizardStep::Preview,
        }
    }

    pub fn set_form(&mut self, form: FormData) {
        self.form = Some(form);
        self.touch();
    }

    pub fn set_template(&mut self, template: TemplateId) {
        self.template = Some(template);
        self.touch();
    }

    /// Seeds the draft from a saved record so it can be edited or previewed.
    pub fn load_curriculum(&mut self, row: &CurriculumRow) {
        self.form = Some(row.form_data());
        self.template = Some(row.template());
        self.editing_id = Some(row.id);
        self.touch();
    }

    /// Both halves needed to render a preview.
    pub fn preview(&self) -> Result<(&FormData, TemplateId), AppError> {
        match (&self.form, self.template) {
            (Some(form), Some(template)) => Ok((form, template)),
            (None, _) => Err(AppError::UnprocessableEntity(
                "Draft has no form data yet; fill in the form first".to_string(),
            )),
            (Some(_), None) => Err(AppError::UnprocessableEntity(
                "Draft has no template selected yet".to_string(),
            )),
        }
    }

    /// Ownership check: a draft is only visible to the user who opened it.
    pub fn ensure_owner(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
