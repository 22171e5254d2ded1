use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

// ────────────────────────────────────────────────────────────────────────────
// Form sections
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub objective: String,
    /// Public URL of the profile photo in the blob store, if one was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub course: String,
    pub institution: String,
    #[serde(default)]
    pub start_year: String,
    #[serde(default)]
    pub end_year: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub role: String,
    pub company: String,
    #[serde(default)]
    pub start_year: String,
    #[serde(default)]
    pub end_year: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Course {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub institution: String,
    #[serde(default)]
    pub year: String,
}

/// Everything the multi-step form collects before a template is picked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormData {
    pub personal: PersonalInfo,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub courses: Vec<Course>,
    /// Comma-separated skills, exactly as typed.
    #[serde(default)]
    pub skills: String,
}

impl FormData {
    /// Returns a copy with blank repeated entries removed.
    ///
    /// The form always starts with one empty row per section, so an entry only
    /// counts once its headline field (course, role, course name) is filled.
    pub fn normalized(&self) -> FormData {
        FormData {
            personal: self.personal.clone(),
            education: self
                .education
                .iter()
                .filter(|e| !e.course.trim().is_empty())
                .cloned()
                .collect(),
            experience: self
                .experience
                .iter()
                .filter(|e| !e.role.trim().is_empty())
                .cloned()
                .collect(),
            courses: self
                .courses
                .iter()
                .filter(|c| !c.name.trim().is_empty())
                .cloned()
                .collect(),
            skills: self.skills.trim().to_string(),
        }
    }

    /// Splits the free-text skills field on commas, dropping empty items.
    pub fn skills_list(&self) -> Vec<String> {
        self.skills
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Templates
// ────────────────────────────────────────────────────────────────────────────

/// Visual templates a résumé can be rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateId {
    /// Traditional serif layout for corporate roles.
    Classico,
    /// Contemporary layout with accent colours.
    Moderno,
    /// Graphic layout for creative fields.
    Criativo,
}

impl TemplateId {
    pub const ALL: [TemplateId; 3] = [TemplateId::Classico, TemplateId::Moderno, TemplateId::Criativo];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::Classico => "classico",
            TemplateId::Moderno => "moderno",
            TemplateId::Criativo => "criativo",
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateId::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown template '{s}'"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stored record
// ────────────────────────────────────────────────────────────────────────────

/// A saved résumé as held by the document store.
///
/// Sections are JSONB columns; `model` holds the `TemplateId` as text.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CurriculumRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub model: String,
    pub personal_info: Json<PersonalInfo>,
    pub education: Json<Vec<Education>>,
    pub experience: Json<Vec<Experience>>,
    pub courses: Json<Vec<Course>>,
    pub skills: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CurriculumRow {
    /// Reassembles the form payload this record was saved from.
    pub fn form_data(&self) -> FormData {
        FormData {
            personal: self.personal_info.0.clone(),
            education: self.education.0.clone(),
            experience: self.experience.0.clone(),
            courses: self.courses.0.clone(),
            skills: self.skills.clone(),
        }
    }

    /// Parsed template id. Rows written by older clients may carry an unknown
    /// model; those fall back to the classic template.
    pub fn template(&self) -> TemplateId {
        self.model.parse().unwrap_or(TemplateId::Classico)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_form() -> FormData {
        FormData {
            personal: PersonalInfo {
                full_name: "Ana Souza".to_string(),
                email: "ana@example.com".to_string(),
                phone: "+55 11 99999-0000".to_string(),
                address: "São Paulo, SP".to_string(),
                objective: "Backend engineering".to_string(),
                photo_url: None,
            },
            education: vec![
                Education {
                    course: "Computer Science".to_string(),
                    institution: "USP".to_string(),
                    ..Default::default()
                },
                Education::default(),
            ],
            experience: vec![Experience {
                role: "   ".to_string(),
                ..Default::default()
            }],
            courses: vec![],
            skills: " Rust, SQL,, Docker ,".to_string(),
        }
    }

    #[test]
    fn test_normalized_drops_blank_entries() {
        let form = make_form().normalized();
        assert_eq!(form.education.len(), 1);
        assert_eq!(form.education[0].course, "Computer Science");
        assert!(form.experience.is_empty());
        assert_eq!(form.skills, "Rust, SQL,, Docker ,");
    }

    #[test]
    fn test_skills_list_splits_and_trims() {
        assert_eq!(make_form().skills_list(), vec!["Rust", "SQL", "Docker"]);
    }

    #[test]
    fn test_template_id_parses_known_names() {
        assert_eq!("moderno".parse::<TemplateId>(), Ok(TemplateId::Moderno));
        assert!("minimal".parse::<TemplateId>().is_err());
        assert_eq!(TemplateId::Criativo.to_string(), "criativo");
    }

    #[test]
    fn test_template_id_serializes_lowercase() {
        let json = serde_json::to_string(&TemplateId::Classico).unwrap();
        assert_eq!(json, "\"classico\"");
    }

    #[test]
    fn test_form_data_defaults_missing_sections() {
        let form: FormData = serde_json::from_value(serde_json::json!({
            "personal": {
                "full_name": "Ana",
                "email": "ana@example.com",
                "phone": "1",
                "address": "x",
                "objective": "y"
            }
        }))
        .unwrap();
        assert!(form.education.is_empty());
        assert!(form.skills.is_empty());
        assert!(form.personal.photo_url.is_none());
    }
}
