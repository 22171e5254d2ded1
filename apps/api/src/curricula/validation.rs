//! Required-field checks on submitted form data.
//!
//! A form passes when every personal field and the skills field is non-empty
//! and the email looks like an address. Repeated sections (education,
//! experience, courses) are optional; blank rows are dropped on save.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::curriculum::FormData;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    /// Names of required fields that were left empty.
    pub missing: Vec<String>,
    pub problems: Vec<String>,
}

impl ValidationReport {
    /// Converts a failed report into a `Validation` error listing every issue.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.passed {
            return Ok(());
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing required fields: {}", self.missing.join(", ")));
        }
        parts.extend(self.problems);
        Err(AppError::Validation(parts.join("; ")))
    }
}

pub fn validate_form(form: &FormData) -> ValidationReport {
    let personal = &form.personal;
    let required = [
        ("full_name", personal.full_name.as_str()),
        ("email", personal.email.as_str()),
        ("phone", personal.phone.as_str()),
        ("address", personal.address.as_str()),
        ("objective", personal.objective.as_str()),
        ("skills", form.skills.as_str()),
    ];

    let missing: Vec<String> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect();

    let mut problems = Vec::new();
    let email = personal.email.trim();
    if !email.is_empty() && !looks_like_email(email) {
        problems.push(format!("'{email}' is not a valid email address"));
    }
    if let Some(url) = personal.photo_url.as_deref() {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            problems.push("photo_url must be an http(s) URL".to_string());
        }
    }

    ValidationReport {
        passed: missing.is_empty() && problems.is_empty(),
        missing,
        problems,
    }
}

/// `local@domain.tld` with no whitespace; deliverability is not checked.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
