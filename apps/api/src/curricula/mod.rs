// Curriculum records: form validation, the document-store adapter and its routes.
// Records are always addressed through the owning user's id.

pub mod handlers;
pub mod store;
pub mod validation;

pub use validation::validate_form;
