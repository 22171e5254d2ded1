// Wizard draft state: the form, the picked template and the record being
// edited, carried between wizard steps as one typed session in Redis.

pub mod handlers;
pub mod session;
pub mod store;

pub use store::{DraftStore, RedisDraftStore};
