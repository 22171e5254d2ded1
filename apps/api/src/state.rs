use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::drafts::DraftStore;
use crate::export::{DocumentExporter, RegionRegistry};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Curriculum document store.
    pub db: PgPool,
    /// Blob store for profile photos.
    pub s3: S3Client,
    pub config: Config,
    /// Wizard drafts. Default: Redis-backed.
    pub drafts: Arc<dyn DraftStore>,
    /// Regions currently attached by the presentation layer.
    pub regions: RegionRegistry,
    /// Shares `regions` with the field above.
    pub exporter: Arc<DocumentExporter>,
}
