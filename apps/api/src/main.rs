mod config;
mod curricula;
mod db;
mod drafts;
mod errors;
mod export;
mod models;
mod photos;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::drafts::RedisDraftStore;
use crate::export::{DocumentExporter, PageFormat, RegionRegistry, SnapshotRasterizer};
use crate::photos::public_url;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vitae API v{}", env!("CARGO_PKG_VERSION"));

    // Curriculum document store
    let db = create_pool(&config).await?;

    // Draft store
    let redis = redis::Client::open(config.redis_url.clone())?;
    let drafts = Arc::new(RedisDraftStore::new(redis, config.draft_ttl_secs));
    info!("Draft store ready (ttl {}s)", config.draft_ttl_secs);

    // Photo blob store
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Exporter
    let regions = RegionRegistry::new();
    let page_format = PageFormat::a4_portrait(config.export_margin_mm);
    // Embedded images are only fetched from the public photo bucket.
    let photo_origin = public_url(&config.s3_public_url, &config.s3_bucket, "");
    let rasterizer = Arc::new(SnapshotRasterizer::new(photo_origin)?);
    let exporter = Arc::new(DocumentExporter::new(
        regions.clone(),
        rasterizer,
        page_format,
        config.export_scale,
    ));
    info!(
        "Exporter: A4 {}mm margin, {}x raster scale, canonical width {}px",
        exporter.format().margin_mm,
        config.export_scale,
        exporter.format().canonical_width_px()
    );

    let state = AppState {
        db,
        s3,
        config: config.clone(),
        drafts,
        regions,
        exporter,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the deployed front-end

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "vitae-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not virtual host.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
