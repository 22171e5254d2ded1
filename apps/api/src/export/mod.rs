//! Document export: turns an attached render region into a paginated A4 PDF.
//!
//! Flow of one export:
//! 1. look up the region, reject hidden or empty ones before any capture
//! 2. swap in the print style under a `StyleGuard`, rasterize at `scale`×
//! 3. drop the guard (original style back), plan equal-height slices
//! 4. assemble one PDF page per slice inside `spawn_blocking`
//!
//! No retry, no timeout and no de-duplication: two concurrent exports of the
//! same region run independently.

pub mod document;
pub mod geometry;
pub mod handlers;
pub mod raster;
pub mod region;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

pub use geometry::{plan_slices, PageFormat};
pub use raster::{Rasterizer, SnapshotRasterizer};
pub use region::{RegionRegistry, RegionStyle};

use region::{RegionLayout, RenderRegion};

/// Oversampling factor used for print-quality captures.
pub const DEFAULT_RASTER_SCALE: u32 = 2;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("referenced region does not exist: {0}")]
    NotFound(String),

    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("rasterization failed: {0}")]
    Rasterization(String),

    #[error("encoding failed: {0}")]
    Encoding(String),
}

/// A finished export, ready to be delivered as a download.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Download name for an export: the requested name plus `.pdf`.
pub fn artifact_file_name(file_name: &str) -> String {
    format!("{file_name}.pdf")
}

pub struct DocumentExporter {
    regions: RegionRegistry,
    rasterizer: Arc<dyn Rasterizer>,
    format: PageFormat,
    scale: u32,
}

impl DocumentExporter {
    pub fn new(
        regions: RegionRegistry,
        rasterizer: Arc<dyn Rasterizer>,
        format: PageFormat,
        scale: u32,
    ) -> Self {
        DocumentExporter {
            regions,
            rasterizer,
            format,
            scale: scale.max(1),
        }
    }

    pub fn format(&self) -> &PageFormat {
        &self.format
    }

    fn print_style(&self) -> RegionStyle {
        RegionStyle::print(self.format.canonical_width_px())
    }

    /// Checks that `region` stays within the capture budget both as attached
    /// and under the print style at this exporter's scale. Visibility and
    /// emptiness are not checked here.
    pub fn ensure_within_budget(&self, region: &RenderRegion) -> Result<RegionLayout, ExportError> {
        region.style.check_bounds()?;
        region.ensure_within_budget(1)?;
        let mut printed = region.clone();
        printed.style = self.print_style();
        printed.ensure_within_budget(self.scale)
    }

    pub async fn export(&self, region_id: &str, file_name: &str) -> Result<ExportArtifact, ExportError> {
        let region = self
            .regions
            .get(region_id)
            .ok_or_else(|| ExportError::NotFound(region_id.to_string()))?;
        region.ensure_capturable()?;
        self.ensure_within_budget(&region)?;

        let buffer = {
            let guard = self.regions.override_style(region_id, self.print_style())?;
            debug!("Print style applied to region '{}'", guard.region_id());
            let normalized = self
                .regions
                .get(region_id)
                .ok_or_else(|| ExportError::NotFound(region_id.to_string()))?;
            self.rasterizer.rasterize(&normalized, self.scale).await?
        };

        let slices = plan_slices(buffer.width(), buffer.height(), &self.format)?;
        let page_count = slices.len();
        info!(
            "Region '{region_id}' captured at {}x{}px, paginating into {page_count} page(s)",
            buffer.width(),
            buffer.height()
        );

        let format = self.format;
        let title = file_name.to_string();
        let bytes = tokio::task::spawn_blocking(move || {
            document::assemble_document(&buffer, &slices, &format, &title)
        })
        .await
        .map_err(|e| ExportError::Encoding(format!("assembly task failed: {e}")))??;

        Ok(ExportArtifact {
            file_name: artifact_file_name(file_name),
            bytes,
            page_count,
        })
    }
}
