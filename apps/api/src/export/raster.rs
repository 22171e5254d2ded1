//! Rasterization of a render region into a pixel buffer.
//!
//! `Rasterizer` is the seam between the exporter and the capture backend;
//! `SnapshotRasterizer` is the default backend. It composes the region's box
//! from its snapshot bitmap and style, and fetches embedded images over HTTP.
//!
//! Only URLs under the configured image origin (the public photo bucket) are
//! fetched. An embedded image that is refused, cannot be fetched or cannot be
//! decoded is left blank and logged. It never fails the capture.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{ImageReader, ImageResult, Limits, Rgba, RgbaImage};
use reqwest::{redirect, Client, Url};
use tracing::{debug, warn};

use crate::export::region::{EmbeddedImage, RegionLayout, RenderRegion, MAX_BUFFER_PIXELS};
use crate::export::ExportError;
use crate::photos::MAX_PHOTO_BYTES;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Decoded size cap for embedded images, in pixels per side.
const MAX_EMBEDDED_SIDE_PX: u32 = 4_096;

/// Decodes `raw` into RGBA, refusing images larger than `max_side` on either
/// side or needing more than `max_alloc` bytes.
pub(crate) fn decode_limited(raw: &[u8], max_side: u32, max_alloc: u64) -> ImageResult<RgbaImage> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(max_side);
    limits.max_image_height = Some(max_side);
    limits.max_alloc = Some(max_alloc);

    let mut reader = ImageReader::new(Cursor::new(raw)).with_guessed_format()?;
    reader.limits(limits);
    Ok(reader.decode()?.to_rgba8())
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Captures `region` at `scale`× its laid-out size. The returned buffer is
    /// `(layout.width * scale, layout.height * scale)`.
    async fn rasterize(&self, region: &RenderRegion, scale: u32) -> Result<RgbaImage, ExportError>;
}

pub struct SnapshotRasterizer {
    http: Client,
    /// URL prefix every embedded image must start with, e.g.
    /// `https://cdn.example.com/profile-photos/`.
    image_origin: String,
}

impl SnapshotRasterizer {
    pub fn new(image_origin: impl Into<String>) -> Result<Self, ExportError> {
        let http = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| ExportError::Rasterization(format!("HTTP client setup failed: {e}")))?;
        let image_origin: String = image_origin.into();
        let mut image_origin = Url::parse(&image_origin)
            .map(|url| url.to_string())
            .unwrap_or(image_origin);
        if !image_origin.ends_with('/') {
            image_origin.push('/');
        }
        Ok(SnapshotRasterizer { http, image_origin })
    }

    /// Parses `url` and accepts it only when it is http(s) and, once
    /// normalized, lies under the image origin.
    fn allowed_url(&self, url: &str) -> Option<Url> {
        let parsed = Url::parse(url).ok()?;
        let scheme_ok = matches!(parsed.scheme(), "http" | "https");
        (scheme_ok && parsed.as_str().starts_with(&self.image_origin)).then_some(parsed)
    }

    /// Downloads and decodes one embedded image. Any failure yields `None`.
    async fn fetch_image(&self, url: &str) -> Option<RgbaImage> {
        let Some(allowed) = self.allowed_url(url) else {
            warn!("Embedded image {url} is outside {}; rendering blank", self.image_origin);
            return None;
        };
        let response = match self.http.get(allowed).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Embedded image {url} returned HTTP {}; rendering blank", r.status());
                return None;
            }
            Err(e) => {
                warn!("Embedded image {url} unreachable ({e}); rendering blank");
                return None;
            }
        };
        if response.content_length().is_some_and(|len| len > MAX_PHOTO_BYTES as u64) {
            warn!("Embedded image {url} is larger than {MAX_PHOTO_BYTES} bytes; rendering blank");
            return None;
        }
        let bytes = match response.bytes().await {
            Ok(b) if b.len() <= MAX_PHOTO_BYTES => b,
            Ok(_) => {
                warn!("Embedded image {url} is larger than {MAX_PHOTO_BYTES} bytes; rendering blank");
                return None;
            }
            Err(e) => {
                warn!("Embedded image {url} body read failed ({e}); rendering blank");
                return None;
            }
        };
        let max_alloc = MAX_EMBEDDED_SIDE_PX as u64 * MAX_EMBEDDED_SIDE_PX as u64 * 4;
        match decode_limited(&bytes, MAX_EMBEDDED_SIDE_PX, max_alloc) {
            Ok(img) => Some(img),
            Err(e) => {
                warn!("Embedded image {url} could not be decoded ({e}); rendering blank");
                None
            }
        }
    }
}

#[async_trait]
impl Rasterizer for SnapshotRasterizer {
    async fn rasterize(&self, region: &RenderRegion, scale: u32) -> Result<RgbaImage, ExportError> {
        region.ensure_capturable()?;
        let layout = region.ensure_within_budget(scale)?;

        let mut fetched = Vec::with_capacity(region.embedded.len());
        for embedded in &region.embedded {
            if let Some(img) = self.fetch_image(&embedded.url).await {
                fetched.push((embedded.clone(), img));
            }
        }
        debug!(
            "Rasterizing region '{}' at {}x ({} of {} embedded images available)",
            region.id,
            scale,
            fetched.len(),
            region.embedded.len()
        );

        let region = region.clone();
        tokio::task::spawn_blocking(move || compose(&region, layout, scale, &fetched))
            .await
            .map_err(|e| ExportError::Rasterization(format!("capture task failed: {e}")))?
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Composition (runs inside spawn_blocking)
// ────────────────────────────────────────────────────────────────────────────

/// Paints the region's box: background, shadow band, snapshot, embedded images.
pub(crate) fn compose(
    region: &RenderRegion,
    layout: RegionLayout,
    scale: u32,
    embedded: &[(EmbeddedImage, RgbaImage)],
) -> Result<RgbaImage, ExportError> {
    if scale == 0 {
        return Err(ExportError::Rasterization("scale must be at least 1".to_string()));
    }
    if layout.buffer_pixels(scale) > MAX_BUFFER_PIXELS {
        return Err(ExportError::InvalidRegion(format!(
            "{}x{} at {}x exceeds {MAX_BUFFER_PIXELS} pixels",
            layout.width, layout.height, scale
        )));
    }
    let width = layout.width * scale;
    let height = layout.height * scale;

    let background = region.style.background.unwrap_or([0, 0, 0, 0]);
    let mut buffer = RgbaImage::from_pixel(width, height, Rgba(background));

    if let Some(shadow) = region.style.shadow {
        paint_shadow_band(
            &mut buffer,
            shadow.offset_x.saturating_mul(scale),
            shadow.offset_y.saturating_mul(scale),
            shadow.color,
        );
    }

    let content_w = layout.content_width * scale;
    let content_h = layout.content_height * scale;
    let origin = (layout.padding * scale) as i64;
    let content = if (content_w, content_h) == region.snapshot.dimensions() {
        region.snapshot.as_ref().clone()
    } else {
        imageops::resize(region.snapshot.as_ref(), content_w, content_h, FilterType::Triangle)
    };
    imageops::overlay(&mut buffer, &content, origin, origin);

    // Snapshot px → buffer px.
    let factor = layout.content_scale * scale as f32;
    for (placement, img) in embedded {
        let w = (placement.width as f32 * factor).round() as u32;
        let h = (placement.height as f32 * factor).round() as u32;
        if w == 0 || h == 0 || w > width || h > height {
            continue;
        }
        let resized = imageops::resize(img, w, h, FilterType::Triangle);
        let x = origin + (placement.x as f32 * factor).round() as i64;
        let y = origin + (placement.y as f32 * factor).round() as i64;
        imageops::overlay(&mut buffer, &resized, x, y);
    }

    Ok(buffer)
}

/// Blends a shadow tint over the right and bottom edges of the buffer.
fn paint_shadow_band(buffer: &mut RgbaImage, band_x: u32, band_y: u32, color: [u8; 4]) {
    let (width, height) = buffer.dimensions();
    let tint = Rgba(color);
    for (x, y, pixel) in buffer.enumerate_pixels_mut() {
        let in_right = band_x > 0 && x >= width.saturating_sub(band_x);
        let in_bottom = band_y > 0 && y >= height.saturating_sub(band_y);
        if in_right || in_bottom {
            image::Pixel::blend(pixel, &tint);
        }
    }
}
