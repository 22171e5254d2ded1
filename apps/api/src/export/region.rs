//! Attached render regions and scoped presentation overrides.
//!
//! The presentation layer attaches a rendered region (a snapshot bitmap plus the
//! style it is displayed with) under an id. The exporter borrows a region for
//! the duration of one call: it swaps in a print style through a [`StyleGuard`]
//! and the guard puts the original style back when it is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::export::ExportError;

pub const WHITE: [u8; 4] = [255, 255, 255, 255];
/// Padding applied around the content while printing, in CSS px.
pub const PRINT_PADDING_PX: u32 = 20;

/// Largest pixel buffer a single capture may allocate (256 MB of RGBA).
pub const MAX_BUFFER_PIXELS: u64 = 64_000_000;

/// Bounds on client-supplied style values, in CSS px.
pub const MAX_PADDING_PX: u32 = 1_000;
pub const MAX_WIDTH_PX: u32 = 10_000;
pub const MAX_SHADOW_OFFSET_PX: u32 = 1_000;

/// Default registry limits. The oldest attachment is evicted past either one.
pub const MAX_ATTACHED_REGIONS: usize = 64;
pub const MAX_ATTACHED_PIXELS: u64 = 64_000_000;

// ────────────────────────────────────────────────────────────────────────────
// Style
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxShadow {
    pub offset_x: u32,
    pub offset_y: u32,
    pub color: [u8; 4],
}

/// Presentation attributes of a region that affect how it is captured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionStyle {
    /// RGBA background; `None` is transparent.
    #[serde(default)]
    pub background: Option<[u8; 4]>,
    #[serde(default)]
    pub padding_px: u32,
    #[serde(default)]
    pub shadow: Option<BoxShadow>,
    /// Fixed outer width in CSS px; `None` sizes the region to its snapshot.
    #[serde(default)]
    pub width_px: Option<u32>,
}

impl RegionStyle {
    /// Print presentation: white background, no shadow, print padding and the
    /// page's canonical width.
    pub fn print(canonical_width_px: u32) -> Self {
        RegionStyle {
            background: Some(WHITE),
            padding_px: PRINT_PADDING_PX,
            shadow: None,
            width_px: Some(canonical_width_px),
        }
    }

    /// Rejects values that no real presentation uses.
    pub fn check_bounds(&self) -> Result<(), ExportError> {
        if self.padding_px > MAX_PADDING_PX {
            return Err(ExportError::InvalidRegion(format!(
                "padding {}px exceeds {MAX_PADDING_PX}px",
                self.padding_px
            )));
        }
        if let Some(width) = self.width_px.filter(|w| *w > MAX_WIDTH_PX) {
            return Err(ExportError::InvalidRegion(format!(
                "width {width}px exceeds {MAX_WIDTH_PX}px"
            )));
        }
        if let Some(shadow) = self.shadow {
            if shadow.offset_x.max(shadow.offset_y) > MAX_SHADOW_OFFSET_PX {
                return Err(ExportError::InvalidRegion(format!(
                    "shadow offset exceeds {MAX_SHADOW_OFFSET_PX}px"
                )));
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Region
// ────────────────────────────────────────────────────────────────────────────

/// An externally hosted image drawn on top of the snapshot at capture time,
/// e.g. a profile photo. Coordinates are snapshot pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    pub url: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Laid-out extent of a region under its current style, in CSS px.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionLayout {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub content_width: u32,
    pub content_height: u32,
    /// Snapshot px → content px.
    pub content_scale: f32,
}

impl RegionLayout {
    /// Pixels of the buffer a capture at `scale`× allocates.
    pub fn buffer_pixels(&self, scale: u32) -> u64 {
        let scale = scale as u64;
        self.width as u64 * scale * self.height as u64 * scale
    }
}

#[derive(Debug, Clone)]
pub struct RenderRegion {
    pub id: String,
    pub style: RegionStyle,
    pub visible: bool,
    pub snapshot: Arc<RgbaImage>,
    pub embedded: Vec<EmbeddedImage>,
}

impl RenderRegion {
    pub fn new(id: impl Into<String>, snapshot: RgbaImage) -> Self {
        RenderRegion {
            id: id.into(),
            style: RegionStyle::default(),
            visible: true,
            snapshot: Arc::new(snapshot),
            embedded: Vec::new(),
        }
    }

    /// Computes the region's box. The snapshot is scaled uniformly so that it
    /// fills the content width left after padding.
    pub fn layout(&self) -> RegionLayout {
        let padding = self.style.padding_px;
        let snap_w = self.snapshot.width();
        let snap_h = self.snapshot.height();

        let content_width = match self.style.width_px {
            Some(w) => w.saturating_sub(padding.saturating_mul(2)),
            None => snap_w,
        };
        let content_scale = if snap_w == 0 {
            0.0
        } else {
            content_width as f32 / snap_w as f32
        };
        let content_height = (snap_h as f32 * content_scale).round() as u32;

        RegionLayout {
            width: content_width.saturating_add(padding.saturating_mul(2)),
            height: content_height.saturating_add(padding.saturating_mul(2)),
            padding,
            content_width,
            content_height,
            content_scale,
        }
    }

    pub fn snapshot_pixels(&self) -> u64 {
        self.snapshot.width() as u64 * self.snapshot.height() as u64
    }

    /// Rejects a region whose capture at `scale`× would exceed [`MAX_BUFFER_PIXELS`].
    pub fn ensure_within_budget(&self, scale: u32) -> Result<RegionLayout, ExportError> {
        let layout = self.layout();
        let pixels = layout.buffer_pixels(scale);
        if pixels > MAX_BUFFER_PIXELS {
            return Err(ExportError::InvalidRegion(format!(
                "region '{}' is {}x{}px; a {scale}x capture needs {pixels} pixels, limit is {MAX_BUFFER_PIXELS}",
                self.id, layout.width, layout.height
            )));
        }
        Ok(layout)
    }

    /// Rejects regions that cannot produce any pixels, or too many.
    pub fn ensure_capturable(&self) -> Result<RegionLayout, ExportError> {
        if !self.visible {
            return Err(ExportError::InvalidRegion(format!(
                "region '{}' is not visible",
                self.id
            )));
        }
        let layout = self.layout();
        if layout.content_width == 0 || layout.content_height == 0 {
            return Err(ExportError::InvalidRegion(format!(
                "region '{}' has an empty {}x{} content box",
                self.id, layout.content_width, layout.content_height
            )));
        }
        self.ensure_within_budget(1)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

/// Distinguishes successive attachments under the same id.
static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// An attached region plus the style it had before the first active override.
struct Slot {
    region: RenderRegion,
    epoch: u64,
    saved_style: Option<RegionStyle>,
    overrides: usize,
}

/// Regions currently attached by the presentation layer, keyed by id.
/// Cloning shares the same set.
///
/// Attachments are bounded by count and by total snapshot pixels; attaching
/// past either limit evicts the oldest other regions.
#[derive(Clone)]
pub struct RegionRegistry {
    inner: Arc<Mutex<HashMap<String, Slot>>>,
    max_regions: usize,
    max_pixels: u64,
}

impl Default for RegionRegistry {
    fn default() -> Self {
        Self::with_limits(MAX_ATTACHED_REGIONS, MAX_ATTACHED_PIXELS)
    }
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_regions: usize, max_pixels: u64) -> Self {
        RegionRegistry {
            inner: Arc::default(),
            max_regions: max_regions.max(1),
            max_pixels,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        // A panic elsewhere must not take export down with it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a region, replacing any region previously attached under its id.
    pub fn attach(&self, region: RenderRegion) -> Option<RenderRegion> {
        let slot = Slot {
            region,
            epoch: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
            saved_style: None,
            overrides: 0,
        };
        let id = slot.region.id.clone();
        let mut slots = self.lock();
        let previous = slots.insert(id.clone(), slot).map(|previous| previous.region);
        self.evict_over_limits(&mut slots, &id);
        previous
    }

    fn evict_over_limits(&self, slots: &mut HashMap<String, Slot>, keep: &str) {
        loop {
            let pixels: u64 = slots.values().map(|slot| slot.region.snapshot_pixels()).sum();
            if slots.len() <= self.max_regions && pixels <= self.max_pixels {
                return;
            }
            let oldest = slots
                .iter()
                .filter(|(id, _)| id.as_str() != keep)
                .min_by_key(|(_, slot)| slot.epoch)
                .map(|(id, _)| id.clone());
            let Some(oldest) = oldest else {
                return;
            };
            slots.remove(&oldest);
            info!("Evicted region '{oldest}' ({} attached, {pixels} px)", slots.len());
        }
    }

    pub fn detach(&self, id: &str) -> Option<RenderRegion> {
        self.lock().remove(id).map(|slot| slot.region)
    }

    /// Returns a copy of the region. The snapshot bitmap is shared, not copied.
    pub fn get(&self, id: &str) -> Option<RenderRegion> {
        self.lock().get(id).map(|slot| slot.region.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the region's style with `style` until the returned guard drops.
    ///
    /// Overlapping overrides share one saved style; it is put back when the
    /// last guard goes away.
    pub fn override_style(&self, id: &str, style: RegionStyle) -> Result<StyleGuard, ExportError> {
        let mut slots = self.lock();
        let slot = slots
            .get_mut(id)
            .ok_or_else(|| ExportError::NotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut slot.region.style, style);
        if slot.overrides == 0 {
            slot.saved_style = Some(previous);
        }
        slot.overrides += 1;
        Ok(StyleGuard {
            registry: self.clone(),
            id: id.to_string(),
            epoch: slot.epoch,
        })
    }

    fn release(&self, id: &str, epoch: u64) {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(id).filter(|slot| slot.epoch == epoch) else {
            return;
        };
        slot.overrides = slot.overrides.saturating_sub(1);
        if slot.overrides == 0 {
            if let Some(original) = slot.saved_style.take() {
                slot.region.style = original;
            }
        }
    }
}

/// Restores a region's original style on drop, on every exit path.
///
/// If the region was detached (or replaced) while overridden there is nothing
/// to restore.
pub struct StyleGuard {
    registry: RegionRegistry,
    id: String,
    epoch: u64,
}

impl StyleGuard {
    pub fn region_id(&self) -> &str {
        &self.id
    }
}

impl Drop for StyleGuard {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.epoch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn make_region(w: u32, h: u32) -> RenderRegion {
        let mut region = RenderRegion::new("preview", RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])));
        region.style = RegionStyle {
            background: Some([240, 240, 240, 255]),
            padding_px: 32,
            shadow: Some(BoxShadow {
                offset_x: 0,
                offset_y: 8,
                color: [0, 0, 0, 64],
            }),
            width_px: None,
        };
        region
    }

    #[test]
    fn test_layout_without_fixed_width_uses_snapshot() {
        let layout = make_region(600, 900).layout();
        assert_eq!(layout.content_width, 600);
        assert_eq!(layout.content_height, 900);
        assert_eq!(layout.width, 664);
        assert_eq!(layout.height, 964);
        assert_eq!(layout.content_scale, 1.0);
    }

    #[test]
    fn test_print_layout_scales_to_canonical_width() {
        let mut region = make_region(377, 1000);
        region.style = RegionStyle::print(794);
        let layout = region.layout();
        assert_eq!(layout.width, 794);
        assert_eq!(layout.content_width, 754);
        assert_eq!(layout.content_height, 2000);
        assert_eq!(layout.height, 2040);
    }

    #[test]
    fn test_zero_height_region_not_capturable() {
        let region = make_region(600, 0);
        assert!(matches!(region.ensure_capturable(), Err(ExportError::InvalidRegion(_))));
    }

    #[test]
    fn test_hidden_region_not_capturable() {
        let mut region = make_region(600, 900);
        region.visible = false;
        assert!(matches!(region.ensure_capturable(), Err(ExportError::InvalidRegion(_))));
    }

    #[test]
    fn test_width_smaller_than_padding_not_capturable() {
        let mut region = make_region(600, 900);
        region.style.width_px = Some(40);
        assert!(region.ensure_capturable().is_err());
    }

    #[test]
    fn test_tall_sliver_rejected_under_print_style() {
        let mut region = RenderRegion::new("p", RgbaImage::new(1, 100_000));
        assert!(region.ensure_capturable().is_ok());
        region.style = RegionStyle::print(794);
        assert!(matches!(region.ensure_capturable(), Err(ExportError::InvalidRegion(_))));
    }

    #[test]
    fn test_budget_accounts_for_scale() {
        // Laid out at 4000x4000: 16M px at 1x, 64M px at 2x, 144M px at 3x.
        let mut region = RenderRegion::new("big", RgbaImage::new(40, 40));
        region.style.width_px = Some(4000);
        assert!(region.ensure_within_budget(2).is_ok());
        assert!(region.ensure_within_budget(3).is_err());
    }

    #[test]
    fn test_huge_padding_layout_saturates() {
        let mut region = make_region(600, 900);
        region.style.padding_px = 3_000_000_000;
        region.style.width_px = Some(794);
        let layout = region.layout();
        assert_eq!(layout.content_width, 0);
        assert_eq!(layout.width, u32::MAX);
        assert!(region.ensure_capturable().is_err());
        assert!(region.style.check_bounds().is_err());
    }

    #[test]
    fn test_check_bounds_accepts_screen_and_print_styles() {
        assert!(make_region(1, 1).style.check_bounds().is_ok());
        assert!(RegionStyle::print(794).check_bounds().is_ok());
        let wide = RegionStyle {
            width_px: Some(MAX_WIDTH_PX + 1),
            ..RegionStyle::default()
        };
        assert!(wide.check_bounds().is_err());
    }

    #[test]
    fn test_registry_evicts_oldest_past_region_cap() {
        let registry = RegionRegistry::with_limits(2, u64::MAX);
        for id in ["a", "b", "c"] {
            registry.attach(RenderRegion::new(id, RgbaImage::new(1, 1)));
        }
        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_none());
        assert!(registry.get("c").is_some());
    }

    #[test]
    fn test_registry_evicts_past_pixel_cap() {
        let registry = RegionRegistry::with_limits(10, 250);
        for id in ["a", "b", "c"] {
            registry.attach(RenderRegion::new(id, RgbaImage::new(10, 10)));
        }
        assert_eq!(registry.len(), 2);
        assert!(registry.get("a").is_none());

        // Replacing an attached id never evicts the others.
        registry.attach(RenderRegion::new("b", RgbaImage::new(10, 10)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_guard_restores_style_byte_identical() {
        let registry = RegionRegistry::new();
        registry.attach(make_region(600, 900));
        let before = serde_json::to_vec(&registry.get("preview").unwrap().style).unwrap();

        {
            let guard = registry.override_style("preview", RegionStyle::print(794)).unwrap();
            assert_eq!(guard.region_id(), "preview");
            assert_eq!(registry.get("preview").unwrap().style, RegionStyle::print(794));
        }

        let after = serde_json::to_vec(&registry.get("preview").unwrap().style).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_guard_restores_after_early_return() {
        fn fails_midway(registry: &RegionRegistry) -> Result<(), ExportError> {
            let _guard = registry.override_style("preview", RegionStyle::print(794))?;
            Err(ExportError::Rasterization("capture backend crashed".to_string()))
        }

        let registry = RegionRegistry::new();
        registry.attach(make_region(600, 900));
        let original = registry.get("preview").unwrap().style;

        assert!(fails_midway(&registry).is_err());
        assert_eq!(registry.get("preview").unwrap().style, original);
    }

    #[test]
    fn test_overlapping_guards_restore_original_in_any_order() {
        let registry = RegionRegistry::new();
        registry.attach(make_region(600, 900));
        let original = registry.get("preview").unwrap().style;

        let first = registry.override_style("preview", RegionStyle::print(794)).unwrap();
        let second = registry.override_style("preview", RegionStyle::print(794)).unwrap();
        drop(first);
        assert_eq!(registry.get("preview").unwrap().style, RegionStyle::print(794));
        drop(second);
        assert_eq!(registry.get("preview").unwrap().style, original);
    }

    #[test]
    fn test_reattach_while_overridden_keeps_new_style() {
        let registry = RegionRegistry::new();
        registry.attach(make_region(600, 900));
        let guard = registry.override_style("preview", RegionStyle::print(794)).unwrap();

        let mut replacement = make_region(300, 300);
        replacement.style = RegionStyle::default();
        registry.attach(replacement);
        drop(guard);

        assert_eq!(registry.get("preview").unwrap().style, RegionStyle::default());
    }

    #[test]
    fn test_override_missing_region_is_not_found() {
        let registry = RegionRegistry::new();
        assert!(matches!(
            registry.override_style("nope", RegionStyle::default()),
            Err(ExportError::NotFound(_))
        ));
    }

    #[test]
    fn test_guard_tolerates_detach_while_held() {
        let registry = RegionRegistry::new();
        registry.attach(make_region(600, 900));
        let guard = registry.override_style("preview", RegionStyle::print(794)).unwrap();
        registry.detach("preview");
        drop(guard);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_attach_replaces_same_id() {
        let registry = RegionRegistry::new();
        assert!(registry.attach(make_region(10, 10)).is_none());
        let previous = registry.attach(make_region(20, 20)).unwrap();
        assert_eq!(previous.snapshot.width(), 10);
        assert_eq!(registry.len(), 1);
    }
}
