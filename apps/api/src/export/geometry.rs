//! Page geometry and slicing for paginated export.
//!
//! All page measurements are millimetres; slices are expressed in rows of the
//! rasterized buffer. The rasterized region is scaled to the printable width of
//! the page, so one page holds `buffer_width * content_height / content_width`
//! buffer rows.
//!
//! # Slicing policy
//! - `H <= rows_per_page` → one page holding the whole buffer.
//! - otherwise `ceil(H / rows_per_page)` slices of equal height, the last one
//!   possibly shorter. Slices tile `[0, H)` with no gap and no overlap.
//!
//! Breaks are not content-aware: a line of text can be cut across two pages.

use serde::{Deserialize, Serialize};

use crate::export::ExportError;

pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;
/// Margin used on every page, whether the export fits on one page or many.
pub const DEFAULT_MARGIN_MM: f32 = 5.0;
/// CSS reference pixels per millimetre (96 dpi).
pub const CSS_PX_PER_MM: f32 = 96.0 / 25.4;
pub const PT_PER_MM: f32 = 72.0 / 25.4;

// ────────────────────────────────────────────────────────────────────────────
// Page format
// ────────────────────────────────────────────────────────────────────────────

/// Fixed output page format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFormat {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
}

impl PageFormat {
    /// A4 portrait with the same margin on all four sides.
    pub fn a4_portrait(margin_mm: f32) -> Self {
        PageFormat {
            width_mm: A4_WIDTH_MM,
            height_mm: A4_HEIGHT_MM,
            margin_mm,
        }
    }

    pub fn content_width_mm(&self) -> f32 {
        self.width_mm - 2.0 * self.margin_mm
    }

    pub fn content_height_mm(&self) -> f32 {
        self.height_mm - 2.0 * self.margin_mm
    }

    /// Width in CSS pixels a region is laid out at before capture: the full
    /// page width at 96 dpi (794px for A4).
    pub fn canonical_width_px(&self) -> u32 {
        (self.width_mm * CSS_PX_PER_MM).round() as u32
    }

    pub fn width_pt(&self) -> f32 {
        self.width_mm * PT_PER_MM
    }

    pub fn height_pt(&self) -> f32 {
        self.height_mm * PT_PER_MM
    }
}

impl Default for PageFormat {
    fn default() -> Self {
        PageFormat::a4_portrait(DEFAULT_MARGIN_MM)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Slices
// ────────────────────────────────────────────────────────────────────────────

/// One page worth of buffer rows: `[y_start, y_start + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSlice {
    pub index: usize,
    pub y_start: u32,
    pub height: u32,
}

/// Where a slice image lands on its page, in PDF points from the bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x_pt: f32,
    pub y_pt: f32,
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSlice {
    pub fn y_end(&self) -> u32 {
        self.y_start + self.height
    }

    /// Places the slice at the top-left margin, scaled to the printable width.
    pub fn placement(&self, buffer_width_px: u32, format: &PageFormat) -> Placement {
        let width_mm = format.content_width_mm();
        let height_mm = self.height as f32 * width_mm / buffer_width_px as f32;
        Placement {
            x_pt: format.margin_mm * PT_PER_MM,
            y_pt: (format.height_mm - format.margin_mm - height_mm) * PT_PER_MM,
            width_pt: width_mm * PT_PER_MM,
            height_pt: height_mm * PT_PER_MM,
        }
    }
}

/// Buffer rows that fit in one page's printable area once the buffer is scaled
/// to the printable width. Aspect ratio is preserved.
pub fn page_content_height_px(buffer_width_px: u32, format: &PageFormat) -> f64 {
    buffer_width_px as f64 * (format.content_height_mm() as f64 / format.content_width_mm() as f64)
}

/// Partitions a `buffer_width_px × buffer_height_px` buffer into page slices.
pub fn plan_slices(
    buffer_width_px: u32,
    buffer_height_px: u32,
    format: &PageFormat,
) -> Result<Vec<PageSlice>, ExportError> {
    if buffer_width_px == 0 || buffer_height_px == 0 {
        return Err(ExportError::InvalidRegion(format!(
            "cannot paginate a {buffer_width_px}x{buffer_height_px} buffer"
        )));
    }
    if format.content_width_mm() <= 0.0 || format.content_height_mm() <= 0.0 {
        return Err(ExportError::Encoding(format!(
            "margin of {}mm leaves no printable area",
            format.margin_mm
        )));
    }

    let rows_per_page = (page_content_height_px(buffer_width_px, format).floor() as u32).max(1);

    if buffer_height_px <= rows_per_page {
        return Ok(vec![PageSlice {
            index: 0,
            y_start: 0,
            height: buffer_height_px,
        }]);
    }

    let page_count = buffer_height_px.div_ceil(rows_per_page);
    let slices = (0..page_count)
        .map(|i| {
            let y_start = i * rows_per_page;
            PageSlice {
                index: i as usize,
                y_start,
                height: rows_per_page.min(buffer_height_px - y_start),
            }
        })
        .collect();

    Ok(slices)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
