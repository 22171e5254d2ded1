//! PDF assembly: one page per slice, each page showing its slice as an image
//! XObject placed at the margin and scaled to the printable width.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::imageops;
use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::export::geometry::{PageFormat, PageSlice};
use crate::export::ExportError;

const PRODUCER: &str = concat!("vitae ", env!("CARGO_PKG_VERSION"));

/// Builds the paginated document for `buffer` and returns the serialized PDF.
pub fn assemble_document(
    buffer: &RgbaImage,
    slices: &[PageSlice],
    format: &PageFormat,
    title: &str,
) -> Result<Vec<u8>, ExportError> {
    if slices.is_empty() {
        return Err(ExportError::Encoding("no pages to assemble".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(slices.len());

    for slice in slices {
        if slice.y_end() > buffer.height() {
            return Err(ExportError::Encoding(format!(
                "slice {} ends at row {} past buffer height {}",
                slice.index,
                slice.y_end(),
                buffer.height()
            )));
        }
        let page_id = add_page(&mut doc, pages_id, buffer, slice, format)?;
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal(PRODUCER),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Encoding(format!("failed to write PDF: {e}")))?;
    Ok(out)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    buffer: &RgbaImage,
    slice: &PageSlice,
    format: &PageFormat,
) -> Result<ObjectId, ExportError> {
    let band = imageops::crop_imm(buffer, 0, slice.y_start, buffer.width(), slice.height).to_image();
    let image_id = doc.add_object(image_xobject(&band)?);

    let placement = slice.placement(buffer.width(), format);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    placement.width_pt.into(),
                    0_i64.into(),
                    0_i64.into(),
                    placement.height_pt.into(),
                    placement.x_pt.into(),
                    placement.y_pt.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ExportError::Encoding(format!("page {} content: {e}", slice.index)))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0_i64.into(),
            0_i64.into(),
            format.width_pt().into(),
            format.height_pt().into(),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });
    Ok(page_id)
}

/// Bytes of a packed RGB buffer, computed in `usize`.
fn rgb_len(width: u32, height: u32) -> usize {
    (width as usize).saturating_mul(height as usize).saturating_mul(3)
}

/// Encodes a band as a Flate-compressed DeviceRGB image. Transparent pixels
/// are composited over white since the page has no alpha channel.
fn image_xobject(band: &RgbaImage) -> Result<Stream, ExportError> {
    let mut rgb = Vec::with_capacity(rgb_len(band.width(), band.height()));
    for pixel in band.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        for channel in [r, g, b] {
            let over_white = (channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(over_white as u8);
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&rgb)
        .map_err(|e| ExportError::Encoding(format!("image compression failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| ExportError::Encoding(format!("image compression failed: {e}")))?;

    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => band.width() as i64,
            "Height" => band.height() as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "FlateDecode",
        },
        compressed,
    ))
}
