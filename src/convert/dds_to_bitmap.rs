//! DDS image → bitmap tag with pixel data laid out for the target platform.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Converted, Diagnostic, FileOutcome};
use crate::dds::DdsFile;
use crate::tag::{read_tag_file, write_tag_file, TagData};
use crate::tags::bitmap::{Bitmap, BitmapData, BitmapSequence};
use crate::texture::{delinearize_texture, linearize_texture, BitmapPlane, Platform};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BitmapConvertOptions {
    pub platform: Platform,
    /// Swizzle uncompressed power-of-two images on Xbox.
    pub swizzle: bool,
    /// Keep the import settings of a bitmap tag that already exists at the destination.
    pub preserve_existing_settings: bool,
}

impl Default for BitmapConvertOptions {
    fn default() -> Self {
        Self {
            platform: Platform::Pc,
            swizzle: true,
            preserve_existing_settings: true,
        }
    }
}

fn target_plane(source: &BitmapPlane, mip_count: usize, options: &BitmapConvertOptions) -> BitmapPlane {
    let swizzled = options.platform == Platform::Xbox
        && options.swizzle
        && !source.is_compressed()
        && source.width.is_power_of_two()
        && source.height.is_power_of_two();
    BitmapPlane {
        mip_count,
        is_swizzled: swizzled,
        ..source.clone()
    }
}

/// Convert a parsed DDS file into a bitmap tag holding one image.
///
/// With `existing`, its settings and sequences are kept and only the pixel
/// data and image entry are replaced.
pub fn dds_to_bitmap(
    dds: &DdsFile,
    existing: Option<&Bitmap>,
    options: &BitmapConvertOptions,
) -> anyhow::Result<Converted<Bitmap>> {
    let mut diagnostics = Vec::new();

    let plane = dds.header.plane()?;
    let declared = dds.header.mip_levels();
    if declared > plane.mip_count {
        warn!(declared, levels = plane.mip_count, "DDS mip count exceeds the full chain");
        diagnostics.push(Diagnostic::warning(format!(
            "DDS declares {} mip levels but a {}x{} image has {}, extra levels dropped",
            declared, plane.width, plane.height, plane.mip_count
        )));
    }
    let linear = linearize_texture(&plane, &dds.data, Platform::Dds)?;
    if let Some(truncation) = linear.truncation {
        diagnostics.push(Diagnostic::warning(format!(
            "DDS declares {} mip levels but its data holds {}, extra levels dropped",
            truncation.declared, truncation.fitted
        )));
    }

    let target = target_plane(&plane, linear.mip_count, options);
    let pixels = delinearize_texture(&target, &linear.blocks, options.platform)?;
    let entry = BitmapData::from_plane(&target, 0, pixels.len() as u32);

    let mut bitmap = match existing {
        Some(existing) if options.preserve_existing_settings => existing.clone(),
        _ => Bitmap::default(),
    };
    bitmap.bitmap_type = entry.bitmap_type;
    bitmap.processed_pixel_data = TagData::new(pixels);
    bitmap.bitmaps = vec![entry].into();
    if bitmap.sequences.is_empty() {
        bitmap.sequences = vec![BitmapSequence {
            name: "default".into(),
            first_bitmap_index: 0,
            bitmap_count: 1,
        }]
        .into();
    } else {
        // older sequences may point past the single image
        for sequence in bitmap.sequences.iter_mut() {
            sequence.first_bitmap_index = 0;
            sequence.bitmap_count = 1;
        }
    }

    Ok(Converted {
        tag: bitmap,
        diagnostics,
    })
}

pub fn convert_dds_file(source: &Path, destination: &Path, options: &BitmapConvertOptions) -> anyhow::Result<FileOutcome> {
    let bytes = std::fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let dds = DdsFile::parse(&bytes).with_context(|| format!("Failed to parse DDS {}", source.display()))?;

    let existing = if options.preserve_existing_settings && destination.is_file() {
        Some(
            read_tag_file::<Bitmap>(destination)
                .with_context(|| format!("Failed to read existing bitmap {}", destination.display()))?,
        )
    } else {
        None
    };

    let converted = dds_to_bitmap(&dds, existing.as_ref(), options)?;
    write_tag_file(destination, &converted.tag)
        .with_context(|| format!("Failed to write {}", destination.display()))?;

    info!(
        path = %source.display(),
        platform = ?options.platform,
        bytes = converted.tag.processed_pixel_data.bytes.len(),
        "converted dds to bitmap"
    );
    Ok(FileOutcome::written(converted.diagnostics))
}
