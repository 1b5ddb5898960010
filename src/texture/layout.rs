use tracing::warn;

use super::{swizzle, BitmapPlane, Platform, CUBE_STORED_TO_CANONICAL};
use crate::error::{Result, TagError};

/// Pixels of one (mip, face) pair, linear row order, canonical face index.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBlock {
    pub mip: usize,
    pub face: usize,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipTruncation {
    pub declared: usize,
    pub fitted: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearizedTexture {
    /// Sorted by `(mip, face)`.
    pub blocks: Vec<PixelBlock>,
    /// Effective mip count, including the base level.
    pub mip_count: usize,
    pub truncation: Option<MipTruncation>,
}

struct Span {
    mip: usize,
    face: usize,
    offset: usize,
    len: usize,
}

fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

fn canonical_face(plane: &BitmapPlane, slot: usize, platform: Platform) -> usize {
    if plane.is_cubemap && platform.uses_stored_face_order() {
        CUBE_STORED_TO_CANONICAL[slot]
    } else {
        slot
    }
}

/// Byte spans of every block in storage order, plus the padded total size.
fn layout(plane: &BitmapPlane, mip_count: usize, platform: Platform) -> (Vec<Span>, usize) {
    let order: Vec<(usize, usize)> = if platform.is_face_major() {
        (0..plane.face_count)
            .flat_map(|slot| (0..mip_count).map(move |mip| (mip, slot)))
            .collect()
    } else {
        (0..mip_count)
            .flat_map(|mip| (0..plane.face_count).map(move |slot| (mip, slot)))
            .collect()
    };

    let mut offset = 0;
    let mut spans = Vec::with_capacity(order.len());
    for (mip, slot) in order {
        let len = plane.mip_size(mip);
        spans.push(Span {
            mip,
            face: canonical_face(plane, slot, platform),
            offset,
            len,
        });
        offset = align_up(offset + len, platform.alignment());
    }
    (spans, offset)
}

fn needs_swizzle(plane: &BitmapPlane, platform: Platform) -> bool {
    platform == Platform::Xbox && plane.is_swizzled && !plane.is_compressed()
}

/// Largest mip count, at most the declared one, whose data fits in `len` bytes.
///
/// Every block starts aligned and the last block of a `k`-level layout is
/// always one of level `k - 1`, in either nesting order, so the data end is
/// known from running sums without building each layout.
pub fn fit_mip_count(plane: &BitmapPlane, len: usize, platform: Platform) -> Result<usize> {
    plane.validate()?;
    let alignment = platform.alignment();
    let mut fitted = 0;
    let mut padded = 0;
    for mip in 0..plane.mip_count {
        let size = plane.mip_size(mip);
        let stride = align_up(size, alignment);
        padded += stride * plane.face_count;
        let data_end = padded - (stride - size);
        if data_end > len {
            break;
        }
        fitted = mip + 1;
    }
    if fitted == 0 {
        return Err(TagError::MalformedInput(format!(
            "pixel data is {} bytes, too small for the {}x{} base level",
            len, plane.width, plane.height
        )));
    }
    Ok(fitted)
}

/// Split a platform pixel buffer into per-(mip, face) blocks.
///
/// A declared mip count that overruns the buffer is reduced to the largest
/// count that fits and reported in [`LinearizedTexture::truncation`].
pub fn linearize_texture(plane: &BitmapPlane, buffer: &[u8], platform: Platform) -> Result<LinearizedTexture> {
    let mip_count = fit_mip_count(plane, buffer.len(), platform)?;
    let truncation = (mip_count < plane.mip_count).then(|| {
        warn!(
            declared = plane.mip_count,
            fitted = mip_count,
            available = buffer.len(),
            "mip count does not fit the pixel data, truncating"
        );
        MipTruncation {
            declared: plane.mip_count,
            fitted: mip_count,
        }
    });

    let (spans, _) = layout(plane, mip_count, platform);
    let mut blocks = Vec::with_capacity(spans.len());
    for span in spans {
        let (width, height, depth) = plane.mip_dimensions(span.mip);
        let raw = &buffer[span.offset..span.offset + span.len];
        let pixels = if needs_swizzle(plane, platform) {
            swizzle::unswizzle(raw, width, height, plane.format.bits_per_pixel() / 8)?
        } else {
            raw.to_vec()
        };
        blocks.push(PixelBlock {
            mip: span.mip,
            face: span.face,
            width,
            height,
            depth,
            pixels,
        });
    }
    blocks.sort_by_key(|b| (b.mip, b.face));

    Ok(LinearizedTexture {
        blocks,
        mip_count,
        truncation,
    })
}

/// Pack per-(mip, face) blocks into a platform pixel buffer for `plane.mip_count` levels.
pub fn delinearize_texture(plane: &BitmapPlane, blocks: &[PixelBlock], platform: Platform) -> Result<Vec<u8>> {
    plane.validate()?;
    let (spans, total) = layout(plane, plane.mip_count, platform);
    let mut buffer = vec![0u8; total];

    for span in spans {
        let block = blocks
            .iter()
            .find(|b| b.mip == span.mip && b.face == span.face)
            .ok_or_else(|| {
                TagError::MalformedInput(format!("no pixel data for mip {} face {}", span.mip, span.face))
            })?;
        if block.pixels.len() != span.len {
            return Err(TagError::MalformedInput(format!(
                "mip {} face {} has {} bytes, expected {}",
                span.mip,
                span.face,
                block.pixels.len(),
                span.len
            )));
        }

        let target = &mut buffer[span.offset..span.offset + span.len];
        if needs_swizzle(plane, platform) {
            let (width, height, _) = plane.mip_dimensions(span.mip);
            let swizzled = swizzle::swizzle(&block.pixels, width, height, plane.format.bits_per_pixel() / 8)?;
            target.copy_from_slice(&swizzled);
        } else {
            target.copy_from_slice(&block.pixels);
        }
    }

    Ok(buffer)
}
