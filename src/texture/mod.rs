//! Bitmap pixel formats and the per-platform layout of mip levels and cube faces.

pub mod layout;
pub mod swizzle;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagError};

pub use layout::{delinearize_texture, fit_mip_count, linearize_texture, LinearizedTexture, MipTruncation, PixelBlock};

/// Pixel formats a bitmap tag can store, with their tag ids.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitmapFormat {
    A8 = 0,
    Y8 = 1,
    Ay8 = 2,
    A8y8 = 3,
    R5g6b5 = 6,
    A1r5g5b5 = 8,
    A4r4g4b4 = 9,
    X8r8g8b8 = 10,
    A8r8g8b8 = 11,
    Dxt1 = 14,
    Dxt3 = 15,
    Dxt5 = 16,
    P8 = 17,
}

impl BitmapFormat {
    pub fn from_id(id: u16) -> Option<Self> {
        Some(match id {
            0 => Self::A8,
            1 => Self::Y8,
            2 => Self::Ay8,
            3 => Self::A8y8,
            6 => Self::R5g6b5,
            8 => Self::A1r5g5b5,
            9 => Self::A4r4g4b4,
            10 => Self::X8r8g8b8,
            11 => Self::A8r8g8b8,
            14 => Self::Dxt1,
            15 => Self::Dxt3,
            16 => Self::Dxt5,
            17 => Self::P8,
            _ => return None,
        })
    }

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn bits_per_pixel(self) -> usize {
        match self {
            Self::Dxt1 => 4,
            Self::A8 | Self::Y8 | Self::Ay8 | Self::P8 | Self::Dxt3 | Self::Dxt5 => 8,
            Self::A8y8 | Self::R5g6b5 | Self::A1r5g5b5 | Self::A4r4g4b4 => 16,
            Self::X8r8g8b8 | Self::A8r8g8b8 => 32,
        }
    }

    pub fn is_compressed(self) -> bool {
        matches!(self, Self::Dxt1 | Self::Dxt3 | Self::Dxt5)
    }

    /// Smallest width/height a mip level may shrink to.
    pub fn min_dimension(self) -> u32 {
        if self.is_compressed() {
            4
        } else {
            1
        }
    }
}

/// Where a pixel buffer comes from or goes to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// PC tags: every face of mip 0, then every face of mip 1, in stored face order.
    Pc,
    /// Xbox tags: every mip of face 0, then face 1, padded to 128 bytes, optionally swizzled.
    Xbox,
    /// DDS files: every mip of face 0, then face 1, in canonical face order.
    Dds,
}

impl Platform {
    pub fn is_face_major(self) -> bool {
        matches!(self, Self::Xbox | Self::Dds)
    }

    pub fn uses_stored_face_order(self) -> bool {
        matches!(self, Self::Pc | Self::Xbox)
    }

    pub fn alignment(self) -> usize {
        match self {
            Self::Xbox => 128,
            Self::Pc | Self::Dds => 1,
        }
    }
}

/// Canonical cube faces are `+x, -x, +y, -y, +z, -z`; tags store them as
/// `+x, +z, -x, -z, +y, -y`. Index by stored slot to get the canonical face.
pub const CUBE_STORED_TO_CANONICAL: [usize; 6] = [0, 4, 1, 5, 2, 3];

/// Shape of one bitmap's pixel data.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapPlane {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: BitmapFormat,
    /// Levels including the base level.
    pub mip_count: usize,
    pub face_count: usize,
    pub is_cubemap: bool,
    pub is_volume: bool,
    pub is_swizzled: bool,
}

impl BitmapPlane {
    pub fn new_2d(width: u32, height: u32, format: BitmapFormat, mip_count: usize) -> Self {
        Self {
            width,
            height,
            depth: 1,
            format,
            mip_count,
            face_count: 1,
            is_cubemap: false,
            is_volume: false,
            is_swizzled: false,
        }
    }

    pub fn new_cubemap(size: u32, format: BitmapFormat, mip_count: usize) -> Self {
        Self {
            face_count: 6,
            is_cubemap: true,
            ..Self::new_2d(size, size, format, mip_count)
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.format.is_compressed()
    }

    /// `(width, height, depth)` of a mip level.
    pub fn mip_dimensions(&self, mip: usize) -> (u32, u32, u32) {
        let min = self.format.min_dimension();
        let shrink = |dim: u32, floor: u32| dim.checked_shr(mip as u32).unwrap_or(0).max(floor);
        let depth = if self.is_volume { shrink(self.depth, 1) } else { 1 };
        (shrink(self.width, min), shrink(self.height, min), depth)
    }

    /// Levels in a full chain down to 1x1x1, including the base level.
    pub fn max_mip_count(&self) -> usize {
        let depth = if self.is_volume { self.depth } else { 1 };
        let largest = self.width.max(self.height).max(depth).max(1);
        (u32::BITS - largest.leading_zeros()) as usize
    }

    /// Bytes in one face of a mip level.
    pub fn mip_size(&self, mip: usize) -> usize {
        let (w, h, d) = self.mip_dimensions(mip);
        self.format.bits_per_pixel() * w as usize * h as usize * d as usize / 8
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.depth == 0 {
            return Err(TagError::MalformedInput(format!(
                "bitmap has an empty dimension ({}x{}x{})",
                self.width, self.height, self.depth
            )));
        }
        if self.mip_count == 0 {
            return Err(TagError::MalformedInput("bitmap declares no mip levels".into()));
        }
        if self.mip_count > self.max_mip_count() {
            return Err(TagError::MalformedInput(format!(
                "bitmap declares {} mip levels, a {}x{}x{} image has at most {}",
                self.mip_count,
                self.width,
                self.height,
                self.depth,
                self.max_mip_count()
            )));
        }
        let expected_faces = if self.is_cubemap { 6 } else { 1 };
        if self.face_count != expected_faces {
            return Err(TagError::MalformedInput(format!(
                "bitmap has {} faces, expected {}",
                self.face_count, expected_faces
            )));
        }
        if self.is_cubemap && self.is_volume {
            return Err(TagError::MalformedInput("bitmap is both a cubemap and a volume".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_ids_round_trip() {
        for id in 0..32u16 {
            if let Some(format) = BitmapFormat::from_id(id) {
                assert_eq!(format.id(), id);
            }
        }
        assert_eq!(BitmapFormat::from_id(4), None);
        assert_eq!(BitmapFormat::from_id(11), Some(BitmapFormat::A8r8g8b8));
    }

    #[test]
    fn compressed_mips_stop_at_four() {
        let plane = BitmapPlane::new_2d(16, 8, BitmapFormat::Dxt1, 5);
        assert_eq!(plane.mip_dimensions(0), (16, 8, 1));
        assert_eq!(plane.mip_dimensions(1), (8, 4, 1));
        assert_eq!(plane.mip_dimensions(2), (4, 4, 1));
        assert_eq!(plane.mip_dimensions(4), (4, 4, 1));
        // one 4x4 DXT1 block
        assert_eq!(plane.mip_size(3), 8);
    }

    #[test]
    fn uncompressed_mips_stop_at_one() {
        let plane = BitmapPlane::new_2d(4, 2, BitmapFormat::A8r8g8b8, 3);
        assert_eq!(plane.mip_dimensions(1), (2, 1, 1));
        assert_eq!(plane.mip_dimensions(2), (1, 1, 1));
        assert_eq!(plane.mip_size(0), 32);
    }

    #[test]
    fn volume_depth_shrinks() {
        let mut plane = BitmapPlane::new_2d(8, 8, BitmapFormat::A8, 3);
        plane.is_volume = true;
        plane.depth = 4;
        assert_eq!(plane.mip_dimensions(1), (4, 4, 2));
        assert_eq!(plane.mip_size(2), 2 * 2);
    }

    #[test]
    fn cube_table_is_a_permutation() {
        let mut seen = CUBE_STORED_TO_CANONICAL.to_vec();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn validate_rejects_inconsistent_planes() {
        let mut plane = BitmapPlane::new_cubemap(8, BitmapFormat::A8, 1);
        assert!(plane.validate().is_ok());
        plane.face_count = 5;
        assert!(plane.validate().is_err());
        assert!(BitmapPlane::new_2d(0, 4, BitmapFormat::A8, 1).validate().is_err());
        assert!(BitmapPlane::new_2d(4, 4, BitmapFormat::A8, 0).validate().is_err());
        assert!(BitmapPlane::new_2d(4, 4, BitmapFormat::A8, 3).validate().is_ok());
        assert!(BitmapPlane::new_2d(4, 4, BitmapFormat::A8, 4).validate().is_err());
    }

    #[test]
    fn full_chain_length() {
        assert_eq!(BitmapPlane::new_2d(1, 1, BitmapFormat::A8, 1).max_mip_count(), 1);
        assert_eq!(BitmapPlane::new_2d(16, 8, BitmapFormat::Dxt1, 1).max_mip_count(), 5);
        assert_eq!(BitmapPlane::new_2d(3, 5, BitmapFormat::A8, 1).max_mip_count(), 3);
        let mut volume = BitmapPlane::new_2d(4, 4, BitmapFormat::A8, 1);
        volume.is_volume = true;
        volume.depth = 32;
        assert_eq!(volume.max_mip_count(), 6);
    }
}
