use crate::error::{Result, TagError};
use crate::tag::{tag_block, FourCC, Reflexive, String32, TagData, TagDefinition};
use crate::texture::{BitmapFormat, BitmapPlane};

pub const BITMAP_TYPE_2D: u16 = 0;
pub const BITMAP_TYPE_3D: u16 = 1;
pub const BITMAP_TYPE_CUBE_MAP: u16 = 2;

tag_block! {
    /// Bitmap (`bitm`): import settings plus processed pixel data.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Bitmap {
        pub bitmap_type: u16,
        pub encoding_format: u16,
        pub usage: u16,
        pub flags: u16,
        pub detail_fade_factor: f32,
        pub sharpen_amount: f32,
        pub bump_height: f32,
        pub blur_filter_size: f32,
        pub alpha_bias: f32,
        /// Levels below the base level to generate, `0` for all.
        pub mipmap_count: u16,
        pub sprite_usage: u16,
        pub sprite_spacing: u16,
        pub processed_pixel_data: TagData,
        pub sequences: Reflexive<BitmapSequence>,
        pub bitmaps: Reflexive<BitmapData>,
    }
}

impl TagDefinition for Bitmap {
    const CLASS: FourCC = FourCC::new(b"bitm");
    const VERSION: u16 = 7;
}

tag_block! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BitmapSequence {
        pub name: String32,
        pub first_bitmap_index: i16,
        pub bitmap_count: i16,
    }
}

tag_block! {
    /// One image inside `processed_pixel_data`.
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct BitmapData {
        pub signature: FourCC,
        pub width: u16,
        pub height: u16,
        pub depth: u16,
        pub bitmap_type: u16,
        pub format: u16,
        pub flags: u16,
        pub registration_point_x: i16,
        pub registration_point_y: i16,
        /// Levels below the base level.
        pub mipmap_count: u16,
        pub pixel_data_offset: u32,
        pub pixel_data_size: u32,
    }
}

impl BitmapData {
    pub const POWER_OF_TWO_DIMENSIONS: u16 = 0x1;
    pub const COMPRESSED: u16 = 0x2;
    pub const PALETTIZED: u16 = 0x4;
    pub const SWIZZLED: u16 = 0x8;
    pub const LINEAR: u16 = 0x10;

    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    /// Entry describing `plane`, with flags derived from its shape and format.
    pub fn from_plane(plane: &BitmapPlane, pixel_data_offset: u32, pixel_data_size: u32) -> Self {
        let mut flags = 0;
        if plane.width.is_power_of_two() && plane.height.is_power_of_two() {
            flags |= Self::POWER_OF_TWO_DIMENSIONS;
        }
        if plane.is_compressed() {
            flags |= Self::COMPRESSED;
        }
        if plane.format == BitmapFormat::P8 {
            flags |= Self::PALETTIZED;
        }
        if plane.is_swizzled {
            flags |= Self::SWIZZLED;
        }
        let bitmap_type = if plane.is_cubemap {
            BITMAP_TYPE_CUBE_MAP
        } else if plane.is_volume {
            BITMAP_TYPE_3D
        } else {
            BITMAP_TYPE_2D
        };

        Self {
            signature: FourCC::new(b"bitm"),
            width: plane.width as u16,
            height: plane.height as u16,
            depth: plane.depth as u16,
            bitmap_type,
            format: plane.format.id(),
            flags,
            registration_point_x: (plane.width / 2) as i16,
            registration_point_y: (plane.height / 2) as i16,
            mipmap_count: plane.mip_count.saturating_sub(1) as u16,
            pixel_data_offset,
            pixel_data_size,
        }
    }

    pub fn plane(&self) -> Result<BitmapPlane> {
        let format = BitmapFormat::from_id(self.format)
            .ok_or_else(|| TagError::UnsupportedFormat(format!("bitmap format id {}", self.format)))?;
        let is_cubemap = self.bitmap_type == BITMAP_TYPE_CUBE_MAP;
        let is_volume = self.bitmap_type == BITMAP_TYPE_3D;
        Ok(BitmapPlane {
            width: self.width as u32,
            height: self.height as u32,
            depth: if is_volume { self.depth.max(1) as u32 } else { 1 },
            format,
            mip_count: self.mipmap_count as usize + 1,
            face_count: if is_cubemap { 6 } else { 1 },
            is_cubemap,
            is_volume,
            is_swizzled: self.has_flag(Self::SWIZZLED),
        })
    }

    /// This entry's slice of the tag's pixel data.
    pub fn pixels<'a>(&self, processed: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.pixel_data_offset as usize;
        let end = start + self.pixel_data_size as usize;
        processed.get(start..end).ok_or_else(|| {
            TagError::MalformedInput(format!(
                "pixel data {}..{} is outside the {} processed bytes",
                start,
                end,
                processed.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{parse_tag, serialize_tag};

    #[test]
    fn plane_round_trips_through_entry() {
        let plane = BitmapPlane::new_cubemap(16, BitmapFormat::Dxt1, 3);
        let entry = BitmapData::from_plane(&plane, 0, 100);
        assert!(entry.has_flag(BitmapData::COMPRESSED));
        assert!(entry.has_flag(BitmapData::POWER_OF_TWO_DIMENSIONS));
        assert_eq!(entry.mipmap_count, 2);
        assert_eq!(entry.plane().unwrap(), plane);
    }

    #[test]
    fn unknown_format_id_is_unsupported() {
        let entry = BitmapData {
            format: 4,
            ..Default::default()
        };
        assert!(matches!(entry.plane(), Err(TagError::UnsupportedFormat(_))));
    }

    #[test]
    fn pixel_slice_is_bounds_checked() {
        let entry = BitmapData {
            pixel_data_offset: 2,
            pixel_data_size: 4,
            ..Default::default()
        };
        assert_eq!(entry.pixels(&[0, 1, 2, 3, 4, 5]).unwrap(), &[2, 3, 4, 5]);
        assert!(entry.pixels(&[0, 1, 2]).is_err());
    }

    #[test]
    fn bitmap_round_trip() {
        let plane = BitmapPlane::new_2d(4, 4, BitmapFormat::A8r8g8b8, 1);
        let bitmap = Bitmap {
            processed_pixel_data: TagData::new(vec![7; 64]),
            sequences: vec![BitmapSequence {
                name: "default".into(),
                first_bitmap_index: 0,
                bitmap_count: 1,
            }]
            .into(),
            bitmaps: vec![BitmapData::from_plane(&plane, 0, 64)].into(),
            ..Default::default()
        };
        let bytes = serialize_tag(&bitmap).unwrap();
        assert_eq!(parse_tag::<Bitmap>(&bytes).unwrap(), bitmap);
    }
}
