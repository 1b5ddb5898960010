//! DirectDraw Surface files: header parsing and the mapping from DDS pixel
//! formats onto bitmap tag formats.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};

use crate::error::{Result, TagError};
use crate::texture::{BitmapFormat, BitmapPlane};

pub const DDS_MAGIC: &[u8; 4] = b"DDS ";
pub const DDS_HEADER_SIZE: u32 = 124;
pub const DDS_PIXEL_FORMAT_SIZE: u32 = 32;

pub const DDSD_CAPS: u32 = 0x1;
pub const DDSD_HEIGHT: u32 = 0x2;
pub const DDSD_WIDTH: u32 = 0x4;
pub const DDSD_PIXELFORMAT: u32 = 0x1000;
pub const DDSD_MIPMAPCOUNT: u32 = 0x20000;
pub const DDSD_DEPTH: u32 = 0x80_0000;

pub const DDPF_ALPHAPIXELS: u32 = 0x1;
pub const DDPF_ALPHA: u32 = 0x2;
pub const DDPF_FOURCC: u32 = 0x4;
pub const DDPF_RGB: u32 = 0x40;
pub const DDPF_LUMINANCE: u32 = 0x2_0000;

pub const DDSCAPS_COMPLEX: u32 = 0x8;
pub const DDSCAPS_TEXTURE: u32 = 0x1000;
pub const DDSCAPS_MIPMAP: u32 = 0x40_0000;

pub const DDSCAPS2_CUBEMAP: u32 = 0x200;
pub const DDSCAPS2_CUBEMAP_POSITIVEX: u32 = 0x400;
pub const DDSCAPS2_CUBEMAP_NEGATIVEX: u32 = 0x800;
pub const DDSCAPS2_CUBEMAP_POSITIVEY: u32 = 0x1000;
pub const DDSCAPS2_CUBEMAP_NEGATIVEY: u32 = 0x2000;
pub const DDSCAPS2_CUBEMAP_POSITIVEZ: u32 = 0x4000;
pub const DDSCAPS2_CUBEMAP_NEGATIVEZ: u32 = 0x8000;
pub const DDSCAPS2_CUBEMAP_ALL_FACES: u32 = 0xFC00;
pub const DDSCAPS2_VOLUME: u32 = 0x20_0000;

pub const FOURCC_DXT1: u32 = u32::from_le_bytes(*b"DXT1");
pub const FOURCC_DXT2: u32 = u32::from_le_bytes(*b"DXT2");
pub const FOURCC_DXT3: u32 = u32::from_le_bytes(*b"DXT3");
pub const FOURCC_DXT4: u32 = u32::from_le_bytes(*b"DXT4");
pub const FOURCC_DXT5: u32 = u32::from_le_bytes(*b"DXT5");

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DdsPixelFormat {
    pub size: u32,
    pub flags: u32,
    pub four_cc: u32,
    pub rgb_bit_count: u32,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
}

impl DdsPixelFormat {
    pub fn four_cc(code: u32) -> Self {
        Self {
            size: DDS_PIXEL_FORMAT_SIZE,
            flags: DDPF_FOURCC,
            four_cc: code,
            ..Default::default()
        }
    }

    pub fn masked(flags: u32, rgb_bit_count: u32, masks: [u32; 4]) -> Self {
        Self {
            size: DDS_PIXEL_FORMAT_SIZE,
            flags,
            four_cc: 0,
            rgb_bit_count,
            r_mask: masks[0],
            g_mask: masks[1],
            b_mask: masks[2],
            a_mask: masks[3],
        }
    }

    fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

#[binrw]
#[brw(little, magic = b"DDS ")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsHeader {
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mip_map_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
}

impl DdsHeader {
    pub fn new(width: u32, height: u32, pixel_format: DdsPixelFormat) -> Self {
        Self {
            size: DDS_HEADER_SIZE,
            flags: DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT,
            height,
            width,
            pitch_or_linear_size: 0,
            depth: 0,
            mip_map_count: 0,
            reserved1: [0; 11],
            pixel_format,
            caps: DDSCAPS_TEXTURE,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        }
    }

    pub fn with_mipmaps(mut self, count: u32) -> Self {
        self.flags |= DDSD_MIPMAPCOUNT;
        self.mip_map_count = count;
        self.caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
        self
    }

    pub fn with_cubemap_faces(mut self, face_bits: u32) -> Self {
        self.caps |= DDSCAPS_COMPLEX;
        self.caps2 |= DDSCAPS2_CUBEMAP | face_bits;
        self
    }

    pub fn is_cubemap(&self) -> bool {
        self.caps2 & DDSCAPS2_CUBEMAP != 0
    }

    pub fn is_volume(&self) -> bool {
        self.caps2 & DDSCAPS2_VOLUME != 0
    }

    /// Mip levels including the base level.
    pub fn mip_levels(&self) -> usize {
        if self.flags & DDSD_MIPMAPCOUNT != 0 && self.mip_map_count > 0 {
            self.mip_map_count as usize
        } else {
            1
        }
    }

    /// Shape of the pixel data that follows the header. A mip count past the
    /// full chain is clamped to it.
    pub fn plane(&self) -> Result<BitmapPlane> {
        let format = dds_to_bitmap_format(&self.pixel_format)?;

        if self.is_cubemap() && self.caps2 & DDSCAPS2_CUBEMAP_ALL_FACES != DDSCAPS2_CUBEMAP_ALL_FACES {
            return Err(TagError::MalformedInput(format!(
                "cubemap is missing faces (face bits 0x{:04X})",
                self.caps2 & DDSCAPS2_CUBEMAP_ALL_FACES
            )));
        }

        let is_volume = self.is_volume();
        let mut plane = BitmapPlane {
            width: self.width,
            height: self.height,
            depth: if is_volume { self.depth.max(1) } else { 1 },
            format,
            mip_count: self.mip_levels(),
            face_count: if self.is_cubemap() { 6 } else { 1 },
            is_cubemap: self.is_cubemap(),
            is_volume,
            is_swizzled: false,
        };
        // writers sometimes count past the 1x1 level
        plane.mip_count = plane.mip_count.min(plane.max_mip_count());
        plane.validate()?;
        Ok(plane)
    }
}

/// A parsed DDS file: header plus the raw pixel data after it.
#[derive(Debug, Clone, PartialEq)]
pub struct DdsFile {
    pub header: DdsHeader,
    pub data: Vec<u8>,
}

impl DdsFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let header = DdsHeader::read(&mut cursor)?;
        if header.size != DDS_HEADER_SIZE {
            return Err(TagError::MalformedInput(format!(
                "DDS header size is {}, expected {}",
                header.size, DDS_HEADER_SIZE
            )));
        }
        let data_start = cursor.position() as usize;
        Ok(Self {
            header,
            data: bytes[data_start..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(128 + self.data.len()));
        self.header.write(&mut cursor)?;
        let mut out = cursor.into_inner();
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

/// Channel mask shifted down to its lowest set bit, e.g. `0xF800` → `31`.
fn mask_range(mask: u32) -> u32 {
    if mask == 0 {
        0
    } else {
        mask >> mask.trailing_zeros()
    }
}

/// Bitmap tag format matching a DDS pixel format.
pub fn dds_to_bitmap_format(pf: &DdsPixelFormat) -> Result<BitmapFormat> {
    if pf.size != DDS_PIXEL_FORMAT_SIZE {
        return Err(TagError::MalformedInput(format!(
            "pixel format structure is {} bytes, expected {}",
            pf.size, DDS_PIXEL_FORMAT_SIZE
        )));
    }

    if pf.has(DDPF_FOURCC) {
        return match pf.four_cc {
            FOURCC_DXT1 => Ok(BitmapFormat::Dxt1),
            FOURCC_DXT2 | FOURCC_DXT3 => Ok(BitmapFormat::Dxt3),
            FOURCC_DXT4 | FOURCC_DXT5 => Ok(BitmapFormat::Dxt5),
            other => Err(TagError::UnsupportedFormat(format!(
                "four-cc '{}'",
                String::from_utf8_lossy(&other.to_le_bytes())
            ))),
        };
    }

    let has_alpha = pf.has(DDPF_ALPHAPIXELS) && pf.a_mask != 0;

    if pf.has(DDPF_RGB) {
        let channels = (
            mask_range(pf.r_mask),
            mask_range(pf.g_mask),
            mask_range(pf.b_mask),
            if has_alpha { mask_range(pf.a_mask) } else { 0 },
        );
        return match (pf.rgb_bit_count, channels) {
            (32, _) if has_alpha => Ok(BitmapFormat::A8r8g8b8),
            (32, _) => Ok(BitmapFormat::X8r8g8b8),
            (16, (31, 63, _, 0)) => Ok(BitmapFormat::R5g6b5),
            (16, (31, _, _, 1)) => Ok(BitmapFormat::A1r5g5b5),
            (16, (_, _, _, 15)) => Ok(BitmapFormat::A4r4g4b4),
            (bits, (r, g, b, a)) => Err(TagError::UnsupportedFormat(format!(
                "{}-bit RGB with channel ranges r{} g{} b{} a{}",
                bits, r, g, b, a
            ))),
        };
    }

    if pf.has(DDPF_LUMINANCE) {
        return Ok(if has_alpha {
            BitmapFormat::A8y8
        } else {
            BitmapFormat::Y8
        });
    }

    if pf.has(DDPF_ALPHA) {
        return Ok(BitmapFormat::A8);
    }

    Err(TagError::UnsupportedFormat(format!(
        "pixel format flags 0x{:X}",
        pf.flags
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(bits: u32, masks: [u32; 4], alpha: bool) -> DdsPixelFormat {
        let flags = DDPF_RGB | if alpha { DDPF_ALPHAPIXELS } else { 0 };
        DdsPixelFormat::masked(flags, bits, masks)
    }

    #[test]
    fn dxt1() {
        assert_eq!(dds_to_bitmap_format(&DdsPixelFormat::four_cc(FOURCC_DXT1)).unwrap(), BitmapFormat::Dxt1);
    }

    #[test]
    fn dxt2_and_dxt3() {
        for code in [FOURCC_DXT2, FOURCC_DXT3] {
            assert_eq!(dds_to_bitmap_format(&DdsPixelFormat::four_cc(code)).unwrap(), BitmapFormat::Dxt3);
        }
    }

    #[test]
    fn dxt4_and_dxt5() {
        for code in [FOURCC_DXT4, FOURCC_DXT5] {
            assert_eq!(dds_to_bitmap_format(&DdsPixelFormat::four_cc(code)).unwrap(), BitmapFormat::Dxt5);
        }
    }

    #[test]
    fn rgb32_with_alpha() {
        let pf = rgb(32, [0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000], true);
        assert_eq!(dds_to_bitmap_format(&pf).unwrap(), BitmapFormat::A8r8g8b8);
    }

    #[test]
    fn rgb32_without_alpha() {
        let pf = rgb(32, [0xFF_0000, 0xFF00, 0xFF, 0], false);
        assert_eq!(dds_to_bitmap_format(&pf).unwrap(), BitmapFormat::X8r8g8b8);
    }

    #[test]
    fn rgb16_565() {
        let pf = rgb(16, [0xF800, 0x07E0, 0x001F, 0], false);
        assert_eq!(dds_to_bitmap_format(&pf).unwrap(), BitmapFormat::R5g6b5);
    }

    #[test]
    fn rgb16_1555() {
        let pf = rgb(16, [0x7C00, 0x03E0, 0x001F, 0x8000], true);
        assert_eq!(dds_to_bitmap_format(&pf).unwrap(), BitmapFormat::A1r5g5b5);
    }

    #[test]
    fn rgb16_4444() {
        let pf = rgb(16, [0x0F00, 0x00F0, 0x000F, 0xF000], true);
        assert_eq!(dds_to_bitmap_format(&pf).unwrap(), BitmapFormat::A4r4g4b4);
    }

    #[test]
    fn luminance_with_alpha() {
        let pf = DdsPixelFormat::masked(DDPF_LUMINANCE | DDPF_ALPHAPIXELS, 16, [0xFF, 0, 0, 0xFF00]);
        assert_eq!(dds_to_bitmap_format(&pf).unwrap(), BitmapFormat::A8y8);
    }

    #[test]
    fn luminance_only() {
        let pf = DdsPixelFormat::masked(DDPF_LUMINANCE, 8, [0xFF, 0, 0, 0]);
        assert_eq!(dds_to_bitmap_format(&pf).unwrap(), BitmapFormat::Y8);
    }

    #[test]
    fn alpha_only() {
        let pf = DdsPixelFormat::masked(DDPF_ALPHA, 8, [0, 0, 0, 0xFF]);
        assert_eq!(dds_to_bitmap_format(&pf).unwrap(), BitmapFormat::A8);
    }

    #[test]
    fn unknown_formats_are_unsupported() {
        let dx10 = DdsPixelFormat::four_cc(u32::from_le_bytes(*b"DX10"));
        assert!(matches!(dds_to_bitmap_format(&dx10), Err(TagError::UnsupportedFormat(_))));

        let x1r5g5b5 = rgb(16, [0x7C00, 0x03E0, 0x001F, 0], false);
        assert!(matches!(dds_to_bitmap_format(&x1r5g5b5), Err(TagError::UnsupportedFormat(_))));

        let r8g8b8 = rgb(24, [0xFF_0000, 0xFF00, 0xFF, 0], false);
        assert!(matches!(dds_to_bitmap_format(&r8g8b8), Err(TagError::UnsupportedFormat(_))));
    }

    #[test]
    fn missing_pixel_format_is_malformed() {
        let pf = DdsPixelFormat {
            size: 0,
            ..DdsPixelFormat::four_cc(FOURCC_DXT1)
        };
        assert!(matches!(dds_to_bitmap_format(&pf), Err(TagError::MalformedInput(_))));
    }

    #[test]
    fn decision_table_summary() {
        let rows = [
            ("DXT1", DdsPixelFormat::four_cc(FOURCC_DXT1)),
            ("DXT3", DdsPixelFormat::four_cc(FOURCC_DXT3)),
            ("DXT5", DdsPixelFormat::four_cc(FOURCC_DXT5)),
            ("ARGB32", rgb(32, [0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000], true)),
            ("XRGB32", rgb(32, [0xFF_0000, 0xFF00, 0xFF, 0], false)),
            ("RGB565", rgb(16, [0xF800, 0x07E0, 0x001F, 0], false)),
        ];
        let table: Vec<String> = rows
            .iter()
            .map(|(name, pf)| format!("{} -> {:?}", name, dds_to_bitmap_format(pf).unwrap()))
            .collect();
        insta::assert_snapshot!(table.join("\n"), @r"
        DXT1 -> Dxt1
        DXT3 -> Dxt3
        DXT5 -> Dxt5
        ARGB32 -> A8r8g8b8
        XRGB32 -> X8r8g8b8
        RGB565 -> R5g6b5
        ");
    }

    fn cubemap(face_bits: u32) -> DdsFile {
        let header = DdsHeader::new(4, 4, DdsPixelFormat::masked(DDPF_ALPHA, 8, [0, 0, 0, 0xFF]))
            .with_cubemap_faces(face_bits);
        DdsFile {
            header,
            data: vec![0; 6 * 16],
        }
    }

    #[test]
    fn complete_cubemap_has_six_faces() {
        let plane = cubemap(DDSCAPS2_CUBEMAP_ALL_FACES).header.plane().unwrap();
        assert!(plane.is_cubemap);
        assert_eq!(plane.face_count, 6);
        assert_eq!(plane.mip_count, 1);
    }

    #[test]
    fn cubemap_missing_any_face_is_rejected() {
        let faces = [
            DDSCAPS2_CUBEMAP_POSITIVEX,
            DDSCAPS2_CUBEMAP_NEGATIVEX,
            DDSCAPS2_CUBEMAP_POSITIVEY,
            DDSCAPS2_CUBEMAP_NEGATIVEY,
            DDSCAPS2_CUBEMAP_POSITIVEZ,
            DDSCAPS2_CUBEMAP_NEGATIVEZ,
        ];
        for missing in faces {
            let dds = cubemap(DDSCAPS2_CUBEMAP_ALL_FACES & !missing);
            assert!(matches!(dds.header.plane(), Err(TagError::MalformedInput(_))));
        }
    }

    #[test]
    fn file_round_trip() {
        let dds = DdsFile {
            header: DdsHeader::new(8, 8, DdsPixelFormat::four_cc(FOURCC_DXT1)).with_mipmaps(2),
            data: (0..40).collect(),
        };
        let bytes = dds.to_bytes().unwrap();
        assert_eq!(&bytes[..4], DDS_MAGIC);
        assert_eq!(bytes.len(), 128 + 40);
        let parsed = DdsFile::parse(&bytes).unwrap();
        assert_eq!(parsed, dds);
        assert_eq!(parsed.header.mip_levels(), 2);
    }

    #[test]
    fn bad_magic_is_a_parse_error() {
        let mut bytes = DdsFile {
            header: DdsHeader::new(4, 4, DdsPixelFormat::four_cc(FOURCC_DXT1)),
            data: Vec::new(),
        }
        .to_bytes()
        .unwrap();
        bytes[0] = b'X';
        assert!(matches!(DdsFile::parse(&bytes), Err(TagError::Parse { .. })));
    }
}
