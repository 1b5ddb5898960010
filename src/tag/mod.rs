//! Tag container: the 64-byte header plus a typed body.
//!
//! Binary layout:
//! ```text
//! [36 bytes]  reserved (zero)
//! [4 bytes]   tag class FourCC
//! [4 bytes]   CRC-32 of the body
//! [4 bytes]   header size (64)
//! [8 bytes]   reserved (zero)
//! [2 bytes]   tag version
//! [2 bytes]   0x00FF
//! [4 bytes]   engine id 'blam'
//! [...]       root block, then its children depth first
//! ```

pub mod stream;

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use binrw::{binrw, BinRead, BinWrite};

use crate::error::{Result, TagError};

pub use stream::{Reflexive, TagData, TagReader, TagReference, TagWriter};

pub const TAG_HEADER_SIZE: u32 = 64;
pub const ENGINE_ID: FourCC = FourCC::new(b"blam");
const HEADER_MARKER: u16 = 0x00FF;

#[binrw]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const NONE: FourCC = FourCC(0xFFFF_FFFF);

    pub const fn new(tag: &[u8; 4]) -> Self {
        FourCC(u32::from_be_bytes(*tag))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            write!(f, "{}", String::from_utf8_lossy(&bytes))
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({})", self)
    }
}

/// A block of a tag layout: a fixed part plus children written after the
/// fixed parts of all its siblings.
pub trait TagBlock: Sized {
    fn read_fixed(r: &mut TagReader) -> Result<Self>;

    fn read_children(&mut self, _r: &mut TagReader) -> Result<()> {
        Ok(())
    }

    fn write_fixed(&self, w: &mut TagWriter) -> Result<()>;

    fn write_children(&self, _w: &mut TagWriter) -> Result<()> {
        Ok(())
    }
}

/// Root block of a tag class at a specific version.
pub trait TagDefinition: TagBlock {
    const CLASS: FourCC;
    const VERSION: u16;
}

/// Implements [`TagBlock`] for plain `#[binrw]` value types without children.
macro_rules! impl_leaf_block {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::tag::TagBlock for $ty {
                fn read_fixed(r: &mut $crate::tag::TagReader) -> $crate::error::Result<Self> {
                    r.read()
                }

                fn write_fixed(&self, w: &mut $crate::tag::TagWriter) -> $crate::error::Result<()> {
                    w.write(self)
                }
            }
        )*
    };
}
pub(crate) use impl_leaf_block;

impl_leaf_block!(u8, i8, u16, i16, u32, i32, f32, FourCC);

/// Declares a block struct whose fields are all [`TagBlock`]s, stored in
/// declaration order, and implements [`TagBlock`] for it.
macro_rules! tag_block {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $ty ),*
        }

        impl $crate::tag::TagBlock for $name {
            fn read_fixed(r: &mut $crate::tag::TagReader) -> $crate::error::Result<Self> {
                Ok(Self {
                    $( $field: <$ty as $crate::tag::TagBlock>::read_fixed(r)? ),*
                })
            }

            fn read_children(&mut self, _r: &mut $crate::tag::TagReader) -> $crate::error::Result<()> {
                $( $crate::tag::TagBlock::read_children(&mut self.$field, _r)?; )*
                Ok(())
            }

            fn write_fixed(&self, w: &mut $crate::tag::TagWriter) -> $crate::error::Result<()> {
                $( $crate::tag::TagBlock::write_fixed(&self.$field, w)?; )*
                Ok(())
            }

            fn write_children(&self, _w: &mut $crate::tag::TagWriter) -> $crate::error::Result<()> {
                $( $crate::tag::TagBlock::write_children(&self.$field, _w)?; )*
                Ok(())
            }
        }
    };
}
pub(crate) use tag_block;

/// Fixed 32-byte name field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct String32(pub String);

impl String32 {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for String32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for String32 {
    fn from(s: &str) -> Self {
        String32(s.to_string())
    }
}

impl From<String> for String32 {
    fn from(s: String) -> Self {
        String32(s)
    }
}

impl TagBlock for String32 {
    fn read_fixed(r: &mut TagReader) -> Result<Self> {
        Ok(String32(r.string32()?))
    }

    fn write_fixed(&self, w: &mut TagWriter) -> Result<()> {
        w.string32(&self.0)
    }
}

#[binrw]
#[brw(big)]
#[derive(Debug, Clone, PartialEq)]
pub struct TagHeader {
    #[brw(pad_before = 36)]
    pub class: FourCC,
    pub checksum: u32,
    pub header_size: u32,
    #[brw(pad_before = 8)]
    pub version: u16,
    pub marker: u16,
    pub engine: FourCC,
}

impl TagHeader {
    pub fn new(class: FourCC, version: u16, checksum: u32) -> Self {
        Self {
            class,
            checksum,
            header_size: TAG_HEADER_SIZE,
            version,
            marker: HEADER_MARKER,
            engine: ENGINE_ID,
        }
    }
}

/// Read only the header, e.g. to pick a schema by version.
pub fn peek_header(bytes: &[u8]) -> Result<TagHeader> {
    if bytes.len() < TAG_HEADER_SIZE as usize {
        return Err(TagError::MalformedInput(format!(
            "file is {} bytes, smaller than a tag header",
            bytes.len()
        )));
    }
    let header = TagHeader::read(&mut Cursor::new(bytes))?;
    if header.engine != ENGINE_ID {
        return Err(TagError::MalformedInput(format!(
            "engine id is '{}', expected '{}'",
            header.engine, ENGINE_ID
        )));
    }
    Ok(header)
}

pub fn parse_tag<T: TagDefinition>(bytes: &[u8]) -> Result<T> {
    let header = peek_header(bytes)?;
    if header.class != T::CLASS {
        return Err(TagError::WrongClass {
            expected: T::CLASS,
            found: header.class,
        });
    }
    if header.version != T::VERSION {
        return Err(TagError::UnsupportedVersion {
            class: header.class,
            version: header.version,
        });
    }

    let body_start = header.header_size as usize;
    if body_start > bytes.len() {
        return Err(TagError::MalformedInput(format!(
            "header size {} runs past the end of the file",
            body_start
        )));
    }

    let mut reader = TagReader::new(&bytes[body_start..]);
    let mut tag = T::read_fixed(&mut reader)?;
    tag.read_children(&mut reader)?;
    Ok(tag)
}

/// Serialize a tag; all counts, sizes and the checksum are recomputed.
pub fn serialize_tag<T: TagDefinition>(tag: &T) -> Result<Vec<u8>> {
    let mut body = TagWriter::new();
    tag.write_fixed(&mut body)?;
    tag.write_children(&mut body)?;
    let body = body.into_inner();

    let header = TagHeader::new(T::CLASS, T::VERSION, crc32fast::hash(&body));
    let mut out = Cursor::new(Vec::with_capacity(TAG_HEADER_SIZE as usize + body.len()));
    header.write(&mut out)?;

    let mut out = out.into_inner();
    out.extend_from_slice(&body);
    Ok(out)
}

pub fn read_tag_file<T: TagDefinition>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)?;
    parse_tag(&bytes)
}

pub fn write_tag_file<T: TagDefinition>(path: &Path, tag: &T) -> Result<()> {
    let bytes = serialize_tag(tag)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}
