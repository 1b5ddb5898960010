//! Primitive tag stream readers/writers and the three composite field kinds
//! every tag layout is built from.
//!
//! ```text
//! Reflexive     count(4) pointer(4) id(4)             → count fixed parts, then their children
//! TagData       size(4) flags(4) offset(4) ptr(4) id(4) → size raw bytes
//! TagReference  class(4) path_ptr(4) path_len(4) id(4) → path bytes + NUL (when len > 0)
//! ```
//!
//! A block's children always follow the fixed parts of every element of the
//! array it lives in, depth first. All values are big-endian.

use std::io::{Cursor, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

use binrw::{BinRead, BinWrite, Endian};

use super::{FourCC, TagBlock};
use crate::error::{Result, TagError};

pub const STRING32_LEN: usize = 32;
const NULL_ID: u32 = 0xFFFF_FFFF;

pub struct TagReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> TagReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    pub fn read<T>(&mut self) -> Result<T>
    where
        T: for<'b> BinRead<Args<'b> = ()>,
    {
        Ok(T::read_options(&mut self.cursor, Endian::Big, ())?)
    }

    pub fn u8(&mut self) -> Result<u8> {
        self.read()
    }

    pub fn i8(&mut self) -> Result<i8> {
        self.read()
    }

    pub fn u16(&mut self) -> Result<u16> {
        self.read()
    }

    pub fn i16(&mut self) -> Result<i16> {
        self.read()
    }

    pub fn u32(&mut self) -> Result<u32> {
        self.read()
    }

    pub fn i32(&mut self) -> Result<i32> {
        self.read()
    }

    pub fn f32(&mut self) -> Result<f32> {
        self.read()
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.ensure_available(count)?;
        self.cursor.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    pub fn bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure_available(count)?;
        let start = self.cursor.position() as usize;
        let data = self.cursor.get_ref()[start..start + count].to_vec();
        self.cursor.set_position((start + count) as u64);
        Ok(data)
    }

    /// Fixed 32-byte, NUL padded string.
    pub fn string32(&mut self) -> Result<String> {
        let raw = self.bytes(STRING32_LEN)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(STRING32_LEN);
        Ok(String::from_utf8_lossy(&raw[..end]).to_string())
    }

    fn ensure_available(&self, count: usize) -> Result<()> {
        if count > self.remaining() {
            return Err(TagError::MalformedInput(format!(
                "need {} bytes at offset {}, only {} remain",
                count,
                self.position(),
                self.remaining()
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct TagWriter {
    cursor: Cursor<Vec<u8>>,
}

impl TagWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write<T>(&mut self, value: &T) -> Result<()>
    where
        T: for<'b> BinWrite<Args<'b> = ()>,
    {
        value.write_options(&mut self.cursor, Endian::Big, ())?;
        Ok(())
    }

    pub fn u8(&mut self, v: u8) -> Result<()> {
        self.write(&v)
    }

    pub fn i8(&mut self, v: i8) -> Result<()> {
        self.write(&v)
    }

    pub fn u16(&mut self, v: u16) -> Result<()> {
        self.write(&v)
    }

    pub fn i16(&mut self, v: i16) -> Result<()> {
        self.write(&v)
    }

    pub fn u32(&mut self, v: u32) -> Result<()> {
        self.write(&v)
    }

    pub fn i32(&mut self, v: i32) -> Result<()> {
        self.write(&v)
    }

    pub fn f32(&mut self, v: f32) -> Result<()> {
        self.write(&v)
    }

    pub fn zeros(&mut self, count: usize) -> Result<()> {
        self.bytes(&vec![0u8; count])
    }

    pub fn bytes(&mut self, data: &[u8]) -> Result<()> {
        std::io::Write::write_all(&mut self.cursor, data)?;
        Ok(())
    }

    pub fn string32(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        let len = bytes.len().min(STRING32_LEN - 1);
        let mut fixed = [0u8; STRING32_LEN];
        fixed[..len].copy_from_slice(&bytes[..len]);
        self.bytes(&fixed)
    }

    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

/// Length-prefixed nested array of blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Reflexive<T> {
    items: Vec<T>,
    pending: u32,
}

impl<T> Default for Reflexive<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pending: 0,
        }
    }
}

impl<T> Reflexive<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items, pending: 0 }
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> Deref for Reflexive<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.items
    }
}

impl<T> DerefMut for Reflexive<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

impl<T> From<Vec<T>> for Reflexive<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T> FromIterator<T> for Reflexive<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, T> IntoIterator for &'a Reflexive<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: TagBlock> TagBlock for Reflexive<T> {
    fn read_fixed(r: &mut TagReader) -> Result<Self> {
        let count = r.u32()?;
        let _pointer = r.u32()?;
        let _id = r.u32()?;
        // every element occupies at least one byte, so larger counts are corrupt
        if count as usize > r.remaining() {
            return Err(TagError::MalformedInput(format!(
                "reflexive count {} exceeds the {} bytes left in the tag",
                count,
                r.remaining()
            )));
        }
        Ok(Self {
            items: Vec::new(),
            pending: count,
        })
    }

    fn read_children(&mut self, r: &mut TagReader) -> Result<()> {
        let count = std::mem::take(&mut self.pending) as usize;
        self.items.reserve(count);
        for _ in 0..count {
            self.items.push(T::read_fixed(r)?);
        }
        for item in &mut self.items {
            item.read_children(r)?;
        }
        Ok(())
    }

    fn write_fixed(&self, w: &mut TagWriter) -> Result<()> {
        w.u32(self.items.len() as u32)?;
        w.u32(0)?;
        w.u32(0)
    }

    fn write_children(&self, w: &mut TagWriter) -> Result<()> {
        for item in &self.items {
            item.write_fixed(w)?;
        }
        for item in &self.items {
            item.write_children(w)?;
        }
        Ok(())
    }
}

/// Raw byte blob embedded in a tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagData {
    pub flags: u32,
    pub bytes: Vec<u8>,
    pending: u32,
}

impl TagData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            flags: 0,
            bytes,
            pending: 0,
        }
    }
}

impl TagBlock for TagData {
    fn read_fixed(r: &mut TagReader) -> Result<Self> {
        let size = r.u32()?;
        let flags = r.u32()?;
        let _file_offset = r.u32()?;
        let _pointer = r.u32()?;
        let _id = r.u32()?;
        Ok(Self {
            flags,
            bytes: Vec::new(),
            pending: size,
        })
    }

    fn read_children(&mut self, r: &mut TagReader) -> Result<()> {
        let size = std::mem::take(&mut self.pending) as usize;
        self.bytes = r.bytes(size)?;
        Ok(())
    }

    fn write_fixed(&self, w: &mut TagWriter) -> Result<()> {
        w.u32(self.bytes.len() as u32)?;
        w.u32(self.flags)?;
        w.u32(0)?;
        w.u32(0)?;
        w.u32(0)
    }

    fn write_children(&self, w: &mut TagWriter) -> Result<()> {
        w.bytes(&self.bytes)
    }
}

/// Reference to another tag by class and path.
#[derive(Debug, Clone, PartialEq)]
pub struct TagReference {
    pub class: FourCC,
    pub path: String,
    pending: u32,
}

impl Default for TagReference {
    fn default() -> Self {
        Self::null(FourCC::NONE)
    }
}

impl TagReference {
    pub fn new(class: FourCC, path: impl Into<String>) -> Self {
        Self {
            class,
            path: path.into(),
            pending: 0,
        }
    }

    pub fn null(class: FourCC) -> Self {
        Self::new(class, String::new())
    }

    pub fn is_null(&self) -> bool {
        self.path.is_empty()
    }

    /// Last path component, e.g. `"levels\\a10\\shaders\\metal"` → `"metal"`.
    pub fn name(&self) -> &str {
        self.path
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or(self.path.as_str())
    }
}

impl TagBlock for TagReference {
    fn read_fixed(r: &mut TagReader) -> Result<Self> {
        let class = r.read::<FourCC>()?;
        let _path_pointer = r.u32()?;
        let path_len = r.u32()?;
        let _id = r.u32()?;
        Ok(Self {
            class,
            path: String::new(),
            pending: path_len,
        })
    }

    fn read_children(&mut self, r: &mut TagReader) -> Result<()> {
        let len = std::mem::take(&mut self.pending) as usize;
        if len > 0 {
            let raw = r.bytes(len + 1)?;
            self.path = String::from_utf8_lossy(&raw[..len]).to_string();
        }
        Ok(())
    }

    fn write_fixed(&self, w: &mut TagWriter) -> Result<()> {
        w.write(&self.class)?;
        w.u32(0)?;
        w.u32(self.path.len() as u32)?;
        w.u32(NULL_ID)
    }

    fn write_children(&self, w: &mut TagWriter) -> Result<()> {
        if !self.path.is_empty() {
            w.bytes(self.path.as_bytes())?;
            w.u8(0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Leaf {
        value: u16,
        name: TagReference,
    }

    impl TagBlock for Leaf {
        fn read_fixed(r: &mut TagReader) -> Result<Self> {
            Ok(Self {
                value: r.u16()?,
                name: TagReference::read_fixed(r)?,
            })
        }

        fn read_children(&mut self, r: &mut TagReader) -> Result<()> {
            self.name.read_children(r)
        }

        fn write_fixed(&self, w: &mut TagWriter) -> Result<()> {
            w.u16(self.value)?;
            self.name.write_fixed(w)
        }

        fn write_children(&self, w: &mut TagWriter) -> Result<()> {
            self.name.write_children(w)
        }
    }

    #[test]
    fn reflexive_children_follow_all_fixed_parts() {
        let leaves: Reflexive<Leaf> = vec![
            Leaf {
                value: 1,
                name: TagReference::new(FourCC::new(b"shdr"), "a"),
            },
            Leaf {
                value: 2,
                name: TagReference::new(FourCC::new(b"shdr"), "bc"),
            },
        ]
        .into();

        let mut w = TagWriter::new();
        leaves.write_fixed(&mut w).unwrap();
        leaves.write_children(&mut w).unwrap();
        let data = w.into_inner();

        // header + 2 fixed parts (2 + 16 each) + "a\0" + "bc\0"
        assert_eq!(data.len(), 12 + 2 * 18 + 2 + 3);
        assert_eq!(&data[0..4], &2u32.to_be_bytes());
        assert_eq!(&data[12 + 36..12 + 38], b"a\0");

        let mut r = TagReader::new(&data);
        let mut parsed = Reflexive::<Leaf>::read_fixed(&mut r).unwrap();
        parsed.read_children(&mut r).unwrap();
        assert_eq!(parsed, leaves);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn oversized_count_is_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&1000u32.to_be_bytes());
        data.extend_from_slice(&[0u8; 8]);
        let mut r = TagReader::new(&data);
        assert!(matches!(
            Reflexive::<Leaf>::read_fixed(&mut r),
            Err(TagError::MalformedInput(_))
        ));
    }

    #[test]
    fn truncated_tag_data_is_rejected() {
        let mut w = TagWriter::new();
        TagData::new(vec![1, 2, 3, 4]).write_fixed(&mut w).unwrap();
        w.bytes(&[1, 2]).unwrap();
        let data = w.into_inner();

        let mut r = TagReader::new(&data);
        let mut blob = TagData::read_fixed(&mut r).unwrap();
        assert!(blob.read_children(&mut r).is_err());
    }

    #[test]
    fn string32_truncates_and_pads() {
        let mut w = TagWriter::new();
        w.string32("frame").unwrap();
        w.string32(&"x".repeat(40)).unwrap();
        let data = w.into_inner();
        assert_eq!(data.len(), 64);

        let mut r = TagReader::new(&data);
        assert_eq!(r.string32().unwrap(), "frame");
        assert_eq!(r.string32().unwrap().len(), 31);
    }

    #[test]
    fn reference_name_is_last_component() {
        let reference = TagReference::new(FourCC::new(b"shdr"), "levels\\test\\shaders\\metal");
        assert_eq!(reference.name(), "metal");
        assert!(TagReference::null(FourCC::new(b"shdr")).is_null());
    }
}
