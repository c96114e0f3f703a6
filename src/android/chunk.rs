//! Chunk framing and string pools shared by compiled Android resources.
//!
//! Both `AndroidManifest.xml` (binary XML) and `resources.arsc` are a tree
//! of little-endian chunks, each starting with `{u16 type, u16 header_size,
//! u32 size}`.

use crate::error::{Error, Result};

pub const RES_STRING_POOL_TYPE: u16 = 0x0001;
pub const RES_TABLE_TYPE: u16 = 0x0002;
pub const RES_XML_TYPE: u16 = 0x0003;

pub const RES_XML_START_NAMESPACE_TYPE: u16 = 0x0100;
pub const RES_XML_END_NAMESPACE_TYPE: u16 = 0x0101;
pub const RES_XML_START_ELEMENT_TYPE: u16 = 0x0102;
pub const RES_XML_END_ELEMENT_TYPE: u16 = 0x0103;
pub const RES_XML_RESOURCE_MAP_TYPE: u16 = 0x0180;

pub const RES_TABLE_PACKAGE_TYPE: u16 = 0x0200;
pub const RES_TABLE_TYPE_TYPE: u16 = 0x0201;

/// Marks an absent string reference
pub const NO_INDEX: u32 = 0xFFFF_FFFF;

const CHUNK_HEADER_SIZE: usize = 8;
const STRING_POOL_HEADER_SIZE: usize = 28;
const UTF8_FLAG: u32 = 1 << 8;

pub fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    data.get(offset).copied().ok_or_else(|| truncated(offset))
}

pub fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = data
        .get(offset..offset + 2)
        .ok_or_else(|| truncated(offset))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or_else(|| truncated(offset))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn truncated(offset: usize) -> Error {
    Error::invalid_file_type(format!("compiled resource truncated at offset {}", offset))
}

/// A chunk located inside a parent buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub kind: u16,
    pub header_size: usize,
    pub size: usize,
    pub offset: usize,
}

impl Chunk {
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        let kind = read_u16(data, offset)?;
        let header_size = read_u16(data, offset + 2)? as usize;
        let size = read_u32(data, offset + 4)? as usize;

        if header_size < CHUNK_HEADER_SIZE || size < header_size {
            return Err(Error::invalid_file_type(format!(
                "bad chunk header at offset {} (type {:#06x})",
                offset, kind
            )));
        }
        if offset.checked_add(size).is_none_or(|end| end > data.len()) {
            return Err(truncated(offset));
        }

        Ok(Self {
            kind,
            header_size,
            size,
            offset,
        })
    }

    /// The whole chunk, header included
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.size]
    }

    /// Iterate over the chunks nested after this chunk's header
    pub fn children<'a>(&self, data: &'a [u8]) -> ChunkIter<'a> {
        ChunkIter {
            data: self.bytes(data),
            pos: self.header_size,
        }
    }
}

/// Iterator over sibling chunks; stops after the first malformed one.
pub struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Iterator for ChunkIter<'_> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + CHUNK_HEADER_SIZE > self.data.len() {
            return None;
        }
        match Chunk::parse(self.data, self.pos) {
            Ok(chunk) => {
                self.pos += chunk.size;
                Some(Ok(chunk))
            }
            Err(e) => {
                self.pos = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// String pool chunk. Strings are decoded on access.
#[derive(Debug, Clone, Copy)]
pub struct StringPool<'a> {
    data: &'a [u8],
    count: u32,
    utf8: bool,
    offsets_start: usize,
    strings_start: usize,
}

impl<'a> StringPool<'a> {
    /// `data` is the whole string pool chunk, header included
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let chunk = Chunk::parse(data, 0)?;
        if chunk.kind != RES_STRING_POOL_TYPE || chunk.header_size < STRING_POOL_HEADER_SIZE {
            return Err(Error::invalid_file_type("expected a string pool chunk"));
        }
        let data = chunk.bytes(data);
        let count = read_u32(data, 8)?;
        let flags = read_u32(data, 16)?;
        let strings_start = read_u32(data, 20)? as usize;

        let offsets_start = chunk.header_size;
        let offsets_end = (count as usize)
            .checked_mul(4)
            .and_then(|len| len.checked_add(offsets_start));
        if offsets_end.is_none_or(|end| end > data.len()) {
            return Err(Error::invalid_file_type("string pool offsets out of bounds"));
        }

        Ok(Self {
            data,
            count,
            utf8: flags & UTF8_FLAG != 0,
            offsets_start,
            strings_start,
        })
    }

    /// Number of strings in the pool
    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn get(&self, index: u32) -> Result<String> {
        if index >= self.count {
            return Err(Error::invalid_file_type(format!(
                "string index {} out of range ({} strings)",
                index, self.count
            )));
        }
        let offset = read_u32(self.data, self.offsets_start + index as usize * 4)? as usize;
        let start = self.strings_start + offset;
        if self.utf8 {
            self.decode_utf8(start)
        } else {
            self.decode_utf16(start)
        }
    }

    /// Like [`get`](Self::get), mapping [`NO_INDEX`] to `None`
    pub fn get_optional(&self, index: u32) -> Result<Option<String>> {
        if index == NO_INDEX {
            return Ok(None);
        }
        self.get(index).map(Some)
    }

    fn decode_utf8(&self, start: usize) -> Result<String> {
        // UTF-16 length first, then the UTF-8 byte length
        let (_, pos) = utf8_length(self.data, start)?;
        let (len, pos) = utf8_length(self.data, pos)?;
        let bytes = self.data.get(pos..pos + len).ok_or_else(|| truncated(pos))?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn decode_utf16(&self, start: usize) -> Result<String> {
        let first = read_u16(self.data, start)? as usize;
        let (len, mut pos) = if first & 0x8000 != 0 {
            let second = read_u16(self.data, start + 2)? as usize;
            (((first & 0x7FFF) << 16) | second, start + 4)
        } else {
            (first, start + 2)
        };

        if pos + len * 2 > self.data.len() {
            return Err(truncated(pos));
        }
        let mut units = Vec::with_capacity(len);
        for _ in 0..len {
            units.push(read_u16(self.data, pos)?);
            pos += 2;
        }
        Ok(String::from_utf16_lossy(&units))
    }
}

fn utf8_length(data: &[u8], pos: usize) -> Result<(usize, usize)> {
    let first = read_u8(data, pos)? as usize;
    if first & 0x80 != 0 {
        let second = read_u8(data, pos + 1)? as usize;
        Ok((((first & 0x7F) << 8) | second, pos + 2))
    } else {
        Ok((first, pos + 1))
    }
}
