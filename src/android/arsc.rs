//! Minimal reader for the compiled resource table (`resources.arsc`).
//!
//! Supports what is needed to turn a string resource reference into text:
//! the global string pool, packages, and type chunks with dense, 16-bit,
//! sparse or compact entry layouts. Bag (complex) entries are ignored.

use log::{debug, trace};

use super::axml::{TYPE_REFERENCE, TYPE_STRING};
use super::chunk::{
    Chunk, NO_INDEX, RES_STRING_POOL_TYPE, RES_TABLE_PACKAGE_TYPE, RES_TABLE_TYPE,
    RES_TABLE_TYPE_TYPE, StringPool, read_u8, read_u16, read_u32,
};
use crate::error::{Error, Result};

const MAX_REFERENCE_DEPTH: usize = 8;

const TYPE_FLAG_SPARSE: u8 = 0x01;
const TYPE_FLAG_OFFSET16: u8 = 0x02;

const ENTRY_FLAG_COMPLEX: u16 = 0x0001;
const ENTRY_FLAG_COMPACT: u16 = 0x0008;

/// Offset of `ResTable_config` inside a type chunk
const CONFIG_OFFSET: usize = 20;

pub struct ResourceTable<'a> {
    strings: StringPool<'a>,
    packages: Vec<Package<'a>>,
}

struct Package<'a> {
    id: u8,
    types: Vec<TypeChunk<'a>>,
}

struct TypeChunk<'a> {
    id: u8,
    flags: u8,
    data: &'a [u8],
    header_size: usize,
    entry_count: usize,
    entries_start: usize,
    /// Config has no language or region qualifier
    default_locale: bool,
}

impl<'a> ResourceTable<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let root = Chunk::parse(data, 0)?;
        if root.kind != RES_TABLE_TYPE {
            return Err(Error::invalid_file_type(format!(
                "not a resource table (chunk type {:#06x})",
                root.kind
            )));
        }
        let data = root.bytes(data);

        let mut strings = None;
        let mut packages = Vec::new();
        for chunk in root.children(data) {
            let chunk = chunk?;
            match chunk.kind {
                RES_STRING_POOL_TYPE if strings.is_none() => {
                    strings = Some(StringPool::parse(chunk.bytes(data))?);
                }
                RES_TABLE_PACKAGE_TYPE => packages.push(Package::parse(chunk.bytes(data))?),
                other => trace!("Skipping resource table chunk {:#06x}", other),
            }
        }

        let strings = strings
            .ok_or_else(|| Error::invalid_file_type("resource table has no string pool"))?;
        debug!(
            "Parsed resource table: {} strings, {} packages",
            strings.len(),
            packages.len()
        );
        Ok(Self { strings, packages })
    }

    /// Resolve a string resource id (`0xPPTTEEEE`) to its text.
    ///
    /// The value from the configuration without a locale qualifier wins;
    /// otherwise the first non-empty value found. Returns `None` when the
    /// id does not name a string.
    pub fn resolve_string(&self, id: u32) -> Result<Option<String>> {
        self.resolve(id, 0)
    }

    fn resolve(&self, id: u32, depth: usize) -> Result<Option<String>> {
        if depth > MAX_REFERENCE_DEPTH {
            return Err(Error::invalid_file_type(format!(
                "resource reference chain too deep at {:#010x}",
                id
            )));
        }

        let package_id = (id >> 24) as u8;
        let type_id = (id >> 16) as u8;
        let entry = (id & 0xFFFF) as usize;

        let Some(package) = self.packages.iter().find(|p| p.id == package_id) else {
            debug!("No package {:#04x} for resource {:#010x}", package_id, id);
            return Ok(None);
        };

        let mut candidates: Vec<&TypeChunk> =
            package.types.iter().filter(|t| t.id == type_id).collect();
        candidates.sort_by_key(|t| !t.default_locale);

        for ty in candidates {
            let Some((data_type, data)) = ty.value(entry)? else {
                continue;
            };
            let resolved = match data_type {
                TYPE_STRING => Some(self.strings.get(data)?),
                TYPE_REFERENCE => self.resolve(data, depth + 1)?,
                _ => None,
            };
            if let Some(text) = resolved
                && !text.is_empty()
            {
                return Ok(Some(text));
            }
        }
        Ok(None)
    }
}

impl<'a> Package<'a> {
    fn parse(data: &'a [u8]) -> Result<Self> {
        let chunk = Chunk::parse(data, 0)?;
        let id = read_u32(data, 8)? as u8;

        let mut types = Vec::new();
        for child in chunk.children(data) {
            let child = child?;
            if child.kind == RES_TABLE_TYPE_TYPE {
                types.push(TypeChunk::parse(child.bytes(data))?);
            }
        }
        Ok(Self { id, types })
    }
}

impl<'a> TypeChunk<'a> {
    fn parse(data: &'a [u8]) -> Result<Self> {
        let chunk = Chunk::parse(data, 0)?;
        let id = read_u8(data, 8)?;
        let flags = read_u8(data, 9)?;
        let entry_count = read_u32(data, 12)? as usize;
        let entries_start = read_u32(data, 16)? as usize;

        let config_size = read_u32(data, CONFIG_OFFSET)? as usize;
        let default_locale = if config_size >= 12 {
            let locale = data
                .get(CONFIG_OFFSET + 8..CONFIG_OFFSET + 12)
                .ok_or_else(|| Error::invalid_file_type("truncated type config"))?;
            locale.iter().all(|b| *b == 0)
        } else {
            true
        };

        let offset_width = if flags & TYPE_FLAG_OFFSET16 != 0 && flags & TYPE_FLAG_SPARSE == 0 {
            2
        } else {
            4
        };
        if chunk.header_size + entry_count * offset_width > chunk.size || entries_start > chunk.size
        {
            return Err(Error::invalid_file_type(format!(
                "type chunk {} offsets out of bounds",
                id
            )));
        }

        Ok(Self {
            id,
            flags,
            data,
            header_size: chunk.header_size,
            entry_count,
            entries_start,
            default_locale,
        })
    }

    /// Offset of an entry relative to `entries_start`
    fn entry_offset(&self, index: usize) -> Result<Option<usize>> {
        let table = self.header_size;
        if self.flags & TYPE_FLAG_SPARSE != 0 {
            for i in 0..self.entry_count {
                let pos = table + i * 4;
                if read_u16(self.data, pos)? as usize == index {
                    return Ok(Some(read_u16(self.data, pos + 2)? as usize * 4));
                }
            }
            return Ok(None);
        }

        if index >= self.entry_count {
            return Ok(None);
        }
        if self.flags & TYPE_FLAG_OFFSET16 != 0 {
            let offset = read_u16(self.data, table + index * 2)?;
            return Ok((offset != 0xFFFF).then_some(offset as usize * 4));
        }
        let offset = read_u32(self.data, table + index * 4)?;
        Ok((offset != NO_INDEX).then_some(offset as usize))
    }

    /// `(data_type, data)` of a simple entry
    fn value(&self, index: usize) -> Result<Option<(u8, u32)>> {
        let Some(offset) = self.entry_offset(index)? else {
            return Ok(None);
        };
        let pos = self.entries_start + offset;
        let size = read_u16(self.data, pos)? as usize;
        let flags = read_u16(self.data, pos + 2)?;

        if flags & ENTRY_FLAG_COMPACT != 0 {
            return Ok(Some(((flags >> 8) as u8, read_u32(self.data, pos + 4)?)));
        }
        if flags & ENTRY_FLAG_COMPLEX != 0 {
            return Ok(None);
        }

        let value = pos + size;
        Ok(Some((
            read_u8(self.data, value + 3)?,
            read_u32(self.data, value + 4)?,
        )))
    }
}
