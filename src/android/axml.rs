//! Minimal reader for Android binary XML (compiled `AndroidManifest.xml`).
//!
//! Only elements and their attributes are decoded; text nodes, comments
//! and namespace declarations are skipped.

use log::{debug, trace};

use super::chunk::{
    Chunk, NO_INDEX, RES_STRING_POOL_TYPE, RES_XML_END_ELEMENT_TYPE, RES_XML_RESOURCE_MAP_TYPE,
    RES_XML_START_ELEMENT_TYPE, RES_XML_TYPE, StringPool, read_u8, read_u16, read_u32,
};
use crate::error::{Error, Result};

pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

/// Framework attribute ids, used when attribute names are stripped
pub const ATTR_LABEL: u32 = 0x0101_0001;
pub const ATTR_VERSION_CODE: u32 = 0x0101_021b;
pub const ATTR_VERSION_NAME: u32 = 0x0101_021c;

// Res_value data types
pub const TYPE_REFERENCE: u8 = 0x01;
pub const TYPE_STRING: u8 = 0x03;
pub const TYPE_INT_DEC: u8 = 0x10;
pub const TYPE_INT_HEX: u8 = 0x11;
pub const TYPE_INT_BOOLEAN: u8 = 0x12;

const NODE_HEADER_SIZE: usize = 16;
const ATTRIBUTE_MIN_SIZE: usize = 20;

/// Typed value of a compiled attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    String(String),
    /// `@type/name` reference to a resource id
    Reference(u32),
    Integer(i32),
    Hex(u32),
    Boolean(bool),
    Other { data_type: u8, data: u32 },
}

impl AttributeValue {
    /// Text form of a literal value; references have none
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttributeValue::String(s) => Some(s.clone()),
            AttributeValue::Integer(v) => Some(v.to_string()),
            AttributeValue::Hex(v) => Some(format!("0x{:08x}", v)),
            AttributeValue::Boolean(b) => Some(b.to_string()),
            AttributeValue::Reference(_) | AttributeValue::Other { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    pub resource_id: Option<u32>,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    /// Nesting depth, the root element is 0
    pub depth: usize,
    pub attributes: Vec<XmlAttribute>,
}

impl XmlElement {
    /// Look up an attribute by name, falling back to its framework
    /// resource id when the manifest had its attribute names stripped.
    pub fn attribute(&self, name: &str, resource_id: Option<u32>) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .or_else(|| {
                let id = resource_id?;
                self.attributes.iter().find(|a| a.resource_id == Some(id))
            })
            .map(|a| &a.value)
    }
}

/// A parsed binary XML document, flattened to its elements in document order
#[derive(Debug, Clone, Default)]
pub struct XmlDocument {
    pub elements: Vec<XmlElement>,
}

impl XmlDocument {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let root = Chunk::parse(data, 0)?;
        if root.kind != RES_XML_TYPE {
            return Err(Error::invalid_file_type(format!(
                "not a binary XML document (chunk type {:#06x})",
                root.kind
            )));
        }
        let data = root.bytes(data);

        let mut pool: Option<StringPool> = None;
        let mut resource_map: Vec<u32> = Vec::new();
        let mut elements = Vec::new();
        let mut depth = 0usize;

        for chunk in root.children(data) {
            let chunk = chunk?;
            match chunk.kind {
                RES_STRING_POOL_TYPE => {
                    pool = Some(StringPool::parse(chunk.bytes(data))?);
                }
                RES_XML_RESOURCE_MAP_TYPE => {
                    let bytes = chunk.bytes(data);
                    resource_map = (chunk.header_size..chunk.size)
                        .step_by(4)
                        .map(|offset| read_u32(bytes, offset))
                        .collect::<Result<_>>()?;
                }
                RES_XML_START_ELEMENT_TYPE => {
                    let pool = pool
                        .as_ref()
                        .ok_or_else(|| Error::invalid_file_type("element before string pool"))?;
                    let element =
                        parse_start_element(chunk.bytes(data), pool, &resource_map, depth)?;
                    trace!("<{}> at depth {}", element.name, depth);
                    elements.push(element);
                    depth += 1;
                }
                RES_XML_END_ELEMENT_TYPE => {
                    depth = depth.saturating_sub(1);
                }
                other => {
                    trace!("Skipping binary XML chunk {:#06x}", other);
                }
            }
        }

        debug!("Parsed binary XML with {} elements", elements.len());
        Ok(Self { elements })
    }

    /// First element with the given name
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn find_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements.iter().filter(move |e| e.name == name)
    }
}

fn parse_start_element(
    data: &[u8],
    pool: &StringPool,
    resource_map: &[u32],
    depth: usize,
) -> Result<XmlElement> {
    let ext = NODE_HEADER_SIZE;
    let name = pool.get(read_u32(data, ext + 4)?)?;
    let attr_start = read_u16(data, ext + 8)? as usize;
    let attr_size = read_u16(data, ext + 10)? as usize;
    let attr_count = read_u16(data, ext + 12)? as usize;

    if attr_count > 0 && attr_size < ATTRIBUTE_MIN_SIZE {
        return Err(Error::invalid_file_type(format!(
            "attribute size {} too small in <{}>",
            attr_size, name
        )));
    }

    let mut attributes = Vec::with_capacity(attr_count.min(64));
    for i in 0..attr_count {
        let offset = ext + attr_start + i * attr_size;
        let name_index = read_u32(data, offset + 4)?;
        attributes.push(XmlAttribute {
            namespace: pool.get_optional(read_u32(data, offset)?)?,
            name: pool.get(name_index)?,
            resource_id: resource_map.get(name_index as usize).copied(),
            value: parse_value(data, offset + 8, pool)?,
        });
    }

    Ok(XmlElement {
        name,
        depth,
        attributes,
    })
}

/// Decode `{u32 raw_value, Res_value}` at `offset`
fn parse_value(data: &[u8], offset: usize, pool: &StringPool) -> Result<AttributeValue> {
    let raw_value = read_u32(data, offset)?;
    let data_type = read_u8(data, offset + 7)?;
    let value = read_u32(data, offset + 8)?;

    Ok(match data_type {
        TYPE_STRING => AttributeValue::String(pool.get(value)?),
        _ if raw_value != NO_INDEX => AttributeValue::String(pool.get(raw_value)?),
        TYPE_REFERENCE => AttributeValue::Reference(value),
        TYPE_INT_DEC => AttributeValue::Integer(value as i32),
        TYPE_INT_HEX => AttributeValue::Hex(value),
        TYPE_INT_BOOLEAN => AttributeValue::Boolean(value != 0),
        _ => AttributeValue::Other { data_type, data: value },
    })
}
