//! Builders for compiled Android resources used by the unit tests.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::axml::{ANDROID_NS, TYPE_INT_BOOLEAN, TYPE_INT_DEC, TYPE_REFERENCE, TYPE_STRING};
use super::chunk::*;

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn pad4(buf: &mut Vec<u8>) {
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
}

/// Wrap a chunk body in a header whose size covers the whole chunk
fn chunk(kind: u16, header: &[u8], body: &[u8]) -> Vec<u8> {
    let header_size = 8 + header.len();
    let mut buf = Vec::new();
    put_u16(&mut buf, kind);
    put_u16(&mut buf, header_size as u16);
    put_u32(&mut buf, (header_size + body.len()) as u32);
    buf.extend_from_slice(header);
    buf.extend_from_slice(body);
    buf
}

pub fn string_pool(strings: &[&str], utf8: bool) -> Vec<u8> {
    let mut offsets = Vec::new();
    let mut data = Vec::new();
    for s in strings {
        put_u32(&mut offsets, data.len() as u32);
        if utf8 {
            let utf16_len = s.encode_utf16().count();
            for len in [utf16_len, s.len()] {
                if len > 0x7F {
                    data.push(((len >> 8) as u8) | 0x80);
                    data.push(len as u8);
                } else {
                    data.push(len as u8);
                }
            }
            data.extend_from_slice(s.as_bytes());
            data.push(0);
        } else {
            let units: Vec<u16> = s.encode_utf16().collect();
            if units.len() > 0x7FFF {
                put_u16(&mut data, ((units.len() >> 16) as u16) | 0x8000);
            }
            put_u16(&mut data, units.len() as u16);
            for unit in units {
                put_u16(&mut data, unit);
            }
            put_u16(&mut data, 0);
        }
    }
    pad4(&mut data);

    let mut header = Vec::new();
    put_u32(&mut header, strings.len() as u32);
    put_u32(&mut header, 0); // styles
    put_u32(&mut header, if utf8 { 1 << 8 } else { 0 });
    put_u32(&mut header, (28 + offsets.len()) as u32);
    put_u32(&mut header, 0);

    let mut body = offsets;
    body.extend_from_slice(&data);
    chunk(RES_STRING_POOL_TYPE, &header, &body)
}

#[derive(Debug, Clone)]
pub enum Value {
    Str(&'static str),
    Ref(u32),
    Int(i32),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub struct Attr {
    android: bool,
    name: &'static str,
    resource_id: Option<u32>,
    value: Value,
}

impl Attr {
    /// Attribute without namespace, e.g. `package`
    pub fn plain(name: &'static str, value: Value) -> Self {
        Self {
            android: false,
            name,
            resource_id: None,
            value,
        }
    }

    /// `android:` attribute with its framework resource id
    pub fn android(name: &'static str, resource_id: u32, value: Value) -> Self {
        Self {
            android: true,
            name,
            resource_id: Some(resource_id),
            value,
        }
    }
}

enum Node {
    Start(&'static str, Vec<Attr>),
    End(&'static str),
}

#[derive(Default)]
struct Interner {
    strings: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl Interner {
    fn intern(&mut self, s: &str) -> u32 {
        if let Some(index) = self.lookup.get(s) {
            return *index;
        }
        self.push(s)
    }

    fn push(&mut self, s: &str) -> u32 {
        let index = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.lookup.entry(s.to_string()).or_insert(index);
        index
    }
}

/// Binary XML document builder
#[derive(Default)]
pub struct AxmlBuilder {
    nodes: Vec<Node>,
    utf8: bool,
}

impl AxmlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn utf8(mut self) -> Self {
        self.utf8 = true;
        self
    }

    pub fn start(mut self, name: &'static str, attrs: Vec<Attr>) -> Self {
        self.nodes.push(Node::Start(name, attrs));
        self
    }

    pub fn end(mut self, name: &'static str) -> Self {
        self.nodes.push(Node::End(name));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = Interner::default();

        // Attribute names with resource ids come first so that the
        // resource map indices line up with the string pool.
        let mut resource_map = Vec::new();
        for node in &self.nodes {
            if let Node::Start(_, attrs) = node {
                for attr in attrs {
                    if let Some(id) = attr.resource_id
                        && !resource_map.contains(&id)
                    {
                        pool.push(attr.name);
                        resource_map.push(id);
                    }
                }
            }
        }
        let ns_prefix = pool.intern("android");
        let ns_uri = pool.intern(ANDROID_NS);
        for node in &self.nodes {
            match node {
                Node::Start(name, attrs) => {
                    pool.intern(name);
                    for attr in attrs {
                        if attr.resource_id.is_none() {
                            pool.intern(attr.name);
                        }
                        if let Value::Str(s) = attr.value {
                            pool.intern(s);
                        }
                    }
                }
                Node::End(name) => {
                    pool.intern(name);
                }
            }
        }

        let attr_name_index = |attr: &Attr| -> u32 {
            match attr.resource_id {
                Some(id) => resource_map.iter().position(|r| *r == id).unwrap() as u32,
                None => pool.lookup[attr.name],
            }
        };

        let strings: Vec<&str> = pool.strings.iter().map(String::as_str).collect();
        let mut body = string_pool(&strings, self.utf8);

        let mut map_body = Vec::new();
        for id in &resource_map {
            put_u32(&mut map_body, *id);
        }
        body.extend(chunk(RES_XML_RESOURCE_MAP_TYPE, &[], &map_body));

        let node_header = |line: u32| {
            let mut h = Vec::new();
            put_u32(&mut h, line);
            put_u32(&mut h, NO_INDEX);
            h
        };

        let mut ns_body = Vec::new();
        put_u32(&mut ns_body, ns_prefix);
        put_u32(&mut ns_body, ns_uri);
        body.extend(chunk(RES_XML_START_NAMESPACE_TYPE, &node_header(1), &ns_body));

        for (line, node) in self.nodes.iter().enumerate() {
            let line = line as u32 + 2;
            match node {
                Node::Start(name, attrs) => {
                    let mut ext = Vec::new();
                    put_u32(&mut ext, NO_INDEX);
                    put_u32(&mut ext, pool.lookup[*name]);
                    put_u16(&mut ext, 20); // attribute start
                    put_u16(&mut ext, 20); // attribute size
                    put_u16(&mut ext, attrs.len() as u16);
                    put_u16(&mut ext, 0);
                    put_u16(&mut ext, 0);
                    put_u16(&mut ext, 0);
                    for attr in attrs {
                        put_u32(&mut ext, if attr.android { ns_uri } else { NO_INDEX });
                        put_u32(&mut ext, attr_name_index(attr));
                        let (raw, data_type, data) = match attr.value {
                            Value::Str(s) => {
                                let index = pool.lookup[s];
                                (index, TYPE_STRING, index)
                            }
                            Value::Ref(id) => (NO_INDEX, TYPE_REFERENCE, id),
                            Value::Int(v) => (NO_INDEX, TYPE_INT_DEC, v as u32),
                            Value::Bool(b) => {
                                (NO_INDEX, TYPE_INT_BOOLEAN, if b { 0xFFFF_FFFF } else { 0 })
                            }
                        };
                        put_u32(&mut ext, raw);
                        put_u16(&mut ext, 8);
                        ext.push(0);
                        ext.push(data_type);
                        put_u32(&mut ext, data);
                    }
                    body.extend(chunk(RES_XML_START_ELEMENT_TYPE, &node_header(line), &ext));
                }
                Node::End(name) => {
                    let mut ext = Vec::new();
                    put_u32(&mut ext, NO_INDEX);
                    put_u32(&mut ext, pool.lookup[*name]);
                    body.extend(chunk(RES_XML_END_ELEMENT_TYPE, &node_header(line), &ext));
                }
            }
        }

        body.extend(chunk(RES_XML_END_NAMESPACE_TYPE, &node_header(0), &ns_body));
        chunk(RES_XML_TYPE, &[], &body)
    }
}

/// Manifest with a package, version name and application label
pub fn simple_manifest(package: &'static str, version: &'static str, label: Value) -> Vec<u8> {
    AxmlBuilder::new()
        .start(
            "manifest",
            vec![
                Attr::android("versionCode", 0x0101_021b, Value::Int(42)),
                Attr::android("versionName", 0x0101_021c, Value::Str(version)),
                Attr::plain("package", Value::Str(package)),
            ],
        )
        .start("uses-sdk", vec![])
        .end("uses-sdk")
        .start(
            "application",
            vec![
                Attr::android("label", 0x0101_0001, label),
                Attr::android("debuggable", 0x0101_000f, Value::Bool(true)),
            ],
        )
        .end("application")
        .end("manifest")
        .build()
}

#[derive(Debug, Clone, Copy)]
pub enum Entry {
    Str(u32),
    Ref(u32),
}

struct TypeChunk {
    type_id: u8,
    locale: [u8; 4],
    sparse: bool,
    compact: bool,
    entries: Vec<Option<Entry>>,
}

/// `resources.arsc` builder with a single package
pub struct ArscBuilder {
    package_id: u8,
    strings: Vec<&'static str>,
    types: Vec<TypeChunk>,
}

impl ArscBuilder {
    pub fn new(package_id: u8) -> Self {
        Self {
            package_id,
            strings: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Add a value to the global string pool, returning its index
    pub fn string(&mut self, s: &'static str) -> u32 {
        self.strings.push(s);
        self.strings.len() as u32 - 1
    }

    /// Add a dense type chunk; `locale` is e.g. `""` or `"fr"`
    pub fn add_type(&mut self, type_id: u8, locale: &str, entries: Vec<Option<Entry>>) {
        self.push_type(type_id, locale, false, false, entries);
    }

    pub fn add_sparse_type(&mut self, type_id: u8, locale: &str, entries: Vec<Option<Entry>>) {
        self.push_type(type_id, locale, true, false, entries);
    }

    pub fn add_compact_type(&mut self, type_id: u8, locale: &str, entries: Vec<Option<Entry>>) {
        self.push_type(type_id, locale, false, true, entries);
    }

    fn push_type(
        &mut self,
        type_id: u8,
        locale: &str,
        sparse: bool,
        compact: bool,
        entries: Vec<Option<Entry>>,
    ) {
        let mut code = [0u8; 4];
        for (slot, byte) in code.iter_mut().zip(locale.bytes()) {
            *slot = byte;
        }
        self.types.push(TypeChunk {
            type_id,
            locale: code,
            sparse,
            compact,
            entries,
        });
    }

    pub fn build(&self) -> Vec<u8> {
        let mut table_header = Vec::new();
        put_u32(&mut table_header, 1);

        let mut body = string_pool(&self.strings, true);
        body.extend(self.build_package());
        chunk(RES_TABLE_TYPE, &table_header, &body)
    }

    fn build_package(&self) -> Vec<u8> {
        const PACKAGE_HEADER_SIZE: u32 = 288;

        let type_strings = string_pool(&["attr", "drawable", "string"], false);
        let key_strings = string_pool(&["app_name"], false);

        let mut header = Vec::new();
        put_u32(&mut header, self.package_id as u32);
        let mut name = [0u8; 256];
        for (slot, unit) in name.chunks_mut(2).zip("com.example".encode_utf16()) {
            slot.copy_from_slice(&unit.to_le_bytes());
        }
        header.extend_from_slice(&name);
        put_u32(&mut header, PACKAGE_HEADER_SIZE);
        put_u32(&mut header, 3);
        put_u32(&mut header, PACKAGE_HEADER_SIZE + type_strings.len() as u32);
        put_u32(&mut header, 1);
        put_u32(&mut header, 0);

        let mut body = type_strings;
        body.extend(key_strings);
        for ty in &self.types {
            body.extend(build_type_chunk(ty));
        }
        chunk(RES_TABLE_PACKAGE_TYPE, &header, &body)
    }
}

fn build_type_chunk(ty: &TypeChunk) -> Vec<u8> {
    const CONFIG_SIZE: u32 = 28;

    let encode = |entry: Entry| -> Vec<u8> {
        let (data_type, data) = match entry {
            Entry::Str(index) => (TYPE_STRING, index),
            Entry::Ref(id) => (TYPE_REFERENCE, id),
        };
        let mut buf = Vec::new();
        if ty.compact {
            put_u16(&mut buf, 0); // key index
            put_u16(&mut buf, 0x0008 | ((data_type as u16) << 8));
            put_u32(&mut buf, data);
        } else {
            put_u16(&mut buf, 8);
            put_u16(&mut buf, 0);
            put_u32(&mut buf, 0); // key index
            put_u16(&mut buf, 8);
            buf.push(0);
            buf.push(data_type);
            put_u32(&mut buf, data);
        }
        buf
    };

    let mut offsets = Vec::new();
    let mut entries = Vec::new();
    let mut count = 0u32;
    for (index, entry) in ty.entries.iter().enumerate() {
        match entry {
            Some(entry) => {
                if ty.sparse {
                    put_u16(&mut offsets, index as u16);
                    put_u16(&mut offsets, (entries.len() / 4) as u16);
                    count += 1;
                } else {
                    put_u32(&mut offsets, entries.len() as u32);
                }
                entries.extend(encode(*entry));
            }
            None if !ty.sparse => put_u32(&mut offsets, NO_INDEX),
            None => {}
        }
    }
    if !ty.sparse {
        count = ty.entries.len() as u32;
    }

    let header_size = 8 + 12 + CONFIG_SIZE;
    let mut header = Vec::new();
    header.push(ty.type_id);
    header.push(if ty.sparse { 0x01 } else { 0x00 });
    put_u16(&mut header, 0);
    put_u32(&mut header, count);
    put_u32(&mut header, header_size + offsets.len() as u32);
    put_u32(&mut header, CONFIG_SIZE);
    put_u32(&mut header, 0); // mcc, mnc
    header.extend_from_slice(&ty.locale);
    header.resize((header_size - 8) as usize, 0);

    let mut body = offsets;
    body.extend(entries);
    chunk(RES_TABLE_TYPE_TYPE, &header, &body)
}

/// Zip an APK from its compiled manifest and optional resource table
pub fn create_apk(manifest: &[u8], resources: Option<&[u8]>) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    zip.start_file("AndroidManifest.xml", options).unwrap();
    zip.write_all(manifest).unwrap();
    if let Some(resources) = resources {
        zip.start_file("resources.arsc", options).unwrap();
        zip.write_all(resources).unwrap();
    }
    zip.start_file("classes.dex", options).unwrap();
    zip.write_all(b"dex\n035\0").unwrap();
    zip.finish().unwrap().into_inner()
}
