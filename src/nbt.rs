//! Tagged tree document model
//!
//! World documents are trees of named, typed tags: fixed-width integers and
//! floats, strings, homogeneous lists, arrays and nested compounds. This
//! module holds the in-memory representation ([`Tag`], [`Compound`],
//! [`Document`]) together with the big-endian binary encoding used on disk.
//! Compression and file handling live in [`crate::codec`].
//!
//! ## Accessors
//!
//! Compound accessors are strict: asking for an `i32` where a string is
//! stored fails with [`WorldError::TagMismatch`] instead of guessing.
//! Integer accessors accept any narrower integer tag, float accessors accept
//! both float widths.
//!
//! ```rust
//! use worldvault::nbt::{Compound, Tag};
//!
//! let mut data = Compound::new();
//! data.insert("DataVersion", Tag::Int(3700));
//! data.insert("LevelName", "Alpha");
//!
//! assert_eq!(data.i64("DataVersion").unwrap(), 3700);
//! assert!(data.i32("LevelName").is_err());
//! ```

use crate::error::{Result, WorldError};
use indexmap::IndexMap;
use serde::Serialize;
use std::borrow::Cow;

pub(crate) const TAG_END: u8 = 0;
pub(crate) const TAG_BYTE: u8 = 1;
pub(crate) const TAG_SHORT: u8 = 2;
pub(crate) const TAG_INT: u8 = 3;
pub(crate) const TAG_LONG: u8 = 4;
pub(crate) const TAG_FLOAT: u8 = 5;
pub(crate) const TAG_DOUBLE: u8 = 6;
pub(crate) const TAG_BYTE_ARRAY: u8 = 7;
pub(crate) const TAG_STRING: u8 = 8;
pub(crate) const TAG_LIST: u8 = 9;
pub(crate) const TAG_COMPOUND: u8 = 10;
pub(crate) const TAG_INT_ARRAY: u8 = 11;
pub(crate) const TAG_LONG_ARRAY: u8 = 12;

/// Deepest compound/list nesting accepted when decoding
pub const MAX_DEPTH: usize = 512;

/// A single typed value in a document tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Tag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    /// Homogeneous list; the element type is taken from the first item
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl Tag {
    /// Booleans are stored as a byte holding 0 or 1
    pub fn boolean(value: bool) -> Tag {
        Tag::Byte(i8::from(value))
    }

    /// Wire id of this tag
    pub fn id(&self) -> u8 {
        match self {
            Tag::Byte(_) => TAG_BYTE,
            Tag::Short(_) => TAG_SHORT,
            Tag::Int(_) => TAG_INT,
            Tag::Long(_) => TAG_LONG,
            Tag::Float(_) => TAG_FLOAT,
            Tag::Double(_) => TAG_DOUBLE,
            Tag::ByteArray(_) => TAG_BYTE_ARRAY,
            Tag::String(_) => TAG_STRING,
            Tag::List(_) => TAG_LIST,
            Tag::Compound(_) => TAG_COMPOUND,
            Tag::IntArray(_) => TAG_INT_ARRAY,
            Tag::LongArray(_) => TAG_LONG_ARRAY,
        }
    }

    /// Human-readable type name used in error messages
    pub fn type_name(&self) -> &'static str {
        type_name(self.id())
    }

    /// Any integer tag widened to `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Tag::Byte(v) => Some(v.into()),
            Tag::Short(v) => Some(v.into()),
            Tag::Int(v) => Some(v.into()),
            Tag::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Either float width as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Tag::Float(v) => Some(v.into()),
            Tag::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tag::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_compound_mut(&mut self) -> Option<&mut Compound> {
        match self {
            Tag::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tag]> {
        match self {
            Tag::List(items) => Some(items),
            _ => None,
        }
    }
}

fn type_name(id: u8) -> &'static str {
    match id {
        TAG_END => "end",
        TAG_BYTE => "byte",
        TAG_SHORT => "short",
        TAG_INT => "int",
        TAG_LONG => "long",
        TAG_FLOAT => "float",
        TAG_DOUBLE => "double",
        TAG_BYTE_ARRAY => "byte array",
        TAG_STRING => "string",
        TAG_LIST => "list",
        TAG_COMPOUND => "compound",
        TAG_INT_ARRAY => "int array",
        TAG_LONG_ARRAY => "long array",
        _ => "unknown",
    }
}

macro_rules! impl_from_for_tag {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Tag {
            fn from(value: $ty) -> Self {
                Tag::$variant(value)
            }
        })*
    };
}

impl_from_for_tag! {
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    Compound => Compound,
    Vec<Tag> => List,
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag::String(value.to_string())
    }
}

/// Insertion-ordered mapping of named tags
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Compound(IndexMap<String, Tag>);

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Tag> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Tag> {
        self.0.get_mut(key)
    }

    /// Insert or replace a tag, keeping the original position on replace
    pub fn insert(&mut self, key: impl Into<String>, tag: impl Into<Tag>) -> Option<Tag> {
        self.0.insert(key.into(), tag.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Tag> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tag)> {
        self.0.iter()
    }

    fn require(&self, key: &str) -> Result<&Tag> {
        self.0
            .get(key)
            .ok_or_else(|| WorldError::MissingTag(key.to_string()))
    }

    fn integer(&self, key: &str, expected: &'static str) -> Result<i64> {
        let tag = self.require(key)?;
        tag.as_i64().ok_or_else(|| mismatch(key, expected, tag))
    }

    pub fn i8(&self, key: &str) -> Result<i8> {
        let value = self.integer(key, "byte")?;
        i8::try_from(value).map_err(|_| mismatch(key, "byte", self.require(key).ok()))
    }

    pub fn i32(&self, key: &str) -> Result<i32> {
        let value = self.integer(key, "int")?;
        i32::try_from(value).map_err(|_| mismatch(key, "int", self.require(key).ok()))
    }

    pub fn i64(&self, key: &str) -> Result<i64> {
        self.integer(key, "long")
    }

    pub fn f32(&self, key: &str) -> Result<f32> {
        let tag = self.require(key)?;
        tag.as_f64().map(|v| v as f32).ok_or_else(|| mismatch(key, "float", tag))
    }

    pub fn f64(&self, key: &str) -> Result<f64> {
        let tag = self.require(key)?;
        tag.as_f64().ok_or_else(|| mismatch(key, "double", tag))
    }

    pub fn str(&self, key: &str) -> Result<&str> {
        let tag = self.require(key)?;
        tag.as_str().ok_or_else(|| mismatch(key, "string", tag))
    }

    pub fn list(&self, key: &str) -> Result<&[Tag]> {
        let tag = self.require(key)?;
        tag.as_list().ok_or_else(|| mismatch(key, "list", tag))
    }

    pub fn compound(&self, key: &str) -> Result<&Compound> {
        let tag = self.require(key)?;
        tag.as_compound().ok_or_else(|| mismatch(key, "compound", tag))
    }

    pub fn compound_mut(&mut self, key: &str) -> Result<&mut Compound> {
        let found = match self.0.get(key) {
            None => return Err(WorldError::MissingTag(key.to_string())),
            Some(tag) => tag.type_name(),
        };
        match self.0.get_mut(key) {
            Some(Tag::Compound(c)) => Ok(c),
            _ => Err(WorldError::TagMismatch {
                key: key.to_string(),
                expected: "compound",
                found,
            }),
        }
    }

    /// Like [`Compound::i32`] but a missing key yields `default`
    pub fn i32_or(&self, key: &str, default: i32) -> Result<i32> {
        if self.contains_key(key) {
            self.i32(key)
        } else {
            Ok(default)
        }
    }

    pub fn i64_or(&self, key: &str, default: i64) -> Result<i64> {
        if self.contains_key(key) {
            self.i64(key)
        } else {
            Ok(default)
        }
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str> {
        if self.contains_key(key) {
            self.str(key)
        } else {
            Ok(default)
        }
    }

    /// Nested compound at `key`, created empty when absent
    pub fn entry_compound(&mut self, key: &str) -> Result<&mut Compound> {
        if !self.contains_key(key) {
            self.insert(key, Compound::new());
        }
        self.compound_mut(key)
    }
}

fn mismatch<'a>(key: &str, expected: &'static str, found: impl Into<Option<&'a Tag>>) -> WorldError {
    WorldError::TagMismatch {
        key: key.to_string(),
        expected,
        found: found.into().map(Tag::type_name).unwrap_or("unknown"),
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        Compound(iter.into_iter().collect())
    }
}

/// On-disk compression wrapper of a document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Gzip,
    Zlib,
    Uncompressed,
}

/// A whole document: a named root compound plus how it was stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Name of the root compound, usually empty
    pub name: String,
    pub root: Compound,
    #[serde(skip)]
    pub encoding: Encoding,
}

impl Document {
    /// Gzip-encoded document with an unnamed root
    pub fn new(root: Compound) -> Self {
        Self {
            name: String::new(),
            root,
            encoding: Encoding::Gzip,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Decode an uncompressed tag stream into a document
///
/// The returned document is marked [`Encoding::Uncompressed`]; callers that
/// inflated the bytes first set the real encoding.
pub fn decode(bytes: &[u8]) -> Result<Document> {
    let mut reader = Reader { buf: bytes, pos: 0 };
    let id = reader.u8()?;
    if id != TAG_COMPOUND {
        return Err(WorldError::Malformed(format!(
            "root tag must be a compound, found {}",
            type_name(id)
        )));
    }
    let name = reader.string()?;
    let root = reader.compound(0)?;
    let trailing = reader.remaining();
    if trailing != 0 {
        return Err(WorldError::Malformed(format!(
            "{} trailing bytes after root compound",
            trailing
        )));
    }
    Ok(Document {
        name,
        root,
        encoding: Encoding::Uncompressed,
    })
}

/// Encode a document into an uncompressed tag stream
pub fn encode(doc: &Document) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4096);
    out.push(TAG_COMPOUND);
    write_string(&mut out, &doc.name)?;
    write_compound(&mut out, &doc.root)?;
    Ok(out)
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(WorldError::Malformed(format!(
                "unexpected end of data at offset {} (wanted {} bytes)",
                self.pos, n
            )));
        }
        let buf = self.buf;
        let slice = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn i8(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.array()?))
    }

    fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_be_bytes(self.array()?))
    }

    /// Read a signed length prefix and check it fits in the remaining input
    fn length(&mut self, min_element_size: usize) -> Result<usize> {
        let at = self.pos;
        let raw = self.i32()?;
        let len = usize::try_from(raw)
            .map_err(|_| WorldError::Malformed(format!("negative length {} at offset {}", raw, at)))?;
        if len.saturating_mul(min_element_size) > self.remaining() {
            return Err(WorldError::Malformed(format!(
                "length {} at offset {} exceeds remaining input",
                len, at
            )));
        }
        Ok(len)
    }

    fn string(&mut self) -> Result<String> {
        let len = usize::from(self.u16()?);
        let bytes = self.take(len)?;
        cesu8::from_java_cesu8(bytes)
            .map(Cow::into_owned)
            .map_err(|_| WorldError::Malformed(format!("invalid modified UTF-8 string at offset {}", self.pos - len)))
    }

    fn compound(&mut self, depth: usize) -> Result<Compound> {
        if depth > MAX_DEPTH {
            return Err(WorldError::Malformed(format!("nesting deeper than {}", MAX_DEPTH)));
        }
        let mut map = IndexMap::new();
        loop {
            let id = self.u8()?;
            if id == TAG_END {
                break;
            }
            let name = self.string()?;
            let tag = self.payload(id, depth + 1)?;
            map.insert(name, tag);
        }
        Ok(Compound(map))
    }

    fn payload(&mut self, id: u8, depth: usize) -> Result<Tag> {
        let tag = match id {
            TAG_BYTE => Tag::Byte(self.i8()?),
            TAG_SHORT => Tag::Short(self.i16()?),
            TAG_INT => Tag::Int(self.i32()?),
            TAG_LONG => Tag::Long(self.i64()?),
            TAG_FLOAT => Tag::Float(self.f32()?),
            TAG_DOUBLE => Tag::Double(self.f64()?),
            TAG_BYTE_ARRAY => {
                let len = self.length(1)?;
                Tag::ByteArray(self.take(len)?.iter().map(|&b| b as i8).collect())
            }
            TAG_STRING => Tag::String(self.string()?),
            TAG_LIST => self.list(depth)?,
            TAG_COMPOUND => Tag::Compound(self.compound(depth)?),
            TAG_INT_ARRAY => {
                let len = self.length(4)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.i32()?);
                }
                Tag::IntArray(items)
            }
            TAG_LONG_ARRAY => {
                let len = self.length(8)?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.i64()?);
                }
                Tag::LongArray(items)
            }
            other => {
                return Err(WorldError::Malformed(format!(
                    "unknown tag id {} at offset {}",
                    other,
                    self.pos - 1
                )))
            }
        };
        Ok(tag)
    }

    fn list(&mut self, depth: usize) -> Result<Tag> {
        if depth > MAX_DEPTH {
            return Err(WorldError::Malformed(format!("nesting deeper than {}", MAX_DEPTH)));
        }
        let element = self.u8()?;
        let len = self.length(min_payload_size(element))?;
        if element == TAG_END {
            if len != 0 {
                return Err(WorldError::Malformed("non-empty list of end tags".to_string()));
            }
            return Ok(Tag::List(Vec::new()));
        }
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.payload(element, depth + 1)?);
        }
        Ok(Tag::List(items))
    }
}

fn min_payload_size(id: u8) -> usize {
    match id {
        TAG_BYTE | TAG_COMPOUND => 1,
        TAG_SHORT | TAG_STRING => 2,
        TAG_INT | TAG_FLOAT | TAG_BYTE_ARRAY | TAG_INT_ARRAY | TAG_LONG_ARRAY => 4,
        TAG_LONG | TAG_DOUBLE => 8,
        TAG_LIST => 5,
        _ => 0,
    }
}

/// Strings go out as modified UTF-8: NUL as `C0 80`, astral chars as surrogate pairs
fn write_string(out: &mut Vec<u8>, value: &str) -> Result<()> {
    let bytes = cesu8::to_java_cesu8(value);
    let len = u16::try_from(bytes.len()).map_err(|_| {
        WorldError::invalid(format!("string of {} bytes is too long to encode", bytes.len()))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&bytes);
    Ok(())
}

fn write_length(out: &mut Vec<u8>, len: usize) -> Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| WorldError::invalid(format!("sequence of {} items is too long to encode", len)))?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn write_compound(out: &mut Vec<u8>, compound: &Compound) -> Result<()> {
    for (name, tag) in compound.iter() {
        out.push(tag.id());
        write_string(out, name)?;
        write_payload(out, tag)?;
    }
    out.push(TAG_END);
    Ok(())
}

fn write_payload(out: &mut Vec<u8>, tag: &Tag) -> Result<()> {
    match tag {
        Tag::Byte(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Short(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        Tag::ByteArray(items) => {
            write_length(out, items.len())?;
            out.extend(items.iter().map(|&b| b as u8));
        }
        Tag::String(s) => write_string(out, s)?,
        Tag::List(items) => {
            let element = items.first().map(Tag::id).unwrap_or(TAG_END);
            if let Some(odd) = items.iter().find(|t| t.id() != element) {
                return Err(WorldError::invalid(format!(
                    "list mixes {} and {} elements",
                    type_name(element),
                    odd.type_name()
                )));
            }
            out.push(element);
            write_length(out, items.len())?;
            for item in items {
                write_payload(out, item)?;
            }
        }
        Tag::Compound(c) => write_compound(out, c)?,
        Tag::IntArray(items) => {
            write_length(out, items.len())?;
            for v in items {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
        Tag::LongArray(items) => {
            write_length(out, items.len())?;
            for v in items {
                out.extend_from_slice(&v.to_be_bytes());
            }
        }
    }
    Ok(())
}
