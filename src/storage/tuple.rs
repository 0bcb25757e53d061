use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use crate::core::error::{Result, StorageError};
use crate::storage::ids::RecordId;

/// Maximum number of bytes stored for a string field.
pub const STRING_LEN: usize = 128;

// String fields: length (u32) + STRING_LEN bytes
const STRING_WIDTH: usize = 4 + STRING_LEN;
const INT_WIDTH: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Str,
}

impl Type {
    pub fn width(&self) -> usize {
        match self {
            Type::Int => INT_WIDTH,
            Type::Str => STRING_WIDTH,
        }
    }

    pub fn default_field(&self) -> Field {
        match self {
            Type::Int => Field::Int(0),
            Type::Str => Field::Str(String::new()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "string"),
        }
    }
}

impl FromStr for Type {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(Type::Int),
            "string" | "str" | "text" => Ok(Type::Str),
            other => Err(StorageError::TypeMismatch(format!("unknown type '{}'", other))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> Type {
        match self {
            Field::Int(_) => Type::Int,
            Field::Str(_) => Type::Str,
        }
    }

    pub fn parse(field_type: Type, raw: &str) -> Result<Self> {
        match field_type {
            Type::Int => raw
                .trim()
                .parse::<i32>()
                .map(Field::Int)
                .map_err(|e| StorageError::TypeMismatch(format!("'{}' is not an int: {}", raw, e))),
            Type::Str => Ok(Field::Str(raw.to_string())),
        }
    }

    /// Encodes into `buf`, which must be exactly `self.field_type().width()` bytes.
    pub fn write_to(&self, buf: &mut [u8]) {
        match self {
            Field::Int(v) => LittleEndian::write_i32(&mut buf[..INT_WIDTH], *v),
            Field::Str(s) => {
                let bytes = truncate_utf8(s, STRING_LEN);
                LittleEndian::write_u32(&mut buf[0..4], bytes.len() as u32);
                buf[4..4 + bytes.len()].copy_from_slice(bytes);
                buf[4 + bytes.len()..STRING_WIDTH].fill(0);
            }
        }
    }

    pub fn read_from(field_type: Type, buf: &[u8]) -> Result<Self> {
        match field_type {
            Type::Int => Ok(Field::Int(LittleEndian::read_i32(&buf[..INT_WIDTH]))),
            Type::Str => {
                let len = LittleEndian::read_u32(&buf[0..4]) as usize;
                if len > STRING_LEN {
                    return Err(StorageError::Corrupt(format!("string length {} exceeds {}", len, STRING_LEN)));
                }
                let s = std::str::from_utf8(&buf[4..4 + len])
                    .map_err(|e| StorageError::Corrupt(e.to_string()))?;
                Ok(Field::Str(s.to_string()))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

fn truncate_utf8(s: &str, max: usize) -> &[u8] {
    if s.len() <= max {
        return s.as_bytes();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s.as_bytes()[..end]
}

#[derive(Clone, Debug)]
pub struct TdItem {
    pub field_type: Type,
    pub field_name: Option<String>,
}

/// Schema of a tuple. Equality and hashing only look at field types.
#[derive(Clone, Debug)]
pub struct TupleDesc {
    items: Vec<TdItem>,
}

impl TupleDesc {
    pub fn new(types: Vec<Type>, names: Vec<Option<String>>) -> Self {
        let items = types
            .into_iter()
            .zip(names.into_iter().chain(std::iter::repeat(None)))
            .map(|(field_type, field_name)| TdItem { field_type, field_name })
            .collect();
        Self { items }
    }

    pub fn from_types(types: Vec<Type>) -> Self {
        Self::new(types, Vec::new())
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn field_type(&self, i: usize) -> Option<Type> {
        self.items.get(i).map(|item| item.field_type)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.items.get(i).and_then(|item| item.field_name.as_deref())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.field_name.as_deref() == Some(name))
    }

    /// Fixed encoded width of one tuple in bytes.
    pub fn byte_width(&self) -> usize {
        self.items.iter().map(|item| item.field_type.width()).sum()
    }

    pub fn merge(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        let items = a.items.iter().chain(b.items.iter()).cloned().collect();
        TupleDesc { items }
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for TupleDesc {}

impl Hash for TupleDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for item in &self.items {
            item.field_type.hash(state);
        }
    }
}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .items
            .iter()
            .map(|item| format!("{}({})", item.field_name.as_deref().unwrap_or("null"), item.field_type))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

#[derive(Clone, Debug)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: Arc<TupleDesc>) -> Self {
        let fields = desc.items.iter().map(|item| item.field_type.default_field()).collect();
        Self {
            desc,
            fields,
            record_id: None,
        }
    }

    pub fn with_fields(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Self> {
        if fields.len() != desc.num_fields() {
            return Err(StorageError::TypeMismatch(format!(
                "expected {} fields, got {}",
                desc.num_fields(),
                fields.len()
            )));
        }
        let mut tuple = Self::new(desc);
        for (i, field) in fields.into_iter().enumerate() {
            tuple.set_field(i, field)?;
        }
        Ok(tuple)
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn set_field(&mut self, i: usize, field: Field) -> Result<()> {
        match self.desc.field_type(i) {
            Some(t) if t == field.field_type() => {
                self.fields[i] = field;
                Ok(())
            }
            Some(t) => Err(StorageError::TypeMismatch(format!(
                "field {} is {}, got {}",
                i,
                t,
                field.field_type()
            ))),
            None => Err(StorageError::TypeMismatch(format!("no field at index {}", i))),
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Encodes the fields into `buf` (exactly `desc.byte_width()` bytes).
    pub fn write_to(&self, buf: &mut [u8]) {
        let mut offset = 0;
        for field in &self.fields {
            let width = field.field_type().width();
            field.write_to(&mut buf[offset..offset + width]);
            offset += width;
        }
    }

    pub fn read_from(desc: Arc<TupleDesc>, buf: &[u8]) -> Result<Self> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for item in &desc.items {
            let width = item.field_type.width();
            fields.push(Field::read_from(item.field_type, &buf[offset..offset + width])?);
            offset += width;
        }
        Ok(Self {
            desc,
            fields,
            record_id: None,
        })
    }
}

/// Tuples compare by field values; the record id is location, not content.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.fields.iter().map(|field| field.to_string()).collect();
        write!(f, "{}", parts.join("\t"))
    }
}
