//! Record model and canonical binary encodings.
//!
//! A write record is constructed transiently (by the object mapper or by
//! application code), submitted by value to the write engine, and owned by
//! the type-state afterwards. Each record reduces to a canonical byte string
//! which doubles as its dedup identity and as its payload encoding:
//!
//! - object records: one cell per schema field, in schema order
//! - list/set records: element-ordinal count followed by the ordinals
//! - map records: entry count followed by (key, value) ordinal pairs
//!
//! A cell starts with a presence byte (0 = null) followed by the typed body.
//! Cells are self-delimiting, which lets the read side skip excluded fields
//! without materializing them.

use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use snafu::Snafu;

use crate::error::Result;
use crate::schema::{FieldType, ObjectSchema};
use crate::types::Ordinal;
use crate::varint::{
    read_len_prefixed, read_u8, read_varint_u32, read_varint_u64, write_varint_u32,
    write_varint_u64, zigzag_decode, zigzag_encode,
};

/// Errors raised while populating a write record.
#[derive(Debug, Snafu)]
pub enum RecordError {
    /// The schema has no field with the given name.
    #[snafu(display("Type {type_name} has no field named '{field}'"))]
    UnknownField {
        /// The record's type name.
        type_name: String,
        /// The unknown field name.
        field: String,
    },

    /// The value's type does not match the schema field's type.
    #[snafu(display("Value for field '{field}' of type {type_name} does not match the schema"))]
    TypeMismatch {
        /// The record's type name.
        type_name: String,
        /// The mismatched field name.
        field: String,
    },
}

/// A single field value of an object record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent value.
    Null,
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// Inline UTF-8 string.
    String(String),
    /// Inline byte array.
    Bytes(Vec<u8>),
    /// Ordinal of a record in the referenced type.
    Reference(Ordinal),
}

impl FieldValue {
    /// Returns true if this value can populate a field of the given type.
    ///
    /// Null is valid for every field type.
    pub fn matches(&self, field_type: &FieldType) -> bool {
        matches!(
            (self, field_type),
            (FieldValue::Null, _)
                | (FieldValue::Int(_), FieldType::Int)
                | (FieldValue::Long(_), FieldType::Long)
                | (FieldValue::Float(_), FieldType::Float)
                | (FieldValue::Double(_), FieldType::Double)
                | (FieldValue::Bool(_), FieldType::Bool)
                | (FieldValue::String(_), FieldType::String)
                | (FieldValue::Bytes(_), FieldType::Bytes)
                | (FieldValue::Reference(_), FieldType::Reference { .. })
        )
    }
}

/// A record being assembled against an object schema.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    schema: Arc<ObjectSchema>,
    values: Vec<FieldValue>,
}

impl ObjectRecord {
    /// Creates a record with every field null.
    pub fn new(schema: Arc<ObjectSchema>) -> Self {
        let values = vec![FieldValue::Null; schema.fields.len()];
        Self { schema, values }
    }

    /// Sets a field by name, validating the value type against the schema.
    pub fn set(
        &mut self,
        field: &str,
        value: FieldValue,
    ) -> std::result::Result<&mut Self, RecordError> {
        let index = self.schema.field_index(field).ok_or_else(|| RecordError::UnknownField {
            type_name: self.schema.name.clone(),
            field: field.to_string(),
        })?;
        if !value.matches(&self.schema.fields[index].field_type) {
            return Err(RecordError::TypeMismatch {
                type_name: self.schema.name.clone(),
                field: field.to_string(),
            });
        }
        self.values[index] = value;
        Ok(self)
    }

    /// Resets every field to null so the record can be reused.
    pub fn reset(&mut self) {
        for value in &mut self.values {
            *value = FieldValue::Null;
        }
    }

    /// Returns the record's schema.
    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    /// Returns the field values in schema order.
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }
}

/// A record holding an ordered collection of element ordinals.
#[derive(Debug, Clone, Default)]
pub struct ListRecord {
    /// Element ordinals in list order.
    pub elements: Vec<Ordinal>,
}

impl ListRecord {
    /// Creates an empty list record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element ordinal.
    pub fn add_element(&mut self, ordinal: Ordinal) -> &mut Self {
        self.elements.push(ordinal);
        self
    }
}

/// A record holding an unordered collection of element ordinals.
///
/// Iteration order on the wire is decided by the write engine using the
/// configured hash-code finder, not by insertion order.
#[derive(Debug, Clone, Default)]
pub struct SetRecord {
    /// Element ordinals in insertion order.
    pub elements: Vec<Ordinal>,
}

impl SetRecord {
    /// Creates an empty set record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element ordinal.
    pub fn add_element(&mut self, ordinal: Ordinal) -> &mut Self {
        self.elements.push(ordinal);
        self
    }
}

/// A record holding key/value ordinal pairs.
#[derive(Debug, Clone, Default)]
pub struct MapRecord {
    /// Entries in insertion order.
    pub entries: Vec<(Ordinal, Ordinal)>,
}

impl MapRecord {
    /// Creates an empty map record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key/value entry.
    pub fn add_entry(&mut self, key: Ordinal, value: Ordinal) -> &mut Self {
        self.entries.push((key, value));
        self
    }
}

/// A record of any shape, submitted to the write engine by value.
#[derive(Debug, Clone)]
pub enum WriteRecord {
    /// An object record.
    Object(ObjectRecord),
    /// A list record.
    List(ListRecord),
    /// A set record.
    Set(SetRecord),
    /// A map record.
    Map(MapRecord),
}

impl From<ObjectRecord> for WriteRecord {
    fn from(rec: ObjectRecord) -> Self {
        WriteRecord::Object(rec)
    }
}

impl From<ListRecord> for WriteRecord {
    fn from(rec: ListRecord) -> Self {
        WriteRecord::List(rec)
    }
}

impl From<SetRecord> for WriteRecord {
    fn from(rec: SetRecord) -> Self {
        WriteRecord::Set(rec)
    }
}

impl From<MapRecord> for WriteRecord {
    fn from(rec: MapRecord) -> Self {
        WriteRecord::Map(rec)
    }
}

// ============================================================================
// Cell codec
// ============================================================================

/// Writes one cell: a presence byte followed by the typed body.
pub fn write_cell<W: Write>(w: &mut W, value: &FieldValue) -> Result<()> {
    if matches!(value, FieldValue::Null) {
        w.write_all(&[0])?;
        return Ok(());
    }
    w.write_all(&[1])?;
    match value {
        FieldValue::Null => {}
        FieldValue::Int(v) => write_varint_u64(w, zigzag_encode(i64::from(*v)))?,
        FieldValue::Long(v) => write_varint_u64(w, zigzag_encode(*v))?,
        FieldValue::Float(v) => w.write_f32::<BigEndian>(*v)?,
        FieldValue::Double(v) => w.write_f64::<BigEndian>(*v)?,
        FieldValue::Bool(v) => w.write_all(&[u8::from(*v)])?,
        FieldValue::String(v) => {
            write_varint_u64(w, v.len() as u64)?;
            w.write_all(v.as_bytes())?;
        }
        FieldValue::Bytes(v) => {
            write_varint_u64(w, v.len() as u64)?;
            w.write_all(v)?;
        }
        FieldValue::Reference(ordinal) => write_varint_u32(w, ordinal.value())?,
    }
    Ok(())
}

/// Reads one cell of the given field type.
pub fn read_cell<R: Read>(r: &mut R, field_type: &FieldType) -> Result<FieldValue> {
    if read_u8(r)? == 0 {
        return Ok(FieldValue::Null);
    }
    let value = match field_type {
        FieldType::Int => {
            let raw = zigzag_decode(read_varint_u64(r)?);
            FieldValue::Int(raw as i32)
        }
        FieldType::Long => FieldValue::Long(zigzag_decode(read_varint_u64(r)?)),
        FieldType::Float => FieldValue::Float(r.read_f32::<BigEndian>()?),
        FieldType::Double => FieldValue::Double(r.read_f64::<BigEndian>()?),
        FieldType::Bool => FieldValue::Bool(read_u8(r)? != 0),
        FieldType::String => {
            let len = read_varint_u64(r)?;
            let buf = read_len_prefixed(r, len)?;
            FieldValue::String(
                String::from_utf8(buf)
                    .map_err(|source| crate::error::CodecError::InvalidUtf8 { source })?,
            )
        }
        FieldType::Bytes => {
            let len = read_varint_u64(r)?;
            FieldValue::Bytes(read_len_prefixed(r, len)?)
        }
        FieldType::Reference { .. } => FieldValue::Reference(Ordinal::new(read_varint_u32(r)?)),
    };
    Ok(value)
}

/// Copies one cell from `r` to `w` verbatim.
///
/// Used to transpose row-encoded records into per-field streams on the write
/// side, and to drain excluded cells on the read side (`w` = sink).
pub fn copy_cell<R: Read, W: Write>(r: &mut R, w: &mut W, field_type: &FieldType) -> Result<()> {
    let presence = read_u8(r)?;
    w.write_all(&[presence])?;
    if presence == 0 {
        return Ok(());
    }
    match field_type {
        FieldType::Int | FieldType::Long | FieldType::Reference { .. } => {
            copy_varint(r, w)?;
        }
        FieldType::Float => copy_fixed::<4, _, _>(r, w)?,
        FieldType::Double => copy_fixed::<8, _, _>(r, w)?,
        FieldType::Bool => copy_fixed::<1, _, _>(r, w)?,
        FieldType::String | FieldType::Bytes => {
            let len = copy_varint(r, w)?;
            let mut remaining = len;
            let mut chunk = [0u8; 256];
            while remaining > 0 {
                let take = remaining.min(chunk.len() as u64) as usize;
                r.read_exact(&mut chunk[..take])?;
                w.write_all(&chunk[..take])?;
                remaining -= take as u64;
            }
        }
    }
    Ok(())
}

fn copy_varint<R: Read, W: Write>(r: &mut R, w: &mut W) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = read_u8(r)?;
        w.write_all(&[byte])?;
        if shift == 63 && byte > 1 {
            return Err(crate::error::CodecError::VarIntTooLong);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

fn copy_fixed<const N: usize, R: Read, W: Write>(r: &mut R, w: &mut W) -> Result<()> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    w.write_all(&buf)?;
    Ok(())
}

// ============================================================================
// Canonical record encodings
// ============================================================================

/// Encodes an object record's cells in schema order.
pub fn encode_object_record(record: &ObjectRecord) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for value in record.values() {
        write_cell(&mut buf, value)?;
    }
    Ok(buf)
}

/// Encodes a collection's element ordinals: count, then each ordinal.
pub fn encode_collection_elements(elements: &[Ordinal]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_varint_u64(&mut buf, elements.len() as u64)?;
    for element in elements {
        write_varint_u32(&mut buf, element.value())?;
    }
    Ok(buf)
}

/// Decodes element ordinals written by [`encode_collection_elements`].
pub fn read_collection_elements<R: Read>(r: &mut R) -> Result<Vec<Ordinal>> {
    let count = read_varint_u64(r)? as usize;
    let mut elements = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        elements.push(Ordinal::new(read_varint_u32(r)?));
    }
    Ok(elements)
}

/// Encodes map entries: count, then (key, value) ordinal pairs.
pub fn encode_map_entries(entries: &[(Ordinal, Ordinal)]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_varint_u64(&mut buf, entries.len() as u64)?;
    for (key, value) in entries {
        write_varint_u32(&mut buf, key.value())?;
        write_varint_u32(&mut buf, value.value())?;
    }
    Ok(buf)
}

/// Decodes map entries written by [`encode_map_entries`].
pub fn read_map_entries<R: Read>(r: &mut R) -> Result<Vec<(Ordinal, Ordinal)>> {
    let count = read_varint_u64(r)? as usize;
    let mut entries = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        let key = Ordinal::new(read_varint_u32(r)?);
        let value = Ordinal::new(read_varint_u32(r)?);
        entries.push((key, value));
    }
    Ok(entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io::Cursor;

    use crate::schema::ObjectField;

    use super::*;

    fn sample_schema() -> Arc<ObjectSchema> {
        Arc::new(ObjectSchema::new(
            "Sample",
            vec![
                ObjectField::new("i", FieldType::Int),
                ObjectField::new("l", FieldType::Long),
                ObjectField::new("f", FieldType::Float),
                ObjectField::new("d", FieldType::Double),
                ObjectField::new("b", FieldType::Bool),
                ObjectField::new("s", FieldType::String),
                ObjectField::new("y", FieldType::Bytes),
                ObjectField::new("r", FieldType::Reference { referenced_type: "Other".into() }),
            ],
        ))
    }

    fn sample_record() -> ObjectRecord {
        let mut rec = ObjectRecord::new(sample_schema());
        rec.set("i", FieldValue::Int(-7)).unwrap();
        rec.set("l", FieldValue::Long(1 << 40)).unwrap();
        rec.set("f", FieldValue::Float(2.5)).unwrap();
        rec.set("d", FieldValue::Double(-0.125)).unwrap();
        rec.set("b", FieldValue::Bool(true)).unwrap();
        rec.set("s", FieldValue::String("abc".into())).unwrap();
        rec.set("y", FieldValue::Bytes(vec![1, 2, 3])).unwrap();
        rec.set("r", FieldValue::Reference(Ordinal::new(9))).unwrap();
        rec
    }

    #[test]
    fn test_cell_roundtrip_all_types() {
        let rec = sample_record();
        let bytes = encode_object_record(&rec).expect("encode");
        let mut cursor = Cursor::new(bytes);
        for (field, expected) in rec.schema().fields.iter().zip(rec.values()) {
            let decoded = read_cell(&mut cursor, &field.field_type).expect("read");
            assert_eq!(&decoded, expected);
        }
        assert_eq!(cursor.position(), cursor.get_ref().len() as u64);
    }

    #[test]
    fn test_null_cells_roundtrip() {
        let rec = ObjectRecord::new(sample_schema());
        let bytes = encode_object_record(&rec).expect("encode");
        // A null cell is a single zero byte regardless of type
        assert_eq!(bytes.len(), rec.schema().fields.len());
        let mut cursor = Cursor::new(bytes);
        for field in &rec.schema().fields {
            assert_eq!(read_cell(&mut cursor, &field.field_type).expect("read"), FieldValue::Null);
        }
    }

    #[test]
    fn test_copy_cell_is_verbatim() {
        let rec = sample_record();
        let bytes = encode_object_record(&rec).expect("encode");
        let mut cursor = Cursor::new(bytes.clone());
        let mut copied = Vec::new();
        for field in &rec.schema().fields {
            copy_cell(&mut cursor, &mut copied, &field.field_type).expect("copy");
        }
        assert_eq!(copied, bytes);
    }

    #[test]
    fn test_set_unknown_field() {
        let mut rec = ObjectRecord::new(sample_schema());
        let err = rec.set("nope", FieldValue::Int(1)).unwrap_err();
        assert!(matches!(err, RecordError::UnknownField { .. }));
    }

    #[test]
    fn test_set_type_mismatch() {
        let mut rec = ObjectRecord::new(sample_schema());
        let err = rec.set("i", FieldValue::String("x".into())).unwrap_err();
        assert!(matches!(err, RecordError::TypeMismatch { .. }));
    }

    #[test]
    fn test_reset_clears_values() {
        let mut rec = sample_record();
        rec.reset();
        assert!(rec.values().iter().all(|v| matches!(v, FieldValue::Null)));
    }

    #[test]
    fn test_collection_elements_roundtrip() {
        let elements: Vec<Ordinal> = [3u32, 1, 4, 1, 5].into_iter().map(Ordinal::new).collect();
        let bytes = encode_collection_elements(&elements).expect("encode");
        let decoded = read_collection_elements(&mut Cursor::new(bytes)).expect("read");
        assert_eq!(decoded, elements);
    }

    #[test]
    fn test_map_entries_roundtrip() {
        let entries = vec![
            (Ordinal::new(1), Ordinal::new(10)),
            (Ordinal::new(2), Ordinal::new(20)),
        ];
        let bytes = encode_map_entries(&entries).expect("encode");
        let decoded = read_map_entries(&mut Cursor::new(bytes)).expect("read");
        assert_eq!(decoded, entries);
    }
}
