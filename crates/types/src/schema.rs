//! Schema model for shoal datasets.
//!
//! A schema describes the shape of one record type. Four shapes exist:
//! - [`ObjectSchema`]: an ordered list of named, typed fields
//! - [`ListSchema`]: an ordered collection of references to another type
//! - [`SetSchema`]: an unordered collection with hash-stable iteration
//! - [`MapSchema`]: key/value references with hash-stable iteration
//!
//! Schemas are immutable after construction and carry a self-describing
//! binary prefix on the wire: a tag byte, the type name, and a per-shape
//! body. All field order is significant and preserved byte-for-byte.

use std::io::{Read, Write};

use crate::error::{CodecError, Result};
use crate::varint::{read_string, read_u8, read_varint_u64, write_string, write_varint_u64};

/// Wire tag for object schemas.
const SCHEMA_TAG_OBJECT: u8 = 0;
/// Wire tag for list schemas.
const SCHEMA_TAG_LIST: u8 = 1;
/// Wire tag for set schemas.
const SCHEMA_TAG_SET: u8 = 2;
/// Wire tag for map schemas.
const SCHEMA_TAG_MAP: u8 = 3;

/// The type of a single object field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// 32-bit signed integer, zigzag VarInt on the wire.
    Int,
    /// 64-bit signed integer, zigzag VarInt on the wire.
    Long,
    /// 32-bit float, big-endian bits on the wire.
    Float,
    /// 64-bit float, big-endian bits on the wire.
    Double,
    /// Boolean, single byte on the wire.
    Bool,
    /// Inline UTF-8 string, length-prefixed.
    String,
    /// Inline byte array, length-prefixed.
    Bytes,
    /// Reference to a record of another type, by ordinal.
    Reference {
        /// Name of the referenced type.
        referenced_type: String,
    },
}

impl FieldType {
    fn wire_tag(&self) -> u8 {
        match self {
            FieldType::Int => 0,
            FieldType::Long => 1,
            FieldType::Float => 2,
            FieldType::Double => 3,
            FieldType::Bool => 4,
            FieldType::String => 5,
            FieldType::Bytes => 6,
            FieldType::Reference { .. } => 7,
        }
    }
}

/// A single named, typed field of an object schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectField {
    /// Field name, unique within the schema.
    pub name: String,
    /// Field type.
    pub field_type: FieldType,
}

impl ObjectField {
    /// Creates a field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type }
    }
}

/// Primary-key declaration: paths of the fields forming a record's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    /// Field paths, dotted for nested references (e.g. `"actor.name"`).
    pub field_paths: Vec<String>,
}

/// Schema for a record with an ordered list of named typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSchema {
    /// Unique type name.
    pub name: String,
    /// Fields in declaration (and wire) order.
    pub fields: Vec<ObjectField>,
    /// Optional primary-key field paths.
    pub primary_key: Option<PrimaryKey>,
}

impl ObjectSchema {
    /// Creates an object schema without a primary key.
    pub fn new(name: impl Into<String>, fields: Vec<ObjectField>) -> Self {
        Self { name: name.into(), fields, primary_key: None }
    }

    /// Creates an object schema with a primary-key declaration.
    ///
    /// An empty path list is equivalent to no primary key.
    pub fn with_primary_key(
        name: impl Into<String>,
        fields: Vec<ObjectField>,
        field_paths: Vec<String>,
    ) -> Self {
        let primary_key =
            if field_paths.is_empty() { None } else { Some(PrimaryKey { field_paths }) };
        Self { name: name.into(), fields, primary_key }
    }

    /// Returns the position of the named field, if present.
    pub fn field_index(&self, field_name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == field_name)
    }

    /// Returns a copy keeping only the fields for which `keep` returns true.
    ///
    /// Field order is preserved; the name and primary key carry over.
    pub fn retain_fields(&self, keep: impl Fn(&str) -> bool) -> ObjectSchema {
        ObjectSchema {
            name: self.name.clone(),
            fields: self.fields.iter().filter(|f| keep(&f.name)).cloned().collect(),
            primary_key: self.primary_key.clone(),
        }
    }
}

/// Schema for an ordered collection of records of one element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSchema {
    /// Unique type name.
    pub name: String,
    /// Name of the element type.
    pub element_type: String,
}

impl ListSchema {
    /// Creates a list schema.
    pub fn new(name: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self { name: name.into(), element_type: element_type.into() }
    }
}

/// Schema for an unordered collection of records of one element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSchema {
    /// Unique type name.
    pub name: String,
    /// Name of the element type.
    pub element_type: String,
    /// Optional hash-key field paths used for stable iteration order.
    pub hash_key_paths: Vec<String>,
}

impl SetSchema {
    /// Creates a set schema without hash-key paths.
    pub fn new(name: impl Into<String>, element_type: impl Into<String>) -> Self {
        Self { name: name.into(), element_type: element_type.into(), hash_key_paths: Vec::new() }
    }
}

/// Schema for a key/value collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapSchema {
    /// Unique type name.
    pub name: String,
    /// Name of the key type.
    pub key_type: String,
    /// Name of the value type.
    pub value_type: String,
    /// Optional hash-key field paths used for stable iteration order.
    pub hash_key_paths: Vec<String>,
}

impl MapSchema {
    /// Creates a map schema without hash-key paths.
    pub fn new(
        name: impl Into<String>,
        key_type: impl Into<String>,
        value_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key_type: key_type.into(),
            value_type: value_type.into(),
            hash_key_paths: Vec::new(),
        }
    }
}

/// A dataset type schema: one of the four record shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    /// Named typed fields.
    Object(ObjectSchema),
    /// Ordered element references.
    List(ListSchema),
    /// Unordered element references.
    Set(SetSchema),
    /// Key/value references.
    Map(MapSchema),
}

impl Schema {
    /// Returns the unique type name.
    pub fn name(&self) -> &str {
        match self {
            Schema::Object(s) => &s.name,
            Schema::List(s) => &s.name,
            Schema::Set(s) => &s.name,
            Schema::Map(s) => &s.name,
        }
    }

    /// Serializes the schema with its self-describing prefix.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Schema::Object(s) => {
                w.write_all(&[SCHEMA_TAG_OBJECT])?;
                write_string(w, &s.name)?;
                write_varint_u64(w, s.fields.len() as u64)?;
                for field in &s.fields {
                    write_string(w, &field.name)?;
                    w.write_all(&[field.field_type.wire_tag()])?;
                    if let FieldType::Reference { referenced_type } = &field.field_type {
                        write_string(w, referenced_type)?;
                    }
                }
                let paths = s.primary_key.as_ref().map(|pk| pk.field_paths.as_slice()).unwrap_or(&[]);
                write_varint_u64(w, paths.len() as u64)?;
                for path in paths {
                    write_string(w, path)?;
                }
            }
            Schema::List(s) => {
                w.write_all(&[SCHEMA_TAG_LIST])?;
                write_string(w, &s.name)?;
                write_string(w, &s.element_type)?;
            }
            Schema::Set(s) => {
                w.write_all(&[SCHEMA_TAG_SET])?;
                write_string(w, &s.name)?;
                write_string(w, &s.element_type)?;
                write_varint_u64(w, s.hash_key_paths.len() as u64)?;
                for path in &s.hash_key_paths {
                    write_string(w, path)?;
                }
            }
            Schema::Map(s) => {
                w.write_all(&[SCHEMA_TAG_MAP])?;
                write_string(w, &s.name)?;
                write_string(w, &s.key_type)?;
                write_string(w, &s.value_type)?;
                write_varint_u64(w, s.hash_key_paths.len() as u64)?;
                for path in &s.hash_key_paths {
                    write_string(w, path)?;
                }
            }
        }
        Ok(())
    }

    /// Deserializes a schema written by [`Schema::write_to`].
    pub fn read_from<R: Read>(r: &mut R) -> Result<Schema> {
        let tag = read_u8(r)?;
        let name = read_string(r)?;
        match tag {
            SCHEMA_TAG_OBJECT => {
                let field_count = read_varint_u64(r)? as usize;
                let mut fields = Vec::with_capacity(field_count.min(1024));
                for _ in 0..field_count {
                    let field_name = read_string(r)?;
                    let field_type = read_field_type(r)?;
                    fields.push(ObjectField { name: field_name, field_type });
                }
                let path_count = read_varint_u64(r)? as usize;
                let mut field_paths = Vec::with_capacity(path_count.min(1024));
                for _ in 0..path_count {
                    field_paths.push(read_string(r)?);
                }
                let primary_key =
                    if field_paths.is_empty() { None } else { Some(PrimaryKey { field_paths }) };
                Ok(Schema::Object(ObjectSchema { name, fields, primary_key }))
            }
            SCHEMA_TAG_LIST => {
                let element_type = read_string(r)?;
                Ok(Schema::List(ListSchema { name, element_type }))
            }
            SCHEMA_TAG_SET => {
                let element_type = read_string(r)?;
                let hash_key_paths = read_paths(r)?;
                Ok(Schema::Set(SetSchema { name, element_type, hash_key_paths }))
            }
            SCHEMA_TAG_MAP => {
                let key_type = read_string(r)?;
                let value_type = read_string(r)?;
                let hash_key_paths = read_paths(r)?;
                Ok(Schema::Map(MapSchema { name, key_type, value_type, hash_key_paths }))
            }
            tag => Err(CodecError::UnknownSchemaTag { tag }),
        }
    }
}

fn read_field_type<R: Read>(r: &mut R) -> Result<FieldType> {
    let tag = read_u8(r)?;
    match tag {
        0 => Ok(FieldType::Int),
        1 => Ok(FieldType::Long),
        2 => Ok(FieldType::Float),
        3 => Ok(FieldType::Double),
        4 => Ok(FieldType::Bool),
        5 => Ok(FieldType::String),
        6 => Ok(FieldType::Bytes),
        7 => {
            let referenced_type = read_string(r)?;
            Ok(FieldType::Reference { referenced_type })
        }
        tag => Err(CodecError::UnknownFieldType { tag }),
    }
}

fn read_paths<R: Read>(r: &mut R) -> Result<Vec<String>> {
    let count = read_varint_u64(r)? as usize;
    let mut paths = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        paths.push(read_string(r)?);
    }
    Ok(paths)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn roundtrip(schema: &Schema) -> Schema {
        let mut buf = Vec::new();
        schema.write_to(&mut buf).expect("write");
        Schema::read_from(&mut Cursor::new(buf)).expect("read")
    }

    fn movie_schema() -> ObjectSchema {
        ObjectSchema::with_primary_key(
            "Movie",
            vec![
                ObjectField::new("id", FieldType::Long),
                ObjectField::new("title", FieldType::String),
                ObjectField::new("year", FieldType::Int),
                ObjectField::new("rating", FieldType::Float),
                ObjectField::new("poster", FieldType::Bytes),
                ObjectField::new("released", FieldType::Bool),
                ObjectField::new(
                    "studio",
                    FieldType::Reference { referenced_type: "Studio".to_string() },
                ),
            ],
            vec!["id".to_string()],
        )
    }

    #[test]
    fn test_object_schema_roundtrip() {
        let schema = Schema::Object(movie_schema());
        assert_eq!(roundtrip(&schema), schema);
    }

    #[test]
    fn test_object_schema_without_primary_key_roundtrip() {
        let schema = Schema::Object(ObjectSchema::new(
            "Tag",
            vec![ObjectField::new("value", FieldType::String)],
        ));
        assert_eq!(roundtrip(&schema), schema);
    }

    #[test]
    fn test_list_schema_roundtrip() {
        let schema = Schema::List(ListSchema::new("MovieList", "Movie"));
        assert_eq!(roundtrip(&schema), schema);
    }

    #[test]
    fn test_set_schema_roundtrip() {
        let mut set = SetSchema::new("MovieSet", "Movie");
        set.hash_key_paths = vec!["id".to_string()];
        let schema = Schema::Set(set);
        assert_eq!(roundtrip(&schema), schema);
    }

    #[test]
    fn test_map_schema_roundtrip() {
        let mut map = MapSchema::new("MoviesById", "MovieId", "Movie");
        map.hash_key_paths = vec!["value".to_string()];
        let schema = Schema::Map(map);
        assert_eq!(roundtrip(&schema), schema);
    }

    #[test]
    fn test_unknown_schema_tag() {
        let mut buf = vec![9u8];
        write_string(&mut buf, "X").expect("write");
        let err = Schema::read_from(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, CodecError::UnknownSchemaTag { tag: 9 }));
    }

    #[test]
    fn test_retain_fields_preserves_order() {
        let filtered = movie_schema().retain_fields(|name| name == "title" || name == "year");
        assert_eq!(filtered.fields.len(), 2);
        assert_eq!(filtered.fields[0].name, "title");
        assert_eq!(filtered.fields[1].name, "year");
        assert_eq!(filtered.name, "Movie");
    }

    #[test]
    fn test_field_index() {
        let schema = movie_schema();
        assert_eq!(schema.field_index("year"), Some(2));
        assert_eq!(schema.field_index("missing"), None);
    }

    mod proptest_schema {
        use proptest::prelude::*;

        use super::*;

        fn arb_type_name() -> impl Strategy<Value = String> {
            "[A-Z][a-zA-Z0-9]{0,15}"
        }

        fn arb_field_type() -> impl Strategy<Value = FieldType> {
            prop_oneof![
                Just(FieldType::Int),
                Just(FieldType::Long),
                Just(FieldType::Float),
                Just(FieldType::Double),
                Just(FieldType::Bool),
                Just(FieldType::String),
                Just(FieldType::Bytes),
                arb_type_name().prop_map(|referenced_type| FieldType::Reference { referenced_type }),
            ]
        }

        fn arb_schema() -> impl Strategy<Value = Schema> {
            prop_oneof![
                (
                    arb_type_name(),
                    proptest::collection::vec(("[a-z][a-z0-9]{0,11}", arb_field_type()), 0..8),
                    proptest::collection::vec("[a-z][a-z.]{0,15}", 0..3),
                )
                    .prop_map(|(name, fields, pk)| {
                        let fields = fields
                            .into_iter()
                            .map(|(n, t)| ObjectField::new(n, t))
                            .collect::<Vec<_>>();
                        if pk.is_empty() {
                            Schema::Object(ObjectSchema::new(name, fields))
                        } else {
                            Schema::Object(ObjectSchema::with_primary_key(name, fields, pk))
                        }
                    }),
                (arb_type_name(), arb_type_name())
                    .prop_map(|(n, e)| Schema::List(ListSchema::new(n, e))),
                (arb_type_name(), arb_type_name(), proptest::collection::vec("[a-z.]{1,12}", 0..3))
                    .prop_map(|(n, e, paths)| {
                        let mut s = SetSchema::new(n, e);
                        s.hash_key_paths = paths;
                        Schema::Set(s)
                    }),
                (
                    arb_type_name(),
                    arb_type_name(),
                    arb_type_name(),
                    proptest::collection::vec("[a-z.]{1,12}", 0..3)
                )
                    .prop_map(|(n, k, v, paths)| {
                        let mut s = MapSchema::new(n, k, v);
                        s.hash_key_paths = paths;
                        Schema::Map(s)
                    }),
            ]
        }

        proptest! {
            /// decode(encode(s)) = s for every schema variant.
            #[test]
            fn prop_schema_roundtrip(schema in arb_schema()) {
                prop_assert_eq!(roundtrip(&schema), schema);
            }
        }
    }
}
