//! List, set, and map types end to end: reference wiring, stable
//! iteration order, and custom hash strategies.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{load_snapshot, snapshot_blob};
use shoal_test_utils::{int_record, single_int_schema};
use shoal_types::{
    HashCodeFinder, ListRecord, ListSchema, MapRecord, MapSchema, Ordinal, Schema, SetRecord,
    SetSchema,
};
use shoal_write::{TypeWriteState, WriteStateEngine};

fn collection_engine() -> (WriteStateEngine, Schema) {
    let value_schema = single_int_schema("Val");
    let engine = WriteStateEngine::with_schemas([
        value_schema.clone(),
        Schema::List(ListSchema::new("ValList", "Val")),
        Schema::Set(SetSchema::new("ValSet", "Val")),
        Schema::Map(MapSchema::new("ValMap", "Val", "Val")),
    ])
    .unwrap();
    (engine, value_schema)
}

/// Lists keep element order; sets and maps sort by the default hash
/// (the element ordinal).
#[test]
fn test_collection_round_trip() {
    let (mut producer, value_schema) = collection_engine();

    let a = producer.add("Val", int_record(&value_schema, 10)).unwrap();
    let b = producer.add("Val", int_record(&value_schema, 20)).unwrap();
    let c = producer.add("Val", int_record(&value_schema, 30)).unwrap();

    let mut list = ListRecord::new();
    list.add_element(c).add_element(a).add_element(c);
    producer.add("ValList", list.into()).unwrap();

    let mut set = SetRecord::new();
    set.add_element(c).add_element(a).add_element(b);
    producer.add("ValSet", set.into()).unwrap();

    let mut map = MapRecord::new();
    map.add_entry(c, a).add_entry(a, b);
    producer.add("ValMap", map.into()).unwrap();

    let consumer = load_snapshot(&snapshot_blob(&mut producer));

    let list_state = consumer.type_state("ValList").unwrap().as_list().unwrap();
    assert_eq!(list_state.element_ordinals(Ordinal::new(0)), Some([c, a, c].as_slice()));

    let set_state = consumer.type_state("ValSet").unwrap().as_set().unwrap();
    assert_eq!(set_state.element_ordinals(Ordinal::new(0)), Some([a, b, c].as_slice()));
    assert!(set_state.contains_element(Ordinal::new(0), b));

    let map_state = consumer.type_state("ValMap").unwrap().as_map().unwrap();
    assert_eq!(map_state.map_entries(Ordinal::new(0)), Some([(a, b), (c, a)].as_slice()));
    assert_eq!(map_state.value_for_key(Ordinal::new(0), c), Some(a));
    assert_eq!(map_state.value_for_key(Ordinal::new(0), b), None);
}

/// Reference fields wire to their target type-states after a snapshot.
#[test]
fn test_reference_wiring() {
    let studio = shoal_types::ObjectSchema::new(
        "Studio",
        vec![shoal_types::ObjectField::new("name", shoal_types::FieldType::String)],
    );
    let movie = shoal_types::ObjectSchema::new(
        "Movie",
        vec![
            shoal_types::ObjectField::new("title", shoal_types::FieldType::String),
            shoal_types::ObjectField::new(
                "studio",
                shoal_types::FieldType::Reference { referenced_type: "Studio".to_string() },
            ),
        ],
    );
    let mut producer = WriteStateEngine::with_schemas([
        Schema::Object(studio.clone()),
        Schema::Object(movie.clone()),
    ])
    .unwrap();

    let mut studio_record = shoal_types::ObjectRecord::new(Arc::new(studio));
    studio_record.set("name", shoal_types::FieldValue::String("Aardman".into())).unwrap();
    let studio_ordinal = producer.add("Studio", studio_record.into()).unwrap();

    let mut movie_record = shoal_types::ObjectRecord::new(Arc::new(movie));
    movie_record.set("title", shoal_types::FieldValue::String("Early Man".into())).unwrap();
    movie_record.set("studio", shoal_types::FieldValue::Reference(studio_ordinal)).unwrap();
    let movie_ordinal = producer.add("Movie", movie_record.into()).unwrap();

    let consumer = load_snapshot(&snapshot_blob(&mut producer));
    let movie_state = consumer.type_state("Movie").unwrap().as_object().unwrap();

    // Follow the reference through the wired engine index
    let field_index = movie_state.schema().field_index("studio").unwrap();
    let target = movie_state.reference_target(field_index).expect("wired reference");
    let studio_state = consumer.type_state_at(target).unwrap();
    assert_eq!(studio_state.type_name(), "Studio");

    let Some(shoal_types::FieldValue::Reference(referenced)) =
        movie_state.field_value(movie_ordinal, "studio")
    else {
        panic!("expected a reference value");
    };
    let name = studio_state
        .as_object()
        .unwrap()
        .field_value(*referenced, "name")
        .expect("referenced studio populated");
    assert_eq!(name, &shoal_types::FieldValue::String("Aardman".into()));
}

struct ReversingHasher;

impl HashCodeFinder for ReversingHasher {
    fn hash_ordinal(&self, type_name: &str, ordinal: Ordinal) -> u64 {
        match type_name {
            "Val" => u64::from(u32::MAX - ordinal.value()),
            _ => u64::from(ordinal.value()),
        }
    }

    fn defined_hash_code_types(&self) -> BTreeSet<String> {
        std::iter::once("Val".to_string()).collect()
    }
}

/// A custom hash strategy changes set iteration order deterministically.
#[test]
fn test_custom_hash_orders_set_elements() {
    let value_schema = single_int_schema("Val");
    let mut producer = WriteStateEngine::with_hash_code_finder(Arc::new(ReversingHasher));
    producer.add_type_state(TypeWriteState::new(value_schema.clone())).unwrap();
    producer.add_type_state(TypeWriteState::new(Schema::Set(SetSchema::new("ValSet", "Val")))).unwrap();

    let a = producer.add("Val", int_record(&value_schema, 1)).unwrap();
    let b = producer.add("Val", int_record(&value_schema, 2)).unwrap();
    let c = producer.add("Val", int_record(&value_schema, 3)).unwrap();

    let mut set = SetRecord::new();
    set.add_element(a).add_element(b).add_element(c);
    producer.add("ValSet", set.into()).unwrap();

    let consumer = load_snapshot(&snapshot_blob(&mut producer));
    let set_state = consumer.type_state("ValSet").unwrap().as_set().unwrap();
    // Reversed hash puts the highest ordinal first
    assert_eq!(set_state.element_ordinals(Ordinal::new(0)), Some([c, b, a].as_slice()));
    assert_eq!(consumer.header_tag(shoal_types::DEFINED_HASH_CODES_HEADER_TAG), Some("Val"));
}
