//! Test harness for producer/consumer cycle tests.
//!
//! Wraps the write engine's prepare/emit steps and the read engine's
//! load/apply steps so tests read as cycle scripts.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]

use shoal_read::{BlobReader, FilterConfig, ReadStateEngine, TypeReadState};
use shoal_write::{BlobWriter, WriteStateEngine};

/// Compiles the current cycle and emits a snapshot blob.
pub fn snapshot_blob(engine: &mut WriteStateEngine) -> Vec<u8> {
    engine.prepare_for_write().expect("prepare for write");
    let mut blob = Vec::new();
    BlobWriter::new(engine).write_snapshot(&mut blob).expect("write snapshot");
    blob
}

/// Compiles the current cycle and emits a delta blob.
pub fn delta_blob(engine: &mut WriteStateEngine) -> Vec<u8> {
    engine.prepare_for_write().expect("prepare for write");
    let mut blob = Vec::new();
    BlobWriter::new(engine).write_delta(&mut blob).expect("write delta");
    blob
}

/// Compiles the current cycle and emits a reverse delta blob.
pub fn reverse_delta_blob(engine: &mut WriteStateEngine) -> Vec<u8> {
    engine.prepare_for_write().expect("prepare for write");
    let mut blob = Vec::new();
    BlobWriter::new(engine).write_reverse_delta(&mut blob).expect("write reverse delta");
    blob
}

/// Loads a snapshot blob into a fresh read engine.
pub fn load_snapshot(blob: &[u8]) -> ReadStateEngine {
    let mut engine = ReadStateEngine::new();
    BlobReader::new(&mut engine).read_snapshot(&mut &blob[..]).expect("read snapshot");
    engine
}

/// Loads a snapshot blob into a fresh read engine under a filter.
pub fn load_snapshot_filtered(blob: &[u8], filter: &FilterConfig) -> ReadStateEngine {
    let mut engine = ReadStateEngine::new();
    BlobReader::new(&mut engine)
        .read_snapshot_filtered(&mut &blob[..], filter)
        .expect("read filtered snapshot");
    engine
}

/// Applies a delta blob to a read engine.
pub fn apply_delta(engine: &mut ReadStateEngine, blob: &[u8]) {
    BlobReader::new(engine).apply_delta(&mut &blob[..]).expect("apply delta");
}

/// Asserts two read engines materialize identical datasets.
///
/// Compares type sets, populated ordinals, and per-ordinal contents.
pub fn assert_engines_equal(a: &ReadStateEngine, b: &ReadStateEngine) {
    assert_eq!(a.type_states().len(), b.type_states().len(), "type counts differ");
    for state_a in a.type_states() {
        let type_name = state_a.type_name();
        let state_b = b.type_state(type_name).expect("type missing from second engine");
        assert_eq!(
            state_a.populated_ordinals(),
            state_b.populated_ordinals(),
            "populated ordinals differ for '{type_name}'"
        );
        for ordinal in state_a.populated_ordinals().iter() {
            assert_type_records_equal(state_a, state_b, ordinal);
        }
    }
}

fn assert_type_records_equal(a: &TypeReadState, b: &TypeReadState, ordinal: shoal_types::Ordinal) {
    let type_name = a.type_name();
    match (a, b) {
        (TypeReadState::Object(a), TypeReadState::Object(b)) => {
            for field in &a.schema().fields {
                assert_eq!(
                    a.field_value(ordinal, &field.name),
                    b.field_value(ordinal, &field.name),
                    "field '{}' of '{type_name}' at {ordinal} differs",
                    field.name
                );
            }
        }
        (TypeReadState::List(a), TypeReadState::List(b)) => {
            assert_eq!(a.element_ordinals(ordinal), b.element_ordinals(ordinal));
        }
        (TypeReadState::Set(a), TypeReadState::Set(b)) => {
            assert_eq!(a.element_ordinals(ordinal), b.element_ordinals(ordinal));
        }
        (TypeReadState::Map(a), TypeReadState::Map(b)) => {
            assert_eq!(a.map_entries(ordinal), b.map_entries(ordinal));
        }
        _ => panic!("type-state shapes differ for '{type_name}'"),
    }
}
