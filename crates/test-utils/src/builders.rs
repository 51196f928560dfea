//! Builders for schemas, records, and listeners used across engine tests.

use std::sync::Arc;

use parking_lot::Mutex;

use shoal_read::TypeStateListener;
use shoal_types::{
    FieldType, FieldValue, ObjectField, ObjectRecord, ObjectSchema, Ordinal, Schema, WriteRecord,
};

/// An object schema with a single int field `x`.
pub fn single_int_schema(type_name: &str) -> Schema {
    Schema::Object(ObjectSchema::new(type_name, vec![ObjectField::new("x", FieldType::Int)]))
}

/// A record for [`single_int_schema`] carrying `x = value`.
///
/// Panics on a non-object schema; test-only convenience.
pub fn int_record(schema: &Schema, value: i32) -> WriteRecord {
    let Schema::Object(object_schema) = schema else {
        panic!("int_record requires an object schema");
    };
    let mut record = ObjectRecord::new(Arc::new(object_schema.clone()));
    record.set("x", FieldValue::Int(value)).expect("set int field");
    record.into()
}

/// Events recorded by a [`RecordingListener`], shared with the test body.
pub type SharedEvents = Arc<Mutex<Vec<String>>>;

/// Listener appending every notification to a shared event log.
pub struct RecordingListener {
    events: SharedEvents,
}

impl RecordingListener {
    /// Creates a listener and the event log it appends to.
    pub fn new() -> (Self, SharedEvents) {
        let events: SharedEvents = Arc::new(Mutex::new(Vec::new()));
        (Self { events: events.clone() }, events)
    }
}

impl TypeStateListener for RecordingListener {
    fn begin_update(&mut self) {
        self.events.lock().push("begin".to_string());
    }

    fn ordinal_added(&mut self, ordinal: Ordinal) {
        self.events.lock().push(format!("added:{}", ordinal.value()));
    }

    fn ordinal_removed(&mut self, ordinal: Ordinal) {
        self.events.lock().push(format!("removed:{}", ordinal.value()));
    }

    fn end_update(&mut self) {
        self.events.lock().push("end".to_string());
    }
}
