//! Assertions over read-side engine state.

use shoal_read::ReadStateEngine;
use shoal_types::{FieldValue, Ordinal};

/// Asserts that a type's populated ordinals are exactly `expected`.
///
/// # Panics
///
/// Panics with a readable diff when the populations differ or the type is
/// not materialized.
pub fn assert_populated_ordinals(engine: &ReadStateEngine, type_name: &str, expected: &[u32]) {
    let type_state = engine
        .type_state(type_name)
        .unwrap_or_else(|| panic!("type '{type_name}' is not materialized"));
    let actual: Vec<u32> =
        type_state.populated_ordinals().iter().map(|o| o.value()).collect();
    assert_eq!(
        actual, expected,
        "populated ordinals for '{type_name}' differ (actual vs expected)"
    );
}

/// Asserts that an int field of an object record decodes to `expected`.
///
/// # Panics
///
/// Panics when the type is missing, the ordinal is unpopulated, or the
/// field holds anything but the expected int.
pub fn assert_int_field(
    engine: &ReadStateEngine,
    type_name: &str,
    ordinal: u32,
    field: &str,
    expected: i32,
) {
    let object_state = engine
        .type_state(type_name)
        .and_then(|ts| ts.as_object())
        .unwrap_or_else(|| panic!("type '{type_name}' is not a materialized object type"));
    let value = object_state
        .field_value(Ordinal::new(ordinal), field)
        .unwrap_or_else(|| panic!("ordinal {ordinal} of '{type_name}' is not populated"));
    assert_eq!(
        value,
        &FieldValue::Int(expected),
        "field '{field}' at ordinal {ordinal} of '{type_name}'"
    );
}
