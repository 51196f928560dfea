//! Fuzz target for codec primitives.
//!
//! Tests that header, schema, varint, and ordinal-set decoding never
//! panic on arbitrary input, and that successful decodes roundtrip.

#![no_main]

use libfuzzer_sys::fuzz_target;

use shoal_types::varint::{
    read_ordinal_set, read_string, read_varint_u64, write_ordinal_set, write_string,
    write_varint_u64,
};
use shoal_types::{BlobHeader, Schema};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let selector = data[0] % 4;
    let payload = &data[1..];

    match selector {
        0 => fuzz_varint(payload),
        1 => fuzz_string(payload),
        2 => fuzz_schema(payload),
        _ => fuzz_header_and_ordset(payload),
    }
});

fn fuzz_varint(data: &[u8]) {
    if let Ok(value) = read_varint_u64(&mut &data[..]) {
        let mut buf = Vec::new();
        write_varint_u64(&mut buf, value).expect("write varint");
        let roundtrip = read_varint_u64(&mut &buf[..]).expect("reread varint");
        assert_eq!(roundtrip, value, "varint roundtrip mismatch");
    }
}

fn fuzz_string(data: &[u8]) {
    if let Ok(value) = read_string(&mut &data[..]) {
        let mut buf = Vec::new();
        write_string(&mut buf, &value).expect("write string");
        let roundtrip = read_string(&mut &buf[..]).expect("reread string");
        assert_eq!(roundtrip, value, "string roundtrip mismatch");
    }
}

fn fuzz_schema(data: &[u8]) {
    if let Ok(schema) = Schema::read_from(&mut &data[..]) {
        let mut buf = Vec::new();
        schema.write_to(&mut buf).expect("write schema");
        let roundtrip = Schema::read_from(&mut &buf[..]).expect("reread schema");
        assert_eq!(roundtrip, schema, "schema roundtrip mismatch");
    }
}

fn fuzz_header_and_ordset(data: &[u8]) {
    let _ = BlobHeader::read_from(&mut &data[..]);
    if let Ok(ordinals) = read_ordinal_set(&mut &data[..]) {
        let mut buf = Vec::new();
        write_ordinal_set(&mut buf, &ordinals).expect("write ordinal set");
        let roundtrip = read_ordinal_set(&mut &buf[..]).expect("reread ordinal set");
        assert_eq!(roundtrip, ordinals, "ordinal set roundtrip mismatch");
    }
}
