//! Fuzz target for the blob reader.
//!
//! The reader must never panic on arbitrary input: malformed blobs fail
//! with codec errors, and a rejected blob leaves the engine usable.

#![no_main]

use libfuzzer_sys::fuzz_target;

use shoal_read::{BlobReader, ReadStateEngine};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let selector = data[0] % 2;
    let payload = &data[1..];

    let mut engine = ReadStateEngine::new();
    match selector {
        0 => {
            let _ = BlobReader::new(&mut engine).read_snapshot(&mut &payload[..]);
        }
        _ => {
            let _ = BlobReader::new(&mut engine).apply_delta(&mut &payload[..]);
        }
    }
});
