//! Blob reader: drives snapshot loads and delta applications.
//!
//! Framing, in read order: header; varint count of type sub-blobs; then per
//! type a self-framed schema, forward-compatibility padding (absent in
//! legacy blobs), and the type payload. Unknown trailing bytes inside the
//! padding are skipped so old readers accept blobs from newer producers.

use std::collections::BTreeSet;
use std::io::Read;
use std::time::Instant;

use tracing::{debug, info};

use shoal_types::varint::{read_varint_u32, read_varint_u64, skip_bytes};
use shoal_types::{BlobHeader, Schema};

use crate::engine::ReadStateEngine;
use crate::error::{ReadError, Result};
use crate::filter::FilterConfig;
use crate::list::ListTypeReadState;
use crate::map::MapTypeReadState;
use crate::object::ObjectTypeReadState;
use crate::set::SetTypeReadState;
use crate::type_state::TypeReadState;

/// Populates and updates a [`ReadStateEngine`] from blob streams.
pub struct BlobReader<'a> {
    engine: &'a mut ReadStateEngine,
}

impl<'a> BlobReader<'a> {
    /// Creates a reader over the engine.
    pub fn new(engine: &'a mut ReadStateEngine) -> Self {
        Self { engine }
    }

    /// Initializes the engine from a snapshot blob, materializing all types.
    pub fn read_snapshot<R: Read>(&mut self, r: &mut R) -> Result<()> {
        self.read_snapshot_filtered(r, &FilterConfig::include_all())
    }

    /// Initializes the engine from a snapshot blob under a filter.
    ///
    /// The filter stays in effect for every subsequent delta: excluded
    /// types never gain a type-state, and excluded fields stay out of the
    /// columnar storage.
    pub fn read_snapshot_filtered<R: Read>(
        &mut self,
        r: &mut R,
        filter: &FilterConfig,
    ) -> Result<()> {
        let header = BlobHeader::read_from(r)?;
        let start = Instant::now();

        self.engine.current_randomized_tag = header.destination_randomized_tag;
        self.engine.header_tags = header.header_tags.clone();

        for type_state in &mut self.engine.type_states {
            type_state.notify_begin_update();
        }

        let type_count = read_varint_u32(r)?;
        let mut type_names = BTreeSet::new();
        for _ in 0..type_count {
            let schema = Schema::read_from(r)?;
            if !header.is_legacy() {
                skip_forward_compat_bytes(r)?;
            }
            type_names.insert(schema.name().to_string());

            if !filter.includes_type(schema.name()) {
                debug!(type_name = schema.name(), "discarding filtered type");
                TypeReadState::discard_snapshot(r, &schema)?;
                continue;
            }

            let mut type_state = match schema {
                Schema::Object(unfiltered) => {
                    let filtered = filter.filter_object_schema(&unfiltered);
                    TypeReadState::Object(ObjectTypeReadState::new(filtered, unfiltered))
                }
                Schema::List(s) => TypeReadState::List(ListTypeReadState::new(s)),
                Schema::Set(s) => TypeReadState::Set(SetTypeReadState::new(s)),
                Schema::Map(s) => TypeReadState::Map(MapTypeReadState::new(s)),
            };
            type_state.read_snapshot(r, &mut self.engine.recycler)?;
            self.engine.add_type_state(type_state)?;
        }

        self.engine.wire_type_states_to_schemas();

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            types = %join_names(&type_names),
            "snapshot load completed"
        );

        for type_state in &mut self.engine.type_states {
            type_state.notify_end_update();
        }

        self.engine.after_initialization();
        Ok(())
    }

    /// Advances the engine by one delta (or reverse delta) blob.
    ///
    /// The delta's origin tag must match the engine's current tag; on a
    /// mismatch the engine is untouched and no listener is invoked.
    pub fn apply_delta<R: Read>(&mut self, r: &mut R) -> Result<()> {
        let header = BlobHeader::read_from(r)?;
        if header.origin_randomized_tag != self.engine.current_randomized_tag {
            return Err(ReadError::DeltaMismatch {
                origin: header.origin_randomized_tag,
                current: self.engine.current_randomized_tag,
            });
        }
        let start = Instant::now();

        self.engine.current_randomized_tag = header.destination_randomized_tag;
        self.engine.header_tags = header.header_tags.clone();

        for type_state in &mut self.engine.type_states {
            type_state.notify_begin_update();
        }

        let type_count = read_varint_u32(r)?;
        let mut type_names = BTreeSet::new();
        for _ in 0..type_count {
            let schema = Schema::read_from(r)?;
            if !header.is_legacy() {
                skip_forward_compat_bytes(r)?;
            }
            type_names.insert(schema.name().to_string());

            let engine = &mut *self.engine;
            let type_states = &mut engine.type_states;
            let recycler = &mut engine.recycler;
            match engine.type_indexes.get(schema.name()).copied() {
                Some(index) => {
                    type_states[index].apply_delta(r, &schema, recycler)?;
                    recycler.swap();
                }
                None => TypeReadState::discard_delta(r, &schema)?,
            }
        }

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            types = %join_names(&type_names),
            "delta application completed"
        );

        for type_state in &mut self.engine.type_states {
            type_state.notify_end_update();
        }

        Ok(())
    }
}

fn skip_forward_compat_bytes<R: Read>(r: &mut R) -> std::result::Result<(), shoal_types::CodecError> {
    let pad_len = read_varint_u64(r)?;
    skip_bytes(r, pad_len)
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(",")
}
