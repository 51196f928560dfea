//! The write-side state engine.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use shoal_types::{
    DefaultHashCodeFinder, HashCodeFinder, Ordinal, RandomizedTag, Schema, WriteRecord,
    DEFINED_HASH_CODES_HEADER_TAG,
};

use shoal_read::ReadStateEngine;

use crate::error::{Result, WriteError};
use crate::parallel::fan_out;
use crate::type_state::TypeWriteState;

/// A producer's handle to a shoal dataset.
///
/// The engine cycles between two phases. In the adding-records phase,
/// records stream in — concurrently, if the producer likes — through
/// [`WriteStateEngine::add`]. [`WriteStateEngine::prepare_for_write`] moves
/// to the writing phase, where blobs are emitted;
/// [`WriteStateEngine::prepare_for_next_cycle`] starts the next cycle.
/// Phase-exclusive operations take `&mut self`, so the borrow checker
/// enforces that they never overlap concurrent `add` calls.
pub struct WriteStateEngine {
    type_states: Vec<TypeWriteState>,
    type_indexes: HashMap<String, usize>,
    header_tags: Mutex<BTreeMap<String, String>>,
    hash_code_finder: Arc<dyn HashCodeFinder>,
    restored_types: Option<Vec<String>>,
    prepared_for_next_cycle: bool,
    previous_randomized_tag: RandomizedTag,
    next_randomized_tag: RandomizedTag,
}

impl WriteStateEngine {
    /// Creates an engine with the default hash-code finder.
    pub fn new() -> Self {
        Self::with_hash_code_finder(Arc::new(DefaultHashCodeFinder))
    }

    /// Creates an engine with a custom element-hash strategy.
    pub fn with_hash_code_finder(hash_code_finder: Arc<dyn HashCodeFinder>) -> Self {
        Self {
            type_states: Vec::new(),
            type_indexes: HashMap::new(),
            header_tags: Mutex::new(BTreeMap::new()),
            hash_code_finder,
            restored_types: None,
            prepared_for_next_cycle: true,
            previous_randomized_tag: RandomizedTag::default(),
            next_randomized_tag: RandomizedTag::new(rand::random()),
        }
    }

    /// Creates an engine pre-populated with one type-state per schema.
    pub fn with_schemas(schemas: impl IntoIterator<Item = Schema>) -> Result<Self> {
        let mut engine = Self::new();
        for schema in schemas {
            engine.add_type_state(TypeWriteState::new(schema))?;
        }
        Ok(engine)
    }

    /// Registers a type-state. One registration per type, before the first
    /// cycle's write.
    pub fn add_type_state(&mut self, mut type_state: TypeWriteState) -> Result<()> {
        let type_name = type_state.type_name().to_string();
        if self.type_indexes.contains_key(&type_name) {
            return Err(WriteError::DuplicateType { type_name });
        }
        type_state.bind_hash_code_finder(self.hash_code_finder.clone());
        self.type_indexes.insert(type_name, self.type_states.len());
        self.type_states.push(type_state);
        Ok(())
    }

    /// Adds a record to the named type, returning its ordinal.
    ///
    /// Callable from many threads concurrently during the adding-records
    /// phase.
    pub fn add(&self, type_name: &str, record: WriteRecord) -> Result<Ordinal> {
        let type_state = self
            .type_state(type_name)
            .ok_or_else(|| WriteError::UnknownType { type_name: type_name.to_string() })?;
        type_state.add(record)
    }

    /// Transitions from adding records to writing.
    ///
    /// Compiles every type-state's payloads in parallel. A no-op when the
    /// engine is already in the writing phase.
    pub fn prepare_for_write(&mut self) -> Result<()> {
        if !self.prepared_for_next_cycle {
            return Ok(());
        }

        self.add_defined_hash_code_types_header_tag();

        let start = Instant::now();
        fan_out(&mut self.type_states, TypeWriteState::prepare_for_write)?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "prepared for write");

        self.prepared_for_next_cycle = false;
        Ok(())
    }

    /// Transitions from writing to the next cycle's adding-records phase.
    ///
    /// Rotates the randomized tags and every type-state's populations. A
    /// no-op when the engine is already prepared for the next cycle.
    pub fn prepare_for_next_cycle(&mut self) -> Result<()> {
        if self.prepared_for_next_cycle {
            return Ok(());
        }

        self.previous_randomized_tag = self.next_randomized_tag;
        self.next_randomized_tag = RandomizedTag::new(rand::random());

        fan_out(&mut self.type_states, |type_state| {
            type_state.prepare_for_next_cycle();
            Ok(())
        })?;

        self.prepared_for_next_cycle = true;
        self.restored_types = None;
        Ok(())
    }

    /// Re-adds every record from the previous cycle, exactly as it was.
    pub fn add_all_objects_from_previous_cycle(&mut self) {
        for type_state in &mut self.type_states {
            type_state.add_all_objects_from_previous_cycle();
        }
    }

    /// Returns the engine to its state immediately after the last
    /// `prepare_for_next_cycle`.
    ///
    /// Callable from either phase. The next randomized tag is re-rolled so
    /// a consumer can never chain onto an aborted version.
    pub fn reset_to_last_prepare_for_next_cycle(&mut self) -> Result<()> {
        fan_out(&mut self.type_states, |type_state| {
            type_state.reset_to_last_prepare_for_next_cycle();
            Ok(())
        })?;

        self.next_randomized_tag = RandomizedTag::new(rand::random());
        self.prepared_for_next_cycle = true;
        Ok(())
    }

    /// Imports a prior published state so this producer can continue the
    /// delta chain after a restart.
    ///
    /// The read engine must be tracking all populated ordinals. Types
    /// restored here count against [`WriteStateEngine::can_produce_delta`]
    /// until the next cycle boundary.
    pub fn restore_from(&mut self, read_engine: &ReadStateEngine) -> Result<()> {
        if !read_engine.is_listening_for_all_populated_ordinals() {
            return Err(WriteError::RestoreRejected);
        }

        self.restored_types = Some(
            read_engine.type_states().iter().map(|ts| ts.type_name().to_string()).collect(),
        );

        fan_out(&mut self.type_states, |type_state| {
            if let Some(read_state) = read_engine.type_state(type_state.type_name()) {
                let bound = type_state.restore_from(read_state);
                debug!(type_name = type_state.type_name(), bound, "restored type");
            }
            Ok(())
        })?;

        self.previous_randomized_tag = read_engine.current_randomized_tag();
        self.next_randomized_tag = RandomizedTag::new(rand::random());
        Ok(())
    }

    /// Whether any type-state changed since the previous cycle.
    pub fn has_changed_since_last_cycle(&self) -> bool {
        self.type_states.iter().any(TypeWriteState::has_changed_since_last_cycle)
    }

    /// Whether this engine was restored and has not yet completed a cycle.
    pub fn is_restored(&self) -> bool {
        self.restored_types.is_some()
    }

    /// Whether a delta emitted now would chain correctly.
    ///
    /// Always true for a never-restored engine; for a restored one, every
    /// restored type must have bound all of its prior ordinals.
    pub fn can_produce_delta(&self) -> bool {
        let Some(restored_types) = &self.restored_types else {
            return true;
        };
        self.type_states
            .iter()
            .filter(|ts| restored_types.iter().any(|name| name == ts.type_name()))
            .all(TypeWriteState::is_restored)
    }

    /// Type-states in registration order — the order blobs are framed in.
    pub fn ordered_type_states(&self) -> &[TypeWriteState] {
        &self.type_states
    }

    /// The type-state for the named type.
    pub fn type_state(&self, type_name: &str) -> Option<&TypeWriteState> {
        self.type_indexes.get(type_name).map(|&index| &self.type_states[index])
    }

    /// Registered schemas, in registration order.
    pub fn schemas(&self) -> Vec<&Schema> {
        self.type_states.iter().map(TypeWriteState::schema).collect()
    }

    /// The schema of the named type.
    pub fn schema(&self, type_name: &str) -> Option<&Schema> {
        self.type_state(type_name).map(TypeWriteState::schema)
    }

    /// Sets one header tag for subsequently written blobs.
    pub fn add_header_tag(&self, key: impl Into<String>, value: impl Into<String>) {
        self.header_tags.lock().insert(key.into(), value.into());
    }

    /// Merges a batch of header tags.
    pub fn add_header_tags(&self, tags: BTreeMap<String, String>) {
        self.header_tags.lock().extend(tags);
    }

    /// A snapshot of the current header tags.
    pub fn header_tags(&self) -> BTreeMap<String, String> {
        self.header_tags.lock().clone()
    }

    /// A single header tag by key.
    pub fn header_tag(&self, key: &str) -> Option<String> {
        self.header_tags.lock().get(key).cloned()
    }

    /// The element-hash strategy this engine was built with.
    pub fn hash_code_finder(&self) -> &Arc<dyn HashCodeFinder> {
        &self.hash_code_finder
    }

    /// Whether the engine is in the adding-records phase.
    pub fn is_prepared_for_next_cycle(&self) -> bool {
        self.prepared_for_next_cycle
    }

    /// Tag of the last completed cycle's state.
    pub fn previous_randomized_tag(&self) -> RandomizedTag {
        self.previous_randomized_tag
    }

    /// Tag the current cycle's state will publish as.
    pub fn next_randomized_tag(&self) -> RandomizedTag {
        self.next_randomized_tag
    }

    /// Overrides the previous-state tag.
    ///
    /// Escape hatch for tests and operational recovery. Overriding tags on
    /// a live chain breaks the delta-chain invariant for consumers; prefer
    /// letting the engine roll tags itself.
    pub fn override_previous_randomized_tag(&mut self, tag: RandomizedTag) {
        self.previous_randomized_tag = tag;
    }

    /// Overrides the next-state tag.
    ///
    /// Escape hatch for tests and operational recovery; see
    /// [`WriteStateEngine::override_previous_randomized_tag`].
    pub fn override_next_randomized_tag(&mut self, tag: RandomizedTag) {
        self.next_randomized_tag = tag;
    }

    fn add_defined_hash_code_types_header_tag(&self) {
        let type_names = self.hash_code_finder.defined_hash_code_types();
        if !type_names.is_empty() {
            // Sorted to be consistent between cycles
            let joined = type_names.into_iter().collect::<Vec<_>>().join(",");
            self.add_header_tag(DEFINED_HASH_CODES_HEADER_TAG, joined);
        }
    }
}

impl Default for WriteStateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WriteStateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteStateEngine")
            .field("types", &self.type_states.len())
            .field("prepared_for_next_cycle", &self.prepared_for_next_cycle)
            .field("previous_randomized_tag", &self.previous_randomized_tag)
            .field("next_randomized_tag", &self.next_randomized_tag)
            .finish()
    }
}
