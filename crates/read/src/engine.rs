//! The read-side state engine.

use std::collections::{BTreeMap, HashMap};

use shoal_types::RandomizedTag;

use crate::error::{ReadError, Result};
use crate::recycler::MemoryRecycler;
use crate::type_state::TypeReadState;

/// Owner of a consumer's materialized dataset.
///
/// Holds one type-state per materialized type, the memory recycler, the
/// current randomized tag, and the header tags of the last applied blob.
/// Type-states are created by the blob reader during a snapshot load and
/// mutated in place by delta applications.
pub struct ReadStateEngine {
    pub(crate) type_states: Vec<TypeReadState>,
    pub(crate) type_indexes: HashMap<String, usize>,
    pub(crate) recycler: MemoryRecycler,
    pub(crate) current_randomized_tag: RandomizedTag,
    pub(crate) header_tags: BTreeMap<String, String>,
    pub(crate) listen_to_all_populated_ordinals: bool,
    pub(crate) initialized: bool,
}

impl ReadStateEngine {
    /// Creates an empty engine tracking all populated ordinals.
    pub fn new() -> Self {
        Self {
            type_states: Vec::new(),
            type_indexes: HashMap::new(),
            recycler: MemoryRecycler::new(),
            current_randomized_tag: RandomizedTag::default(),
            header_tags: BTreeMap::new(),
            listen_to_all_populated_ordinals: true,
            initialized: false,
        }
    }

    /// Registers a type-state produced during a snapshot load.
    pub fn add_type_state(&mut self, type_state: TypeReadState) -> Result<()> {
        let type_name = type_state.type_name().to_string();
        if self.type_indexes.contains_key(&type_name) {
            return Err(ReadError::DuplicateType { type_name });
        }
        self.type_indexes.insert(type_name, self.type_states.len());
        self.type_states.push(type_state);
        Ok(())
    }

    /// Resolves every object reference field to its target type-state.
    ///
    /// Called once after all type-states of a snapshot are added. Reference
    /// fields whose target type is filtered out stay unresolved. Wiring is
    /// preserved across delta applications.
    pub fn wire_type_states_to_schemas(&mut self) {
        let indexes = &self.type_indexes;
        for type_state in &mut self.type_states {
            if let TypeReadState::Object(object_state) = type_state {
                object_state.wire_references(|name| indexes.get(name).copied());
            }
        }
    }

    /// Runs post-initialization hooks after a completed snapshot load.
    pub fn after_initialization(&mut self) {
        for type_state in &mut self.type_states {
            type_state.after_initialization();
        }
        self.initialized = true;
    }

    /// Returns true once a snapshot load has completed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// All type-states, in snapshot registration order.
    pub fn type_states(&self) -> &[TypeReadState] {
        &self.type_states
    }

    /// The type-state materializing the named type.
    pub fn type_state(&self, type_name: &str) -> Option<&TypeReadState> {
        self.type_indexes.get(type_name).map(|&index| &self.type_states[index])
    }

    /// Mutable access to a type-state, e.g. for listener registration.
    pub fn type_state_mut(&mut self, type_name: &str) -> Option<&mut TypeReadState> {
        let index = *self.type_indexes.get(type_name)?;
        Some(&mut self.type_states[index])
    }

    /// The type-state at an engine index, as resolved by reference wiring.
    pub fn type_state_at(&self, index: usize) -> Option<&TypeReadState> {
        self.type_states.get(index)
    }

    /// The memory recycler.
    pub fn memory_recycler(&self) -> &MemoryRecycler {
        &self.recycler
    }

    /// The engine's current randomized tag.
    pub fn current_randomized_tag(&self) -> RandomizedTag {
        self.current_randomized_tag
    }

    /// Overrides the engine's current randomized tag.
    pub fn set_current_randomized_tag(&mut self, tag: RandomizedTag) {
        self.current_randomized_tag = tag;
    }

    /// Header tags of the most recently applied blob.
    pub fn header_tags(&self) -> &BTreeMap<String, String> {
        &self.header_tags
    }

    /// A single header tag by key.
    pub fn header_tag(&self, key: &str) -> Option<&str> {
        self.header_tags.get(key).map(String::as_str)
    }

    /// Replaces the header tags.
    pub fn set_header_tags(&mut self, header_tags: BTreeMap<String, String>) {
        self.header_tags = header_tags;
    }

    /// Whether every type-state tracks its full populated-ordinal history.
    ///
    /// Restoring a write engine from this engine requires it.
    pub fn is_listening_for_all_populated_ordinals(&self) -> bool {
        self.listen_to_all_populated_ordinals
    }

    /// Toggles populated-ordinal tracking.
    pub fn set_listening_for_all_populated_ordinals(&mut self, listening: bool) {
        self.listen_to_all_populated_ordinals = listening;
    }
}

impl Default for ReadStateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadStateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStateEngine")
            .field("types", &self.type_states.len())
            .field("current_randomized_tag", &self.current_randomized_tag)
            .field("initialized", &self.initialized)
            .finish()
    }
}
