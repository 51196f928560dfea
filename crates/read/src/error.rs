//! Error types for read-side operations.

use snafu::Snafu;

use shoal_types::{CodecError, RandomizedTag};

/// Result type alias for read-side operations.
pub type Result<T> = std::result::Result<T, ReadError>;

/// Errors raised while loading snapshots or applying deltas.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReadError {
    /// The delta's origin tag does not match the engine's current tag.
    ///
    /// The consumer must fetch a snapshot to re-anchor the chain. The engine
    /// state is untouched when this is raised.
    #[snafu(display(
        "Delta originates from {origin} but the engine is at {current}"
    ))]
    DeltaMismatch {
        /// The blob's origin tag.
        origin: RandomizedTag,
        /// The engine's current tag.
        current: RandomizedTag,
    },

    /// A type-state with the same name is already registered.
    #[snafu(display("Type state for '{type_name}' has already been added"))]
    DuplicateType {
        /// The duplicated type name.
        type_name: String,
    },

    /// A sub-blob's schema shape does not match the registered type-state.
    #[snafu(display("Wire schema for '{type_name}' does not match the registered type-state"))]
    WireSchemaMismatch {
        /// The type whose schema shape changed.
        type_name: String,
    },

    /// The blob stream could not be decoded.
    #[snafu(display("Codec error: {source}"))]
    Codec {
        /// The underlying codec error.
        source: CodecError,
    },
}

impl From<CodecError> for ReadError {
    fn from(source: CodecError) -> Self {
        ReadError::Codec { source }
    }
}
