//! Error types for write-side operations.

use snafu::Snafu;

use shoal_types::CodecError;

/// Result type alias for write-side operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Errors raised while accumulating records and emitting blobs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// A record was added for a type that was never registered.
    #[snafu(display("Type '{type_name}' does not exist"))]
    UnknownType {
        /// The unregistered type name.
        type_name: String,
    },

    /// A type-state with the same name is already registered.
    #[snafu(display("The state for type '{type_name}' has already been added"))]
    DuplicateType {
        /// The duplicated type name.
        type_name: String,
    },

    /// The record's shape or schema does not match the registered type.
    #[snafu(display("Record does not match the registered schema for type '{type_name}'"))]
    SchemaMismatch {
        /// The target type name.
        type_name: String,
    },

    /// An operation was invoked in the wrong engine phase.
    #[snafu(display("'{operation}' called in the wrong phase"))]
    PhaseViolation {
        /// The offending operation.
        operation: &'static str,
    },

    /// The read engine offered for restore is not tracking all populated
    /// ordinals.
    #[snafu(display("The read state engine must be listening for all populated ordinals"))]
    RestoreRejected,

    /// A task in a parallel fan-out failed; the first failure is wrapped.
    #[snafu(display("Parallel task failed: {source}"))]
    Worker {
        /// The first failing task's error.
        #[snafu(source(from(WriteError, Box::new)))]
        source: Box<WriteError>,
    },

    /// Payload or blob encoding failed.
    #[snafu(display("Codec error: {source}"))]
    Codec {
        /// The underlying codec error.
        source: CodecError,
    },
}

impl From<CodecError> for WriteError {
    fn from(source: CodecError) -> Self {
        WriteError::Codec { source }
    }
}

impl From<std::io::Error> for WriteError {
    fn from(source: std::io::Error) -> Self {
        WriteError::Codec { source: CodecError::from(source) }
    }
}
