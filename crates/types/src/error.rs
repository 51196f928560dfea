//! Codec error types for the shoal blob format.

use std::io;

use snafu::Snafu;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while encoding or decoding blob streams.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CodecError {
    /// I/O error from the underlying stream.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The stream ended before a complete value could be decoded.
    #[snafu(display("Unexpected end of stream"))]
    UnexpectedEof,

    /// A skip or bulk read consumed fewer bytes than the format promised.
    #[snafu(display("Truncated stream: expected {expected} bytes, got {actual}"))]
    TruncatedStream {
        /// Number of bytes the format required.
        expected: u64,
        /// Number of bytes actually available.
        actual: u64,
    },

    /// A VarInt ran past its maximum encoded length.
    #[snafu(display("VarInt exceeds maximum encoded length"))]
    VarIntTooLong,

    /// The blob does not start with the expected magic bytes.
    #[snafu(display("Invalid blob magic"))]
    InvalidMagic,

    /// The blob format version is not recognized by this reader.
    #[snafu(display("Unsupported blob format version: {version}"))]
    VersionUnsupported {
        /// The version number found in the header.
        version: u32,
    },

    /// A string field did not contain valid UTF-8.
    #[snafu(display("Invalid UTF-8 in string: {source}"))]
    InvalidUtf8 {
        /// The underlying UTF-8 error.
        source: std::string::FromUtf8Error,
    },

    /// The schema tag byte does not name a known schema variant.
    #[snafu(display("Unknown schema tag: {tag}"))]
    UnknownSchemaTag {
        /// The unrecognized tag byte.
        tag: u8,
    },

    /// The field type tag byte does not name a known field type.
    #[snafu(display("Unknown field type tag: {tag}"))]
    UnknownFieldType {
        /// The unrecognized tag byte.
        tag: u8,
    },

    /// An ordinal set was not strictly ascending.
    #[snafu(display("Ordinal set is not strictly ascending"))]
    UnorderedOrdinalSet,

    /// A payload referenced an ordinal past its declared maximum.
    #[snafu(display("Ordinal {ordinal} out of range (max ordinal + 1 = {max})"))]
    OrdinalOutOfRange {
        /// The out-of-range ordinal value.
        ordinal: u32,
        /// The payload's declared max ordinal + 1.
        max: u32,
    },
}

impl From<io::Error> for CodecError {
    fn from(source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::UnexpectedEof
        } else {
            CodecError::Io { source }
        }
    }
}
