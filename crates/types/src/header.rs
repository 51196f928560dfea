//! Blob header codec.
//!
//! Every blob (snapshot or delta) starts with the same header:
//!
//! ```text
//! magic(4) | varint(version) | u64(origin tag) | u64(destination tag)
//!          | varint(tagCount) | tagCount × (string key, string value)
//! ```
//!
//! Randomized tags are fixed-width big-endian so the header stays seekable
//! by external tooling. Header tags are written in sorted key order for
//! byte-identical output across runs.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{CodecError, Result};
use crate::types::RandomizedTag;
use crate::varint::{read_string, read_varint_u32, write_string, write_varint_u32};

/// Magic bytes opening every blob.
pub const BLOB_MAGIC: [u8; 4] = *b"SHOL";

/// Current blob format version. Carries forward-compatibility padding
/// before every type payload.
pub const BLOB_FORMAT_VERSION: u32 = 2;

/// First blob format version. Identical framing except that type sub-blobs
/// carry no forward-compatibility padding.
pub const BLOB_LEGACY_FORMAT_VERSION: u32 = 1;

/// Decoded blob header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    /// Blob format version.
    pub version: u32,
    /// Tag of the state this blob transforms.
    pub origin_randomized_tag: RandomizedTag,
    /// Tag of the state this blob produces.
    pub destination_randomized_tag: RandomizedTag,
    /// Free-form header tags.
    pub header_tags: BTreeMap<String, String>,
}

impl BlobHeader {
    /// Creates a current-version header.
    pub fn new(
        origin: RandomizedTag,
        destination: RandomizedTag,
        header_tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            version: BLOB_FORMAT_VERSION,
            origin_randomized_tag: origin,
            destination_randomized_tag: destination,
            header_tags,
        }
    }

    /// Returns true if this header's version omits forward-compat padding.
    pub fn is_legacy(&self) -> bool {
        self.version == BLOB_LEGACY_FORMAT_VERSION
    }

    /// Serializes the header.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&BLOB_MAGIC)?;
        write_varint_u32(w, self.version)?;
        w.write_u64::<BigEndian>(self.origin_randomized_tag.value())?;
        w.write_u64::<BigEndian>(self.destination_randomized_tag.value())?;
        write_varint_u32(w, self.header_tags.len() as u32)?;
        for (key, value) in &self.header_tags {
            write_string(w, key)?;
            write_string(w, value)?;
        }
        Ok(())
    }

    /// Deserializes and validates a header.
    ///
    /// Fails with `InvalidMagic` or `VersionUnsupported` before consuming
    /// any payload bytes.
    pub fn read_from<R: Read>(r: &mut R) -> Result<BlobHeader> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != BLOB_MAGIC {
            return Err(CodecError::InvalidMagic);
        }
        let version = read_varint_u32(r)?;
        if version != BLOB_FORMAT_VERSION && version != BLOB_LEGACY_FORMAT_VERSION {
            return Err(CodecError::VersionUnsupported { version });
        }
        let origin = RandomizedTag::new(r.read_u64::<BigEndian>()?);
        let destination = RandomizedTag::new(r.read_u64::<BigEndian>()?);
        let tag_count = read_varint_u32(r)? as usize;
        let mut header_tags = BTreeMap::new();
        for _ in 0..tag_count {
            let key = read_string(r)?;
            let value = read_string(r)?;
            header_tags.insert(key, value);
        }
        Ok(BlobHeader {
            version,
            origin_randomized_tag: origin,
            destination_randomized_tag: destination,
            header_tags,
        })
    }
}
