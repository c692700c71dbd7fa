//! # Snapshot Format
//!
//! Binary serialization for catalog snapshots, used by export/import.
//!
//! Format: Header (5 bytes) + postcard-serialized catalog data.
//! - 4 bytes: Magic ("TRLS")
//! - 1 byte: Version
//!
//! Pre-deserialization validation guards against corrupted or hostile
//! input: the header and an upper payload-size bound are checked before
//! the payload is parsed.

use crate::catalog::{PathCatalog, SerializableCatalog};
use crate::{primitives, types::TrellisError};

/// Maximum allowed payload size for the snapshot format (64 MB).
///
/// Validated BEFORE attempting deserialization to prevent allocation-based
/// memory exhaustion from corrupted length fields.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Minimum valid snapshot size (header only).
const MIN_SNAPSHOT_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The snapshot header precedes all catalog data.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), TrellisError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(TrellisError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(TrellisError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrellisError> {
        if bytes.len() < MIN_SNAPSHOT_SIZE {
            return Err(TrellisError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a catalog to bytes (header + payload).
pub fn catalog_to_bytes(catalog: &PathCatalog) -> Result<Vec<u8>, TrellisError> {
    let header = SnapshotHeader::new();
    let serializable = SerializableCatalog::from(catalog);

    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| TrellisError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(MIN_SNAPSHOT_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a catalog from bytes.
///
/// Validates minimum size, maximum payload size and the header before the
/// payload is parsed.
pub fn catalog_from_bytes(bytes: &[u8]) -> Result<PathCatalog, TrellisError> {
    if bytes.len() < MIN_SNAPSHOT_SIZE {
        return Err(TrellisError::SerializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }

    if bytes.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(TrellisError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[MIN_SNAPSHOT_SIZE..];
    let serializable: SerializableCatalog = postcard::from_bytes(payload).map_err(|e| {
        TrellisError::SerializationError(format!("Failed to deserialize catalog data: {}", e))
    })?;

    Ok(PathCatalog::from(serializable))
}

// =============================================================================
// TESTS
// =============================================================================
