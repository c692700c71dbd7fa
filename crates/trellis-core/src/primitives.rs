//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Trellis CORE.
//!
//! Trellis starts with zero content but fixed rules. These primitives are
//! compiled into the binary and are immutable at runtime.

/// Maximum number of lives a learner can hold.
///
/// The lives counter is clamped to `[0, MAX_LIVES]` at all times.
pub const MAX_LIVES: u8 = 3;

/// Time between life refills, in milliseconds (2 hours).
///
/// Refills are evaluated lazily on every read or consume; there is no
/// background scheduler. `elapsed / REFILL_INTERVAL_MS` whole intervals are
/// credited at once, capped at `MAX_LIVES`.
pub const REFILL_INTERVAL_MS: i64 = 2 * 60 * 60 * 1000;

/// Milliseconds per UTC day, used for streak day arithmetic.
pub const MILLIS_PER_DAY: i64 = 86_400_000;

/// Magic bytes for the Trellis binary snapshot format header.
///
/// - File Header = Magic Bytes ("TRLS") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"TRLS";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of nodes a single path may hold.
///
/// Catalog inserts beyond this are rejected. This bounds the cost of a
/// single unlock computation, which is linear in the path size.
pub const MAX_NODES_PER_PATH: usize = 10_000;

/// Maximum number of explicit requirement edges on a single node.
pub const MAX_REQUIREMENTS_PER_NODE: usize = 64;

/// Maximum length for external content source / id strings.
///
/// Virtual node references longer than this are rejected by the catalog.
/// This prevents memory exhaustion from malformed input.
pub const MAX_EXTERNAL_REF_LENGTH: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_interval_is_two_hours() {
        assert_eq!(REFILL_INTERVAL_MS, 7_200_000);
    }

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"TRLS");
    }
}
