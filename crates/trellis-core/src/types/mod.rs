//! # Core Type Definitions
//!
//! This module contains all core types for the Trellis deterministic
//! progression substrate:
//! - Learner, path and node identifiers (`UserId`, `PathId`, `NodeId`)
//! - Time representation (`Timestamp`)
//! - Curriculum node model (`Node`, `NodeStatus`, `NodeRef`)
//! - Progress state (`ProgressRecord`)
//! - Error types (`TrellisError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic for counters and timestamps

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Unique identifier for a learning path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PathId(pub u64);

/// Unique identifier for a curriculum node.
///
/// NodeIds are allocated monotonically by the catalog, so ascending NodeId
/// order is creation order. The unlock ordering tie-break relies on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

// =============================================================================
// TIME
// =============================================================================

/// A point in time as unix epoch milliseconds.
///
/// The CORE never reads a clock; callers capture `now` once per invocation
/// and pass it in. All arithmetic is saturating i64.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Create a timestamp from epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get the raw epoch milliseconds.
    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Add a millisecond offset using saturating arithmetic.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Milliseconds elapsed since `earlier`. Negative if `earlier` is in the
    /// future (clock skew); callers treat that as zero elapsed time.
    #[must_use]
    pub const fn millis_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// The UTC day number since the epoch this timestamp falls on.
    #[must_use]
    pub const fn epoch_day(self) -> i64 {
        self.0.div_euclid(crate::primitives::MILLIS_PER_DAY)
    }
}

// =============================================================================
// NODE
// =============================================================================

/// Publication status of a node. Only `Active` nodes participate in the
/// unlock graph; `Draft` and `Archived` nodes are invisible to learners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    Active,
    Draft,
    Archived,
}

impl NodeStatus {
    /// Whether nodes in this status are part of the learner-visible graph.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, NodeStatus::Active)
    }
}

/// A curriculum node placed in a path's level/position grid.
///
/// Levels are an ordered sequence of distinct integers, not necessarily
/// contiguous; `position_index` breaks ties within a level. Both start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The node identifier. Assigned by the catalog on insert.
    pub id: NodeId,
    /// The path this node belongs to. Assigned by the catalog on insert.
    pub path_id: PathId,
    /// Progression tier (>= 1). Same-level nodes are peers.
    pub level: u32,
    /// Position within the level (>= 1), the intra-level ordering key.
    pub position_index: u32,
    /// Explicit prerequisite edges. Non-empty set: the node unlocks only
    /// when EVERY listed node is completed, overriding the level rules.
    pub required_node_ids: BTreeSet<NodeId>,
    /// Explicit forward edges: completing this node unconditionally unlocks
    /// every listed node.
    pub unlocks_node_ids: BTreeSet<NodeId>,
    /// Author override: `false` makes the node unconditionally unlocked.
    pub locked_by_default: bool,
    /// Publication status.
    pub status: NodeStatus,
    /// For linked alias nodes, the node whose content this one reuses.
    /// Aliases participate in unlock computation as ordinary nodes.
    pub link_source: Option<NodeId>,
}

impl Node {
    /// Create a new active node at the given grid placement.
    ///
    /// The id and path are normally placeholders replaced by the catalog;
    /// tests that bypass the catalog set them explicitly.
    #[must_use]
    pub fn new(id: NodeId, path_id: PathId, level: u32, position_index: u32) -> Self {
        Self {
            id,
            path_id,
            level,
            position_index,
            required_node_ids: BTreeSet::new(),
            unlocks_node_ids: BTreeSet::new(),
            locked_by_default: true,
            status: NodeStatus::Active,
            link_source: None,
        }
    }

    /// Set explicit prerequisite edges.
    #[must_use]
    pub fn with_required(mut self, required: impl IntoIterator<Item = NodeId>) -> Self {
        self.required_node_ids = required.into_iter().collect();
        self
    }

    /// Set explicit forward unlock edges.
    #[must_use]
    pub fn with_unlocks(mut self, unlocks: impl IntoIterator<Item = NodeId>) -> Self {
        self.unlocks_node_ids = unlocks.into_iter().collect();
        self
    }

    /// Mark this node as unconditionally unlocked (author override).
    #[must_use]
    pub fn unlocked_by_default(mut self) -> Self {
        self.locked_by_default = false;
        self
    }

    /// Set the publication status.
    #[must_use]
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }
}

// =============================================================================
// NODE REFERENCES (virtual content resolution)
// =============================================================================

/// A reference to externally sourced content presented as a pseudo-node.
///
/// Virtual references are resolved into concrete [`Node`]s at the catalog
/// boundary; the unlock computer never sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalContentRef {
    /// The external content system this reference points into.
    pub source: String,
    /// The identifier within that system.
    pub external_id: String,
    /// Grid placement of the pseudo-node.
    pub level: u32,
    /// Position within the level.
    pub position_index: u32,
    /// Whether the pseudo-node is gated by the normal unlock rules.
    pub locked_by_default: bool,
}

/// A catalog entry: either a fully-specified node or a virtual reference.
///
/// The catalog resolves `Virtual` entries into concrete nodes when listing,
/// keeping the graph algorithm free of content-type branching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRef {
    Concrete(Node),
    Virtual(ExternalContentRef),
}

// =============================================================================
// PROGRESS RECORD
// =============================================================================

/// Persisted per-(user, path) progression state.
///
/// `completed_node_ids` is append-only: a completed node is never
/// un-completed. `unlocked_node_ids` is a derived cache and must always
/// equal the unlock computation over the current graph and completions; it
/// is fully recomputed on every read or change, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub path_id: PathId,
    pub completed_node_ids: BTreeSet<NodeId>,
    pub unlocked_node_ids: BTreeSet<NodeId>,
    /// Consecutive UTC days with at least one completion.
    pub streak: u32,
    /// Timestamp of the most recent completion.
    pub last_activity_at: Timestamp,
}

impl ProgressRecord {
    /// Create an empty record for a (user, path) pair.
    #[must_use]
    pub fn new(user_id: UserId, path_id: PathId) -> Self {
        Self {
            user_id,
            path_id,
            completed_node_ids: BTreeSet::new(),
            unlocked_node_ids: BTreeSet::new(),
            streak: 0,
            last_activity_at: Timestamp::default(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Trellis system.
///
/// - No silent failures
/// - Use `Result<T, TrellisError>` for fallible operations
/// - The CORE never panics; all errors are recoverable
///
/// The unlock computer itself is total and never returns errors: dangling
/// requirement ids degrade to "permanently locked". Fallibility concentrates
/// in store interactions and the explicit unlock check.
#[derive(Debug, Error)]
pub enum TrellisError {
    /// The requested path has no nodes, or does not exist.
    #[error("Path not found: {0:?}")]
    PathNotFound(PathId),

    /// The requested node is not part of the path's active graph.
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// The learner attempted a node that is not currently unlocked.
    /// User-correctable, not a defect.
    #[error("Node is locked: {0:?}")]
    NotUnlocked(NodeId),

    /// A catalog insert was rejected (placement out of range, limits
    /// exceeded, or malformed reference).
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The persistence store failed. Surfaced, never retried internally;
    /// retry policy is the caller's decision.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
