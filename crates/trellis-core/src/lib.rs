//! # trellis-core
//!
//! The deterministic progression engine for Trellis - THE LOGIC.
//!
//! This crate computes, for a learner, which curriculum nodes are currently
//! accessible given a learning-path's node graph (ordered levels, explicit
//! prerequisite edges, linked alias nodes) and the learner's completed-node
//! history, plus the complementary lives gate that throttles attempt
//! frequency via a time-bucket refill model.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the ONLY place where progression state exists (stateful)
//! - Rederives unlock state globally from completions on every read;
//!   the persisted cache is never patched, so it can never drift
//! - Never reads a clock; callers capture `now` once and pass it in
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod formats;
pub mod lives;
pub mod primitives;
pub mod progression;
pub mod storage;
pub mod streak;
pub mod types;
pub mod unlock;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ExternalContentRef, Node, NodeId, NodeRef, NodeStatus, PathId, ProgressRecord, Timestamp,
    TrellisError, UserId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use catalog::{GraphIssue, NodeGraphSource, PathCatalog, SerializableCatalog};
pub use lives::{LivesGate, LivesState, LivesStatus};
pub use progression::{ProgressionService, UnlockState};
pub use storage::{LivesStore, MemoryStore, ProgressStore, RedbStore};
pub use unlock::UnlockComputer;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, catalog_from_bytes, catalog_to_bytes};
