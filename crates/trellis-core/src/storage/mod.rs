//! # Storage Module
//!
//! Keyed persistence for progress records, lives state and the node
//! catalog.
//!
//! Two backends implement the store traits:
//! - [`MemoryStore`]: volatile `BTreeMap` store for tests and ephemeral use
//! - [`RedbStore`]: disk-backed ACID store using the redb embedded database

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::lives::LivesState;
use crate::types::{PathId, ProgressRecord, TrellisError, UserId};

/// Keyed persistence for progress records.
///
/// The `(user, path)` key carries the one-record-per-pair uniqueness
/// invariant; `save_progress` is a merge-upsert.
pub trait ProgressStore {
    /// Load the record for a (user, path) pair, if one exists.
    fn load_progress(
        &self,
        user: UserId,
        path: PathId,
    ) -> Result<Option<ProgressRecord>, TrellisError>;

    /// Insert or update the record for its (user, path) pair.
    ///
    /// Completed ids already present in the stored record are unioned into
    /// the write — `completed_node_ids` is append-only, so two concurrent
    /// completions of different nodes are both retained instead of one
    /// overwriting the other. The unlock cache is taken as given; a stale
    /// cache produced by such a merge self-heals on the next read.
    fn save_progress(&mut self, record: &ProgressRecord) -> Result<(), TrellisError>;
}

/// Keyed persistence for per-user lives state.
pub trait LivesStore {
    /// Load the lives state for a user, if one exists.
    fn load_lives(&self, user: UserId) -> Result<Option<LivesState>, TrellisError>;

    /// Insert or replace the lives state for a user.
    fn save_lives(&mut self, user: UserId, state: &LivesState) -> Result<(), TrellisError>;
}
