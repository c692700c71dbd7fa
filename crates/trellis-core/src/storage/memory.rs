//! In-memory store backend.
//!
//! `BTreeMap`-backed twin of the redb store: fast, volatile, deterministic
//! iteration order. Used by tests and as the default backend for callers
//! that do not need durability.

use super::{LivesStore, ProgressStore};
use crate::catalog::{NodeGraphSource, resolve_entry, sort_nodes};
use crate::lives::LivesState;
use crate::types::{Node, NodeId, NodeRef, PathId, ProgressRecord, TrellisError, UserId};
use std::collections::BTreeMap;

/// Volatile store holding progress, lives and catalog entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    progress: BTreeMap<(UserId, PathId), ProgressRecord>,
    lives: BTreeMap<UserId, LivesState>,
    nodes: BTreeMap<PathId, BTreeMap<NodeId, NodeRef>>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of progress records held.
    #[must_use]
    pub fn progress_count(&self) -> usize {
        self.progress.len()
    }

    /// Replace the stored catalog entries for all paths.
    pub fn put_nodes(&mut self, entries: impl IntoIterator<Item = (PathId, NodeId, NodeRef)>) {
        self.nodes.clear();
        for (path, id, entry) in entries {
            self.nodes.entry(path).or_default().insert(id, entry);
        }
    }
}

impl ProgressStore for MemoryStore {
    fn load_progress(
        &self,
        user: UserId,
        path: PathId,
    ) -> Result<Option<ProgressRecord>, TrellisError> {
        Ok(self.progress.get(&(user, path)).cloned())
    }

    fn save_progress(&mut self, record: &ProgressRecord) -> Result<(), TrellisError> {
        let mut merged = record.clone();
        if let Some(existing) = self.progress.get(&(record.user_id, record.path_id)) {
            merged
                .completed_node_ids
                .extend(existing.completed_node_ids.iter().copied());
        }
        self.progress
            .insert((record.user_id, record.path_id), merged);
        Ok(())
    }
}

impl LivesStore for MemoryStore {
    fn load_lives(&self, user: UserId) -> Result<Option<LivesState>, TrellisError> {
        Ok(self.lives.get(&user).copied())
    }

    fn save_lives(&mut self, user: UserId, state: &LivesState) -> Result<(), TrellisError> {
        self.lives.insert(user, *state);
        Ok(())
    }
}

impl NodeGraphSource for MemoryStore {
    fn list_active_nodes(&self, path: PathId) -> Result<Vec<Node>, TrellisError> {
        let entries = self
            .nodes
            .get(&path)
            .ok_or(TrellisError::PathNotFound(path))?;

        let mut nodes: Vec<Node> = entries
            .iter()
            .map(|(id, entry)| resolve_entry(path, *id, entry))
            .filter(|node| node.status.is_active())
            .collect();

        if nodes.is_empty() {
            return Err(TrellisError::PathNotFound(path));
        }

        sort_nodes(&mut nodes);
        Ok(nodes)
    }
}
