//! # Progression Service
//!
//! Orchestrates load-or-create, reconciliation and completion transitions
//! over a node-graph source and a progress store.
//!
//! The service never patches unlock state: every read recomputes the
//! derivation and self-heals the persisted cache, so graph edits made after
//! a record was created are absorbed on the next access. Mutation requires
//! `&mut self`, which serializes writes to a record in-process; the
//! persistent backend additionally serializes writers at the transaction
//! level.

use crate::catalog::NodeGraphSource;
use crate::storage::ProgressStore;
use crate::streak;
use crate::types::{Node, NodeId, PathId, ProgressRecord, Timestamp, TrellisError, UserId};
use crate::unlock::UnlockComputer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The learner-visible unlock snapshot for a (user, path) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockState {
    pub completed_node_ids: BTreeSet<NodeId>,
    pub unlocked_node_ids: BTreeSet<NodeId>,
}

/// Progression orchestration over a graph source and a progress store.
#[derive(Debug)]
pub struct ProgressionService<G, S>
where
    G: NodeGraphSource,
    S: ProgressStore,
{
    graph: G,
    store: S,
}

impl<G, S> ProgressionService<G, S>
where
    G: NodeGraphSource,
    S: ProgressStore,
{
    /// Create a service over the given graph source and store.
    #[must_use]
    pub fn new(graph: G, store: S) -> Self {
        Self { graph, store }
    }

    /// The underlying graph source.
    #[must_use]
    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Mutable access to the graph source, for catalog edits. Progress
    /// records self-heal against the edited graph on their next read.
    #[must_use]
    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Recompute the unlock cache against the given graph and persist it if
    /// membership changed. Returns whether a write happened.
    fn reconcile_with(
        &mut self,
        record: &mut ProgressRecord,
        nodes: &[Node],
    ) -> Result<bool, TrellisError> {
        let fresh = UnlockComputer::compute(nodes, &record.completed_node_ids);
        if fresh == record.unlocked_node_ids {
            return Ok(false);
        }
        record.unlocked_node_ids = fresh;
        self.store.save_progress(record)?;
        Ok(true)
    }

    /// Load the record for a (user, path) pair, creating it lazily on first
    /// access. Every load reconciles the unlock cache against the current
    /// graph.
    pub fn get_or_create(
        &mut self,
        user: UserId,
        path: PathId,
    ) -> Result<ProgressRecord, TrellisError> {
        let nodes = self.graph.list_active_nodes(path)?;

        match self.store.load_progress(user, path)? {
            Some(mut record) => {
                self.reconcile_with(&mut record, &nodes)?;
                Ok(record)
            }
            None => {
                let mut record = ProgressRecord::new(user, path);
                record.unlocked_node_ids =
                    UnlockComputer::compute(&nodes, &record.completed_node_ids);
                self.store.save_progress(&record)?;
                Ok(record)
            }
        }
    }

    /// The GetUnlockState operation: reconciled completed/unlocked sets.
    pub fn unlock_state(
        &mut self,
        user: UserId,
        path: PathId,
    ) -> Result<UnlockState, TrellisError> {
        let record = self.get_or_create(user, path)?;
        Ok(UnlockState {
            completed_node_ids: record.completed_node_ids,
            unlocked_node_ids: record.unlocked_node_ids,
        })
    }

    /// The CompleteNode operation.
    ///
    /// Validates against a freshly computed unlock set — the stale cache is
    /// never trusted for this check. On success the completion is recorded
    /// idempotently (repeat completion is a set-membership no-op), the
    /// unlock cache is recomputed and the record persisted. A recompute
    /// that cannot be saved is never reported as success.
    pub fn complete_node(
        &mut self,
        user: UserId,
        path: PathId,
        node: NodeId,
        now: Timestamp,
    ) -> Result<ProgressRecord, TrellisError> {
        let nodes = self.graph.list_active_nodes(path)?;
        if !nodes.iter().any(|n| n.id == node) {
            return Err(TrellisError::NodeNotFound(node));
        }

        let mut record = match self.store.load_progress(user, path)? {
            Some(record) => record,
            None => {
                let mut record = ProgressRecord::new(user, path);
                record.unlocked_node_ids =
                    UnlockComputer::compute(&nodes, &record.completed_node_ids);
                record
            }
        };

        let fresh = UnlockComputer::compute(&nodes, &record.completed_node_ids);
        if !fresh.contains(&node) {
            return Err(TrellisError::NotUnlocked(node));
        }

        record.completed_node_ids.insert(node);
        record.streak = streak::advance(record.streak, record.last_activity_at, now);
        record.last_activity_at = now;
        record.unlocked_node_ids = UnlockComputer::compute(&nodes, &record.completed_node_ids);
        self.store.save_progress(&record)?;
        Ok(record)
    }
}

// =============================================================================
// TESTS
// =============================================================================
