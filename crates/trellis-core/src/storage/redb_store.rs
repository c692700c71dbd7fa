//! # redb-backed Store
//!
//! Disk-backed persistence using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! The store is a cheap-to-clone handle around one database file, so the
//! progression service and the lives gate can share a single file; redb
//! serializes writers internally, which is what gives concurrent
//! completions of different nodes their read-modify-write safety at the
//! store boundary.

use super::{LivesStore, ProgressStore};
use crate::catalog::{NodeGraphSource, PathCatalog, SerializableCatalog, resolve_entry, sort_nodes};
use crate::lives::LivesState;
use crate::types::{Node, NodeId, NodeRef, PathId, ProgressRecord, TrellisError, UserId};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

/// Table for progress records: (user_id, path_id) -> serialized ProgressRecord.
/// The composite key enforces the one-record-per-(user, path) invariant.
const PROGRESS: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("progress");

/// Table for lives state: user_id -> serialized LivesState.
const LIVES: TableDefinition<u64, &[u8]> = TableDefinition::new("lives");

/// Table for catalog entries: (path_id, node_id) -> serialized NodeRef.
const NODES: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("nodes");

/// Table for metadata: key string -> value u64.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const META_NEXT_NODE_ID: &str = "next_node_id";

/// A disk-backed store handle.
///
/// Clones share the same database; hand one clone to the progression
/// service and another to the lives gate.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

fn io_err(e: impl std::fmt::Display) -> TrellisError {
    TrellisError::IoError(e.to_string())
}

fn ser_err(e: impl std::fmt::Display) -> TrellisError {
    TrellisError::SerializationError(e.to_string())
}

impl RedbStore {
    /// Open or create a store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TrellisError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(PROGRESS).map_err(io_err)?;
            let _ = write_txn.open_table(LIVES).map_err(io_err)?;
            let _ = write_txn.open_table(NODES).map_err(io_err)?;
            let _ = write_txn.open_table(META).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), TrellisError> {
        match Arc::get_mut(&mut self.db) {
            Some(db) => {
                db.compact().map_err(io_err)?;
                Ok(())
            }
            None => Err(TrellisError::IoError(
                "cannot compact while other handles are open".to_string(),
            )),
        }
    }

    // =========================================================================
    // CATALOG PERSISTENCE
    // =========================================================================

    /// Replace the persisted catalog with the given one in a single
    /// transaction.
    pub fn save_catalog(&mut self, catalog: &PathCatalog) -> Result<(), TrellisError> {
        let snapshot = SerializableCatalog::from(catalog);

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            // Rebuild the table from scratch; the snapshot is authoritative.
            write_txn.delete_table(NODES).map_err(io_err)?;
            let mut nodes_table = write_txn.open_table(NODES).map_err(io_err)?;
            for (path, id, entry) in &snapshot.entries {
                let bytes = postcard::to_allocvec(entry).map_err(ser_err)?;
                nodes_table
                    .insert((path.0, id.0), bytes.as_slice())
                    .map_err(io_err)?;
            }

            let mut meta_table = write_txn.open_table(META).map_err(io_err)?;
            meta_table
                .insert(META_NEXT_NODE_ID, snapshot.next_node_id)
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    /// Load the persisted catalog.
    pub fn load_catalog(&self) -> Result<PathCatalog, TrellisError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;

        let next_node_id = {
            let table = read_txn.open_table(META).map_err(io_err)?;
            table
                .get(META_NEXT_NODE_ID)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(1)
        };

        let entries = {
            let table = read_txn.open_table(NODES).map_err(io_err)?;
            let mut entries = Vec::new();
            for entry in table.iter().map_err(io_err)? {
                let (key, value) = entry.map_err(io_err)?;
                let (path_id, node_id) = key.value();
                let node_ref: NodeRef = postcard::from_bytes(value.value()).map_err(ser_err)?;
                entries.push((PathId(path_id), NodeId(node_id), node_ref));
            }
            entries
        };

        Ok(PathCatalog::from(SerializableCatalog {
            entries,
            next_node_id,
        }))
    }
}

// =============================================================================
// STORE TRAIT IMPLEMENTATIONS
// =============================================================================

impl ProgressStore for RedbStore {
    fn load_progress(
        &self,
        user: UserId,
        path: PathId,
    ) -> Result<Option<ProgressRecord>, TrellisError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(PROGRESS).map_err(io_err)?;

        table
            .get((user.0, path.0))
            .map_err(io_err)?
            .map(|bytes| postcard::from_bytes(bytes.value()).map_err(ser_err))
            .transpose()
    }

    fn save_progress(&mut self, record: &ProgressRecord) -> Result<(), TrellisError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(PROGRESS).map_err(io_err)?;

            // Merge inside the single-writer transaction: completions from a
            // concurrent write are unioned in, never lost.
            let mut merged = record.clone();
            if let Some(existing) = table
                .get((record.user_id.0, record.path_id.0))
                .map_err(io_err)?
            {
                let existing: ProgressRecord =
                    postcard::from_bytes(existing.value()).map_err(ser_err)?;
                merged
                    .completed_node_ids
                    .extend(existing.completed_node_ids.iter().copied());
            }

            let bytes = postcard::to_allocvec(&merged).map_err(ser_err)?;
            table
                .insert((record.user_id.0, record.path_id.0), bytes.as_slice())
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

impl LivesStore for RedbStore {
    fn load_lives(&self, user: UserId) -> Result<Option<LivesState>, TrellisError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(LIVES).map_err(io_err)?;

        table
            .get(user.0)
            .map_err(io_err)?
            .map(|bytes| postcard::from_bytes(bytes.value()).map_err(ser_err))
            .transpose()
    }

    fn save_lives(&mut self, user: UserId, state: &LivesState) -> Result<(), TrellisError> {
        let bytes = postcard::to_allocvec(state).map_err(ser_err)?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(LIVES).map_err(io_err)?;
            table.insert(user.0, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

impl NodeGraphSource for RedbStore {
    fn list_active_nodes(&self, path: PathId) -> Result<Vec<Node>, TrellisError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(NODES).map_err(io_err)?;

        let mut nodes = Vec::new();
        for entry in table
            .range((path.0, u64::MIN)..=(path.0, u64::MAX))
            .map_err(io_err)?
        {
            let (key, value) = entry.map_err(io_err)?;
            let (_, node_id) = key.value();
            let node_ref: NodeRef = postcard::from_bytes(value.value()).map_err(ser_err)?;
            let node = resolve_entry(path, NodeId(node_id), &node_ref);
            if node.status.is_active() {
                nodes.push(node);
            }
        }

        if nodes.is_empty() {
            return Err(TrellisError::PathNotFound(path));
        }

        sort_nodes(&mut nodes);
        Ok(nodes)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RedbStore::open(dir.path().join("trellis.db")).expect("open");
        (dir, store)
    }

    #[test]
    fn progress_roundtrip_through_disk() {
        let (_dir, mut store) = temp_store();

        let mut record = ProgressRecord::new(UserId(1), PathId(2));
        record.completed_node_ids.insert(NodeId(7));
        store.save_progress(&record).expect("save");

        let loaded = store
            .load_progress(UserId(1), PathId(2))
            .expect("load")
            .expect("present");
        assert_eq!(loaded, record);

        // Unknown keys stay absent.
        assert!(store
            .load_progress(UserId(1), PathId(3))
            .expect("load")
            .is_none());
    }

    #[test]
    fn concurrent_completions_merge_instead_of_overwriting() {
        let (_dir, mut store) = temp_store();
        let base = ProgressRecord::new(UserId(1), PathId(1));

        let mut first = base.clone();
        first.completed_node_ids.insert(NodeId(1));
        let mut second = base;
        second.completed_node_ids.insert(NodeId(2));

        store.save_progress(&first).expect("save first");
        store.save_progress(&second).expect("save second");

        let loaded = store
            .load_progress(UserId(1), PathId(1))
            .expect("load")
            .expect("present");
        assert!(loaded.completed_node_ids.contains(&NodeId(1)));
        assert!(loaded.completed_node_ids.contains(&NodeId(2)));
    }

    #[test]
    fn lives_roundtrip_through_disk() {
        let (_dir, mut store) = temp_store();

        let state = LivesState {
            lives: 1,
            last_refill_at: crate::types::Timestamp(42),
        };
        store.save_lives(UserId(5), &state).expect("save");

        let loaded = store.load_lives(UserId(5)).expect("load").expect("present");
        assert_eq!(loaded, state);
    }

    #[test]
    fn catalog_roundtrip_preserves_ids_and_order() {
        let (_dir, mut store) = temp_store();

        let mut catalog = PathCatalog::new();
        let b = catalog
            .insert(PathId(1), NodeRef::Concrete(Node::new(NodeId(0), PathId(0), 2, 1)))
            .expect("insert");
        let a = catalog
            .insert(PathId(1), NodeRef::Concrete(Node::new(NodeId(0), PathId(0), 1, 1)))
            .expect("insert");
        store.save_catalog(&catalog).expect("save");

        let restored = store.load_catalog().expect("load");
        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.next_node_id(), catalog.next_node_id());

        // The store also serves the graph directly, sorted.
        let nodes = store.list_active_nodes(PathId(1)).expect("list");
        let order: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![a, b]);
    }

    #[test]
    fn empty_path_is_path_not_found() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.list_active_nodes(PathId(1)),
            Err(TrellisError::PathNotFound(_))
        ));
    }

    #[test]
    fn cloned_handles_share_the_database() {
        let (_dir, mut store) = temp_store();
        let reader = store.clone();

        let record = ProgressRecord::new(UserId(1), PathId(1));
        store.save_progress(&record).expect("save");

        assert!(reader
            .load_progress(UserId(1), PathId(1))
            .expect("load")
            .is_some());
    }
}
