//! # Path Catalog
//!
//! The node-graph source for Trellis CORE.
//!
//! The catalog owns node identity: ids are allocated monotonically on
//! insert, so ascending NodeId order is creation order. Virtual references
//! (externally sourced content presented as pseudo-nodes) are resolved into
//! concrete nodes here, at the boundary — the unlock computer only ever
//! consumes fully-resolved nodes.
//!
//! All data structures use `BTreeMap` for deterministic ordering.

use crate::primitives::{MAX_EXTERNAL_REF_LENGTH, MAX_NODES_PER_PATH, MAX_REQUIREMENTS_PER_NODE};
use crate::types::{ExternalContentRef, Node, NodeId, NodeRef, PathId, TrellisError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// NODE GRAPH SOURCE TRAIT
// =============================================================================

/// Read-only provider of a path's ordered active-node set.
///
/// Implemented by the in-memory [`PathCatalog`] and by the persistent store,
/// so the progression service works uniformly against either.
pub trait NodeGraphSource {
    /// List the path's active nodes, sorted by
    /// `(level asc, position_index asc, id asc)`.
    ///
    /// Returns `TrellisError::PathNotFound` when the path has no active
    /// nodes — every valid path holds at least one.
    fn list_active_nodes(&self, path: PathId) -> Result<Vec<Node>, TrellisError>;
}

/// Sort nodes into the canonical unlock ordering.
pub(crate) fn sort_nodes(nodes: &mut [Node]) {
    nodes.sort_by_key(|n| (n.level, n.position_index, n.id));
}

/// Resolve a catalog entry into a concrete node.
///
/// Virtual references materialize as plain active nodes at their declared
/// placement, with no requirement edges of their own.
pub(crate) fn resolve_entry(path: PathId, id: NodeId, entry: &NodeRef) -> Node {
    match entry {
        NodeRef::Concrete(node) => node.clone(),
        NodeRef::Virtual(content) => {
            let mut node = Node::new(id, path, content.level, content.position_index);
            node.locked_by_default = content.locked_by_default;
            node
        }
    }
}

// =============================================================================
// GRAPH ISSUES (advisory audit)
// =============================================================================

/// An advisory finding from [`PathCatalog::audit`].
///
/// Issues never fail unlock computation — dangling requirements degrade to
/// "permanently locked" — but authors should fix them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphIssue {
    /// A requirement edge points at a node that is not in the path.
    DanglingRequirement { node: NodeId, missing: NodeId },
    /// A forward unlock edge points at a node that is not in the path.
    DanglingUnlockTarget { node: NodeId, missing: NodeId },
    /// The node carries both a non-empty requirement set and a level
    /// placement above the base level. The requirement set takes strict
    /// precedence over the previous-level rule; content relying on the
    /// level rule firing for this node will not behave as expected.
    ConflictingGating { node: NodeId },
    /// Two nodes occupy the same (level, position) cell.
    DuplicatePlacement { first: NodeId, second: NodeId },
}

impl std::fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphIssue::DanglingRequirement { node, missing } => {
                write!(f, "node {} requires missing node {}", node.0, missing.0)
            }
            GraphIssue::DanglingUnlockTarget { node, missing } => {
                write!(f, "node {} unlocks missing node {}", node.0, missing.0)
            }
            GraphIssue::ConflictingGating { node } => write!(
                f,
                "node {} has explicit requirements and a level placement; the requirements win",
                node.0
            ),
            GraphIssue::DuplicatePlacement { first, second } => {
                write!(f, "nodes {} and {} share a grid cell", first.0, second.0)
            }
        }
    }
}

// =============================================================================
// PATH CATALOG
// =============================================================================

/// In-memory node catalog covering any number of paths.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone)]
pub struct PathCatalog {
    /// Entries per path: PathId -> (NodeId -> entry)
    entries: BTreeMap<PathId, BTreeMap<NodeId, NodeRef>>,
    /// Next available NodeId. Ids start at 1; 0 is the unassigned marker.
    next_node_id: u64,
}

impl Default for PathCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PathCatalog {
    /// Create a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_node_id: 1,
        }
    }

    /// Get the next node id that would be assigned.
    #[must_use]
    pub fn next_node_id(&self) -> u64 {
        self.next_node_id
    }

    /// Total number of entries across all paths.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// The paths currently present in the catalog.
    pub fn paths(&self) -> impl Iterator<Item = PathId> + '_ {
        self.entries.keys().copied()
    }

    /// Validate a catalog entry before insert.
    fn validate(&self, path: PathId, entry: &NodeRef) -> Result<(), TrellisError> {
        let per_path = self.entries.get(&path).map_or(0, BTreeMap::len);
        if per_path >= MAX_NODES_PER_PATH {
            return Err(TrellisError::InvalidNode(format!(
                "path {} is full ({} nodes)",
                path.0, MAX_NODES_PER_PATH
            )));
        }

        let (level, position) = match entry {
            NodeRef::Concrete(node) => {
                if node.required_node_ids.len() > MAX_REQUIREMENTS_PER_NODE {
                    return Err(TrellisError::InvalidNode(format!(
                        "too many requirement edges ({} > {})",
                        node.required_node_ids.len(),
                        MAX_REQUIREMENTS_PER_NODE
                    )));
                }
                (node.level, node.position_index)
            }
            NodeRef::Virtual(content) => {
                if content.source.is_empty()
                    || content.external_id.is_empty()
                    || content.source.len() > MAX_EXTERNAL_REF_LENGTH
                    || content.external_id.len() > MAX_EXTERNAL_REF_LENGTH
                {
                    return Err(TrellisError::InvalidNode(
                        "malformed external content reference".to_string(),
                    ));
                }
                (content.level, content.position_index)
            }
        };

        if level == 0 || position == 0 {
            return Err(TrellisError::InvalidNode(
                "level and position_index start at 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Insert an entry into a path, allocating its id.
    ///
    /// Any id or path carried by a concrete node is replaced; the catalog
    /// owns identity.
    pub fn insert(&mut self, path: PathId, entry: NodeRef) -> Result<NodeId, TrellisError> {
        self.validate(path, &entry)?;

        let id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.saturating_add(1);

        let entry = match entry {
            NodeRef::Concrete(mut node) => {
                node.id = id;
                node.path_id = path;
                NodeRef::Concrete(node)
            }
            virtual_entry @ NodeRef::Virtual(_) => virtual_entry,
        };

        self.entries.entry(path).or_default().insert(id, entry);
        Ok(id)
    }

    /// Insert an entry preserving its original id (seed/import flows).
    ///
    /// Bumps the id allocator past the imported id. An existing entry with
    /// the same id is replaced.
    pub fn import(&mut self, path: PathId, id: NodeId, entry: NodeRef) -> Result<(), TrellisError> {
        if id.0 == 0 {
            return Err(TrellisError::InvalidNode(
                "node id 0 is reserved".to_string(),
            ));
        }
        self.validate(path, &entry)?;

        if id.0 >= self.next_node_id {
            self.next_node_id = id.0.saturating_add(1);
        }

        let entry = match entry {
            NodeRef::Concrete(mut node) => {
                node.id = id;
                node.path_id = path;
                NodeRef::Concrete(node)
            }
            virtual_entry @ NodeRef::Virtual(_) => virtual_entry,
        };

        self.entries.entry(path).or_default().insert(id, entry);
        Ok(())
    }

    /// Insert a linked alias node reusing another node's content.
    ///
    /// The alias gets its own id and placement and participates in unlock
    /// computation as an ordinary node of `path`.
    pub fn insert_linked(
        &mut self,
        path: PathId,
        source: NodeId,
        level: u32,
        position_index: u32,
    ) -> Result<NodeId, TrellisError> {
        if !self
            .entries
            .values()
            .any(|nodes| nodes.contains_key(&source))
        {
            return Err(TrellisError::NodeNotFound(source));
        }

        let mut alias = Node::new(NodeId(0), path, level, position_index);
        alias.link_source = Some(source);
        self.insert(path, NodeRef::Concrete(alias))
    }

    /// Look up a resolved node by id within a path.
    #[must_use]
    pub fn node(&self, path: PathId, id: NodeId) -> Option<Node> {
        self.entries
            .get(&path)?
            .get(&id)
            .map(|entry| resolve_entry(path, id, entry))
    }

    /// Update the publication status of a concrete node.
    ///
    /// Virtual pseudo-nodes are always active; retargeting or removing them
    /// is a catalog-boundary concern, not a status flip.
    pub fn set_status(
        &mut self,
        path: PathId,
        id: NodeId,
        status: crate::types::NodeStatus,
    ) -> Result<(), TrellisError> {
        let entry = self
            .entries
            .get_mut(&path)
            .and_then(|nodes| nodes.get_mut(&id))
            .ok_or(TrellisError::NodeNotFound(id))?;
        match entry {
            NodeRef::Concrete(node) => {
                node.status = status;
                Ok(())
            }
            NodeRef::Virtual(_) => Err(TrellisError::InvalidNode(
                "virtual nodes have no publication status".to_string(),
            )),
        }
    }

    /// Replace the requirement edges of a concrete node.
    pub fn set_required(
        &mut self,
        path: PathId,
        id: NodeId,
        required: impl IntoIterator<Item = NodeId>,
    ) -> Result<(), TrellisError> {
        let entry = self
            .entries
            .get_mut(&path)
            .and_then(|nodes| nodes.get_mut(&id))
            .ok_or(TrellisError::NodeNotFound(id))?;
        match entry {
            NodeRef::Concrete(node) => {
                let required: std::collections::BTreeSet<NodeId> = required.into_iter().collect();
                if required.len() > MAX_REQUIREMENTS_PER_NODE {
                    return Err(TrellisError::InvalidNode(format!(
                        "too many requirement edges ({} > {})",
                        required.len(),
                        MAX_REQUIREMENTS_PER_NODE
                    )));
                }
                node.required_node_ids = required;
                Ok(())
            }
            NodeRef::Virtual(_) => Err(TrellisError::InvalidNode(
                "virtual nodes carry no requirement edges".to_string(),
            )),
        }
    }

    /// Scan a path for advisory graph issues.
    ///
    /// Findings never block learners; the unlock computer degrades
    /// gracefully. They are surfaced so authors can fix content that would
    /// otherwise rely on the wrong rule firing.
    pub fn audit(&self, path: PathId) -> Result<Vec<GraphIssue>, TrellisError> {
        let nodes = self.list_active_nodes(path)?;
        let known: std::collections::BTreeSet<NodeId> = nodes.iter().map(|n| n.id).collect();
        let base_level = nodes.iter().map(|n| n.level).min().unwrap_or(1);

        let mut issues = Vec::new();
        let mut placements: BTreeMap<(u32, u32), NodeId> = BTreeMap::new();

        for node in &nodes {
            for &missing in &node.required_node_ids {
                if !known.contains(&missing) {
                    issues.push(GraphIssue::DanglingRequirement {
                        node: node.id,
                        missing,
                    });
                }
            }
            for &missing in &node.unlocks_node_ids {
                if !known.contains(&missing) {
                    issues.push(GraphIssue::DanglingUnlockTarget {
                        node: node.id,
                        missing,
                    });
                }
            }
            if !node.required_node_ids.is_empty() && node.level > base_level {
                issues.push(GraphIssue::ConflictingGating { node: node.id });
            }
            if let Some(&first) = placements.get(&(node.level, node.position_index)) {
                issues.push(GraphIssue::DuplicatePlacement {
                    first,
                    second: node.id,
                });
            } else {
                placements.insert((node.level, node.position_index), node.id);
            }
        }

        Ok(issues)
    }
}

impl NodeGraphSource for PathCatalog {
    fn list_active_nodes(&self, path: PathId) -> Result<Vec<Node>, TrellisError> {
        let entries = self
            .entries
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

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the catalog for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableCatalog {
    pub entries: Vec<(PathId, NodeId, NodeRef)>,
    pub next_node_id: u64,
}

impl From<&PathCatalog> for SerializableCatalog {
    fn from(catalog: &PathCatalog) -> Self {
        let entries = catalog
            .entries
            .iter()
            .flat_map(|(path, nodes)| {
                nodes
                    .iter()
                    .map(move |(id, entry)| (*path, *id, entry.clone()))
            })
            .collect();
        Self {
            entries,
            next_node_id: catalog.next_node_id,
        }
    }
}

impl From<SerializableCatalog> for PathCatalog {
    fn from(sc: SerializableCatalog) -> Self {
        let mut catalog = PathCatalog::new();
        for (path, id, entry) in sc.entries {
            // Invalid imported entries are dropped rather than failing the
            // whole load; the audit surfaces anything suspicious.
            let _ = catalog.import(path, id, entry);
        }
        if sc.next_node_id > catalog.next_node_id {
            catalog.next_node_id = sc.next_node_id;
        }
        catalog
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeStatus;

    fn concrete(level: u32, pos: u32) -> NodeRef {
        NodeRef::Concrete(Node::new(NodeId(0), PathId(0), level, pos))
    }

    #[test]
    fn insert_allocates_monotonic_ids() {
        let mut catalog = PathCatalog::new();
        let a = catalog.insert(PathId(1), concrete(1, 1)).expect("insert");
        let b = catalog.insert(PathId(1), concrete(1, 2)).expect("insert");
        assert!(a < b);
        assert_eq!(catalog.node_count(), 2);
    }

    #[test]
    fn insert_rejects_zero_placement() {
        let mut catalog = PathCatalog::new();
        let result = catalog.insert(PathId(1), concrete(0, 1));
        assert!(matches!(result, Err(TrellisError::InvalidNode(_))));
    }

    #[test]
    fn list_is_sorted_by_level_then_position_then_id() {
        let mut catalog = PathCatalog::new();
        // Insert out of grid order.
        let c = catalog.insert(PathId(1), concrete(2, 1)).expect("insert");
        let a = catalog.insert(PathId(1), concrete(1, 1)).expect("insert");
        let b = catalog.insert(PathId(1), concrete(1, 2)).expect("insert");

        let nodes = catalog.list_active_nodes(PathId(1)).expect("list");
        let order: Vec<NodeId> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn list_excludes_inactive_nodes() {
        let mut catalog = PathCatalog::new();
        let a = catalog.insert(PathId(1), concrete(1, 1)).expect("insert");
        let b = catalog.insert(PathId(1), concrete(1, 2)).expect("insert");
        catalog
            .set_status(PathId(1), b, NodeStatus::Archived)
            .expect("archive");

        let nodes = catalog.list_active_nodes(PathId(1)).expect("list");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, a);
    }

    #[test]
    fn missing_path_is_path_not_found() {
        let catalog = PathCatalog::new();
        let result = catalog.list_active_nodes(PathId(9));
        assert!(matches!(result, Err(TrellisError::PathNotFound(_))));
    }

    #[test]
    fn virtual_entries_resolve_to_concrete_nodes() {
        let mut catalog = PathCatalog::new();
        catalog.insert(PathId(1), concrete(1, 1)).expect("insert");
        let v = catalog
            .insert(
                PathId(1),
                NodeRef::Virtual(ExternalContentRef {
                    source: "library".to_string(),
                    external_id: "intro-video".to_string(),
                    level: 2,
                    position_index: 1,
                    locked_by_default: true,
                }),
            )
            .expect("insert virtual");

        let nodes = catalog.list_active_nodes(PathId(1)).expect("list");
        let resolved = nodes.iter().find(|n| n.id == v).expect("resolved");
        assert_eq!(resolved.level, 2);
        assert!(resolved.status.is_active());
        assert!(resolved.required_node_ids.is_empty());
    }

    #[test]
    fn linked_alias_gets_own_identity() {
        let mut catalog = PathCatalog::new();
        let source = catalog.insert(PathId(1), concrete(1, 1)).expect("insert");
        let alias = catalog
            .insert_linked(PathId(2), source, 1, 1)
            .expect("link");

        assert_ne!(alias, source);
        let node = catalog.node(PathId(2), alias).expect("resolved alias");
        assert_eq!(node.link_source, Some(source));
    }

    #[test]
    fn linking_missing_source_fails() {
        let mut catalog = PathCatalog::new();
        let result = catalog.insert_linked(PathId(1), NodeId(42), 1, 1);
        assert!(matches!(result, Err(TrellisError::NodeNotFound(_))));
    }

    #[test]
    fn audit_reports_dangling_and_conflicting_edges() {
        let mut catalog = PathCatalog::new();
        let a = catalog.insert(PathId(1), concrete(1, 1)).expect("insert");
        let b = catalog
            .insert(
                PathId(1),
                NodeRef::Concrete(
                    Node::new(NodeId(0), PathId(0), 2, 1).with_required([NodeId(404)]),
                ),
            )
            .expect("insert");

        let issues = catalog.audit(PathId(1)).expect("audit");
        assert!(issues.contains(&GraphIssue::DanglingRequirement {
            node: b,
            missing: NodeId(404)
        }));
        assert!(issues.contains(&GraphIssue::ConflictingGating { node: b }));
        assert!(!issues.iter().any(
            |i| matches!(i, GraphIssue::DanglingRequirement { node, .. } if *node == a)
        ));
    }

    #[test]
    fn audit_reports_duplicate_placement() {
        let mut catalog = PathCatalog::new();
        let a = catalog.insert(PathId(1), concrete(1, 1)).expect("insert");
        let b = catalog.insert(PathId(1), concrete(1, 1)).expect("insert");

        let issues = catalog.audit(PathId(1)).expect("audit");
        assert!(issues.contains(&GraphIssue::DuplicatePlacement { first: a, second: b }));
    }

    #[test]
    fn serialization_roundtrip_preserves_ids() {
        let mut catalog = PathCatalog::new();
        let a = catalog.insert(PathId(1), concrete(1, 1)).expect("insert");
        let b = catalog.insert(PathId(2), concrete(1, 1)).expect("insert");

        let restored = PathCatalog::from(SerializableCatalog::from(&catalog));
        assert_eq!(restored.node_count(), 2);
        assert!(restored.node(PathId(1), a).is_some());
        assert!(restored.node(PathId(2), b).is_some());
        assert_eq!(restored.next_node_id(), catalog.next_node_id());
    }
}
