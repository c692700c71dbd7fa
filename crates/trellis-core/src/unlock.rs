//! # Unlock Computer
//!
//! The deterministic unlock derivation for Trellis CORE.
//!
//! Unlock state is always rederived globally from the node graph and the
//! completion set. It is never patched incrementally, which is what keeps
//! the persisted cache from drifting when the graph is edited after the
//! fact.
//!
//! ## Rule layering
//!
//! The result is the union of every rule that applies:
//!
//! 1. Every node at the base level (minimum level present) is unlocked.
//! 2. The globally-first node in the ordering is unlocked.
//! 3. A node with `locked_by_default == false` is unlocked (author override).
//! 4. A node with a non-empty requirement set unlocks when EVERY listed
//!    node is completed (AND). This replaces the level rules for that node.
//! 5. A node with no requirements at the base level is unlocked (subsumed
//!    by rule 1).
//! 6. A node with no requirements above the base level unlocks when AT
//!    LEAST ONE node on the closest lower populated level is completed (OR).
//! 7. Completing `node[i]` always unlocks `node[i + 1]` in the ordering.
//! 8. Completing a node unlocks everything in its `unlocks_node_ids`.
//!
//! The function is pure, total and deterministic: dangling requirement ids
//! can never be completed, so rule 4 simply stays unsatisfied for them.
//! Monotonic in the completion set by construction — no rule removes
//! membership when completions grow.

use crate::types::{Node, NodeId};
use std::collections::BTreeSet;

/// The UnlockComputer derives the set of accessible nodes.
///
/// Input nodes must be sorted by `(level asc, position_index asc, id asc)`;
/// the catalog guarantees this ordering for rules 2 and 7.
pub struct UnlockComputer;

impl UnlockComputer {
    /// Compute the unlocked set for a path.
    ///
    /// Never fails. An empty graph yields an empty set. The result is
    /// always a subset of the ids present in `ordered_nodes`.
    #[must_use]
    pub fn compute(ordered_nodes: &[Node], completed: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
        let mut unlocked = BTreeSet::new();
        let Some(first) = ordered_nodes.first() else {
            return unlocked;
        };

        let known_ids: BTreeSet<NodeId> = ordered_nodes.iter().map(|n| n.id).collect();
        let base_level = ordered_nodes
            .iter()
            .map(|n| n.level)
            .min()
            .unwrap_or(first.level);

        // Levels present in the path, and levels that already hold at least
        // one completed node.
        let mut levels: BTreeSet<u32> = BTreeSet::new();
        let mut completed_levels: BTreeSet<u32> = BTreeSet::new();
        for node in ordered_nodes {
            levels.insert(node.level);
            if completed.contains(&node.id) {
                completed_levels.insert(node.level);
            }
        }

        // Rule 2: the globally-first node is always reachable, even under
        // irregular level numbering.
        unlocked.insert(first.id);

        for node in ordered_nodes {
            // Rules 1, 3 and 5.
            if node.level == base_level || !node.locked_by_default {
                unlocked.insert(node.id);
                continue;
            }

            if !node.required_node_ids.is_empty() {
                // Rule 4: AND over explicit requirements. Dangling ids never
                // appear in `completed`, so they stay permanently unsatisfied.
                if node
                    .required_node_ids
                    .iter()
                    .all(|id| completed.contains(id))
                {
                    unlocked.insert(node.id);
                }
            } else {
                // Rule 6: one completion anywhere on the closest lower
                // populated level opens this node.
                let previous_level = levels.range(..node.level).next_back().copied();
                if previous_level.is_some_and(|lv| completed_levels.contains(&lv)) {
                    unlocked.insert(node.id);
                }
            }
        }

        // Rule 7: sequential fallback across the full ordering, regardless
        // of the successor's own level/requirement rules.
        for pair in ordered_nodes.windows(2) {
            if completed.contains(&pair[0].id) {
                unlocked.insert(pair[1].id);
            }
        }

        // Rule 8: explicit forward edges from completed nodes. Targets that
        // name no node of this path are dropped, keeping the result a
        // subset of the path.
        for node in ordered_nodes {
            if completed.contains(&node.id) {
                for target in &node.unlocks_node_ids {
                    if known_ids.contains(target) {
                        unlocked.insert(*target);
                    }
                }
            }
        }

        unlocked
    }
}

// =============================================================================
// TESTS
// =============================================================================
