//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! This is the calling boundary: the clock is read here (once per command),
//! and the lives gate is checked here before any completion flow starts.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use trellis_core::catalog::NodeGraphSource;
use trellis_core::{
    ExternalContentRef, LivesGate, Node, NodeId, NodeRef, NodeStatus, PathId, ProgressionService,
    RedbStore, Timestamp, TrellisError, UserId, catalog_from_bytes, catalog_to_bytes,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for seed ingestion (16 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_SEED_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Maximum file size for snapshot import (64 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), TrellisError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TrellisError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TrellisError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path to resolve symlinks and "..", ensures it exists
/// and is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, TrellisError> {
    let canonical = path.canonicalize().map_err(|e| {
        TrellisError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(TrellisError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output file path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, TrellisError> {
    let parent = path.parent().unwrap_or(Path::new("."));

    let canonical_parent = parent.canonicalize().map_err(|e| {
        TrellisError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(TrellisError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| TrellisError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// CLOCK BOUNDARY
// =============================================================================

/// Capture `now` once for the whole command invocation.
fn now_timestamp() -> Result<Timestamp, TrellisError> {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| TrellisError::IoError(format!("System clock before epoch: {}", e)))?
        .as_millis();
    i64::try_from(millis)
        .map(Timestamp::from_millis)
        .map_err(|_| TrellisError::IoError("System clock out of range".to_string()))
}

fn open_store(db_path: &Path) -> Result<RedbStore, TrellisError> {
    RedbStore::open(db_path)
}

// =============================================================================
// SEED FILE FORMAT
// =============================================================================

/// One node in a JSON seed file. Ids are explicit so requirement and unlock
/// edges can reference nodes defined in the same file.
#[derive(Debug, Deserialize)]
pub struct SeedNode {
    pub id: u64,
    pub path_id: u64,
    pub level: u32,
    pub position_index: u32,
    #[serde(default)]
    pub required: Vec<u64>,
    #[serde(default)]
    pub unlocks: Vec<u64>,
    #[serde(default = "default_locked")]
    pub locked_by_default: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub link_source: Option<u64>,
    #[serde(default)]
    pub external: Option<ExternalSeed>,
}

/// External content reference in a seed file (virtual pseudo-node).
#[derive(Debug, Deserialize)]
pub struct ExternalSeed {
    pub source: String,
    pub external_id: String,
}

fn default_locked() -> bool {
    true
}

impl SeedNode {
    fn into_entry(self) -> (PathId, NodeId, NodeRef) {
        let path = PathId(self.path_id);
        let id = NodeId(self.id);

        let entry = match self.external {
            Some(external) => NodeRef::Virtual(ExternalContentRef {
                source: external.source,
                external_id: external.external_id,
                level: self.level,
                position_index: self.position_index,
                locked_by_default: self.locked_by_default,
            }),
            None => {
                let mut node = Node::new(id, path, self.level, self.position_index)
                    .with_required(self.required.into_iter().map(NodeId))
                    .with_unlocks(self.unlocks.into_iter().map(NodeId));
                node.locked_by_default = self.locked_by_default;
                node.link_source = self.link_source.map(NodeId);
                if self.draft {
                    node.status = NodeStatus::Draft;
                }
                NodeRef::Concrete(node)
            }
        };

        (path, id, entry)
    }
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show catalog overview.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), TrellisError> {
    let store = open_store(db_path)?;
    let catalog = store.load_catalog()?;

    let paths: Vec<(u64, usize)> = catalog
        .paths()
        .map(|path| {
            let active = catalog
                .list_active_nodes(path)
                .map(|nodes| nodes.len())
                .unwrap_or(0);
            (path.0, active)
        })
        .collect();

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "node_count": catalog.node_count(),
            "paths": paths
                .iter()
                .map(|(id, active)| serde_json::json!({"path_id": id, "active_nodes": active}))
                .collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Trellis Catalog Status");
    println!("======================");
    println!("Database: {:?}", db_path);
    println!();
    println!("Nodes: {}", catalog.node_count());
    for (id, active) in paths {
        println!("  path {:>4}: {} active nodes", id, active);
    }

    Ok(())
}

// =============================================================================
// SEED COMMAND
// =============================================================================

/// Import catalog nodes from a JSON file.
pub fn cmd_seed(db_path: &Path, json_mode: bool, file: &Path) -> Result<(), TrellisError> {
    let file = validate_file_path(file)?;
    validate_file_size(&file, MAX_SEED_FILE_SIZE)?;

    let raw = std::fs::read_to_string(&file)
        .map_err(|e| TrellisError::IoError(format!("Cannot read seed file: {}", e)))?;
    let seeds: Vec<SeedNode> =
        serde_json::from_str(&raw).map_err(|e| TrellisError::SerializationError(e.to_string()))?;

    let mut store = open_store(db_path)?;
    let mut catalog = store.load_catalog()?;

    let mut imported = 0usize;
    for seed in seeds {
        let (path, id, entry) = seed.into_entry();
        catalog.import(path, id, entry)?;
        imported += 1;
    }
    store.save_catalog(&catalog)?;

    tracing::info!(imported, "seed import complete");
    if json_mode {
        let output = serde_json::json!({
            "imported": imported,
            "node_count": catalog.node_count(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
    } else {
        println!(
            "Imported {} nodes ({} total in catalog)",
            imported,
            catalog.node_count()
        );
    }
    Ok(())
}

// =============================================================================
// AUDIT COMMAND
// =============================================================================

/// Scan a path for advisory graph issues.
pub fn cmd_audit(db_path: &Path, json_mode: bool, path: u64) -> Result<(), TrellisError> {
    let store = open_store(db_path)?;
    let catalog = store.load_catalog()?;
    let issues = catalog.audit(PathId(path))?;

    if json_mode {
        let output = serde_json::json!({
            "path_id": path,
            "issues": issues,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    if issues.is_empty() {
        println!("Path {}: no issues found", path);
    } else {
        println!("Path {}: {} issues", path, issues.len());
        for issue in &issues {
            println!("  - {}", issue);
        }
    }
    Ok(())
}

// =============================================================================
// LEARNER COMMANDS
// =============================================================================

/// Show a learner's unlock state on a path.
pub fn cmd_state(db_path: &Path, json_mode: bool, user: u64, path: u64) -> Result<(), TrellisError> {
    let store = open_store(db_path)?;
    let mut svc = ProgressionService::new(store.clone(), store);
    let state = svc.unlock_state(UserId(user), PathId(path))?;

    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&state).unwrap_or_default()
        );
        return Ok(());
    }

    println!("User {} on path {}", user, path);
    println!(
        "  completed: {:?}",
        state
            .completed_node_ids
            .iter()
            .map(|n| n.0)
            .collect::<Vec<_>>()
    );
    println!(
        "  unlocked:  {:?}",
        state
            .unlocked_node_ids
            .iter()
            .map(|n| n.0)
            .collect::<Vec<_>>()
    );
    Ok(())
}

/// Record a node completion.
///
/// The lives gate is consulted first; a locked learner is refused here and
/// the completion flow never starts.
pub fn cmd_complete(
    db_path: &Path,
    json_mode: bool,
    user: u64,
    path: u64,
    node: u64,
) -> Result<(), TrellisError> {
    let now = now_timestamp()?;
    let store = open_store(db_path)?;
    let user_id = UserId(user);

    let mut gate = LivesGate::new(store.clone());
    if !gate.can_attempt(user_id, now)? {
        let status = gate.status(user_id, now)?;
        if json_mode {
            let output = serde_json::json!({
                "refused": "out_of_lives",
                "lives": status.lives,
                "next_refill_at": status.next_refill_at.map(|t| t.millis()),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_default()
            );
        } else {
            println!("Out of lives; attempt refused.");
            if let Some(next) = status.next_refill_at {
                println!("  next life in ~{} min", minutes_until(now, next));
            }
        }
        return Ok(());
    }

    let mut svc = ProgressionService::new(store.clone(), store);
    let record = svc.complete_node(user_id, PathId(path), NodeId(node), now)?;

    if json_mode {
        let output = serde_json::json!({
            "completed": record.completed_node_ids,
            "unlocked": record.unlocked_node_ids,
            "streak": record.streak,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Completed node {} on path {}", node, path);
    println!(
        "  unlocked now: {:?}",
        record
            .unlocked_node_ids
            .iter()
            .map(|n| n.0)
            .collect::<Vec<_>>()
    );
    println!("  streak: {} days", record.streak);
    Ok(())
}

/// Whole minutes from `now` until `later`, rounded up.
fn minutes_until(now: Timestamp, later: Timestamp) -> i64 {
    let millis = later.millis_since(now).max(0);
    millis.div_euclid(60_000).saturating_add(i64::from(millis % 60_000 != 0))
}

/// Show a learner's lives status.
pub fn cmd_lives(db_path: &Path, json_mode: bool, user: u64) -> Result<(), TrellisError> {
    let now = now_timestamp()?;
    let store = open_store(db_path)?;
    let mut gate = LivesGate::new(store);
    let status = gate.status(UserId(user), now)?;
    print_lives(json_mode, now, user, &status);
    Ok(())
}

/// Consume one life (failure event).
pub fn cmd_spend_life(db_path: &Path, json_mode: bool, user: u64) -> Result<(), TrellisError> {
    let now = now_timestamp()?;
    let store = open_store(db_path)?;
    let mut gate = LivesGate::new(store);
    let status = gate.consume(UserId(user), now)?;
    print_lives(json_mode, now, user, &status);
    Ok(())
}

/// Restore a learner's full lives budget.
pub fn cmd_refill(db_path: &Path, json_mode: bool, user: u64) -> Result<(), TrellisError> {
    let now = now_timestamp()?;
    let store = open_store(db_path)?;
    let mut gate = LivesGate::new(store);
    let status = gate.force_refill(UserId(user), now)?;
    print_lives(json_mode, now, user, &status);
    Ok(())
}

fn print_lives(json_mode: bool, now: Timestamp, user: u64, status: &trellis_core::LivesStatus) {
    if json_mode {
        let output = serde_json::json!({
            "user_id": user,
            "lives": status.lives,
            "locked": status.locked,
            "next_refill_at": status.next_refill_at.map(|t| t.millis()),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return;
    }

    println!("User {}: {} lives{}", user, status.lives, if status.locked { " (locked)" } else { "" });
    if let Some(next) = status.next_refill_at {
        println!("  next life in ~{} min", minutes_until(now, next));
    }
}

// =============================================================================
// SNAPSHOT COMMANDS
// =============================================================================

/// Export the catalog snapshot to a file.
pub fn cmd_export(db_path: &Path, output: &Path) -> Result<(), TrellisError> {
    let output = validate_output_path(output)?;
    let store = open_store(db_path)?;
    let catalog = store.load_catalog()?;

    let bytes = catalog_to_bytes(&catalog)?;
    std::fs::write(&output, &bytes)
        .map_err(|e| TrellisError::IoError(format!("Cannot write snapshot: {}", e)))?;

    println!(
        "Exported {} nodes to {:?} ({} bytes)",
        catalog.node_count(),
        output,
        bytes.len()
    );
    Ok(())
}

/// Import a catalog snapshot from a file, replacing the stored catalog.
pub fn cmd_import(db_path: &Path, input: &Path) -> Result<(), TrellisError> {
    let input = validate_file_path(input)?;
    validate_file_size(&input, MAX_IMPORT_FILE_SIZE)?;

    let bytes = std::fs::read(&input)
        .map_err(|e| TrellisError::IoError(format!("Cannot read snapshot: {}", e)))?;
    let catalog = catalog_from_bytes(&bytes)?;

    let mut store = open_store(db_path)?;
    store.save_catalog(&catalog)?;

    println!("Imported {} nodes from {:?}", catalog.node_count(), input);
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), TrellisError> {
    if db_path.exists() {
        if !force {
            return Err(TrellisError::IoError(format!(
                "Database {:?} already exists (use --force to recreate)",
                db_path
            )));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| TrellisError::IoError(format!("Cannot remove database: {}", e)))?;
    }

    let _ = open_store(db_path)?;
    println!("Initialized empty database at {:?}", db_path);
    Ok(())
}
