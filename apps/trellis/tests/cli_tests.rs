//! # CLI Integration Tests
//!
//! Drive the command implementations end-to-end against a temporary
//! database: seed a catalog from JSON, walk the learner flow, exercise the
//! lives commands and the snapshot roundtrip.

use std::path::PathBuf;
use trellis::cli;
use trellis_core::catalog::NodeGraphSource;
use trellis_core::storage::ProgressStore;
use trellis_core::{NodeId, PathId, RedbStore, UserId};

const SEED_JSON: &str = r#"[
  {"id": 1, "path_id": 1, "level": 1, "position_index": 1},
  {"id": 2, "path_id": 1, "level": 1, "position_index": 2},
  {"id": 3, "path_id": 1, "level": 2, "position_index": 1},
  {"id": 4, "path_id": 1, "level": 2, "position_index": 2, "required": [2]},
  {"id": 5, "path_id": 1, "level": 3, "position_index": 1,
   "external": {"source": "library", "external_id": "capstone-video"}}
]"#;

struct Env {
    _dir: tempfile::TempDir,
    db: PathBuf,
}

fn seeded_env() -> Env {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("trellis.db");
    let seed = dir.path().join("nodes.json");
    std::fs::write(&seed, SEED_JSON).expect("write seed");

    cli::cmd_init(&db, false).expect("init");
    cli::cmd_seed(&db, false, &seed).expect("seed");

    Env { _dir: dir, db }
}

#[test]
fn seed_populates_the_catalog() {
    let env = seeded_env();

    let store = RedbStore::open(&env.db).expect("open");
    let nodes = store.list_active_nodes(PathId(1)).expect("list");
    assert_eq!(nodes.len(), 5);

    // The virtual entry resolved to a concrete node at its placement.
    let capstone = nodes.iter().find(|n| n.id == NodeId(5)).expect("resolved");
    assert_eq!(capstone.level, 3);
}

#[test]
fn init_refuses_to_clobber_without_force() {
    let env = seeded_env();
    assert!(cli::cmd_init(&env.db, false).is_err());
    assert!(cli::cmd_init(&env.db, true).is_ok());
}

#[test]
fn complete_records_progress_through_the_cli() {
    let env = seeded_env();

    cli::cmd_complete(&env.db, false, 42, 1, 1).expect("complete node 1");
    cli::cmd_complete(&env.db, false, 42, 1, 2).expect("complete node 2");

    let store = RedbStore::open(&env.db).expect("open");
    let record = store
        .load_progress(UserId(42), PathId(1))
        .expect("load")
        .expect("present");
    assert!(record.completed_node_ids.contains(&NodeId(1)));
    assert!(record.completed_node_ids.contains(&NodeId(2)));
    // B completed => D unlocked via its explicit requirement.
    assert!(record.unlocked_node_ids.contains(&NodeId(4)));
}

#[test]
fn completing_a_locked_node_fails() {
    let env = seeded_env();
    // Node 4 requires node 2, which is not completed yet.
    let result = cli::cmd_complete(&env.db, false, 42, 1, 4);
    assert!(result.is_err());
}

#[test]
fn lives_commands_roundtrip() {
    let env = seeded_env();

    cli::cmd_lives(&env.db, false, 42).expect("status");
    cli::cmd_spend_life(&env.db, false, 42).expect("spend");
    cli::cmd_spend_life(&env.db, false, 42).expect("spend");
    cli::cmd_refill(&env.db, false, 42).expect("refill");

    // After a forced refill, spending once leaves MAX-1.
    cli::cmd_spend_life(&env.db, false, 42).expect("spend");

    let store = RedbStore::open(&env.db).expect("open");
    let state = trellis_core::storage::LivesStore::load_lives(&store, UserId(42))
        .expect("load")
        .expect("present");
    assert_eq!(state.lives, trellis_core::primitives::MAX_LIVES - 1);
}

#[test]
fn snapshot_export_import_roundtrip() {
    let env = seeded_env();
    let snapshot = env.db.with_file_name("catalog.trls");

    cli::cmd_export(&env.db, &snapshot).expect("export");

    // Import into a fresh database.
    let fresh_db = env.db.with_file_name("fresh.db");
    cli::cmd_init(&fresh_db, false).expect("init");
    cli::cmd_import(&fresh_db, &snapshot).expect("import");

    let store = RedbStore::open(&fresh_db).expect("open");
    let nodes = store.list_active_nodes(PathId(1)).expect("list");
    assert_eq!(nodes.len(), 5);
}

#[test]
fn audit_reports_dangling_requirement_from_seed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("trellis.db");
    let seed = dir.path().join("nodes.json");
    std::fs::write(
        &seed,
        r#"[
          {"id": 1, "path_id": 1, "level": 1, "position_index": 1},
          {"id": 2, "path_id": 1, "level": 2, "position_index": 1, "required": [99]}
        ]"#,
    )
    .expect("write seed");

    cli::cmd_seed(&db, false, &seed).expect("seed");
    // The audit command succeeds and reports; learners are never blocked by
    // advisory findings.
    cli::cmd_audit(&db, false, 1).expect("audit");
    cli::cmd_state(&db, false, 7, 1).expect("state");
}
