//! Tests for the file-backed CLI commands.

use memlink::Config;
use memlink::cli::{self, KvAction};
use memlink_core::{KvStore, MemlinkError, RelationshipRecord};
use std::path::Path;

fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.store_path = dir.join("facts.kv");
    config.storage.graph_path = dir.join("graph.mlnk");
    config
}

#[test]
fn relate_persists_between_commands() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = config_in(dir.path());

    cli::cmd_relate(&config, true, "A", "B", "knows", 5).expect("relate");
    cli::cmd_relate(&config, true, "A", "C", "likes", -2).expect("relate");
    cli::cmd_entity(&config, true, "A", 99).expect("entity");

    let graph = cli::load_graph(&config).expect("load");
    assert_eq!(
        graph.relationships_from("A"),
        vec![
            RelationshipRecord::new("A", "B", "knows", 5),
            RelationshipRecord::new("A", "C", "likes", -2),
        ]
    );
    assert_eq!(graph.find("A").map(|n| n.entity.hash), Some(0));
}

#[test]
fn ingest_text_creates_one_entity_per_word() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = config_in(dir.path());

    cli::cmd_ingest_text(&config, true, "the cat saw the dog").expect("ingest");

    assert_eq!(cli::load_graph(&config).expect("load").node_count(), 4);
}

#[test]
fn kv_commands_write_store_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = config_in(dir.path());

    cli::cmd_kv(
        &config,
        true,
        KvAction::Set {
            key: "city".to_string(),
            value: "Paris".to_string(),
        },
    )
    .expect("set");
    assert_eq!(
        KvStore::open(&config.storage.store_path)
            .expect("open")
            .get("city"),
        "Paris"
    );

    cli::cmd_kv(&config, true, KvAction::Clear).expect("clear");
    assert!(
        KvStore::open(&config.storage.store_path)
            .expect("open")
            .is_empty()
    );
}

#[test]
fn kv_set_rejects_multiline_values() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = config_in(dir.path());

    let result = cli::cmd_kv(
        &config,
        true,
        KvAction::Set {
            key: "note".to_string(),
            value: "two\nlines".to_string(),
        },
    );
    assert!(matches!(result, Err(MemlinkError::InvalidKvEntry(_))));
    assert!(!config.storage.store_path.exists());
}

#[test]
fn rejected_kv_set_leaves_store_file_untouched() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = config_in(dir.path());
    // Not in save order, so any rewrite would change the bytes.
    std::fs::write(&config.storage.store_path, "zeta
1
alpha
2
").expect("write");

    let result = cli::cmd_kv(
        &config,
        true,
        KvAction::Set {
            key: String::new(),
            value: "v".to_string(),
        },
    );

    assert!(matches!(result, Err(MemlinkError::InvalidKvEntry(_))));
    assert_eq!(
        std::fs::read_to_string(&config.storage.store_path).expect("read"),
        "zeta\n1\nalpha\n2\n"
    );
}

#[test]
fn status_on_empty_directory_succeeds() {
    let dir = tempfile::tempdir().expect("temp dir");
    cli::cmd_status(&config_in(dir.path()), true).expect("status");
}

#[test]
fn export_without_key_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = cli::cmd_export(&config_in(dir.path()), true);
    assert!(matches!(result, Err(memlink_core::MemlinkError::Config(_))));
}
