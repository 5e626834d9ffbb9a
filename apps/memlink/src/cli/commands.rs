//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Graph commands load the snapshot from `storage.graph_path`, apply their
//! change and save it back atomically. Fact commands do the same with the
//! key/value store at `storage.store_path`.

use super::KvAction;
use crate::config::Config;
use crate::crypto::PemKeyLoader;
use crate::net::{TcpOptions, TcpTransport};
use crate::peer;
use memlink_core::{
    GraphStore, KvStore, MemlinkError, SessionContext, SyncClient, Transport, formats,
};
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

/// Load the graph snapshot, or start empty if there is none.
pub fn load_graph(config: &Config) -> Result<GraphStore, MemlinkError> {
    let graph = formats::load_graph(&config.storage.graph_path)?.unwrap_or_default();
    Ok(GraphStore::with_graph(graph))
}

/// Save the graph snapshot.
pub fn save_graph(config: &Config, graph: &GraphStore) -> Result<(), MemlinkError> {
    formats::save_graph(&graph.read(), &config.storage.graph_path)
}

fn transport(config: &Config) -> TcpTransport {
    TcpTransport::new(TcpOptions::from(&config.peer))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// PEER COMMANDS
// =============================================================================

/// Fetch relationships of `entity` from the peer and merge them.
pub fn cmd_sync(config: &Config, json_mode: bool, entity: &str) -> Result<(), MemlinkError> {
    let graph = load_graph(config)?;
    let channel = transport(config).channel(&config.peer.endpoint)?;
    let mut client = SyncClient::new(channel);

    let report = client.fetch_relationships(entity, &graph)?;
    if report.merged > 0 {
        save_graph(config, &graph)?;
    }

    if json_mode {
        let rejected: Vec<String> = report.rejected.iter().map(ToString::to_string).collect();
        print_json(&serde_json::json!({
            "entity": report.entity,
            "endpoint": config.peer.endpoint,
            "merged": report.merged,
            "rejected": rejected,
            "bytes_received": report.bytes_received,
            "complete": report.end == memlink_core::ResponseEnd::Eof,
        }));
        return Ok(());
    }

    println!(
        "Merged {} relationships for {} from {}",
        report.merged, report.entity, config.peer.endpoint
    );
    for rejected in &report.rejected {
        println!("  skipped {}", rejected);
    }
    Ok(())
}

/// Send an encrypted graph snapshot to the peer.
pub fn cmd_export(config: &Config, json_mode: bool) -> Result<(), MemlinkError> {
    let params = config.session_params()?;
    let mut session = SessionContext::open(params, &transport(config), &PemKeyLoader)?;

    let report = session.export()?;
    session.close()?;

    if json_mode {
        print_json(&serde_json::json!({
            "endpoint": config.peer.endpoint,
            "nodes": report.nodes,
            "edges": report.edges,
            "plaintext_bytes": report.plaintext_bytes,
            "ciphertext_bytes": report.ciphertext_bytes,
        }));
        return Ok(());
    }

    println!(
        "Exported {} nodes and {} edges to {} ({} bytes encrypted)",
        report.nodes, report.edges, config.peer.endpoint, report.ciphertext_bytes
    );
    Ok(())
}

/// Answer relationship requests from the local graph.
pub async fn cmd_serve(config: &Config, host: &str, port: u16) -> Result<(), MemlinkError> {
    let graph = Arc::new(load_graph(config)?);

    println!("memlink peer starting...");
    println!();
    println!("Configuration:");
    println!("  Host:  {}", host);
    println!("  Port:  {}", port);
    println!("  Graph: {:?}", config.storage.graph_path);
    println!("  Nodes: {}", graph.node_count());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    peer::serve(&addr, graph).await
}

// =============================================================================
// GRAPH COMMANDS
// =============================================================================

/// Add one relationship.
pub fn cmd_relate(
    config: &Config,
    json_mode: bool,
    source: &str,
    target: &str,
    label: &str,
    weight: i64,
) -> Result<(), MemlinkError> {
    let graph = load_graph(config)?;
    let edge = graph.add_relationship(source, target, label, weight);
    save_graph(config, &graph)?;

    if json_mode {
        print_json(&serde_json::json!({
            "edge_id": edge.0,
            "source": source,
            "target": target,
            "label": label,
            "weight": weight,
        }));
    } else {
        println!("Added {} -> {} ({}, {})", source, target, label, weight);
    }
    Ok(())
}

/// Add one entity.
pub fn cmd_entity(
    config: &Config,
    json_mode: bool,
    name: &str,
    hash: i64,
) -> Result<(), MemlinkError> {
    let graph = load_graph(config)?;
    let existed = graph.find(name).is_some();
    let node = graph.upsert_entity(name, hash);
    if !existed {
        save_graph(config, &graph)?;
    }
    let recorded = graph.find(name).map(|n| n.entity.hash).unwrap_or(hash);

    if json_mode {
        print_json(&serde_json::json!({
            "node_id": node.0,
            "name": name,
            "hash": recorded,
            "created": !existed,
        }));
    } else if existed {
        println!("Entity {} already exists (node {}, hash {})", name, node.0, recorded);
    } else {
        println!("Added entity {} (node {})", name, node.0);
    }
    Ok(())
}

/// List outgoing relationships.
pub fn cmd_relationships(
    config: &Config,
    json_mode: bool,
    entity: &str,
) -> Result<(), MemlinkError> {
    let graph = load_graph(config)?;
    let records = graph.relationships_from(entity);

    if json_mode {
        let items: Vec<serde_json::Value> = records
            .iter()
            .map(|r| {
                serde_json::json!({
                    "source": r.source,
                    "target": r.target,
                    "label": r.label,
                    "weight": r.weight,
                })
            })
            .collect();
        print_json(&serde_json::json!({ "entity": entity, "relationships": items }));
        return Ok(());
    }

    if records.is_empty() {
        println!("No relationships from {}", entity);
    }
    for record in &records {
        println!("{}", record);
    }
    Ok(())
}

/// Add every word of `text` as an entity.
pub fn cmd_ingest_text(config: &Config, json_mode: bool, text: &str) -> Result<(), MemlinkError> {
    let graph = load_graph(config)?;
    let before = graph.node_count();
    let nodes = graph.ingest_tokens(text);
    let created = graph.node_count().saturating_sub(before);
    save_graph(config, &graph)?;

    if json_mode {
        print_json(&serde_json::json!({
            "tokens": nodes.len(),
            "created": created,
            "node_ids": nodes.iter().map(|n| n.0).collect::<Vec<_>>(),
        }));
    } else {
        println!("Ingested {} tokens ({} new entities)", nodes.len(), created);
    }
    Ok(())
}

// =============================================================================
// STORE COMMANDS
// =============================================================================

/// Run a key/value store action.
pub fn cmd_kv(config: &Config, json_mode: bool, action: KvAction) -> Result<(), MemlinkError> {
    let path = &config.storage.store_path;
    let store = KvStore::open(path)?;

    match action {
        KvAction::Set { key, value } => {
            // Rejected entries must not rewrite the file.
            let previous = store.set(key.as_str(), value.as_str())?;
            store.save(path)?;
            if json_mode {
                print_json(&serde_json::json!({
                    "key": key,
                    "value": value,
                    "previous": previous,
                }));
            } else {
                println!("{} = {}", key, value);
            }
        }
        KvAction::Get { key } => {
            let value = store.get(&key);
            if json_mode {
                print_json(&serde_json::json!({ "key": key, "value": value }));
            } else {
                println!("{}", value);
            }
        }
        KvAction::List => {
            let entries = store.entries();
            if json_mode {
                let map: serde_json::Map<String, serde_json::Value> = entries
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                print_json(&serde_json::Value::Object(map));
            } else {
                for (key, value) in entries {
                    println!("{} = {}", key, value);
                }
            }
        }
        KvAction::Clear => {
            let scope = store.checkpoint_on_drop(path);
            let removed = scope.len();
            scope.clear();
            scope.finish()?;
            if json_mode {
                print_json(&serde_json::json!({ "removed": removed }));
            } else {
                println!("Removed {} entries", removed);
            }
        }
    }
    Ok(())
}

// =============================================================================
// STATUS COMMANDS
// =============================================================================

/// Show graph and store status.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), MemlinkError> {
    let graph = load_graph(config)?;
    let store = KvStore::open(&config.storage.store_path)?;

    if json_mode {
        print_json(&serde_json::json!({
            "endpoint": config.peer.endpoint,
            "graph": config.storage.graph_path.to_string_lossy(),
            "store": config.storage.store_path.to_string_lossy(),
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "store_entries": store.len(),
            "key_file": config.crypto.key_file.as_ref().map(|p| p.to_string_lossy()),
        }));
        return Ok(());
    }

    println!("memlink Status");
    println!("==============");
    println!("Peer:   {}", config.peer.endpoint);
    println!("Graph:  {:?}", config.storage.graph_path);
    println!("Store:  {:?}", config.storage.store_path);
    println!();
    println!("Nodes:         {}", graph.node_count());
    println!("Edges:         {}", graph.edge_count());
    println!("Stored facts:  {}", store.len());
    Ok(())
}

/// Compute BLAKE3 hash of the graph snapshot.
#[cfg(feature = "crypto-hash")]
pub fn cmd_hash(config: &Config, json_mode: bool) -> Result<(), MemlinkError> {
    let graph = load_graph(config)?;
    let hash = formats::digest(&graph.read())?;

    if json_mode {
        print_json(&serde_json::json!({
            "algorithm": "BLAKE3",
            "hash": hash,
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
        }));
    } else {
        println!("BLAKE3: {}", hash);
    }
    Ok(())
}
