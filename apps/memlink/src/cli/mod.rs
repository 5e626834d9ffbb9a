//! # memlink CLI Module
//!
//! This module implements the CLI interface for memlink.
//!
//! ## Available Commands
//!
//! - `sync` - Fetch an entity's relationships from the peer
//! - `export` - Send an encrypted graph snapshot to the peer
//! - `serve` - Answer relationship requests from the local graph
//! - `relate` - Add a relationship
//! - `entity` - Add an entity
//! - `relationships` - List an entity's outgoing relationships
//! - `ingest-text` - Add every word of a text as an entity
//! - `kv` - Read and write session facts
//! - `status` - Show graph and store status
//! - `hash` - Compute BLAKE3 hash of the graph snapshot

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use memlink_core::MemlinkError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// memlink - associative memory with peer sync
///
/// Keeps a graph of entities and weighted relationships, fetches
/// relationships from a peer and exports encrypted snapshots to it.
#[derive(Parser, Debug)]
#[command(name = "memlink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: memlink.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Key/value store file
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Graph snapshot file
    #[arg(long, global = true)]
    pub graph: Option<PathBuf>,

    /// Peer address (host:port)
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// PEM key used for exports
    #[arg(short, long, global = true)]
    pub key_file: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch relationships of an entity from the peer and merge them
    Sync {
        /// Entity to fetch
        entity: String,
    },

    /// Send an encrypted snapshot of the graph to the peer
    Export,

    /// Answer GET_RELATIONSHIPS requests from the local graph
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Add a relationship (creates missing entities)
    Relate {
        source: String,
        target: String,
        label: String,
        #[arg(allow_negative_numbers = true)]
        weight: i64,
    },

    /// Add an entity (an existing entity keeps its hash)
    Entity {
        name: String,

        /// Advisory fingerprint
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        hash: i64,
    },

    /// List outgoing relationships of an entity
    Relationships {
        entity: String,
    },

    /// Add every whitespace-separated word as an entity
    IngestText {
        text: String,
    },

    /// Read and write session facts
    Kv {
        #[command(subcommand)]
        action: KvAction,
    },

    /// Show graph and store status
    Status,

    /// Compute BLAKE3 hash of the graph snapshot
    #[cfg(feature = "crypto-hash")]
    Hash,
}

/// Key/value store actions.
#[derive(Subcommand, Debug)]
pub enum KvAction {
    /// Set a value
    Set { key: String, value: String },
    /// Print a value (empty if absent)
    Get { key: String },
    /// Print every pair
    List,
    /// Remove every pair
    Clear,
}

impl Cli {
    /// Resolve configuration: file, then environment, then flags.
    pub fn resolve_config(&self) -> Result<Config, MemlinkError> {
        let mut config = Config::load(self.config.as_deref())?;
        config.apply_process_env();

        if let Some(endpoint) = &self.endpoint {
            config.peer.endpoint.clone_from(endpoint);
        }
        if let Some(key_file) = &self.key_file {
            config.crypto.key_file = Some(key_file.clone());
        }
        if let Some(store) = &self.store {
            config.storage.store_path.clone_from(store);
        }
        if let Some(graph) = &self.graph {
            config.storage.graph_path.clone_from(graph);
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), MemlinkError> {
    let config = cli.resolve_config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Sync { entity }) => cmd_sync(&config, json_mode, &entity),
        Some(Commands::Export) => cmd_export(&config, json_mode),
        Some(Commands::Serve { host, port }) => cmd_serve(&config, &host, port).await,
        Some(Commands::Relate {
            source,
            target,
            label,
            weight,
        }) => cmd_relate(&config, json_mode, &source, &target, &label, weight),
        Some(Commands::Entity { name, hash }) => cmd_entity(&config, json_mode, &name, hash),
        Some(Commands::Relationships { entity }) => {
            cmd_relationships(&config, json_mode, &entity)
        }
        Some(Commands::IngestText { text }) => cmd_ingest_text(&config, json_mode, &text),
        Some(Commands::Kv { action }) => cmd_kv(&config, json_mode, action),
        Some(Commands::Status) => cmd_status(&config, json_mode),
        #[cfg(feature = "crypto-hash")]
        Some(Commands::Hash) => cmd_hash(&config, json_mode),
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}
