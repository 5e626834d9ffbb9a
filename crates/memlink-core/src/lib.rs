//! # memlink-core
//!
//! The associative-memory engine for memlink - THE LOGIC.
//!
//! This crate holds a directed, labeled, weighted multigraph of entities, a
//! flat-file key/value store for session facts, and the two protocol engines
//! that move graph data between peers:
//!
//! - `sync` fetches `GET_RELATIONSHIPS` responses and merges them
//! - `export` sends an encrypted, length-prefixed graph snapshot
//!
//! `session` composes all of them behind one open/close lifecycle.
//!
//! ## Architectural Constraints
//!
//! - No async, no sockets, no cipher implementations. Transport, encryption
//!   and key loading are the `Channel`, `Transport`, `Encryptor` and
//!   `KeyLoader` traits, implemented by the application.
//! - At most one node per entity name, also under concurrent writers.
//! - Deterministic iteration: insertion order for nodes and edges, key order
//!   for the store.
//! - Saves are atomic; a failed save never truncates the previous file.

// =============================================================================
// MODULES
// =============================================================================

pub mod channel;
pub mod export;
pub mod formats;
pub mod graph;
pub mod kv;
pub mod primitives;
pub mod protocol;
pub mod session;
pub mod sync;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    EdgeId, EdgeWeight, Entity, MemlinkError, Node, NodeId, Relationship, RelationshipRecord,
};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use channel::{Channel, Encryptor, KeyLoader, Received, Transport};
pub use export::{ExportReport, SecureExporter};
pub use graph::{Graph, GraphStore};
pub use kv::{KvCheckpoint, KvStore, LoadOutcome};
pub use protocol::{LineError, LineErrorKind, ParsedResponse};
pub use session::{SessionContext, SessionParams, SessionState};
pub use sync::{ResponseEnd, SyncClient, SyncReport, SyncState};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, load_graph, save_graph};
