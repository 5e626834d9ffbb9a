//! # Core Type Definitions
//!
//! This module contains the core types for the memlink associative graph:
//! - Graph identifiers (`NodeId`, `EdgeId`, `EdgeWeight`)
//! - Graph elements (`Entity`, `Node`, `Relationship`)
//! - The name-resolved wire tuple (`RelationshipRecord`)
//! - Error types (`MemlinkError`)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// GRAPH IDENTIFIERS
// =============================================================================

/// Identifier of a node inside a graph.
///
/// Node ids are insertion indices: the first node created is `NodeId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of a relationship inside a graph (insertion index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

/// Weight of a directed relationship.
///
/// Any signed 64-bit value is accepted; no range validation is applied.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EdgeWeight(pub i64);

impl EdgeWeight {
    /// Create a new edge weight with the given value.
    #[must_use]
    pub const fn new(weight: i64) -> Self {
        Self(weight)
    }

    /// Get the raw weight value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

// =============================================================================
// ENTITY & NODE
// =============================================================================

/// A named subject or object in the memory graph.
///
/// Identity is the name. The hash is an advisory fingerprint recorded when
/// the entity is first seen and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique entity name.
    pub name: String,
    /// Advisory fingerprint (0 when unknown).
    pub hash: i64,
}

impl Entity {
    /// Create a new entity.
    #[must_use]
    pub fn new(name: impl Into<String>, hash: i64) -> Self {
        Self {
            name: name.into(),
            hash,
        }
    }
}

/// A Node in the graph, wrapping exactly one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// The internal node identifier.
    pub id: NodeId,
    /// The entity this node represents.
    pub entity: Entity,
}

impl Node {
    /// Create a new node.
    #[must_use]
    pub const fn new(id: NodeId, entity: Entity) -> Self {
        Self { id, entity }
    }

    /// The entity name of this node.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.entity.name
    }
}

// =============================================================================
// RELATIONSHIP
// =============================================================================

/// A directed, labeled, weighted edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The internal edge identifier.
    pub id: EdgeId,
    /// Source node.
    pub source: NodeId,
    /// Target node.
    pub target: NodeId,
    /// Relationship label, e.g. `knows`.
    pub label: String,
    /// Relationship weight.
    pub weight: EdgeWeight,
}

/// A relationship expressed by entity names instead of node ids.
///
/// This is the shape exchanged on the sync wire and handed to callers that
/// read relationships out of a locked store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub source: String,
    pub target: String,
    pub label: String,
    pub weight: i64,
}

impl RelationshipRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
        weight: i64,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
            weight,
        }
    }
}

impl fmt::Display for RelationshipRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}, {})",
            self.source, self.target, self.label, self.weight
        )
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in memlink.
///
/// Line-level protocol problems are not errors of this type: they are
/// reported as [`crate::protocol::LineError`] values and skipped.
#[derive(Debug, Error)]
pub enum MemlinkError {
    /// Connecting, sending to or receiving from a peer failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The peer response as a whole could not be accepted.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A file backing durable state could not be read or written.
    #[error("Storage I/O error on {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The encryption capability rejected the payload or key.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An entity name cannot be put on the wire.
    #[error("Invalid entity name: {0:?}")]
    InvalidEntity(String),

    /// A key or value cannot be represented in the flat-file store.
    #[error("Invalid store entry: {0}")]
    InvalidKvEntry(String),

    /// The session has already been closed.
    #[error("Session is closed")]
    SessionClosed,

    /// Configuration could not be loaded or is incomplete.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MemlinkError {
    /// Build a `StorageIo` error for the given path.
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the error is recovered locally (logged, session continues).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Protocol(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
