//! # Snapshot Format
//!
//! Binary serialization of a full graph, used both for encrypted export to a
//! peer and for persisting the graph between runs.
//!
//! Format: Header (5 bytes) + postcard-serialized body.
//! - 4 bytes: Magic ("MLNK")
//! - 1 byte: Version
//!
//! Nodes are stored in insertion order and edges refer to nodes by position,
//! so decoding reproduces the same node ids and iteration order.
//!
//! ## Validation
//!
//! Before the payload is parsed the decoder checks the minimum and maximum
//! size and the header. After parsing it rejects duplicate entity names and
//! edges that point past the node list.

use crate::formats::write_atomically;
use crate::graph::Graph;
use crate::primitives::{self, HEADER_SIZE, MAX_SNAPSHOT_SIZE};
use crate::MemlinkError;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::Path;

// =============================================================================
// HEADER
// =============================================================================

/// The snapshot header precedes the serialized body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), MemlinkError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(MemlinkError::Deserialization(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(MemlinkError::Deserialization(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MemlinkError> {
        let Some(header) = bytes.first_chunk::<HEADER_SIZE>() else {
            return Err(MemlinkError::Deserialization(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// BODY
// =============================================================================

/// A node as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub name: String,
    pub hash: i64,
}

/// An edge as stored in a snapshot; endpoints are node positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub source: u64,
    pub target: u64,
    pub label: String,
    pub weight: i64,
}

/// Serializable representation of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBody {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

impl From<&Graph> for SnapshotBody {
    fn from(graph: &Graph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|node| SnapshotNode {
                    name: node.entity.name.clone(),
                    hash: node.entity.hash,
                })
                .collect(),
            edges: graph
                .edges()
                .map(|edge| SnapshotEdge {
                    source: edge.source.0,
                    target: edge.target.0,
                    label: edge.label.clone(),
                    weight: edge.weight.value(),
                })
                .collect(),
        }
    }
}

impl TryFrom<SnapshotBody> for Graph {
    type Error = MemlinkError;

    fn try_from(body: SnapshotBody) -> Result<Self, Self::Error> {
        let mut graph = Graph::with_capacity(body.nodes.len().max(body.edges.len()));

        for node in &body.nodes {
            graph.upsert_entity(&node.name, node.hash);
        }
        if graph.node_count() != body.nodes.len() {
            return Err(MemlinkError::Deserialization(
                "Snapshot contains duplicate entity names".to_string(),
            ));
        }

        let name_at = |index: u64| {
            usize::try_from(index)
                .ok()
                .and_then(|i| body.nodes.get(i))
                .map(|node| node.name.as_str())
                .ok_or_else(|| {
                    MemlinkError::Deserialization(format!(
                        "Edge refers to missing node {}",
                        index
                    ))
                })
        };

        for edge in &body.edges {
            let source = name_at(edge.source)?;
            let target = name_at(edge.target)?;
            graph.add_relationship(source, target, &edge.label, edge.weight);
        }

        Ok(graph)
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn encode(graph: &Graph) -> Result<Vec<u8>, MemlinkError> {
    let body = SnapshotBody::from(graph);
    let payload =
        postcard::to_stdvec(&body).map_err(|e| MemlinkError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&SnapshotHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a graph from bytes.
///
/// This is a pure transformation - no file I/O.
pub fn decode(bytes: &[u8]) -> Result<Graph, MemlinkError> {
    if bytes.len() < HEADER_SIZE {
        return Err(MemlinkError::Deserialization(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }

    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(MemlinkError::Deserialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    SnapshotHeader::from_bytes(bytes)?.validate()?;

    let body: SnapshotBody = postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        MemlinkError::Deserialization(format!("Failed to deserialize snapshot: {}", e))
    })?;

    Graph::try_from(body)
}

/// Write the encoded graph to `path`, replacing any previous file atomically.
pub fn save_graph(graph: &Graph, path: &Path) -> Result<(), MemlinkError> {
    let bytes = encode(graph)?;
    write_atomically(path, &bytes)?;
    tracing::info!(
        "Saved graph snapshot ({} nodes, {} edges) to {}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(())
}

/// Read a graph saved by [`save_graph`].
///
/// Returns `Ok(None)` when no file exists at `path`.
pub fn load_graph(path: &Path) -> Result<Option<Graph>, MemlinkError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!("No graph snapshot at {}; starting empty", path.display());
            return Ok(None);
        }
        Err(e) => return Err(MemlinkError::storage(path, e)),
    };
    decode(&bytes).map(Some)
}

/// BLAKE3 digest of the encoded graph, as lowercase hex.
#[cfg(feature = "crypto-hash")]
pub fn digest(graph: &Graph) -> Result<String, MemlinkError> {
    let bytes = encode(graph)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
