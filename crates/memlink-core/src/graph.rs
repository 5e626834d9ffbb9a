//! # Graph Engine
//!
//! The associative-memory graph for memlink.
//!
//! Two layers:
//! - [`Graph`]: the plain data structure. Nodes and relationships are kept in
//!   insertion order; a `BTreeMap` side index gives name lookups without
//!   changing iteration order.
//! - [`GraphStore`]: a `Graph` behind a single `RwLock`, shared between
//!   threads. Every lookup-then-insert sequence runs under the write lock, so
//!   concurrent writers can never create two nodes for one entity name.

use crate::primitives::DEFAULT_ENTITY_HASH;
use crate::{EdgeId, EdgeWeight, Entity, Node, NodeId, Relationship, RelationshipRecord};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// =============================================================================
// GRAPH
// =============================================================================

/// Directed multigraph of named entities and weighted, labeled relationships.
///
/// Duplicate `(source, target, label)` relationships are appended, never
/// merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// Nodes in insertion order. `nodes[i].id == NodeId(i)`.
    nodes: Vec<Node>,

    /// Relationships in insertion order. `edges[i].id == EdgeId(i)`.
    edges: Vec<Relationship>,

    /// Reverse lookup: entity name -> NodeId
    name_index: BTreeMap<String, NodeId>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with room for `capacity` nodes and edges.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            edges: Vec::with_capacity(capacity),
            name_index: BTreeMap::new(),
        }
    }

    /// Return the node for `name`, creating it with `hash` if absent.
    ///
    /// The hash of an existing node is never updated: the value recorded at
    /// first insertion wins.
    pub fn upsert_entity(&mut self, name: &str, hash: i64) -> NodeId {
        if let Some(&node_id) = self.name_index.get(name) {
            return node_id;
        }

        let node_id = NodeId(self.nodes.len() as u64);
        self.nodes.push(Node::new(node_id, Entity::new(name, hash)));
        self.name_index.insert(name.to_string(), node_id);
        node_id
    }

    /// Append a relationship, creating missing endpoints with the default hash.
    pub fn add_relationship(
        &mut self,
        source: &str,
        target: &str,
        label: &str,
        weight: i64,
    ) -> EdgeId {
        let from = self.upsert_entity(source, DEFAULT_ENTITY_HASH);
        let to = self.upsert_entity(target, DEFAULT_ENTITY_HASH);

        let edge_id = EdgeId(self.edges.len() as u64);
        self.edges.push(Relationship {
            id: edge_id,
            source: from,
            target: to,
            label: label.to_string(),
            weight: EdgeWeight::new(weight),
        });

        tracing::debug!(
            "Added relationship: {} -> {} ({}, {})",
            source,
            target,
            label,
            weight
        );
        edge_id
    }

    /// Find the node for an entity name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Node> {
        let id = self.name_index.get(name)?;
        self.node(*id)
    }

    /// Lookup a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(usize::try_from(id.0).ok()?)
    }

    /// Relationships whose source entity is `name`, in insertion order.
    ///
    /// The iterator is lazy and cheap to clone; calling this again rescans
    /// the current edge list.
    pub fn relationships_from<'a>(
        &'a self,
        name: &str,
    ) -> impl Iterator<Item = &'a Relationship> + Clone + use<'a> {
        let source = self.name_index.get(name).copied();
        self.edges
            .iter()
            .filter(move |edge| Some(edge.source) == source)
    }

    /// Resolve a relationship into entity names.
    #[must_use]
    pub fn record(&self, edge: &Relationship) -> Option<RelationshipRecord> {
        Some(RelationshipRecord::new(
            self.node(edge.source)?.name(),
            self.node(edge.target)?.name(),
            edge.label.as_str(),
            edge.weight.value(),
        ))
    }

    /// All relationships as name-resolved records, in insertion order.
    pub fn records(&self) -> impl Iterator<Item = RelationshipRecord> + '_ {
        self.edges.iter().filter_map(|edge| self.record(edge))
    }

    /// Get all nodes in insertion order.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Get all relationships in insertion order.
    pub fn edges(&self) -> impl ExactSizeIterator<Item = &Relationship> {
        self.edges.iter()
    }

    /// Get the total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the total number of relationships.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Append every record as a relationship. Returns the number appended.
    pub fn merge_records(&mut self, records: &[RelationshipRecord]) -> usize {
        for record in records {
            self.add_relationship(&record.source, &record.target, &record.label, record.weight);
        }
        records.len()
    }

    /// Split `text` on whitespace and upsert one entity per token.
    ///
    /// Returns the node of every token, in order (repeated tokens map to
    /// the same node).
    pub fn ingest_tokens(&mut self, text: &str) -> Vec<NodeId> {
        text.split_whitespace()
            .map(|token| self.upsert_entity(token, DEFAULT_ENTITY_HASH))
            .collect()
    }
}

// =============================================================================
// GRAPH STORE (thread-safe)
// =============================================================================

/// A [`Graph`] shared between threads.
///
/// All methods take `&self`; wrap the store in an `Arc` to share it.
/// A poisoned lock is recovered: every mutation leaves the graph consistent
/// before it can panic, so the data behind the lock is still valid.
#[derive(Debug, Default)]
pub struct GraphStore {
    inner: RwLock<Graph>,
}

impl GraphStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store around an existing graph.
    #[must_use]
    pub fn with_graph(graph: Graph) -> Self {
        Self {
            inner: RwLock::new(graph),
        }
    }

    /// Acquire a read guard over the graph.
    ///
    /// Hold it only for as long as the read takes; writers block meanwhile.
    pub fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Graph> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`Graph::upsert_entity`].
    pub fn upsert_entity(&self, name: &str, hash: i64) -> NodeId {
        self.write().upsert_entity(name, hash)
    }

    /// See [`Graph::add_relationship`].
    pub fn add_relationship(&self, source: &str, target: &str, label: &str, weight: i64) -> EdgeId {
        self.write().add_relationship(source, target, label, weight)
    }

    /// Snapshot of the relationships originating at `name`, in insertion order.
    #[must_use]
    pub fn relationships_from(&self, name: &str) -> Vec<RelationshipRecord> {
        let graph = self.read();
        graph
            .relationships_from(name)
            .filter_map(|edge| graph.record(edge))
            .collect()
    }

    /// Find the node for an entity name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Node> {
        self.read().find(name).cloned()
    }

    /// Merge a batch of records under a single write lock.
    pub fn merge_records(&self, records: &[RelationshipRecord]) -> usize {
        if records.is_empty() {
            return 0;
        }
        self.write().merge_records(records)
    }

    /// See [`Graph::ingest_tokens`].
    pub fn ingest_tokens(&self, text: &str) -> Vec<NodeId> {
        self.write().ingest_tokens(text)
    }

    /// Get the total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.read().node_count()
    }

    /// Get the total number of relationships.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.read().edge_count()
    }

    /// Clone the current graph.
    #[must_use]
    pub fn snapshot(&self) -> Graph {
        self.read().clone()
    }

    /// Replace the whole graph, returning the previous one.
    pub fn replace(&self, graph: Graph) -> Graph {
        std::mem::replace(&mut *self.write(), graph)
    }
}

impl From<Graph> for GraphStore {
    fn from(graph: Graph) -> Self {
        Self::with_graph(graph)
    }
}

// =============================================================================
// TESTS
// =============================================================================
