//! # Session
//!
//! [`SessionContext`] ties one graph, one key/value store, one peer channel
//! and one encryptor into a session with an explicit lifecycle:
//!
//! ```text
//! open -> (sync | export | remember | checkpoint)* -> close
//! ```
//!
//! `open` builds the channel, loads the key and the persisted store (and the
//! graph snapshot when a graph path is configured). `close` checkpoints the
//! store, saves the graph and releases the channel. A session dropped while
//! still open does the same on a best-effort basis.
//!
//! The graph and store are shared (`Arc`) so other threads can read them
//! while the session syncs.

use crate::MemlinkError;
use crate::channel::{Channel, Encryptor, KeyLoader, Transport};
use crate::export::{ExportReport, SecureExporter};
use crate::formats;
use crate::graph::GraphStore;
use crate::kv::{KvStore, LoadOutcome};
use crate::sync::{SyncClient, SyncReport};
use crate::types::NodeId;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where a session connects to and persists its state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Peer address, e.g. `127.0.0.1:8080`.
    pub endpoint: String,
    /// Public key used for exports.
    pub key_file: PathBuf,
    /// Key/value store file.
    pub store_path: PathBuf,
    /// Optional graph snapshot file.
    pub graph_path: Option<PathBuf>,
}

impl SessionParams {
    pub fn new(
        endpoint: impl Into<String>,
        key_file: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            key_file: key_file.into(),
            store_path: store_path.into(),
            graph_path: None,
        }
    }

    /// Also persist the graph at `path`.
    #[must_use]
    pub fn with_graph_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.graph_path = Some(path.into());
        self
    }
}

/// Lifecycle tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// One addressable session over a peer.
pub struct SessionContext<C: Channel, E: Encryptor> {
    params: SessionParams,
    graph: Arc<GraphStore>,
    store: Arc<KvStore>,
    client: SyncClient<C>,
    encryptor: E,
    exporter: SecureExporter,
    state: SessionState,
}

impl<C: Channel, E: Encryptor> std::fmt::Debug for SessionContext<C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("params", &self.params)
            .field("state", &self.state)
            .field("nodes", &self.graph.node_count())
            .field("entries", &self.store.len())
            .finish()
    }
}

impl<C: Channel, E: Encryptor> SessionContext<C, E> {
    /// Open a session.
    ///
    /// Fails if the channel cannot be built, the key cannot be loaded, or a
    /// persisted store or graph exists but cannot be read. A missing store or
    /// graph file starts empty.
    pub fn open<T, K>(params: SessionParams, transport: &T, key_loader: &K) -> Result<Self, MemlinkError>
    where
        T: Transport<Channel = C>,
        K: KeyLoader<Encryptor = E>,
    {
        let channel = transport.channel(&params.endpoint)?;
        let encryptor = key_loader.load(&params.key_file)?;

        let store = KvStore::new();
        if let LoadOutcome::Loaded(count) = store.load(&params.store_path)? {
            tracing::debug!("Session store has {} entries", count);
        }

        let graph = match &params.graph_path {
            Some(path) => formats::load_graph(path)?.unwrap_or_default(),
            None => Default::default(),
        };

        tracing::info!(
            "Session opened for {} ({} nodes, {} stored facts)",
            params.endpoint,
            graph.node_count(),
            store.len()
        );

        Ok(Self {
            params,
            graph: Arc::new(GraphStore::with_graph(graph)),
            store: Arc::new(store),
            client: SyncClient::new(channel),
            encryptor,
            exporter: SecureExporter::new(),
            state: SessionState::Open,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// The session's graph, shareable with other threads.
    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    /// The session's key/value store, shareable with other threads.
    pub fn store(&self) -> &Arc<KvStore> {
        &self.store
    }

    /// The sync engine, mainly for inspecting its channel.
    pub fn client(&self) -> &SyncClient<C> {
        &self.client
    }

    fn ensure_open(&self) -> Result<(), MemlinkError> {
        match self.state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(MemlinkError::SessionClosed),
        }
    }

    /// Fetch and merge the peer's relationships for `entity`.
    ///
    /// Connection and protocol failures are logged and returned; the session
    /// stays open and the graph is unchanged.
    pub fn sync(&mut self, entity: &str) -> Result<SyncReport, MemlinkError> {
        self.ensure_open()?;
        self.client
            .fetch_relationships(entity, &self.graph)
            .inspect_err(|e| {
                if e.is_recoverable() {
                    tracing::warn!("Sync of {} skipped: {}", entity, e);
                }
            })
    }

    /// Send an encrypted snapshot of the graph to the peer.
    ///
    /// Uses its own connection, closed afterwards whether or not the export
    /// succeeded.
    pub fn export(&mut self) -> Result<ExportReport, MemlinkError> {
        self.ensure_open()?;
        let channel = self.client.channel_mut();
        channel.connect()?;
        let result = self.exporter.export(&self.graph, channel, &self.encryptor);
        channel.close();
        result
    }

    /// Save the key/value store to `path`.
    pub fn checkpoint(&self, path: impl AsRef<Path>) -> Result<(), MemlinkError> {
        self.ensure_open()?;
        self.store.save(path)
    }

    /// Save the key/value store to the configured store path.
    pub fn checkpoint_default(&self) -> Result<(), MemlinkError> {
        self.checkpoint(&self.params.store_path)
    }

    /// Record a session fact. Returns the previous value, if any.
    pub fn remember(&self, key: &str, value: &str) -> Result<Option<String>, MemlinkError> {
        self.ensure_open()?;
        self.store.set(key, value)
    }

    /// Look up a session fact; unknown keys yield an empty string.
    pub fn recall(&self, key: &str) -> Result<String, MemlinkError> {
        self.ensure_open()?;
        Ok(self.store.get(key))
    }

    /// Add whitespace-separated tokens of `text` as entities.
    pub fn ingest_text(&self, text: &str) -> Result<Vec<NodeId>, MemlinkError> {
        self.ensure_open()?;
        Ok(self.graph.ingest_tokens(text))
    }

    /// Persist state and release the channel.
    ///
    /// The session is closed even if saving fails; the first save error is
    /// returned.
    pub fn close(&mut self) -> Result<(), MemlinkError> {
        self.ensure_open()?;
        self.state = SessionState::Closed;

        let store_saved = self.store.save(&self.params.store_path);
        let graph_saved = match &self.params.graph_path {
            Some(path) => formats::save_graph(&self.graph.read(), path),
            None => Ok(()),
        };
        self.client.channel_mut().close();

        tracing::info!("Session for {} closed", self.params.endpoint);
        store_saved.and(graph_saved)
    }
}

impl<C: Channel, E: Encryptor> Drop for SessionContext<C, E> {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            if let Err(e) = self.close() {
                tracing::warn!("Failed to save session state on drop: {}", e);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
