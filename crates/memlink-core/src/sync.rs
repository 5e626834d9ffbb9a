//! # Sync Client
//!
//! Fetches relationships for one entity from a peer and merges them into a
//! [`GraphStore`].
//!
//! ## State machine
//!
//! ```text
//! Idle -> Connecting -> AwaitingResponse -> Draining -> Closed
//!             |                |
//!             +----------------+--> Closed (error, graph untouched)
//! ```
//!
//! - A connect, send or receive failure closes the channel and returns a
//!   `Connection` error. Nothing received so far is merged.
//! - A zero-byte read ends the response: everything buffered is parsed,
//!   including a final line without a newline.
//! - A locally closed channel (cancellation) also ends the response, but
//!   only complete lines are parsed; the unterminated remainder is dropped.
//!
//! Each fetch opens and closes its own connection, so a `Closed` client can
//! fetch again. Nothing is retried automatically.

use crate::channel::{Channel, Received};
use crate::graph::GraphStore;
use crate::primitives::{MAX_RESPONSE_BYTES, RECEIVE_CHUNK_SIZE};
use crate::protocol::{LineError, complete_lines, encode_request, parse_response};
use crate::MemlinkError;

/// Protocol engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Connecting,
    AwaitingResponse,
    Draining,
    Closed,
}

/// How a response ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseEnd {
    /// The peer closed its side (zero-byte read).
    Eof,
    /// The channel was closed locally before the peer finished.
    Cancelled,
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Entity the relationships were requested for.
    pub entity: String,
    /// Number of relationships merged into the graph.
    pub merged: usize,
    /// Lines that were skipped.
    pub rejected: Vec<LineError>,
    /// Raw response size in bytes.
    pub bytes_received: usize,
    /// How the response ended.
    pub end: ResponseEnd,
}

/// Drives `GET_RELATIONSHIPS` exchanges over a [`Channel`].
#[derive(Debug)]
pub struct SyncClient<C: Channel> {
    channel: C,
    state: SyncState,
    max_response_bytes: usize,
}

impl<C: Channel> SyncClient<C> {
    /// Create an idle client over an unconnected channel.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            state: SyncState::Idle,
            max_response_bytes: MAX_RESPONSE_BYTES,
        }
    }

    /// Override the response size limit.
    #[must_use]
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    /// Current protocol state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Borrow the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Mutably borrow the underlying channel.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Consume the client, returning the channel.
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Fetch relationships of `entity` from the peer and merge them.
    ///
    /// Malformed lines are logged, listed in the report and skipped. All
    /// well-formed records are merged in one batch.
    pub fn fetch_relationships(
        &mut self,
        entity: &str,
        graph: &GraphStore,
    ) -> Result<SyncReport, MemlinkError> {
        let request = encode_request(entity)?;

        self.state = SyncState::Connecting;
        if let Err(e) = self.channel.connect() {
            self.state = SyncState::Closed;
            tracing::warn!("Failed to connect to the relationship peer: {}", e);
            return Err(e);
        }

        let (body, end) = match self.exchange(&request) {
            Ok(received) => received,
            Err(e) => {
                self.finish();
                tracing::warn!("Fetching relationships for {} failed: {}", entity, e);
                return Err(e);
            }
        };

        let parseable = match end {
            ResponseEnd::Eof => body.as_slice(),
            ResponseEnd::Cancelled => complete_lines(&body),
        };
        let parsed = parse_response(parseable);
        for rejected in &parsed.rejected {
            tracing::warn!("Skipping malformed response {}", rejected);
        }
        let merged = graph.merge_records(&parsed.records);
        self.finish();

        tracing::info!(
            "Merged {} relationships for {} ({} lines skipped, {:?})",
            merged,
            entity,
            parsed.rejected.len(),
            end
        );

        Ok(SyncReport {
            entity: entity.to_string(),
            merged,
            rejected: parsed.rejected,
            bytes_received: body.len(),
            end,
        })
    }

    /// Send the request and buffer the response until it ends.
    fn exchange(&mut self, request: &[u8]) -> Result<(Vec<u8>, ResponseEnd), MemlinkError> {
        tracing::debug!("Sending request: {:?}", String::from_utf8_lossy(request));
        self.channel.send(request)?;
        self.state = SyncState::AwaitingResponse;

        let mut body = Vec::new();
        loop {
            match self.channel.receive(RECEIVE_CHUNK_SIZE)? {
                Received::Data(chunk) if !chunk.is_empty() => {
                    if body.len().saturating_add(chunk.len()) > self.max_response_bytes {
                        return Err(MemlinkError::Protocol(format!(
                            "Response exceeds {} bytes",
                            self.max_response_bytes
                        )));
                    }
                    body.extend_from_slice(&chunk);
                }
                Received::Data(_) | Received::Eof => {
                    self.state = SyncState::Draining;
                    return Ok((body, ResponseEnd::Eof));
                }
                Received::Closed => {
                    self.state = SyncState::Draining;
                    return Ok((body, ResponseEnd::Cancelled));
                }
            }
        }
    }

    fn finish(&mut self) {
        self.channel.close();
        self.state = SyncState::Closed;
    }
}

// =============================================================================
// TESTS
// =============================================================================
