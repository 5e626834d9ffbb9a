//! # Secure Export
//!
//! Pushes an encrypted snapshot of a [`GraphStore`] to a peer.
//!
//! Pipeline: snapshot encode -> encrypt -> length-prefix frame -> one send.
//! The graph read lock is held only while encoding. If serialization or
//! encryption fails nothing is written. A failed send is reported and not
//! retried; the caller decides whether to export again.

use crate::MemlinkError;
use crate::channel::{Channel, Encryptor};
use crate::formats;
use crate::graph::GraphStore;
use crate::protocol::frame;

/// Summary of a completed export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportReport {
    pub nodes: usize,
    pub edges: usize,
    /// Size of the serialized snapshot before encryption.
    pub plaintext_bytes: usize,
    /// Size of the ciphertext, excluding the length prefix.
    pub ciphertext_bytes: usize,
}

/// Serializes, encrypts and sends graph snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureExporter;

impl SecureExporter {
    pub fn new() -> Self {
        Self
    }

    /// Export `graph` over an already connected `channel`.
    pub fn export<C, E>(
        &self,
        graph: &GraphStore,
        channel: &mut C,
        encryptor: &E,
    ) -> Result<ExportReport, MemlinkError>
    where
        C: Channel + ?Sized,
        E: Encryptor + ?Sized,
    {
        let (payload, nodes, edges) = {
            let guard = graph.read();
            (formats::encode(&guard)?, guard.node_count(), guard.edge_count())
        };

        let ciphertext = encryptor.encrypt(&payload).map_err(|e| match e {
            MemlinkError::Encryption(_) => e,
            other => MemlinkError::Encryption(other.to_string()),
        })?;

        channel.send(&frame(&ciphertext))?;

        tracing::info!(
            "Exported snapshot ({} nodes, {} edges, {} bytes encrypted)",
            nodes,
            edges,
            ciphertext.len()
        );

        Ok(ExportReport {
            nodes,
            edges,
            plaintext_bytes: payload.len(),
            ciphertext_bytes: ciphertext.len(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
