//! # Peer Responder
//!
//! Async TCP server answering `GET_RELATIONSHIPS` from a local graph.
//!
//! Per connection: read one request line, write every matching record as a
//! response line, then shut down the write half so the client sees the end
//! of the response. Records whose names cannot travel as single tokens are
//! skipped with a warning.

use memlink_core::primitives::MAX_ENTITY_NAME_LENGTH;
use memlink_core::protocol::{encode_record, parse_request};
use memlink_core::{GraphStore, MemlinkError};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Longest request line accepted, including the verb and line break.
const MAX_REQUEST_LINE: u64 = (MAX_ENTITY_NAME_LENGTH + 64) as u64;

/// Bind a listener on `addr`.
pub async fn bind(addr: &str) -> Result<TcpListener, MemlinkError> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| MemlinkError::Connection(format!("Bind failed: {}", e)))
}

/// Accept connections forever, answering each on its own task.
pub async fn run(listener: TcpListener, graph: Arc<GraphStore>) -> Result<(), MemlinkError> {
    loop {
        let (stream, remote) = listener
            .accept()
            .await
            .map_err(|e| MemlinkError::Connection(format!("Accept failed: {}", e)))?;
        let graph = Arc::clone(&graph);

        tokio::spawn(async move {
            match handle_connection(stream, &graph).await {
                Ok(count) => tracing::debug!("Answered {} with {} records", remote, count),
                Err(e) => tracing::warn!("Request from {} failed: {}", remote, e),
            }
        });
    }
}

/// Serve `graph` on `addr` until Ctrl+C.
pub async fn serve(addr: &str, graph: Arc<GraphStore>) -> Result<(), MemlinkError> {
    let listener = bind(addr).await?;
    tracing::info!("memlink peer listening on {}", addr);

    tokio::select! {
        result = run(listener, graph) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down peer responder");
            Ok(())
        }
    }
}

/// Answer one request. Returns the number of records written.
pub async fn handle_connection(stream: TcpStream, graph: &GraphStore) -> Result<usize, MemlinkError> {
    let io_err = |e: std::io::Error| MemlinkError::Connection(e.to_string());
    let (reader, mut writer) = stream.into_split();

    let mut line = String::new();
    BufReader::new(reader.take(MAX_REQUEST_LINE))
        .read_line(&mut line)
        .await
        .map_err(io_err)?;

    let entity = match parse_request(&line) {
        Ok(entity) => entity,
        Err(e) => {
            writer.shutdown().await.map_err(io_err)?;
            return Err(e);
        }
    };

    let mut response = String::new();
    let mut count = 0;
    for record in graph.relationships_from(&entity) {
        match encode_record(&record) {
            Ok(encoded) => {
                response.push_str(&encoded);
                count += 1;
            }
            Err(e) => tracing::warn!("Not sending {}: {}", record, e),
        }
    }

    writer.write_all(response.as_bytes()).await.map_err(io_err)?;
    writer.shutdown().await.map_err(io_err)?;
    Ok(count)
}

// =============================================================================
// TESTS
// =============================================================================
