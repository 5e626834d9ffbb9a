//! # memlink - Associative Memory Node
//!
//! The main binary for memlink.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    apps/memlink (THE BINARY)                 │
//! │                                                              │
//! │  ┌───────────┐   ┌──────────────┐   ┌─────────────────────┐  │
//! │  │   CLI     │   │ TCP channel  │   │  Peer responder     │  │
//! │  │  (clap)   │   │ RSA-OAEP key │   │  (tokio)            │  │
//! │  └─────┬─────┘   └──────┬───────┘   └──────────┬──────────┘  │
//! │        └────────────────┼──────────────────────┘             │
//! │                         ▼                                    │
//! │                 ┌────────────────┐                           │
//! │                 │  memlink-core  │                           │
//! │                 │  (THE LOGIC)   │                           │
//! │                 └────────────────┘                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Answer relationship requests from the local graph
//! memlink serve --host 0.0.0.0 --port 8080
//!
//! # Fetch and merge relationships from a peer
//! memlink --endpoint 10.0.0.2:8080 sync Paris
//!
//! # Push an encrypted snapshot
//! memlink --key-file peer.pem export
//! ```

use clap::Parser;
use memlink::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // MEMLINK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MEMLINK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "memlink=info,memlink_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the memlink startup banner.
fn print_banner() {
    eprintln!("memlink v{} - associative memory with peer sync", env!("CARGO_PKG_VERSION"));
}
