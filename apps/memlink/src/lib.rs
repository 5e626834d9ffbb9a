//! # memlink
//!
//! The application side of memlink: everything that touches the network,
//! ciphers, configuration or the terminal. The graph, store and protocol
//! engines live in `memlink-core`.

pub mod cli;
pub mod config;
pub mod crypto;
pub mod net;
pub mod peer;

pub use config::Config;
pub use crypto::{PemKeyLoader, RsaEncryptor};
pub use net::{CancelHandle, TcpChannel, TcpOptions, TcpTransport};
