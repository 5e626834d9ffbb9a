//! # Collaborator Interfaces
//!
//! The core never opens sockets or runs ciphers itself. These traits are the
//! seams where the application plugs in a transport, an encryption
//! capability and a key loader, and where tests plug in fakes.

use crate::MemlinkError;
use std::path::Path;

/// Result of one [`Channel::receive`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// Bytes read from the peer.
    Data(Vec<u8>),
    /// The peer finished sending (a zero-byte read).
    Eof,
    /// The channel was closed locally, e.g. by a caller cancelling the read.
    Closed,
}

/// A duplex byte channel to one peer.
///
/// All calls block the invoking thread. Timeouts, if any, come from the
/// channel's own configuration.
pub trait Channel {
    /// Establish the connection.
    fn connect(&mut self) -> Result<(), MemlinkError>;

    /// Write all of `bytes`.
    fn send(&mut self, bytes: &[u8]) -> Result<(), MemlinkError>;

    /// Read up to `max` bytes.
    fn receive(&mut self, max: usize) -> Result<Received, MemlinkError>;

    /// Release the connection. Closing an unconnected channel is a no-op.
    fn close(&mut self);
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn connect(&mut self) -> Result<(), MemlinkError> {
        (**self).connect()
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MemlinkError> {
        (**self).send(bytes)
    }

    fn receive(&mut self, max: usize) -> Result<Received, MemlinkError> {
        (**self).receive(max)
    }

    fn close(&mut self) {
        (**self).close();
    }
}

/// Builds (but does not connect) channels for an endpoint.
pub trait Transport {
    type Channel: Channel;

    /// Create a channel for `endpoint` (e.g. `127.0.0.1:8080`).
    fn channel(&self, endpoint: &str) -> Result<Self::Channel, MemlinkError>;
}

/// Confidentiality capability used for snapshot export.
///
/// Implementations are expected to use an asymmetric public key with OAEP
/// padding and a SHA-256 digest.
pub trait Encryptor {
    /// Encrypt `plaintext`, returning an opaque ciphertext.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, MemlinkError>;
}

impl<E: Encryptor + ?Sized> Encryptor for Box<E> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, MemlinkError> {
        (**self).encrypt(plaintext)
    }
}

/// Loads key material from a file into an [`Encryptor`].
pub trait KeyLoader {
    type Encryptor: Encryptor;

    /// Load the key stored at `path`.
    fn load(&self, path: &Path) -> Result<Self::Encryptor, MemlinkError>;
}
