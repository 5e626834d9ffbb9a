//! Test doubles for the collaborator traits.

#![allow(dead_code)]

use memlink_core::{Channel, Encryptor, KeyLoader, MemlinkError, Received, Transport};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What a fake peer observed, shared between the test and its channels.
#[derive(Debug, Default)]
pub struct PeerLog {
    pub connects: usize,
    pub closes: usize,
    pub sent: Vec<Vec<u8>>,
}

/// How a fake peer answers each connection.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send these chunks, then end the response.
    Chunks(Vec<Vec<u8>>),
    /// Send these chunks, then report a locally closed channel.
    Cancelled(Vec<Vec<u8>>),
    /// Refuse the connection.
    Refuse,
}

impl Reply {
    pub fn text(body: &str) -> Self {
        Self::Chunks(vec![body.as_bytes().to_vec()])
    }
}

/// Channel whose every connection replays the same [`Reply`].
#[derive(Debug)]
pub struct FakeChannel {
    reply: Reply,
    pending: VecDeque<Received>,
    log: Arc<Mutex<PeerLog>>,
}

impl Channel for FakeChannel {
    fn connect(&mut self) -> Result<(), MemlinkError> {
        self.log.lock().expect("log").connects += 1;
        let (chunks, end) = match &self.reply {
            Reply::Refuse => {
                return Err(MemlinkError::Connection("connection refused".to_string()));
            }
            Reply::Chunks(chunks) => (chunks, Received::Eof),
            Reply::Cancelled(chunks) => (chunks, Received::Closed),
        };
        self.pending = chunks.iter().cloned().map(Received::Data).collect();
        self.pending.push_back(end);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MemlinkError> {
        self.log.lock().expect("log").sent.push(bytes.to_vec());
        Ok(())
    }

    fn receive(&mut self, _max: usize) -> Result<Received, MemlinkError> {
        Ok(self.pending.pop_front().unwrap_or(Received::Eof))
    }

    fn close(&mut self) {
        self.log.lock().expect("log").closes += 1;
        self.pending.clear();
    }
}

/// Transport producing [`FakeChannel`]s.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    pub reply: Reply,
    pub log: Arc<Mutex<PeerLog>>,
}

impl FakeTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            log: Arc::default(),
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.log.lock().expect("log").sent.clone()
    }
}

impl Transport for FakeTransport {
    type Channel = FakeChannel;

    fn channel(&self, _endpoint: &str) -> Result<FakeChannel, MemlinkError> {
        Ok(FakeChannel {
            reply: self.reply.clone(),
            pending: VecDeque::new(),
            log: Arc::clone(&self.log),
        })
    }
}

/// XORs every byte with a fixed key.
#[derive(Debug, Clone, Copy)]
pub struct XorEncryptor(pub u8);

impl XorEncryptor {
    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        ciphertext.iter().map(|b| b ^ self.0).collect()
    }
}

impl Encryptor for XorEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, MemlinkError> {
        Ok(self.decrypt(plaintext))
    }
}

/// Key loader that only accepts paths ending in `.pem`.
#[derive(Debug, Default)]
pub struct XorKeys {
    pub loaded: Mutex<Vec<PathBuf>>,
}

impl KeyLoader for XorKeys {
    type Encryptor = XorEncryptor;

    fn load(&self, path: &Path) -> Result<XorEncryptor, MemlinkError> {
        if path.extension().is_none_or(|ext| ext != "pem") {
            return Err(MemlinkError::Encryption(format!(
                "not a key file: {}",
                path.display()
            )));
        }
        self.loaded.lock().expect("keys").push(path.to_path_buf());
        Ok(XorEncryptor(0x5a))
    }
}
