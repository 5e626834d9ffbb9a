//! # TCP Transport
//!
//! Blocking `std::net` implementation of the core [`Channel`] and
//! [`Transport`] traits.
//!
//! Timeouts come from [`PeerConfig`]. A read that hits the read timeout is a
//! `Connection` error. [`CancelHandle::cancel`] shuts the socket down from
//! another thread; the blocked read then reports [`Received::Closed`].

use crate::config::PeerConfig;
use memlink_core::{Channel, MemlinkError, Received, Transport};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Socket timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpOptions {
    pub connect_timeout: Duration,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl From<&PeerConfig> for TcpOptions {
    fn from(config: &PeerConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

impl Default for TcpOptions {
    fn default() -> Self {
        Self::from(&PeerConfig::default())
    }
}

/// State shared between a channel and its cancel handles.
#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    stream: Mutex<Option<TcpStream>>,
}

/// Cancels blocking calls on a [`TcpChannel`] from another thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Shut the connection down. Pending and later reads return `Closed`.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        let stream = self
            .shared
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(stream) = stream.as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// A TCP connection to one endpoint.
#[derive(Debug)]
pub struct TcpChannel {
    endpoint: String,
    options: TcpOptions,
    stream: Option<TcpStream>,
    shared: Arc<Shared>,
}

impl TcpChannel {
    pub fn new(endpoint: impl Into<String>, options: TcpOptions) -> Self {
        Self {
            endpoint: endpoint.into(),
            options,
            stream: None,
            shared: Arc::default(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Handle that can cancel this channel's current connection.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>, MemlinkError> {
        let addrs: Vec<SocketAddr> = self
            .endpoint
            .to_socket_addrs()
            .map_err(|e| {
                MemlinkError::Connection(format!("Cannot resolve {}: {}", self.endpoint, e))
            })?
            .collect();
        if addrs.is_empty() {
            return Err(MemlinkError::Connection(format!(
                "{} resolved to no addresses",
                self.endpoint
            )));
        }
        Ok(addrs)
    }

    fn open_stream(&self) -> Result<TcpStream, MemlinkError> {
        let mut last_error = None;
        for addr in self.resolve()? {
            match TcpStream::connect_timeout(&addr, self.options.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }
        Err(MemlinkError::Connection(format!(
            "Cannot connect to {}: {}",
            self.endpoint,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    fn stream(&mut self) -> Result<&mut TcpStream, MemlinkError> {
        self.stream
            .as_mut()
            .ok_or_else(|| MemlinkError::Connection("Channel is not connected".to_string()))
    }
}

impl Channel for TcpChannel {
    fn connect(&mut self) -> Result<(), MemlinkError> {
        self.close();

        let stream = self.open_stream()?;
        let io_err = |e: std::io::Error| MemlinkError::Connection(e.to_string());
        stream.set_read_timeout(self.options.read_timeout).map_err(io_err)?;
        stream.set_write_timeout(self.options.write_timeout).map_err(io_err)?;
        stream.set_nodelay(true).map_err(io_err)?;

        let control = stream.try_clone().map_err(io_err)?;
        *self
            .shared
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(control);
        self.shared.cancelled.store(false, Ordering::SeqCst);
        self.stream = Some(stream);

        tracing::debug!("Connected to {}", self.endpoint);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), MemlinkError> {
        let endpoint = self.endpoint.clone();
        let stream = self.stream()?;
        stream
            .write_all(bytes)
            .and_then(|()| stream.flush())
            .map_err(|e| MemlinkError::Connection(format!("Send to {} failed: {}", endpoint, e)))
    }

    fn receive(&mut self, max: usize) -> Result<Received, MemlinkError> {
        if self.cancelled() {
            return Ok(Received::Closed);
        }

        let mut buf = vec![0u8; max.max(1)];
        let result = self.stream()?.read(&mut buf);
        match result {
            Ok(_) | Err(_) if self.cancelled() => Ok(Received::Closed),
            Ok(0) => Ok(Received::Eof),
            Ok(n) => {
                buf.truncate(n);
                Ok(Received::Data(buf))
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Err(
                MemlinkError::Connection(format!("Read from {} timed out", self.endpoint)),
            ),
            Err(e) => Err(MemlinkError::Connection(format!(
                "Receive from {} failed: {}",
                self.endpoint, e
            ))),
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            tracing::debug!("Closed connection to {}", self.endpoint);
        }
        self.shared
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builds [`TcpChannel`]s with shared options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport {
    options: TcpOptions,
}

impl TcpTransport {
    pub fn new(options: TcpOptions) -> Self {
        Self { options }
    }
}

impl Transport for TcpTransport {
    type Channel = TcpChannel;

    fn channel(&self, endpoint: &str) -> Result<TcpChannel, MemlinkError> {
        if endpoint.trim().is_empty() {
            return Err(MemlinkError::Connection("Empty endpoint".to_string()));
        }
        Ok(TcpChannel::new(endpoint, self.options))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::net::TcpListener;
    use std::thread;

    fn options() -> TcpOptions {
        TcpOptions {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn exchange_until_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut line = String::new();
            std::io::BufReader::new(stream.try_clone().expect("clone"))
                .read_line(&mut line)
                .expect("read");
            stream.write_all(b"A B knows 5\n").expect("write");
            line
        });

        let mut channel = TcpChannel::new(addr.to_string(), options());
        channel.connect().expect("connect");
        channel.send(b"hello\n").expect("send");

        let mut body = Vec::new();
        loop {
            match channel.receive(1024).expect("receive") {
                Received::Data(chunk) => body.extend_from_slice(&chunk),
                end => {
                    assert_eq!(end, Received::Eof);
                    break;
                }
            }
        }
        channel.close();

        assert_eq!(server.join().expect("server"), "hello\n");
        assert_eq!(body, b"A B knows 5\n");
        assert!(!channel.is_connected());
    }

    #[test]
    fn refused_connection_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let mut channel = TcpChannel::new(addr.to_string(), options());
        assert!(matches!(
            channel.connect(),
            Err(MemlinkError::Connection(_))
        ));
    }

    #[test]
    fn unconnected_receive_fails() {
        let mut channel = TcpChannel::new("127.0.0.1:1", options());
        assert!(channel.receive(16).is_err());
        assert!(channel.send(b"x").is_err());
    }

    #[test]
    fn cancel_reports_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            // Hold the connection open without answering.
            thread::sleep(Duration::from_millis(500));
            drop(stream);
        });

        let mut channel = TcpChannel::new(addr.to_string(), options());
        channel.connect().expect("connect");
        let handle = channel.cancel_handle();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.cancel();
        });

        assert_eq!(channel.receive(16).expect("receive"), Received::Closed);
        canceller.join().expect("canceller");
        server.join().expect("server");
    }

    #[test]
    fn transport_rejects_empty_endpoint() {
        assert!(TcpTransport::default().channel(" ").is_err());
        assert!(TcpTransport::default().channel("localhost:9").is_ok());
    }
}
