//! Transport adapter and listener (§4.1).
//!
//! The engine never talks to a raw socket directly outside this module —
//! every read/write goes through [`TransportAdapter`], mirroring the
//! original's split between `RdWebServer` (listener) and the
//! `RdWebConnClientType` handle threaded through `RdWebConnection`.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use log::{debug, warn};

use crate::error::{Result, ServerError};

/// Outcome of a non-blocking read attempt.
pub enum ReadOutcome {
    /// `n` bytes were read into the caller's buffer.
    Data(usize),
    /// No data available right now; not an error.
    WouldBlock,
    /// The peer closed the connection.
    Closed,
}

/// A single accepted connection's I/O handle. Generalizes the original's
/// `RdWebConnClientType` (a raw socket/netconn handle) behind a trait so
/// the state machine in [`crate::connection`] is transport-agnostic.
pub trait TransportAdapter: Send {
    /// Non-blocking read into `buf`. Never blocks for longer than the
    /// adapter's configured poll timeout.
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome>;

    /// Write as many bytes of `buf` as the underlying transport accepts
    /// right now without blocking indefinitely.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Shut down and release the underlying resource.
    fn close(&mut self);

    /// Peer address, for logging.
    fn peer_addr(&self) -> String;
}

/// `std::net::TcpStream`-backed [`TransportAdapter`].
///
/// Reads use a short poll timeout (1ms, matching the original's FreeRTOS
/// non-blocking recv convention) rather than a blocking read, so the
/// connection's service loop can interleave header parsing, responder
/// ticks, and outbound sends on a single thread per slot.
pub struct TcpTransport {
    stream: TcpStream,
    peer: String,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into());
        Ok(TcpTransport { stream, peer })
    }
}

impl TransportAdapter for TcpTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<ReadOutcome> {
        match self.stream.read(buf) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::WouldBlock),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }

    fn peer_addr(&self) -> String {
        self.peer.clone()
    }
}

/// Listens for inbound TCP connections and hands them to a callback.
///
/// Mirrors `RdWebServer::socketListenerTask`'s accept loop, including its
/// error classification: transient errno values cause a short retry delay
/// and `continue`, anything else tears the listening socket down and
/// rebuilds it after a longer delay.
pub struct ListenerAdapter {
    listener: TcpListener,
    port: u16,
}

impl ListenerAdapter {
    pub fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).map_err(|source| ServerError::Bind {
            port,
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServerError::Listen { port, source })?;
        debug!("listener bound on port {port}");
        Ok(ListenerAdapter { listener, port })
    }

    /// Poll once for a new connection. Returns `Ok(None)` when none is
    /// pending right now (the `EWOULDBLOCK` case in the original).
    pub fn accept_once(&mut self) -> io::Result<Option<TcpTransport>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                debug!("accepted connection from {addr}");
                Ok(Some(TcpTransport::new(stream)?))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                warn!("listener on port {} failed to accept: {e}", self.port);
                Err(e)
            }
        }
    }
}

/// Sleep used between listener retries after a hard accept failure.
pub const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);
