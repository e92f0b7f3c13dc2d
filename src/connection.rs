//! Per-slot connection state machine (§4.3).
//!
//! Grounded on `RdWebConnection::service`: each slot owns one
//! [`TransportAdapter`], accumulates a [`RequestHeader`], and once it
//! completes, drives at most one [`Responder`] through to completion.
//!
//! The raw socket receive buffer here is a plain `Vec<u8>`, not a
//! `pipebuf` pair: the teacher crate only ever shows `PBufRdWr`/`PBufWr`
//! as borrowed parameter types, never how the owning buffer they
//! reborrow from is constructed, so there is nothing to generalize
//! without guessing at unseen API surface. `header.rs` and `wslink.rs`
//! use the same plain-`Vec<u8>` accumulator for the same reason.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::header::{HttpStatus, RequestHeader};
use crate::responder::Responder;
use crate::transport::{ReadOutcome, TransportAdapter};

/// Default idle timeout for an HTTP response with no active responder
/// opting out via `leaves_connection_open`.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

const RECV_CHUNK: usize = 1460; // one Ethernet MSS, matching the original's per-recv buffer size.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    HeaderAccumulating,
    ResponderRunning,
    Closing,
}

/// What a connection needs from its owner once it lands in
/// [`State::Closing`]: any WS channel ID to hand back to the handler pool.
pub struct ClosedInfo {
    pub channel_id: Option<u32>,
}

pub struct Connection {
    transport: Box<dyn TransportAdapter>,
    state: State,
    header: RequestHeader,
    responder: Option<Box<dyn Responder>>,
    standard_headers_sent: bool,
    continue_sent: bool,
    started_at: Instant,
    timeout_active: bool,
    send_buffer_max_len: usize,
    // Raw socket receive buffer; bytes are appended on read and drained
    // from the front as they're consumed by the header parser/responder.
    recv_buf: Vec<u8>,
}

impl Connection {
    pub fn new(transport: Box<dyn TransportAdapter>, send_buffer_max_len: usize) -> Self {
        Connection {
            transport,
            state: State::HeaderAccumulating,
            header: RequestHeader::new(),
            responder: None,
            standard_headers_sent: false,
            continue_sent: false,
            started_at: Instant::now(),
            timeout_active: true,
            send_buffer_max_len,
            recv_buf: Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    pub fn is_closing(&self) -> bool {
        self.state == State::Closing
    }

    pub fn peer_addr(&self) -> String {
        self.transport.peer_addr()
    }

    /// The slot's active responder, if any. Producers reach websocket
    /// and SSE responders through this to enqueue outbound data.
    pub fn responder_mut(&mut self) -> Option<&mut dyn Responder> {
        self.responder.as_deref_mut()
    }

    pub fn responder_ref(&self) -> Option<&dyn Responder> {
        self.responder.as_deref()
    }

    /// Runs one service tick. `build_responder` is supplied by the owning
    /// manager since only it knows the handler list; `standard_headers`
    /// is the manager's always-emitted extra header list (§4.4).
    pub fn service(
        &mut self,
        mut build_responder: impl FnMut(&RequestHeader) -> (Option<Box<dyn Responder>>, HttpStatus),
        standard_headers: &[(String, String)],
    ) -> Option<ClosedInfo> {
        if self.state == State::Idle {
            return None;
        }

        if self.timeout_active && self.started_at.elapsed() > DEFAULT_IDLE_TIMEOUT {
            debug!("connection to {} idle timeout", self.peer_addr());
            self.state = State::Closing;
        }

        if let Some(r) = self.responder.as_mut() {
            r.service();
        }

        let skip_read = self
            .responder
            .as_ref()
            .map(|r| !r.ready_for_data())
            .unwrap_or(false);

        if !skip_read && self.state != State::Closing {
            self.poll_read(&mut build_responder);
        }

        if self.state == State::ResponderRunning {
            self.drain_responder(standard_headers);
        }

        if self.state == State::Closing {
            let channel_id = self.responder.as_ref().and_then(|r| r.protocol_channel_id());
            self.transport.close();
            self.state = State::Idle;
            self.responder = None;
            return Some(ClosedInfo { channel_id });
        }

        None
    }

    fn poll_read(
        &mut self,
        build_responder: &mut impl FnMut(&RequestHeader) -> (Option<Box<dyn Responder>>, HttpStatus),
    ) {
        let mut chunk = [0u8; RECV_CHUNK];
        match self.transport.try_read(&mut chunk) {
            Ok(ReadOutcome::WouldBlock) => {}
            Ok(ReadOutcome::Closed) => {
                trace!("peer {} closed", self.peer_addr());
                self.state = State::Closing;
            }
            Ok(ReadOutcome::Data(n)) => {
                self.recv_buf.extend_from_slice(&chunk[..n]);
            }
            Err(e) => {
                warn!("read error from {}: {e}", self.peer_addr());
                self.state = State::Closing;
            }
        }

        if self.state == State::HeaderAccumulating {
            self.feed_header(build_responder);
        } else if self.state == State::ResponderRunning {
            if !self.recv_buf.is_empty() {
                let data = std::mem::take(&mut self.recv_buf);
                if let Some(r) = self.responder.as_mut() {
                    if !r.handle_data(&data) {
                        self.state = State::Closing;
                    }
                }
            }
        }
    }

    fn feed_header(
        &mut self,
        build_responder: &mut impl FnMut(&RequestHeader) -> (Option<Box<dyn Responder>>, HttpStatus),
    ) {
        if self.recv_buf.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.recv_buf);
        match self.header.handle_data(&data) {
            Ok(consumed) => {
                // Whatever wasn't consumed as header bytes is body data
                // for the (about to be built) responder's next tick.
                self.recv_buf = data[consumed..].to_vec();
                if self.header.is_continue && !self.continue_sent {
                    self.continue_sent = true;
                    let _ = self.transport.write(b"HTTP/1.1 100 Continue\r\n\r\n");
                }
                if self.header.is_complete {
                    self.on_header_complete(build_responder);
                    // Whatever's left in recv_buf is body; let it flow on
                    // the next tick through the ResponderRunning branch.
                }
            }
            Err(()) => {
                warn!("malformed request header from {}", self.peer_addr());
                self.latch_status_and_close(HttpStatus::BadRequest400);
            }
        }
    }

    fn on_header_complete(
        &mut self,
        build_responder: &mut impl FnMut(&RequestHeader) -> (Option<Box<dyn Responder>>, HttpStatus),
    ) {
        let (responder, status) = build_responder(&self.header);
        match responder {
            Some(mut r) => {
                r.start_responding();
                self.timeout_active = !r.leaves_connection_open();
                self.responder = Some(r);
                self.state = State::ResponderRunning;
            }
            None => {
                self.latch_status_and_close(status);
            }
        }
    }

    /// No responder matched; writes a bare status line and closes. The
    /// original always closes the connection on a latched failure status
    /// rather than trying to keep it alive for a retry.
    fn latch_status_and_close(&mut self, status: HttpStatus) {
        let line = format!("{}\r\nConnection: close\r\n\r\n", status.status_line());
        let _ = self.transport.write(line.as_bytes());
        self.state = State::Closing;
    }

    fn drain_responder(&mut self, standard_headers: &[(String, String)]) {
        let Some(responder) = self.responder.as_mut() else {
            self.state = State::Closing;
            return;
        };

        if !self.standard_headers_sent && responder.needs_standard_headers() {
            let header_block = build_standard_headers(responder.as_ref(), standard_headers);
            let _ = self.transport.write(header_block.as_bytes());
            self.standard_headers_sent = true;
        }

        if responder.is_active() {
            let mut buf = vec![0u8; self.send_buffer_max_len];
            let n = responder.next_response_chunk(&mut buf);
            if n > 0 {
                let _ = self.transport.write(&buf[..n]);
            }
        }

        if !responder.is_active() {
            let leaves_open = responder.leaves_connection_open();
            if !leaves_open {
                self.state = State::Closing;
            }
        }
    }
}

/// Formats the standard header block (§4.3): status line, content type,
/// the manager's registered extra headers, content length, and
/// `Connection: close` when the responder does not keep the connection
/// open.
fn build_standard_headers(responder: &dyn Responder, standard_headers: &[(String, String)]) -> String {
    let mut out = String::new();
    out.push_str(&HttpStatus::Ok200.status_line());
    out.push_str("\r\n");
    if let Some(ct) = responder.content_type() {
        out.push_str(&format!("Content-Type: {ct}\r\n"));
    }
    for (name, value) in standard_headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    if let Some(len) = responder.content_length() {
        out.push_str(&format!("Content-Length: {len}\r\n"));
    }
    if !responder.leaves_connection_open() {
        out.push_str("Connection: close\r\n");
    }
    out.push_str("\r\n");
    out
}
