//! The [`Responder`] trait and its five variants (§4.7).
//!
//! Mirrors the original's `RdWebResponder` virtual base: a `Connection`
//! holds at most one `Box<dyn Responder>` and drives it through a fixed
//! lifecycle (`start_responding` → repeated `service`/`handle_data`/
//! `next_response_chunk` → inactive).

pub mod data;
pub mod file;
pub mod restapi;
pub mod sse;
pub mod websocket;

pub use data::DataResponder;
pub use file::FileResponder;
pub use restapi::RestApiResponder;
pub use sse::SseResponder;
pub use websocket::WebSocketResponder;

/// Shared behaviour across all five responder kinds.
pub trait Responder: Send {
    /// Whether this responder still has work to do. Once `false`, the
    /// connection tears it down.
    fn is_active(&self) -> bool;

    /// Called once per connection service tick regardless of I/O.
    fn service(&mut self) {}

    /// Feeds inbound body bytes (after the header block). Returns `false`
    /// on a hard failure that should close the connection.
    fn handle_data(&mut self, _buf: &[u8]) -> bool {
        false
    }

    /// Called once when the responder is selected for a connection.
    /// Returns whether it actually became active.
    fn start_responding(&mut self) -> bool {
        false
    }

    /// Fills `buf` with the next outbound chunk, returning bytes written.
    fn next_response_chunk(&mut self, _buf: &mut [u8]) -> usize {
        0
    }

    /// `Content-Type` header value, if this responder wants one in the
    /// standard header block.
    fn content_type(&self) -> Option<&str> {
        None
    }

    /// `Content-Length`, if known up front.
    fn content_length(&self) -> Option<u64> {
        None
    }

    /// If `true`, the connection stays open (and its idle timeout is
    /// disabled) after the responder goes inactive instead of closing.
    fn leaves_connection_open(&self) -> bool {
        false
    }

    /// If `false` (WebSocket, SSE), the engine emits no standard header
    /// block — the responder writes its own status line in its first
    /// chunk.
    fn needs_standard_headers(&self) -> bool {
        true
    }

    /// Backpressure predicate used by websocket/SSE producers.
    fn ready_for_data(&self) -> bool {
        true
    }

    /// Protocol channel ID, for WebSocket responders only.
    fn protocol_channel_id(&self) -> Option<u32> {
        None
    }

    /// Queues an outbound WebSocket frame. Returns `false` for any
    /// responder that isn't a WebSocket responder.
    fn send_frame(&mut self, _data: &[u8], _is_text: bool) -> bool {
        false
    }

    /// Queues an outbound SSE event. Returns `false` for any responder
    /// that isn't an SSE responder.
    fn send_event(&mut self, _content: &str, _group: &str) -> bool {
        false
    }
}
