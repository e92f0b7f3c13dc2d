//! The [`Handler`] trait and its five variants (§4.8).
//!
//! Grounded on `RdWebConnManager`'s handler vector: handlers are
//! registered once at startup and consulted in registration order;
//! the first one whose `try_build_responder` returns a responder wins.

pub mod restapi;
pub mod sse;
pub mod static_data;
pub mod static_file;
pub mod websocket;

pub use restapi::RestApiHandler;
pub use sse::SseHandler;
pub use static_data::StaticDataHandler;
pub use static_file::StaticFileHandler;
pub use websocket::WebSocketHandler;

use crate::header::RequestHeader;
use crate::responder::Responder;

/// Outcome of a single handler's route match attempt (§4.4, §7).
///
/// A plain `Option` can't tell a route miss apart from a route that
/// matched but couldn't be served because a resource pool (currently
/// only the WebSocket channel-ID pool) is exhausted; the manager needs
/// that distinction to latch a 503 instead of a 404.
pub enum HandlerOutcome {
    /// Route matched; this responder will serve the request.
    Responder(Box<dyn Responder>),
    /// This handler's route did not match the request at all.
    NoMatch,
    /// The route matched but the handler's resource pool is exhausted.
    PoolExhausted,
}

/// Matches a completed request header against a handler's registered
/// route and, on match, builds the Responder that will serve it.
pub trait Handler: Send {
    fn name(&self) -> &str;

    /// Attempts to build a responder for this request. `&mut self`
    /// because the WebSocket handler allocates a channel ID here.
    fn try_build_responder(&mut self, header: &RequestHeader) -> HandlerOutcome;

    fn is_file_handler(&self) -> bool {
        false
    }

    fn is_websocket_handler(&self) -> bool {
        false
    }

    /// Declared channel IDs, for WebSocket handlers only.
    fn channel_id_list(&self) -> &[u32] {
        &[]
    }

    /// Called when a connection using a responder this handler built
    /// closes, so channel IDs (or other per-responder handler state)
    /// can be released back to the pool.
    fn on_responder_closed(&mut self, _channel_id: Option<u32>) {}
}
