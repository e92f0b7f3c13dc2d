//! Server-Sent Events handler (§4.8 **SSEvents**).
//!
//! Grounded on `RdWebHandlerWS` (the original registers SSE through the
//! same connection-manager path as WebSocket, just with `conn_type`
//! EVENT instead): matches any GET whose `Accept: text/event-stream`
//! header set `conn_type` to `ServerSentEvents` and whose URL starts
//! with the registered events path.

use crate::header::{ConnType, RequestHeader};
use crate::responder::{Responder, SseResponder};

use super::{Handler, HandlerOutcome};

pub struct SseHandler {
    path: String,
}

impl SseHandler {
    pub fn new(path: impl Into<String>) -> Self {
        SseHandler { path: path.into() }
    }
}

impl Handler for SseHandler {
    fn name(&self) -> &str {
        "SSEvents"
    }

    fn try_build_responder(&mut self, header: &RequestHeader) -> HandlerOutcome {
        if header.conn_type != ConnType::ServerSentEvents || !header.url.starts_with(&self.path) {
            return HandlerOutcome::NoMatch;
        }
        HandlerOutcome::Responder(Box::new(SseResponder::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_events_path_with_sse_accept_header() {
        let mut h = SseHandler::new("/events");
        let mut req = RequestHeader::new();
        req.handle_data(b"GET /events HTTP/1.1\r\nAccept: text/event-stream\r\n\r\n").unwrap();
        assert!(matches!(h.try_build_responder(&req), HandlerOutcome::Responder(_)));
    }

    #[test]
    fn rejects_plain_http_get() {
        let mut h = SseHandler::new("/events");
        let mut req = RequestHeader::new();
        req.handle_data(b"GET /events HTTP/1.1\r\n\r\n").unwrap();
        assert!(matches!(h.try_build_responder(&req), HandlerOutcome::NoMatch));
    }
}
