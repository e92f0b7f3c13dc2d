//! WebSocket handler (§4.8 **WebSocket**).
//!
//! Grounded on `RdWebHandlerWS` and spec §4.4/§5's channel-ID pool: holds
//! `max_websockets` channel IDs preloaded starting at `base_channel_id`
//! and hands one out per accepted upgrade, computed on demand as
//! declared IDs minus IDs currently in use. Only the service task ever
//! calls `try_build_responder`/`on_responder_closed`, so a plain
//! `HashSet` needs no lock (§5 shared-state note).

use std::collections::HashSet;
use std::sync::Arc;

use log::warn;

use crate::header::{ConnType, RequestHeader};
use crate::responder::websocket::WsEventFn;
use crate::responder::{Responder, WebSocketResponder};
use crate::wslink::WsEvent;

use super::{Handler, HandlerOutcome};

pub struct WebSocketHandler {
    path: String,
    channel_ids: Vec<u32>,
    in_use: HashSet<u32>,
    ping_interval_ms: u64,
    on_event: Arc<dyn Fn(u32, WsEvent) + Send + Sync>,
}

impl WebSocketHandler {
    pub fn new(
        path: impl Into<String>,
        max_websockets: usize,
        base_channel_id: u32,
        ping_interval_ms: u64,
        on_event: impl Fn(u32, WsEvent) + Send + Sync + 'static,
    ) -> Self {
        WebSocketHandler {
            path: path.into(),
            channel_ids: (base_channel_id..base_channel_id + max_websockets as u32).collect(),
            in_use: HashSet::new(),
            ping_interval_ms,
            on_event: Arc::new(on_event),
        }
    }

    fn allocate_channel_id(&mut self) -> Option<u32> {
        let id = self.channel_ids.iter().find(|id| !self.in_use.contains(id)).copied()?;
        self.in_use.insert(id);
        Some(id)
    }
}

impl Handler for WebSocketHandler {
    fn name(&self) -> &str {
        "WebSocket"
    }

    fn is_websocket_handler(&self) -> bool {
        true
    }

    fn channel_id_list(&self) -> &[u32] {
        &self.channel_ids
    }

    fn try_build_responder(&mut self, header: &RequestHeader) -> HandlerOutcome {
        if header.conn_type != ConnType::WebSocket || !header.url.starts_with(&self.path) {
            return HandlerOutcome::NoMatch;
        }
        let channel_id = match self.allocate_channel_id() {
            Some(id) => id,
            None => {
                warn!("websocket channel ID pool exhausted for path {}", self.path);
                return HandlerOutcome::PoolExhausted;
            }
        };
        let on_event = self.on_event.clone();
        let cb: WsEventFn = Box::new(move |ch, ev| (on_event)(ch, ev));
        match WebSocketResponder::new(channel_id, &header.websocket_key, self.ping_interval_ms, cb) {
            Ok(r) => HandlerOutcome::Responder(Box::new(r)),
            Err(e) => {
                warn!("websocket handshake failed: {e:?}");
                self.in_use.remove(&channel_id);
                HandlerOutcome::NoMatch
            }
        }
    }

    fn on_responder_closed(&mut self, channel_id: Option<u32>) {
        if let Some(id) = channel_id {
            self.in_use.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unwrap_responder(outcome: HandlerOutcome) -> Box<dyn Responder> {
        match outcome {
            HandlerOutcome::Responder(r) => r,
            _ => panic!("expected HandlerOutcome::Responder"),
        }
    }

    #[test]
    fn allocates_distinct_channel_ids_and_releases_on_close() {
        let mut h = WebSocketHandler::new("/ws", 2, 50, 0, |_ch, _ev| {});
        let mut req = RequestHeader::new();
        req.handle_data(b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n").unwrap();

        let r1 = unwrap_responder(h.try_build_responder(&req));
        let r2 = unwrap_responder(h.try_build_responder(&req));
        assert_ne!(r1.protocol_channel_id(), r2.protocol_channel_id());
        assert!(
            matches!(h.try_build_responder(&req), HandlerOutcome::PoolExhausted),
            "pool of 2 should be exhausted"
        );

        h.on_responder_closed(r1.protocol_channel_id());
        assert!(
            matches!(h.try_build_responder(&req), HandlerOutcome::Responder(_)),
            "releasing a channel id frees a slot"
        );
    }

    #[test]
    fn rejects_non_websocket_requests() {
        let mut h = WebSocketHandler::new("/ws", 2, 50, 0, |_ch, _ev| {});
        let mut req = RequestHeader::new();
        req.handle_data(b"GET /ws HTTP/1.1\r\n\r\n").unwrap();
        assert!(matches!(h.try_build_responder(&req), HandlerOutcome::NoMatch));
    }
}
