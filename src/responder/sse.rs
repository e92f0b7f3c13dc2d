//! Server-Sent Events responder (§4.7 **SSEvents**).
//!
//! Grounded on `RdWebResponderSSEvents::generateEventMessage`: splits the
//! event content on `\n`/`\r` into `data:` lines, writes its own status
//! line (no standard-header path), and drains a small bounded queue of
//! pending events per `service()` tick.

use std::collections::VecDeque;

use log::warn;

use super::Responder;

/// Depth of the bounded per-connection outbound event queue.
const SSE_QUEUE_CAP: usize = 2;

const INITIAL_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/event-stream\r\n\
Access-Control-Allow-Origin: *\r\n\
Cache-Control: no-cache\r\n\
Connection: keep-alive\r\n\
Accept-Ranges: none\r\n\r\n";

struct PendingEvent {
    content: String,
    group: String,
}

pub struct SseResponder {
    queue: VecDeque<PendingEvent>,
    initial_sent: bool,
    out_buf: Vec<u8>,
    out_pos: usize,
    active: bool,
    dropped_count: u64,
}

impl SseResponder {
    pub fn new() -> Self {
        SseResponder {
            queue: VecDeque::new(),
            initial_sent: false,
            out_buf: Vec::new(),
            out_pos: 0,
            active: true,
            dropped_count: 0,
        }
    }

    /// Total events dropped for outbound queue overflow so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Enqueues an event for the next `service()` tick. Never blocks the
    /// producer; on overflow the new event itself is dropped and
    /// `dropped_count` is incremented, reported back as `false`.
    pub fn send_event(&mut self, content: &str, group: &str) -> bool {
        if self.queue.len() >= SSE_QUEUE_CAP {
            warn!("SSE outbound queue full, dropping new event");
            self.dropped_count += 1;
            return false;
        }
        self.queue.push_back(PendingEvent {
            content: content.to_string(),
            group: group.to_string(),
        });
        true
    }

    fn format_event(content: &str, group: &str, unix_seconds: u64) -> String {
        let mut ev = String::new();
        if unix_seconds != 0 {
            ev.push_str(&format!("id: {unix_seconds}\r\n"));
        }
        if !group.is_empty() {
            ev.push_str(&format!("event: {group}\r\n"));
        }
        for line in split_lines(content) {
            ev.push_str("data: ");
            ev.push_str(line);
            ev.push_str("\r\n");
        }
        ev.push_str("\r\n");
        ev
    }
}

impl Default for SseResponder {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits on any run of `\n`/`\r`, matching the original's line-boundary
/// scan (which treats `\r\n`, bare `\n`, and bare `\r` all as line ends).
fn split_lines(s: &str) -> Vec<&str> {
    s.split(['\n', '\r']).filter(|l| !l.is_empty()).collect()
}

impl Responder for SseResponder {
    fn is_active(&self) -> bool {
        self.active
    }

    fn start_responding(&mut self) -> bool {
        self.active = true;
        true
    }

    fn needs_standard_headers(&self) -> bool {
        false
    }

    fn leaves_connection_open(&self) -> bool {
        true
    }

    fn send_event(&mut self, content: &str, group: &str) -> bool {
        SseResponder::send_event(self, content, group)
    }

    fn service(&mut self) {
        if self.out_pos >= self.out_buf.len() {
            if let Some(event) = self.queue.pop_front() {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                self.out_buf = Self::format_event(&event.content, &event.group, now).into_bytes();
                self.out_pos = 0;
            }
        }
    }

    fn next_response_chunk(&mut self, buf: &mut [u8]) -> usize {
        if !self.initial_sent {
            self.initial_sent = true;
            let n = INITIAL_RESPONSE.len().min(buf.len());
            buf[..n].copy_from_slice(&INITIAL_RESPONSE[..n]);
            return n;
        }
        let remaining = &self.out_buf[self.out_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.out_pos += n;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_single_line_event() {
        let ev = SseResponder::format_event("hello", "update", 1234);
        assert_eq!(ev, "id: 1234\r\nevent: update\r\ndata: hello\r\n\r\n");
    }

    #[test]
    fn omits_empty_group_and_id() {
        let ev = SseResponder::format_event("hello", "", 0);
        assert_eq!(ev, "data: hello\r\n\r\n");
    }

    #[test]
    fn splits_multiline_content() {
        let ev = SseResponder::format_event("line1\nline2\rline3", "g", 5);
        assert_eq!(
            ev,
            "id: 5\r\nevent: g\r\ndata: line1\r\ndata: line2\r\ndata: line3\r\n\r\n"
        );
    }

    #[test]
    fn initial_chunk_is_the_literal_sse_response() {
        let mut r = SseResponder::new();
        let mut buf = vec![0u8; 512];
        let n = r.next_response_chunk(&mut buf);
        assert_eq!(&buf[..n], INITIAL_RESPONSE);
        assert!(!r.needs_standard_headers());
        assert!(r.leaves_connection_open());
    }

    #[test]
    fn queue_drops_newest_on_overflow_and_counts_drops() {
        let mut r = SseResponder::new();
        assert!(r.send_event("a", "g"));
        assert!(r.send_event("b", "g"));
        assert!(!r.send_event("c", "g"), "overflow event must report failure");
        assert_eq!(r.queue.len(), SSE_QUEUE_CAP);
        assert_eq!(r.dropped_count(), 1);
        assert_eq!(r.queue.front().unwrap().content, "a", "oldest queued event must survive overflow");
        assert_eq!(r.queue.back().unwrap().content, "b");
    }
}
