//! Incremental HTTP/1.1 request header parsing (§4.2).
//!
//! Bytes arrive from the transport in arbitrary chunk sizes. `handle_data`
//! is handed the full not-yet-consumed buffer on every call and re-parses
//! it with `httparse::Request`, the same way the teacher crate's
//! `from_http_scan` scans accumulated pipebuf bytes for a complete HTTP
//! request: `Status::Partial` means wait for more, `Status::Complete(n)`
//! means the first `n` bytes were the header block and the rest is body.
//! `RequestHeader` itself holds no raw-byte accumulator — the caller
//! re-feeds whatever `handle_data` didn't report as consumed.

use httparse::Status;
use log::{debug, trace};

/// Headers array size passed to `httparse::Request::new`. Generous
/// relative to [`MAX_WEB_HEADERS`] so a request with more header lines
/// than this crate retains still parses; only storage into
/// [`RequestHeader::name_values`] is capped.
const HTTPARSE_MAX_HEADERS: usize = 64;

/// Connection type inferred while scanning headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnType {
    Http,
    WebSocket,
    ServerSentEvents,
}

/// HTTP method recognized on the request line. Anything else fails parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
    Put,
    Patch,
    Head,
    Options,
}

impl Method {
    fn from_str(s: &str) -> Option<Method> {
        Some(match_ascii_case_insensitive(s)?)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

fn match_ascii_case_insensitive(s: &str) -> Option<Method> {
    const TABLE: &[(&str, Method)] = &[
        ("GET", Method::Get),
        ("POST", Method::Post),
        ("DELETE", Method::Delete),
        ("PUT", Method::Put),
        ("PATCH", Method::Patch),
        ("HEAD", Method::Head),
        ("OPTIONS", Method::Options),
    ];
    TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(s))
        .map(|(_, m)| *m)
}

/// Maximum number of header name/value pairs retained (matches
/// `RdWebRequestHeader::MAX_WEB_HEADERS`).
pub const MAX_WEB_HEADERS: usize = 20;

/// Latched per-request outcome. A connection that fails mid-request
/// (no handler matched, malformed header, slot pool exhausted) sets one
/// of these rather than propagating a `Result` across the connection
/// boundary — the standard-header path formats whichever was latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok200,
    BadRequest400,
    NotFound404,
    RequestEntityTooLarge413,
    InternalServerError500,
    ServiceUnavailable503,
}

impl HttpStatus {
    pub fn code(self) -> u16 {
        match self {
            HttpStatus::Ok200 => 200,
            HttpStatus::BadRequest400 => 400,
            HttpStatus::NotFound404 => 404,
            HttpStatus::RequestEntityTooLarge413 => 413,
            HttpStatus::InternalServerError500 => 500,
            HttpStatus::ServiceUnavailable503 => 503,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            HttpStatus::Ok200 => "OK",
            HttpStatus::BadRequest400 => "Bad Request",
            HttpStatus::NotFound404 => "Not Found",
            HttpStatus::RequestEntityTooLarge413 => "Request Entity Too Large",
            HttpStatus::InternalServerError500 => "Internal Server Error",
            HttpStatus::ServiceUnavailable503 => "Service Unavailable",
        }
    }

    /// The `HTTP/1.1 <code> <reason>` status line, without a trailing CRLF.
    pub fn status_line(self) -> String {
        format!("HTTP/1.1 {} {}", self.code(), self.reason())
    }
}

/// Fully parsed request header block.
#[derive(Debug, Default)]
pub struct RequestHeader {
    /// `true` once the blank line terminating the header block has been seen.
    pub is_complete: bool,

    pub method: Option<Method>,
    /// Full request target, percent-decoded, including any query string.
    pub uri_and_params: String,
    /// Path portion only, percent-decoded.
    pub url: String,
    /// Raw (not decoded) query string, if present.
    pub params: String,
    pub version_str: String,

    /// All header name/value pairs in arrival order, capped at
    /// [`MAX_WEB_HEADERS`].
    pub name_values: Vec<(String, String)>,

    pub host: String,
    pub content_type: String,
    pub content_length: u32,
    pub is_multipart: bool,
    pub multipart_boundary: String,
    pub authorization: String,
    pub is_digest: bool,

    /// Set when an `Expect: 100-continue` header was seen; the caller must
    /// send the interim response before the body is read.
    pub is_continue: bool,

    pub conn_type: ConnType,
    pub websocket_key: String,
    pub websocket_version: String,
}

impl RequestHeader {
    pub fn new() -> Self {
        RequestHeader {
            conn_type: ConnType::Http,
            ..Default::default()
        }
    }

    /// Feed the full not-yet-consumed buffer and re-parse it with
    /// `httparse::Request`. Returns the number of bytes that were the
    /// header block (0 while still [`Status::Partial`]); the caller
    /// retains the rest (trailing body bytes, or the same bytes again if
    /// still incomplete) and re-feeds it alongside anything newly read.
    ///
    /// Returns `Err(())` on a malformed request or too many header lines.
    pub fn handle_data(&mut self, data: &[u8]) -> Result<usize, ()> {
        let mut headers = [httparse::EMPTY_HEADER; HTTPARSE_MAX_HEADERS];
        let mut request = httparse::Request::new(&mut headers);
        match request.parse(data) {
            Err(_) => Err(()),
            Ok(Status::Partial) => Ok(0),
            Ok(Status::Complete(consumed)) => {
                self.apply_request_line(&request)?;
                for h in request.headers.iter() {
                    self.apply_header(h.name, &String::from_utf8_lossy(h.value));
                }
                debug!("end of request headers, conn_type={:?}", self.conn_type);
                self.is_complete = true;
                Ok(consumed)
            }
        }
    }

    fn apply_request_line(&mut self, request: &httparse::Request<'_, '_>) -> Result<(), ()> {
        let method_str = request.method.ok_or(())?;
        self.method = Some(Method::from_str(method_str).ok_or(())?);

        let raw_uri = request.path.ok_or(())?;
        self.uri_and_params = decode_url(raw_uri);
        self.version_str = format!("HTTP/1.{}", request.version.unwrap_or(1));

        match self.uri_and_params.find('?') {
            Some(p) if p > 0 => {
                self.url = self.uri_and_params[..p].to_string();
                self.params = self.uri_and_params[p + 1..].to_string();
            }
            _ => {
                self.url = self.uri_and_params.clone();
                self.params.clear();
            }
        }
        trace!("request line method={:?} url={}", self.method, self.url);
        Ok(())
    }

    fn apply_header(&mut self, name: &str, val: &str) {
        if self.name_values.len() < MAX_WEB_HEADERS {
            self.name_values.push((name.to_string(), val.to_string()));
        }

        if name.eq_ignore_ascii_case("Host") {
            self.host = val.to_string();
        } else if name.eq_ignore_ascii_case("Content-Type") {
            let base = val.split(';').next().unwrap_or("").to_string();
            self.content_type = base;
            if val.to_ascii_lowercase().starts_with("multipart/") {
                if let Some(eq) = val.find('=') {
                    self.multipart_boundary = val[eq + 1..].replace('"', "");
                    self.is_multipart = true;
                }
            }
        } else if name.eq_ignore_ascii_case("Content-Length") {
            self.content_length = val.trim().parse().unwrap_or(0);
        } else if name.eq_ignore_ascii_case("Expect") && val.eq_ignore_ascii_case("100-continue") {
            self.is_continue = true;
        } else if name.eq_ignore_ascii_case("Authorization") {
            if val.len() > 5 && val[..5].eq_ignore_ascii_case("Basic") {
                self.authorization = val[6..].to_string();
            } else if val.len() > 6 && val[..6].eq_ignore_ascii_case("Digest") {
                self.is_digest = true;
                self.authorization = val[7..].to_string();
            }
        } else if name.eq_ignore_ascii_case("Upgrade") && val.eq_ignore_ascii_case("websocket") {
            self.conn_type = ConnType::WebSocket;
        } else if name.eq_ignore_ascii_case("Accept") {
            if val.to_ascii_lowercase().contains("text/event-stream") {
                self.conn_type = ConnType::ServerSentEvents;
            }
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Key") {
            self.websocket_key = val.to_string();
        } else if name.eq_ignore_ascii_case("Sec-WebSocket-Version") {
            self.websocket_version = val.to_string();
        }
    }
}

/// Percent-decodes a URL component, also mapping `+` to space (matches
/// `RdWebConnection::decodeURL`).
fn decode_url(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hi = hex_val(bytes[i + 1]);
                let lo = hex_val(bytes[i + 2]);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as char);
                        i += 3;
                    }
                    _ => {
                        out.push('%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(' ');
                i += 1;
            }
            b => {
                // SAFETY-free path: push raw byte, relying on the input
                // being ASCII-safe for percent-encoded paths in practice.
                out.push(b as char);
                i += 1;
            }
        }
    }
    out
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_get() {
        let mut h = RequestHeader::new();
        let req = b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let n = h.handle_data(req).unwrap();
        assert!(h.is_complete);
        assert_eq!(n, req.len());
        assert_eq!(h.method, Some(Method::Get));
        assert_eq!(h.url, "/index.html");
        assert_eq!(h.host, "example.com");
    }

    #[test]
    fn parses_across_two_chunks() {
        let mut h = RequestHeader::new();
        let mut buf = b"GET /a HTTP/1.1\r\nHost: ex".to_vec();
        let n1 = h.handle_data(&buf).unwrap();
        assert!(!h.is_complete);
        assert_eq!(n1, 0, "partial parse reports nothing consumed yet");
        buf.extend_from_slice(b"ample.com\r\n\r\n");
        let n2 = h.handle_data(&buf).unwrap();
        assert!(h.is_complete);
        assert_eq!(n2, buf.len());
        assert_eq!(h.host, "example.com");
    }

    #[test]
    fn detects_websocket_upgrade() {
        let mut h = RequestHeader::new();
        let req = b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
        h.handle_data(req).unwrap();
        assert_eq!(h.conn_type, ConnType::WebSocket);
        assert_eq!(h.websocket_key, "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn detects_sse_accept() {
        let mut h = RequestHeader::new();
        let req = b"GET /events HTTP/1.1\r\nAccept: text/event-stream\r\n\r\n";
        h.handle_data(req).unwrap();
        assert_eq!(h.conn_type, ConnType::ServerSentEvents);
    }

    #[test]
    fn parses_multipart_boundary() {
        let mut h = RequestHeader::new();
        let req = b"POST /upload HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=\"----abc123\"\r\n\r\n";
        h.handle_data(req).unwrap();
        assert!(h.is_multipart);
        assert_eq!(h.multipart_boundary, "----abc123");
    }

    #[test]
    fn decodes_percent_and_plus() {
        assert_eq!(decode_url("a%20b+c"), "a b c");
        assert_eq!(decode_url("100%25"), "100%");
    }

    #[test]
    fn rejects_unknown_method() {
        let mut h = RequestHeader::new();
        assert!(h.handle_data(b"FOO / HTTP/1.1\r\n\r\n").is_err());
    }

    #[test]
    fn caps_name_values_at_max() {
        let mut h = RequestHeader::new();
        let mut req = String::from("GET / HTTP/1.1\r\n");
        for i in 0..30 {
            req.push_str(&format!("X-Test-{i}: v\r\n"));
        }
        req.push_str("\r\n");
        h.handle_data(req.as_bytes()).unwrap();
        assert_eq!(h.name_values.len(), MAX_WEB_HEADERS);
    }
}
