//! Static in-memory blob handler (§4.8 **StaticData**).
//!
//! Grounded on `RdWebHandlerStaticData`: serves one fixed byte blob
//! (typically a bundled `index.html`) at a single registered URI, plus
//! the site root when no more specific handler matched it.

use crate::header::{ConnType, Method, RequestHeader};
use crate::responder::{DataResponder, Responder};

use super::{Handler, HandlerOutcome};

pub struct StaticDataHandler {
    base_uri: String,
    data: Vec<u8>,
    content_type: String,
    /// Path answered for a bare `/`, independent of `base_uri`
    /// (`RdWebHandlerStaticData::_defaultPath`). A request for `/` also
    /// matches this handler when `default_path` equals `base_uri`, even
    /// if `base_uri` itself isn't `/` — e.g. a handler registered at
    /// `/index.html` can also answer `/`.
    default_path: String,
}

impl StaticDataHandler {
    pub fn new(
        base_uri: impl Into<String>,
        data: Vec<u8>,
        content_type: impl Into<String>,
        default_path: impl Into<String>,
    ) -> Self {
        StaticDataHandler {
            base_uri: base_uri.into(),
            data,
            content_type: content_type.into(),
            default_path: default_path.into(),
        }
    }

    fn matches(&self, header: &RequestHeader) -> bool {
        if header.method != Some(Method::Get) || header.conn_type != ConnType::Http {
            return false;
        }
        header.url == self.base_uri
            || header.url.starts_with(&format!("{}/", self.base_uri))
            || (header.url == "/" && self.base_uri.eq_ignore_ascii_case(&self.default_path))
    }
}

impl Handler for StaticDataHandler {
    fn name(&self) -> &str {
        "StaticData"
    }

    fn try_build_responder(&mut self, header: &RequestHeader) -> HandlerOutcome {
        if !self.matches(header) {
            return HandlerOutcome::NoMatch;
        }
        HandlerOutcome::Responder(Box::new(DataResponder::new(self.data.clone(), self.content_type.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_base_uri_and_root() {
        let h = StaticDataHandler::new("/", b"<html></html>".to_vec(), "text/html", "/");
        let mut req = RequestHeader::new();
        req.handle_data(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(h.matches(&req));
    }

    #[test]
    fn rejects_post() {
        let h = StaticDataHandler::new("/status", b"ok".to_vec(), "text/plain", "/status");
        let mut req = RequestHeader::new();
        req.handle_data(b"POST /status HTTP/1.1\r\n\r\n").unwrap();
        assert!(!h.matches(&req));
    }

    #[test]
    fn root_request_matches_non_root_handler_whose_default_path_is_root() {
        let h = StaticDataHandler::new("/index.html", b"<html></html>".to_vec(), "text/html", "/index.html");
        let mut req = RequestHeader::new();
        req.handle_data(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(h.matches(&req));
    }

    #[test]
    fn root_request_does_not_match_when_default_path_differs() {
        let h = StaticDataHandler::new("/other.html", b"x".to_vec(), "text/html", "/index.html");
        let mut req = RequestHeader::new();
        req.handle_data(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(!h.matches(&req), "default_path must equal base_uri for / to be answered");
    }
}
