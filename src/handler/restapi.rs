//! REST API handler (§4.8 **RestAPI**).
//!
//! Grounded on `RdWebHandlerRestAPI`: owns a registered endpoint table
//! keyed on (method, path-suffix-after-prefix) and delegates the actual
//! business logic to caller-supplied closures, shared across requests
//! via `Arc` since each request gets its own [`RestApiResponder`].

use std::sync::Arc;

use crate::header::RequestHeader;
use crate::responder::restapi::{ApiHandlerFn, BodyChunkFn, RestApiResponder, UploadChunkFn};
use crate::responder::Responder;

use super::{Handler, HandlerOutcome};

type EndpointFn = Arc<dyn Fn(&str, &str, &[u8]) -> String + Send + Sync>;
type EndpointBodyFn = Arc<dyn Fn(&str, &[u8], u64, u64) + Send + Sync>;
type EndpointUploadFn = Arc<dyn Fn(&str, &[u8], u64, bool) + Send + Sync>;

struct Endpoint {
    method: &'static str,
    path: String,
    handler: EndpointFn,
    body: Option<EndpointBodyFn>,
    upload: Option<EndpointUploadFn>,
}

pub struct RestApiHandler {
    rest_prefix: String,
    endpoints: Vec<Endpoint>,
}

impl RestApiHandler {
    pub fn new(rest_prefix: impl Into<String>) -> Self {
        RestApiHandler {
            rest_prefix: rest_prefix.into(),
            endpoints: Vec::new(),
        }
    }

    /// Registers an endpoint. `path` is matched against the URL with the
    /// `/<rest_prefix>` prefix already stripped. `body` is called once per
    /// `handle_data` chunk for non-multipart requests; `upload` streams
    /// `multipart/form-data` parts instead.
    pub fn add_endpoint(
        &mut self,
        method: &'static str,
        path: impl Into<String>,
        handler: impl Fn(&str, &str, &[u8]) -> String + Send + Sync + 'static,
        body: Option<Arc<dyn Fn(&str, &[u8], u64, u64) + Send + Sync>>,
        upload: Option<Arc<dyn Fn(&str, &[u8], u64, bool) + Send + Sync>>,
    ) {
        self.endpoints.push(Endpoint {
            method,
            path: path.into(),
            handler: Arc::new(handler),
            body,
            upload,
        });
    }

    fn strip_prefix<'a>(&self, url: &'a str) -> Option<&'a str> {
        let prefix = format!("/{}", self.rest_prefix);
        url.strip_prefix(&prefix)
    }
}

impl Handler for RestApiHandler {
    fn name(&self) -> &str {
        "RestAPI"
    }

    fn try_build_responder(&mut self, header: &RequestHeader) -> HandlerOutcome {
        let Some(method) = header.method else {
            return HandlerOutcome::NoMatch;
        };
        let Some(stripped) = self.strip_prefix(&header.url) else {
            return HandlerOutcome::NoMatch;
        };
        let Some(endpoint) = self.endpoints.iter().find(|e| e.method == method.as_str() && e.path == stripped) else {
            return HandlerOutcome::NoMatch;
        };

        let handler_fn = endpoint.handler.clone();
        let api_handler: ApiHandlerFn = Box::new(move |m, u, b| handler_fn(m, u, b));
        let body_fn: Option<BodyChunkFn> = endpoint.body.clone().map(|b| -> BodyChunkFn {
            Box::new(move |url, bytes, pos, total| b(url, bytes, pos, total))
        });
        let upload_fn: Option<UploadChunkFn> = endpoint.upload.clone().map(|u| -> UploadChunkFn {
            Box::new(move |name, bytes, pos, is_final| u(name, bytes, pos, is_final))
        });

        let boundary = header.is_multipart.then_some(header.multipart_boundary.as_str());
        HandlerOutcome::Responder(Box::new(RestApiResponder::new(
            method.as_str(),
            header.url.clone(),
            header.content_length,
            boundary,
            api_handler,
            body_fn,
            upload_fn,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_registered_endpoint_and_strips_prefix() {
        let mut h = RestApiHandler::new("api");
        h.add_endpoint("GET", "/status", |_m, _u, _b| "{\"ok\":true}".to_string(), None, None);
        let mut req = RequestHeader::new();
        req.handle_data(b"GET /api/status HTTP/1.1\r\n\r\n").unwrap();
        assert!(matches!(h.try_build_responder(&req), HandlerOutcome::Responder(_)));
    }

    #[test]
    fn no_match_when_path_unregistered() {
        let mut h = RestApiHandler::new("api");
        h.add_endpoint("GET", "/status", |_m, _u, _b| "{}".to_string(), None, None);
        let mut req = RequestHeader::new();
        req.handle_data(b"GET /api/other HTTP/1.1\r\n\r\n").unwrap();
        assert!(matches!(h.try_build_responder(&req), HandlerOutcome::NoMatch));
    }

    #[test]
    fn body_callback_registered_on_endpoint_is_wired_into_responder() {
        let mut h = RestApiHandler::new("api");
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        h.add_endpoint(
            "POST",
            "/echo",
            |_m, _u, _b| "{}".to_string(),
            Some(Arc::new(move |url, bytes, pos, total| {
                seen_cb.lock().unwrap().push((url.to_string(), bytes.to_vec(), pos, total));
            })),
            None,
        );
        let mut req = RequestHeader::new();
        req.handle_data(b"POST /api/echo HTTP/1.1\r\nContent-Length: 3\r\n\r\n").unwrap();
        let outcome = h.try_build_responder(&req);
        let HandlerOutcome::Responder(mut responder) = outcome else {
            panic!("expected a responder");
        };
        responder.start_responding();
        responder.handle_data(b"abc");
        assert_eq!(seen.lock().unwrap()[0], ("/api/echo".to_string(), b"abc".to_vec(), 0, 3));
    }
}
