//! REST API responder (§4.7 **RestAPI**).
//!
//! Grounded on `RdWebResponderRestAPI`: buffers the request body (or, for
//! `multipart/form-data`, streams it through [`crate::multipart::MultipartParser`]
//! to an upload callback) until the declared `Content-Length` is reached,
//! then invokes the endpoint handler exactly once and serves its response
//! string back out a chunk at a time.

use log::warn;

use super::Responder;
use crate::multipart::MultipartParser;

/// Single REST endpoint invocation: method + decoded URL, raw body (non
/// multipart requests), and the sink for accumulated body bytes.
pub type ApiHandlerFn = Box<dyn FnMut(&str, &str, &[u8]) -> String + Send>;
/// Per-chunk body callback for non-multipart requests, mirroring the
/// original's streaming `callbackBody(reqStr, pBuf, dataLen, index, total)`:
/// called once per `handle_data` call with this chunk's bytes, `pos = 0`
/// and `total` equal to this chunk's length (the original does not track
/// cumulative stream position here either, only per-chunk length).
pub type BodyChunkFn = Box<dyn FnMut(&str, &[u8], u64, u64) + Send>;
pub type UploadChunkFn = Box<dyn FnMut(&str, &[u8], u64, bool) + Send>;

pub struct RestApiResponder {
    method: String,
    url: String,
    is_multipart: bool,
    multipart: Option<MultipartParser>,
    body: Vec<u8>,
    content_length: u32,
    bytes_received: u32,
    handler: ApiHandlerFn,
    body_fn: Option<BodyChunkFn>,
    upload: Option<UploadChunkFn>,
    response: Vec<u8>,
    response_pos: usize,
    handler_called: bool,
    active: bool,
}

impl RestApiResponder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        content_length: u32,
        multipart_boundary: Option<&str>,
        handler: ApiHandlerFn,
        body_fn: Option<BodyChunkFn>,
        upload: Option<UploadChunkFn>,
    ) -> Self {
        RestApiResponder {
            method: method.into(),
            url: url.into(),
            is_multipart: multipart_boundary.is_some(),
            multipart: multipart_boundary.map(MultipartParser::new),
            body: Vec::new(),
            content_length,
            bytes_received: 0,
            handler,
            body_fn,
            upload,
            response: Vec::new(),
            response_pos: 0,
            handler_called: false,
            active: true,
        }
    }

    fn maybe_invoke_handler(&mut self) {
        if self.handler_called {
            return;
        }
        if self.bytes_received < self.content_length {
            return;
        }
        self.handler_called = true;
        self.response = (self.handler)(&self.method, &self.url, &self.body).into_bytes();
    }
}

impl Responder for RestApiResponder {
    fn is_active(&self) -> bool {
        self.active
    }

    fn start_responding(&mut self) -> bool {
        self.active = true;
        // A zero-length body (GET, or POST with no payload) invokes the
        // handler immediately rather than waiting for handle_data.
        self.maybe_invoke_handler();
        true
    }

    fn handle_data(&mut self, buf: &[u8]) -> bool {
        self.bytes_received = self.bytes_received.saturating_add(buf.len() as u32);

        if self.is_multipart {
            let Some(parser) = self.multipart.as_mut() else {
                warn!("multipart request with no boundary parser, dropping body");
                return false;
            };
            let upload = match self.upload.as_mut() {
                Some(cb) => cb,
                None => {
                    warn!("multipart upload received with no upload handler registered");
                    return false;
                }
            };
            parser.handle_data(buf, |bytes, info, pos, is_final| {
                upload(&info.filename, bytes, pos, is_final);
            });
        } else {
            if let Some(cb) = self.body_fn.as_mut() {
                cb(&self.url, buf, 0, buf.len() as u64);
            }
            self.body.extend_from_slice(buf);
        }

        self.maybe_invoke_handler();
        true
    }

    fn next_response_chunk(&mut self, buf: &mut [u8]) -> usize {
        if !self.handler_called {
            return 0;
        }
        let remaining = &self.response[self.response_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.response_pos += n;
        if self.response_pos >= self.response.len() {
            self.active = false;
        }
        n
    }

    fn content_type(&self) -> Option<&str> {
        Some("text/json")
    }

    fn content_length(&self) -> Option<u64> {
        if self.handler_called {
            Some(self.response.len() as u64)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_with_no_body_invokes_handler_immediately() {
        let handler: ApiHandlerFn = Box::new(|method, url, _body| {
            format!("{{\"method\":\"{method}\",\"url\":\"{url}\"}}")
        });
        let mut r = RestApiResponder::new("GET", "/api/status", 0, None, handler, None, None);
        assert!(r.start_responding());
        let mut buf = vec![0u8; 128];
        let n = r.next_response_chunk(&mut buf);
        assert_eq!(&buf[..n], b"{\"method\":\"GET\",\"url\":\"/api/status\"}");
        assert!(!r.is_active());
    }

    #[test]
    fn post_waits_for_full_body_before_invoking_handler() {
        let handler: ApiHandlerFn = Box::new(|_m, _u, body| {
            String::from_utf8_lossy(body).to_uppercase()
        });
        let mut r = RestApiResponder::new("POST", "/api/echo", 5, None, handler, None, None);
        r.start_responding();
        assert!(r.handle_data(b"he"));
        let mut buf = vec![0u8; 16];
        assert_eq!(r.next_response_chunk(&mut buf), 0, "handler must not fire before full body");
        assert!(r.handle_data(b"llo"));
        let n = r.next_response_chunk(&mut buf);
        assert_eq!(&buf[..n], b"HELLO");
    }

    #[test]
    fn body_fn_fires_per_chunk_with_pos_zero_and_chunk_length() {
        let handler: ApiHandlerFn = Box::new(|_m, _u, body| String::from_utf8_lossy(body).to_string());
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let body_fn: BodyChunkFn = Box::new(move |url, bytes, pos, total| {
            seen_cb.lock().unwrap().push((url.to_string(), bytes.to_vec(), pos, total));
        });
        let mut r = RestApiResponder::new("POST", "/api/echo", 5, None, handler, Some(body_fn), None);
        r.start_responding();
        r.handle_data(b"he");
        r.handle_data(b"llo");

        let calls = seen.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("/api/echo".to_string(), b"he".to_vec(), 0, 2));
        assert_eq!(calls[1], ("/api/echo".to_string(), b"llo".to_vec(), 0, 3));
    }

    #[test]
    fn multipart_body_streams_to_upload_callback() {
        let handler: ApiHandlerFn = Box::new(|_m, _u, _b| "{}".to_string());
        let received = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let received_cb = received.clone();
        let upload: UploadChunkFn = Box::new(move |_name, bytes, _pos, _final| {
            received_cb.lock().unwrap().extend_from_slice(bytes);
        });
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"x.bin\"\r\n\r\nabc\r\n--B--\r\n";
        let mut r = RestApiResponder::new("POST", "/api/upload", body.len() as u32, Some("B"), handler, None, Some(upload));
        r.start_responding();
        r.handle_data(body);
        assert_eq!(&received.lock().unwrap()[..], b"abc");
    }
}
