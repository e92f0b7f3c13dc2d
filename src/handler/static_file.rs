//! Static filesystem handler (§4.8 **StaticFile**).
//!
//! Grounded on `RdWebHandlerStaticFiles`: resolves a request URL under a
//! base folder and serves whatever exists there via [`FileResponder`],
//! falling back to a default path (e.g. `index.html`) at the base URI.

use std::path::Path;

use crate::header::{ConnType, Method, RequestHeader};
use crate::responder::{FileResponder, Responder};

use super::{Handler, HandlerOutcome};

pub struct StaticFileHandler {
    base_uri: String,
    base_folder: String,
    default_path: String,
}

impl StaticFileHandler {
    pub fn new(base_uri: impl Into<String>, base_folder: impl Into<String>, default_path: impl Into<String>) -> Self {
        StaticFileHandler {
            base_uri: base_uri.into(),
            base_folder: base_folder.into(),
            default_path: default_path.into(),
        }
    }

    fn resolve(&self, url: &str) -> Option<String> {
        if !url.starts_with(&self.base_uri) {
            return None;
        }
        let suffix = &url[self.base_uri.len()..];
        let relative = if suffix.is_empty() || suffix == "/" {
            self.default_path.clone()
        } else {
            suffix.trim_start_matches('/').to_string()
        };
        Some(format!("{}/{}", self.base_folder.trim_end_matches('/'), relative))
    }
}

impl Handler for StaticFileHandler {
    fn name(&self) -> &str {
        "StaticFile"
    }

    fn is_file_handler(&self) -> bool {
        true
    }

    fn try_build_responder(&mut self, header: &RequestHeader) -> HandlerOutcome {
        if header.method != Some(Method::Get) || header.conn_type != ConnType::Http {
            return HandlerOutcome::NoMatch;
        }
        let Some(path) = self.resolve(&header.url) else {
            return HandlerOutcome::NoMatch;
        };
        if !Path::new(&path).exists() {
            return HandlerOutcome::NoMatch;
        }
        HandlerOutcome::Responder(Box::new(FileResponder::new(path)))
    }
}
