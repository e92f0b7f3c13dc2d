//! Static file responder (§4.7 **File**), backed by [`crate::chunker::FileChunker`].

use log::warn;

use super::Responder;
use crate::chunker::FileChunker;

/// Extension → MIME type table, reproduced verbatim from
/// `RdWebResponderFile::getContentType` including its quirks: `.json`
/// maps to `text/json` (not `application/json`) and `.js` maps to
/// `application/javascript`. Not a bug — kept for wire compatibility
/// with clients written against the original server.
fn content_type_for(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    const TABLE: &[(&str, &str)] = &[
        (".html", "text/html"),
        (".htm", "text/html"),
        (".css", "text/css"),
        (".json", "text/json"),
        (".js", "application/javascript"),
        (".png", "image/png"),
        (".gif", "image/gif"),
        (".jpg", "image/jpeg"),
        (".ico", "image/x-icon"),
        (".svg", "image/svg+xml"),
        (".eot", "font/eot"),
        (".woff2", "font/woff2"),
        (".woff", "font/woff"),
        (".ttf", "font/ttf"),
        (".xml", "text/xml"),
        (".pdf", "application/pdf"),
        (".zip", "application/zip"),
        (".gz", "application/x-gzip"),
    ];
    for (ext, mime) in TABLE {
        if lower.ends_with(ext) {
            return mime;
        }
    }
    "text/plain"
}

pub struct FileResponder {
    path: String,
    chunker: FileChunker,
    content_type: &'static str,
    active: bool,
}

impl FileResponder {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let content_type = content_type_for(&path);
        FileResponder {
            path,
            chunker: FileChunker::new(),
            content_type,
            active: false,
        }
    }
}

impl Responder for FileResponder {
    fn is_active(&self) -> bool {
        self.active
    }

    fn start_responding(&mut self) -> bool {
        self.active = match self.chunker.start(&self.path) {
            Ok(opened) => opened,
            Err(e) => {
                warn!("failed to open {}: {e}", self.path);
                false
            }
        };
        self.active
    }

    fn next_response_chunk(&mut self, buf: &mut [u8]) -> usize {
        match self.chunker.next_read(buf) {
            Ok((n, final_chunk)) => {
                if final_chunk {
                    self.active = false;
                }
                n
            }
            Err(e) => {
                warn!("read failed for {}: {e}", self.path);
                self.active = false;
                0
            }
        }
    }

    fn content_type(&self) -> Option<&str> {
        Some(self.content_type)
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.chunker.file_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_table_matches_original_quirks() {
        assert_eq!(content_type_for("a.json"), "text/json");
        assert_eq!(content_type_for("a.js"), "application/javascript");
        assert_eq!(content_type_for("a.html"), "text/html");
        assert_eq!(content_type_for("a.woff2"), "font/woff2");
        assert_eq!(content_type_for("a.unknown"), "text/plain");
    }

    #[test]
    fn missing_file_fails_start_responding_without_error() {
        let mut r = FileResponder::new("/does/not/exist/at/all.html");
        assert!(!r.start_responding());
        assert!(!r.is_active());
    }
}
