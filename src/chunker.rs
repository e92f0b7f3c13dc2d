//! Chunked file reader used by the File responder.
//!
//! Grounded on `FileSystemChunker` — opens a file once, then hands back
//! fixed-size chunks on successive calls, tracking end-of-file itself
//! rather than requiring the caller to know the file size up front.

use std::fs::File;
use std::io::{self, Read};

pub struct FileChunker {
    file: Option<File>,
    file_len: u64,
}

impl FileChunker {
    pub fn new() -> Self {
        FileChunker {
            file: None,
            file_len: 0,
        }
    }

    /// Opens `path` for chunked reading. Returns `Ok(false)` (not an
    /// error) if the file does not exist or can't be opened, matching
    /// the original's bool-return style.
    pub fn start(&mut self, path: &str) -> io::Result<bool> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };
        self.file_len = file.metadata()?.len();
        self.file = Some(file);
        Ok(true)
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Reads the next chunk into `buf`. Returns `(bytes_read, is_final)`.
    pub fn next_read(&mut self, buf: &mut [u8]) -> io::Result<(usize, bool)> {
        let Some(file) = self.file.as_mut() else {
            return Ok((0, true));
        };
        let mut total = 0;
        while total < buf.len() {
            match file.read(&mut buf[total..])? {
                0 => break,
                n => total += n,
            }
        }
        // Peek for EOF without consuming: a short read below buf.len()
        // already tells us the file is done in the common case; for an
        // exact multiple we detect EOF on the next call returning 0.
        let is_final = total < buf.len();
        Ok((total, is_final))
    }
}

impl Default for FileChunker {
    fn default() -> Self {
        Self::new()
    }
}
