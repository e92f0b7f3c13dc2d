//! Streaming `multipart/form-data` boundary parser (§4.6).
//!
//! Grounded on `RdWebMultipart`: a byte-at-a-time state machine so a
//! boundary split across two read calls is still recognized, with a
//! Boyer-Moore-style "is this byte possibly part of the boundary"
//! lookup table used to fast-forward through part bodies.

use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    StartBoundary,
    HeaderFieldStart,
    HeaderField,
    HeaderValueStart,
    HeaderValue,
    HeaderValueGot,
    HeadersAwaitFinalLf,
    PartData,
    BoundaryEndCheck,
    BoundaryEndDash,
    BoundaryCrSeen,
    End,
}

/// Per-part metadata recovered from its `Content-Disposition`/`Content-Type`
/// header lines.
#[derive(Debug, Default, Clone)]
pub struct PartInfo {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub content_disposition: String,
}

/// Event stream a caller may observe; most callers only need `on_data`.
#[derive(Debug)]
pub enum MultipartEvent<'a> {
    PartBegin,
    HeaderNameValue(&'a str, &'a str),
    AllHeadersEnd,
    PartEnd,
    End,
}

const CR: u8 = 13;
const LF: u8 = 10;
const HYPHEN: u8 = 45;
const COLON: u8 = 58;

pub struct MultipartParser {
    // Matched at the very start of the body: no leading CRLF.
    first_boundary: Vec<u8>,
    // Matched between/after parts: the CRLF that ends the previous part's
    // data is itself part of the delimiter, not part of the content.
    part_boundary: Vec<u8>,
    boundary_char: [bool; 256],
    state: State,
    boundary_idx: usize,
    header_field: Vec<u8>,
    header_value: Vec<u8>,
    current: PartInfo,
    content_pos: u64,
    // Raw bytes of the current part body not yet confirmed clear of the
    // boundary (held back in case they are its prefix).
    holdback: Vec<u8>,
}

impl MultipartParser {
    pub fn new(boundary: &str) -> Self {
        let first_boundary = format!("--{boundary}").into_bytes();
        let part_boundary = format!("\r\n--{boundary}").into_bytes();
        let mut boundary_char = [false; 256];
        for &b in &part_boundary {
            boundary_char[b as usize] = true;
        }
        MultipartParser {
            first_boundary,
            part_boundary,
            boundary_char,
            state: State::Start,
            boundary_idx: 0,
            header_field: Vec::new(),
            header_value: Vec::new(),
            current: PartInfo::default(),
            content_pos: 0,
            holdback: Vec::new(),
        }
    }

    fn is_boundary_char(&self, c: u8) -> bool {
        self.boundary_char[c as usize]
    }

    /// Feeds received bytes, calling `on_data(bytes, &part, content_pos,
    /// is_final_part)` for each slice of confirmed (non-boundary) part
    /// body data.
    pub fn handle_data(&mut self, data: &[u8], mut on_data: impl FnMut(&[u8], &PartInfo, u64, bool)) {
        let mut i = 0usize;
        while i < data.len() {
            let c = data[i];
            match self.state {
                State::Start | State::StartBoundary => {
                    self.state = State::StartBoundary;
                    if c == self.first_boundary[self.boundary_idx] {
                        self.boundary_idx += 1;
                        if self.boundary_idx == self.first_boundary.len() {
                            self.state = State::BoundaryEndCheck;
                            self.current = PartInfo::default();
                            trace!("multipart part begin");
                        }
                    } else {
                        // Not a boundary prefix match: treat leniently by
                        // resetting and re-scanning from here.
                        self.boundary_idx = 0;
                    }
                }
                State::HeaderFieldStart => {
                    if c == CR {
                        self.state = State::HeadersAwaitFinalLf;
                    } else {
                        self.header_field.clear();
                        self.header_field.push(c);
                        self.state = State::HeaderField;
                    }
                }
                State::HeaderField => {
                    if c == COLON {
                        self.state = State::HeaderValueStart;
                    } else {
                        self.header_field.push(c);
                    }
                }
                State::HeaderValueStart => {
                    if c != b' ' {
                        self.header_value.clear();
                        self.header_value.push(c);
                        self.state = State::HeaderValue;
                    }
                }
                State::HeaderValue => {
                    if c == CR {
                        self.state = State::HeaderValueGot;
                        self.apply_header();
                    } else {
                        self.header_value.push(c);
                    }
                }
                State::HeaderValueGot => {
                    if c == LF {
                        self.state = State::HeaderFieldStart;
                    }
                }
                State::HeadersAwaitFinalLf => {
                    if c == LF {
                        self.state = State::PartData;
                        self.content_pos = 0;
                        self.boundary_idx = 0;
                        self.holdback.clear();
                    }
                }
                State::PartData => {
                    if self.is_boundary_char(c) {
                        self.holdback.push(c);
                        if self.holdback.len() >= self.part_boundary.len()
                            && self.holdback[self.holdback.len() - self.part_boundary.len()..]
                                == self.part_boundary[..]
                        {
                            // Flush everything before the boundary match as data.
                            let body_len = self.holdback.len() - self.part_boundary.len();
                            if body_len > 0 {
                                on_data(&self.holdback[..body_len], &self.current, self.content_pos, false);
                                self.content_pos += body_len as u64;
                            }
                            on_data(&[], &self.current, self.content_pos, true);
                            trace!("multipart part end");
                            self.holdback.clear();
                            self.state = State::BoundaryEndCheck;
                        }
                    } else {
                        if !self.holdback.is_empty() {
                            on_data(&self.holdback, &self.current, self.content_pos, false);
                            self.content_pos += self.holdback.len() as u64;
                            self.holdback.clear();
                        }
                        on_data(&[c], &self.current, self.content_pos, false);
                        self.content_pos += 1;
                    }
                }
                State::BoundaryEndCheck => {
                    if c == HYPHEN {
                        self.state = State::BoundaryEndDash;
                    } else if c == CR {
                        self.state = State::BoundaryCrSeen;
                    } else {
                        // Lenient: no CRLF between boundary and headers.
                        self.header_field.clear();
                        self.header_field.push(c);
                        self.state = State::HeaderField;
                    }
                }
                State::BoundaryCrSeen => {
                    // Consumes the LF terminating the boundary line, then
                    // starts parsing this part's header block.
                    self.state = State::HeaderFieldStart;
                }
                State::BoundaryEndDash => {
                    if c == HYPHEN {
                        self.state = State::End;
                        trace!("multipart end");
                    } else {
                        self.state = State::HeaderFieldStart;
                    }
                }
                State::End => {}
            }
            i += 1;
        }
    }

    fn apply_header(&mut self) {
        let name = String::from_utf8_lossy(&self.header_field).to_string();
        let value = String::from_utf8_lossy(&self.header_value).to_string();
        if name.eq_ignore_ascii_case("Content-Disposition") {
            self.current.content_disposition = value.clone();
            for part in value.split(';').map(str::trim) {
                if let Some(v) = part.strip_prefix("name=") {
                    self.current.name = v.trim_matches('"').to_string();
                } else if let Some(v) = part.strip_prefix("filename=") {
                    self.current.filename = v.trim_matches('"').to_string();
                }
            }
        } else if name.eq_ignore_ascii_case("Content-Type") {
            self.current.content_type = value;
        }
    }

    pub fn finish(&mut self) {
        self.state = State::End;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_field_part() {
        let body = b"--BOUNDARY\r\nContent-Disposition: form-data; name=\"field1\"\r\n\r\nvalue1\r\n--BOUNDARY--\r\n";
        let mut p = MultipartParser::new("BOUNDARY");
        let mut collected = Vec::new();
        p.handle_data(body, |bytes, info, _pos, is_final| {
            if !bytes.is_empty() {
                collected.extend_from_slice(bytes);
            }
            if is_final {
                assert_eq!(info.name, "field1");
            }
        });
        assert_eq!(collected, b"value1");
    }

    #[test]
    fn parses_file_part_with_filename_and_content_type() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"a.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n\x01\x02\x03--B--\r\n";
        let mut p = MultipartParser::new("B");
        let mut data = Vec::new();
        let mut seen_filename = String::new();
        p.handle_data(body, |bytes, info, _pos, _final| {
            data.extend_from_slice(bytes);
            seen_filename = info.filename.clone();
        });
        assert_eq!(seen_filename, "a.bin");
        assert_eq!(data, vec![1, 2, 3]);
    }
}
