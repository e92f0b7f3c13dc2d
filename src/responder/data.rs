//! Static in-memory blob responder (§4.7 **Data**).

use super::Responder;

pub struct DataResponder {
    data: Vec<u8>,
    content_type: String,
    pos: usize,
    active: bool,
}

impl DataResponder {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        DataResponder {
            data,
            content_type: content_type.into(),
            pos: 0,
            active: true,
        }
    }
}

impl Responder for DataResponder {
    fn is_active(&self) -> bool {
        self.active
    }

    fn start_responding(&mut self) -> bool {
        self.active = true;
        true
    }

    fn next_response_chunk(&mut self, buf: &mut [u8]) -> usize {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        if self.pos >= self.data.len() {
            self.active = false;
        }
        n
    }

    fn content_type(&self) -> Option<&str> {
        Some(&self.content_type)
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_full_body_then_deactivates() {
        let mut r = DataResponder::new(b"hello world".to_vec(), "text/plain");
        assert!(r.start_responding());
        let mut buf = [0u8; 5];
        let n1 = r.next_response_chunk(&mut buf);
        assert_eq!(&buf[..n1], b"hello");
        assert!(r.is_active());
        let mut rest = vec![0u8; 32];
        let n2 = r.next_response_chunk(&mut rest);
        assert_eq!(&rest[..n2], b" world");
        assert!(!r.is_active());
    }

    #[test]
    fn empty_body_is_still_active_until_first_chunk() {
        let mut r = DataResponder::new(Vec::new(), "text/plain");
        assert!(r.start_responding());
        let mut buf = [0u8; 8];
        let n = r.next_response_chunk(&mut buf);
        assert_eq!(n, 0);
        assert!(!r.is_active());
    }
}
