//! Incremental splitter for a huge top-level JSON array.
//!
//! The bulk feed is one array of 10^5–10^6 objects, far too large to
//! materialize. [`JsonArrayDecoder`] is fed raw byte chunks as they
//! arrive off the wire and yields one complete element's bytes at a
//! time; the caller parses each element independently so a malformed
//! record can be skipped without losing its siblings.

use crate::error::CatalogError;

/// Streaming decoder for `[ {..}, {..}, ... ]` byte streams.
///
/// Only object elements are supported — the bulk feed is an array of
/// card objects, and anything else is malformed data.
#[derive(Debug, Default)]
pub struct JsonArrayDecoder {
    buf: Vec<u8>,
    /// Scan position within `buf`.
    pos: usize,
    /// Byte offset where the current element started, if inside one.
    element_start: Option<usize>,
    /// Brace/bracket nesting depth within the current element.
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// Seen the opening `[`.
    started: bool,
    /// Seen the closing `]`.
    finished: bool,
}

impl JsonArrayDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly received bytes.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// True once the array's closing `]` has been consumed.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Extract the next complete element, if the buffer holds one.
    ///
    /// Returns `Ok(None)` when more bytes are needed or the array has
    /// ended; feed more and call again.
    pub fn pop_object(&mut self) -> Result<Option<Vec<u8>>, CatalogError> {
        while self.pos < self.buf.len() {
            let b = self.buf[self.pos];

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                }
                self.pos += 1;
                continue;
            }

            match self.element_start {
                None => {
                    match b {
                        b' ' | b'\t' | b'\r' | b'\n' | b',' => {}
                        b'[' if !self.started => self.started = true,
                        b']' if self.started => {
                            self.finished = true;
                            self.pos += 1;
                            return Ok(None);
                        }
                        b'{' if self.started => {
                            self.element_start = Some(self.pos);
                            self.depth = 1;
                        }
                        other => {
                            return Err(CatalogError::Parse(format!(
                                "unexpected byte {:?} at top level of feed array",
                                other as char
                            )));
                        }
                    }
                    self.pos += 1;
                }
                Some(start) => {
                    match b {
                        b'"' => self.in_string = true,
                        b'{' | b'[' => self.depth += 1,
                        b'}' | b']' => {
                            self.depth -= 1;
                            if self.depth == 0 {
                                let end = self.pos + 1;
                                let element = self.buf[start..end].to_vec();
                                self.buf.drain(..end);
                                self.pos = 0;
                                self.element_start = None;
                                return Ok(Some(element));
                            }
                        }
                        _ => {}
                    }
                    self.pos += 1;
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect_all(decoder: &mut JsonArrayDecoder) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(obj) = decoder.pop_object().unwrap() {
            out.push(String::from_utf8(obj).unwrap());
        }
        out
    }

    #[test]
    fn splits_a_whole_array() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(br#"[{"a": 1}, {"b": 2}, {"c": 3}]"#);

        let objects = collect_all(&mut decoder);
        assert_eq!(objects, vec![r#"{"a": 1}"#, r#"{"b": 2}"#, r#"{"c": 3}"#]);
        assert!(decoder.finished());
    }

    #[test]
    fn survives_arbitrary_chunk_boundaries() {
        let data = br#"[ {"name": "Sol Ring", "finishes": ["foil", "nonfoil"]},
                        {"name": "Brainstorm"} ]"#;

        // Feed one byte at a time — the worst possible chunking.
        let mut decoder = JsonArrayDecoder::new();
        let mut objects = Vec::new();
        for byte in data.iter() {
            decoder.feed(&[*byte]);
            while let Some(obj) = decoder.pop_object().unwrap() {
                objects.push(String::from_utf8(obj).unwrap());
            }
        }

        assert_eq!(objects.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&objects[0]).unwrap();
        assert_eq!(first["name"], "Sol Ring");
        assert!(decoder.finished());
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_depth() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(br#"[{"name": "Who/What {Unhinged}", "note": "a\"b]"}]"#);

        let objects = collect_all(&mut decoder);
        assert_eq!(objects.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&objects[0]).unwrap();
        assert_eq!(parsed["name"], "Who/What {Unhinged}");
    }

    #[test]
    fn nested_objects_and_arrays() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(br#"[{"legalities": {"modern": "legal"}, "colors": ["W", "U"]}]"#);

        let objects = collect_all(&mut decoder);
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn empty_array() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(b"[]");
        assert_eq!(decoder.pop_object().unwrap(), None);
        assert!(decoder.finished());
    }

    #[test]
    fn non_object_element_is_an_error() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(b"[42]");
        assert!(decoder.pop_object().is_err());
    }

    #[test]
    fn incomplete_element_waits_for_more_bytes() {
        let mut decoder = JsonArrayDecoder::new();
        decoder.feed(br#"[{"a":"#);
        assert_eq!(decoder.pop_object().unwrap(), None);
        assert!(!decoder.finished());

        decoder.feed(b"1}]");
        assert_eq!(decoder.pop_object().unwrap(), Some(br#"{"a":1}"#.to_vec()));
    }
}
