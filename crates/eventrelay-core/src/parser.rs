//! Incremental parser for the `text/event-stream` wire format.
//!
//! Bytes arrive in arbitrary chunks; [`LineBuffer`] turns them into lines and
//! [`FrameParser`] folds lines into [`Frame`]s:
//!
//! ```text
//! id: 42
//! event: job.level_up
//! data: {"job_key":"miner"}
//! <blank line>
//! ```

use crate::error::StreamError;
use crate::event::Frame;

/// Splits a byte stream into lines, bounding the size of any single line.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_bytes: usize,
}

impl LineBuffer {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes,
        }
    }

    /// Append a chunk and return every line it completed.
    ///
    /// Lines end at `\n`; a trailing `\r` is stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, StreamError> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            rest = &tail[1..];

            self.pending.extend_from_slice(head);
            if self.pending.last() == Some(&b'\r') {
                self.pending.pop();
            }
            if self.pending.len() > self.max_line_bytes {
                return Err(StreamError::LineTooLong { limit: self.max_line_bytes });
            }
            lines.push(String::from_utf8_lossy(&self.pending).into_owned());
            self.pending.clear();
        }

        self.pending.extend_from_slice(rest);
        // A trailing `\r` may still be the first half of a CRLF.
        let content = match self.pending.last() {
            Some(b'\r') => self.pending.len() - 1,
            _ => self.pending.len(),
        };
        if content > self.max_line_bytes {
            return Err(StreamError::LineTooLong { limit: self.max_line_bytes });
        }
        Ok(lines)
    }

    /// `true` if bytes of an unterminated line are buffered.
    pub fn has_remainder(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Accumulates `field: value` lines until a blank line completes a frame.
#[derive(Debug, Default)]
pub struct FrameParser {
    id: Option<String>,
    event: Option<String>,
    data: Option<String>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator).
    ///
    /// Returns a frame when `line` is blank and a non-empty `data` field was
    /// accumulated; frames without data (e.g. bare keepalives) are dropped.
    pub fn feed(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            let id = self.id.take();
            let event = self.event.take();
            let data = self.data.take().filter(|d| !d.is_empty())?;
            return Some(Frame { id, event, data });
        }

        // Comment line.
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "id" => self.id = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "data" => match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            _ => {}
        }
        None
    }

    /// `true` if fields were accumulated but no terminating blank line has arrived.
    pub fn has_partial(&self) -> bool {
        self.id.is_some() || self.event.is_some() || self.data.is_some()
    }

    /// Drop any accumulated fields (used when a connection is abandoned).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
