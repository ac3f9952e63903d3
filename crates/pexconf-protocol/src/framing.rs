//! Event-stream framing.
//!
//! The node pushes conference events over a long-lived `text/event-stream`
//! response. Each record is a group of `field: value` lines terminated by a
//! blank line:
//!
//! ```text
//! id: 42
//! event: message_received
//! data: {"origin":"Alice","uuid":"...","payload":"hi"}
//!
//! ```
//!
//! Lines may end with `\n`, `\r` or `\r\n`. Lines starting with `:` are
//! comments. Repeated `data:` lines are joined with `\n`.

use crate::MAX_LINE_LENGTH;
use crate::error::{ProtocolError, ProtocolResult};

/// One raw record read from the event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEvent {
    /// Event id, used as `Last-Event-ID` when reconnecting.
    pub id: Option<String>,
    /// Event name (the `event:` field).
    pub name: Option<String>,
    /// Event payload, usually JSON.
    pub data: Option<String>,
    /// Reconnect delay advertised by the server, in milliseconds.
    pub retry: Option<u64>,
}

impl StreamEvent {
    /// Creates an event with a name and payload.
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Builder method to set the event id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.data.is_none() && self.retry.is_none()
    }
}

/// Incremental event-stream parser.
///
/// Feed it arbitrary byte chunks as they arrive; it returns every record
/// completed by that chunk. Partial lines and records are kept until the
/// next chunk.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    line: Vec<u8>,
    pending: StreamEvent,
    skip_lf: bool,
}

impl EventStreamParser {
    /// Creates an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes a chunk of bytes and returns the records it completed.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::LineTooLong`] if a line grows beyond
    /// [`MAX_LINE_LENGTH`]. The parser is reset in that case.
    pub fn push(&mut self, chunk: &[u8]) -> ProtocolResult<Vec<StreamEvent>> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.end_line(&mut events);
                    self.skip_lf = true;
                }
                _ => {
                    if self.line.len() >= MAX_LINE_LENGTH {
                        let size = self.line.len() + 1;
                        self.reset();
                        return Err(ProtocolError::LineTooLong {
                            size,
                            max: MAX_LINE_LENGTH,
                        });
                    }
                    self.line.push(byte);
                }
            }
        }

        Ok(events)
    }

    /// Drops any partially received line or record.
    ///
    /// Called when the underlying connection is replaced, so a truncated
    /// record is never merged with data from the next connection.
    pub fn reset(&mut self) {
        self.line.clear();
        self.pending = StreamEvent::default();
        self.skip_lf = false;
    }

    fn end_line(&mut self, events: &mut Vec<StreamEvent>) {
        if self.line.is_empty() {
            let record = std::mem::take(&mut self.pending);
            if !record.is_empty() {
                events.push(record);
            }
            return;
        }

        let line = std::mem::take(&mut self.line);
        let line = String::from_utf8_lossy(&line);
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };

        match field {
            "id" => self.pending.id = Some(value.to_string()),
            "event" => self.pending.name = Some(value.to_string()),
            "data" => match self.pending.data {
                Some(ref mut data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.pending.data = Some(value.to_string()),
            },
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    self.pending.retry = value.parse().ok();
                }
            }
            _ => {}
        }
    }
}
