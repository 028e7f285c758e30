//! Incremental `text/event-stream` parser.
//!
//! Bytes are fed as they arrive from the network; complete events come out.
//! Line endings may be CRLF, LF or CR and may be split across chunks.

use std::time::Duration;

/// Event type delivered to the message handler.
pub const MESSAGE_EVENT: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `message` unless the stream named it otherwise.
    pub event: String,
    pub data: String,
    /// Last event id seen on the stream, carried over from earlier events.
    pub last_event_id: String,
}

#[derive(Debug, Default)]
pub struct EventParser {
    buf: Vec<u8>,
    /// A CR ended the previous chunk; a leading LF in the next one belongs to it.
    pending_cr: bool,
    started: bool,
    event_type: String,
    data: String,
    last_event_id: String,
    retry: Option<Duration>,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a known last event id, e.g. when resuming after a reconnect.
    pub fn with_last_event_id(id: impl Into<String>) -> Self {
        Self {
            last_event_id: id.into(),
            ..Self::default()
        }
    }

    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Reconnection delay most recently requested by the server, taken once.
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    /// Forget partial state from a dropped connection. The last event id is kept.
    pub fn reset_connection(&mut self) {
        self.buf.clear();
        self.pending_cr = false;
        self.started = false;
        self.event_type.clear();
        self.data.clear();
    }

    pub fn feed(&mut self, mut chunk: &[u8]) -> Vec<SseEvent> {
        let mut out = Vec::new();
        if self.pending_cr {
            self.pending_cr = false;
            if let Some(rest) = chunk.strip_prefix(b"\n") {
                chunk = rest;
            }
        }
        if !self.started && !chunk.is_empty() {
            self.buf.extend_from_slice(chunk);
            // The BOM check needs three bytes.
            if self.buf.len() < 3 && b"\xEF\xBB\xBF".starts_with(&self.buf) {
                return out;
            }
            self.started = true;
            if self.buf.starts_with(b"\xEF\xBB\xBF") {
                self.buf.drain(..3);
            }
        } else {
            self.buf.extend_from_slice(chunk);
        }

        let mut start = 0;
        let mut i = 0;
        while i < self.buf.len() {
            match self.buf[i] {
                b'\n' => {
                    let line = String::from_utf8_lossy(&self.buf[start..i]).into_owned();
                    self.process_line(&line, &mut out);
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    let line = String::from_utf8_lossy(&self.buf[start..i]).into_owned();
                    self.process_line(&line, &mut out);
                    if i + 1 == self.buf.len() {
                        self.pending_cr = true;
                        i += 1;
                    } else if self.buf[i + 1] == b'\n' {
                        i += 2;
                    } else {
                        i += 1;
                    }
                    start = i;
                }
                _ => i += 1,
            }
        }
        self.buf.drain(..start);
        out
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.dispatch(out);
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = value.to_string();
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(ms));
                    }
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, out: &mut Vec<SseEvent>) {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        out.push(SseEvent {
            event: if event_type.is_empty() {
                MESSAGE_EVENT.to_string()
            } else {
                event_type
            },
            data,
            last_event_id: self.last_event_id.clone(),
        });
    }
}
