//! SSE (Server-Sent Events) parsing utilities
//!
//! Turns the raw byte chunks of an upstream `text/event-stream` body into
//! discrete events. Chunks may split lines, fields, or even multi-byte UTF-8
//! sequences at arbitrary positions; incomplete data is kept in the parser
//! until the frame that contains it is terminated by a blank line.

/// Literal payload prefix Emohaa uses to mark the end of a turn
pub const DONE_SENTINEL: &str = "[DONE]";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A dispatched SSE message event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Last event id seen on the stream (persists across events)
    pub id: Option<String>,
    /// Event name from the `event:` field, if any
    pub event: Option<String>,
    /// Data payload; multiple `data:` lines are joined with `\n`
    pub data: String,
}

impl SseEvent {
    /// Whether this payload is the end-of-turn sentinel
    pub fn is_done(&self) -> bool {
        self.data.starts_with(DONE_SENTINEL)
    }
}

/// Anything the parser can yield
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// A message event carrying a payload
    Event(SseEvent),
    /// A `retry:` field asking the client to change its reconnect delay
    ReconnectInterval(u64),
}

/// Incremental SSE parser.
///
/// # Example
/// ```
/// use emohaa_bridge::streaming::{SseEventParser, UpstreamEvent};
///
/// let mut parser = SseEventParser::new();
///
/// // Partial frame: nothing is dispatched yet
/// assert!(parser.feed(b"data: hel").is_empty());
///
/// // Blank line terminates the frame
/// let events = parser.feed(b"lo\n\n");
/// match &events[0] {
///     UpstreamEvent::Event(event) => assert_eq!(event.data, "hello"),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Debug, Default)]
pub struct SseEventParser {
    /// Bytes of the current, not yet terminated line
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no line terminator
    scanned: usize,
    bom_checked: bool,
    /// Previous line ended with `\r`; a leading `\n` belongs to it
    skip_lf: bool,
    last_event_id: Option<String>,
    event_name: Option<String>,
    data: String,
}

impl SseEventParser {
    /// Create a new parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the parser and return every event completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<UpstreamEvent> {
        let mut events = Vec::new();
        self.buffer.extend_from_slice(bytes);

        if !self.bom_checked {
            if self.buffer.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(&self.buffer) {
                return events;
            }
            if self.buffer.starts_with(UTF8_BOM) {
                self.buffer.drain(..UTF8_BOM.len());
            }
            self.bom_checked = true;
        }

        let mut line_start = 0;
        for i in self.scanned..self.buffer.len() {
            let byte = self.buffer[i];

            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    line_start = i + 1;
                    continue;
                }
            }

            if byte == b'\n' || byte == b'\r' {
                // Line terminators never occur inside a multi-byte UTF-8 sequence,
                // so every complete line is decodable on its own.
                let line = String::from_utf8_lossy(&self.buffer[line_start..i]).into_owned();
                self.skip_lf = byte == b'\r';
                self.process_line(&line, &mut events);
                line_start = i + 1;
            }
        }

        self.buffer.drain(..line_start);
        self.scanned = self.buffer.len();
        events
    }

    /// Whether a partial line or an undispatched frame is still buffered.
    ///
    /// Useful for detecting truncated streams at end of response.
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty() || !self.data.is_empty()
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<UpstreamEvent>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "event" => self.event_name = Some(value.to_string()),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse() {
                        events.push(UpstreamEvent::ReconnectInterval(ms));
                    }
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, events: &mut Vec<UpstreamEvent>) {
        let event_name = self.event_name.take().filter(|name| !name.is_empty());

        if self.data.is_empty() {
            return;
        }

        let mut data = std::mem::take(&mut self.data);
        data.pop();

        events.push(UpstreamEvent::Event(SseEvent {
            id: self.last_event_id.clone(),
            event: event_name,
            data,
        }));
    }
}
