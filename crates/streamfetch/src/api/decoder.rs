//! Line-oriented event stream decoder.
//!
//! [`StreamDecoder`] is a push-driven state machine
//! (`Idle → Reading → {Completed, Failed}`) that turns response body chunks
//! into [`StreamEvent`]s. It owns all per-stream state: the text buffer, the
//! bytes of a UTF-8 sequence split across chunks, the "first fragment" flag,
//! and the identifiers of the last frame that parsed.
//!
//! Only lines starting with `data: ` matter. Their payload is JSON:
//!
//! ```text
//! data: {"event":"message","answer":"Hi","conversation_id":"c1","task_id":"t1","id":"m1"}
//! data: {"status":400,"code":"invalid_param","message":"bad request"}
//! ```
//!
//! The decoder is chunk-boundary invariant: the same bytes produce the same
//! events however they are split across [`push`](StreamDecoder::push) calls.

use serde_json::Value;
use tracing::{debug, trace, warn};

/// Prefix of a significant line.
pub const DATA_PREFIX: &str = "data: ";

/// Message used when an error frame carries none.
const UNKNOWN_STREAM_ERROR: &str = "Unknown stream error";

// ── Events ─────────────────────────────────────────────────────────

/// A piece of answer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFragment {
    pub text: String,
    /// True only for the first message fragment of the stream.
    pub is_first: bool,
    pub conversation_id: Option<String>,
    pub task_id: Option<String>,
    pub message_id: String,
}

/// A single decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental answer fragment.
    Message(MessageFragment),
    /// The server (or the transport) reported a failure mid-stream.
    Error {
        message: String,
        code: Option<String>,
    },
    /// The stream ended. Always the last event.
    Completed {
        had_error: bool,
        error_message: Option<String>,
    },
}

impl StreamEvent {
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamEvent::Completed { .. })
    }
}

/// Concatenate the text of every message fragment.
pub fn collect_text(events: &[StreamEvent]) -> String {
    let mut text = String::new();
    for event in events {
        if let StreamEvent::Message(fragment) = event {
            text.push_str(&fragment.text);
        }
    }
    text
}

// ── Decoder ────────────────────────────────────────────────────────

/// Lifecycle of a [`StreamDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// No bytes seen yet.
    Idle,
    /// At least one chunk has arrived.
    Reading,
    /// End of stream without a fatal error.
    Completed,
    /// A fatal error frame or transport failure ended the stream.
    Failed,
}

#[derive(Debug, Default, Clone)]
struct FrameIds {
    conversation_id: Option<String>,
    message_id: Option<String>,
}

/// Push-driven decoder for one streaming response.
#[derive(Debug)]
pub struct StreamDecoder {
    state: DecoderState,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a newline.
    buffer: String,
    is_first: bool,
    last_ids: FrameIds,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Idle,
            pending: Vec::new(),
            buffer: String::new(),
            is_first: true,
            last_ids: FrameIds::default(),
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Whether a terminal state has been reached. A finished decoder ignores
    /// further input and emits nothing more.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, DecoderState::Completed | DecoderState::Failed)
    }

    /// Feed one chunk of the response body.
    ///
    /// Returns the events for every line completed by this chunk, in order.
    /// Stops at the first fatal error frame.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_finished() {
            return events;
        }
        self.state = DecoderState::Reading;
        self.decode_utf8(chunk);

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            self.process_line(&line, &mut events);
            if self.is_finished() {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// Signal end of stream.
    ///
    /// A final line without a trailing newline is still processed. Emits
    /// `Completed { had_error: false }` unless a fatal error was already seen.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.is_finished() {
            return events;
        }
        if !self.pending.is_empty() {
            self.pending.clear();
            self.buffer.push(char::REPLACEMENT_CHARACTER);
        }
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.process_line(&rest, &mut events);
        }
        if !self.is_finished() {
            debug!("stream completed");
            self.state = DecoderState::Completed;
            events.push(StreamEvent::Completed {
                had_error: false,
                error_message: None,
            });
        }
        events
    }

    /// Terminate the stream because of a failure outside the payload (a read
    /// error or a cancellation).
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<StreamEvent> {
        if self.is_finished() {
            return Vec::new();
        }
        let message = message.into();
        debug!("stream failed: {message}");
        self.state = DecoderState::Failed;
        self.buffer.clear();
        self.pending.clear();
        vec![
            StreamEvent::Error {
                message: message.clone(),
                code: None,
            },
            StreamEvent::Completed {
                had_error: true,
                error_message: Some(message),
            },
        ]
    }

    /// Append a chunk to the text buffer, holding back an incomplete
    /// trailing UTF-8 sequence and replacing invalid bytes with U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);
        let mut input = bytes.as_slice();
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            input = rest.get(len..).unwrap_or_default();
                        }
                        None => {
                            self.pending = rest.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        let line = line.trim_end_matches(['\n', '\r']);
        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            if !line.is_empty() {
                trace!("ignoring non-data line: {line}");
            }
            return;
        };

        let frame: Value = match serde_json::from_str(data) {
            Ok(frame) => frame,
            Err(e) => {
                // A frame cut off mid-payload: keep the conversation going.
                warn!("failed to parse stream frame: {e}, data: {data}");
                events.push(StreamEvent::Message(MessageFragment {
                    text: String::new(),
                    is_first: self.is_first,
                    conversation_id: self.last_ids.conversation_id.clone(),
                    task_id: None,
                    message_id: self.last_ids.message_id.clone().unwrap_or_default(),
                }));
                return;
            }
        };

        self.last_ids = FrameIds {
            conversation_id: string_field(&frame, "conversation_id"),
            message_id: string_field(&frame, "id"),
        };

        let event = frame
            .get("event")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty());
        let status = frame.get("status").and_then(Value::as_u64);

        let event = match event {
            Some(event) if status != Some(400) => event,
            _ => {
                let message = string_field(&frame, "message")
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| UNKNOWN_STREAM_ERROR.to_string());
                debug!("stream error frame: {message}");
                self.state = DecoderState::Failed;
                events.push(StreamEvent::Error {
                    message: message.clone(),
                    code: string_field(&frame, "code"),
                });
                events.push(StreamEvent::Completed {
                    had_error: true,
                    error_message: Some(message),
                });
                return;
            }
        };

        match event {
            "message" | "agent_message" => {
                let answer = frame.get("answer").and_then(Value::as_str).unwrap_or("");
                events.push(StreamEvent::Message(MessageFragment {
                    text: unescape_unicode(answer),
                    is_first: self.is_first,
                    conversation_id: string_field(&frame, "conversation_id"),
                    task_id: string_field(&frame, "task_id"),
                    message_id: string_field(&frame, "id").unwrap_or_default(),
                }));
                self.is_first = false;
            }
            other => trace!("skipping stream event: {other}"),
        }
    }
}

/// Read a string field, stringifying numbers.
fn string_field(frame: &Value, key: &str) -> Option<String> {
    match frame.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Unicode escapes ────────────────────────────────────────────────

/// Replace literal `\uXXXX` escapes with the characters they encode.
///
/// Surrogate pairs written as two escapes are combined; a lone surrogate
/// becomes U+FFFD. Anything that is not a complete escape is left as-is.
pub fn unescape_unicode(text: &str) -> String {
    if !text.contains("\\u") {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("\\u") {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);
        let after = tail.get(2..).unwrap_or_default();
        let Some(unit) = parse_hex4(after) else {
            out.push_str("\\u");
            rest = after;
            continue;
        };
        rest = after.get(4..).unwrap_or_default();

        if (0xD800..0xDC00).contains(&unit) {
            let low = rest
                .strip_prefix("\\u")
                .and_then(parse_hex4)
                .filter(|low| (0xDC00..0xE000).contains(low));
            if let Some(low) = low {
                let combined = 0x10000 + ((u32::from(unit) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
                out.push(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
                rest = rest.get(6..).unwrap_or_default();
                continue;
            }
        }
        out.push(char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
    out.push_str(rest);
    out
}

fn parse_hex4(s: &str) -> Option<u16> {
    let digits = s.get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}
