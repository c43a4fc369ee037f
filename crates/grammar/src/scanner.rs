//! Incremental scanner for command calls embedded in model output.
//!
//! A command call is a fenced JSON object:
//!
//! ```text
//! ~###~{"cmd": "<name>", "params": { ... }}~###~
//! ```
//!
//! The envelope is a single JSON object with a required `"cmd"` string and
//! an optional `"params"` object (defaults to `{}`). The fence sequence
//! `~###~` terminates a call unconditionally, so it must never appear inside
//! a call body; everything outside the fences is ordinary answer text.
//!
//! The scanner is push-based. Callers feed it stream deltas as they arrive
//! and receive back the items that are fully decided at that point. Text is
//! released as soon as it provably cannot be part of a fence, so answer
//! deltas flow through with at most [`FENCE`]-length latency. A call is
//! released only when its closing fence arrives. [`CommandScanner::finish`]
//! flushes the tail once the stream ends: held-back text that never became
//! a fence is emitted, while an unterminated call is discarded outright.

use colloquy_core::{CommandCall, ParseError, Span};
use tracing::trace;

/// Opening and closing delimiter of a command call.
pub const FENCE: &str = "~###~";

/// Upper bound on a single call body. A body that grows past this without
/// a closing fence is reported as malformed and scanning resumes in text
/// mode, so a missing fence cannot buffer the rest of the stream.
pub const MAX_CALL_BYTES: usize = 64 * 1024;

/// One decided unit of scanner output.
#[derive(Debug, Clone)]
pub enum ScanItem {
    /// Plain answer text, in stream order.
    Text(String),
    /// A well-formed command call, fences and body fully received.
    Call(CommandCall),
    /// A fenced region whose body failed to parse. The stream keeps going.
    Malformed { error: ParseError, span: Span },
}

enum Mode {
    Text,
    InCall { fence_start: usize },
}

/// Streaming scanner over the concatenation of all fed deltas.
///
/// Spans on emitted calls are byte offsets into that concatenation, so a
/// caller holding the full raw text can slice calls out of it. Calls are
/// emitted in stream order and their spans never overlap.
pub struct CommandScanner {
    /// Bytes received but not yet resolved into items.
    buf: String,
    /// Absolute offset of `buf[0]` in the full stream.
    stream_pos: usize,
    mode: Mode,
}

impl CommandScanner {
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            stream_pos: 0,
            mode: Mode::Text,
        }
    }

    /// Consume the next stream delta and return every item decided by it.
    pub fn feed(&mut self, delta: &str) -> Vec<ScanItem> {
        self.buf.push_str(delta);
        let mut items = Vec::new();
        loop {
            match self.mode {
                Mode::Text => {
                    if let Some(at) = self.buf.find(FENCE) {
                        if at > 0 {
                            items.push(ScanItem::Text(self.buf[..at].to_string()));
                        }
                        let fence_start = self.stream_pos + at;
                        self.consume(at + FENCE.len());
                        self.mode = Mode::InCall { fence_start };
                    } else {
                        // Hold back a tail that could still become a fence.
                        let held = partial_fence_len(&self.buf);
                        let ready = self.buf.len() - held;
                        if ready > 0 {
                            items.push(ScanItem::Text(self.buf[..ready].to_string()));
                            self.consume(ready);
                        }
                        break;
                    }
                }
                Mode::InCall { fence_start } => {
                    if let Some(at) = self.buf.find(FENCE) {
                        let span = Span::new(fence_start, self.stream_pos + at + FENCE.len());
                        let item = match parse_call_body(&self.buf[..at]) {
                            Ok((name, params)) => {
                                ScanItem::Call(CommandCall::new(name, params, span))
                            }
                            Err(error) => ScanItem::Malformed { error, span },
                        };
                        items.push(item);
                        self.consume(at + FENCE.len());
                        self.mode = Mode::Text;
                    } else if self.buf.len() > MAX_CALL_BYTES {
                        let span = Span::new(fence_start, self.stream_pos + self.buf.len());
                        items.push(ScanItem::Malformed {
                            error: ParseError::MalformedCall {
                                reason: format!("call body exceeds {MAX_CALL_BYTES} bytes"),
                            },
                            span,
                        });
                        let len = self.buf.len();
                        self.consume(len);
                        self.mode = Mode::Text;
                        break;
                    } else {
                        break;
                    }
                }
            }
        }
        items
    }

    /// Flush the scanner at end of stream.
    ///
    /// Remaining text is emitted, including a held-back partial fence that
    /// turned out to be literal. An unterminated call is dropped: it was
    /// never complete, so it is neither executed nor shown as text.
    pub fn finish(mut self) -> Vec<ScanItem> {
        match self.mode {
            Mode::Text => {
                if self.buf.is_empty() {
                    Vec::new()
                } else {
                    vec![ScanItem::Text(std::mem::take(&mut self.buf))]
                }
            }
            Mode::InCall { fence_start } => {
                trace!(
                    fence_start,
                    buffered = self.buf.len(),
                    "discarding unterminated command call at end of stream"
                );
                Vec::new()
            }
        }
    }

    fn consume(&mut self, n: usize) {
        self.stream_pos += n;
        self.buf.drain(..n);
    }
}

impl Default for CommandScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan a complete text in one shot.
pub fn scan_all(text: &str) -> Vec<ScanItem> {
    let mut scanner = CommandScanner::new();
    let mut items = scanner.feed(text);
    items.extend(scanner.finish());
    items
}

/// Length of the longest buffer tail that is a proper prefix of [`FENCE`].
fn partial_fence_len(buf: &str) -> usize {
    let bytes = buf.as_bytes();
    let max = (FENCE.len() - 1).min(bytes.len());
    for k in (1..=max).rev() {
        if FENCE.as_bytes()[..k] == bytes[bytes.len() - k..] {
            return k;
        }
    }
    0
}

fn parse_call_body(body: &str) -> Result<(String, serde_json::Value), ParseError> {
    let value: serde_json::Value =
        serde_json::from_str(body.trim()).map_err(|e| ParseError::MalformedCall {
            reason: format!("invalid JSON: {e}"),
        })?;
    let object = value.as_object().ok_or_else(|| ParseError::MalformedCall {
        reason: "call body must be a JSON object".to_string(),
    })?;
    let name = object
        .get("cmd")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ParseError::MalformedCall {
            reason: "missing \"cmd\" string".to_string(),
        })?;
    if name.is_empty() {
        return Err(ParseError::MalformedCall {
            reason: "\"cmd\" must not be empty".to_string(),
        });
    }
    let params = match object.get("params") {
        None => serde_json::json!({}),
        Some(p) if p.is_object() => p.clone(),
        Some(_) => {
            return Err(ParseError::MalformedCall {
                reason: "\"params\" must be a JSON object".to_string(),
            });
        }
    };
    Ok((name.to_string(), params))
}
