//! Line-oriented event stream reader.
//!
//! Reads a streaming response one line at a time. Lines that start with the
//! frame prefix carry a JSON payload; everything else (blank separators,
//! `:` comments, keep-alives, other SSE fields) is skipped.
//!
//! ```text
//! data: {"content":{"parts":[{"text":"A"}]}}   -> yielded
//!                                              -> skipped
//! : keep-alive                                 -> skipped
//! data: not-json                               -> diagnostic, skipped
//! ```
//!
//! The reader is a single-pass iterator. Dropping it drops the underlying
//! reader, which closes the connection.

use std::io::BufRead;
use std::iter::FusedIterator;
use std::sync::Arc;

use serde_json::Value;

use crate::diagnostics::{Diagnostic, Diagnostics, Level};
use crate::error::{ChatError, ErrorKind};
use crate::logging::{log_line, LogHandle};

/// Prefix of payload lines in a standard SSE stream.
pub const DATA_PREFIX: &str = "data: ";

pub struct SseReader<R> {
    reader: R,
    prefix: String,
    diagnostics: Option<Arc<Diagnostics>>,
    wire_log: Option<LogHandle>,
    buffer: Vec<u8>,
    skipped: usize,
    done: bool,
}

impl<R: BufRead> SseReader<R> {
    /// Reader for `data: `-framed streams.
    pub fn new(reader: R) -> Self {
        Self::with_prefix(reader, DATA_PREFIX)
    }

    /// Reader with a custom frame prefix. An empty prefix treats every
    /// non-blank, non-comment line as a payload (newline-delimited JSON).
    pub fn with_prefix(reader: R, prefix: impl Into<String>) -> Self {
        Self {
            reader,
            prefix: prefix.into(),
            diagnostics: None,
            wire_log: None,
            buffer: Vec::new(),
            skipped: 0,
            done: false,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn with_wire_log(mut self, handle: LogHandle) -> Self {
        self.wire_log = Some(handle);
        self
    }

    /// Number of frames that could not be decoded so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn payload<'a>(&self, line: &'a str) -> Option<&'a str> {
        if line.trim().is_empty() || line.starts_with(':') {
            return None;
        }
        line.strip_prefix(self.prefix.as_str())
    }

    fn skip_frame(&mut self, message: String) {
        self.skipped += 1;
        match &self.diagnostics {
            Some(diagnostics) => {
                diagnostics.publish(Diagnostic {
                    level: Level::Warning,
                    kind: Some(ErrorKind::Decode),
                    message,
                });
            }
            None => log::warn!("{}", message),
        }
    }
}

impl<R: BufRead> Iterator for SseReader<R> {
    type Item = Result<Value, ChatError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    // Whatever part of a line was read is dropped.
                    self.done = true;
                    self.buffer.clear();
                    log::error!("Stream interrupted: {}", err);
                    return Some(Err(ChatError::from_read(err)));
                }
            }

            let bytes = std::mem::take(&mut self.buffer);
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(err) => {
                    let lossy = String::from_utf8_lossy(err.as_bytes()).into_owned();
                    let lossy = lossy.trim_end_matches(['\r', '\n']);
                    if let Some(handle) = &self.wire_log {
                        log_line(handle, "RECV", lossy);
                    }
                    if self.payload(lossy).is_some() {
                        let message = format!(
                            "Stream line is not valid UTF-8: {} ({})",
                            lossy,
                            err.utf8_error()
                        );
                        self.skip_frame(message);
                    }
                    continue;
                }
            };
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(handle) = &self.wire_log {
                log_line(handle, "RECV", line);
            }

            let Some(payload) = self.payload(line) else {
                continue;
            };
            match serde_json::from_str::<Value>(payload) {
                Ok(value) => return Some(Ok(value)),
                Err(err) => {
                    let message = format!("Could not decode JSON from stream: {} ({})", line, err);
                    self.skip_frame(message);
                }
            }
        }
        None
    }
}

impl<R: BufRead> FusedIterator for SseReader<R> {}
