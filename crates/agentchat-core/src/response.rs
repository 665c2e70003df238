//! HTTP plumbing shared by the adapters.
//!
//! - [`send`] runs a `ureq` request and turns every client failure into a
//!   [`ChatError`]; non-2xx statuses come back as ordinary [`RawResponse`]s
//!   so each operation can decide which statuses it tolerates.
//! - [`decode`] / [`decode_or_empty`] classify a body as empty, JSON or
//!   undecodable without ever failing the caller.

use std::io::Read;

use serde_json::Value;

use crate::diagnostics::{Diagnostics, Level};
use crate::error::{ChatError, TransportKind};

/// Cap for diagnostic body snippets.
pub const SNIPPET_CHARS: usize = 500;

/// Cap for the raw probe output.
pub const PROBE_CHARS: usize = 1000;

/// Upper bound on buffered (non-streaming) bodies. Larger bodies are
/// refused with [`ChatError::TooLarge`] rather than cut.
pub const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// Buffer a `ureq` response body, decoding it lossily as UTF-8.
    pub fn read(response: ureq::Response) -> Result<Self, ChatError> {
        let status = response.status();
        let content_type = response.header("content-type").map(str::to_string);
        let bytes = read_body(status, response.into_reader(), MAX_BODY_BYTES)?;
        Ok(Self {
            status,
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_empty(&self) -> bool {
        self.status == 204 || self.body.trim().is_empty()
    }

    pub fn content_type_or_unknown(&self) -> &str {
        self.content_type.as_deref().unwrap_or("unknown")
    }

    pub fn snippet(&self) -> String {
        snippet(&self.body, SNIPPET_CHARS)
    }

    /// The status failure for this response, for statuses an operation does
    /// not tolerate.
    pub fn backend_error(&self) -> ChatError {
        ChatError::Backend {
            status: self.status,
            snippet: self.snippet(),
        }
    }
}

/// Read at most `limit` bytes; one byte more means the body is too large.
fn read_body(status: u16, reader: impl Read, limit: u64) -> Result<Vec<u8>, ChatError> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(ChatError::from_read)?;
    if bytes.len() as u64 > limit {
        log::error!("Refusing response body over {} bytes (status {})", limit, status);
        return Err(ChatError::TooLarge { status, limit });
    }
    Ok(bytes)
}

/// Outcome of [`send`] before the body is read.
pub enum Sent {
    /// 2xx; the body has not been read yet (may be a stream).
    Ok(ureq::Response),
    /// Non-2xx; body buffered for diagnostics.
    Status(RawResponse),
}

/// Run a request, optionally with a JSON body.
pub fn send(request: ureq::Request, body: Option<&Value>) -> Result<Sent, ChatError> {
    log::debug!("{} {}", request.method(), request.url());
    let result = match body {
        Some(json) => request.send_json(json),
        None => request.call(),
    };
    match result {
        Ok(response) => Ok(Sent::Ok(response)),
        Err(ureq::Error::Status(_, response)) => Ok(Sent::Status(RawResponse::read(response)?)),
        Err(ureq::Error::Transport(transport)) => Err(from_transport(transport)),
    }
}

/// Run a request and buffer whatever comes back, whatever the status.
pub fn send_buffered(request: ureq::Request, body: Option<&Value>) -> Result<RawResponse, ChatError> {
    match send(request, body)? {
        Sent::Ok(response) => RawResponse::read(response),
        Sent::Status(raw) => Ok(raw),
    }
}

fn from_transport(transport: ureq::Transport) -> ChatError {
    let kind = match transport.kind() {
        ureq::ErrorKind::Dns => TransportKind::Dns,
        ureq::ErrorKind::ConnectionFailed => {
            if caused_by_timeout(&transport) {
                TransportKind::Timeout
            } else {
                TransportKind::Connect
            }
        }
        ureq::ErrorKind::Io => {
            if caused_by_timeout(&transport) {
                TransportKind::Timeout
            } else {
                TransportKind::Interrupted
            }
        }
        _ => TransportKind::Other,
    };
    ChatError::Transport {
        kind,
        source: Box::new(transport),
    }
}

fn caused_by_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Classify a body: `Ok(None)` for 204 or a blank body, `Ok(Some)` for
/// JSON, `Err(Decode)` otherwise.
pub fn decode(response: &RawResponse) -> Result<Option<Value>, ChatError> {
    if response.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&response.body)
        .map(Some)
        .map_err(|_| ChatError::Decode {
            status: response.status,
            content_type: response.content_type_or_unknown().to_string(),
            snippet: response.snippet(),
        })
}

/// Like [`decode`], but an empty or undecodable body yields `on_empty`.
/// Decode failures are published on `diagnostics` instead of returned.
pub fn decode_or_empty(response: &RawResponse, on_empty: Value, diagnostics: &Diagnostics) -> Value {
    match decode(response) {
        Ok(Some(value)) => value,
        Ok(None) => on_empty,
        Err(err) => {
            diagnostics.report(Level::Error, &err);
            on_empty
        }
    }
}

/// First `max_chars` characters of `body`, or `<no body>`.
pub fn snippet(body: &str, max_chars: usize) -> String {
    if body.is_empty() {
        return "<no body>".to_string();
    }
    body.chars().take(max_chars).collect()
}

/// Raw view of a response for the diagnostics probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl From<RawResponse> for ProbeReport {
    fn from(raw: RawResponse) -> Self {
        Self {
            status: raw.status,
            content_type: raw.content_type,
            body: snippet(&raw.body, PROBE_CHARS),
        }
    }
}
