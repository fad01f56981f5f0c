//! The per-request response sink.

use bytes::Bytes;
use http::StatusCode;
use tracing::warn;

use crate::response::Response;

/// Buffers one response while the chain runs.
///
/// The status line and headers stay editable until the writer is
/// *committed*: either a handler writes body bytes, calls
/// [`write_header_now`](Self::write_header_now), or the engine finalizes the
/// response after the chain. After that, status changes are ignored.
///
/// Nothing reaches the socket before the chain is done, which is what lets
/// the recovery middleware replace a half-written response with a clean 500.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    committed: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: Vec::new(),
            committed: false,
        }
    }
}

impl ResponseWriter {
    /// Sets a header, replacing any existing value of the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value.to_owned(),
            None => self.headers.push((name.to_owned(), value.to_owned())),
        }
    }

    /// Adds a header without touching existing values (e.g. `set-cookie`).
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Records the status code to send. Ignored once the writer is committed.
    pub fn write_status(&mut self, code: StatusCode) {
        if self.committed {
            if code != self.status {
                warn!(current = self.status.as_u16(), ignored = code.as_u16(), "headers were already written");
            }
            return;
        }
        self.status = code;
    }

    /// Appends body bytes, committing the status and headers first.
    pub fn write(&mut self, bytes: &[u8]) {
        self.write_header_now();
        self.body.extend_from_slice(bytes);
    }

    /// Commits the status line and headers. Idempotent.
    pub fn write_header_now(&mut self) {
        self.committed = true;
    }

    /// Whether the status and headers have been committed.
    pub fn written(&self) -> bool { self.committed }

    pub fn status(&self) -> StatusCode { self.status }

    /// Body bytes written so far.
    pub fn size(&self) -> usize { self.body.len() }

    /// Throws away everything written, committed or not.
    ///
    /// Only sound because the writer buffers; used when a panic leaves a
    /// partial response behind.
    pub(crate) fn discard(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.committed = false;
    }

    /// Moves the buffered response out, leaving the writer reset.
    pub(crate) fn take_response(&mut self) -> Response {
        let response = Response {
            status: self.status,
            headers: std::mem::take(&mut self.headers),
            body: Bytes::from(std::mem::take(&mut self.body)),
        };
        self.status = StatusCode::OK;
        self.committed = false;
        response
    }
}
