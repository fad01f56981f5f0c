//! Per-request context and chain execution.
//!
//! # Running a chain
//!
//! A [`Context`] carries a cursor into its route's chain. [`Context::next`]
//! runs every handler after the cursor, in order. A middleware that wants
//! to act *around* the rest of the chain calls `next()` itself:
//!
//! ```rust
//! use std::time::Instant;
//! use gantry::Context;
//!
//! fn timing(ctx: &mut Context) {
//!     let start = Instant::now();    // before the inner handlers
//!     ctx.next();                    // runs everything after `timing`
//!     let took = start.elapsed();    // after they have all returned
//!     ctx.header("x-elapsed-us", &took.as_micros().to_string());
//! }
//! ```
//!
//! This is plain recursion: each wrapping middleware keeps one stack frame
//! alive until the chain unwinds back to it, so stack depth is bounded by
//! the chain length.
//!
//! A handler that returns without calling `next()` simply doesn't wrap
//! anything: whichever `next()` loop called it moves on to the following
//! handler. To reject a request (failed auth, bad input), write the error
//! response and call [`Context::abort`]; that stops every `next()` loop on
//! the stack, so nothing later in the chain, terminal handler included,
//! ever runs.

use std::any::Any;
use std::collections::HashMap;

use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::chain::{ABORT_INDEX, Chain};
use crate::error::Error;
use crate::pool::Recycle;
use crate::request::Request;
use crate::response::ContentType;
use crate::writer::ResponseWriter;

type Keys = HashMap<String, Box<dyn Any + Send + Sync>>;

/// The state of one request as it moves through its chain.
///
/// Contexts are pooled by the engine and reused across requests. A handler
/// only ever sees a context between acquisition and release, and never
/// needs to clean it up.
pub struct Context {
    writer: ResponseWriter,
    request: Request,
    params: Vec<(String, String)>,
    chain: Option<Chain>,
    index: i8,
    keys: Option<Keys>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            writer: ResponseWriter::default(),
            request: Request::default(),
            params: Vec::new(),
            chain: None,
            index: -1,
            keys: None,
        }
    }
}

impl Recycle for Context {
    fn recycle(&mut self) {
        self.writer.discard();
        self.request = Request::default();
        self.params.clear();
        self.chain = None;
        self.index = -1;
        if let Some(keys) = &mut self.keys {
            keys.clear();
        }
    }
}

impl Context {
    pub(crate) fn bind(&mut self, request: Request, params: Vec<(String, String)>, chain: Chain) {
        self.request = request;
        self.params = params;
        self.chain = Some(chain);
        self.index = -1;
    }

    // ── Chain control ─────────────────────────────────────────────────────────

    /// Runs the handlers after the current one, in chain order.
    ///
    /// Resumes exactly where the last call left off; calling it after the
    /// chain is exhausted or aborted does nothing.
    pub fn next(&mut self) {
        let Some(chain) = self.chain.clone() else { return };

        self.index = self.index.saturating_add(1);
        while let Some(handler) = usize::try_from(self.index).ok().and_then(|i| chain.get(i)) {
            handler(self);
            self.index = self.index.saturating_add(1);
        }
    }

    /// Stops the chain. No handler that has not started yet will run,
    /// including those an enclosing middleware's `next()` was about to call.
    /// Handlers already on the stack still finish their post-processing.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    /// Writes `code`, commits the headers and aborts.
    pub fn abort_with_status(&mut self, code: StatusCode) {
        self.writer.write_status(code);
        self.writer.write_header_now();
        self.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    // ── Request ───────────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request { &self.request }

    /// A named path parameter: for a route `/users/{id}`, `ctx.param("id")`
    /// on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] { &self.params }

    /// A percent-decoded query-string parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        self.request.query(name)
    }

    /// A path parameter, falling back to the query string.
    pub fn value(&self, name: &str) -> Option<String> {
        self.param(name).map(str::to_owned).or_else(|| self.query(name))
    }

    /// Deserializes the request body as JSON.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(self.request.body())?)
    }

    // ── Scratch space ─────────────────────────────────────────────────────────

    /// Stores a value for handlers further down the chain.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.keys
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Box::new(value));
    }

    /// Looks up a value stored with [`set`](Self::set). Returns `None` if the
    /// key is missing or holds a different type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.keys.as_ref()?.get(key)?.downcast_ref()
    }

    /// Like [`get`](Self::get), for values the chain guarantees are present.
    ///
    /// # Panics
    ///
    /// Panics if `key` is missing or holds a different type.
    pub fn must_get<T: Any>(&self, key: &str) -> &T {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key `{key}` does not exist"),
        }
    }

    // ── Response ──────────────────────────────────────────────────────────────

    pub fn writer(&self) -> &ResponseWriter { &self.writer }
    pub fn writer_mut(&mut self) -> &mut ResponseWriter { &mut self.writer }

    /// Sets a response header.
    pub fn header(&mut self, name: &str, value: &str) {
        self.writer.set_header(name, value);
    }

    /// Sets the response status without writing a body.
    pub fn status(&mut self, code: StatusCode) {
        self.writer.write_status(code);
    }

    pub fn text(&mut self, code: StatusCode, body: &str) {
        self.bytes(code, ContentType::Text, body.as_bytes());
    }

    pub fn html(&mut self, code: StatusCode, body: &str) {
        self.bytes(code, ContentType::Html, body.as_bytes());
    }

    /// Serializes `value` as the JSON response body.
    ///
    /// A value that fails to serialize produces an empty `500` instead.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) {
        match serde_json::to_vec(value) {
            Ok(body) => self.bytes(code, ContentType::Json, &body),
            Err(e) => {
                error!(path = %self.request.path(), "json serialization failed: {e}");
                self.writer.write_status(StatusCode::INTERNAL_SERVER_ERROR);
                self.writer.write_header_now();
            }
        }
    }

    pub fn bytes(&mut self, code: StatusCode, content_type: ContentType, body: &[u8]) {
        self.writer.set_header("content-type", content_type.as_str());
        self.writer.write_status(code);
        self.writer.write(body);
    }

    /// Redirects to `location`. A non-redirect `code` falls back to
    /// `307 Temporary Redirect`.
    pub fn redirect(&mut self, code: StatusCode, location: &str) {
        let code = if code.is_redirection() { code } else { StatusCode::TEMPORARY_REDIRECT };
        self.writer.set_header("location", location);
        self.writer.write_status(code);
        self.writer.write_header_now();
    }
}

/// Builds a chain from handlers, for tests across the crate.
#[cfg(test)]
pub(crate) fn test_chain(handlers: Vec<crate::handler::BoxedHandler>) -> Chain {
    std::sync::Arc::from(handlers)
}
