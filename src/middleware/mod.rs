//! Built-in middleware.
//!
//! Middleware are ordinary handlers that call [`Context::next`] to wrap the
//! rest of the chain, or [`Context::abort`] to end it. Register them
//! engine-wide with [`Engine::use_middleware`], per group, or per route.
//!
//! - [`recovery`]: turns a panic anywhere below it into a bare `500`.
//!   Register it first so it wraps everything else.
//! - [`logger`]: one `tracing` event per request with status and latency.
//! - [`bearer_auth`]: rejects requests without a valid bearer token.
//!
//! [`Context::next`]: crate::Context::next
//! [`Context::abort`]: crate::Context::abort
//! [`Engine::use_middleware`]: crate::Engine::use_middleware

mod auth;
mod logger;
mod recovery;

pub use auth::{Claims, TokenVerifier, bearer_auth};
pub use logger::logger;
pub use recovery::recovery;

pub(crate) use recovery::panic_message;
