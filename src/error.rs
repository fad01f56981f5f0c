//! Unified error type.

use thiserror::Error;

/// The error type returned by gantry's fallible operations.
///
/// Application-level failures (401, 404, 500, ...) are written to the
/// response by handlers, not returned as `Error`s. This type surfaces
/// setup mistakes (bad routes, bad config) and infrastructure failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("route `{path}` has no handlers")]
    EmptyChain { path: String },

    #[error("route `{path}` has {len} handlers, at most {max} are allowed")]
    ChainTooLong { path: String, len: usize, max: usize },

    #[error("static path `{0}` must not contain URL parameters")]
    StaticParams(String),

    #[error("invalid address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
