//! Engine configuration.
//!
//! Everything an engine needs at construction time, in one struct. Loaded
//! from TOML or built in code; there are no process-wide settings.
//!
//! ```toml
//! addr = "0.0.0.0:8080"
//! namespace = "/api"
//! max_idle_contexts = 512
//! unauthenticated_routes = ["/api/login", "/api/healthz"]
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Listen address for [`Server::from_config`](crate::Server::from_config).
    pub addr: String,
    /// Prefix of the root route group.
    pub namespace: String,
    /// Upper bound on recycled contexts kept for reuse.
    pub max_idle_contexts: usize,
    /// Paths the bearer-auth middleware lets through without a token.
    /// `"*"` disables the check for every path.
    pub unauthenticated_routes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            namespace: "/".to_owned(),
            max_idle_contexts: 1024,
            unauthenticated_routes: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        self.addr.parse().map_err(|source| Error::Addr { addr: self.addr.clone(), source })
    }

    /// The root group's prefix. An empty namespace means `/`.
    pub(crate) fn root_path(&self) -> String {
        if self.namespace.is_empty() {
            "/".to_owned()
        } else {
            self.namespace.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = Config::from_toml(r#"namespace = "/api""#).unwrap();
        assert_eq!(config.namespace, "/api");
        assert_eq!(config.addr, "0.0.0.0:3000");
        assert_eq!(config.max_idle_contexts, 1024);
        assert!(config.unauthenticated_routes.is_empty());
    }

    #[test]
    fn full_document_parses() {
        let config = Config::from_toml(
            r#"
            addr = "127.0.0.1:8080"
            namespace = ""
            max_idle_contexts = 8
            unauthenticated_routes = ["/login", "*"]
            "#,
        )
        .unwrap();
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
        assert_eq!(config.root_path(), "/");
        assert_eq!(config.max_idle_contexts, 8);
        assert_eq!(config.unauthenticated_routes, ["/login", "*"]);
    }

    #[test]
    fn unknown_keys_are_errors() {
        assert!(matches!(Config::from_toml("jwt_secret = \"s\""), Err(Error::Config(_))));
    }

    #[test]
    fn bad_address_is_reported() {
        let config = Config { addr: "not-an-addr".to_owned(), ..Config::default() };
        assert!(matches!(config.socket_addr(), Err(Error::Addr { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(Config::load("/definitely/not/here.toml"), Err(Error::Io(_))));
    }
}
