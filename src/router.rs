//! Radix-tree route table.
//!
//! One tree per HTTP method, plus one for routes registered on every method.
//! O(path-length) lookup via [`matchit`]. The table only maps a method and
//! a path to a chain; groups, prefixes and middleware are resolved before
//! anything is inserted here.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::chain::Chain;
use crate::error::Error;
use crate::method::Method;

/// The engine's route table.
#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<Chain>>,
    any: MatchitRouter<Chain>,
}

impl Router {
    /// Binds `path` to `chain`. `None` for `method` matches every method,
    /// after method-specific routes have had their turn.
    pub(crate) fn insert(&mut self, method: Option<Method>, path: &str, chain: Chain) -> Result<(), Error> {
        let tree = match method {
            Some(method) => self.routes.entry(method).or_default(),
            None => &mut self.any,
        };
        tree.insert(path, chain).map_err(|source| Error::Route { path: path.to_owned(), source })
    }

    pub(crate) fn lookup(&self, method: Method, path: &str) -> Option<(Chain, Vec<(String, String)>)> {
        let matched = self.routes.get(&method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any.at(path).ok())?;

        let chain = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((chain, params))
    }
}
