//! Handler chains.
//!
//! A chain is the flattened list of handlers one route runs: engine-level
//! middleware, then every enclosing group's middleware from the outside in,
//! then the handlers given at registration. It is built once, at
//! registration, and shared read-only by every request on that route.

use std::sync::Arc;

use crate::handler::BoxedHandler;

/// An immutable, shareable handler chain.
pub type Chain = Arc<[BoxedHandler]>;

/// Cursor value that marks a chain as aborted.
///
/// Any cursor at or past this value fails the bounds check in
/// [`Context::next`](crate::Context::next), so chains must stay shorter
/// than it.
pub const ABORT_INDEX: i8 = i8::MAX / 2;

/// Longest chain a route may carry.
pub const MAX_CHAIN_LEN: usize = ABORT_INDEX as usize - 1;

/// Concatenates inherited handlers with a route's or group's own handlers.
///
/// Always allocates a fresh vector of the exact final length. Appending to
/// the parent's vector in place would let a later sibling registration
/// overwrite handlers an earlier sibling already captured.
pub fn combine(inherited: &[BoxedHandler], own: &[BoxedHandler]) -> Vec<BoxedHandler> {
    let mut merged = Vec::with_capacity(inherited.len() + own.len());
    merged.extend(inherited.iter().cloned());
    merged.extend(own.iter().cloned());
    merged
}
