//! Probe handlers for orchestrators.
//!
//! `liveness` answers "is the process up", `readiness` answers "should it
//! get traffic". Mount them wherever your platform expects:
//!
//! ```rust
//! use gantry::{Engine, health};
//!
//! let mut engine = Engine::default();
//! engine.get("/healthz", health::liveness)
//!       .get("/readyz", health::readiness);
//! ```
//!
//! Engine middleware still runs in front of them. With bearer auth on, list
//! the probe paths in `unauthenticated_routes`.

use http::StatusCode;

use crate::context::Context;

/// `200 ok`.
pub fn liveness(ctx: &mut Context) {
    ctx.text(StatusCode::OK, "ok");
}

/// `200 ready`. Swap in your own handler to report warm-up or a failed
/// dependency with `503`.
pub fn readiness(ctx: &mut Context) {
    ctx.text(StatusCode::OK, "ready");
}
