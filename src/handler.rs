//! Handlers and how chains store them.
//!
//! # How handlers are stored
//!
//! A chain holds handlers of *different* concrete types (named functions,
//! closures capturing configuration, middleware factories). Rust collections
//! hold one type, so every handler is erased behind `dyn Fn(&mut Context)`
//! and stored uniformly:
//!
//! ```text
//! fn hello(ctx: &mut Context) { … }        ← user writes this
//!        ↓ group.get("/", hello)
//! hello.into_boxed_handler()               ← Handler blanket impl
//!        ↓
//! Arc::new(hello)                          ← stored as BoxedHandler
//!        ↓
//! chain[i](ctx)  at request time           ← one indirect call
//! ```
//!
//! Handlers are plain synchronous functions. Each request's chain runs on its
//! own blocking thread, so a handler may block on I/O without stalling other
//! requests.

use std::sync::Arc;

use crate::context::Context;

/// A type-erased handler shared by every chain it appears in.
///
/// `Arc` because one middleware (a logger, say) is typically registered once
/// and then copied into the chain of every route beneath its group.
pub type BoxedHandler = Arc<dyn Fn(&mut Context) + Send + Sync + 'static>;

/// Implemented for every valid handler or middleware.
///
/// You never implement this yourself. It is automatically satisfied for any
/// function or closure with the signature:
///
/// ```text
/// fn name(ctx: &mut Context)
/// ```
///
/// Closures need the parameter type spelled out (`|ctx: &mut Context| …`)
/// so the compiler infers a signature valid for every borrow lifetime.
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F> private::Sealed for F where F: Fn(&mut Context) + Send + Sync + 'static {}

impl<F> Handler for F
where
    F: Fn(&mut Context) + Send + Sync + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

/// Builds a `Vec<BoxedHandler>` from a list of handlers, in order.
///
/// Use it wherever several handlers are registered at once: the last one is
/// conventionally the terminal handler, the rest are middleware.
///
/// ```rust
/// use gantry::{handlers, Context, Engine, Method, StatusCode};
///
/// fn audit(ctx: &mut Context) { ctx.next() }
/// fn create(ctx: &mut Context) { ctx.text(StatusCode::CREATED, "ok") }
///
/// let mut engine = Engine::default();
/// engine.handle(Method::Post, "/items", handlers![audit, create]);
/// ```
#[macro_export]
macro_rules! handlers {
    () => {
        ::std::vec::Vec::<$crate::BoxedHandler>::new()
    };
    ($($handler:expr),+ $(,)?) => {
        ::std::vec![$($crate::Handler::into_boxed_handler($handler)),+]
    };
}
