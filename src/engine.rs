//! The engine: route registration at startup, dispatch at request time.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use http::StatusCode;
use tracing::error;

use crate::chain::{self, Chain, MAX_CHAIN_LEN};
use crate::config::Config;
use crate::context::Context;
use crate::error::Error;
use crate::group::RouteGroup;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{self, TokenVerifier};
use crate::pool::Pool;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Owns the route table, the root group, and the context pool.
///
/// Build it once at startup, register routes, then hand it to
/// [`Server::serve`](crate::Server::serve) or call
/// [`dispatch`](Engine::dispatch) directly.
///
/// ```rust
/// use gantry::{Context, Engine, Method, Request, StatusCode, middleware};
///
/// fn get_user(ctx: &mut Context) {
///     let id = ctx.param("id").unwrap_or("unknown").to_owned();
///     ctx.json(StatusCode::OK, &serde_json::json!({ "id": id }));
/// }
///
/// let mut engine = Engine::default();
/// engine.use_middleware(middleware::recovery);
/// engine.group("/v1", |v1| { v1.get("/users/{id}", get_user); }, vec![]);
///
/// let res = engine.dispatch(Request::new(Method::Get, "/v1/users/42"));
/// assert_eq!(res.status_code(), StatusCode::OK);
/// assert_eq!(res.body(), br#"{"id":"42"}"#);
/// ```
pub struct Engine {
    config: Config,
    router: Router,
    pool: Pool<Context>,
    handlers: Vec<BoxedHandler>,
    base_path: String,
    no_route: Vec<BoxedHandler>,
    no_route_chain: Chain,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self {
            router: Router::default(),
            pool: Pool::new(config.max_idle_contexts),
            handlers: Vec::new(),
            base_path: config.root_path(),
            no_route: Vec::new(),
            no_route_chain: Arc::from(Vec::new()),
            config,
        }
    }

    /// An engine with the usual middleware installed, outermost first:
    /// panic recovery, request logging, and bearer-token auth (honouring
    /// `config.unauthenticated_routes`).
    pub fn classic(config: Config, verifier: impl TokenVerifier) -> Self {
        let exempt = config.unauthenticated_routes.clone();
        let mut engine = Self::new(config);
        engine
            .use_middleware(middleware::recovery)
            .use_middleware(middleware::logger)
            .use_middleware(middleware::bearer_auth(verifier, exempt));
        engine
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Contexts currently parked in the pool.
    pub fn idle_contexts(&self) -> usize {
        self.pool.idle()
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Appends engine-wide middleware. Routes registered afterwards run it
    /// first; the not-found chain always includes it.
    ///
    /// # Panics
    ///
    /// Panics if the not-found chain (engine middleware plus the
    /// [`no_route`](Self::no_route) handlers) would exceed
    /// [`MAX_CHAIN_LEN`].
    pub fn use_middleware(&mut self, middleware: impl Handler) -> &mut Self {
        self.handlers.push(middleware.into_boxed_handler());
        match not_found_chain(&self.handlers, &self.no_route) {
            Ok(chain) => self.no_route_chain = chain,
            Err(e) => panic!("{e}"),
        }
        self
    }

    /// Sets the handlers for requests that match no route, after the engine
    /// middleware. The response starts out as `404`; if nothing writes a
    /// body, a default page is sent.
    ///
    /// On error the previous not-found handlers stay in place.
    pub fn try_no_route(&mut self, handlers: Vec<BoxedHandler>) -> Result<(), Error> {
        self.no_route_chain = not_found_chain(&self.handlers, &handlers)?;
        self.no_route = handlers;
        Ok(())
    }

    /// Panicking form of [`try_no_route`](Self::try_no_route).
    pub fn no_route(&mut self, handlers: Vec<BoxedHandler>) -> &mut Self {
        if let Err(e) = self.try_no_route(handlers) {
            panic!("{e}");
        }
        self
    }

    /// A view of the root group, for registering at the top level.
    pub fn root(&mut self) -> RouteGroup<'_> {
        RouteGroup::new(&mut self.router, self.base_path.clone(), &self.handlers)
    }

    /// Creates a group under the root. See [`RouteGroup::group`].
    pub fn group(
        &mut self,
        relative: &str,
        configure: impl FnOnce(&mut RouteGroup<'_>),
        handlers: Vec<BoxedHandler>,
    ) -> RouteGroup<'_> {
        let base_path = crate::path::compose(&self.base_path, relative);
        let mut child = RouteGroup::new(&mut self.router, base_path, chain::combine(&self.handlers, &handlers));
        configure(&mut child);
        child
    }

    pub fn try_handle(&mut self, method: Method, path: &str, handlers: Vec<BoxedHandler>) -> Result<(), Error> {
        self.root().try_handle(method, path, handlers)
    }

    pub fn handle(&mut self, method: Method, path: &str, handlers: Vec<BoxedHandler>) -> &mut Self {
        self.root().handle(method, path, handlers);
        self
    }

    pub fn get(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.root().get(path, handler);
        self
    }

    pub fn post(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.root().post(path, handler);
        self
    }

    pub fn put(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.root().put(path, handler);
        self
    }

    pub fn patch(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.root().patch(path, handler);
        self
    }

    pub fn delete(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.root().delete(path, handler);
        self
    }

    pub fn options(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.root().options(path, handler);
        self
    }

    pub fn head(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.root().head(path, handler);
        self
    }

    pub fn any(&mut self, path: &str, handler: impl Handler) -> &mut Self {
        self.root().any(path, handler);
        self
    }

    pub fn static_files(&mut self, path: &str, dir: impl Into<PathBuf>) -> &mut Self {
        self.root().static_files(path, dir);
        self
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Runs one request through its chain and returns the finished response.
    ///
    /// This is the whole request lifecycle: look up the route, check a
    /// context out of the pool, bind it, run the chain, finalize the
    /// response, and return the context. The response is finalized exactly
    /// once, after the chain is exhausted or aborted, whatever its status.
    ///
    /// Blocking: handlers run on the calling thread.
    pub fn dispatch(&self, request: Request) -> Response {
        let (chain, params, matched) = match self.router.lookup(request.method(), request.path()) {
            Some((chain, params)) => (chain, params, true),
            None => (Arc::clone(&self.no_route_chain), Vec::new(), false),
        };

        // Dropping the guard returns the context, whichever way we leave.
        let mut ctx = self.pool.acquire();
        ctx.bind(request, params, chain);
        if !matched {
            ctx.status(StatusCode::NOT_FOUND);
        }

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) {
            error!(
                method = %ctx.request().method(),
                path = %ctx.request().path(),
                "handler panicked: {}",
                middleware::panic_message(&*payload),
            );
            ctx.writer_mut().discard();
            ctx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
        }

        if !matched && !ctx.writer().written() && ctx.writer().status() == StatusCode::NOT_FOUND {
            ctx.text(StatusCode::NOT_FOUND, "404 page not found");
        }

        let writer = ctx.writer_mut();
        writer.write_header_now();
        writer.take_response()
    }
}

/// Label the not-found chain goes by in registration errors.
const NO_ROUTE: &str = "<no route>";

/// The chain unmatched requests run, held to the same length limit as
/// routes so `abort()` always stops it.
fn not_found_chain(engine: &[BoxedHandler], no_route: &[BoxedHandler]) -> Result<Chain, Error> {
    let chain = chain::combine(engine, no_route);
    if chain.len() > MAX_CHAIN_LEN {
        return Err(Error::ChainTooLong { path: NO_ROUTE.to_owned(), len: chain.len(), max: MAX_CHAIN_LEN });
    }
    Ok(Arc::from(chain))
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::handlers;

    fn ok(ctx: &mut Context) {
        ctx.text(StatusCode::OK, "ok");
    }

    fn boom(_: &mut Context) {
        panic!("secret details");
    }

    #[test]
    fn namespace_prefixes_every_route() {
        let config = Config { namespace: "/api".to_owned(), ..Config::default() };
        let mut engine = Engine::new(config);
        engine.get("/ping", ok);

        assert_eq!(engine.dispatch(Request::new(Method::Get, "/api/ping")).status_code(), StatusCode::OK);
        assert_eq!(engine.dispatch(Request::new(Method::Get, "/ping")).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn default_not_found_page() {
        let engine = Engine::default();
        let res = engine.dispatch(Request::new(Method::Get, "/nowhere"));
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), b"404 page not found");
    }

    #[test]
    fn custom_not_found_chain_runs_global_middleware() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let mut engine = Engine::default();
        engine.no_route(handlers![|ctx: &mut Context| {
            ctx.json(StatusCode::NOT_FOUND, &serde_json::json!({ "error": "no such route" }));
        }]);
        engine.use_middleware(move |ctx: &mut Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.next();
        });

        let res = engine.dispatch(Request::new(Method::Get, "/missing"));
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(res.body(), br#"{"error":"no such route"}"#);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_without_recovery_middleware_is_still_contained() {
        let mut engine = Engine::default();
        engine.get("/boom", boom);

        let res = engine.dispatch(Request::new(Method::Get, "/boom"));
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.body().is_empty());
        assert_eq!(engine.idle_contexts(), 1);

        assert_eq!(engine.dispatch(Request::new(Method::Get, "/boom")).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(engine.idle_contexts(), 1);
    }

    #[test]
    fn contexts_are_reused_without_leftovers() {
        let mut engine = Engine::default();
        engine.get("/set", |ctx: &mut Context| {
            ctx.set("marker", 1u8);
            ctx.header("x-leftover", "yes");
            ctx.text(StatusCode::OK, "set");
        });
        engine.get("/check", |ctx: &mut Context| {
            let clean = ctx.get::<u8>("marker").is_none()
                && ctx.writer().header("x-leftover").is_none()
                && ctx.param("id").is_none();
            ctx.text(StatusCode::OK, if clean { "clean" } else { "dirty" });
        });

        engine.dispatch(Request::new(Method::Get, "/set"));
        let res = engine.dispatch(Request::new(Method::Get, "/check"));
        assert_eq!(res.body(), b"clean");
        assert_eq!(res.header("x-leftover"), None);
        assert_eq!(engine.idle_contexts(), 1);
    }

    #[test]
    fn status_without_body_is_finalized() {
        let mut engine = Engine::default();
        engine.delete("/users/{id}", |ctx: &mut Context| ctx.status(StatusCode::NO_CONTENT));

        let res = engine.dispatch(Request::new(Method::Delete, "/users/1"));
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
    }

    #[test]
    fn abort_in_engine_middleware_stops_the_not_found_chain() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let mut engine = Engine::default();
        engine.use_middleware(|ctx: &mut Context| ctx.abort_with_status(StatusCode::UNAUTHORIZED));
        for _ in 0..MAX_CHAIN_LEN - 2 {
            engine.use_middleware(|_: &mut Context| {});
        }
        engine.no_route(handlers![move |_: &mut Context| {
            counter.fetch_add(1, Ordering::SeqCst);
        }]);

        let res = engine.dispatch(Request::new(Method::Get, "/nowhere"));
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn overlong_not_found_chain_is_rejected() {
        let mut engine = Engine::default();
        for _ in 0..MAX_CHAIN_LEN {
            engine.use_middleware(|ctx: &mut Context| ctx.next());
        }

        let err = engine.try_no_route(handlers![ok]).unwrap_err();
        assert!(matches!(err, Error::ChainTooLong { len, .. } if len == MAX_CHAIN_LEN + 1));

        let res = engine.dispatch(Request::new(Method::Get, "/nowhere"));
        assert_eq!(res.body(), b"404 page not found");
    }

    #[test]
    #[should_panic(expected = "route `<no route>` has 63 handlers")]
    fn engine_middleware_past_the_limit_panics() {
        let mut engine = Engine::default();
        for _ in 0..=MAX_CHAIN_LEN {
            engine.use_middleware(|ctx: &mut Context| ctx.next());
        }
    }

    #[test]
    fn root_group_shares_engine_middleware_without_owning_it() {
        let mut engine = Engine::default();
        engine.use_middleware(|ctx: &mut Context| ctx.next());

        let mut root = engine.root();
        assert_eq!(root.handler_count(), 1);
        root.use_middleware(|ctx: &mut Context| ctx.next());
        root.get("/scoped", ok);
        assert_eq!(root.handler_count(), 2);

        assert_eq!(engine.handlers.len(), 1);
        engine.get("/plain", ok);
        assert_eq!(engine.router.lookup(Method::Get, "/scoped").unwrap().0.len(), 3);
        assert_eq!(engine.router.lookup(Method::Get, "/plain").unwrap().0.len(), 2);
    }

    #[test]
    fn any_route_serves_every_method() {
        let mut engine = Engine::default();
        engine.any("/echo", |ctx: &mut Context| {
            let method = ctx.request().method().to_string();
            ctx.text(StatusCode::OK, &method);
        });

        for method in [Method::Get, Method::Post, Method::Patch, Method::Options] {
            assert_eq!(engine.dispatch(Request::new(method, "/echo")).body(), method.as_str().as_bytes());
        }
    }
}
