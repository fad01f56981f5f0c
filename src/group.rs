//! Route groups: shared prefixes and shared middleware.
//!
//! A group is a node in a namespace tree. It contributes a path prefix and a
//! list of handlers to everything registered beneath it. Nothing about a
//! group exists at request time: registration flattens the tree into one
//! absolute path and one [`Chain`](crate::chain::Chain) per route.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use http::StatusCode;

use crate::chain::{self, MAX_CHAIN_LEN};
use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::path;
use crate::router::Router;
use crate::static_files::FileServer;

/// A namespace for route registration.
///
/// Obtained from [`Engine::group`](crate::Engine::group) or
/// [`RouteGroup::group`]. Borrows the engine's route table for as long as it
/// lives, so registration happens in one place and finishes before serving.
///
/// ```rust
/// use gantry::{Context, Engine, StatusCode, handlers};
///
/// fn require_admin(ctx: &mut Context) {
///     if ctx.request().header("x-admin").is_none() {
///         ctx.abort_with_status(StatusCode::FORBIDDEN);
///     }
/// }
/// fn list_reports(ctx: &mut Context) { ctx.text(StatusCode::OK, "[]") }
/// fn purge_cache(ctx: &mut Context) { ctx.status(StatusCode::NO_CONTENT) }
///
/// let mut engine = Engine::default();
/// engine.group("/admin", |admin| {
///     admin.get("/reports", list_reports);
///     admin.group("/cache", |cache| {
///         cache.delete("/", purge_cache);
///     }, handlers![]);
/// }, handlers![require_admin]);
/// ```
pub struct RouteGroup<'e> {
    // Borrowed from the engine for the root group, owned once extended.
    handlers: Cow<'e, [BoxedHandler]>,
    base_path: String,
    router: &'e mut Router,
}

impl<'e> RouteGroup<'e> {
    pub(crate) fn new(
        router: &'e mut Router,
        base_path: String,
        handlers: impl Into<Cow<'e, [BoxedHandler]>>,
    ) -> Self {
        Self { handlers: handlers.into(), base_path, router }
    }

    /// The absolute prefix of this group.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Number of handlers every route in this group inherits.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Appends middleware to this group. Only routes registered afterwards
    /// pick it up; chains already built are never touched.
    pub fn use_middleware(&mut self, middleware: impl Handler) -> &mut Self {
        self.handlers.to_mut().push(middleware.into_boxed_handler());
        self
    }

    /// Creates a child group under `relative`, lets `configure` register
    /// routes on it, and returns it.
    ///
    /// The child inherits this group's handlers followed by `handlers`.
    pub fn group(
        &mut self,
        relative: &str,
        configure: impl FnOnce(&mut RouteGroup<'_>),
        handlers: Vec<BoxedHandler>,
    ) -> RouteGroup<'_> {
        let mut child = RouteGroup {
            handlers: Cow::Owned(chain::combine(&self.handlers, &handlers)),
            base_path: path::compose(&self.base_path, relative),
            router: &mut *self.router,
        };
        configure(&mut child);
        child
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Registers a chain for `method` at `relative`, returning any error.
    ///
    /// The last handler is the terminal one; anything before it is
    /// route-specific middleware that runs after the group's middleware.
    pub fn try_handle(&mut self, method: Method, relative: &str, handlers: Vec<BoxedHandler>) -> Result<(), Error> {
        self.bind(Some(method), relative, handlers)
    }

    /// Registers a chain for `method` at `relative`.
    ///
    /// # Panics
    ///
    /// Panics on registration errors: an empty handler list, a chain longer
    /// than [`MAX_CHAIN_LEN`], or a path the route table rejects.
    pub fn handle(&mut self, method: Method, relative: &str, handlers: Vec<BoxedHandler>) -> &mut Self {
        if let Err(e) = self.try_handle(method, relative, handlers) {
            panic!("{e}");
        }
        self
    }

    pub fn get(&mut self, relative: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Get, relative, vec![handler.into_boxed_handler()])
    }

    pub fn post(&mut self, relative: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Post, relative, vec![handler.into_boxed_handler()])
    }

    pub fn put(&mut self, relative: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Put, relative, vec![handler.into_boxed_handler()])
    }

    pub fn patch(&mut self, relative: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Patch, relative, vec![handler.into_boxed_handler()])
    }

    pub fn delete(&mut self, relative: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Delete, relative, vec![handler.into_boxed_handler()])
    }

    pub fn options(&mut self, relative: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Options, relative, vec![handler.into_boxed_handler()])
    }

    pub fn head(&mut self, relative: &str, handler: impl Handler) -> &mut Self {
        self.handle(Method::Head, relative, vec![handler.into_boxed_handler()])
    }

    /// Registers `handler` for every method. Method-specific routes on the
    /// same path take precedence.
    pub fn any(&mut self, relative: &str, handler: impl Handler) -> &mut Self {
        if let Err(e) = self.bind(None, relative, vec![handler.into_boxed_handler()]) {
            panic!("{e}");
        }
        self
    }

    /// Serves the files under `dir` at `relative`.
    ///
    /// `GET relative/` serves `index.html`, `GET relative/a/b.css` serves
    /// `dir/a/b.css`, and `GET relative` (no trailing slash) redirects to
    /// `relative/`. Requests that try to climb out of `dir` get a 404.
    ///
    /// Fails if the mount path contains URL parameters, whether they come
    /// from `relative` or from an enclosing group: static content never
    /// lives under a parameterized path.
    pub fn try_static_files(&mut self, relative: &str, dir: impl Into<PathBuf>) -> Result<(), Error> {
        let mut mount = path::compose(&self.base_path, relative);
        if mount.contains(['{', '}', '*']) {
            return Err(Error::StaticParams(mount));
        }

        let files = Arc::new(FileServer::new(dir.into()));

        if !mount.ends_with('/') {
            let target = format!("{mount}/");
            let redirect = move |ctx: &mut Context| ctx.redirect(StatusCode::TEMPORARY_REDIRECT, &target);
            self.bind_absolute(Some(Method::Get), &mount, vec![redirect.into_boxed_handler()])?;
            mount.push('/');
        }

        let index = Arc::clone(&files);
        self.bind_absolute(
            Some(Method::Get),
            &mount,
            vec![(move |ctx: &mut Context| index.serve(ctx, "")).into_boxed_handler()],
        )?;

        let serve = move |ctx: &mut Context| {
            let file = ctx.param("filepath").unwrap_or_default().to_owned();
            files.serve(ctx, &file);
        };
        self.bind_absolute(
            Some(Method::Get),
            &format!("{mount}{{*filepath}}"),
            vec![serve.into_boxed_handler()],
        )
    }

    /// Panicking form of [`try_static_files`](Self::try_static_files).
    pub fn static_files(&mut self, relative: &str, dir: impl Into<PathBuf>) -> &mut Self {
        if let Err(e) = self.try_static_files(relative, dir) {
            panic!("{e}");
        }
        self
    }

    fn bind(&mut self, method: Option<Method>, relative: &str, handlers: Vec<BoxedHandler>) -> Result<(), Error> {
        let absolute = path::compose(&self.base_path, relative);
        self.bind_absolute(method, &absolute, handlers)
    }

    fn bind_absolute(&mut self, method: Option<Method>, absolute: &str, handlers: Vec<BoxedHandler>) -> Result<(), Error> {
        if handlers.is_empty() {
            return Err(Error::EmptyChain { path: absolute.to_owned() });
        }

        let chain = chain::combine(&self.handlers, &handlers);
        if chain.len() > MAX_CHAIN_LEN {
            return Err(Error::ChainTooLong {
                path: absolute.to_owned(),
                len: chain.len(),
                max: MAX_CHAIN_LEN,
            });
        }

        self.router.insert(method, absolute, Arc::from(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> BoxedHandler {
        (|_: &mut Context| {}).into_boxed_handler()
    }

    fn root(router: &mut Router) -> RouteGroup<'_> {
        RouteGroup::new(router, "/".to_owned(), Vec::new())
    }

    #[test]
    fn nested_groups_compose_paths_and_handlers() {
        let mut router = Router::default();
        let mut api = root(&mut router);
        api.use_middleware(|ctx: &mut Context| ctx.next());

        let mut seen = Vec::new();
        api.group("/v1", |v1| {
            seen.push((v1.base_path().to_owned(), v1.handler_count()));
            v1.group("users/", |users| {
                seen.push((users.base_path().to_owned(), users.handler_count()));
                users.get("{id}", |_: &mut Context| {});
            }, vec![noop(), noop()]);
        }, vec![noop()]);

        assert_eq!(seen, [("/v1".to_owned(), 2), ("/v1/users/".to_owned(), 4)]);

        let (chain, params) = router.lookup(Method::Get, "/v1/users/7").unwrap();
        assert_eq!(chain.len(), 5);
        assert_eq!(params[0].1, "7");
    }

    #[test]
    fn middleware_added_later_does_not_touch_existing_routes() {
        let mut router = Router::default();
        let mut group = root(&mut router);
        group.get("/early", |_: &mut Context| {});
        group.use_middleware(|ctx: &mut Context| ctx.next());
        group.get("/late", |_: &mut Context| {});

        assert_eq!(router.lookup(Method::Get, "/early").unwrap().0.len(), 1);
        assert_eq!(router.lookup(Method::Get, "/late").unwrap().0.len(), 2);
    }

    #[test]
    fn sibling_routes_get_independent_chains() {
        let mut router = Router::default();
        let mut group = root(&mut router);
        group.use_middleware(|ctx: &mut Context| ctx.next());
        group.get("/a", |_: &mut Context| {});
        group.get("/b", |_: &mut Context| {});

        let a = router.lookup(Method::Get, "/a").unwrap().0;
        let b = router.lookup(Method::Get, "/b").unwrap().0;
        assert!(Arc::ptr_eq(&a[0], &b[0]));
        assert!(!Arc::ptr_eq(&a[1], &b[1]));
    }

    #[test]
    fn empty_handler_list_is_rejected() {
        let mut router = Router::default();
        let err = root(&mut router).try_handle(Method::Get, "/x", Vec::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyChain { ref path } if path == "/x"));
    }

    #[test]
    fn overlong_chain_is_rejected() {
        let mut router = Router::default();
        let mut group = root(&mut router);
        for _ in 0..MAX_CHAIN_LEN {
            group.use_middleware(|ctx: &mut Context| ctx.next());
        }
        let err = group.try_handle(Method::Get, "/x", vec![noop()]).unwrap_err();
        assert!(matches!(err, Error::ChainTooLong { len, .. } if len == MAX_CHAIN_LEN + 1));
    }

    #[test]
    #[should_panic(expected = "invalid route `/dup`")]
    fn duplicate_registration_panics() {
        let mut router = Router::default();
        let mut group = root(&mut router);
        group.get("/dup", |_: &mut Context| {});
        group.get("/dup", |_: &mut Context| {});
    }

    #[test]
    fn static_paths_with_parameters_are_rejected() {
        let mut router = Router::default();
        let mut group = root(&mut router);
        for bad in ["/files/{name}", "/files/{*rest}", "/files*"] {
            let err = group.try_static_files(bad, "/tmp").unwrap_err();
            assert!(matches!(err, Error::StaticParams(ref p) if p == bad));
        }
    }

    #[test]
    fn static_files_under_a_parameterized_group_are_rejected() {
        let mut router = Router::default();
        let mut group = root(&mut router);

        let mut result = None;
        group.group("/users/{id}", |user| {
            result = Some(user.try_static_files("/files", "/tmp"));
        }, Vec::new());

        let err = result.unwrap().unwrap_err();
        assert!(matches!(err, Error::StaticParams(ref p) if p == "/users/{id}/files"));
        assert!(router.lookup(Method::Get, "/users/7/files/a.txt").is_none());
    }

    #[test]
    fn static_files_registers_redirect_index_and_catch_all() {
        let mut router = Router::default();
        let mut group = RouteGroup::new(&mut router, "/assets".to_owned(), Vec::new());
        group.static_files("/public", "/srv/www");

        assert!(router.lookup(Method::Get, "/assets/public").is_some());
        assert!(router.lookup(Method::Get, "/assets/public/").is_some());
        let (_, params) = router.lookup(Method::Get, "/assets/public/img/logo.png").unwrap();
        assert_eq!(params, [("filepath".to_owned(), "img/logo.png".to_owned())]);
        assert!(router.lookup(Method::Post, "/assets/public/x").is_none());
    }
}
