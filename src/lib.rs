//! # gantry
//!
//! A small HTTP dispatch engine: route groups, pooled request contexts, and
//! middleware chains you can abort.
//!
//! ## The model
//!
//! - A **route** is a method, an absolute path, and a **chain**: engine
//!   middleware, then each enclosing group's middleware (outside in), then
//!   the handlers given at registration. Chains are built once, at startup,
//!   and shared read-only by every request.
//! - A **handler** is any `Fn(&mut Context)`. Middleware call
//!   [`Context::next`] to run the rest of the chain in the middle of their
//!   own work, and [`Context::abort`] to stop it.
//! - A **context** carries one request through its chain: request, response
//!   writer, path parameters, and a scratch map handlers use to pass values
//!   down. Contexts come from a pool and go back to it after the response is
//!   finalized, panics included.
//!
//! What gantry leaves to others: path matching ([`matchit`]), the wire
//! protocol (hyper), JSON (serde), and token cryptography (bring a
//! [`TokenVerifier`](middleware::TokenVerifier)).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use gantry::{Config, Context, Engine, Server, StatusCode, handlers, middleware};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut app = Engine::new(Config::default());
//!     app.use_middleware(middleware::recovery)
//!        .use_middleware(middleware::logger);
//!
//!     app.group("/v1", |v1| {
//!         v1.get("/users/{id}", get_user);
//!         v1.post("/users", create_user);
//!     }, handlers![]);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! fn get_user(ctx: &mut Context) {
//!     let id = ctx.param("id").unwrap_or("unknown").to_owned();
//!     ctx.json(StatusCode::OK, &serde_json::json!({ "id": id }));
//! }
//!
//! fn create_user(ctx: &mut Context) {
//!     if ctx.request().body().is_empty() {
//!         ctx.abort_with_status(StatusCode::BAD_REQUEST);
//!         return;
//!     }
//!     ctx.header("location", "/v1/users/99");
//!     ctx.json(StatusCode::CREATED, &serde_json::json!({ "id": "99" }));
//! }
//! ```

mod config;
mod context;
mod engine;
mod error;
mod group;
mod handler;
mod method;
mod request;
mod response;
mod router;
mod server;
mod static_files;
mod writer;

pub mod chain;
pub mod health;
pub mod middleware;
pub mod path;
pub mod pool;

pub use config::Config;
pub use context::Context;
pub use engine::Engine;
pub use error::Error;
pub use group::RouteGroup;
pub use handler::{BoxedHandler, Handler};
pub use http::StatusCode;
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, Response};
pub use server::Server;
pub use writer::ResponseWriter;
