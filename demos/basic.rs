//! Minimal gantry example: versioned JSON endpoints, an authenticated admin
//! group, and health checks.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/v1/users/42
//!   curl -X POST http://localhost:3000/v1/users -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/v1/users/42
//!   curl http://localhost:3000/admin/stats                       # 401
//!   curl -H 'authorization: Bearer demo' http://localhost:3000/admin/stats
//!   curl http://localhost:3000/healthz

use gantry::middleware::{self, Claims};
use gantry::{Config, Context, Engine, Server, StatusCode, handlers, health};
use serde::Deserialize;

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::default();
    let server = Server::from_config(&config).expect("invalid listen address");

    let mut app = Engine::new(config);
    app.use_middleware(middleware::recovery)
       .use_middleware(middleware::logger)
       .get("/healthz", health::liveness)
       .get("/readyz", health::readiness);

    app.group("/v1", |v1| {
        v1.get("/users/{id}", get_user)
          .post("/users", create_user)
          .delete("/users/{id}", delete_user);
    }, handlers![]);

    app.group("/admin", |admin| {
        admin.get("/stats", stats);
    }, handlers![middleware::bearer_auth(verify, Vec::new())]);

    server.serve(app).await.expect("server error");
}

// Stand-in for real token verification (a JWT library, a session store, ...).
fn verify(token: &str) -> Result<Claims, String> {
    if token == "demo" {
        let mut claims = Claims::new();
        claims.insert("sub".to_owned(), "demo-user".into());
        Ok(claims)
    } else {
        Err("invalid token".to_owned())
    }
}

// GET /v1/users/{id}
fn get_user(ctx: &mut Context) {
    let id = ctx.param("id").unwrap_or("unknown").to_owned();
    ctx.json(StatusCode::OK, &serde_json::json!({ "id": id, "name": "alice" }));
}

// POST /v1/users
fn create_user(ctx: &mut Context) {
    let user: NewUser = match ctx.bind_json() {
        Ok(user) => user,
        Err(e) => {
            ctx.json(StatusCode::BAD_REQUEST, &serde_json::json!({ "error": e.to_string() }));
            return;
        }
    };

    ctx.header("location", "/v1/users/99");
    ctx.json(StatusCode::CREATED, &serde_json::json!({ "id": "99", "name": user.name }));
}

// DELETE /v1/users/{id} → 204 No Content
fn delete_user(ctx: &mut Context) {
    ctx.status(StatusCode::NO_CONTENT);
}

// GET /admin/stats, behind bearer auth
fn stats(ctx: &mut Context) {
    let sub = ctx.claims()
        .and_then(|c| c.get("sub"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_owned();
    ctx.json(StatusCode::OK, &serde_json::json!({ "requested_by": sub, "routes": 6 }));
}
