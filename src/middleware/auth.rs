use http::StatusCode;
use serde_json::json;

use crate::context::Context;
use crate::handler::Handler;

/// Decoded token claims, as handed to downstream handlers.
pub type Claims = serde_json::Map<String, serde_json::Value>;

const CLAIMS_KEY: &str = "claims";

/// Checks a bearer token and returns its claims.
///
/// gantry does not ship token cryptography. Implement this for your JWT
/// library of choice, or pass a closure:
///
/// ```rust
/// use gantry::middleware::{Claims, bearer_auth};
///
/// let auth = bearer_auth(
///     |token: &str| {
///         if token == "let-me-in" { Ok(Claims::new()) } else { Err("invalid token".to_owned()) }
///     },
///     vec!["/login".to_owned()],
/// );
/// ```
pub trait TokenVerifier: Send + Sync + 'static {
    /// Returns the token's claims, or a message safe to show the client.
    fn verify(&self, token: &str) -> Result<Claims, String>;
}

impl<F> TokenVerifier for F
where
    F: Fn(&str) -> Result<Claims, String> + Send + Sync + 'static,
{
    fn verify(&self, token: &str) -> Result<Claims, String> {
        self(token)
    }
}

/// Requires an `Authorization: Bearer <token>` header on every request
/// except those whose path is listed in `unauthenticated_routes` (or all of
/// them, if the list contains `"*"`).
///
/// Rejected requests get `401` with a JSON body `{"error": "..."}` and the
/// chain is aborted. Accepted requests carry the token's claims, readable
/// through [`Context::claims`].
pub fn bearer_auth(verifier: impl TokenVerifier, unauthenticated_routes: Vec<String>) -> impl Handler {
    let everything_open = unauthenticated_routes.iter().any(|route| route == "*");

    move |ctx: &mut Context| {
        if everything_open || unauthenticated_routes.iter().any(|route| route == ctx.request().path()) {
            ctx.next();
            return;
        }

        let Some(header) = ctx.request().header("authorization") else {
            reject(ctx, "authorization token required but not present");
            return;
        };
        let Some(token) = header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty()) else {
            reject(ctx, "invalid authorization header");
            return;
        };

        match verifier.verify(token) {
            Ok(claims) => {
                ctx.set(CLAIMS_KEY, claims);
                ctx.next();
            }
            Err(reason) => reject(ctx, &reason),
        }
    }
}

fn reject(ctx: &mut Context, reason: &str) {
    ctx.json(StatusCode::UNAUTHORIZED, &json!({ "error": reason }));
    ctx.abort();
}

impl Context {
    /// Claims stored by [`bearer_auth`] for this request.
    pub fn claims(&self) -> Option<&Claims> {
        self.get(CLAIMS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;

    use super::*;
    use crate::engine::Engine;
    use crate::method::Method;
    use crate::request::Request;
    use crate::response::Response;

    fn verify(token: &str) -> Result<Claims, String> {
        if token == "good" {
            let mut claims = Claims::new();
            claims.insert("sub".to_owned(), Value::from("alice"));
            Ok(claims)
        } else {
            Err("invalid token".to_owned())
        }
    }

    fn whoami(ctx: &mut Context) {
        let sub = ctx.claims()
            .and_then(|c| c.get("sub"))
            .and_then(Value::as_str)
            .unwrap_or("anonymous")
            .to_owned();
        ctx.text(StatusCode::OK, &sub);
    }

    fn engine(open: &[&str]) -> Engine {
        let mut engine = Engine::default();
        engine.use_middleware(bearer_auth(verify, open.iter().map(|s| s.to_string()).collect()));
        engine.get("/me", whoami);
        engine.get("/login", whoami);
        engine
    }

    fn error_of(res: &Response) -> String {
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        body["error"].as_str().unwrap().to_owned()
    }

    #[test]
    fn missing_header_is_rejected() {
        let res = engine(&[]).dispatch(Request::new(Method::Get, "/me"));
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(error_of(&res), "authorization token required but not present");
    }

    #[test]
    fn bad_scheme_and_bad_token_are_rejected() {
        let engine = engine(&[]);

        let res = engine.dispatch(Request::new(Method::Get, "/me").with_header("Authorization", "Basic abc"));
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(&res), "invalid authorization header");

        let res = engine.dispatch(Request::new(Method::Get, "/me").with_header("Authorization", "Bearer nope"));
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(&res), "invalid token");
    }

    #[test]
    fn valid_token_exposes_claims() {
        let res = engine(&[]).dispatch(Request::new(Method::Get, "/me").with_header("authorization", "Bearer good"));
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"alice");
    }

    #[test]
    fn listed_routes_skip_the_check() {
        let engine = engine(&["/login"]);
        assert_eq!(engine.dispatch(Request::new(Method::Get, "/login")).body(), b"anonymous");
        assert_eq!(engine.dispatch(Request::new(Method::Get, "/login?next=/me")).body(), b"anonymous");
        assert_eq!(engine.dispatch(Request::new(Method::Get, "/me")).status_code(), StatusCode::UNAUTHORIZED);

        let engine = super::tests::engine(&["*"]);
        assert_eq!(engine.dispatch(Request::new(Method::Get, "/me")).status_code(), StatusCode::OK);
    }

    #[test]
    fn rejected_requests_never_reach_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut engine = Engine::default();
        engine.use_middleware(bearer_auth(verify, Vec::new()));
        engine.get("/count", move |ctx: &mut Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.status(StatusCode::NO_CONTENT);
        });

        engine.dispatch(Request::new(Method::Get, "/count"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        engine.dispatch(Request::new(Method::Get, "/count").with_header("Authorization", "Bearer good"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
