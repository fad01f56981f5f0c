use std::time::Instant;

use tracing::info;

use crate::context::Context;

/// Logs one event per request once the rest of the chain has finished.
///
/// Fields: `method`, `uri` (path plus query string, as on the request
/// line), `status`, `bytes`, `latency`, and `remote` when the request came
/// in over a socket.
pub fn logger(ctx: &mut Context) {
    let start = Instant::now();
    ctx.next();
    let latency = start.elapsed();

    let req = ctx.request();
    let writer = ctx.writer();
    info!(
        method = %req.method(),
        uri = %req.request_uri(),
        status = writer.status().as_u16(),
        bytes = writer.size(),
        latency = ?latency,
        remote = ?req.remote_addr(),
        "request",
    );
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::engine::Engine;
    use crate::method::Method;
    use crate::request::Request;

    #[test]
    fn passes_the_response_through() {
        let mut engine = Engine::default();
        engine.use_middleware(logger);
        engine.get("/users/{id}", |ctx: &mut Context| ctx.text(StatusCode::ACCEPTED, "queued"));

        let res = engine.dispatch(Request::new(Method::Get, "/users/3?verbose=1"));
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(res.body(), b"queued");
    }
}
