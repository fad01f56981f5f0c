use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use http::StatusCode;
use tracing::error;

use crate::context::Context;

/// Catches panics from the rest of the chain.
///
/// Whatever the panicking handler had written is thrown away and replaced
/// with an empty `500`; the panic message goes to the log, never to the
/// client. The chain is aborted, and middleware outside this one (if any)
/// still run their post-processing.
pub fn recovery(ctx: &mut Context) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.next())) {
        error!(
            method = %ctx.request().method(),
            path = %ctx.request().path(),
            "recovered from panic: {}",
            panic_message(&*payload),
        );
        ctx.writer_mut().discard();
        ctx.abort_with_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
