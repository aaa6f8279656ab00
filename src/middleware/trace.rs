//! Per-request tracing span.

use std::time::Instant;

use tracing::{Instrument, info, info_span};

use crate::middleware::{Middleware, from_fn};
use crate::request::Request;

/// Opens a `request` span carrying method and path, and logs status and
/// latency when the response is ready. Events emitted by handlers nest under
/// the span.
pub fn trace() -> Middleware {
    from_fn(|req: Request, next| {
        let span = info_span!("request", method = %req.method(), path = %req.path());
        async move {
            let started = Instant::now();
            let res = next.call(req).await;
            info!(
                status = res.status_code().as_u16(),
                latency_us = started.elapsed().as_micros() as u64,
                "request completed"
            );
            res
        }
        .instrument(span)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxedHandler;

    #[tokio::test]
    async fn response_passes_through_unchanged() {
        let handler = BoxedHandler::new(|_req: Request| async { (http::StatusCode::CREATED, "made") });
        let res = trace().wrap(handler).call(Request::get("/things")).await;
        assert_eq!(res.status_code(), http::StatusCode::CREATED);
        assert_eq!(res.body().as_ref(), b"made");
    }
}
