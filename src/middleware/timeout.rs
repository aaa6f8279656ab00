//! Deadline on downstream handling.

use std::time::Duration;

use http::StatusCode;
use tracing::warn;

use crate::middleware::{Middleware, from_fn};
use crate::request::Request;
use crate::response::Response;

pub(crate) const TIMEOUT_BODY: &str = r#"{"response": "timeout"}"#;

/// Races downstream against `duration`.
///
/// If the deadline wins, the downstream future is dropped (cancelling the
/// handler at its next `.await`) and the client gets `504 Gateway Timeout`
/// with `{"response": "timeout"}`. Only one of the two ever produces the
/// response.
pub fn timeout(duration: Duration) -> Middleware {
    from_fn(move |req: Request, next| async move {
        let method = req.method().clone();
        let path = req.path().to_owned();
        match tokio::time::timeout(duration, next.call(req)).await {
            Ok(res) => res,
            Err(_) => {
                warn!(%method, %path, ?duration, "request timed out");
                Response::builder()
                    .status(StatusCode::GATEWAY_TIMEOUT)
                    .json(TIMEOUT_BODY)
            }
        }
    })
}
