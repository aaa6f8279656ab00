//! Liveness probe answered ahead of routing.
//!
//! Kubernetes (or any load balancer) only needs to know the process can still
//! answer HTTP. Mount this on the root router so the probe never touches
//! routing, authentication or any other middleware registered after it.

use std::sync::Arc;

use http::{Method, StatusCode};

use crate::middleware::{Middleware, from_fn};
use crate::request::Request;
use crate::response::Response;

pub(crate) const HEALTH_BODY: &str = r#"{"response": "ok"}"#;

/// Answers `GET`/`HEAD` on `endpoint` (path compared case-insensitively) with
/// `200 OK` and `{"response": "ok"}`. Everything else passes through.
pub fn heartbeat(endpoint: impl Into<String>) -> Middleware {
    let endpoint: String = endpoint.into();
    let endpoint: Arc<str> = endpoint.into();
    from_fn(move |req: Request, next| {
        let probe = (req.method() == Method::GET || req.method() == Method::HEAD)
            && req.path().eq_ignore_ascii_case(&endpoint);
        async move {
            if probe {
                return Response::builder().status(StatusCode::OK).json(HEALTH_BODY);
            }
            next.call(req).await
        }
    })
}
