//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, CORS, health probes, timeouts,
//! panic containment and authentication.
//!
//! A [`Middleware`] is a transform from the next handler to a wrapped handler.
//! Most of the time you write one with [`from_fn`]:
//!
//! ```rust
//! use ply::middleware::{self, Next};
//! use ply::{Request, Response};
//!
//! let tag = middleware::from_fn(|req: Request, next: Next| async move {
//!     let mut res: Response = next.call(req).await;
//!     res.headers_mut().insert("x-served-by", "ply".parse().unwrap());
//!     res
//! });
//! ```
//!
//! Built-in middleware:
//! - [`cors`]: CORS headers and preflight short-circuit
//! - [`heartbeat`]: liveness endpoint answered before routing
//! - [`timeout`]: `504` when downstream takes too long
//! - [`recover`]: `500` instead of a torn-down connection on panic
//! - [`trace`]: per-request span with method, path, status, latency

use std::future::Future;
use std::sync::Arc;

use crate::handler::BoxedHandler;
use crate::request::Request;
use crate::response::Response;

mod cors;
mod heartbeat;
pub(crate) mod recover;
mod timeout;
mod trace;

pub use cors::{CorsOptions, cors};
pub use heartbeat::heartbeat;
pub use recover::recover;
pub use timeout::timeout;
pub use trace::trace;

/// The handler a middleware wraps.
pub type Next = BoxedHandler;

/// A transform from "next handler" to "wrapped handler".
///
/// Cheap to clone; a router group copies its parent's chain by cloning each
/// entry.
#[derive(Clone)]
pub struct Middleware(Arc<dyn Fn(Next) -> BoxedHandler + Send + Sync + 'static>);

impl Middleware {
    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(Next) -> BoxedHandler + Send + Sync + 'static,
    {
        Self(Arc::new(wrap))
    }

    pub fn wrap(&self, next: Next) -> BoxedHandler {
        (self.0)(next)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Middleware")
    }
}

/// Builds a middleware from an async closure taking the request and the next
/// handler.
pub fn from_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let f = Arc::new(f);
    Middleware::new(move |next: Next| {
        let f = Arc::clone(&f);
        BoxedHandler::new(move |req: Request| (*f)(req, next.clone()))
    })
}

/// Wraps `handler` with `chain` so the first entry ends up outermost.
pub(crate) fn compose(chain: &[Middleware], handler: BoxedHandler) -> BoxedHandler {
    chain.iter().rev().fold(handler, |next, mw| mw.wrap(next))
}
