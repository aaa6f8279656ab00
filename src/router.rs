//! Request router with a two-tier middleware chain.
//!
//! The root router owns the **global chain**, which wraps the whole
//! multiplexing table and runs for every request, matched or not. Groups own a
//! **route chain**, which is baked into each handler at registration time.
//!
//! ```text
//! request → global[0] → global[1] → mux → route[0] → route[1] → handler
//! ```
//!
//! Every middleware list is applied first-registered-outermost, so it runs
//! first on the way in and last on the way out.

use std::sync::Arc;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{self, Middleware};
use crate::mux::Mux;
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup, then pass it to [`Server::serve`](crate::Server::serve).
///
/// ```rust,no_run
/// # use std::time::Duration;
/// # use ply::{middleware, Request, Response, Router, StatusCode};
/// # async fn list_users(_: Request) -> Response { Response::text("") }
/// # async fn ban_user(_: Request) -> Response { Response::text("") }
/// let require_admin = middleware::from_fn(|req: Request, next: middleware::Next| async move {
///     if req.header("x-role") != Some("admin") {
///         return Response::status(StatusCode::FORBIDDEN);
///     }
///     next.call(req).await
/// });
///
/// let mut app = Router::new();
/// app.use_middleware(middleware::recover())
///     .use_middleware(middleware::timeout(Duration::from_secs(10)))
///     .handle_func("GET /users", list_users);
///
/// app.group(|admin| {
///     admin.use_middleware(require_admin);
///     admin.handle_func("POST /users/{id}/ban", ban_user);
/// });
/// ```
pub struct Router {
    global_chain: Vec<Middleware>,
    route_chain: Vec<Middleware>,
    is_sub_router: bool,
    mux: Arc<Mux>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            global_chain: Vec::new(),
            route_chain: Vec::new(),
            is_sub_router: false,
            mux: Arc::new(Mux::default()),
        }
    }

    /// Appends a middleware.
    ///
    /// On the root router it joins the global chain and wraps every request.
    /// Inside a [`group`](Router::group) it joins that group's route chain and
    /// wraps only handlers registered afterwards through the group.
    pub fn use_middleware(&mut self, mw: Middleware) -> &mut Self {
        self.chain_mut().push(mw);
        self
    }

    /// Appends several middleware, preserving their order.
    pub fn use_chain(&mut self, mws: impl IntoIterator<Item = Middleware>) -> &mut Self {
        self.chain_mut().extend(mws);
        self
    }

    fn chain_mut(&mut self) -> &mut Vec<Middleware> {
        if self.is_sub_router { &mut self.route_chain } else { &mut self.global_chain }
    }

    /// Runs `configure` against a sub-router that shares this router's table.
    ///
    /// The sub-router starts with a copy of this router's route chain. Whatever
    /// it adds stays local to it; siblings and the parent never see it.
    pub fn group(&mut self, configure: impl FnOnce(&mut Router)) -> &mut Self {
        let mut sub = Router {
            global_chain: Vec::new(),
            route_chain: self.route_chain.clone(),
            is_sub_router: true,
            mux: Arc::clone(&self.mux),
        };
        configure(&mut sub);
        self
    }

    /// Registers an already-erased handler under `pattern`, wrapped in the
    /// current route chain.
    ///
    /// Patterns may carry a method (`"GET /users/{id}"`) or not (`"/users"`,
    /// any method). `{name}` captures one segment and `{name...}` the rest of
    /// the path.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is invalid or conflicts with a route already
    /// registered anywhere in this router tree.
    pub fn handle(&mut self, pattern: &str, handler: BoxedHandler) -> &mut Self {
        let wrapped = middleware::compose(&self.route_chain, handler);
        self.mux.register(pattern, wrapped);
        self
    }

    /// Registers an `async fn` (or closure) under `pattern`. See [`handle`](Router::handle).
    pub fn handle_func(&mut self, pattern: &str, handler: impl Handler) -> &mut Self {
        self.handle(pattern, handler.into_boxed_handler())
    }

    /// Dispatches one request through the global chain into the table.
    ///
    /// The global chain is composed per call, so middleware added between two
    /// dispatches takes effect on the second.
    pub async fn serve_http(&self, req: Request) -> Response {
        middleware::compose(&self.global_chain, self.mux.handler())
            .call(req)
            .await
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("global_chain", &self.global_chain.len())
            .field("route_chain", &self.route_chain.len())
            .field("is_sub_router", &self.is_sub_router)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::middleware::from_fn;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn mark(log: &Log, name: &'static str) -> Middleware {
        let log = Arc::clone(log);
        from_fn(move |req, next| {
            log.lock().unwrap().push(name);
            next.call(req)
        })
    }

    fn noop() -> Middleware {
        Middleware::new(|next| next)
    }

    #[test]
    fn new_router_is_empty_root() {
        let r = Router::new();
        assert!(!r.is_sub_router);
        assert!(r.global_chain.is_empty());
        assert!(r.route_chain.is_empty());
    }

    #[test]
    fn use_on_root_goes_to_global_chain() {
        let mut r = Router::new();
        r.use_middleware(noop()).use_chain([noop(), noop()]);
        assert_eq!(r.global_chain.len(), 3);
        assert!(r.route_chain.is_empty());
    }

    #[test]
    fn groups_share_the_root_table() {
        let mut r = Router::new();
        let root_mux = Arc::clone(&r.mux);
        let mut called = false;
        r.group(|sub| {
            assert!(sub.is_sub_router);
            assert!(Arc::ptr_eq(&sub.mux, &root_mux));
            sub.group(|nested| assert!(Arc::ptr_eq(&nested.mux, &root_mux)));
            called = true;
        });
        assert!(called);
    }

    #[test]
    fn group_chain_is_a_snapshot() {
        let mut r = Router::new();
        r.group(|parent| {
            parent.use_middleware(noop());
            parent.group(|child| {
                assert_eq!(child.route_chain.len(), 1);
                child.use_middleware(noop());
                child.use_middleware(noop());
                assert!(child.global_chain.is_empty());
            });
            parent.group(|sibling| assert_eq!(sibling.route_chain.len(), 1));
            assert_eq!(parent.route_chain.len(), 1);
        });
        assert!(r.global_chain.is_empty());
        assert!(r.route_chain.is_empty());
    }

    #[tokio::test]
    async fn group_middleware_does_not_leak_to_plain_routes() {
        let log: Log = Arc::default();
        let mut r = Router::new();
        r.group(|sub| {
            sub.use_middleware(mark(&log, "group"));
            sub.handle_func("/group", |_req: Request| async { "group" });
        });
        r.handle_func("/normal", |_req: Request| async { "normal" });

        r.serve_http(Request::get("/group")).await;
        assert_eq!(*log.lock().unwrap(), ["group"]);

        log.lock().unwrap().clear();
        r.serve_http(Request::get("/normal")).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registration_freezes_the_route_chain() {
        let log: Log = Arc::default();
        let mut r = Router::new();
        r.group(|sub| {
            sub.use_middleware(mark(&log, "early"));
            sub.handle_func("/before", |_req: Request| async { "" });
            sub.use_middleware(mark(&log, "late"));
        });

        r.serve_http(Request::get("/before")).await;
        assert_eq!(*log.lock().unwrap(), ["early"]);
    }

    #[tokio::test]
    async fn handle_takes_an_erased_handler() {
        let mut r = Router::new();
        r.handle("/made", BoxedHandler::new(|_req: Request| async { StatusCode::CREATED }));
        let res = r.serve_http(Request::get("/made")).await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn unmatched_request_still_passes_global_chain() {
        let log: Log = Arc::default();
        let mut r = Router::new();
        r.use_middleware(mark(&log, "global"));
        r.group(|sub| {
            sub.use_middleware(mark(&log, "group"));
            sub.handle_func("/x", |_req: Request| async { "" });
        });

        let res = r.serve_http(Request::get("/missing")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(*log.lock().unwrap(), ["global"]);
    }
}
