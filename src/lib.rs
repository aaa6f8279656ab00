//! # ply
//!
//! A small HTTP router for Rust services, built on hyper, with two layers of
//! middleware.
//!
//! ## The model
//!
//! - The **global chain** wraps the whole routing table. It runs for every
//!   request, including ones no route matches, so it is where tracing, panic
//!   recovery, CORS, health probes and timeouts belong.
//! - A **group** is a scoped view of the router. Middleware added inside a
//!   group wraps only the routes registered inside it (and inside its nested
//!   groups), and never leaks back out.
//! - All groups register into one shared table, so one lookup resolves every
//!   route regardless of which group declared it.
//!
//! Around the router sit a handful of request helpers: strict JSON decoding
//! ([`json`]), form and multipart decoding ([`form`]), typed per-request
//! values ([`context`]) and panic-safe background work ([`background`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use ply::{json, middleware, Request, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut app = Router::new();
//!     app.use_middleware(middleware::recover())
//!         .use_middleware(middleware::trace())
//!         .use_middleware(middleware::heartbeat("/healthz"))
//!         .use_middleware(middleware::timeout(Duration::from_secs(10)))
//!         .handle_func("GET /users/{id}", get_user);
//!
//!     app.group(|admin| {
//!         admin.use_middleware(middleware::from_fn(|req, next: middleware::Next| async move {
//!             if req.header("x-admin") != Some("yes") {
//!                 return Response::status(StatusCode::FORBIDDEN);
//!             }
//!             next.call(req).await
//!         }));
//!         admin.handle_func("DELETE /users/{id}", delete_user);
//!     });
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     json::write_json(StatusCode::OK, &serde_json::json!({ "id": id }))
//! }
//!
//! async fn delete_user(_req: Request) -> StatusCode {
//!     StatusCode::NO_CONTENT
//! }
//! ```

mod error;
mod handler;
mod mux;
mod request;
mod response;
mod router;
mod server;

pub mod background;
pub mod context;
pub mod form;
pub mod json;
pub mod middleware;

pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, Handler};
pub use http::{Method, StatusCode, header};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::{DEFAULT_MAX_BODY_SIZE, Server};
