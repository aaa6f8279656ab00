//! Panic containment for request handlers.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use http::StatusCode;
use tracing::error;

use crate::middleware::{Middleware, from_fn};
use crate::request::Request;
use crate::response::Response;

/// Turns a panic anywhere downstream into `500 Internal Server Error`.
///
/// Without it, a panicking handler takes its connection task down with it and
/// the client sees the connection drop. Register it first so it sits
/// outermost and also covers the other middleware.
pub fn recover() -> Middleware {
    from_fn(|req: Request, next| async move {
        let method = req.method().clone();
        let path = req.path().to_owned();
        // Calling `next` runs the handler's synchronous prologue, so it belongs
        // inside the guarded future too.
        match AssertUnwindSafe(async move { next.call(req).await }).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => {
                error!(%method, %path, panic = panic_message(&*panic), "recovered panic from request handler");
                Response::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    })
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxedHandler;

    #[tokio::test]
    async fn panic_in_handler_becomes_500() {
        let boom = BoxedHandler::new(|_req: Request| async {
            if true {
                panic!("boom");
            }
            "unreachable"
        });
        let res = recover().wrap(boom).call(Request::get("/boom")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn panic_before_the_future_is_built_is_caught() {
        let boom = BoxedHandler::new(|_req: Request| -> std::future::Ready<&'static str> {
            panic!("eager boom")
        });
        let res = recover().wrap(boom).call(Request::get("/")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn healthy_handler_passes_through() {
        let ok = BoxedHandler::new(|_req: Request| async { "fine" });
        let res = recover().wrap(ok).call(Request::get("/")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    #[test]
    fn extracts_string_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*borrowed), "borrowed");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }
}
