//! Typed per-request context.
//!
//! Middleware earlier in the chain (typically authentication) stores values on
//! the request with [`Request::insert_context`]; handlers read them back with
//! [`Request::context`]. Reading a value nobody stored is an ordinary error,
//! not a panic, so a handler mounted outside the authenticated group fails
//! with a response of your choosing.
//!
//! ```rust
//! use ply::context::CurrentUser;
//! use ply::middleware::{self, Next};
//! use ply::{Request, Response, StatusCode};
//!
//! let authenticate = middleware::from_fn(|mut req: Request, next: Next| async move {
//!     if req.header("authorization") != Some("Bearer let-me-in") {
//!         return Response::status(StatusCode::UNAUTHORIZED);
//!     }
//!     req.insert_context(CurrentUser {
//!         id: "42".into(),
//!         email: "ada@example.com".into(),
//!         username: "ada".into(),
//!     });
//!     next.call(req).await
//! });
//!
//! async fn whoami(req: Request) -> Response {
//!     match ply::context::current_user_username(&req) {
//!         Ok(name) => Response::text(name.to_owned()),
//!         Err(_) => Response::status(StatusCode::UNAUTHORIZED),
//!     }
//! }
//! ```

use std::any::type_name;

use crate::request::Request;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("request context has no `{0}` value")]
    Missing(&'static str),
}

/// The authenticated caller, as established by an authentication middleware.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub username: String,
}

impl Request {
    /// Stores `value` for handlers further down the chain. A second value of
    /// the same type replaces the first.
    pub fn insert_context<T: Clone + Send + Sync + 'static>(&mut self, value: T) {
        self.extensions_mut().insert(value);
    }

    /// Reads the value of type `T` stored by an earlier middleware.
    pub fn context<T: Send + Sync + 'static>(&self) -> Result<&T, ContextError> {
        self.extensions().get::<T>().ok_or(ContextError::Missing(type_name::<T>()))
    }
}

pub fn current_user(req: &Request) -> Result<&CurrentUser, ContextError> {
    req.context::<CurrentUser>()
}

pub fn current_user_id(req: &Request) -> Result<&str, ContextError> {
    current_user(req).map(|u| u.id.as_str())
}

pub fn current_user_email(req: &Request) -> Result<&str, ContextError> {
    current_user(req).map(|u| u.email.as_str())
}

pub fn current_user_username(req: &Request) -> Result<&str, ContextError> {
    current_user(req).map(|u| u.username.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ada() -> CurrentUser {
        CurrentUser { id: "42".into(), email: "ada@example.com".into(), username: "ada".into() }
    }

    #[test]
    fn accessors_read_the_stored_user() {
        let mut req = Request::get("/me");
        req.insert_context(ada());
        assert_eq!(current_user_id(&req), Ok("42"));
        assert_eq!(current_user_email(&req), Ok("ada@example.com"));
        assert_eq!(current_user_username(&req), Ok("ada"));
    }

    #[test]
    fn absent_user_is_an_error() {
        let req = Request::get("/me");
        let err = current_user_id(&req).unwrap_err();
        assert!(matches!(err, ContextError::Missing(name) if name.ends_with("CurrentUser")));
    }

    #[test]
    fn arbitrary_types_round_trip() {
        #[derive(Clone, Debug, PartialEq)]
        struct TenantId(u32);

        let mut req = Request::get("/");
        assert!(req.context::<TenantId>().is_err());
        req.insert_context(TenantId(7));
        assert_eq!(req.context::<TenantId>(), Ok(&TenantId(7)));
    }
}
