//! JSON request decoding and response encoding.
//!
//! [`read_json`] is strict: it insists on the right content type, exactly one
//! JSON value with no keys the target does not know, and a body that passes
//! the target's [`Validate`] rules.
//!
//! ```rust
//! use ply::json::{self, JsonError};
//! use ply::{Request, Response, StatusCode};
//! use serde::Deserialize;
//! use validator::Validate;
//!
//! #[derive(Deserialize, Validate)]
//! struct NewUser {
//!     #[validate(length(min = 1))]
//!     name: String,
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     match json::read_json::<NewUser>(&req) {
//!         Ok(user) => json::write_json(StatusCode::CREATED, &serde_json::json!({ "name": user.name })),
//!         Err(e) => Response::builder().status(StatusCode::BAD_REQUEST).text(e.to_string()),
//!     }
//! }
//! ```

use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::error::Category;
use validator::{Validate, ValidationErrors};

use crate::request::Request;
use crate::response::{IntoResponse, Response};

const APPLICATION_JSON: &str = "application/json";

/// Why a JSON request body was rejected.
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("body content-type header is not application/json")]
    NotJsonContentType,

    #[error("body must not be empty")]
    EmptyBody,

    /// `offset` is `None` when the body ended in the middle of a value.
    #[error("body contains badly-formed JSON{}", describe_offset(.offset))]
    MalformedJson { offset: Option<usize> },

    #[error("body contains incorrect JSON type {}", describe_mismatch(.field, .offset))]
    FieldTypeMismatch { field: Option<String>, offset: usize },

    #[error("body contains unknown key \"{0}\"")]
    UnknownField(String),

    #[error("body is missing required key \"{0}\"")]
    MissingField(String),

    #[error("body must only contain a single JSON value")]
    MultipleJsonValues,

    #[error("body failed validation: {0}")]
    Validation(#[from] ValidationErrors),
}

fn describe_offset(offset: &Option<usize>) -> String {
    offset.map(|o| format!(" (at character {o})")).unwrap_or_default()
}

fn describe_mismatch(field: &Option<String>, offset: &usize) -> String {
    match field {
        Some(field) => format!("for field \"{field}\""),
        None => format!("(at character {offset})"),
    }
}

/// Decodes the request body as exactly one JSON value of type `T`, then
/// validates it.
pub fn read_json<T>(req: &Request) -> Result<T, JsonError>
where
    T: DeserializeOwned + Validate,
{
    if let Some(content_type) = req.headers().get(http::header::CONTENT_TYPE) {
        let is_json = content_type.to_str()
            .map(|ct| ct.is_empty() || ct.eq_ignore_ascii_case(APPLICATION_JSON))
            .unwrap_or(false);
        if !is_json {
            return Err(JsonError::NotJsonContentType);
        }
    }

    let body = req.body();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(JsonError::EmptyBody);
    }

    let mut de = serde_json::Deserializer::from_slice(body);
    let mut track = serde_path_to_error::Track::new();
    let mut unknown: Option<String> = None;
    let decoded: Result<T, serde_json::Error> = serde_ignored::deserialize(
        serde_path_to_error::Deserializer::new(&mut de, &mut track),
        |path: serde_ignored::Path<'_>| {
            unknown.get_or_insert_with(|| path.to_string());
        },
    );
    // An unknown key seen before a later failure is the first problem in the body.
    if let Some(key) = unknown {
        return Err(JsonError::UnknownField(key));
    }
    let value = decoded
        .map_err(|e| classify(body, serde_path_to_error::Error::new(track.path(), e)))?;
    de.end().map_err(|_| JsonError::MultipleJsonValues)?;

    value.validate()?;
    Ok(value)
}

fn classify(body: &[u8], err: serde_path_to_error::Error<serde_json::Error>) -> JsonError {
    let path = err.path().to_string();
    let inner = err.into_inner();
    let offset = byte_offset(body, inner.line(), inner.column());

    match inner.classify() {
        Category::Eof => JsonError::MalformedJson { offset: None },
        Category::Syntax | Category::Io => JsonError::MalformedJson { offset: Some(offset) },
        Category::Data => {
            let message = inner.to_string();
            if let Some(name) = quoted_after(&message, "unknown field `") {
                JsonError::UnknownField(name)
            } else if let Some(name) = quoted_after(&message, "missing field `") {
                JsonError::MissingField(name)
            } else {
                let field = (path != ".").then_some(path);
                JsonError::FieldTypeMismatch { field, offset }
            }
        }
    }
}

/// serde reports names as "unknown field `y`, expected ...".
fn quoted_after(message: &str, prefix: &str) -> Option<String> {
    let rest = message.strip_prefix(prefix)?;
    rest.split('`').next().map(str::to_owned)
}

/// Turns serde_json's 1-based line and column into a byte offset.
fn byte_offset(body: &[u8], line: usize, column: usize) -> usize {
    let preceding: usize = body
        .split(|&b| b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    preceding + column
}

/// Serializes `value` into a JSON response with the given status.
///
/// # Panics
///
/// Panics if `value` cannot be serialized (for example a map with non-string
/// keys). That is a bug in the caller, not a property of the request; put
/// [`recover`](crate::middleware::recover) in the chain to turn it into a 500.
pub fn write_json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
    let body = serde_json::to_vec(value)
        .unwrap_or_else(|e| panic!("failed to serialize JSON response: {e}"));
    Response::builder().status(status).json(body)
}

/// A `200 OK` JSON response. Return it straight from a handler.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        write_json(StatusCode::OK, &self.0)
    }
}
