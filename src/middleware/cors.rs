//! Cross-origin resource sharing.

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde::Deserialize;

use crate::middleware::{Middleware, from_fn};
use crate::request::Request;
use crate::response::Response;

/// CORS policy.
///
/// `Default` is a permissive policy suitable for public APIs. Derives
/// `Deserialize` so it can live in an application's own config file; missing
/// keys fall back to the defaults.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorsOptions {
    /// `["*"]` allows any origin. Anything else is an exact-match allow-list.
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    /// Preflight cache lifetime in seconds. `0` omits the header.
    pub max_age: u64,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .map(str::to_owned)
                .to_vec(),
            allowed_headers: vec!["Content-Type".to_owned(), "Authorization".to_owned()],
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age: 86_400,
        }
    }
}

impl CorsOptions {
    fn allows_any_origin(&self) -> bool {
        matches!(self.allowed_origins.as_slice(), [only] if only == "*")
    }

    /// Headers every response gets, preflight or not.
    fn origin_headers(&self, origin: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if self.allows_any_origin() {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        } else if let Some(origin) = origin.filter(|o| self.allowed_origins.iter().any(|a| a == o)) {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.insert(header::VARY, HeaderValue::from_static("Origin"));
            }
        }
        if self.allow_credentials {
            headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        headers
    }

    fn preflight_headers(&self, headers: &mut HeaderMap) {
        insert_list(headers, header::ACCESS_CONTROL_ALLOW_METHODS, &self.allowed_methods);
        insert_list(headers, header::ACCESS_CONTROL_ALLOW_HEADERS, &self.allowed_headers);
        insert_list(headers, header::ACCESS_CONTROL_EXPOSE_HEADERS, &self.exposed_headers);
        if self.max_age > 0 {
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age));
        }
    }
}

fn insert_list(headers: &mut HeaderMap, name: HeaderName, values: &[String]) {
    if values.is_empty() {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&values.join(", ")) {
        headers.insert(name, value);
    }
}

/// Applies `options` to every response and answers `OPTIONS` preflights with
/// `204 No Content` without calling downstream.
///
/// Headers the downstream handler set itself are left alone.
pub fn cors(options: CorsOptions) -> Middleware {
    let options = std::sync::Arc::new(options);
    from_fn(move |req: Request, next| {
        let options = std::sync::Arc::clone(&options);
        async move {
            let mut headers = options.origin_headers(req.header("origin"));

            if req.method() == Method::OPTIONS {
                options.preflight_headers(&mut headers);
                let mut res = Response::status(StatusCode::NO_CONTENT);
                *res.headers_mut() = headers;
                return res;
            }

            let mut res = next.call(req).await;
            for (name, value) in headers {
                if let Some(name) = name {
                    res.headers_mut().entry(name).or_insert(value);
                }
            }
            res
        }
    })
}
