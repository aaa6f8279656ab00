//! The multiplexing table: pattern → terminal handler.
//!
//! One radix tree per HTTP method plus one for patterns registered without a
//! method. O(path-length) lookup via [`matchit`].
//!
//! Patterns look like `"/users/{id}"` or `"GET /users/{id}"`. A trailing
//! `{name...}` segment captures the rest of the path. A pattern ending in `/`
//! matches that path and everything below it (`"/static/"` serves
//! `/static/app.js`); append `{$}` to match the slash path alone (`"/{$}"`
//! is the root and nothing else).
//!
//! Precedence is by tree, not by specificity: a request tries its method's
//! tree, then `GET` for `HEAD`, then the method-less tree. So `"GET /files/{p...}"`
//! answers `GET /files/readme` even when `"/files/readme"` is also registered;
//! the method-less route still serves every other method.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use http::header::{self, HeaderValue};
use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::response::Response;

type Tree = MatchitRouter<BoxedHandler>;

/// Shared by every router in a tree. Written during setup, read while serving.
#[derive(Default)]
pub(crate) struct Mux {
    table: RwLock<Table>,
}

#[derive(Default)]
struct Table {
    by_method: HashMap<Method, Tree>,
    any_method: Tree,
}

enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl Mux {
    /// Registers `handler` under `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is invalid or conflicts with an existing route.
    /// Both are configuration errors that should stop the process at startup.
    pub(crate) fn register(&self, pattern: &str, handler: BoxedHandler) {
        let (method, paths) = parse_pattern(pattern);
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let tree = match &method {
            Some(method) => table.by_method.entry(method.clone()).or_default(),
            None => &mut table.any_method,
        };
        for path in paths {
            tree.insert(path, handler.clone())
                .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
        }
        debug!(pattern, "route registered");
    }

    pub(crate) fn handler(self: &Arc<Self>) -> BoxedHandler {
        BoxedHandler::from_erased(Arc::clone(self) as Arc<dyn ErasedHandler + Send + Sync>)
    }

    fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);

        let mut candidates = vec![table.by_method.get(method)];
        if *method == Method::HEAD {
            candidates.push(table.by_method.get(&Method::GET));
        }
        candidates.push(Some(&table.any_method));

        for tree in candidates.into_iter().flatten() {
            if let Ok(matched) = tree.at(path) {
                let params = matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                return Lookup::Found(matched.value.clone(), params);
            }
        }

        let mut allowed: Vec<Method> = table.by_method.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();
        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Lookup::MethodNotAllowed(allowed)
    }
}

impl ErasedHandler for Mux {
    fn call(&self, mut req: Request) -> BoxFuture {
        let lookup = self.lookup(req.method(), req.path());
        match lookup {
            Lookup::Found(handler, params) => {
                req.params = params;
                handler.call(req)
            }
            Lookup::MethodNotAllowed(allowed) => Box::pin(async move { method_not_allowed(&allowed) }),
            Lookup::NotFound => Box::pin(async { not_found() }),
        }
    }
}

fn not_found() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .text("404 page not found\n")
}

fn method_not_allowed(allowed: &[Method]) -> Response {
    let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    let mut res = Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .text("Method Not Allowed\n");
    if let Ok(value) = HeaderValue::from_str(&allow) {
        res.headers_mut().insert(header::ALLOW, value);
    }
    res
}

/// Catch-all parameter behind a subtree pattern such as `"/static/"`.
const SUBTREE_PARAM: &str = "__subtree";

/// Splits `"GET /path"` into its method and the matchit paths to register.
///
/// # Panics
///
/// Panics on an unrecognised method token or a misplaced `{$}`.
fn parse_pattern(pattern: &str) -> (Option<Method>, Vec<String>) {
    let pattern = pattern.trim();
    let (method, path) = match pattern.split_once(char::is_whitespace) {
        Some((method, path)) if !method.starts_with('/') => {
            let method = Method::from_bytes(method.as_bytes())
                .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
            (Some(method), path.trim_start())
        }
        _ => (None, pattern),
    };
    let paths = translate_path(path)
        .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
    (method, paths)
}

fn translate_path(path: &str) -> Result<Vec<String>, &'static str> {
    if let Some(exact) = path.strip_suffix("{$}") {
        if !exact.ends_with('/') {
            return Err("`{$}` must follow a `/`");
        }
        if exact.contains("{$}") {
            return Err("`{$}` may only end a pattern");
        }
        return Ok(vec![translate_wildcards(exact)]);
    }
    if path.contains("{$}") {
        return Err("`{$}` may only end a pattern");
    }

    let translated = translate_wildcards(path);
    if translated.ends_with('/') {
        let subtree = format!("{translated}{{*{SUBTREE_PARAM}}}");
        Ok(vec![translated, subtree])
    } else {
        Ok(vec![translated])
    }
}

/// Rewrites `{name...}` into the catch-all syntax matchit expects.
fn translate_wildcards(path: &str) -> String {
    path.split('/')
        .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix("...}")) {
            Some(name) => format!("{{*{name}}}"),
            None => segment.to_owned(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
