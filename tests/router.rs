use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use ply::middleware::{self, CorsOptions, Middleware, Next};
use ply::{Method, Request, Response, Router, StatusCode, header};

type Log = Arc<Mutex<Vec<String>>>;

fn request(method: Method, uri: &str) -> Request {
    Request::from(
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap(),
    )
}

fn recording(log: &Log, name: &'static str) -> Middleware {
    let log = Arc::clone(log);
    middleware::from_fn(move |req: Request, next: Next| {
        let log = Arc::clone(&log);
        async move {
            log.lock().unwrap().push(format!("{name} in"));
            let res = next.call(req).await;
            log.lock().unwrap().push(format!("{name} out"));
            res
        }
    })
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn group_chain_wraps_handler_in_onion_order() {
    let log = Log::default();
    let mut app = Router::new();

    let handler_log = Arc::clone(&log);
    app.group(|g| {
        g.use_middleware(recording(&log, "m1"));
        g.use_middleware(recording(&log, "m2"));
        g.handle_func("GET /onion", move |_req: Request| {
            let log = Arc::clone(&handler_log);
            async move {
                log.lock().unwrap().push("handler".to_owned());
                "ok"
            }
        });
    });

    let res = app.serve_http(request(Method::GET, "/onion")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(entries(&log), ["m1 in", "m2 in", "handler", "m2 out", "m1 out"]);
}

#[tokio::test]
async fn global_chain_runs_before_group_chain() {
    let log = Log::default();
    let mut app = Router::new();
    app.use_middleware(recording(&log, "global"));
    app.group(|g| {
        g.use_middleware(recording(&log, "group"));
        g.handle_func("/x", |_req: Request| async { "x" });
    });

    app.serve_http(request(Method::POST, "/x")).await;
    assert_eq!(entries(&log), ["global in", "group in", "group out", "global out"]);
}

#[tokio::test]
async fn nested_groups_inherit_but_do_not_leak() {
    let log = Log::default();
    let mut app = Router::new();
    app.group(|outer| {
        outer.use_middleware(recording(&log, "outer"));
        outer.group(|inner| {
            inner.use_middleware(recording(&log, "inner"));
            inner.handle_func("GET /deep", |_req: Request| async { "deep" });
        });
        outer.handle_func("GET /shallow", |_req: Request| async { "shallow" });
    });
    app.handle_func("GET /bare", |_req: Request| async { "bare" });

    app.serve_http(request(Method::GET, "/deep")).await;
    assert_eq!(entries(&log), ["outer in", "inner in", "inner out", "outer out"]);

    log.lock().unwrap().clear();
    app.serve_http(request(Method::GET, "/shallow")).await;
    assert_eq!(entries(&log), ["outer in", "outer out"]);

    log.lock().unwrap().clear();
    let res = app.serve_http(request(Method::GET, "/bare")).await;
    assert_eq!(res.body().as_ref(), b"bare");
    assert!(entries(&log).is_empty());
}

#[tokio::test]
async fn path_parameters_reach_the_handler() {
    let mut app = Router::new();
    app.handle_func("GET /users/{id}/files/{path...}", |req: Request| async move {
        format!("{}:{}", req.param("id").unwrap_or("-"), req.param("path").unwrap_or("-"))
    });

    let res = app.serve_http(request(Method::GET, "/users/7/files/a/b.txt")).await;
    assert_eq!(res.body().as_ref(), b"7:a/b.txt");
}

#[tokio::test]
async fn unmatched_path_is_404_but_global_chain_still_runs() {
    let log = Log::default();
    let mut app = Router::new();
    app.use_middleware(recording(&log, "global"));
    app.group(|g| {
        g.use_middleware(recording(&log, "group"));
        g.handle_func("GET /known", |_req: Request| async { "known" });
    });

    let res = app.serve_http(request(Method::GET, "/unknown")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(res.body().as_ref(), b"404 page not found\n");
    assert_eq!(entries(&log), ["global in", "global out"]);
}

#[tokio::test]
async fn wrong_method_is_405_with_allow() {
    let mut app = Router::new();
    app.handle_func("GET /items", |_req: Request| async { "items" });
    app.handle_func("POST /items", |_req: Request| async { StatusCode::CREATED });

    let res = app.serve_http(request(Method::DELETE, "/items")).await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.headers()[header::ALLOW], "GET, HEAD, POST");

    let res = app.serve_http(request(Method::HEAD, "/items")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn heartbeat_answers_before_routing() {
    let mut app = Router::new();
    app.use_middleware(middleware::heartbeat("/healthz"));

    let res = app.serve_http(request(Method::GET, "/healthz")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(res.body().as_ref(), br#"{"response": "ok"}"#);

    let res = app.serve_http(request(Method::GET, "/elsewhere")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_preflight_never_reaches_the_table() {
    let mut app = Router::new();
    app.use_middleware(middleware::cors(CorsOptions::default()));
    app.handle_func("GET /api", |_req: Request| async { "api" });

    let preflight = Request::from(
        http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/api")
            .header("origin", "https://app.example")
            .header("access-control-request-method", "GET")
            .body(Bytes::new())
            .unwrap(),
    );
    let res = app.serve_http(preflight).await;
    assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let res = app.serve_http(request(Method::GET, "/api")).await;
    assert_eq!(res.body().as_ref(), b"api");
    assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test(start_paused = true)]
async fn global_timeout_covers_slow_routes() {
    let mut app = Router::new();
    app.use_middleware(middleware::timeout(Duration::from_millis(50)));
    app.handle_func("GET /slow", |_req: Request| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Response::text("too late")
    });

    let res = app.serve_http(request(Method::GET, "/slow")).await;
    assert_eq!(res.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(res.body().as_ref(), br#"{"response": "timeout"}"#);
}

#[tokio::test]
async fn recover_turns_group_panic_into_500() {
    let mut app = Router::new();
    app.use_middleware(middleware::recover());
    app.group(|g| {
        g.handle_func("GET /boom", |_req: Request| async {
            if true {
                panic!("handler exploded");
            }
            "unreachable"
        });
    });

    let res = app.serve_http(request(Method::GET, "/boom")).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn context_flows_from_group_middleware_to_handler() {
    use ply::context::{self, CurrentUser};

    let mut app = Router::new();
    app.group(|authed| {
        authed.use_middleware(middleware::from_fn(|mut req: Request, next: Next| async move {
            req.insert_context(CurrentUser {
                id: "1".into(),
                email: "grace@example.com".into(),
                username: "grace".into(),
            });
            next.call(req).await
        }));
        authed.handle_func("GET /me", |req: Request| async move {
            match context::current_user_username(&req) {
                Ok(name) => Response::text(name.to_owned()),
                Err(_) => Response::status(StatusCode::UNAUTHORIZED),
            }
        });
    });
    app.handle_func("GET /anon", |req: Request| async move {
        match context::current_user(&req) {
            Ok(_) => StatusCode::OK,
            Err(_) => StatusCode::UNAUTHORIZED,
        }
    });

    let res = app.serve_http(request(Method::GET, "/me")).await;
    assert_eq!(res.body().as_ref(), b"grace");

    let res = app.serve_http(request(Method::GET, "/anon")).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
}

#[test]
#[should_panic(expected = "invalid route")]
fn conflicting_routes_across_groups_panic() {
    let mut app = Router::new();
    app.handle_func("GET /dup", |_req: Request| async { "a" });
    app.group(|g| {
        g.handle_func("GET /dup", |_req: Request| async { "b" });
    });
}
