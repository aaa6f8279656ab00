//! Minimal ply example: a public API, an authenticated group, and the usual
//! global middleware.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/healthz
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -H 'authorization: Bearer let-me-in' \
//!        -d '{"name":"alice","email":"alice@example.com"}'
//!   curl http://localhost:3000/me -H 'authorization: Bearer let-me-in'

use std::time::Duration;

use ply::context::{self, CurrentUser};
use ply::middleware::{self, CorsOptions, Next};
use ply::{Request, Response, Router, Server, StatusCode, background, json};
use serde::Deserialize;
use validator::Validate;

#[derive(Deserialize, Validate)]
struct CreateUser {
    #[validate(length(min = 1, max = 64))]
    name: String,
    #[validate(email)]
    email: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut app = Router::new();
    app.use_middleware(middleware::recover())
        .use_middleware(middleware::trace())
        .use_middleware(middleware::heartbeat("/healthz"))
        .use_middleware(middleware::cors(CorsOptions::default()))
        .use_middleware(middleware::timeout(Duration::from_secs(10)));

    app.handle_func("GET /users/{id}", get_user);

    app.group(|authed| {
        authed.use_middleware(middleware::from_fn(authenticate));
        authed.handle_func("POST /users", create_user);
        authed.handle_func("GET /me", me);
    });

    if let Err(e) = Server::bind("0.0.0.0:3000").serve(app).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

async fn authenticate(mut req: Request, next: Next) -> Response {
    if req.header("authorization") != Some("Bearer let-me-in") {
        return Response::status(StatusCode::UNAUTHORIZED);
    }
    req.insert_context(CurrentUser {
        id: "1".into(),
        email: "admin@example.com".into(),
        username: "admin".into(),
    });
    next.call(req).await
}

// GET /users/{id}
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown");
    json::write_json(StatusCode::OK, &serde_json::json!({ "id": id, "name": "alice" }))
}

// POST /users
async fn create_user(req: Request) -> Response {
    let input: CreateUser = match json::read_json(&req) {
        Ok(input) => input,
        Err(e) => {
            return json::write_json(StatusCode::BAD_REQUEST, &serde_json::json!({ "error": e.to_string() }));
        }
    };

    let email = input.email.clone();
    background::spawn(async move {
        tracing::info!(%email, "sending welcome email");
    });

    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(serde_json::json!({ "id": "99", "name": input.name }).to_string())
}

// GET /me
async fn me(req: Request) -> Response {
    match context::current_user(&req) {
        Ok(user) => json::write_json(
            StatusCode::OK,
            &serde_json::json!({ "id": user.id, "email": user.email, "username": user.username }),
        ),
        Err(_) => Response::status(StatusCode::UNAUTHORIZED),
    }
}
