//! Behaviour of the ingress filter chain, driven through the router.

mod common;

use std::time::Duration;

use axum::{
    body::Body,
    extract::RawQuery,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, COOKIE, ORIGIN, RETRY_AFTER, USER_AGENT,
        },
        Method, StatusCode,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use pet_report_gateway::http::{ApiResponse, Cookies, ParsedBody};
use pet_report_gateway::security::ClientIp;
use pet_report_gateway::HttpServer;
use serde_json::{json, Value};

use common::{body_bytes, body_json, request, request_from, send, TestDirs, ALLOWED_ORIGIN};

async fn echo(Extension(ParsedBody(parsed)): Extension<ParsedBody>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "body": body, "parsed": parsed }))
}

async fn search(RawQuery(query): RawQuery) -> Json<Value> {
    Json(json!({ "query": query }))
}

async fn cookie(Extension(cookies): Extension<Cookies>) -> Json<Value> {
    Json(json!({ "session": cookies.get("session") }))
}

async fn whoami(Extension(ClientIp(ip)): Extension<ClientIp>) -> Json<Value> {
    Json(json!({ "ip": ip.to_string() }))
}

fn user_routes() -> Router {
    Router::new()
        .route("/echo", post(echo))
        .route("/search", get(search))
        .route("/cookie", get(cookie))
        .route("/whoami", get(whoami))
        .route("/expired", get(|| async { ApiResponse::session_expired() }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                ApiResponse::ok("done")
            }),
        )
}

fn router_with(dirs: &TestDirs, configure: impl FnOnce(&mut pet_report_gateway::GatewayConfig)) -> Router {
    let mut config = dirs.config();
    configure(&mut config);
    HttpServer::new(config)
        .unwrap()
        .with_user_routes(user_routes())
        .router()
}

fn router(dirs: &TestDirs) -> Router {
    router_with(dirs, |_| {})
}

#[tokio::test]
async fn root_answers_welcome_envelope() {
    let dirs = TestDirs::new();
    let response = send(&router(&dirs), request(Method::GET, "/").body(Body::empty()).unwrap()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());
    assert_eq!(
        body_json(response).await,
        json!({
            "status": true,
            "message": "Welcome to pet missing report management backend application."
        })
    );
}

#[tokio::test]
async fn unknown_route_is_json_not_found() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::GET, "/v2/nothing").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(body_json(response).await, json!({ "status": false, "message": "Not found" }));
}

#[tokio::test]
async fn request_id_is_propagated() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::GET, "/")
            .header("x-request-id", "lost-dog-42")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.headers()["x-request-id"], "lost-dog-42");
}

#[tokio::test]
async fn allowed_origin_is_echoed_with_credentials() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::GET, "/").header(ORIGIN, ALLOWED_ORIGIN).body(Body::empty()).unwrap(),
    )
    .await;

    let headers = response.headers();
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, PUT, DELETE, PATCH, OPTIONS");
}

#[tokio::test]
async fn unknown_origin_is_served_without_allow_origin() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::GET, "/")
            .header(ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_METHODS).is_some());
}

#[tokio::test]
async fn preflight_stops_at_cors_stage() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::OPTIONS, "/v1/users/echo")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    // Later stages never ran.
    assert!(response.headers().get("x-content-type-options").is_none());
    assert!(response.headers().get("ratelimit-limit").is_none());
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn hardening_headers_on_every_response() {
    let dirs = TestDirs::new();
    let response = send(&router(&dirs), request(Method::GET, "/").body(Body::empty()).unwrap()).await;
    let headers = response.headers();

    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["strict-transport-security"], "max-age=31536000; includeSubDomains");
    assert_eq!(headers["cross-origin-resource-policy"], "cross-origin");
    assert!(headers.get("content-security-policy").is_none());
}

#[tokio::test]
async fn hardening_headers_can_be_disabled() {
    let dirs = TestDirs::new();
    let router = router_with(&dirs, |config| config.security.enable_headers = false);
    let response = send(&router, request(Method::GET, "/").body(Body::empty()).unwrap()).await;
    assert!(response.headers().get("x-frame-options").is_none());
}

#[tokio::test]
async fn operator_keys_never_reach_handlers() {
    let dirs = TestDirs::new();
    let payload = json!({
        "name": "Rex",
        "$where": "sleep(1000)",
        "owner": { "email": { "$ne": null }, "address.city": "Pune" },
        "sightings": [ { "$gt": "" }, { "place": "park" } ]
    });
    let response = send(
        &router(&dirs),
        request(Method::POST, "/v1/users/echo")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let expected = json!({
        "name": "Rex",
        "owner": { "email": {} },
        "sightings": [ {}, { "place": "park" } ]
    });
    assert_eq!(body_json(response).await, json!({ "body": expected, "parsed": expected }));
}

#[tokio::test]
async fn operator_keys_are_stripped_from_query() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::GET, "/v1/users/search?q=lost+dog&filter%5B%24ne%5D=1&a.b=2")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await, json!({ "query": "q=lost+dog" }));
}

#[tokio::test]
async fn cookies_are_parsed() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::GET, "/v1/users/cookie")
            .header(COOKIE, "theme=dark; session=abc123")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await, json!({ "session": "abc123" }));
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::POST, "/v1/users/echo")
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .body(Body::from("{\"name\": "))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(
        body_json(response).await,
        json!({ "status": false, "message": "Invalid request body" })
    );
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let dirs = TestDirs::new();
    let router = router_with(&dirs, |config| config.security.max_body_size = 64);
    let payload = json!({ "description": "x".repeat(200) }).to_string();

    let response = send(
        &router,
        request(Method::POST, "/v1/users/echo")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        body_json(response).await,
        json!({ "status": false, "message": "Request body too large" })
    );
}

#[tokio::test]
async fn public_files_shadow_routes() {
    let dirs = TestDirs::new();
    let router = router(&dirs);

    let response = send(&router, request(Method::GET, "/robots.txt").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(body_bytes(response).await, b"User-agent: *\nDisallow:\n");

    // Only GET and HEAD are served from disk.
    let response = send(&router, request(Method::POST, "/robots.txt").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn public_files_skip_blocklist_and_limiter() {
    let dirs = TestDirs::new();
    let router = router_with(&dirs, |config| {
        config.user_agents.blocked = vec!["BadBot/1.0".to_string()];
        config.rate_limit.max_requests = 1;
        config.rate_limit.window_ms = 60_000;
    });

    for _ in 0..3 {
        let response = send(
            &router,
            request(Method::GET, "/robots.txt")
                .header(USER_AGENT, "BadBot/1.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("ratelimit-limit").is_none());
        assert!(response.headers().get("ratelimit-remaining").is_none());
        assert_eq!(body_bytes(response).await, b"User-agent: *\nDisallow:\n");
    }

    // The same client is still blocked on routes.
    let response = send(
        &router,
        request(Method::GET, "/").header(USER_AGENT, "BadBot/1.0").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn uploads_are_served() {
    let dirs = TestDirs::new();
    let router = router(&dirs);

    let response = send(&router, request(Method::GET, "/uploads/rex.jpg").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cross-origin-resource-policy"], "cross-origin");
    assert!(response.headers().get("ratelimit-remaining").is_some());

    let response = send(&router, request(Method::GET, "/uploads/missing.jpg").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn client_ip_prefers_forwarding_headers() {
    let dirs = TestDirs::new();
    let router = router(&dirs);

    let response = send(
        &router,
        request(Method::GET, "/v1/users/whoami")
            .header("x-forwarded-for", "198.51.100.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await, json!({ "ip": "198.51.100.7" }));

    let response = send(
        &router,
        request_from("203.0.113.9:41000", Method::GET, "/v1/users/whoami")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await, json!({ "ip": "203.0.113.9" }));
}

#[tokio::test]
async fn blocked_user_agent_is_denied() {
    let dirs = TestDirs::new();
    let router = router_with(&dirs, |config| {
        config.user_agents.blocked = vec!["BadBot/1.0".to_string()];
    });

    let response = send(
        &router,
        request(Method::GET, "/")
            .header(USER_AGENT, "BadBot/1.0")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");
    // Denied before the limiter counted it.
    assert!(response.headers().get("ratelimit-limit").is_none());
    assert_eq!(body_json(response).await, json!({ "status": false, "message": "Access Denied" }));

    // Matching is exact.
    let response = send(
        &router,
        request(Method::GET, "/").header(USER_AGENT, "BadBot/1.01").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn forty_sixth_request_is_rate_limited() {
    let dirs = TestDirs::new();
    let router = router_with(&dirs, |config| config.rate_limit.window_ms = 60_000);

    for n in 1..=45 {
        let response = send(&router, request(Method::GET, "/").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", n);
        assert_eq!(response.headers()["ratelimit-remaining"], (45 - n).to_string().as_str());
    }

    let response = send(
        &router,
        request(Method::GET, "/").header(ORIGIN, ALLOWED_ORIGIN).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["ratelimit-limit"], "45");
    assert_eq!(response.headers()["ratelimit-remaining"], "0");
    assert!(response.headers().get(RETRY_AFTER).is_some());
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(body_bytes(response).await, b"Too many requests, please try again later.");

    // Another client still has its own window.
    let response = send(
        &router,
        request_from("192.0.2.99:1234", Method::GET, "/").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_window_resets() {
    let dirs = TestDirs::new();
    let router = router_with(&dirs, |config| {
        config.rate_limit.window_ms = 200;
        config.rate_limit.max_requests = 2;
    });

    for _ in 0..2 {
        let response = send(&router, request(Method::GET, "/").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = send(&router, request(Method::GET, "/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(Duration::from_millis(250)).await;
    let response = send(&router, request(Method::GET, "/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn disabled_rate_limit_adds_no_headers() {
    let dirs = TestDirs::new();
    let router = router_with(&dirs, |config| config.rate_limit.enabled = false);
    let response = send(&router, request(Method::GET, "/").body(Body::empty()).unwrap()).await;
    assert!(response.headers().get("ratelimit-limit").is_none());
}

#[tokio::test]
async fn session_expiry_envelope_is_sent_with_200() {
    let dirs = TestDirs::new();
    let response = send(
        &router(&dirs),
        request(Method::GET, "/v1/users/expired").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "status": false, "message": "Session expired", "statusCode": 700 })
    );
}

#[tokio::test]
async fn slow_handler_times_out() {
    let dirs = TestDirs::new();
    let router = router_with(&dirs, |config| config.timeouts.request_secs = 1);
    let response = send(
        &router,
        request(Method::GET, "/v1/users/slow")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
}
