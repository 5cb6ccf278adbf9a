//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{request::Builder, Method, Request},
    response::Response,
    Router,
};
use pet_report_gateway::http::ServerError;
use pet_report_gateway::{GatewayConfig, HttpServer, Shutdown};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

pub const ALLOWED_ORIGIN: &str = "http://localhost:4000";

/// Public and upload directories backing one test server.
pub struct TestDirs {
    pub public: TempDir,
    pub uploads: TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        let dirs = Self {
            public: TempDir::new().unwrap(),
            uploads: TempDir::new().unwrap(),
        };
        fs::write(dirs.public.path().join("robots.txt"), "User-agent: *\nDisallow:\n").unwrap();
        fs::write(dirs.uploads.path().join("rex.jpg"), b"\xff\xd8\xff\xe0 not really a jpeg").unwrap();
        dirs
    }

    pub fn config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.listener.host = "127.0.0.1".to_string();
        config.listener.port = 0;
        config.static_files.public_dir = self.public.path().to_string_lossy().into_owned();
        config.static_files.uploads_dir = self.uploads.path().to_string_lossy().into_owned();
        config
    }
}

/// A request builder carrying a peer address, as if accepted from `peer`.
pub fn request_from(peer: &str, method: Method, uri: &str) -> Builder {
    let addr: SocketAddr = peer.parse().unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(addr))
}

pub fn request(method: Method, uri: &str) -> Builder {
    request_from("192.0.2.10:50000", method, uri)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Serve `server` on an ephemeral local port.
pub async fn spawn_server(server: HttpServer) -> (SocketAddr, Shutdown, JoinHandle<Result<(), ServerError>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    (addr, shutdown, handle)
}
