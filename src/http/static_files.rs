//! Static file serving.
//!
//! Files under the public directory shadow every route for GET and HEAD,
//! the way a front static mount does. Uploads are mounted under `/uploads`
//! like an ordinary route and so go through the whole chain.

use std::future::Future;
use std::path::{Path, PathBuf};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Serves the public directory ahead of the business routes.
#[derive(Debug, Clone)]
pub struct PublicFiles {
    root: PathBuf,
}

impl PublicFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Answer `request` from disk when it names a public file.
    ///
    /// Resolves to `None` for anything the directory cannot serve, in which
    /// case the caller continues with the original request. The returned
    /// future does not borrow `request`.
    pub fn try_serve(&self, request: &Request<Body>) -> impl Future<Output = Option<Response>> + Send + 'static {
        let probe = (request.method() == Method::GET || request.method() == Method::HEAD).then(|| {
            let mut probe = Request::new(Body::empty());
            *probe.method_mut() = request.method().clone();
            *probe.uri_mut() = request.uri().clone();
            *probe.version_mut() = request.version();
            *probe.headers_mut() = request.headers().clone();
            probe
        });
        let root = self.root.clone();

        async move {
            let probe = probe?;
            let path = probe.uri().path().to_string();
            let response = match ServeDir::new(root).oneshot(probe).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            if response.status() == StatusCode::NOT_FOUND {
                return None;
            }

            tracing::debug!(path = %path, "Served public file");
            Some(response.map(Body::new).into_response())
        }
    }
}

/// Service for the `/uploads` mount.
pub fn uploads_service(root: impl AsRef<Path>) -> ServeDir {
    ServeDir::new(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn serves_existing_file_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();
        let public = PublicFiles::new(dir.path());

        let response = public.try_serve(&get("/robots.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(public.try_serve(&get("/missing.txt")).await.is_none());
        assert!(public.try_serve(&get("/")).await.is_none());
    }

    #[tokio::test]
    async fn ignores_writes_and_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("robots.txt"), "x").unwrap();
        let public = PublicFiles::new(dir.path().join("nested"));

        let post = Request::builder()
            .method(Method::POST)
            .uri("/robots.txt")
            .body(Body::empty())
            .unwrap();
        assert!(PublicFiles::new(dir.path()).try_serve(&post).await.is_none());
        assert!(public.try_serve(&get("/../robots.txt")).await.is_none());
    }

    #[tokio::test]
    async fn missing_root_serves_nothing() {
        let public = PublicFiles::new("/definitely/not/here");
        assert!(public.try_serve(&get("/index.html")).await.is_none());
    }
}
