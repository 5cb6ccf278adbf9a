//! The egress gateway: the one place outbound calls to the backend leave
//! the client.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::Client;
use serde_json::{Map, Value};
use url::Url;

use crate::error::GatewayError;
use crate::guard::InFlightGuard;
use crate::navigation::{AlertLevel, LogNavigator, LogNotifier, Navigator, Notifier};
use crate::protocol::{self, SESSION_EXPIRED_MESSAGE};
use crate::session::{SessionCredential, SessionStore, TOKEN_KEY};

/// Where the backend lives and where the client sends users on logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prefix joined to every relative path by plain concatenation.
    pub api_url: String,
    pub signin_path: String,
    pub root_path: String,
}

impl ClientConfig {
    pub fn new(api_url: &str) -> Result<Self, GatewayError> {
        Url::parse(api_url)?;
        Ok(Self {
            api_url: api_url.to_string(),
            signin_path: "/signin".to_string(),
            root_path: "/".to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}

/// What to send.
#[derive(Debug)]
pub enum RequestKind {
    /// JSON body; subject to duplicate suppression.
    JsonPost(Value),
    /// Multipart upload; the transport picks the boundary.
    FilePost(Form),
    Get,
}

impl RequestKind {
    fn label(&self) -> &'static str {
        match self {
            RequestKind::JsonPost(_) => "json-post",
            RequestKind::FilePost(_) => "file-post",
            RequestKind::Get => "get",
        }
    }
}

/// How a call that did not fail settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The normalized response envelope. Duplicate submissions also land
    /// here, with `status: false`.
    Resolved(Value),
    /// The backend ended the session. Local state has been cleared and the
    /// user sent to the sign-in view.
    SessionExpired,
}

impl Outcome {
    pub fn body(&self) -> Option<&Value> {
        match self {
            Outcome::Resolved(body) => Some(body),
            Outcome::SessionExpired => None,
        }
    }

    pub fn into_body(self) -> Option<Value> {
        match self {
            Outcome::Resolved(body) => Some(body),
            Outcome::SessionExpired => None,
        }
    }

    /// True for the soft "already in process" result.
    pub fn is_duplicate(&self) -> bool {
        self.body()
            .is_some_and(|body| *body == protocol::duplicate_request_response())
    }
}

/// Result of the route guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Deny,
}

impl RouteDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RouteDecision::Allow)
    }
}

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
    config: ClientConfig,
    http: Option<Client>,
    store: Option<Arc<dyn SessionStore>>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl GatewayBuilder {
    pub fn http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    /// Attach persisted session storage. Without one the gateway behaves as
    /// in a non-browser context: empty token, no session handling.
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn build(self) -> Gateway {
        Gateway {
            inner: Arc::new(GatewayInner {
                http: self.http.unwrap_or_default(),
                config: self.config,
                store: self.store,
                navigator: self.navigator,
                notifier: self.notifier,
                in_flight: InFlightGuard::new(),
            }),
        }
    }
}

struct GatewayInner {
    http: Client,
    config: ClientConfig,
    store: Option<Arc<dyn SessionStore>>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    in_flight: InFlightGuard,
}

/// Shared request mediator. Clones share the in-flight slot.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    pub fn builder(config: ClientConfig) -> GatewayBuilder {
        GatewayBuilder {
            config,
            http: None,
            store: None,
            navigator: Arc::new(LogNavigator),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn in_flight(&self) -> &InFlightGuard {
        &self.inner.in_flight
    }

    /// POST a JSON document.
    pub async fn post_request(&self, url: &str, payload: Value) -> Result<Outcome, GatewayError> {
        self.send(RequestKind::JsonPost(payload), url).await
    }

    /// POST a multipart upload.
    pub async fn post_file_request(&self, url: &str, form: Form) -> Result<Outcome, GatewayError> {
        self.send(RequestKind::FilePost(form), url).await
    }

    pub async fn get_request(&self, url: &str) -> Result<Outcome, GatewayError> {
        self.send(RequestKind::Get, url).await
    }

    /// Issue one call to `url` (relative to the configured api url).
    pub async fn send(&self, kind: RequestKind, url: &str) -> Result<Outcome, GatewayError> {
        let token = self.bearer_token();

        let ticket = if matches!(kind, RequestKind::JsonPost(_)) {
            match self.inner.in_flight.try_begin(url, &token) {
                Some(ticket) => Some(ticket),
                None => {
                    tracing::debug!(url, "Duplicate submission suppressed");
                    return Ok(Outcome::Resolved(protocol::duplicate_request_response()));
                }
            }
        } else {
            None
        };

        let raw = self.dispatch(kind, url, &token).await;
        let body = raw.map(|body| self.normalize(body));
        drop(ticket);

        Ok(self.settle(body?))
    }

    /// Strip the expiry sentinel out of a response body.
    ///
    /// With session storage present, a body carrying the sentinel clears the
    /// session, reloads the application at the root path and yields `{}`.
    /// Anything else is returned as is (`null` becomes `{}`).
    pub fn normalize(&self, body: Value) -> Value {
        if let Some(store) = &self.inner.store {
            if protocol::is_session_expired(&body) {
                tracing::warn!("Backend reported an expired session");
                store.clear();
                self.inner.navigator.assign(&self.inner.config.root_path);
                return Value::Object(Map::new());
            }
        }
        match body {
            Value::Null => Value::Object(Map::new()),
            body => body,
        }
    }

    /// Allow a protected view only for a signed-in user with a token.
    pub fn guard_route(&self) -> RouteDecision {
        let Some(store) = &self.inner.store else {
            return RouteDecision::Deny;
        };
        if SessionCredential::load(store.as_ref()).is_authenticated() {
            RouteDecision::Allow
        } else {
            self.inner.navigator.navigate(&self.inner.config.signin_path);
            RouteDecision::Deny
        }
    }

    fn bearer_token(&self) -> String {
        self.inner
            .store
            .as_ref()
            .and_then(|store| store.get(TOKEN_KEY))
            .unwrap_or_default()
    }

    async fn dispatch(&self, kind: RequestKind, url: &str, token: &str) -> Result<Value, GatewayError> {
        let endpoint = self.inner.config.endpoint(url);
        let headers = build_headers(&kind, token)?;
        tracing::debug!(kind = kind.label(), endpoint = %endpoint, "Sending request");

        let request = match kind {
            RequestKind::JsonPost(payload) => self.inner.http.post(&endpoint).headers(headers).json(&payload),
            RequestKind::FilePost(form) => self.inner.http.post(&endpoint).headers(headers).multipart(form),
            RequestKind::Get => self.inner.http.get(&endpoint).headers(headers),
        };

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint = %endpoint, status = %status, "Request failed");
            return Err(GatewayError::Status {
                code: status.as_u16(),
                message: format!("Http failure response for {}: {}", endpoint, status),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|_| GatewayError::Status {
            code: status.as_u16(),
            message: format!("Http failure during parsing for {}", endpoint),
        })
    }

    fn settle(&self, body: Value) -> Outcome {
        if let Some(store) = &self.inner.store {
            if protocol::is_logout(&body) {
                tracing::warn!("Backend ended the session, signing out");
                store.clear();
                self.inner.notifier.alert(AlertLevel::Error, SESSION_EXPIRED_MESSAGE);
                self.inner.navigator.navigate(&self.inner.config.signin_path);
                return Outcome::SessionExpired;
            }
        }
        Outcome::Resolved(body)
    }
}

/// Headers common to every call. File uploads leave the content type to
/// the transport so it can add the multipart boundary.
fn build_headers(kind: &RequestKind, token: &str) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if !matches!(kind, RequestKind::FilePost(_)) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    Ok(headers)
}
