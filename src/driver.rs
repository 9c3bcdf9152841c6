//! HTTP request driver.
//!
//! Every call issues exactly one request through a [`Transport`]: no retries,
//! no redirect following. A non-2xx status is returned like any other; only
//! a failure to exchange the request at all is an error.

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header, uri::PathAndQuery};
use std::future::Future;
use std::time::Duration;
use tower::ServiceExt;
use tracing::debug;
use url::Url;

use crate::error::{HarnessError, HarnessResult};
use crate::html::Document;

/// Login form endpoint of the site under test.
pub const LOGIN_PATH: &str = "/user/login";

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, path: &str) -> HarnessResult<Self> {
        validate_path(path)?;
        Ok(Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }

    pub fn with_session(mut self, session: &Session) -> HarnessResult<Self> {
        if let Some(cookie) = session.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| HarnessError::Transport(format!("invalid cookie header: {}", e)))?;
            self.headers.insert(header::COOKIE, value);
        }
        Ok(self)
    }

    pub fn with_form(mut self, fields: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self.body = Bytes::from(encoded);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn document(&self) -> HarnessResult<Document> {
        Document::parse(&self.body)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    /// `name=value` pairs from every `Set-Cookie` header.
    pub fn set_cookies(&self) -> Vec<(String, String)> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect()
    }
}

/// Authenticated context captured from a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user_name: String,
    cookies: Vec<(String, String)>,
}

impl Session {
    pub fn new(user_name: impl Into<String>, cookies: Vec<(String, String)>) -> Self {
        Self {
            user_name: user_name.into(),
            cookies,
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Carries one request to the system under test.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> impl Future<Output = HarnessResult<Response>> + Send;
}

/// Dispatches requests straight into an axum router.
#[derive(Clone)]
pub struct RouterTransport {
    router: Router,
}

impl RouterTransport {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl Transport for RouterTransport {
    async fn send(&self, request: Request) -> HarnessResult<Response> {
        let mut builder = axum::http::Request::builder()
            .method(request.method)
            .uri(request.path.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers);
        }
        let http_request = builder
            .body(Body::from(request.body))
            .map_err(|e| HarnessError::Transport(e.to_string()))?;

        let response = self
            .router
            .clone()
            .oneshot(http_request)
            .await
            .unwrap_or_else(|never| match never {});

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| HarnessError::Transport(e.to_string()))?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Sends requests over the network to a running server.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// `base_url` may carry a path prefix such as `http://host/gitea`;
    /// request paths are resolved below it.
    pub fn new(base_url: &str, timeout: Duration) -> HarnessResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> HarnessResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> HarnessResult<Response> {
        let url = self.url_for(&request.path)?;
        let response = self
            .client
            .request(request.method, url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// In-process or network transport, chosen at runtime.
#[derive(Clone)]
pub enum AnyTransport {
    InProcess(RouterTransport),
    Http(HttpTransport),
}

impl Transport for AnyTransport {
    async fn send(&self, request: Request) -> HarnessResult<Response> {
        match self {
            AnyTransport::InProcess(t) => t.send(request).await,
            AnyTransport::Http(t) => t.send(request).await,
        }
    }
}

#[derive(Clone)]
pub struct Driver<T> {
    transport: T,
}

impl<T: Transport> Driver<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub async fn send(&self, request: Request) -> HarnessResult<Response> {
        let method = request.method.clone();
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        debug!(%method, %path, status = response.status.as_u16(), "request");
        Ok(response)
    }

    pub async fn request(&self, method: Method, path: &str) -> HarnessResult<Response> {
        self.send(Request::new(method, path)?).await
    }

    pub async fn request_with(
        &self,
        method: Method,
        path: &str,
        session: &Session,
    ) -> HarnessResult<Response> {
        self.send(Request::new(method, path)?.with_session(session)?)
            .await
    }

    pub async fn get(&self, path: &str) -> HarnessResult<Response> {
        self.request(Method::GET, path).await
    }

    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        session: Option<&Session>,
    ) -> HarnessResult<Response> {
        let mut request = Request::new(Method::POST, path)?.with_form(fields);
        if let Some(session) = session {
            request = request.with_session(session)?;
        }
        self.send(request).await
    }

    /// Logs in through the site's form and captures the session cookies.
    pub async fn login(&self, user_name: &str, password: &str) -> HarnessResult<Session> {
        let response = self
            .post_form(
                LOGIN_PATH,
                &[("user_name", user_name), ("password", password)],
                None,
            )
            .await?;

        if !response.status.is_redirection() {
            return Err(HarnessError::Login(format!(
                "{} (status {})",
                user_name, response.status
            )));
        }
        let cookies = response.set_cookies();
        if cookies.is_empty() {
            return Err(HarnessError::Login(format!(
                "{} (no session cookie)",
                user_name
            )));
        }

        debug!(user = user_name, location = ?response.location(), "logged in");
        Ok(Session::new(user_name, cookies))
    }
}

/// Accepts origin-form paths such as `/user2/repo1/issues?type=all`.
pub fn validate_path(path: &str) -> HarnessResult<()> {
    if !path.starts_with('/') || path.starts_with("//") {
        return Err(HarnessError::InvalidPath(path.to_string()));
    }
    path.parse::<PathAndQuery>()
        .map_err(|_| HarnessError::InvalidPath(path.to_string()))?;
    Ok(())
}

fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
