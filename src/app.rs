//! Reference site: a small server-rendered issue tracker the harness can
//! drive in-process or serve over HTTP.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::http::{HeaderMap, header};
use axum::routing::get;
use parking_lot::Mutex;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::handlers;
use crate::store::Store;

pub const SESSION_COOKIE: &str = "issuecheck_session";

/// Format latency in human-readable units
fn format_latency(duration: std::time::Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else {
        format!("{:.1}s", micros as f64 / 1_000_000.0)
    }
}

/// Logged-in users keyed by session token.
///
/// Sessions for the reference site only, not for real authentication:
/// tokens are an encoded counter and are never expired or evicted.
pub struct SessionStore {
    next: AtomicU64,
    generator: block_id::BlockId<char>,
    tokens: Mutex<HashMap<String, i64>>,
}

impl SessionStore {
    pub fn new() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(7919);
        Self {
            next: AtomicU64::new(1),
            generator: block_id::BlockId::new(block_id::Alphabet::alphanumeric(), seed.into(), 12),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn create(&self, user_id: i64) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let token = self
            .generator
            .encode_string(n)
            .unwrap_or_else(|| format!("s{}", n));
        self.tokens.lock().insert(token.clone(), user_id);
        token
    }

    pub fn user_id(&self, token: &str) -> Option<i64> {
        self.tokens.lock().get(token).copied()
    }

    /// User bound to the session cookie carried by `headers`, if any.
    pub fn user_from_headers(&self, headers: &HeaderMap) -> Option<i64> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .and_then(|(_, token)| self.user_id(token))
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AppState {
    pub store: Store,
    pub sessions: SessionStore,
    pub page_size: usize,
    pub site_name: String,
    pub app_version: String,
}

pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            sessions: SessionStore::new(),
            page_size: DEFAULT_PAGE_SIZE,
            site_name: "issuecheck".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

pub fn create_app(state: SharedAppState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route(
            "/user/login",
            get(handlers::login_form).post(handlers::login),
        )
        .route("/health", get(handlers::health_check))
        .route("/style.css", get(handlers::serve_css))
        .route("/:owner/:repo/issues", get(handlers::issues_list))
        .route("/:owner/:repo/issues/:index", get(handlers::issue_detail))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    static REQUEST_ID: AtomicU64 = AtomicU64::new(1);
                    let request_id_num = REQUEST_ID.fetch_add(1, Ordering::Relaxed);
                    let generator = block_id::BlockId::new(
                        block_id::Alphabet::alphanumeric(),
                        1234,
                        5,
                    );
                    let request_id = generator
                        .encode_string(request_id_num)
                        .unwrap_or_else(|| request_id_num.to_string());
                    tracing::info_span!(
                        "request",
                        id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &Span| {
                    tracing::info!("-> {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &Span| {
                        tracing::info!(
                            "<- {} latency={}",
                            response.status().as_u16(),
                            format_latency(latency)
                        );
                    },
                ),
        )
        .layer(CompressionLayer::new())
}
