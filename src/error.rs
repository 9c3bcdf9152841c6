use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures raised by the harness itself.
///
/// Everything except [`HarnessError::NotFound`] is an infrastructure fault:
/// the scenario cannot continue and is reported separately from assertion
/// failures.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("Failed to decode fixture: {0}")]
    FixtureDecode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Unknown column `{column}` for {kind}")]
    UnknownColumn {
        kind: &'static str,
        column: &'static str,
    },

    #[error("No {kind} matching {predicate}")]
    NotFound {
        kind: &'static str,
        predicate: String,
    },

    #[error("Invalid request path: {0}")]
    InvalidPath(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("Response body could not be parsed as HTML: {0}")]
    Parse(String),

    #[error("Invalid selector `{0}`")]
    InvalidSelector(&'static str),

    #[error("Login failed for {0}")]
    Login(String),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}

impl HarnessError {
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, HarnessError::NotFound { .. })
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors surfaced by the reference site's handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Harness(#[from] HarnessError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Harness(HarnessError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Harness(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        tracing::error!("{}", self);
        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
