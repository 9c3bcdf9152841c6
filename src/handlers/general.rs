use axum::{http::header, response::IntoResponse};

// Embed static assets at compile time
const STYLE_CSS: &str = include_str!("../../assets/style.css");

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn serve_css() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], STYLE_CSS)
}
