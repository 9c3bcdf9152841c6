pub mod app;
pub mod config;
pub mod driver;
pub mod error;
pub mod fixtures;
pub mod handlers;
pub mod html;
pub mod markdown;
pub mod models;
pub mod oracle;
pub mod scenario;
pub mod selectors;
pub mod store;
pub mod suite;
pub mod templates;

pub use app::{AppState, SharedAppState, create_app};
pub use error::{AppError, AppResult, HarnessError, HarnessResult};
