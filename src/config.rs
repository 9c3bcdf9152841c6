use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

/// Issues per list page, matching the site's default paging.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Password every default fixture user logs in with.
pub const DEFAULT_PASSWORD: &str = "password";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Ceiling applied to expected list counts.
    pub page_size: usize,
    /// Run against a live server instead of the in-process reference site.
    pub base_url: Option<String>,
    /// Directory of JSON fixtures; the embedded dataset is used when unset.
    pub fixtures_dir: Option<PathBuf>,
    /// Existing store to read expectations from instead of loading fixtures.
    pub db_path: Option<PathBuf>,
    pub password: String,
    pub request_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            base_url: None,
            fixtures_dir: None,
            db_path: None,
            password: DEFAULT_PASSWORD.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl HarnessConfig {
    /// Reads `ISSUECHECK_*` environment variables on top of the defaults.
    pub fn from_env() -> HarnessResult<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("ISSUECHECK_PAGE_SIZE") {
            config.page_size = parse_page_size(&raw)?;
        }
        if let Ok(url) = std::env::var("ISSUECHECK_BASE_URL")
            && !url.trim().is_empty()
        {
            config.base_url = Some(url.trim().to_string());
        }
        if let Ok(dir) = std::env::var("ISSUECHECK_FIXTURES") {
            config.fixtures_dir = Some(PathBuf::from(dir));
        }
        if let Ok(path) = std::env::var("ISSUECHECK_DB") {
            config.db_path = Some(PathBuf::from(path));
        }
        if let Ok(password) = std::env::var("ISSUECHECK_PASSWORD") {
            config.password = password;
        }
        if let Ok(raw) = std::env::var("ISSUECHECK_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                HarnessError::Config(format!("ISSUECHECK_TIMEOUT_SECS is not a number: {}", raw))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

pub fn parse_page_size(raw: &str) -> HarnessResult<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(HarnessError::Config("page size must be at least 1".to_string())),
        Ok(n) => Ok(n),
        Err(_) => Err(HarnessError::Config(format!(
            "page size is not a number: {}",
            raw
        ))),
    }
}
