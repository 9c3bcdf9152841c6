//! Selector constants shared by the harness, the reference site's tests and
//! scenario definitions.
//!
//! Keeping them in one place means a markup change breaks compilation or a
//! single test here instead of silently matching nothing.

use scraper::Selector;

use crate::error::{HarnessError, HarnessResult};

/// A CSS selector known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Css(&'static str);

impl Css {
    pub const fn new(selector: &'static str) -> Self {
        Self(selector)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn compile(&self) -> HarnessResult<Selector> {
        Selector::parse(self.0).map_err(|_| HarnessError::InvalidSelector(self.0))
    }
}

/// Successive narrowing steps, each applied to the previous step's matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorPath(&'static [Css]);

impl SelectorPath {
    pub const fn new(steps: &'static [Css]) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &'static [Css] {
        self.0
    }
}

impl std::fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(Css::as_str).collect();
        write!(f, "{}", parts.join(" => "))
    }
}

pub const ISSUE_LIST: Css = Css::new(".issue.list");
pub const LIST_ITEM: Css = Css::new("li");
pub const TITLE: Css = Css::new(".title");

/// Title links of the items on an issue list page.
pub const ISSUE_TITLES: SelectorPath = SelectorPath::new(&[ISSUE_LIST, LIST_ITEM, TITLE]);

pub const PAGINATION_LINKS: Css = Css::new(".pagination a.item");
pub const SIGNED_IN_USER: Css = Css::new(".signed-in-user");
pub const LOGIN_ERROR: Css = Css::new(".login .error");

pub const ISSUE_TITLE: Css = Css::new(".issue-title .title");
pub const ISSUE_INDEX: Css = Css::new(".issue-title .index");
pub const ISSUE_POSTER: Css = Css::new(".issue-meta .poster");
pub const ISSUE_STATE: Css = Css::new(".issue-meta .state");
pub const ISSUE_CONTENT: Css = Css::new(".issue.content");

pub const REPO_LINKS: Css = Css::new(".repository.list a.name");

pub const ALL_CSS: &[Css] = &[
    ISSUE_LIST,
    LIST_ITEM,
    TITLE,
    PAGINATION_LINKS,
    SIGNED_IN_USER,
    LOGIN_ERROR,
    ISSUE_TITLE,
    ISSUE_INDEX,
    ISSUE_POSTER,
    ISSUE_STATE,
    ISSUE_CONTENT,
    REPO_LINKS,
];
