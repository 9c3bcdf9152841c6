use askama::Template;

use crate::models::Issue;

pub mod filters {
    use time::OffsetDateTime;
    use time::macros::format_description;

    pub fn format_date(unix: &i64) -> askama::Result<String> {
        let formatted = OffsetDateTime::from_unix_timestamp(*unix)
            .ok()
            .and_then(|dt| {
                dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
                    .ok()
            })
            .unwrap_or_else(|| unix.to_string());
        Ok(formatted)
    }
}

/// Fields every page's frame renders.
pub struct Layout {
    pub site_name: String,
    pub app_version: String,
    pub viewer: Option<String>,
}

pub struct RepoEntry {
    pub full_name: String,
    pub link: String,
    pub description: String,
    pub is_private: bool,
}

pub struct IssueRow {
    pub index: i64,
    pub title: String,
    pub link: String,
    pub poster_name: String,
    pub created_unix: i64,
}

pub struct PageLink {
    pub number: usize,
    pub href: String,
    pub current: bool,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub repositories: Vec<RepoEntry>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub user_name: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "issues.html")]
pub struct IssuesTemplate {
    pub layout: Layout,
    pub repo_path: String,
    pub repo_link: String,
    pub view_type: &'static str,
    pub state: &'static str,
    pub open_count: u64,
    pub closed_count: u64,
    pub issues: Vec<IssueRow>,
    pub pages: Vec<PageLink>,
}

#[derive(Template)]
#[template(path = "issue.html")]
pub struct IssueDetailTemplate {
    pub layout: Layout,
    pub repo_path: String,
    pub repo_link: String,
    pub issue: Issue,
    pub poster_name: String,
    /// Full name when the poster has one, shown as a tooltip.
    pub poster_display: String,
    pub assignee_name: Option<String>,
    pub content_html: String,
}
