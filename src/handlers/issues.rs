use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::app::AppState;
use crate::markdown;
use crate::models::{Issue, Repository, User};
use crate::store::{Predicate, Window};
use crate::templates::{IssueDetailTemplate, IssueRow, IssuesTemplate, PageLink};

#[derive(Deserialize, Default)]
pub struct IssuesQuery {
    #[serde(rename = "type")]
    pub view_type: Option<String>,
    pub state: Option<String>,
    pub page: Option<usize>,
}

/// Which issues of a repository a list page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewType {
    All,
    CreatedBy,
    Assigned,
}

impl ViewType {
    /// Filters tied to a user fall back to `All` for anonymous visitors.
    pub fn resolve(raw: Option<&str>, signed_in: bool) -> Self {
        match raw {
            Some("created_by") if signed_in => ViewType::CreatedBy,
            Some("assigned") if signed_in => ViewType::Assigned,
            _ => ViewType::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewType::All => "all",
            ViewType::CreatedBy => "created_by",
            ViewType::Assigned => "assigned",
        }
    }
}

/// Predicate for the issues a list page shows, ignoring open/closed state.
pub fn list_predicate(repo_id: i64, view: ViewType, viewer: Option<&User>) -> Predicate {
    let base = Predicate::new().eq("repo_id", repo_id).eq("is_pull", false);
    match (view, viewer) {
        (ViewType::CreatedBy, Some(user)) => base.eq("poster_id", user.id),
        (ViewType::Assigned, Some(user)) => base.eq("assignee_id", user.id),
        _ => base,
    }
}

/// Loads `owner/repo`, hiding repositories the viewer may not see.
fn load_repository(
    state: &AppState,
    owner: &str,
    repo: &str,
    viewer: Option<&User>,
) -> crate::AppResult<(User, Repository)> {
    let not_found = || crate::AppError::NotFound(format!("{}/{}", owner, repo));

    let owner_user = state
        .store
        .find_one::<User>(&Predicate::new().eq("name", owner))?
        .ok_or_else(not_found)?;
    let repository = state
        .store
        .find_one::<Repository>(
            &Predicate::new()
                .eq("owner_id", owner_user.id)
                .eq("name", repo),
        )?
        .filter(|r| r.visible_to(viewer))
        .ok_or_else(not_found)?;

    Ok((owner_user, repository))
}

fn user_names(state: &AppState) -> crate::AppResult<HashMap<i64, String>> {
    Ok(state
        .store
        .select::<User>(&Predicate::new(), Window::default())?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect())
}

pub async fn issues_list(
    State(state): State<crate::SharedAppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<IssuesQuery>,
    headers: HeaderMap,
) -> crate::AppResult<IssuesTemplate> {
    let viewer = super::current_user(&state, &headers)?;
    let (owner_user, repository) = load_repository(&state, &owner, &repo, viewer.as_ref())?;

    let view = ViewType::resolve(query.view_type.as_deref(), viewer.is_some());
    let is_closed = query.state.as_deref() == Some("closed");
    let page = match query.page {
        Some(0) => return Err(crate::AppError::BadRequest("page starts at 1".to_string())),
        Some(page) => page,
        None => 1,
    };

    let filter = list_predicate(repository.id, view, viewer.as_ref());
    let open_count = state
        .store
        .count::<Issue>(&filter.clone().eq("is_closed", false))?;
    let closed_count = state
        .store
        .count::<Issue>(&filter.clone().eq("is_closed", true))?;
    let total = if is_closed { closed_count } else { open_count };

    // pages past the end show the last page
    let page_count = (total as usize).div_ceil(state.page_size);
    let page = page.min(page_count.max(1));
    let window = Window::ordered_desc("index")
        .page(page, state.page_size)
        .ok_or_else(|| crate::AppError::BadRequest(format!("page {} is out of range", page)))?;

    let issues = state
        .store
        .select::<Issue>(&filter.eq("is_closed", is_closed), window)?;

    let repo_link = repository.rel_link(&owner_user);
    let names = user_names(&state)?;
    let rows = issues
        .iter()
        .map(|issue| IssueRow {
            index: issue.index,
            title: issue.title.clone(),
            link: issue.link(&repo_link),
            poster_name: names.get(&issue.poster_id).cloned().unwrap_or_default(),
            created_unix: issue.created_unix,
        })
        .collect();

    let state_param = if is_closed { "closed" } else { "open" };
    let pages = (1..=page_count)
        .map(|number| PageLink {
            number,
            href: format!(
                "{}/issues?type={}&state={}&page={}",
                repo_link,
                view.as_str(),
                state_param,
                number
            ),
            current: number == page,
        })
        .collect();

    Ok(IssuesTemplate {
        layout: super::layout(&state, viewer.as_ref()),
        repo_path: format!("{}/{}", owner_user.name, repository.name),
        repo_link,
        view_type: view.as_str(),
        state: state_param,
        open_count,
        closed_count,
        issues: rows,
        pages,
    })
}

pub async fn issue_detail(
    State(state): State<crate::SharedAppState>,
    Path((owner, repo, index)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> crate::AppResult<IssueDetailTemplate> {
    let viewer = super::current_user(&state, &headers)?;
    let (owner_user, repository) = load_repository(&state, &owner, &repo, viewer.as_ref())?;

    let index: i64 = index
        .parse()
        .map_err(|_| crate::AppError::NotFound(format!("issue {}", index)))?;
    let issue = state
        .store
        .find_one::<Issue>(
            &Predicate::new()
                .eq("repo_id", repository.id)
                .eq("index", index),
        )?
        .ok_or_else(|| {
            crate::AppError::NotFound(format!("{}/{}#{}", owner_user.name, repository.name, index))
        })?;

    let names = user_names(&state)?;
    let poster = state
        .store
        .find_one::<User>(&Predicate::new().eq("id", issue.poster_id))?;
    let content_html = markdown::render(&issue.content);

    Ok(IssueDetailTemplate {
        layout: super::layout(&state, viewer.as_ref()),
        repo_path: format!("{}/{}", owner_user.name, repository.name),
        repo_link: repository.rel_link(&owner_user),
        poster_name: poster.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
        poster_display: poster
            .as_ref()
            .map(|u| u.display_name().to_string())
            .unwrap_or_default(),
        assignee_name: issue.assignee_id.and_then(|id| names.get(&id).cloned()),
        content_html,
        issue,
    })
}
