use axum::{extract::State, http::HeaderMap};
use std::collections::HashMap;

use crate::models::{Repository, User};
use crate::store::{Predicate, Window};
use crate::templates::{HomeTemplate, RepoEntry};

pub async fn home(
    State(state): State<crate::SharedAppState>,
    headers: HeaderMap,
) -> crate::AppResult<HomeTemplate> {
    let viewer = super::current_user(&state, &headers)?;

    let owners: HashMap<i64, User> = state
        .store
        .select::<User>(&Predicate::new(), Window::default())?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    let mut repositories = Vec::new();
    for repo in state
        .store
        .select::<Repository>(&Predicate::new(), Window::default())?
    {
        if !repo.visible_to(viewer.as_ref()) {
            continue;
        }
        let Some(owner) = owners.get(&repo.owner_id) else {
            continue;
        };
        repositories.push(RepoEntry {
            full_name: format!("{}/{}", owner.name, repo.name),
            link: repo.rel_link(owner),
            description: repo.description.clone(),
            is_private: repo.is_private,
        });
    }
    repositories.sort_by(|a, b| a.full_name.cmp(&b.full_name));

    Ok(HomeTemplate {
        layout: super::layout(&state, viewer.as_ref()),
        repositories,
    })
}
