pub mod general;
pub mod home;
pub mod issues;
pub mod user;

pub use general::{health_check, serve_css};
pub use home::home;
pub use issues::{issue_detail, issues_list};
pub use user::{login, login_form};

use crate::app::AppState;
use crate::models::User;
use crate::store::Predicate;
use crate::templates::Layout;
use axum::http::HeaderMap;

/// The signed-in user, when the request carries a live session.
pub(crate) fn current_user(state: &AppState, headers: &HeaderMap) -> crate::AppResult<Option<User>> {
    let Some(user_id) = state.sessions.user_from_headers(headers) else {
        return Ok(None);
    };
    Ok(state
        .store
        .find_one::<User>(&Predicate::new().eq("id", user_id))?)
}

pub(crate) fn layout(state: &AppState, viewer: Option<&User>) -> Layout {
    Layout {
        site_name: state.site_name.clone(),
        app_version: state.app_version.clone(),
        viewer: viewer.map(|u| u.name.clone()),
    }
}
