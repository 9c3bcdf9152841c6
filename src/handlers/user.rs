use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::app::SESSION_COOKIE;
use crate::models::User;
use crate::store::Predicate;
use crate::templates::LoginTemplate;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub user_name: String,
    pub password: String,
}

pub async fn login_form(
    State(state): State<crate::SharedAppState>,
    headers: HeaderMap,
) -> crate::AppResult<LoginTemplate> {
    let viewer = super::current_user(&state, &headers)?;
    Ok(LoginTemplate {
        layout: super::layout(&state, viewer.as_ref()),
        user_name: String::new(),
        error: None,
    })
}

pub async fn login(
    State(state): State<crate::SharedAppState>,
    Form(form): Form<LoginForm>,
) -> crate::AppResult<Response> {
    let user = state
        .store
        .find_one::<User>(&Predicate::new().eq("name", form.user_name.as_str()))?;

    let Some(user) = user.filter(|u| u.validate_password(&form.password)) else {
        tracing::warn!(user = %form.user_name, "rejected login");
        let page = LoginTemplate {
            layout: super::layout(&state, None),
            user_name: form.user_name,
            error: Some("Username or password is incorrect.".to_string()),
        };
        return Ok(page.into_response());
    };

    let token = state.sessions.create(user.id);
    tracing::info!(user = %user.name, "signed in");
    let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token);
    Ok((
        StatusCode::SEE_OTHER,
        [(header::LOCATION, "/".to_string()), (header::SET_COOKIE, cookie)],
    )
        .into_response())
}
