//! Reference site integration tests.
//!
//! Tests for health check, login, repository index, issue lists and detail pages

use crate::common::{login_cookie, test_server, test_server_with_page_size};
use axum::http::{HeaderValue, StatusCode, header};
use issuecheck::html::Document;
use issuecheck::selectors::{
    ISSUE_CONTENT, ISSUE_STATE, ISSUE_TITLES, LOGIN_ERROR, PAGINATION_LINKS, REPO_LINKS,
    SIGNED_IN_USER,
};

#[tokio::test]
async fn test_health_check() {
    let server = test_server();

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_stylesheet() {
    let server = test_server();

    let response = server.get("/style.css").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(
        response
            .header(header::CONTENT_TYPE)
            .to_str()
            .unwrap()
            .starts_with("text/css")
    );
}

#[tokio::test]
async fn test_home_lists_public_repositories() {
    let server = test_server();

    let response = server.get("/").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let document = Document::parse_str(&response.text());
    let names: Vec<String> = document
        .find(REPO_LINKS)
        .unwrap()
        .iter()
        .map(|node| node.text())
        .collect();
    assert_eq!(names, vec!["user2/repo1", "user3/repo3"]);
}

#[tokio::test]
async fn test_owner_sees_private_repository() {
    let server = test_server();
    let cookie = login_cookie(&server, "user2").await;

    let response = server
        .get("/user2/repo2/issues")
        .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let server = test_server();

    let response = server
        .post("/user/login")
        .form(&[("user_name", "user1"), ("password", "password")])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.header(header::LOCATION), "/");
    let cookie = response.header(header::SET_COOKIE);
    let cookie = cookie.to_str().unwrap();
    assert!(cookie.starts_with("issuecheck_session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_bad_login_rerenders_form() {
    let server = test_server();

    let response = server
        .post("/user/login")
        .form(&[("user_name", "user1"), ("password", "wrong")])
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let document = Document::parse_str(&response.text());
    assert_eq!(document.find(LOGIN_ERROR).unwrap().length(), 1);
}

#[tokio::test]
async fn test_signed_in_user_in_navbar() {
    let server = test_server();
    let cookie = login_cookie(&server, "user1").await;

    let response = server
        .get("/")
        .add_header(header::COOKIE, HeaderValue::from_str(&cookie).unwrap())
        .await;

    let document = Document::parse_str(&response.text());
    assert_eq!(document.find(SIGNED_IN_USER).unwrap().text(), "user1");

    let anonymous = Document::parse_str(&server.get("/").await.text());
    assert!(anonymous.find(SIGNED_IN_USER).unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_issue_and_repo_are_404() {
    let server = test_server();

    assert_eq!(
        server.get("/user2/repo1/issues/999").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.get("/user2/repo1/issues/abc").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.get("/user2/nope/issues").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.get("/nobody/repo1/issues").await.status_code(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_pagination_links() {
    let server = test_server();

    let response = server.get("/user2/repo1/issues").await;
    let document = Document::parse_str(&response.text());
    let pages = document.find(PAGINATION_LINKS).unwrap();

    assert_eq!(pages.length(), 2);
    let second = pages.iter().nth(1).unwrap();
    assert_eq!(
        second.attr("href"),
        Some("/user2/repo1/issues?type=all&state=open&page=2")
    );

    let response = server.get("/user2/repo1/issues?page=2").await;
    let document = Document::parse_str(&response.text());
    assert_eq!(document.find_path(ISSUE_TITLES).unwrap().length(), 4);
}

#[tokio::test]
async fn test_no_pagination_on_single_page() {
    let server = test_server();

    let response = server.get("/user2/repo1/issues?state=closed").await;
    let document = Document::parse_str(&response.text());

    assert!(document.find(PAGINATION_LINKS).unwrap().is_empty());
    assert_eq!(document.find_path(ISSUE_TITLES).unwrap().length(), 3);
}

#[tokio::test]
async fn test_page_size_is_configurable() {
    let server = test_server_with_page_size(5);

    let response = server.get("/user2/repo1/issues").await;
    let document = Document::parse_str(&response.text());

    assert_eq!(document.find_path(ISSUE_TITLES).unwrap().length(), 5);
    assert_eq!(document.find(PAGINATION_LINKS).unwrap().length(), 3);
}

#[tokio::test]
async fn test_anonymous_filter_falls_back_to_all() {
    let server = test_server();

    let response = server.get("/user2/repo1/issues?type=created_by&page=2").await;
    let document = Document::parse_str(&response.text());

    // 14 open issues across all posters, so page two holds the last four
    assert_eq!(document.find_path(ISSUE_TITLES).unwrap().length(), 4);
}

#[tokio::test]
async fn test_issue_detail_renders_markdown() {
    let server = test_server();

    let response = server.get("/user2/repo1/issues/1").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let document = Document::parse_str(&response.text());
    let content = document.find(ISSUE_CONTENT).unwrap();
    assert_eq!(content.length(), 1);
    assert!(response.text().contains("language-rust"));
    assert!(
        document
            .find(ISSUE_STATE)
            .unwrap()
            .text()
            .contains("Open")
    );
}

#[tokio::test]
async fn test_closed_issue_detail() {
    let server = test_server();

    let response = server.get("/user2/repo1/issues/14").await;
    let document = Document::parse_str(&response.text());

    assert_eq!(document.find(ISSUE_STATE).unwrap().text(), "Closed");
}

#[tokio::test]
async fn test_page_zero_is_bad_request() {
    let server = test_server();

    let response = server.get("/user2/repo1/issues?page=0").await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_huge_page_number_shows_last_page() {
    let server = test_server();

    let response = server
        .get("/user2/repo1/issues?page=18446744073709551615")
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let document = Document::parse_str(&response.text());
    assert_eq!(document.find_path(ISSUE_TITLES).unwrap().length(), 4);

    let response = server.get("/user2/repo1/issues?page=3").await;
    let document = Document::parse_str(&response.text());
    assert_eq!(document.find_path(ISSUE_TITLES).unwrap().length(), 4);
}
