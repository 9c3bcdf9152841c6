//! Issue page tests.
//!
//! The three core checks are written out by hand against the driver, the
//! extractor and the oracle, then repeated through the scenario runner.

use crate::common::{test_env, test_env_with};
use axum::http::StatusCode;
use issuecheck::config::HarnessConfig;
use issuecheck::models::{Issue, Repository, User};
use issuecheck::scenario::{Runner, parse_trailing_index};
use issuecheck::selectors::{ISSUE_INDEX, ISSUE_POSTER, ISSUE_TITLES};
use issuecheck::store::Predicate;
use issuecheck::suite;

#[tokio::test]
async fn test_no_login_view_issues() {
    let env = test_env();

    let response = env.driver.get("/user2/repo1/issues").await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_view_issues_created_by() {
    let env = test_env();
    let user = env.oracle.load_by_id::<User>(1).unwrap();
    let repo = env.oracle.load_by_id::<Repository>(1).unwrap();
    let owner = env.oracle.load_by_id::<User>(repo.owner_id).unwrap();

    let session = env.driver.login(&user.name, "password").await.unwrap();
    let path = format!("{}?type=created_by", repo.issues_link(&owner));
    let response = env
        .driver
        .request_with(axum::http::Method::GET, &path, &session)
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);

    let document = response.document().unwrap();
    let selection = document.find_path(ISSUE_TITLES).unwrap();

    let expected = env
        .oracle
        .expected_count::<Issue>(
            &Predicate::new()
                .eq("repo_id", repo.id)
                .eq("poster_id", user.id)
                .eq("is_closed", false)
                .eq("is_pull", false),
            env.config.page_size,
        )
        .unwrap();
    assert_eq!(selection.length() as u64, expected);

    selection.each(|_, node| {
        let href = node.attr("href").expect("listed issue has an href");
        let index = parse_trailing_index(href).expect("href ends in an index");
        let issue = env
            .oracle
            .load::<Issue>(&Predicate::new().eq("repo_id", repo.id).eq("index", index))
            .unwrap();
        assert_eq!(issue.poster_id, user.id);
    });
}

#[tokio::test]
async fn test_no_login_view_issue() {
    let env = test_env();

    let response = env.driver.get("/user2/repo1/issues/1").await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    let document = response.document().unwrap();
    let title = document
        .find(issuecheck::selectors::ISSUE_TITLE)
        .unwrap()
        .text();
    let issue = env
        .oracle
        .load::<Issue>(&Predicate::new().eq("repo_id", 1).eq("index", 1))
        .unwrap();
    assert_eq!(title.trim(), issue.title);

    let index = document.find(ISSUE_INDEX).unwrap().text();
    assert_eq!(index.trim(), format!("#{}", issue.index));

    let poster = document.find(ISSUE_POSTER).unwrap();
    let user = env.oracle.load_by_id::<User>(issue.poster_id).unwrap();
    assert_eq!(poster.text().trim(), user.name);
    assert_eq!(poster.attr("title"), Some(user.display_name()));
    assert_eq!(user.display_name(), "User One");

    let page_title = document.title().unwrap();
    assert!(page_title.starts_with(&issue.title));
    assert!(page_title.contains("user2/repo1"));
}

#[tokio::test]
async fn test_core_scenarios_pass_through_runner() {
    let env = test_env();
    let runner = Runner::new(&env.driver, &env.oracle, &env.config);

    for name in [
        "no_login_view_issues",
        "view_issues_created_by",
        "no_login_view_issue",
    ] {
        let scenario = suite::find(name).unwrap();
        let report = runner.run(&scenario).await.unwrap();
        assert!(report.passed(), "{}", report);
    }
}

#[tokio::test]
async fn test_created_by_list_is_clamped_to_page_size() {
    let env = test_env_with(HarnessConfig::default().with_page_size(2));
    let runner = Runner::new(&env.driver, &env.oracle, &env.config);

    let scenario = suite::find("view_issues_created_by").unwrap();
    let report = runner.run(&scenario).await.unwrap();

    assert!(report.passed(), "{}", report);
    assert_eq!(report.selected, Some(2));
    assert_eq!(report.expected, Some(2));
    assert_eq!(report.items_checked, 2);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let env = test_env();

    let response = env.driver.get("/user2/repo1/issues").await.unwrap();
    let document = response.document().unwrap();
    let indexes: Vec<i64> = document
        .find_path(ISSUE_TITLES)
        .unwrap()
        .iter()
        .filter_map(|node| node.attr("href").and_then(parse_trailing_index))
        .collect();

    assert_eq!(indexes.len(), 10);
    assert!(indexes.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(indexes[0], 17);
}

#[tokio::test]
async fn test_same_request_twice_is_idempotent() {
    let env = test_env();
    let session = env.driver.login("user1", "password").await.unwrap();

    let mut observed = Vec::new();
    for _ in 0..2 {
        let response = env
            .driver
            .request_with(
                axum::http::Method::GET,
                "/user2/repo1/issues?type=created_by",
                &session,
            )
            .await
            .unwrap();
        let length = response
            .document()
            .unwrap()
            .find_path(ISSUE_TITLES)
            .unwrap()
            .length();
        observed.push((response.status, length));
    }

    assert_eq!(observed[0], observed[1]);
}
