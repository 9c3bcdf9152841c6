//! Harness behavior tests.
//!
//! Suite runs, failure reporting, and the network transport against a real
//! listener.

use crate::common::test_env;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::get;
use issuecheck::config::HarnessConfig;
use issuecheck::driver::{Driver, RouterTransport};
use issuecheck::fixtures::{Dataset, prepare_test_env, seed};
use issuecheck::oracle::Oracle;
use issuecheck::scenario::{ListCheck, Runner, Scenario, ScenarioReport, Step, Target};
use issuecheck::selectors::ISSUE_TITLES;
use issuecheck::store::{Predicate, Store};
use issuecheck::suite::{self, Outcome};
use issuecheck::{AppState, HarnessError, create_app};
use std::sync::Arc;

#[tokio::test]
async fn test_whole_suite_passes_in_process() {
    let config = HarnessConfig::default();
    let scenarios = suite::issue_scenarios();

    let outcomes = suite::run_all(&config, &scenarios).await;

    assert_eq!(outcomes.len(), scenarios.len());
    for outcome in &outcomes {
        match outcome {
            Outcome::Completed(report) => assert!(report.passed(), "{}", report),
            Outcome::Aborted { name, error } => panic!("{} aborted: {}", name, error),
        }
    }
}

#[tokio::test]
async fn test_wrong_expectation_is_reported_not_raised() {
    let env = test_env();
    let runner = Runner::new(&env.driver, &env.oracle, &env.config);

    let scenario = Scenario::get(
        "mismatched_poster",
        Target::RepoIssues {
            repo_id: 1,
            query: "?type=created_by",
        },
    )
    .login_as(1)
    .list(ListCheck {
        selector: ISSUE_TITLES,
        repo_id: 1,
        expected: Predicate::new()
            .eq("repo_id", 1)
            .eq("poster_id", 2)
            .eq("is_closed", false)
            .eq("is_pull", false),
        item: Predicate::new().eq("poster_id", 2),
    });

    let report = runner.run(&scenario).await.unwrap();

    assert!(!report.passed());
    assert_eq!(report.selected, Some(10));
    assert_eq!(report.expected, Some(2));
    assert!(report.failures.iter().any(|f| f.step == Step::Count));
    assert_eq!(
        report
            .failures
            .iter()
            .filter(|f| f.step == Step::Item)
            .count(),
        10
    );
    assert_eq!(report.items_checked, 10);
}

#[tokio::test]
async fn test_unexpected_status_is_an_assertion_failure() {
    let env = test_env();
    let runner = Runner::new(&env.driver, &env.oracle, &env.config);

    let scenario = Scenario::get("missing_issue_expected_ok", Target::Path("/user2/repo1/issues/999"));
    let report = runner.run(&scenario).await.unwrap();

    assert_eq!(report.status, Some(StatusCode::NOT_FOUND));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].step, Step::Status);
}

#[tokio::test]
async fn test_unknown_login_user_is_infrastructure_fault() {
    let env = test_env();
    let runner = Runner::new(&env.driver, &env.oracle, &env.config);

    let scenario = Scenario::get("ghost", Target::Path("/user2/repo1/issues")).login_as(99);
    let err = runner.run(&scenario).await.unwrap_err();

    assert!(matches!(err, HarnessError::Fixture(_)));
    assert!(err.is_infrastructure());
}

#[tokio::test]
async fn test_wrong_password_is_login_fault() {
    let env = test_env();

    let err = env.driver.login("user1", "not-the-password").await.unwrap_err();

    assert!(matches!(err, HarnessError::Login(_)));
}

#[tokio::test]
async fn test_suite_over_http_transport() {
    let store = prepare_test_env(&HarnessConfig::default()).unwrap();
    let app = create_app(Arc::new(AppState::new(store)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = HarnessConfig {
        base_url: Some(format!("http://{}", addr)),
        ..HarnessConfig::default()
    };
    let outcomes = suite::run_all(&config, &suite::issue_scenarios()).await;

    for outcome in &outcomes {
        assert!(outcome.passed(), "scenario failed over HTTP");
    }
    server.abort();
}

#[tokio::test]
async fn test_unreachable_server_is_infrastructure_fault() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = HarnessConfig {
        base_url: Some(format!("http://{}", addr)),
        ..HarnessConfig::default()
    };
    let scenario = suite::find("no_login_view_issues").unwrap();
    let err = suite::run_isolated(&config, &scenario).await.unwrap_err();

    assert!(matches!(err, HarnessError::Http(_)));
    assert!(err.is_infrastructure());
}

#[tokio::test]
async fn test_suite_over_seeded_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("issuecheck.db");
    {
        let store = Store::open(&path).unwrap();
        seed(&store, &Dataset::embedded().unwrap()).unwrap();
    }

    let config = HarnessConfig {
        db_path: Some(path),
        ..HarnessConfig::default()
    };
    let outcomes = suite::run_all(&config, &suite::issue_scenarios()).await;

    assert!(outcomes.iter().all(|o| o.passed()));
}

fn list_page(items: &'static [u8]) -> Vec<u8> {
    let mut body = b"<html><body><div class=\"issue list\">".to_vec();
    body.extend_from_slice(items);
    body.extend_from_slice(b"</div></body></html>");
    body
}

/// A site whose list pages are broken in one way each.
fn broken_site() -> Router {
    fn page(items: &'static [u8]) -> ([(header::HeaderName, &'static str); 1], Vec<u8>) {
        ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], list_page(items))
    }

    Router::new()
        .route(
            "/no-href",
            get(|| async { page(b"<li class=\"item\"><a class=\"title\">first</a></li>") }),
        )
        .route(
            "/bad-href",
            get(|| async {
                page(b"<li class=\"item\"><a class=\"title\" href=\"/user2/repo1/issues/latest\">first</a></li>")
            }),
        )
        .route(
            "/missing-issue",
            get(|| async {
                page(b"<li class=\"item\"><a class=\"title\" href=\"/user2/repo1/issues/999\">ghost</a></li>")
            }),
        )
        .route(
            "/latin1",
            get(|| async {
                page(b"<li class=\"item\"><a class=\"title\" href=\"/user2/repo1/issues/1\">caf\xe9</a></li>")
            }),
        )
}

/// Runs a one-item list check against `path` on the broken site.
async fn run_broken_list(path: &'static str) -> ScenarioReport {
    let config = HarnessConfig::default();
    let oracle = Oracle::new(prepare_test_env(&config).unwrap());
    let driver = Driver::new(RouterTransport::new(broken_site()));
    let runner = Runner::new(&driver, &oracle, &config);

    let scenario = Scenario::get("broken_list", Target::Path(path)).list(ListCheck {
        selector: ISSUE_TITLES,
        repo_id: 1,
        expected: Predicate::new().eq("repo_id", 1).eq("index", 1),
        item: Predicate::new(),
    });
    runner.run(&scenario).await.unwrap()
}

#[tokio::test]
async fn test_item_without_href_is_attribute_failure() {
    let report = run_broken_list("/no-href").await;

    assert_eq!(report.selected, Some(1));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].step, Step::Attribute);
    assert_eq!(report.items_checked, 1);
}

#[tokio::test]
async fn test_href_without_index_is_item_failure() {
    let report = run_broken_list("/bad-href").await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].step, Step::Item);
    assert!(report.failures[0].message.contains("invalid issue href"));
}

#[tokio::test]
async fn test_href_to_missing_issue_is_item_failure() {
    let report = run_broken_list("/missing-issue").await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].step, Step::Item);
    assert!(report.failures[0].message.contains("/user2/repo1/issues/999"));
}

#[tokio::test]
async fn test_invalid_utf8_list_page_is_still_checked() {
    let report = run_broken_list("/latin1").await;

    assert!(report.passed(), "{}", report);
    assert_eq!(report.selected, Some(1));
    assert_eq!(report.items_checked, 1);
}
