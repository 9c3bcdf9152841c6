//! Built-in issue page scenarios.

use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{debug, error, info};

use crate::app::{AppState, create_app};
use crate::config::HarnessConfig;
use crate::driver::{AnyTransport, Driver, HttpTransport, RouterTransport};
use crate::error::{HarnessError, HarnessResult};
use crate::fixtures::prepare_test_env;
use crate::oracle::Oracle;
use crate::scenario::{ListCheck, Runner, Scenario, ScenarioReport, Target};
use crate::selectors::ISSUE_TITLES;
use crate::store::{Predicate, Store};

pub const USER1: i64 = 1;
pub const REPO1: i64 = 1;

fn open_issues(repo_id: i64) -> Predicate {
    Predicate::new()
        .eq("repo_id", repo_id)
        .eq("is_closed", false)
        .eq("is_pull", false)
}

pub fn issue_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::get("no_login_view_issues", Target::Path("/user2/repo1/issues"))
            .described("anonymous visitors can open a public issue list"),
        Scenario::get(
            "view_issues_created_by",
            Target::RepoIssues {
                repo_id: REPO1,
                query: "?type=created_by",
            },
        )
        .described("the created-by filter lists one page of the user's open issues")
        .login_as(USER1)
        .list(ListCheck {
            selector: ISSUE_TITLES,
            repo_id: REPO1,
            expected: open_issues(REPO1).eq("poster_id", USER1),
            item: Predicate::new().eq("poster_id", USER1),
        }),
        Scenario::get("no_login_view_issue", Target::Path("/user2/repo1/issues/1"))
            .described("anonymous visitors can open a public issue"),
        Scenario::get(
            "view_issues_assigned",
            Target::RepoIssues {
                repo_id: REPO1,
                query: "?type=assigned",
            },
        )
        .described("the assigned filter lists open issues assigned to the user")
        .login_as(USER1)
        .list(ListCheck {
            selector: ISSUE_TITLES,
            repo_id: REPO1,
            expected: open_issues(REPO1).eq("assignee_id", USER1),
            item: Predicate::new().eq("assignee_id", USER1),
        }),
        Scenario::get(
            "view_closed_issues",
            Target::RepoIssues {
                repo_id: REPO1,
                query: "?state=closed",
            },
        )
        .described("the closed state lists closed issues only")
        .list(ListCheck {
            selector: ISSUE_TITLES,
            repo_id: REPO1,
            expected: Predicate::new()
                .eq("repo_id", REPO1)
                .eq("is_closed", true)
                .eq("is_pull", false),
            item: Predicate::new().eq("is_closed", true),
        }),
        Scenario::get(
            "no_login_view_open_issues",
            Target::RepoIssues {
                repo_id: REPO1,
                query: "",
            },
        )
        .described("the default list shows the first page of open issues")
        .list(ListCheck {
            selector: ISSUE_TITLES,
            repo_id: REPO1,
            expected: open_issues(REPO1),
            item: Predicate::new().eq("is_closed", false).eq("is_pull", false),
        }),
        Scenario::get(
            "no_login_view_missing_issue",
            Target::Path("/user2/repo1/issues/999"),
        )
        .described("an unknown issue index is a 404")
        .expect_status(StatusCode::NOT_FOUND),
        Scenario::get(
            "no_login_private_repo_hidden",
            Target::Path("/user2/repo2/issues"),
        )
        .described("private repositories are hidden from anonymous visitors")
        .expect_status(StatusCode::NOT_FOUND),
    ]
}

pub fn find(name: &str) -> Option<Scenario> {
    issue_scenarios().into_iter().find(|s| s.name == name)
}

/// The named scenarios in the given order, or all of them when `names` is
/// empty.
pub fn select(names: &[String]) -> HarnessResult<Vec<Scenario>> {
    if names.is_empty() {
        return Ok(issue_scenarios());
    }
    names
        .iter()
        .map(|name| find(name).ok_or_else(|| HarnessError::UnknownScenario(name.clone())))
        .collect()
}

/// Transport for one scenario: the live server when a base URL is
/// configured, otherwise a reference site over `store`.
fn transport_for(
    config: &HarnessConfig,
    store: &Store,
) -> HarnessResult<AnyTransport> {
    match &config.base_url {
        Some(base_url) => {
            let transport = HttpTransport::new(base_url, config.request_timeout)?;
            debug!(base_url = %transport.base_url(), "network transport");
            Ok(AnyTransport::Http(transport))
        }
        None => {
            let state = AppState::new(store.clone()).with_page_size(config.page_size);
            Ok(AnyTransport::InProcess(RouterTransport::new(create_app(
                Arc::new(state),
            ))))
        }
    }
}

/// Runs one scenario against its own freshly prepared store.
pub async fn run_isolated(
    config: &HarnessConfig,
    scenario: &Scenario,
) -> HarnessResult<ScenarioReport> {
    let store = prepare_test_env(config)?;
    let driver = Driver::new(transport_for(config, &store)?);
    let oracle = Oracle::new(store);
    Runner::new(&driver, &oracle, config).run(scenario).await
}

/// Outcome of one scenario within a suite run.
pub enum Outcome {
    Completed(ScenarioReport),
    Aborted {
        name: &'static str,
        error: HarnessError,
    },
}

impl Outcome {
    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Completed(report) if report.passed())
    }
}

/// Runs scenarios one after another; a fault in one does not stop the rest.
pub async fn run_all(config: &HarnessConfig, scenarios: &[Scenario]) -> Vec<Outcome> {
    let mut outcomes = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let outcome = match run_isolated(config, scenario).await {
            Ok(report) => Outcome::Completed(report),
            Err(e) => {
                error!(scenario = scenario.name, "aborted: {}", e);
                Outcome::Aborted {
                    name: scenario.name,
                    error: e,
                }
            }
        };
        outcomes.push(outcome);
    }
    let passed = outcomes.iter().filter(|o| o.passed()).count();
    info!(passed, total = outcomes.len(), "suite finished");
    outcomes
}
