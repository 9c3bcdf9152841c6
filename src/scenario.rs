//! Scenario definitions and the runner that executes them.
//!
//! A scenario is a straight line: optional login, one request, a status
//! check, and for list pages a count check plus a per-item check. Assertion
//! failures are collected into the [`ScenarioReport`] and the scenario keeps
//! going; infrastructure faults end it with an `Err`.

use axum::http::{Method, StatusCode};
use std::fmt;
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::driver::{Driver, Session, Transport};
use crate::error::{HarnessError, HarnessResult};
use crate::html::Selection;
use crate::models::{Issue, Repository, User};
use crate::oracle::Oracle;
use crate::selectors::SelectorPath;
use crate::store::Predicate;

/// Where a scenario sends its request.
#[derive(Debug, Clone)]
pub enum Target {
    Path(&'static str),
    /// `{repository link}/issues{query}`, resolved through the store.
    RepoIssues { repo_id: i64, query: &'static str },
}

/// Count and per-item checks for an issue list page.
#[derive(Debug, Clone)]
pub struct ListCheck {
    pub selector: SelectorPath,
    /// Repository the listed indexes belong to.
    pub repo_id: i64,
    /// Issues the page is expected to list, before paging.
    pub expected: Predicate,
    /// Every listed issue must also match this.
    pub item: Predicate,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub login_as: Option<i64>,
    pub target: Target,
    pub expect_status: StatusCode,
    pub list: Option<ListCheck>,
}

impl Scenario {
    pub fn get(name: &'static str, target: Target) -> Self {
        Self {
            name,
            description: "",
            login_as: None,
            target,
            expect_status: StatusCode::OK,
            list: None,
        }
    }

    pub fn described(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn login_as(mut self, user_id: i64) -> Self {
        self.login_as = Some(user_id);
        self
    }

    pub fn expect_status(mut self, status: StatusCode) -> Self {
        self.expect_status = status;
        self
    }

    pub fn list(mut self, check: ListCheck) -> Self {
        self.list = Some(check);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Status,
    Count,
    Attribute,
    Item,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Status => write!(f, "status"),
            Step::Count => write!(f, "count"),
            Step::Attribute => write!(f, "attribute"),
            Step::Item => write!(f, "item"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssertionFailure {
    pub step: Step,
    pub message: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.step, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub name: String,
    pub path: String,
    pub status: Option<StatusCode>,
    pub selected: Option<usize>,
    pub expected: Option<u64>,
    pub items_checked: usize,
    pub failures: Vec<AssertionFailure>,
}

impl ScenarioReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: String::new(),
            status: None,
            selected: None,
            expected: None,
            items_checked: 0,
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, step: Step, message: String) {
        warn!(scenario = %self.name, %step, "{}", message);
        self.failures.push(AssertionFailure { step, message });
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.passed() { "ok" } else { "FAILED" };
        write!(f, "{} ... {}", self.name, verdict)?;
        if let Some(status) = self.status {
            write!(f, " (GET {} -> {}", self.path, status.as_u16())?;
            if let (Some(selected), Some(expected)) = (self.selected, self.expected) {
                write!(f, ", {}/{} items", selected, expected)?;
            }
            write!(f, ")")?;
        }
        for failure in &self.failures {
            write!(f, "\n    {}", failure)?;
        }
        Ok(())
    }
}

/// Index after the last `/` of an issue link, e.g. `5` in `/user2/repo1/issues/5`.
pub fn parse_trailing_index(href: &str) -> Option<i64> {
    let tail = match href.rfind('/') {
        Some(pos) => &href[pos + 1..],
        None => href,
    };
    tail.parse().ok()
}

/// Missing fixture records during setup are a broken environment, not a
/// scenario outcome.
fn setup<T>(result: HarnessResult<T>) -> HarnessResult<T> {
    result.map_err(|e| match e {
        HarnessError::NotFound { kind, predicate } => {
            HarnessError::Fixture(format!("no {} matching {}", kind, predicate))
        }
        other => other,
    })
}

pub struct Runner<'a, T> {
    driver: &'a Driver<T>,
    oracle: &'a Oracle,
    config: &'a HarnessConfig,
}

impl<'a, T: Transport> Runner<'a, T> {
    pub fn new(driver: &'a Driver<T>, oracle: &'a Oracle, config: &'a HarnessConfig) -> Self {
        Self {
            driver,
            oracle,
            config,
        }
    }

    pub async fn run(&self, scenario: &Scenario) -> HarnessResult<ScenarioReport> {
        let mut report = ScenarioReport::new(scenario.name);

        let session = match scenario.login_as {
            Some(user_id) => Some(self.login(user_id).await?),
            None => None,
        };

        report.path = self.resolve(&scenario.target)?;
        let response = match &session {
            Some(session) => {
                self.driver
                    .request_with(Method::GET, &report.path, session)
                    .await?
            }
            None => self.driver.request(Method::GET, &report.path).await?,
        };

        report.status = Some(response.status);
        if response.status != scenario.expect_status {
            report.fail(
                Step::Status,
                format!(
                    "expected status {}, got {}",
                    scenario.expect_status.as_u16(),
                    response.status.as_u16()
                ),
            );
        }

        if let Some(check) = &scenario.list {
            let document = response.document()?;
            let selection = document.find_path(check.selector)?;
            self.check_list(check, &selection, &mut report)?;
        }

        info!(scenario = scenario.name, passed = report.passed(), "scenario finished");
        Ok(report)
    }

    async fn login(&self, user_id: i64) -> HarnessResult<Session> {
        let user = setup(self.oracle.load_by_id::<User>(user_id))?;
        self.driver.login(&user.name, &self.config.password).await
    }

    fn resolve(&self, target: &Target) -> HarnessResult<String> {
        match target {
            Target::Path(path) => Ok((*path).to_string()),
            Target::RepoIssues { repo_id, query } => {
                let repo = setup(self.oracle.load_by_id::<Repository>(*repo_id))?;
                let owner = setup(self.oracle.load_by_id::<User>(repo.owner_id))?;
                Ok(format!("{}{}", repo.issues_link(&owner), query))
            }
        }
    }

    fn check_list(
        &self,
        check: &ListCheck,
        selection: &Selection<'_>,
        report: &mut ScenarioReport,
    ) -> HarnessResult<()> {
        let expected = self
            .oracle
            .expected_count::<Issue>(&check.expected, self.config.page_size)?;
        report.selected = Some(selection.length());
        report.expected = Some(expected);

        if selection.length() as u64 != expected {
            report.fail(
                Step::Count,
                format!(
                    "expected {} items at {}, found {} (predicate: {})",
                    expected,
                    check.selector,
                    selection.length(),
                    check.expected
                ),
            );
        }

        for (i, node) in selection.iter().enumerate() {
            self.check_item(check, i, &node, report)?;
            report.items_checked += 1;
        }
        Ok(())
    }

    fn check_item(
        &self,
        check: &ListCheck,
        position: usize,
        node: &Selection<'_>,
        report: &mut ScenarioReport,
    ) -> HarnessResult<()> {
        let Some(href) = node.attr("href") else {
            report.fail(
                Step::Attribute,
                format!("item {} has no href", position),
            );
            return Ok(());
        };
        let Some(index) = parse_trailing_index(href) else {
            report.fail(Step::Item, format!("invalid issue href: {}", href));
            return Ok(());
        };

        let locate = Predicate::new()
            .eq("repo_id", check.repo_id)
            .eq("index", index);
        let issue = match self.oracle.load::<Issue>(&locate) {
            Ok(issue) => issue,
            Err(e) if !e.is_infrastructure() => {
                report.fail(Step::Item, format!("{} (href {})", e, href));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if !check.item.is_empty()
            && self
                .oracle
                .count::<Issue>(&locate.and(check.item.clone()))?
                == 0
        {
            report.fail(
                Step::Item,
                format!(
                    "issue #{} does not satisfy {} (poster_id = {}, assignee_id = {:?}, is_closed = {})",
                    issue.index, check.item, issue.poster_id, issue.assignee_id, issue.is_closed
                ),
            );
        }
        Ok(())
    }
}
