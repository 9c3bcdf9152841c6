//! Fixture dataset loading.
//!
//! A dataset is one JSON array per table (`user.json`, `repository.json`,
//! `issue.json`). The default dataset is embedded at compile time; a
//! directory with the same layout can replace it.

use include_dir::{Dir, include_dir};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::models::{Issue, Repository, User};
use crate::store::{Entity, Store};

static EMBEDDED: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/fixtures");

const USER_FILE: &str = "user.json";
const REPOSITORY_FILE: &str = "repository.json";
const ISSUE_FILE: &str = "issue.json";

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub users: Vec<User>,
    pub repositories: Vec<Repository>,
    pub issues: Vec<Issue>,
}

impl Dataset {
    pub fn embedded() -> HarnessResult<Self> {
        Self::from_sources(|name| {
            EMBEDDED
                .get_file(name)
                .and_then(|f| f.contents_utf8())
                .map(str::to_string)
                .ok_or_else(|| HarnessError::Fixture(format!("embedded {} missing", name)))
        })
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> HarnessResult<Self> {
        let dir = dir.as_ref();
        Self::from_sources(|name| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|e| {
                HarnessError::Fixture(format!("cannot read {}: {}", path.display(), e))
            })
        })
    }

    fn from_sources(read: impl Fn(&str) -> HarnessResult<String>) -> HarnessResult<Self> {
        let dataset = Self {
            users: serde_json::from_str(&read(USER_FILE)?)?,
            repositories: serde_json::from_str(&read(REPOSITORY_FILE)?)?,
            issues: serde_json::from_str(&read(ISSUE_FILE)?)?,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Checks referential integrity before anything reaches the store.
    pub fn validate(&self) -> HarnessResult<()> {
        let user_ids: HashSet<i64> = self.users.iter().map(|u| u.id).collect();
        if user_ids.len() != self.users.len() {
            return Err(HarnessError::Fixture("duplicate user id".to_string()));
        }

        let repo_ids: HashSet<i64> = self.repositories.iter().map(|r| r.id).collect();
        if repo_ids.len() != self.repositories.len() {
            return Err(HarnessError::Fixture("duplicate repository id".to_string()));
        }
        for repo in &self.repositories {
            if !user_ids.contains(&repo.owner_id) {
                return Err(HarnessError::Fixture(format!(
                    "repository {} has unknown owner {}",
                    repo.id, repo.owner_id
                )));
            }
        }

        let mut seen_index = HashSet::new();
        for issue in &self.issues {
            if !repo_ids.contains(&issue.repo_id) {
                return Err(HarnessError::Fixture(format!(
                    "issue {} has unknown repository {}",
                    issue.id, issue.repo_id
                )));
            }
            let referenced = std::iter::once(issue.poster_id).chain(issue.assignee_id);
            for user_id in referenced {
                if !user_ids.contains(&user_id) {
                    return Err(HarnessError::Fixture(format!(
                        "issue {} references unknown user {}",
                        issue.id, user_id
                    )));
                }
            }
            if !seen_index.insert((issue.repo_id, issue.index)) {
                return Err(HarnessError::Fixture(format!(
                    "repository {} has duplicate issue index {}",
                    issue.repo_id, issue.index
                )));
            }
        }

        Ok(())
    }
}

/// Replaces the store's contents with `dataset`.
pub fn seed(store: &Store, dataset: &Dataset) -> HarnessResult<()> {
    store.transaction(|conn| {
        conn.execute_batch(
            "DELETE FROM \"issue\"; DELETE FROM \"repository\"; DELETE FROM \"user\";",
        )?;
        for user in &dataset.users {
            user.insert(conn)?;
        }
        for repo in &dataset.repositories {
            repo.insert(conn)?;
        }
        for issue in &dataset.issues {
            issue.insert(conn)?;
        }
        Ok(())
    })?;

    debug!(
        users = dataset.users.len(),
        repositories = dataset.repositories.len(),
        issues = dataset.issues.len(),
        "seeded store"
    );
    Ok(())
}

pub fn load_dataset(config: &HarnessConfig) -> HarnessResult<Dataset> {
    match &config.fixtures_dir {
        Some(dir) => {
            info!("Loading fixtures from {}", dir.display());
            Dataset::from_dir(dir)
        }
        None => Dataset::embedded(),
    }
}

/// Prepares the store one scenario runs against.
///
/// With a configured `db_path` the existing store is opened read-only and
/// shared as-is; otherwise a fresh in-memory snapshot is seeded from the
/// fixtures, so every call returns an isolated copy.
pub fn prepare_test_env(config: &HarnessConfig) -> HarnessResult<Store> {
    if let Some(path) = &config.db_path {
        return Store::open_read_only(path);
    }

    let dataset = load_dataset(config)?;
    let store = Store::open_memory()?;
    seed(&store, &dataset)?;
    Ok(store)
}
