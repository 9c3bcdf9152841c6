use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::Entity;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    pub email: String,
    pub passwd_hash: String,
    pub salt: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl User {
    pub fn hash_password(salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn validate_password(&self, password: &str) -> bool {
        Self::hash_password(&self.salt, password) == self.passwd_hash
    }

    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.name
        } else {
            &self.full_name
        }
    }
}

impl Entity for User {
    const KIND: &'static str = "user";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "full_name",
        "email",
        "passwd_hash",
        "salt",
        "is_admin",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            full_name: row.get(2)?,
            email: row.get(3)?,
            passwd_hash: row.get(4)?,
            salt: row.get(5)?,
            is_admin: row.get(6)?,
        })
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO \"user\" (id, name, full_name, email, passwd_hash, salt, is_admin) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.id,
                self.name,
                self.full_name,
                self.email,
                self.passwd_hash,
                self.salt,
                self.is_admin
            ],
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Repository {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_private: bool,
}

impl Repository {
    /// Site-relative link, e.g. `/user2/repo1`.
    pub fn rel_link(&self, owner: &User) -> String {
        format!("/{}/{}", owner.name, self.name)
    }

    pub fn issues_link(&self, owner: &User) -> String {
        format!("{}/issues", self.rel_link(owner))
    }

    pub fn visible_to(&self, viewer: Option<&User>) -> bool {
        !self.is_private
            || viewer.is_some_and(|user| user.id == self.owner_id || user.is_admin)
    }
}

impl Entity for Repository {
    const KIND: &'static str = "repository";
    const COLUMNS: &'static [&'static str] =
        &["id", "owner_id", "name", "description", "is_private"];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            is_private: row.get(4)?,
        })
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO \"repository\" (id, owner_id, name, description, is_private) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.id,
                self.owner_id,
                self.name,
                self.description,
                self.is_private
            ],
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Issue {
    pub id: i64,
    pub repo_id: i64,
    /// Per-repository sequence number shown as `#index`.
    pub index: i64,
    pub poster_id: i64,
    #[serde(default)]
    pub assignee_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub is_pull: bool,
    pub created_unix: i64,
}

impl Issue {
    pub fn link(&self, repo_link: &str) -> String {
        format!("{}/issues/{}", repo_link, self.index)
    }
}

impl Entity for Issue {
    const KIND: &'static str = "issue";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "repo_id",
        "index",
        "poster_id",
        "assignee_id",
        "title",
        "content",
        "is_closed",
        "is_pull",
        "created_unix",
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            repo_id: row.get(1)?,
            index: row.get(2)?,
            poster_id: row.get(3)?,
            assignee_id: row.get(4)?,
            title: row.get(5)?,
            content: row.get(6)?,
            is_closed: row.get(7)?,
            is_pull: row.get(8)?,
            created_unix: row.get(9)?,
        })
    }

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO \"issue\" (id, repo_id, \"index\", poster_id, assignee_id, title, \
             content, is_closed, is_pull, created_unix) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                self.id,
                self.repo_id,
                self.index,
                self.poster_id,
                self.assignee_id,
                self.title,
                self.content,
                self.is_closed,
                self.is_pull,
                self.created_unix
            ],
        )
    }
}
