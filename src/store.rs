//! SQLite-backed store holding the fixture dataset.
//!
//! The store is the relational layer both the reference site and the
//! expectation oracle read from. Queries are built from [`Predicate`]s: a
//! conjunction of single-column comparisons against one entity's own columns.

use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, OpenFlags, Row, ToSql};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{HarnessError, HarnessResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "user" (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL,
    passwd_hash TEXT NOT NULL,
    salt TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS "repository" (
    id INTEGER PRIMARY KEY,
    owner_id INTEGER NOT NULL REFERENCES "user"(id),
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_private INTEGER NOT NULL DEFAULT 0,
    UNIQUE (owner_id, name)
);

CREATE TABLE IF NOT EXISTS "issue" (
    id INTEGER PRIMARY KEY,
    repo_id INTEGER NOT NULL REFERENCES "repository"(id),
    "index" INTEGER NOT NULL,
    poster_id INTEGER NOT NULL REFERENCES "user"(id),
    assignee_id INTEGER REFERENCES "user"(id),
    title TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    is_closed INTEGER NOT NULL DEFAULT 0,
    is_pull INTEGER NOT NULL DEFAULT 0,
    created_unix INTEGER NOT NULL,
    UNIQUE (repo_id, "index")
);
CREATE INDEX IF NOT EXISTS idx_issue_repo ON "issue"(repo_id, is_closed, is_pull);
"#;

/// A persisted record kind the store knows how to query.
pub trait Entity: Sized {
    /// Table name, also used as the entity kind in messages.
    const KIND: &'static str;
    /// Columns a predicate may reference, in `SELECT` order.
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn insert(&self, conn: &Connection) -> rusqlite::Result<usize>;
}

/// Scalar compared against a column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Bool(bool),
    Text(String),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Null => Ok(ToSqlOutput::Owned(SqlValue::Null)),
            Value::Int(v) => Ok(ToSqlOutput::Owned(SqlValue::Integer(*v))),
            Value::Bool(v) => Ok(ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v)))),
            Value::Text(v) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes()))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "'{}'", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    Ne,
    Gt,
}

impl Cmp {
    fn as_sql(self) -> &'static str {
        match self {
            Cmp::Eq => "=",
            Cmp::Ne => "<>",
            Cmp::Gt => ">",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Cond {
    column: &'static str,
    cmp: Cmp,
    value: Value,
}

/// Conjunction of column comparisons. An empty predicate matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conds: Vec<Cond>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    fn cond(mut self, column: &'static str, cmp: Cmp, value: impl Into<Value>) -> Self {
        self.conds.push(Cond {
            column,
            cmp,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.cond(column, Cmp::Eq, value)
    }

    pub fn ne(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.cond(column, Cmp::Ne, value)
    }

    pub fn gt(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.cond(column, Cmp::Gt, value)
    }

    pub fn and(mut self, other: Predicate) -> Self {
        self.conds.extend(other.conds);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }

    /// Renders the `WHERE` clause and its bound parameters for entity `E`.
    fn where_clause<E: Entity>(&self) -> HarnessResult<(String, Vec<&Value>)> {
        if self.conds.is_empty() {
            return Ok((String::new(), Vec::new()));
        }

        let mut clauses = Vec::with_capacity(self.conds.len());
        let mut params = Vec::with_capacity(self.conds.len());
        for cond in &self.conds {
            if !E::COLUMNS.contains(&cond.column) {
                return Err(HarnessError::UnknownColumn {
                    kind: E::KIND,
                    column: cond.column,
                });
            }
            // `= NULL` never matches in SQL
            match (&cond.value, cond.cmp) {
                (Value::Null, Cmp::Eq) => clauses.push(format!("\"{}\" IS NULL", cond.column)),
                (Value::Null, Cmp::Ne) => {
                    clauses.push(format!("\"{}\" IS NOT NULL", cond.column))
                }
                (value, cmp) => {
                    params.push(value);
                    clauses.push(format!(
                        "\"{}\" {} ?{}",
                        cond.column,
                        cmp.as_sql(),
                        params.len()
                    ));
                }
            }
        }

        Ok((format!(" WHERE {}", clauses.join(" AND ")), params))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conds.is_empty() {
            return write!(f, "(all)");
        }
        for (i, cond) in self.conds.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{} {} {}", cond.column, cond.cmp.as_sql(), cond.value)?;
        }
        Ok(())
    }
}

/// Ordering and window for [`Store::select`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Window {
    pub order_by: Option<&'static str>,
    pub descending: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Window {
    pub fn ordered_desc(column: &'static str) -> Self {
        Self {
            order_by: Some(column),
            descending: true,
            ..Self::default()
        }
    }

    /// Window over the 1-based `page`, or `None` when its offset does not
    /// fit in a `usize`.
    pub fn page(mut self, page: usize, page_size: usize) -> Option<Self> {
        self.limit = Some(page_size);
        self.offset = page.saturating_sub(1).checked_mul(page_size)?;
        Some(self)
    }
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens a private in-memory store with an empty schema.
    pub fn open_memory() -> HarnessResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens or creates an on-disk store.
    pub fn open(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        info!("Opened store at {:?}", path.as_ref());
        Ok(store)
    }

    /// Opens an existing store without write access.
    pub fn open_read_only(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!("Opened store read-only at {:?}", path.as_ref());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(&self) -> HarnessResult<()> {
        self.conn.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Runs `f` inside a single transaction.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Connection) -> HarnessResult<T>,
    ) -> HarnessResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn count<E: Entity>(&self, predicate: &Predicate) -> HarnessResult<u64> {
        let (clause, params) = predicate.where_clause::<E>()?;
        let sql = format!("SELECT COUNT(*) FROM \"{}\"{}", E::KIND, clause);
        debug!(%sql, %predicate, "count");

        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            &sql,
            rusqlite::params_from_iter(params),
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    pub fn select<E: Entity>(&self, predicate: &Predicate, window: Window) -> HarnessResult<Vec<E>> {
        let (clause, params) = predicate.where_clause::<E>()?;
        let columns = E::COLUMNS
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {} FROM \"{}\"{}", columns, E::KIND, clause);

        if let Some(order_by) = window.order_by {
            if !E::COLUMNS.contains(&order_by) {
                return Err(HarnessError::UnknownColumn {
                    kind: E::KIND,
                    column: order_by,
                });
            }
            let direction = if window.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY \"{}\" {}", order_by, direction));
        }
        if let Some(limit) = window.limit {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, window.offset));
        }
        debug!(%sql, %predicate, "select");

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
            E::from_row(row)
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<E>>>()?;
        Ok(records)
    }

    /// First record matching `predicate`, if any.
    pub fn find_one<E: Entity>(&self, predicate: &Predicate) -> HarnessResult<Option<E>> {
        let window = Window {
            limit: Some(1),
            ..Window::default()
        };
        Ok(self.select::<E>(predicate, window)?.into_iter().next())
    }
}
