//! The State Store (spec §4.1): a single-writer sqlite-backed relational
//! store for repositories and worktrees, grounded on the rusqlite
//! `Mutex<Connection>` pattern used elsewhere in the example pack for
//! local single-process daemons.

mod repository;
mod worktree;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use vibeman_client::error::{Error, StoreErrorKind};

pub use repository::NewRepository;
pub use worktree::{NewWorktree, WorktreeUpdate};

const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("schema.sql"))];

/// Durable record of repositories and worktrees. All access goes through
/// a single connection behind a mutex: sqlite already serializes writers,
/// and a single-process daemon has no need for a connection pool.
pub struct Store {
  conn: Mutex<Connection>,
}

impl Store {
  /// Opens (creating if absent) the sqlite database at `path` and
  /// applies any migration not yet recorded in `schema_migrations`.
  pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
    let conn = Connection::open(path.as_ref()).map_err(|e| {
      Error::Store {
        kind: StoreErrorKind::Connection,
        message: format!("failed to open state store at {}", path.as_ref().display()),
        source: Some(e.into()),
      }
    })?;

    conn
      .execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
      .map_err(connection_err)?;

    let store = Self { conn: Mutex::new(conn) };
    store.migrate()?;
    Ok(store)
  }

    /// Opens an in-memory store. Used by tests and by any caller that
  /// does not need durability across restarts.
  pub fn open_in_memory() -> Result<Self, Error> {
    let conn = Connection::open_in_memory().map_err(|e| {
      Error::Store {
        kind: StoreErrorKind::Connection,
        message: "failed to open in-memory state store".into(),
        source: Some(e.into()),
      }
    })?;
    conn
      .execute_batch("PRAGMA foreign_keys = ON;")
      .map_err(connection_err)?;
    let store = Self { conn: Mutex::new(conn) };
    store.migrate()?;
    Ok(store)
  }

  fn migrate(&self) -> Result<(), Error> {
    let mut conn = self.conn.lock().unwrap();
    let tx = conn.transaction().map_err(migration_err)?;
    tx.execute_batch(
      "CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
    )
    .map_err(migration_err)?;

    for (version, sql) in MIGRATIONS {
      let already: bool = tx
        .query_row(
          "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?)",
          [version],
          |row| row.get(0),
        )
        .map_err(migration_err)?;
      if already {
        continue;
      }
      tx.execute_batch(sql).map_err(migration_err)?;
      tx.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?, datetime('now'))",
        [version],
      )
      .map_err(migration_err)?;
    }
    tx.commit().map_err(migration_err)
  }

  /// Runs `f` inside a single `BEGIN IMMEDIATE` write transaction. sqlite's
  /// default isolation is already serializable; `IMMEDIATE` just takes the
  /// write lock up front instead of on first write, so callers that read
  /// before they write don't race another writer between the two.
  pub fn transaction<T>(
    &self,
    f: impl FnOnce(&rusqlite::Transaction) -> Result<T, Error>,
  ) -> Result<T, Error> {
    let mut conn = self.conn.lock().unwrap();
    let tx = conn
      .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
      .map_err(query_err)?;
    let result = f(&tx)?;
    tx.commit().map_err(query_err)?;
    Ok(result)
  }
}

fn connection_err(e: rusqlite::Error) -> Error {
  Error::Store {
    kind: StoreErrorKind::Connection,
    message: "state store connection error".into(),
    source: Some(e.into()),
  }
}

fn migration_err(e: rusqlite::Error) -> Error {
  Error::Store {
    kind: StoreErrorKind::Migration,
    message: "state store migration failed".into(),
    source: Some(e.into()),
  }
}

fn query_err(e: rusqlite::Error) -> Error {
  is_constraint_violation(&e)
    .then(|| Error::conflict(e.to_string()))
    .unwrap_or_else(|| Error::Store {
      kind: StoreErrorKind::Query,
      message: "state store query failed".into(),
      source: Some(e.into()),
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(
      rusqlite::ffi::Error { code: rusqlite::ffi::ErrorCode::ConstraintViolation, .. },
      _,
    )
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn open_in_memory_applies_migrations() {
    let store = Store::open_in_memory().unwrap();
    let conn = store.conn.lock().unwrap();
    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
      .unwrap();
    assert_eq!(count, 1);
  }
}
