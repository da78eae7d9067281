use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;
use vibeman_client::entities::repository::{Repository, RepositoryListItem};
use vibeman_client::error::Error;

use crate::{Store, query_err};

/// Fields required to insert a new [Repository] row. `id`/`created_at`/
/// `updated_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRepository {
  pub name: String,
  pub local_path: String,
  pub git_url: Option<String>,
  pub description: String,
}

impl Store {
  pub fn create_repository(&self, new: NewRepository) -> Result<Repository, Error> {
    let repository = Repository {
      id: Uuid::new_v4(),
      name: new.name,
      local_path: new.local_path,
      git_url: new.git_url,
      description: new.description,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    };

    let conn = self.conn.lock().unwrap();
    conn
      .execute(
        "INSERT INTO repositories (id, name, local_path, git_url, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
          repository.id.to_string(),
          repository.name,
          repository.local_path,
          repository.git_url,
          repository.description,
          repository.created_at.to_rfc3339(),
          repository.updated_at.to_rfc3339(),
        ],
      )
      .map_err(query_err)?;

    Ok(repository)
  }

  pub fn get_repository(&self, id: Uuid) -> Result<Repository, Error> {
    let conn = self.conn.lock().unwrap();
    conn
      .query_row(
        "SELECT id, name, local_path, git_url, description, created_at, updated_at
         FROM repositories WHERE id = ?1",
        params![id.to_string()],
        row_to_repository,
      )
      .optional()
      .map_err(query_err)?
      .ok_or_else(|| Error::not_found(format!("repository {id} not found")))
  }

  pub fn get_repository_by_name(&self, name: &str) -> Result<Option<Repository>, Error> {
    let conn = self.conn.lock().unwrap();
    conn
      .query_row(
        "SELECT id, name, local_path, git_url, description, created_at, updated_at
         FROM repositories WHERE name = ?1",
        params![name],
        row_to_repository,
      )
      .optional()
      .map_err(query_err)
  }

  pub fn list_repositories(&self) -> Result<Vec<RepositoryListItem>, Error> {
    let conn = self.conn.lock().unwrap();
    let mut stmt = conn
      .prepare(
        "SELECT r.id, r.name, r.local_path, COUNT(w.id) AS worktree_count
         FROM repositories r
         LEFT JOIN worktrees w ON w.repository_id = r.id
         GROUP BY r.id
         ORDER BY r.created_at DESC",
      )
      .map_err(query_err)?;

    let rows = stmt
      .query_map([], |row| {
        Ok(RepositoryListItem {
          id: Uuid::parse_str(&row.get::<_, String>(0)?).unwrap_or_default(),
          name: row.get(1)?,
          local_path: row.get(2)?,
          worktree_count: row.get(3)?,
        })
      })
      .map_err(query_err)?
      .collect::<Result<Vec<_>, _>>()
      .map_err(query_err)?;

    Ok(rows)
  }

  /// Deletes a repository row. Callers must have already verified it has
  /// no worktree rows (spec §4.6 `remove_repository`); the foreign key's
  /// `ON DELETE RESTRICT` is the last line of defense, surfaced here as
  /// a `Conflict`.
  pub fn delete_repository(&self, id: Uuid) -> Result<(), Error> {
    let conn = self.conn.lock().unwrap();
    let affected = conn
      .execute("DELETE FROM repositories WHERE id = ?1", params![id.to_string()])
      .map_err(query_err)?;
    if affected == 0 {
      return Err(Error::not_found(format!("repository {id} not found")));
    }
    Ok(())
  }
}

fn row_to_repository(row: &rusqlite::Row) -> rusqlite::Result<Repository> {
  Ok(Repository {
    id: parse_uuid(row, 0)?,
    name: row.get(1)?,
    local_path: row.get(2)?,
    git_url: row.get(3)?,
    description: row.get(4)?,
    created_at: parse_timestamp(row, 5)?,
    updated_at: parse_timestamp(row, 6)?,
  })
}

pub(crate) fn parse_uuid(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Uuid> {
  let raw: String = row.get(idx)?;
  Uuid::parse_str(&raw).map_err(|e| {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
  })
}

pub(crate) fn parse_timestamp(
  row: &rusqlite::Row,
  idx: usize,
) -> rusqlite::Result<chrono::DateTime<Utc>> {
  let raw: String = row.get(idx)?;
  chrono::DateTime::parse_from_rfc3339(&raw)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| {
      rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
