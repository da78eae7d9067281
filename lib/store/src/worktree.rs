use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use uuid::Uuid;
use vibeman_client::entities::worktree::{Worktree, WorktreeListFilter, WorktreeStatus};
use vibeman_client::error::Error;

use crate::repository::{parse_timestamp, parse_uuid};
use crate::{Store, query_err};

/// Fields required to insert a new [Worktree] row.
#[derive(Debug, Clone)]
pub struct NewWorktree {
  pub repository_id: Uuid,
  pub name: String,
  pub branch: String,
  pub fs_path: String,
  pub status: WorktreeStatus,
}

/// Partial update applied via `update_worktree`. `None` leaves the field
/// unchanged.
#[derive(Debug, Clone, Default)]
pub struct WorktreeUpdate {
  pub branch: Option<String>,
  pub status: Option<WorktreeStatus>,
}

impl Store {
  pub fn create_worktree(&self, new: NewWorktree) -> Result<Worktree, Error> {
    let worktree = Worktree {
      id: Uuid::new_v4(),
      repository_id: new.repository_id,
      name: new.name,
      branch: new.branch,
      fs_path: new.fs_path,
      status: new.status,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    };

    let conn = self.conn.lock().unwrap();
    conn
      .execute(
        "INSERT INTO worktrees (id, repository_id, name, branch, fs_path, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          worktree.id.to_string(),
          worktree.repository_id.to_string(),
          worktree.name,
          worktree.branch,
          worktree.fs_path,
          worktree.status.as_ref(),
          worktree.created_at.to_rfc3339(),
          worktree.updated_at.to_rfc3339(),
        ],
      )
      .map_err(query_err)?;

    Ok(worktree)
  }

  pub fn get_worktree(&self, id: Uuid) -> Result<Worktree, Error> {
    let conn = self.conn.lock().unwrap();
    conn
      .query_row(
        "SELECT id, repository_id, name, branch, fs_path, status, created_at, updated_at
         FROM worktrees WHERE id = ?1",
        params![id.to_string()],
        row_to_worktree,
      )
      .optional()
      .map_err(query_err)?
      .ok_or_else(|| Error::not_found(format!("worktree {id} not found")))
  }

  pub fn get_worktree_by_name(
    &self,
    repository_id: Uuid,
    name: &str,
  ) -> Result<Option<Worktree>, Error> {
    let conn = self.conn.lock().unwrap();
    conn
      .query_row(
        "SELECT id, repository_id, name, branch, fs_path, status, created_at, updated_at
         FROM worktrees WHERE repository_id = ?1 AND name = ?2",
        params![repository_id.to_string(), name],
        row_to_worktree,
      )
      .optional()
      .map_err(query_err)
  }

  pub fn list_worktrees(&self, filter: &WorktreeListFilter) -> Result<Vec<Worktree>, Error> {
    const BASE: &str = "SELECT id, repository_id, name, branch, fs_path, status, created_at, updated_at
       FROM worktrees WHERE 1=1";

    let conn = self.conn.lock().unwrap();
    let repository_id = filter.repository_id.map(|id| id.to_string());
    let status = filter.status.map(|s| s.as_ref().to_string());

    let rows = match (&repository_id, &status) {
      (Some(r), Some(s)) => {
        let sql = format!("{BASE} AND repository_id = ?1 AND status = ?2 ORDER BY created_at DESC");
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        stmt.query_map(params![r, s], row_to_worktree).map_err(query_err)?.collect()
      }
      (Some(r), None) => {
        let sql = format!("{BASE} AND repository_id = ?1 ORDER BY created_at DESC");
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        stmt.query_map(params![r], row_to_worktree).map_err(query_err)?.collect()
      }
      (None, Some(s)) => {
        let sql = format!("{BASE} AND status = ?1 ORDER BY created_at DESC");
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        stmt.query_map(params![s], row_to_worktree).map_err(query_err)?.collect()
      }
      (None, None) => {
        let sql = format!("{BASE} ORDER BY created_at DESC");
        let mut stmt = conn.prepare(&sql).map_err(query_err)?;
        stmt.query_map([], row_to_worktree).map_err(query_err)?.collect()
      }
    };

    rows.map_err(query_err)
  }

  pub fn update_worktree_status(
    &self,
    id: Uuid,
    status: WorktreeStatus,
  ) -> Result<(), Error> {
    let conn = self.conn.lock().unwrap();
    let affected = conn
      .execute(
        "UPDATE worktrees SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_ref(), Utc::now().to_rfc3339(), id.to_string()],
      )
      .map_err(query_err)?;
    if affected == 0 {
      return Err(Error::not_found(format!("worktree {id} not found")));
    }
    Ok(())
  }

  pub fn update_worktree(&self, id: Uuid, update: WorktreeUpdate) -> Result<Worktree, Error> {
    let conn = self.conn.lock().unwrap();
    if let Some(branch) = &update.branch {
      conn
        .execute(
          "UPDATE worktrees SET branch = ?1, updated_at = ?2 WHERE id = ?3",
          params![branch, Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(query_err)?;
    }
    if let Some(status) = update.status {
      conn
        .execute(
          "UPDATE worktrees SET status = ?1, updated_at = ?2 WHERE id = ?3",
          params![status.as_ref(), Utc::now().to_rfc3339(), id.to_string()],
        )
        .map_err(query_err)?;
    }
    drop(conn);
    self.get_worktree(id)
  }

  pub fn delete_worktree(&self, id: Uuid) -> Result<(), Error> {
    let conn = self.conn.lock().unwrap();
    let affected = conn
      .execute("DELETE FROM worktrees WHERE id = ?1", params![id.to_string()])
      .map_err(query_err)?;
    if affected == 0 {
      return Err(Error::not_found(format!("worktree {id} not found")));
    }
    Ok(())
  }
}

fn row_to_worktree(row: &rusqlite::Row) -> rusqlite::Result<Worktree> {
  let status: String = row.get(5)?;
  Ok(Worktree {
    id: parse_uuid(row, 0)?,
    repository_id: parse_uuid(row, 1)?,
    name: row.get(2)?,
    branch: row.get(3)?,
    fs_path: row.get(4)?,
    status: status.parse().map_err(|_| {
      rusqlite::Error::InvalidColumnType(5, "status".into(), rusqlite::types::Type::Text)
    })?,
    created_at: parse_timestamp(row, 6)?,
    updated_at: parse_timestamp(row, 7)?,
  })
}
