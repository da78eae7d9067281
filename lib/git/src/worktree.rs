use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use command::run_vibeman_command;
use vibeman_client::entities::log::CommandLog;
use vibeman_client::error::{Error, GitErrorKind};

use crate::inspect::{branch_exists, get_default_branch, remote_branch_exists};

#[derive(Debug, Clone)]
pub struct WorktreeListing {
  pub path: PathBuf,
  pub branch: String,
  pub commit: String,
  pub is_main: bool,
  pub is_bare: bool,
  pub is_locked: bool,
  pub created_at: Option<DateTime<Utc>>,
}

/// `create_worktree` (spec §4.2). Branch resolution order: local branch
/// → remote-tracking branch (creates a local tracking branch) → new
/// branch based on the repository's default branch. Fails if
/// `target_path` already exists.
pub async fn create_worktree(
  main_repo: &Path,
  branch: &str,
  target_path: &Path,
) -> Result<Vec<CommandLog>, Error> {
  if target_path.exists() {
    return Err(Error::validation(
      vibeman_client::error::ValidationErrorKind::InvalidPath,
      format!("worktree target path {} already exists", target_path.display()),
    ));
  }

  if let Some(parent) = target_path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(|e| {
      Error::git(GitErrorKind::WorktreeFailed, format!("failed to create {}", parent.display()), e.into())
    })?;
  }

  let mut logs = Vec::new();
  let target = target_path.display();

  let command = if branch_exists(main_repo, branch).await? {
    format!("git worktree add {target} {branch}")
  } else if remote_branch_exists(main_repo, branch).await? {
    format!("git worktree add --track -b {branch} {target} origin/{branch}")
  } else {
    let default_branch = get_default_branch(main_repo).await?;
    format!("git worktree add -b {branch} {target} {default_branch}")
  };

  let log = run_vibeman_command("create worktree", Some(main_repo), &command).await;
  let success = log.success;
  let stderr = log.stderr.clone();
  logs.push(log);

  if !success {
    return Err(Error::git(GitErrorKind::WorktreeFailed, format!("git worktree add failed: {stderr}"), None::<anyhow::Error>));
  }

  Ok(logs)
}

/// `list_worktrees` (spec §4.2), parsed from `git worktree list --porcelain`.
pub async fn list_worktrees(main_repo: &Path) -> Result<Vec<WorktreeListing>, Error> {
  let log = run_vibeman_command("list worktrees", Some(main_repo), "git worktree list --porcelain").await;
  if !log.success {
    return Err(Error::git(GitErrorKind::WorktreeFailed, format!("git worktree list failed: {}", log.stderr), None::<anyhow::Error>));
  }
  Ok(parse_worktree_porcelain(&log.stdout))
}

fn parse_worktree_porcelain(output: &str) -> Vec<WorktreeListing> {
  let mut listings = Vec::new();
  let mut path = None;
  let mut commit = String::new();
  let mut branch = String::new();
  let mut is_bare = false;
  let mut is_locked = false;

  let flush = |listings: &mut Vec<WorktreeListing>,
               path: &mut Option<PathBuf>,
               commit: &mut String,
               branch: &mut String,
               is_bare: &mut bool,
               is_locked: &mut bool| {
    if let Some(p) = path.take() {
      listings.push(WorktreeListing {
        is_main: listings.is_empty(),
        path: p,
        commit: std::mem::take(commit),
        branch: std::mem::take(branch),
        is_bare: std::mem::take(is_bare),
        is_locked: std::mem::take(is_locked),
        created_at: None,
      });
    }
  };

  for line in output.lines() {
    if let Some(p) = line.strip_prefix("worktree ") {
      flush(&mut listings, &mut path, &mut commit, &mut branch, &mut is_bare, &mut is_locked);
      path = Some(PathBuf::from(p));
    } else if let Some(c) = line.strip_prefix("HEAD ") {
      commit = c.to_string();
    } else if let Some(b) = line.strip_prefix("branch ") {
      branch = b.trim_start_matches("refs/heads/").to_string();
    } else if line == "bare" {
      is_bare = true;
    } else if line == "locked" {
      is_locked = true;
    } else if line == "detached" {
      branch = "HEAD".to_string();
    }
  }
  flush(&mut listings, &mut path, &mut commit, &mut branch, &mut is_bare, &mut is_locked);
  listings
}

/// `remove_worktree` (spec §4.2): graceful remove, escalating to
/// force-remove, escalating to a recursive filesystem delete, reporting
/// the combined error if every step fails.
pub async fn remove_worktree(main_repo: &Path, path: &Path) -> Result<Vec<CommandLog>, Error> {
  let mut logs = Vec::new();

  let graceful = run_vibeman_command(
    "remove worktree",
    Some(main_repo),
    format!("git worktree remove {}", path.display()),
  )
  .await;
  let graceful_ok = graceful.success;
  let graceful_err = graceful.stderr.clone();
  logs.push(graceful);
  if graceful_ok {
    return Ok(logs);
  }

  let forced = run_vibeman_command(
    "force remove worktree",
    Some(main_repo),
    format!("git worktree remove --force {}", path.display()),
  )
  .await;
  let forced_ok = forced.success;
  let forced_err = forced.stderr.clone();
  logs.push(forced);
  if forced_ok {
    return Ok(logs);
  }

  if path.exists() {
    if let Err(fs_err) = tokio::fs::remove_dir_all(path).await {
      return Err(Error::git(
        GitErrorKind::WorktreeFailed,
        format!(
          "failed to remove worktree {}: graceful={graceful_err}, force={forced_err}, fs_remove={fs_err}",
          path.display()
        ),
        None::<anyhow::Error>,
      ));
    }
  }

  let _ = run_vibeman_command(
    "prune worktree metadata",
    Some(main_repo),
    "git worktree prune",
  )
  .await;

  Ok(logs)
}
