use std::path::Path;

use command::run_vibeman_command;
use vibeman_client::error::{Error, GitErrorKind};

async fn run(stage: &str, path: &Path, command: impl AsRef<str>) -> Result<(bool, String), Error> {
  let log = run_vibeman_command(stage, Some(path), command).await;
  if !log.success {
    return Err(Error::git(GitErrorKind::WorktreeFailed, format!("{stage} failed: {}", log.stderr), None::<anyhow::Error>));
  }
  Ok((log.success, log.stdout))
}

pub async fn branch_exists(repo: &Path, branch: &str) -> Result<bool, Error> {
  let log = run_vibeman_command(
    "check local branch",
    Some(repo),
    format!("git show-ref --verify --quiet refs/heads/{branch}"),
  )
  .await;
  Ok(log.success)
}

pub async fn remote_branch_exists(repo: &Path, branch: &str) -> Result<bool, Error> {
  let log = run_vibeman_command(
    "check remote branch",
    Some(repo),
    format!("git show-ref --verify --quiet refs/remotes/origin/{branch}"),
  )
  .await;
  Ok(log.success)
}

pub async fn has_uncommitted_changes(path: &Path) -> Result<bool, Error> {
  let (_, stdout) = run("check dirty state", path, "git status --porcelain").await?;
  Ok(!stdout.trim().is_empty())
}

pub async fn has_unpushed_commits(path: &Path) -> Result<bool, Error> {
  let log = run_vibeman_command(
    "check unpushed commits",
    Some(path),
    "git log @{u}..HEAD --oneline",
  )
  .await;
  if !log.success {
    // No upstream configured: treat as having unpushed work, since
    // there is nowhere the commits could already be.
    return Ok(true);
  }
  Ok(!log.stdout.trim().is_empty())
}

pub async fn is_branch_merged(path: &Path, branch: &str, into_default: &str) -> Result<bool, Error> {
  let (_, stdout) = run("check branch ancestry", path, format!("git merge-base --is-ancestor {branch} {into_default}; echo $?")).await?;
  Ok(stdout.trim() == "0")
}

pub async fn get_current_branch(path: &Path) -> Result<String, Error> {
  let (_, stdout) = run("get current branch", path, "git rev-parse --abbrev-ref HEAD").await?;
  Ok(stdout.trim().to_string())
}

pub async fn get_default_branch(main_repo: &Path) -> Result<String, Error> {
  let log = run_vibeman_command(
    "get default branch",
    Some(main_repo),
    "git symbolic-ref refs/remotes/origin/HEAD --short",
  )
  .await;
  if log.success {
    if let Some(branch) = log.stdout.trim().strip_prefix("origin/") {
      if !branch.is_empty() {
        return Ok(branch.to_string());
      }
    }
  }

  // Bare/local-only repos have no `origin/HEAD`; fall back to whichever
  // of the conventional default names exists.
  for candidate in ["main", "master"] {
    if branch_exists(main_repo, candidate).await? {
      return Ok(candidate.to_string());
    }
  }

  Err(Error::git(
    GitErrorKind::BranchNotFound,
    "could not determine default branch".to_string(),
    None::<anyhow::Error>,
  ))
}
