use std::path::{Path, PathBuf};

use command::run_vibeman_command;
use vibeman_client::entities::log::CommandLog;
use vibeman_client::error::{Error, GitErrorKind};

use crate::auth::GitAuth;

/// `ensure_main_repo` (spec §4.2): if `url_or_path` is already a local
/// directory, returns it as-is. Otherwise clones it as a bare repository
/// under `repos_dir/<name>.git`, reusing the clone if one is already
/// there — repeated calls with the same `(url_or_path, name)` are a
/// no-op after the first.
pub async fn ensure_main_repo(
  url_or_path: &str,
  name: &str,
  repos_dir: &Path,
) -> Result<(PathBuf, Vec<CommandLog>), Error> {
  if Path::new(url_or_path).is_dir() {
    return Ok((PathBuf::from(url_or_path), Vec::new()));
  }

  let bare_path = repos_dir.join(format!("{name}.git"));
  if bare_path.is_dir() {
    return Ok((bare_path, Vec::new()));
  }

  if let Some(parent) = bare_path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(|e| {
      Error::git(GitErrorKind::CloneFailed, format!("failed to create {}", parent.display()), e.into())
    })?;
  }

  let auth = GitAuth::resolve();
  let remote_url = auth.apply_to_url(url_or_path);

  let command = format!("git clone --bare {remote_url} {}", bare_path.display());
  let mut log = run_vibeman_command("clone main repository", None, &command).await;
  log.command = auth.redact(&log.command);
  log.stdout = auth.redact(&log.stdout);
  log.stderr = auth.redact(&log.stderr);

  if !log.success {
    return Err(Error::git(
      GitErrorKind::CloneFailed,
      format!("git clone of {name} failed: {}", log.stderr),
      None::<anyhow::Error>,
    ));
  }

  Ok((bare_path, vec![log]))
}
