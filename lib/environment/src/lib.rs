use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use vibeman_client::entities::log::CommandLog;

/// Writes a worktree's manifest environment overlay to a `.env` file
/// next to the compose file, for `docker compose --env-file` to pick up.
/// Returns the written path, or `None` if there was nothing to write and
/// no existing file to fall back to.
pub async fn write_env_file(
  environment: &HashMap<String, String>,
  worktree_dir: &Path,
  env_file_name: &str,
  logs: &mut Vec<CommandLog>,
) -> Option<PathBuf> {
  let env_file_path = worktree_dir.join(env_file_name);

  if environment.is_empty() {
    return env_file_path.is_file().then_some(env_file_path);
  }

  let mut entries: Vec<_> = environment.iter().collect();
  entries.sort_by(|a, b| a.0.cmp(b.0));
  let contents = entries
    .into_iter()
    .map(|(k, v)| format!("{k}={v}"))
    .collect::<Vec<_>>()
    .join("\n");

  let start_ts = Utc::now();

  if let Some(parent) = env_file_path.parent() {
    if let Err(e) = tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {}", parent.display()))
    {
      logs.push(failed_log(start_ts, e));
      return None;
    }
  }

  if let Err(e) = tokio::fs::write(&env_file_path, &contents)
    .await
    .with_context(|| format!("failed to write {}", env_file_path.display()))
  {
    logs.push(failed_log(start_ts, e));
    return None;
  }

  logs.push(CommandLog {
    stage: "write environment file".into(),
    command: format!("write {}", env_file_path.display()),
    success: true,
    stdout: contents,
    stderr: String::new(),
    start_ts,
    end_ts: Utc::now(),
  });

  Some(env_file_path)
}

fn failed_log(start_ts: chrono::DateTime<Utc>, err: anyhow::Error) -> CommandLog {
  CommandLog {
    stage: "write environment file".into(),
    command: "write .env".into(),
    success: false,
    stdout: String::new(),
    stderr: format!("{err:#}"),
    start_ts,
    end_ts: Utc::now(),
  }
}
