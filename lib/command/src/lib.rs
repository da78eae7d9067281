//! Shell command execution with captured output (AMBIENT STACK / Shell
//! command execution). Used by the Git Subsystem, manifest setup
//! commands, and post-start container `exec`.

use std::path::Path;

use chrono::Utc;
use run_command::async_run_command;
use vibeman_client::entities::log::CommandLog;

pub async fn run_vibeman_command(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
) -> CommandLog {
  let command = if let Some(path) = path.into() {
    format!("cd {} && {}", path.display(), command.as_ref())
  } else {
    command.as_ref().to_string()
  };
  let start_ts = Utc::now();
  let output = async_run_command(&command).await;
  output_into_log(stage, command, start_ts, output)
}

/// Runs each non-empty, non-comment line of a multiline command string
/// in sequence, chained with `&&`. Returns `None` if nothing remains
/// after stripping blank lines and full-line `#` comments.
pub async fn run_vibeman_command_multiline(
  stage: &str,
  path: impl Into<Option<&Path>>,
  command: impl AsRef<str>,
) -> Option<CommandLog> {
  let command = parse_multiline_command(command.as_ref());
  if command.is_empty() {
    return None;
  }
  Some(run_vibeman_command(stage, path, command).await)
}

fn parse_multiline_command(raw: &str) -> String {
  raw
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty() && !line.starts_with('#'))
    .collect::<Vec<_>>()
    .join(" && ")
}

fn output_into_log(
  stage: &str,
  command: String,
  start_ts: chrono::DateTime<Utc>,
  output: run_command::CommandOutput,
) -> CommandLog {
  let success = output.success();
  CommandLog {
    stage: stage.to_string(),
    command,
    success,
    stdout: output.stdout,
    stderr: output.stderr,
    start_ts,
    end_ts: Utc::now(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn multiline_drops_blank_lines_and_comments() {
    let parsed = parse_multiline_command(
      "# setup\nnpm install\n\n# build\nnpm run build\n",
    );
    assert_eq!(parsed, "npm install && npm run build");
  }

  #[test]
  fn multiline_all_comments_is_empty() {
    assert_eq!(parse_multiline_command("# only comments\n# here"), "");
  }

  #[tokio::test]
  async fn run_vibeman_command_captures_output() {
    let log = run_vibeman_command("test", None, "echo hello").await;
    assert!(log.success);
    assert_eq!(log.stdout.trim(), "hello");
  }
}
