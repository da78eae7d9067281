//! Resolves remote git authentication in the order spec §4.2 fixes:
//! `SSH_KEY_PATH` → SSH agent → `GIT_USERNAME`+`GIT_PASSWORD` →
//! `GITHUB_TOKEN` (basic auth, username `token`) → anonymous.

/// A resolved auth strategy, applied either by rewriting the remote URL
/// (HTTPS forms) or by setting `GIT_SSH_COMMAND` (SSH forms) around the
/// shelled-out git invocation.
pub enum GitAuth {
  SshKey { key_path: String },
  SshAgent,
  Basic { username: String, password: String },
  Anonymous,
}

impl GitAuth {
  pub fn resolve() -> Self {
    if let Ok(key_path) = std::env::var("SSH_KEY_PATH") {
      return GitAuth::SshKey { key_path };
    }
    if std::env::var("SSH_AUTH_SOCK").is_ok() {
      return GitAuth::SshAgent;
    }
    if let (Ok(username), Ok(password)) =
      (std::env::var("GIT_USERNAME"), std::env::var("GIT_PASSWORD"))
    {
      return GitAuth::Basic { username, password };
    }
    if let Ok(token) = std::env::var("GITHUB_TOKEN") {
      return GitAuth::Basic { username: "token".into(), password: token };
    }
    GitAuth::Anonymous
  }

  /// The secret half of this auth, if any — used to redact the
  /// credential out of captured command logs before they're persisted
  /// or shipped over the Attach/Stream Gateway.
  pub fn secret(&self) -> Option<&str> {
    match self {
      GitAuth::Basic { password, .. } => Some(password),
      GitAuth::SshKey { key_path } => Some(key_path),
      GitAuth::SshAgent | GitAuth::Anonymous => None,
    }
  }

  /// Rewrites an `https://` remote URL to embed basic-auth credentials.
  /// SSH remotes and non-basic auth strategies pass the URL through
  /// unchanged — SSH auth is applied via environment instead.
  pub fn apply_to_url(&self, url: &str) -> String {
    match self {
      GitAuth::Basic { username, password } => {
        if let Some(rest) = url.strip_prefix("https://") {
          format!("https://{username}:{password}@{rest}")
        } else {
          url.to_string()
        }
      }
      GitAuth::SshKey { .. } | GitAuth::SshAgent | GitAuth::Anonymous => url.to_string(),
    }
  }

  /// `GIT_SSH_COMMAND` override for SSH-key auth; `None` leaves the
  /// ambient ssh config (agent or default keys) in charge.
  pub fn ssh_command(&self) -> Option<String> {
    match self {
      GitAuth::SshKey { key_path } => {
        Some(format!("ssh -i {key_path} -o IdentitiesOnly=yes -o StrictHostKeyChecking=accept-new"))
      }
      _ => None,
    }
  }

  /// Redacts this auth's secret out of captured stdout/stderr/command
  /// text before it's stored or printed.
  pub fn redact(&self, text: &str) -> String {
    match self.secret() {
      Some(secret) if !secret.is_empty() => text.replace(secret, "<REDACTED>"),
      _ => text.to_string(),
    }
  }
}
