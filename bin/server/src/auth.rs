//! Bearer-token authentication (spec §6/§9 "No credential issuance;
//! authentication is a bearer token persisted locally"). There is no
//! login flow and nothing to issue: the token is generated once on
//! first run, written to `config_dir/token` at mode 0600, and every
//! subsequent request must present it unchanged via `Authorization:
//! Bearer <token>`.

use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use rand::RngCore;
use response::VibemanResponse;
use subtle::ConstantTimeEq;
use vibeman_client::error::{Error, TransportErrorKind};

/// Reads the bearer token from `path`, generating and persisting a new
/// random one if absent. Written to disk rather than kept purely
/// in-memory: a CLI running as a separate process needs to read the
/// same value back.
pub fn ensure_token(path: &Path) -> anyhow::Result<String> {
  if let Ok(existing) = std::fs::read_to_string(path) {
    let trimmed = existing.trim().to_string();
    if !trimmed.is_empty() {
      return Ok(trimmed);
    }
  }

  let mut bytes = [0u8; 32];
  rand::rng().fill_bytes(&mut bytes);
  let token = hex::encode(bytes);

  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, &token)?;
  set_owner_only(path)?;

  Ok(token)
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> anyhow::Result<()> {
  use std::os::unix::fs::PermissionsExt;
  std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
  Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> anyhow::Result<()> {
  Ok(())
}

/// Axum middleware: rejects any request whose `Authorization` header
/// does not carry exactly the configured token. Comparison is
/// constant-time so response latency can't leak how much of the token
/// a guess got right.
pub async fn require_bearer_token(
  State(expected): State<Arc<str>>,
  header: Option<TypedHeader<Authorization<Bearer>>>,
  request: Request<axum::body::Body>,
  next: Next,
) -> Result<Response, VibemanResponse> {
  let presented = header.map(|TypedHeader(auth)| auth.token().to_string());

  match presented {
    Some(token) if token_matches(&expected, Some(&token)) => Ok(next.run(request).await),
    _ => Err(VibemanResponse(Error::Transport {
      kind: TransportErrorKind::AuthFailed,
      message: "missing or invalid bearer token".to_string(),
      source: None,
    })),
  }
}

/// Same check for the WebSocket gateway's pre-upgrade validation (spec
/// §4.8): a query parameter, since browser `WebSocket` clients cannot
/// set arbitrary request headers.
pub fn token_matches(expected: &str, presented: Option<&str>) -> bool {
  match presented {
    Some(token) if token.len() == expected.len() => bool::from(token.as_bytes().ct_eq(expected.as_bytes())),
    _ => false,
  }
}
