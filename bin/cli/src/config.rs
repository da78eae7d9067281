//! Resolves the address/token the CLI talks to a running `vibeman-server`
//! with: just `--host`/`--token`/env var overrides over one default,
//! since there's no separate remote core to dial and no multi-profile
//! config to load.

use std::sync::OnceLock;

use clap::Parser;

use crate::args::CliArgs;

pub fn cli_args() -> &'static CliArgs {
  static CLI_ARGS: OnceLock<CliArgs> = OnceLock::new();
  CLI_ARGS.get_or_init(CliArgs::parse)
}

/// The default address a `vibeman-server` listens on (must match
/// `ServerConfig::default()`'s `bind_address`).
const DEFAULT_HOST: &str = "http://127.0.0.1:7070";

pub fn resolved_host() -> String {
  cli_args()
    .host
    .clone()
    .or_else(|| std::env::var("VIBEMAN_HOST").ok())
    .unwrap_or_else(|| DEFAULT_HOST.to_string())
}

/// Falls back to the token file `vibeman-server` writes on first boot
/// (spec §6 "token (authentication bearer, 0600)") when neither
/// `--token` nor `VIBEMAN_TOKEN` is set.
pub fn resolved_token() -> anyhow::Result<Option<String>> {
  if let Some(token) = cli_args().token.clone() {
    return Ok(Some(token));
  }
  if let Ok(token) = std::env::var("VIBEMAN_TOKEN") {
    return Ok(Some(token));
  }
  let path = config::VibemanDirs::config_dir().join("token");
  if !path.is_file() {
    return Ok(None);
  }
  Ok(Some(std::fs::read_to_string(path)?.trim().to_string()))
}
