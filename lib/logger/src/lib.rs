//! Initializes the process-wide `tracing` subscriber (AMBIENT STACK /
//! Logging): stdio dispatch only, no OpenTelemetry layer, since a local
//! per-developer daemon has no collector to export spans to.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How log lines are rendered on stdout. Plain config knob read from
/// `config.toml`'s `[logging]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogMode {
  #[default]
  Compact,
  Pretty,
  Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
  #[serde(default)]
  pub mode: LogMode,
  /// `RUST_LOG`-style directive, e.g. `"vibeman_server=debug,tower_http=info"`.
  #[serde(default = "default_filter")]
  pub filter: String,
}

fn default_filter() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self { mode: LogMode::default(), filter: "info".into() }
  }
}

pub fn init(config: &LogConfig) -> anyhow::Result<()> {
  let env_filter = EnvFilter::try_new(&config.filter)
    .unwrap_or_else(|_| EnvFilter::new("info"));

  let registry = tracing_subscriber::registry().with(env_filter);

  match config.mode {
    LogMode::Compact => registry
      .with(tracing_subscriber::fmt::layer().with_file(false).with_line_number(false))
      .try_init(),
    LogMode::Pretty => registry
      .with(
        tracing_subscriber::fmt::layer()
          .pretty()
          .with_file(false)
          .with_line_number(false),
      )
      .try_init(),
    LogMode::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
  }
  .context("failed to init logger")
}
