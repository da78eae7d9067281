use std::error::Error as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use typeshare::typeshare;

/// The stable error taxonomy of spec §7. Every leaf component that can
/// fail in a way the operator should see maps into one of these
/// variants; the orchestrator is the only layer that decides whether to
/// retry, roll back, or surface a given failure (§7 Propagation).
#[derive(Debug, Error)]
pub enum Error {
  #[error("config: {kind}: {message}")]
  Config {
    kind: ConfigErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
  },
  #[error("container: {kind}: {message}")]
  Container {
    kind: ContainerErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
  },
  #[error("service: {kind}: {message}")]
  Service {
    kind: ServiceErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
  },
  #[error("git: {kind}: {message}")]
  Git {
    kind: GitErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
  },
  #[error("store: {kind}: {message}")]
  Store {
    kind: StoreErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
  },
  #[error("transport: {kind}: {message}")]
  Transport {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
  },
  #[error("validation: {kind}: {message}")]
  Validation {
    kind: ValidationErrorKind,
    message: String,
  },
  #[error("control: {kind}: {message}")]
  Control {
    kind: ControlErrorKind,
    message: String,
  },
}

macro_rules! error_kind_enum {
  ($name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
    #[typeshare]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum $name {
      $($variant),+
    }

    impl $name {
      pub fn code(self) -> &'static str {
        match self {
          $(Self::$variant => $code),+
        }
      }
    }
  };
}

error_kind_enum!(ConfigErrorKind {
  NotFound => "config.not_found",
  Parse => "config.parse",
  Invalid => "config.invalid",
  Validation => "config.validation",
});

error_kind_enum!(ContainerErrorKind {
  NotFound => "container.not_found",
  CreateFailed => "container.create_failed",
  StartFailed => "container.start_failed",
  StopFailed => "container.stop_failed",
  ExecFailed => "container.exec_failed",
  NotRunning => "container.not_running",
  InvalidId => "container.invalid_id",
  AlreadyExists => "container.already_exists",
});

error_kind_enum!(ServiceErrorKind {
  NotFound => "service.not_found",
  AlreadyRunning => "service.already_running",
  StartFailed => "service.start_failed",
  StopFailed => "service.stop_failed",
  HealthCheckFailed => "service.health_check_failed",
  DependencyFailed => "service.dependency_failed",
});

error_kind_enum!(GitErrorKind {
  RepoNotFound => "git.repo_not_found",
  CloneFailed => "git.clone_failed",
  WorktreeFailed => "git.worktree_failed",
  BranchNotFound => "git.branch_not_found",
  Uncommitted => "git.uncommitted",
  Unpushed => "git.unpushed",
  NotMerged => "git.not_merged",
});

error_kind_enum!(StoreErrorKind {
  Connection => "store.connection",
  Query => "store.query",
  Migration => "store.migration",
  NotFound => "store.not_found",
  Conflict => "store.conflict",
});

error_kind_enum!(TransportErrorKind {
  Network => "transport.network",
  ApiCall => "transport.api_call",
  AuthFailed => "transport.auth_failed",
  PermissionDenied => "transport.permission_denied",
  RateLimited => "transport.rate_limited",
});

error_kind_enum!(ValidationErrorKind {
  Failed => "validation.failed",
  InvalidInput => "validation.invalid_input",
  InvalidPath => "validation.invalid_path",
  InvalidPort => "validation.invalid_port",
  InvalidState => "validation.invalid_state",
});

error_kind_enum!(ControlErrorKind {
  NotImplemented => "control.not_implemented",
  Timeout => "control.timeout",
  Cancelled => "control.cancelled",
  ShuttingDown => "control.shutting_down",
});

impl Error {
  pub fn code(&self) -> &'static str {
    match self {
      Error::Config { kind, .. } => kind.code(),
      Error::Container { kind, .. } => kind.code(),
      Error::Service { kind, .. } => kind.code(),
      Error::Git { kind, .. } => kind.code(),
      Error::Store { kind, .. } => kind.code(),
      Error::Transport { kind, .. } => kind.code(),
      Error::Validation { kind, .. } => kind.code(),
      Error::Control { kind, .. } => kind.code(),
    }
  }

  pub fn store(kind: StoreErrorKind, message: impl Into<String>) -> Self {
    Error::Store {
      kind,
      message: message.into(),
      source: None,
    }
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Error::store(StoreErrorKind::NotFound, message)
  }

  pub fn conflict(message: impl Into<String>) -> Self {
    Error::store(StoreErrorKind::Conflict, message)
  }

  pub fn validation(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
    Error::Validation {
      kind,
      message: message.into(),
    }
  }

  pub fn config(kind: ConfigErrorKind, message: impl Into<String>, source: anyhow::Error) -> Self {
    Error::Config {
      kind,
      message: message.into(),
      source: Some(source),
    }
  }

  pub fn container(
    kind: ContainerErrorKind,
    message: impl Into<String>,
    source: impl Into<Option<anyhow::Error>>,
  ) -> Self {
    Error::Container {
      kind,
      message: message.into(),
      source: source.into(),
    }
  }

  pub fn service(
    kind: ServiceErrorKind,
    message: impl Into<String>,
    source: impl Into<Option<anyhow::Error>>,
  ) -> Self {
    Error::Service {
      kind,
      message: message.into(),
      source: source.into(),
    }
  }

  pub fn git(
    kind: GitErrorKind,
    message: impl Into<String>,
    source: impl Into<Option<anyhow::Error>>,
  ) -> Self {
    Error::Git {
      kind,
      message: message.into(),
      source: source.into(),
    }
  }

  pub fn control(kind: ControlErrorKind, message: impl Into<String>) -> Self {
    Error::Control {
      kind,
      message: message.into(),
    }
  }

  /// Maps each error to the HTTP status §7's table assigns it.
  pub fn http_status(&self) -> u16 {
    match self {
      Error::Store {
        kind: StoreErrorKind::NotFound,
        ..
      } => 404,
      Error::Container {
        kind: ContainerErrorKind::NotFound,
        ..
      } => 404,
      Error::Service {
        kind: ServiceErrorKind::NotFound,
        ..
      } => 404,
      Error::Git {
        kind: GitErrorKind::RepoNotFound | GitErrorKind::BranchNotFound,
        ..
      } => 404,
      Error::Store {
        kind: StoreErrorKind::Conflict,
        ..
      } => 409,
      Error::Container {
        kind: ContainerErrorKind::AlreadyExists,
        ..
      } => 409,
      Error::Service {
        kind: ServiceErrorKind::AlreadyRunning,
        ..
      } => 409,
      Error::Validation { .. } => 400,
      Error::Config {
        kind: ConfigErrorKind::Invalid | ConfigErrorKind::Validation,
        ..
      } => 400,
      Error::Config {
        kind: ConfigErrorKind::NotFound,
        ..
      } => 404,
      Error::Transport {
        kind: TransportErrorKind::AuthFailed,
        ..
      } => 401,
      Error::Transport {
        kind: TransportErrorKind::PermissionDenied,
        ..
      } => 403,
      Error::Transport {
        kind: TransportErrorKind::RateLimited,
        ..
      } => 429,
      Error::Control {
        kind: ControlErrorKind::Timeout,
        ..
      } => 408,
      Error::Control {
        kind: ControlErrorKind::NotImplemented,
        ..
      } => 501,
      _ => 500,
    }
  }
}

/// Wire shape of an error response body (§6): `{error: {code, message,
/// details?}, context?}`.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error: ErrorDetail,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub context: Option<String>,
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
  pub code: String,
  pub message: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details: Option<serde_json::Value>,
}

impl From<&Error> for ErrorBody {
  fn from(e: &Error) -> Self {
    let context = std::iter::successors(
      e.source().map(|s| s as &dyn std::error::Error),
      |s| s.source(),
    )
    .map(|s| s.to_string())
    .collect::<Vec<_>>();
    ErrorBody {
      error: ErrorDetail {
        code: e.code().to_string(),
        message: e.to_string(),
        details: None,
      },
      context: if context.is_empty() {
        None
      } else {
        Some(context.join(" <- "))
      },
    }
  }
}
