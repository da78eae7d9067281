//! The Compose Adapter (spec §4.3): parses a docker-compose manifest
//! into a name-indexed map of parsed services, surfacing validation
//! failures as a `Log`-style command-audit entry instead of a bare
//! parse error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use vibeman_client::error::{ConfigErrorKind, Error};

#[derive(Debug, Clone)]
pub struct ParsedService {
  pub image: Option<String>,
  pub command: Option<Vec<String>>,
  pub working_dir: Option<String>,
  pub env_map: HashMap<String, String>,
  pub volumes: Vec<(String, String, bool)>,
  pub ports: Vec<(u16, u16, String)>,
  pub cpus: Option<f64>,
  pub memory: Option<String>,
  pub container_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCompose {
  pub services: HashMap<String, ParsedService>,
}

impl ParsedCompose {
  pub fn service(&self, name: &str) -> Result<&ParsedService, Error> {
    self
      .services
      .get(name)
      .ok_or_else(|| Error::config(ConfigErrorKind::NotFound, format!("service {name} not in manifest"), anyhow::anyhow!("service_not_in_manifest")))
  }
}

/// Raw compose YAML shape, permissive by design: `serde(default)` on
/// every field and unrecognized top-level keys (`networks`, `volumes`
/// top-level declarations, etc.) simply aren't modeled and are dropped
/// silently.
#[derive(Debug, Deserialize)]
struct RawCompose {
  #[serde(default)]
  services: HashMap<String, RawService>,
}

#[derive(Debug, Deserialize, Default)]
struct RawService {
  #[serde(default)]
  image: Option<String>,
  #[serde(default)]
  command: Option<RawCommand>,
  #[serde(default)]
  working_dir: Option<String>,
  #[serde(default)]
  environment: Option<RawEnvironment>,
  #[serde(default)]
  volumes: Vec<String>,
  #[serde(default)]
  ports: Vec<String>,
  #[serde(default)]
  cpus: Option<f64>,
  #[serde(default)]
  mem_limit: Option<String>,
  #[serde(default)]
  container_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCommand {
  Shell(String),
  Argv(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEnvironment {
  Map(HashMap<String, Option<String>>),
  List(Vec<String>),
}

/// Parses the compose file at `path`. Relative host paths in volume
/// strings are resolved against `path`'s parent directory (spec §4.3).
pub fn parse_compose_file(path: &Path) -> Result<ParsedCompose, Error> {
  if !path.is_file() {
    return Err(Error::config(
      ConfigErrorKind::NotFound,
      format!("compose manifest not found at {}", path.display()),
      anyhow::anyhow!("manifest_not_found"),
    ));
  }

  let contents = std::fs::read_to_string(path).map_err(|e| {
    Error::config(ConfigErrorKind::NotFound, format!("failed to read {}", path.display()), e.into())
  })?;

  let raw: RawCompose = serde_yaml_ng::from_str(&contents).map_err(|e| {
    Error::config(ConfigErrorKind::Parse, format!("failed to parse compose manifest {}", path.display()), e.into())
  })?;

  let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

  let mut services = HashMap::new();
  for (name, raw_service) in raw.services {
    services.insert(name, to_parsed_service(raw_service, &base_dir)?);
  }

  Ok(ParsedCompose { services })
}

fn to_parsed_service(raw: RawService, base_dir: &Path) -> Result<ParsedService, Error> {
  let env_map = match raw.environment {
    Some(RawEnvironment::Map(map)) => {
      map.into_iter().map(|(k, v)| (k, v.unwrap_or_default())).collect()
    }
    Some(RawEnvironment::List(list)) => list
      .into_iter()
      .filter_map(|entry| entry.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
      .collect(),
    None => HashMap::new(),
  };

  let command = match raw.command {
    Some(RawCommand::Shell(s)) => Some(vec!["/bin/sh".to_string(), "-c".to_string(), s]),
    Some(RawCommand::Argv(argv)) => Some(argv),
    None => None,
  };

  let volumes = raw
    .volumes
    .iter()
    .map(|v| parse_volume(v, base_dir))
    .collect::<Result<Vec<_>, _>>()?;

  let ports = raw.ports.iter().map(|p| parse_port(p)).collect::<Result<Vec<_>, _>>()?;

  Ok(ParsedService {
    image: raw.image,
    command,
    working_dir: raw.working_dir,
    env_map,
    volumes,
    ports,
    cpus: raw.cpus,
    memory: raw.mem_limit,
    container_name: raw.container_name,
  })
}

/// Volume strings in `H:C[:ro]`; relative `H` resolved against
/// `base_dir` (spec §4.3).
fn parse_volume(raw: &str, base_dir: &Path) -> Result<(String, String, bool), Error> {
  let mut parts = raw.splitn(3, ':');
  let host = parts.next().ok_or_else(|| invalid_volume(raw))?;
  let container = parts.next().ok_or_else(|| invalid_volume(raw))?;
  let read_only = matches!(parts.next(), Some("ro"));

  let host = if Path::new(host).is_absolute() {
    host.to_string()
  } else {
    base_dir.join(host).to_string_lossy().into_owned()
  };

  Ok((host, container.to_string(), read_only))
}

fn invalid_volume(raw: &str) -> Error {
  Error::validation(
    vibeman_client::error::ValidationErrorKind::InvalidInput,
    format!("invalid volume mapping {raw:?}, expected H:C[:ro]"),
  )
}

/// Port strings in `H:C[/proto]`; both sides validated `1..65535`.
fn parse_port(raw: &str) -> Result<(u16, u16, String), Error> {
  let (ports, protocol) = match raw.split_once('/') {
    Some((ports, proto)) => (ports, proto.to_string()),
    None => (raw, "tcp".to_string()),
  };
  let (host, container) = ports
    .split_once(':')
    .ok_or_else(|| invalid_port(raw))?;

  let host: u16 = host.parse().map_err(|_| invalid_port(raw))?;
  let container: u16 = container.parse().map_err(|_| invalid_port(raw))?;
  if host == 0 || container == 0 {
    return Err(invalid_port(raw));
  }

  Ok((host, container, protocol))
}

fn invalid_port(raw: &str) -> Error {
  Error::validation(
    vibeman_client::error::ValidationErrorKind::InvalidPort,
    format!("invalid port mapping {raw:?}, expected H:C[/proto]"),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_host_container_ro_volume() {
    let base = Path::new("/repo/worktree");
    assert_eq!(
      parse_volume("./data:/var/data:ro", base).unwrap(),
      ("/repo/worktree/data".to_string(), "/var/data".to_string(), true)
    );
  }

  #[test]
  fn parses_absolute_volume() {
    let base = Path::new("/repo/worktree");
    assert_eq!(
      parse_volume("/abs/data:/var/data", base).unwrap(),
      ("/abs/data".to_string(), "/var/data".to_string(), false)
    );
  }

  #[test]
  fn parses_port_with_protocol() {
    assert_eq!(parse_port("8080:80/udp").unwrap(), (8080, 80, "udp".to_string()));
  }

  #[test]
  fn rejects_zero_port() {
    assert!(parse_port("0:80").is_err());
  }

  #[test]
  fn parses_minimal_compose() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dc.yaml");
    std::fs::write(
      &path,
      "services:\n  web:\n    image: nginx:latest\n    ports:\n      - \"8080:80\"\n    environment:\n      - FOO=bar\n",
    )
    .unwrap();

    let parsed = parse_compose_file(&path).unwrap();
    let web = parsed.service("web").unwrap();
    assert_eq!(web.image.as_deref(), Some("nginx:latest"));
    assert_eq!(web.ports, vec![(8080, 80, "tcp".to_string())]);
    assert_eq!(web.env_map.get("FOO"), Some(&"bar".to_string()));
  }
}
