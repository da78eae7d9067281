use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Loads and parses a single config file, interpolating `${VAR}`
/// environment references first. Dispatches on extension
/// (`.toml`/`.yaml`/`.yml`/`.json`).
pub fn load_config_file<T: DeserializeOwned>(file: &Path) -> Result<T> {
  let mut file_handle =
    File::open(file).map_err(|e| Error::FileOpen { e, path: file.to_path_buf() })?;
  let mut contents = String::new();
  file_handle
    .read_to_string(&mut contents)
    .map_err(|e| Error::ReadFileContents { e, path: file.to_path_buf() })?;

  let contents = interpolate_env(&contents);

  match file.extension().and_then(|e| e.to_str()) {
    Some("toml") => {
      toml::from_str(&contents).map_err(|e| Error::ParseToml { e, path: file.to_path_buf() })
    }
    Some("yaml" | "yml") => {
      serde_yaml_ng::from_str(&contents).map_err(|e| Error::ParseYaml { e, path: file.to_path_buf() })
    }
    Some("json") => {
      serde_json::from_str(&contents).map_err(|e| Error::ParseJson { e, path: file.to_path_buf() })
    }
    _ => Err(Error::UnsupportedFileType { path: file.to_path_buf() }),
  }
}

/// Only supports `${VAR}` syntax, run twice so a variable's expansion
/// can itself reference another `${VAR}`.
fn interpolate_env(input: &str) -> String {
  let re = regex::Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap();
  let expand =
    |s: &str| re.replace_all(s, |caps: &regex::Captures| std::env::var(&caps[1]).unwrap_or_default()).into_owned();
  expand(&expand(input))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interpolates_known_var() {
    // SAFETY: test-local, single-threaded access to this var.
    unsafe { std::env::set_var("VIBEMAN_TEST_VAR", "value") };
    assert_eq!(interpolate_env("x=${VIBEMAN_TEST_VAR}"), "x=value");
    unsafe { std::env::remove_var("VIBEMAN_TEST_VAR") };
  }

  #[test]
  fn unset_var_interpolates_empty() {
    assert_eq!(interpolate_env("x=${VIBEMAN_DEFINITELY_UNSET}"), "x=");
  }
}
