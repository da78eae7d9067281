use std::path::Path;

use bollard::Docker;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::query_parameters::{DownloadFromContainerOptions, UploadToContainerOptions};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use vibeman_client::entities::container::ExecResult;
use vibeman_client::error::{ContainerErrorKind, Error};

pub struct ExecOutcome(pub ExecResult);

/// Non-interactive exec (§4.4): creates the exec, optionally feeds
/// `stdin`, collects stdout/stderr until the process exits or `timeout`
/// elapses.
pub async fn run(
  docker: &Docker,
  name: &str,
  argv: &[String],
  stdin: Option<&[u8]>,
  timeout: std::time::Duration,
) -> Result<ExecOutcome, Error> {
  let options = CreateExecOptions {
    cmd: Some(argv.to_vec()),
    attach_stdin: Some(stdin.is_some()),
    attach_stdout: Some(true),
    attach_stderr: Some(true),
    ..Default::default()
  };

  let exec = docker
    .create_exec(name, options)
    .await
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to create exec on {name}"), e.into()))?;

  let work = async {
    let started = docker
      .start_exec(&exec.id, None)
      .await
      .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to start exec on {name}"), e.into()))?;

    let StartExecResults::Attached { mut output, mut input } = started else {
      return Err(Error::container(ContainerErrorKind::ExecFailed, "exec did not attach", None));
    };

    if let Some(data) = stdin {
      let _ = input.write_all(data).await;
      let _ = input.shutdown().await;
    }
    drop(input);

    let mut stdout = String::new();
    let mut stderr = String::new();
    while let Some(chunk) = output.next().await {
      match chunk {
        Ok(bollard::container::LogOutput::StdOut { message }) => {
          stdout.push_str(&String::from_utf8_lossy(&message));
        }
        Ok(bollard::container::LogOutput::StdErr { message }) => {
          stderr.push_str(&String::from_utf8_lossy(&message));
        }
        Ok(_) => {}
        Err(e) => {
          return Err(Error::container(ContainerErrorKind::ExecFailed, format!("exec stream error on {name}"), e.into()));
        }
      }
    }

    let exit_code = docker
      .inspect_exec(&exec.id)
      .await
      .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to inspect exec on {name}"), e.into()))?
      .exit_code
      .unwrap_or(-1);

    Ok(ExecOutcome(ExecResult { exit_code, stdout, stderr }))
  };

  match tokio::time::timeout(timeout, work).await {
    Ok(result) => result,
    Err(_) => Err(Error::control(
      vibeman_client::error::ControlErrorKind::Timeout,
      format!("exec on {name} timed out after {timeout:?}"),
    )),
  }
}

pub async fn copy_to(docker: &Docker, name: &str, src: &Path, dst: &str) -> Result<(), Error> {
  let data = tokio::fs::read(src)
    .await
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to read {}", src.display()), e.into()))?;

  let mut archive = tar::Builder::new(Vec::new());
  let file_name = src.file_name().and_then(|n| n.to_str()).unwrap_or("payload");
  let mut header = tar::Header::new_gnu();
  header.set_size(data.len() as u64);
  header.set_mode(0o644);
  header.set_cksum();
  archive
    .append_data(&mut header, file_name, data.as_slice())
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, "failed to build tar archive", e.into()))?;
  let tar_bytes = archive
    .into_inner()
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, "failed to finalize tar archive", e.into()))?;

  let options = UploadToContainerOptions {
    path: dst.to_string(),
    ..Default::default()
  };

  docker
    .upload_to_container(name, Some(options), tar_bytes.into())
    .await
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to copy to {name}:{dst}"), e.into()))
}

pub async fn copy_from(docker: &Docker, name: &str, src: &str, dst: &std::path::Path) -> Result<(), Error> {
  let options = DownloadFromContainerOptions { path: src.to_string() };

  let mut stream = docker.download_from_container(name, Some(options));
  let mut tar_bytes = Vec::new();
  while let Some(chunk) = stream.next().await {
    let chunk = chunk
      .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to copy from {name}:{src}"), e.into()))?;
    tar_bytes.extend_from_slice(&chunk);
  }

  let mut archive = tar::Archive::new(tar_bytes.as_slice());
  if let Some(parent) = dst.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to create {}", parent.display()), e.into()))?;
  }
  archive
    .unpack(dst)
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to unpack archive into {}", dst.display()), e.into()))
}
