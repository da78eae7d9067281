use std::pin::Pin;

use bollard::Docker;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, ResizeExecOptions, StartExecResults};
use futures_util::Stream;
use tokio::sync::mpsc;
use vibeman_client::error::{ContainerErrorKind, Error};

pub type PtyOutputStream =
  Pin<Box<dyn Stream<Item = Result<LogOutput, bollard::errors::Error>> + Send>>;

/// A PTY-attached exec (§4.4/§4.8): duplex byte stream plus a resize
/// channel, proxied by the Attach/Stream Gateway onto the AI terminal
/// WebSocket.
pub struct AttachedPty {
  pub output: PtyOutputStream,
  pub input: Box<dyn tokio::io::AsyncWrite + Unpin + Send>,
  pub resize: mpsc::Sender<(u16, u16)>,
  exec_id: String,
}

impl AttachedPty {
  pub fn exec_id(&self) -> &str {
    &self.exec_id
  }
}

pub async fn attach(docker: &Docker, name: &str, cols: u16, rows: u16) -> Result<super::AttachedPty, Error> {
  let options = CreateExecOptions {
    cmd: Some(vec!["/bin/sh".to_string()]),
    attach_stdin: Some(true),
    attach_stdout: Some(true),
    attach_stderr: Some(true),
    tty: Some(true),
    ..Default::default()
  };

  let exec = docker
    .create_exec(name, options)
    .await
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to create attach exec on {name}"), e.into()))?;

  docker
    .resize_exec(&exec.id, ResizeExecOptions { height: rows, width: cols })
    .await
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to size pty on {name}"), e.into()))?;

  let started = docker
    .start_exec(&exec.id, None)
    .await
    .map_err(|e| Error::container(ContainerErrorKind::ExecFailed, format!("failed to start attach exec on {name}"), e.into()))?;

  let StartExecResults::Attached { output, input } = started else {
    return Err(Error::container(ContainerErrorKind::ExecFailed, "attach exec did not attach", None));
  };

  let (resize_tx, mut resize_rx) = mpsc::channel::<(u16, u16)>(8);
  let docker = docker.clone();
  let exec_id = exec.id.clone();
  tokio::spawn(async move {
    while let Some((cols, rows)) = resize_rx.recv().await {
      let _ = docker
        .resize_exec(&exec_id, ResizeExecOptions { height: rows, width: cols })
        .await;
    }
  });

  Ok(super::AttachedPty {
    output,
    input: Box::new(input),
    resize: resize_tx,
    exec_id: exec.id,
  })
}
