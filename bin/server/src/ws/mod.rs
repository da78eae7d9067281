//! The Attach/Stream Gateway (spec §4.8): two bidirectional WebSocket
//! endpoints, both JSON-text framed, each pumped by a single
//! `tokio::select!` loop. The AI terminal endpoint pumps directly
//! against bollard's `AttachedPty`; the log stream pumps against the
//! Log Aggregator's own broadcast channel — one socket on this end,
//! never a second hop to another process.
//!
//! Browser `WebSocket` clients cannot set an `Authorization` header, so
//! both endpoints take the bearer token as a query parameter and reject
//! a mismatch, and both validate `Origin` against the configured
//! allowlist *before* the upgrade completes (§4.8 "rejected with HTTP
//! 403 pre-upgrade").

use std::pin::Pin;
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;
use vibeman_client::entities::container::ai_container_name;
use vibeman_client::entities::log::LogEntry;
use vibeman_client::ws::{
  LogStreamClientMessage, LogStreamServerMessage, TERMINAL_EXIT_NO_AI_CONTAINER, TerminalClientMessage,
  TerminalServerMessage,
};

use crate::auth::token_matches;
use crate::state::AppState;

/// WebSocket reads have a 60s idle timeout with server-sent pings
/// (spec §5 "Cancellation and timeouts").
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

pub fn router() -> Router<AppState> {
  Router::new()
    .route("/api/ai/attach/{id}", get(ai_attach))
    .route("/api/worktrees/{id}/logs", get(log_stream))
}

#[derive(Debug, Deserialize)]
struct AttachQuery {
  #[serde(default = "default_cols")]
  cols: u16,
  #[serde(default = "default_rows")]
  rows: u16,
  #[serde(default)]
  token: Option<String>,
}

fn default_cols() -> u16 {
  80
}

fn default_rows() -> u16 {
  24
}

#[derive(Debug, Deserialize, Default)]
struct LogStreamQuery {
  #[serde(default)]
  container: Option<String>,
  #[serde(default)]
  token: Option<String>,
}

/// Same-origin unless the request's `Origin` is on the configured
/// allowlist (spec §4.8). A request with no `Origin` header (a non-
/// browser client, e.g. the CLI) is always allowed — there is nothing
/// to check against.
fn origin_allowed(headers: &HeaderMap, allowed_origins: &[String]) -> bool {
  let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) else {
    return true;
  };
  if allowed_origins.iter().any(|o| o == origin) {
    return true;
  }
  headers
    .get(header::HOST)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|host| origin.ends_with(host))
}

async fn ai_attach(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Query(query): Query<AttachQuery>,
  headers: HeaderMap,
  ws: WebSocketUpgrade,
) -> Response {
  if !origin_allowed(&headers, &state.config.allowed_origins) {
    return StatusCode::FORBIDDEN.into_response();
  }
  if !token_matches(&state.token, query.token.as_deref()) {
    return StatusCode::FORBIDDEN.into_response();
  }

  let worktree = match state.orchestrator.get_worktree(id) {
    Ok(w) => w,
    Err(_) => return StatusCode::NOT_FOUND.into_response(),
  };
  let repository = match state.orchestrator.get_repository(worktree.repository_id) {
    Ok(r) => r,
    Err(_) => return StatusCode::NOT_FOUND.into_response(),
  };

  ws.on_upgrade(move |socket| {
    handle_ai_attach(socket, state, repository.name, worktree.name, query.cols, query.rows)
  })
}

async fn handle_ai_attach(
  mut socket: WebSocket,
  state: AppState,
  repository_name: String,
  worktree_name: String,
  cols: u16,
  rows: u16,
) {
  let ai_name = ai_container_name(&repository_name, &worktree_name);
  let runtime = state.orchestrator.runtime();

  if runtime.get_by_name(&ai_name).await.unwrap_or(None).is_none() {
    let _ = send_terminal(&mut socket, &TerminalServerMessage::Exit { code: TERMINAL_EXIT_NO_AI_CONTAINER }).await;
    let _ = socket.close().await;
    return;
  }

  let pty = match runtime.attach_pty(&ai_name, cols, rows).await {
    Ok(pty) => pty,
    Err(e) => {
      tracing::warn!(worktree = %worktree_name, error = %e, "failed to attach AI terminal");
      let _ = send_terminal(&mut socket, &TerminalServerMessage::Exit { code: TERMINAL_EXIT_NO_AI_CONTAINER }).await;
      let _ = socket.close().await;
      return;
    }
  };

  let crate::docker::AttachedPty { mut output, mut input, resize, .. } = pty;
  let idle = tokio::time::sleep(IDLE_TIMEOUT);
  tokio::pin!(idle);

  loop {
    tokio::select! {
      _ = &mut idle => {
        if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
          break;
        }
        idle.as_mut().reset(tokio::time::Instant::now() + IDLE_TIMEOUT);
      }
      incoming = socket.recv() => {
        idle.as_mut().reset(tokio::time::Instant::now() + IDLE_TIMEOUT);
        match incoming {
          Some(Ok(Message::Text(text))) => match serde_json::from_str::<TerminalClientMessage>(&text) {
            Ok(TerminalClientMessage::Stdin { data }) => {
              if input.write_all(data.as_bytes()).await.is_err() {
                break;
              }
            }
            Ok(TerminalClientMessage::Resize { cols, rows }) => {
              let _ = resize.send((cols, rows)).await;
            }
            Ok(TerminalClientMessage::Ping) => {
              if send_terminal(&mut socket, &TerminalServerMessage::Pong).await.is_err() {
                break;
              }
            }
            Err(_) => {}
          },
          Some(Ok(Message::Close(_))) | None => break,
          Some(Err(_)) => break,
          _ => {}
        }
      }
      chunk = output.next() => {
        match chunk {
          Some(Ok(log_output)) => {
            let message = match to_terminal_message(log_output) {
              Some(m) => m,
              None => continue,
            };
            if send_terminal(&mut socket, &message).await.is_err() {
              break;
            }
          }
          Some(Err(_)) | None => {
            let _ = send_terminal(&mut socket, &TerminalServerMessage::Exit { code: 0 }).await;
            break;
          }
        }
      }
    }
  }

  // Dropping the pty's write half hangs up the exec's controlling
  // terminal, which the kernel turns into a real SIGHUP to whatever is
  // in its foreground process group — the closest equivalent to
  // "closing the WebSocket sends SIGHUP to the exec" without bollard
  // exposing a direct signal-the-exec call.
  drop(input);
  let _ = socket.close().await;
}

fn to_terminal_message(log_output: bollard::container::LogOutput) -> Option<TerminalServerMessage> {
  use bollard::container::LogOutput;
  match log_output {
    LogOutput::StdOut { message } | LogOutput::Console { message } => {
      Some(TerminalServerMessage::Stdout { data: String::from_utf8_lossy(&message).into_owned() })
    }
    LogOutput::StdErr { message } => {
      Some(TerminalServerMessage::Stderr { data: String::from_utf8_lossy(&message).into_owned() })
    }
    LogOutput::StdIn { .. } => None,
  }
}

async fn send_terminal(socket: &mut WebSocket, message: &TerminalServerMessage) -> Result<(), axum::Error> {
  let text = serde_json::to_string(message).unwrap_or_default();
  socket.send(Message::Text(text.into())).await
}

async fn log_stream(
  State(state): State<AppState>,
  Path(id): Path<Uuid>,
  Query(query): Query<LogStreamQuery>,
  headers: HeaderMap,
  ws: WebSocketUpgrade,
) -> Response {
  if !origin_allowed(&headers, &state.config.allowed_origins) {
    return StatusCode::FORBIDDEN.into_response();
  }
  if !token_matches(&state.token, query.token.as_deref()) {
    return StatusCode::FORBIDDEN.into_response();
  }
  if state.orchestrator.get_worktree(id).is_err() {
    return StatusCode::NOT_FOUND.into_response();
  }

  ws.on_upgrade(move |socket| handle_log_stream(socket, state, id, query.container))
}

type BoxedLogStream = Pin<Box<dyn Stream<Item = LogEntry> + Send>>;

async fn handle_log_stream(mut socket: WebSocket, state: AppState, id: Uuid, mut container: Option<String>) {
  let mut stream: BoxedLogStream = Box::pin(state.orchestrator.log_aggregator().follow(id, container.clone()).await);

  loop {
    tokio::select! {
      entry = stream.next() => {
        match entry {
          Some(entry) => {
            if send_log(&mut socket, &LogStreamServerMessage::Log { entry }).await.is_err() {
              break;
            }
          }
          None => {
            let _ = send_log(&mut socket, &LogStreamServerMessage::Disconnect).await;
            break;
          }
        }
      }
      incoming = socket.recv() => {
        match incoming {
          Some(Ok(Message::Text(text))) => {
            if let Ok(LogStreamClientMessage::FilterUpdate { container: new_container }) = serde_json::from_str(&text) {
              container = new_container;
              stream = Box::pin(state.orchestrator.log_aggregator().follow(id, container.clone()).await);
              let _ = send_log(&mut socket, &LogStreamServerMessage::Clear).await;
            }
          }
          Some(Ok(Message::Close(_))) | None => break,
          Some(Err(_)) => break,
          _ => {}
        }
      }
    }
  }
}

async fn send_log(socket: &mut WebSocket, message: &LogStreamServerMessage) -> Result<(), axum::Error> {
  let text = serde_json::to_string(message).unwrap_or_default();
  socket.send(Message::Text(text.into())).await
}
