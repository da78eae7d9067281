use serde::{Deserialize, Serialize};
use typeshare::typeshare;

use crate::entities::log::LogEntry;

/// Client -> server messages on the AI terminal attach socket
/// (`…/ai/attach/{worktree_name}`, §4.8).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminalClientMessage {
  Stdin { data: String },
  Resize { cols: u16, rows: u16 },
  Ping,
}

/// Server -> client messages on the AI terminal attach socket.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminalServerMessage {
  Stdout { data: String },
  Stderr { data: String },
  Exit { code: i32 },
  Pong,
}

/// Sentinel exit code sent (then the socket is closed) when the AI
/// sidecar container does not exist at handshake time (§4.8).
pub const TERMINAL_EXIT_NO_AI_CONTAINER: i32 = -1;

/// Server -> client messages on the log stream socket
/// (`…/worktrees/{id}/logs?follow=true`, §4.8).
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogStreamServerMessage {
  Log { entry: LogEntry },
  Clear,
  Error { message: String },
  Disconnect,
}

/// Client -> server messages on the log stream socket. Reconnection is
/// stateless server-side (§4.8): the client just re-subscribes with a
/// fresh `filter update` after a transport drop.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogStreamClientMessage {
  FilterUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    container: Option<String>,
  },
}
