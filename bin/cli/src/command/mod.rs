use anyhow::Context;
use comfy_table::{Attribute, Cell, Table, presets::UTF8_HORIZONTAL_ONLY};
use serde::Serialize;
use tokio::sync::OnceCell;
use vibeman_client::http_client::VibemanHttpClient;

use crate::config::{resolved_host, resolved_token};

pub mod container;
pub mod repository;
pub mod service;
pub mod system;
pub mod worktree;

pub async fn vibeman_client() -> anyhow::Result<&'static VibemanHttpClient> {
  static CLIENT: OnceCell<VibemanHttpClient> = OnceCell::const_new();
  CLIENT
    .get_or_try_init(|| async { Ok(VibemanHttpClient::new(resolved_host(), resolved_token()?)) })
    .await
}

/// Renders a list of items as a table (default) or pretty JSON (`--json`).
pub fn print_items<T: PrintTable + Serialize>(items: Vec<T>, json: bool) -> anyhow::Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(&items).context("failed to serialize items to JSON")?);
    return Ok(());
  }
  let mut table = Table::new();
  table.load_preset(UTF8_HORIZONTAL_ONLY).set_header(T::header().iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
  for item in items {
    table.add_row(item.row());
  }
  println!("{table}");
  Ok(())
}

/// Single-item responses (`get`, `create`, ...) always print as pretty
/// JSON — a table header for one row buys nothing.
pub fn print_one<T: Serialize>(item: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(item).context("failed to serialize item to JSON")?);
  Ok(())
}

pub trait PrintTable {
  fn header() -> &'static [&'static str];
  fn row(self) -> Vec<Cell>;
}
