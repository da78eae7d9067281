//! Terminal-output helpers shared by `vibeman-cli` (AMBIENT STACK),
//! targeting the terminal via `colored` (a browser frontend is out of
//! scope here, spec §1 Non-goals).

use colored::Colorize;

pub fn muted(content: impl std::fmt::Display) -> String {
  content.to_string().dimmed().to_string()
}

pub fn bold(content: impl std::fmt::Display) -> String {
  content.to_string().bold().to_string()
}

pub fn colored(content: impl std::fmt::Display, color: Color) -> String {
  let s = content.to_string();
  match color {
    Color::Red => s.red().to_string(),
    Color::Green => s.green().to_string(),
    Color::Blue => s.blue().to_string(),
    Color::Yellow => s.yellow().to_string(),
  }
}

pub enum Color {
  Red,
  Green,
  Blue,
  Yellow,
}

/// Renders an error alongside its `source()` chain, one indented line
/// per cause, for CLI output and log lines (errors carry `anyhow::Error`
/// sources, see `vibeman_client::error`).
pub fn format_error_chain(err: &(dyn std::error::Error + 'static)) -> String {
  let mut out = format!("{}: {err}", colored("ERROR", Color::Red));
  let mut source = err.source();
  let mut i = 1;
  while let Some(cause) = source {
    out.push_str(&format!("\n\t{}: {cause}", muted(i)));
    source = cause.source();
    i += 1;
  }
  out
}
