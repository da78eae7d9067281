#[macro_use]
extern crate tracing;

use logger::LogConfig;

mod args;
mod command;
mod config;

async fn app() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  logger::init(&LogConfig { filter: "warn".into(), ..Default::default() })?;

  let cli = config::cli_args();
  let json = cli.json;

  match &cli.command {
    args::Command::Repository { command } => command::repository::handle(command, json).await,
    args::Command::Worktree { command } => command::worktree::handle(command, json).await,
    args::Command::Service { command } => command::service::handle(command, json).await,
    args::Command::Container { command } => command::container::handle(command, json).await,
    args::Command::System { command } => command::system::handle(command).await,
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  if let Err(error) = app().await {
    eprintln!("{}", formatting::format_error_chain(&*error));
    std::process::exit(1);
  }
  Ok(())
}
