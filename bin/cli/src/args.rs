//! `vibeman-cli` argument parsing. One subcommand group per Operations
//! API resource (§4.9): one enum variant per noun, a nested subcommand
//! per verb, flattened down to the five resource groups the HTTP
//! surface actually exposes (§6).

use uuid::Uuid;

#[derive(Debug, clap::Parser)]
#[command(name = "vibeman", version, about = "Worktree + container + AI sidecar orchestrator", author)]
pub struct CliArgs {
  #[command(subcommand)]
  pub command: Command,

  /// Address of the running `vibeman-server` daemon.
  #[arg(long, short = 'H', global = true)]
  pub host: Option<String>,

  /// Bearer token to authenticate with. Defaults to the token file
  /// under the config directory (spec §6 "token (authentication
  /// bearer, 0600)").
  #[arg(long, short = 't', global = true)]
  pub token: Option<String>,

  /// Print response bodies as JSON instead of a table.
  #[arg(long, global = true)]
  pub json: bool,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
  /// Repository management. (alias: `repo`)
  #[clap(alias = "repo")]
  Repository {
    #[command(subcommand)]
    command: RepositoryCommand,
  },
  /// Worktree lifecycle. (alias: `wt`)
  #[clap(alias = "wt")]
  Worktree {
    #[command(subcommand)]
    command: WorktreeCommand,
  },
  /// Shared service control. (alias: `svc`)
  #[clap(alias = "svc")]
  Service {
    #[command(subcommand)]
    command: ServiceCommand,
  },
  /// Raw container operations. (aliases: `ps`, `cn`)
  #[clap(alias = "ps", alias = "cn")]
  Container {
    #[command(subcommand)]
    command: ContainerCommand,
  },
  /// Daemon health/status/config. (alias: `sys`)
  #[clap(alias = "sys")]
  System {
    #[command(subcommand)]
    command: SystemCommand,
  },
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum RepositoryCommand {
  /// List known repositories. (alias: `ls`)
  #[clap(alias = "ls")]
  List,
  /// Register a repository already cloned on disk.
  Add {
    name: String,
    path: String,
    #[arg(long)]
    git_url: Option<String>,
    #[arg(long, default_value = "")]
    description: String,
  },
  /// Remove a repository. Fails if it still owns worktrees.
  #[clap(alias = "rm")]
  Remove { id: Uuid },
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum WorktreeCommand {
  /// List worktrees, optionally filtered by repository.
  #[clap(alias = "ls")]
  List {
    #[arg(long)]
    repository_id: Option<Uuid>,
  },
  /// Show one worktree.
  Get { id: Uuid },
  /// Create a new worktree (and its branch, if it doesn't exist yet).
  Create {
    repository_id: Uuid,
    name: String,
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    auto_start: bool,
    #[arg(long)]
    skip_setup: bool,
  },
  /// Remove a worktree and its containers.
  #[clap(alias = "rm")]
  Remove {
    id: Uuid,
    /// Remove even if the worktree is dirty/unpushed/unmerged.
    #[arg(long)]
    force: bool,
  },
  /// Start a worktree's app container (and its shared-service deps).
  Start { id: Uuid },
  /// Stop a worktree's app container, keeping the AI sidecar running.
  Stop { id: Uuid },
  /// Tail a worktree's aggregated logs.
  Logs {
    id: Uuid,
    #[arg(long, default_value_t = 200)]
    tail: usize,
    #[arg(long)]
    container: Option<String>,
  },
  /// Search a worktree's log ring.
  LogsSearch {
    id: Uuid,
    query: String,
    #[arg(long)]
    regex: bool,
  },
  /// Clear a worktree's log ring.
  LogsClear {
    id: Uuid,
    #[arg(long)]
    container: Option<String>,
  },
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum ServiceCommand {
  /// List shared services and their reference counts.
  #[clap(alias = "ls")]
  List,
  /// Show one service.
  Get { name: String },
  /// Acquire a manual hold, starting the service if needed.
  Start { name: String },
  /// Release the manual hold; the service stops once `ref_count` hits 0.
  Stop { name: String },
  /// Force-restart a service regardless of its current holders.
  Restart { name: String },
  /// Run an on-demand health probe.
  Health { name: String },
  /// Fetch a service container's logs.
  Logs {
    name: String,
    #[arg(long)]
    follow: bool,
    #[arg(long)]
    tail: Option<usize>,
  },
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum ContainerCommand {
  /// List containers vibeman owns, optionally filtered.
  #[clap(alias = "ls")]
  List {
    #[arg(long)]
    repository: Option<String>,
    #[arg(long)]
    worktree: Option<String>,
  },
  /// Show one container by id or name.
  Get { id: String },
  /// Start/stop/remove a container.
  Action {
    id: String,
    action: ContainerActionArg,
    #[arg(long)]
    force: bool,
  },
  /// Remove a container.
  #[clap(alias = "rm")]
  Remove {
    id: String,
    #[arg(long)]
    force: bool,
  },
  /// Fetch a container's logs.
  Logs {
    id: String,
    #[arg(long)]
    follow: bool,
    #[arg(long)]
    tail: Option<usize>,
  },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ContainerActionArg {
  Start,
  Stop,
  Remove,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum SystemCommand {
  /// Liveness check.
  Health,
  /// Readiness + counts.
  Status,
  /// The daemon's resolved on-disk layout and bind address.
  Config,
}
