use comfy_table::{Attribute, Cell, Color};
use formatting::colored;
use vibeman_client::api::worktree::{
  ClearWorktreeLogsRequest, CreateWorktreeRequest, GetWorktreeLogsRequest, ListWorktreesRequest, RemoveWorktreeRequest,
};
use vibeman_client::entities::log::{LogSearchQuery, LogSnapshot};
use vibeman_client::entities::worktree::{Worktree, WorktreeListFilter, WorktreeStatus};

use crate::args::WorktreeCommand;
use crate::command::{PrintTable, print_items, print_one, vibeman_client};

pub async fn handle(command: &WorktreeCommand, json: bool) -> anyhow::Result<()> {
  let client = vibeman_client().await?;
  match command {
    WorktreeCommand::List { repository_id } => {
      let request = ListWorktreesRequest {
        filter: WorktreeListFilter { repository_id: *repository_id, status: None },
      };
      let worktrees: Vec<Worktree> = client.get_query("/worktrees", &request).await?;
      print_items(worktrees, json)
    }
    WorktreeCommand::Get { id } => {
      let worktree: Worktree = client.get(&format!("/worktrees/{id}")).await?;
      print_one(&worktree)
    }
    WorktreeCommand::Create { repository_id, name, branch, auto_start, skip_setup } => {
      let request = CreateWorktreeRequest {
        repository_id: *repository_id,
        name: name.clone(),
        branch: branch.clone(),
        base_branch: None,
        auto_start: *auto_start,
        skip_setup: *skip_setup,
      };
      let result: vibeman_client::entities::worktree::CreateWorktreeResult =
        client.post("/worktrees", &request).await?;
      for log in &result.logs {
        let marker = if log.success { colored("ok", formatting::Color::Green) } else { colored("FAIL", formatting::Color::Red) };
        println!("[{marker}] {}: {}", log.stage, log.command);
      }
      print_one(&result.worktree)
    }
    WorktreeCommand::Remove { id, force } => {
      let request = RemoveWorktreeRequest { id: *id, force: *force };
      client.delete_query(&format!("/worktrees/{id}"), &request).await?;
      println!("removed worktree {id}");
      Ok(())
    }
    WorktreeCommand::Start { id } => {
      let worktree: Worktree = client.post_unit(&format!("/worktrees/{id}/start")).await?;
      print_one(&worktree)
    }
    WorktreeCommand::Stop { id } => {
      let worktree: Worktree = client.post_unit(&format!("/worktrees/{id}/stop")).await?;
      print_one(&worktree)
    }
    WorktreeCommand::Logs { id, tail, container } => {
      let request = GetWorktreeLogsRequest { id: *id, follow: false, tail: *tail, container: container.clone() };
      let snapshot: LogSnapshot = client.get_query(&format!("/worktrees/{id}/logs"), &request).await?;
      for entry in &snapshot.entries {
        println!("{} [{}] {}: {}", entry.timestamp, entry.level, entry.source_container, entry.message);
      }
      if snapshot.truncated {
        eprintln!("(log ring truncated, older entries were dropped)");
      }
      Ok(())
    }
    WorktreeCommand::LogsSearch { id, query, regex } => {
      let body = LogSearchQuery {
        query: query.clone(),
        regex: *regex,
        case_sensitive: false,
        since: None,
        until: None,
        containers: None,
        limit: 500,
      };
      let entries: Vec<vibeman_client::entities::log::LogEntry> =
        client.post(&format!("/worktrees/{id}/logs/search"), &body).await?;
      for entry in &entries {
        println!("{} [{}] {}: {}", entry.timestamp, entry.level, entry.source_container, entry.message);
      }
      Ok(())
    }
    WorktreeCommand::LogsClear { id, container } => {
      let request = ClearWorktreeLogsRequest { id: *id, container: container.clone() };
      client.delete_query(&format!("/worktrees/{id}/logs"), &request).await?;
      println!("cleared logs for worktree {id}");
      Ok(())
    }
  }
}

impl PrintTable for Worktree {
  fn header() -> &'static [&'static str] {
    &["Id", "Name", "Branch", "Status", "Path"]
  }
  fn row(self) -> Vec<Cell> {
    let status_color = match self.status {
      WorktreeStatus::Running => Color::Green,
      WorktreeStatus::Error => Color::Red,
      WorktreeStatus::Starting | WorktreeStatus::Stopping => Color::Yellow,
      WorktreeStatus::Stopped => Color::Grey,
    };
    vec![
      Cell::new(self.id),
      Cell::new(self.name).add_attribute(Attribute::Bold),
      Cell::new(self.branch),
      Cell::new(self.status).fg(status_color),
      Cell::new(self.fs_path),
    ]
  }
}
