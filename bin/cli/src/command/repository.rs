use comfy_table::{Attribute, Cell, Color};
use vibeman_client::api::repository::AddRepositoryRequest;
use vibeman_client::entities::repository::{Repository, RepositoryListItem};

use crate::args::RepositoryCommand;
use crate::command::{PrintTable, print_items, print_one, vibeman_client};

pub async fn handle(command: &RepositoryCommand, json: bool) -> anyhow::Result<()> {
  let client = vibeman_client().await?;
  match command {
    RepositoryCommand::List => {
      let repositories: Vec<RepositoryListItem> = client.get("/repositories").await?;
      print_items(repositories, json)
    }
    RepositoryCommand::Add { name, path, git_url, description } => {
      let request = AddRepositoryRequest {
        name: name.clone(),
        path: path.clone(),
        git_url: git_url.clone(),
        description: description.clone(),
      };
      let repository: Repository = client.post("/repositories", &request).await?;
      print_one(&repository)
    }
    RepositoryCommand::Remove { id } => {
      client.delete_empty(&format!("/repositories/{id}")).await?;
      println!("removed repository {id}");
      Ok(())
    }
  }
}

impl PrintTable for RepositoryListItem {
  fn header() -> &'static [&'static str] {
    &["Id", "Name", "Path", "Worktrees"]
  }
  fn row(self) -> Vec<Cell> {
    vec![
      Cell::new(self.id),
      Cell::new(self.name).add_attribute(Attribute::Bold),
      Cell::new(self.local_path),
      Cell::new(self.worktree_count).fg(if self.worktree_count > 0 { Color::Green } else { Color::Grey }),
    ]
  }
}
