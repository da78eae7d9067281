use comfy_table::{Attribute, Cell, Color};
use vibeman_client::api::container::{ContainerActionKind, ContainerActionRequest, ContainerLogsRequest, ListContainersRequest};
use vibeman_client::entities::container::{ContainerInfo, ContainerListFilter, ContainerState};

use crate::args::{ContainerActionArg, ContainerCommand};
use crate::command::{PrintTable, print_items, print_one, vibeman_client};

pub async fn handle(command: &ContainerCommand, json: bool) -> anyhow::Result<()> {
  let client = vibeman_client().await?;
  match command {
    ContainerCommand::List { repository, worktree } => {
      let request = ListContainersRequest {
        filter: ContainerListFilter { repository: repository.clone(), worktree: worktree.clone(), kind: None, state: None },
      };
      let containers: Vec<ContainerInfo> = client.get_query("/api/containers", &request).await?;
      print_items(containers, json)
    }
    ContainerCommand::Get { id } => {
      let container: ContainerInfo = client.get(&format!("/api/containers/{id}")).await?;
      print_one(&container)
    }
    ContainerCommand::Action { id, action, force } => {
      let kind = match action {
        ContainerActionArg::Start => ContainerActionKind::Start,
        ContainerActionArg::Stop => ContainerActionKind::Stop,
        ContainerActionArg::Remove => ContainerActionKind::Remove,
      };
      let request = ContainerActionRequest { id: id.clone(), action: kind, force: *force };
      client.post_empty_body(&format!("/api/containers/{id}/action"), &request).await?;
      println!("{kind} ok: {id}");
      Ok(())
    }
    ContainerCommand::Remove { id, force } => {
      let request = ContainerActionRequest { id: id.clone(), action: ContainerActionKind::Remove, force: *force };
      client.delete_query(&format!("/api/containers/{id}"), &request).await?;
      println!("removed container {id}");
      Ok(())
    }
    ContainerCommand::Logs { id, follow, tail } => {
      let request = ContainerLogsRequest { id: id.clone(), follow: *follow, tail: *tail };
      let bytes = client.get_bytes(&format!("/api/containers/{id}/logs"), &request).await?;
      print!("{}", String::from_utf8_lossy(&bytes));
      Ok(())
    }
  }
}

impl PrintTable for ContainerInfo {
  fn header() -> &'static [&'static str] {
    &["Id", "Name", "Image", "State", "Ports"]
  }
  fn row(self) -> Vec<Cell> {
    let state_color = match self.state {
      ContainerState::Running => Color::Green,
      ContainerState::Exited | ContainerState::Dead => Color::Red,
      ContainerState::Restarting | ContainerState::Removing => Color::Yellow,
      _ => Color::Grey,
    };
    let ports = self
      .ports
      .iter()
      .map(|p| format!("{}:{}/{}", p.host, p.container, p.protocol))
      .collect::<Vec<_>>()
      .join(", ");
    vec![
      Cell::new(&self.id[..self.id.len().min(12)]),
      Cell::new(self.name).add_attribute(Attribute::Bold),
      Cell::new(self.image),
      Cell::new(self.state).fg(state_color),
      Cell::new(ports),
    ]
  }
}
