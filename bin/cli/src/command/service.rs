use comfy_table::{Attribute, Cell, Color};
use vibeman_client::api::container::ContainerLogsRequest;
use vibeman_client::entities::service::{ServiceState, ServiceStatus};

use crate::args::ServiceCommand;
use crate::command::{PrintTable, print_items, print_one, vibeman_client};

pub async fn handle(command: &ServiceCommand, json: bool) -> anyhow::Result<()> {
  let client = vibeman_client().await?;
  match command {
    ServiceCommand::List => {
      let services: Vec<ServiceState> = client.get("/services").await?;
      print_items(services, json)
    }
    ServiceCommand::Get { name } => {
      let service: ServiceState = client.get(&format!("/services/{name}")).await?;
      print_one(&service)
    }
    ServiceCommand::Start { name } => {
      let service: ServiceState = client.post_unit(&format!("/services/{name}/start")).await?;
      print_one(&service)
    }
    ServiceCommand::Stop { name } => {
      let service: ServiceState = client.post_unit(&format!("/services/{name}/stop")).await?;
      print_one(&service)
    }
    ServiceCommand::Restart { name } => {
      let service: ServiceState = client.post_unit(&format!("/services/{name}/restart")).await?;
      print_one(&service)
    }
    ServiceCommand::Health { name } => {
      let service: ServiceState = client.post_unit(&format!("/services/{name}/health")).await?;
      print_one(&service)
    }
    ServiceCommand::Logs { name, follow, tail } => {
      let request = ContainerLogsRequest { id: String::new(), follow: *follow, tail: *tail };
      let bytes = client.get_bytes(&format!("/services/{name}/logs"), &request).await?;
      print!("{}", String::from_utf8_lossy(&bytes));
      Ok(())
    }
  }
}

impl PrintTable for ServiceState {
  fn header() -> &'static [&'static str] {
    &["Name", "Status", "Refs", "Health"]
  }
  fn row(self) -> Vec<Cell> {
    let status_color = match self.status {
      ServiceStatus::Running => Color::Green,
      ServiceStatus::Error => Color::Red,
      ServiceStatus::Starting | ServiceStatus::Stopping => Color::Yellow,
      ServiceStatus::Stopped => Color::Grey,
    };
    let health = match self.last_health {
      Some(true) => "healthy",
      Some(false) => "unhealthy",
      None => "-",
    };
    vec![
      Cell::new(self.name).add_attribute(Attribute::Bold),
      Cell::new(self.status).fg(status_color),
      Cell::new(self.ref_count),
      Cell::new(health),
    ]
  }
}
