use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, TransportErrorKind};

/// Thin HTTP client `vibeman-cli` uses to talk to a running
/// `vibeman-server` daemon (§6 Operations API, "CLI and browser UI
/// consume it identically").
#[derive(Debug, Clone)]
pub struct VibemanHttpClient {
  address: String,
  token: Option<String>,
  client: reqwest::Client,
}

impl VibemanHttpClient {
  pub fn new(address: impl Into<String>, token: Option<String>) -> Self {
    Self {
      address: address.into(),
      token,
      client: reqwest::Client::new(),
    }
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.address.trim_end_matches('/'), path)
  }

  fn authorize(
    &self,
    builder: reqwest::RequestBuilder,
  ) -> reqwest::RequestBuilder {
    match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  pub async fn get<R: DeserializeOwned>(
    &self,
    path: &str,
  ) -> Result<R, Error> {
    let request = self.authorize(self.client.get(self.url(path)));
    self.send(request).await
  }

  /// Like [Self::get], but serializes `query` onto the URL — every list
  /// filter and log-tail option travels as a query string, matching the
  /// server's axum `Query<_>` extractors (spec §6).
  pub async fn get_query<Q: Serialize, R: DeserializeOwned>(
    &self,
    path: &str,
    query: &Q,
  ) -> Result<R, Error> {
    let request = self.authorize(self.client.get(self.url(path)).query(query));
    self.send(request).await
  }

  /// Log-fetch routes (`/worktrees/{id}/logs` is the exception, returning
  /// JSON) stream raw bytes straight from the container runtime rather
  /// than a structured body; there is nothing to deserialize.
  pub async fn get_bytes(&self, path: &str, query: &impl Serialize) -> Result<Vec<u8>, Error> {
    let request = self.authorize(self.client.get(self.url(path)).query(query));
    let response = request.send().await.map_err(|e| Error::Transport {
      kind: TransportErrorKind::Network,
      message: format!("request to {} failed", self.address),
      source: Some(e.into()),
    })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| Error::Transport {
      kind: TransportErrorKind::ApiCall,
      message: "failed to read response body".into(),
      source: Some(e.into()),
    })?;
    if !status.is_success() {
      return Err(Error::Transport {
        kind: TransportErrorKind::ApiCall,
        message: format!("{} returned {status}: {}", self.address, String::from_utf8_lossy(&bytes)),
        source: None,
      });
    }
    Ok(bytes.to_vec())
  }

  pub async fn post<B: Serialize, R: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<R, Error> {
    let request =
      self.authorize(self.client.post(self.url(path)).json(body));
    self.send(request).await
  }

  pub async fn delete<R: DeserializeOwned>(
    &self,
    path: &str,
  ) -> Result<R, Error> {
    let request = self.authorize(self.client.delete(self.url(path)));
    self.send(request).await
  }

  /// Bodiless POST (worktree/service start-stop-restart routes take
  /// everything from the path, nothing from the body).
  pub async fn post_unit<R: DeserializeOwned>(&self, path: &str) -> Result<R, Error> {
    let request = self.authorize(self.client.post(self.url(path)));
    self.send(request).await
  }

  pub async fn delete_query<Q: Serialize>(&self, path: &str, query: &Q) -> Result<(), Error> {
    let request = self.authorize(self.client.delete(self.url(path)).query(query));
    self.send_empty(request).await
  }

  /// For routes that respond with an empty body (most `remove`/`clear`
  /// operations, mapped from `Result<(), VibemanResponse>` handlers) —
  /// `send`'s `.json()` call would otherwise choke on zero bytes.
  pub async fn post_empty(&self, path: &str) -> Result<(), Error> {
    let request = self.authorize(self.client.post(self.url(path)));
    self.send_empty(request).await
  }

  pub async fn delete_empty(&self, path: &str) -> Result<(), Error> {
    let request = self.authorize(self.client.delete(self.url(path)));
    self.send_empty(request).await
  }

  pub async fn post_empty_body<B: Serialize>(&self, path: &str, body: &B) -> Result<(), Error> {
    let request = self.authorize(self.client.post(self.url(path)).json(body));
    self.send_empty(request).await
  }

  async fn send_empty(
    &self,
    request: reqwest::RequestBuilder,
  ) -> Result<(), Error> {
    let response = request.send().await.map_err(|e| Error::Transport {
      kind: TransportErrorKind::Network,
      message: format!("request to {} failed", self.address),
      source: Some(e.into()),
    })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Transport {
        kind: TransportErrorKind::ApiCall,
        message: format!("{} returned {status}: {body}", self.address),
        source: None,
      });
    }
    Ok(())
  }

  async fn send<R: DeserializeOwned>(
    &self,
    request: reqwest::RequestBuilder,
  ) -> Result<R, Error> {
    let response = request.send().await.map_err(|e| {
      Error::Transport {
        kind: TransportErrorKind::Network,
        message: format!("request to {} failed", self.address),
        source: Some(e.into()),
      }
    })?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Transport {
        kind: TransportErrorKind::ApiCall,
        message: format!("{} returned {status}: {body}", self.address),
        source: None,
      });
    }

    response.json::<R>().await.map_err(|e| Error::Transport {
      kind: TransportErrorKind::ApiCall,
      message: "failed to decode response body".into(),
      source: Some(e.into()),
    })
  }
}
