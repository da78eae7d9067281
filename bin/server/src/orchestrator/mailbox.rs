//! Per-entity serialization (§4.6 "Concurrency"): operations against the
//! same worktree (or repository, for the two ops that key on it) never
//! overlap; operations against different entities run in parallel.
//! Built on `dashmap`, keyed by entity id, one mutex per key.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Clone)]
pub struct Mailboxes {
  locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl Mailboxes {
  pub fn new() -> Self {
    Self {
      locks: Arc::new(DashMap::new()),
    }
  }

  pub fn get_or_create(&self, id: Uuid) -> Mailbox {
    let lock = self.locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
    Mailbox { lock }
  }
}

impl Default for Mailboxes {
  fn default() -> Self {
    Self::new()
  }
}

pub struct Mailbox {
  lock: Arc<Mutex<()>>,
}

impl Mailbox {
  /// Runs `make_future` with exclusive access to this entity's mailbox.
  /// Takes a factory rather than a future so the caller can borrow
  /// `self` (the orchestrator) only once the lock is actually held.
  pub async fn run<F, T>(&self, make_future: impl FnOnce() -> F) -> T
  where
    F: Future<Output = T>,
  {
    let _guard = self.lock.lock().await;
    make_future().await
  }
}
