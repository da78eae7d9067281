//! The Log Aggregator (spec §4.7): a per-worktree in-memory ring buffer
//! fed by subscriptions to each relevant container's log stream, with a
//! broadcast-fan-out `follow` stream and lag-aware backpressure
//! handling.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures_util::StreamExt;
use regex::Regex;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;
use vibeman_client::entities::log::{LogEntry, LogLevel, LogSearchQuery, LogSnapshot};

use crate::docker::ContainerRuntime;

const FOLLOW_CHANNEL_CAPACITY: usize = 1024;

struct Ring {
  capacity: usize,
  entries: VecDeque<LogEntry>,
  follow: broadcast::Sender<LogEntry>,
  subscriptions: Vec<tokio::task::AbortHandle>,
}

impl Ring {
  fn new(capacity: usize) -> Self {
    let (follow, _) = broadcast::channel(FOLLOW_CHANNEL_CAPACITY);
    Self {
      capacity,
      entries: VecDeque::with_capacity(capacity.min(1024)),
      follow,
      subscriptions: Vec::new(),
    }
  }

  fn push(&mut self, entry: LogEntry) {
    if self.entries.len() >= self.capacity {
      self.entries.pop_front();
    }
    self.entries.push_back(entry.clone());
    let _ = self.follow.send(entry);
  }
}

/// Annotates and retains log lines per worktree, exposing tail/follow/
/// search/clear (§4.7).
pub struct LogAggregator {
  capacity: usize,
  rings: RwLock<HashMap<Uuid, Arc<RwLock<Ring>>>>,
}

static LEVEL_PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();

fn level_pattern() -> &'static Regex {
  LEVEL_PATTERN.get_or_init(|| {
    Regex::new(r"(?i)\b(DEBUG|INFO|WARN(?:ING)?|ERROR|FATAL)\b").unwrap()
  })
}

fn detect_level(line: &str) -> LogLevel {
  match level_pattern()
    .captures(line)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().to_ascii_uppercase())
    .as_deref()
  {
    Some("DEBUG") => LogLevel::Debug,
    Some("INFO") => LogLevel::Info,
    Some("WARN") | Some("WARNING") => LogLevel::Warn,
    Some("ERROR") => LogLevel::Error,
    Some("FATAL") => LogLevel::Fatal,
    _ => LogLevel::Info,
  }
}

impl LogAggregator {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      rings: RwLock::new(HashMap::new()),
    }
  }

  async fn ring(&self, worktree_id: Uuid) -> Arc<RwLock<Ring>> {
    if let Some(ring) = self.rings.read().await.get(&worktree_id) {
      return ring.clone();
    }
    let mut rings = self.rings.write().await;
    rings
      .entry(worktree_id)
      .or_insert_with(|| Arc::new(RwLock::new(Ring::new(self.capacity))))
      .clone()
  }

  /// Subscribes to `container_name`'s log stream and feeds annotated
  /// lines into the worktree's ring until the stream ends or the
  /// subscription is detached (§4.6 step 7 / stop_worktree step 2).
  pub async fn subscribe(
    &self,
    worktree_id: Uuid,
    container_name: String,
    runtime: Arc<dyn ContainerRuntime>,
  ) {
    let ring = self.ring(worktree_id).await;
    let source = container_name.clone();

    let handle = tokio::spawn(async move {
      let mut stream = runtime.logs(&container_name, true, None);
      while let Some(chunk) = stream.next().await {
        let Ok(bytes) = chunk else { continue };
        for line in String::from_utf8_lossy(&bytes).lines() {
          if line.is_empty() {
            continue;
          }
          let entry = LogEntry {
            timestamp: chrono::Utc::now(),
            level: detect_level(line),
            source_container: source.clone(),
            message: line.to_string(),
            labels: indexmap::IndexMap::new(),
          };
          ring.write().await.push(entry);
        }
      }
    });

    let mut ring_guard = ring.write().await;
    ring_guard.subscriptions.push(handle.abort_handle());
  }

  /// Detaches every subscription for a worktree without discarding the
  /// buffered entries (`stop_worktree` step 2 keeps the ring readable
  /// after the containers it fed are gone).
  pub async fn detach(&self, worktree_id: Uuid) {
    if let Some(ring) = self.rings.read().await.get(&worktree_id) {
      let mut ring = ring.write().await;
      for handle in ring.subscriptions.drain(..) {
        handle.abort();
      }
    }
  }

  /// Pushes an orchestrator-authored entry (e.g. a recoverable setup
  /// warning) into a worktree's ring without going through a container
  /// subscription.
  pub async fn push_synthetic(&self, worktree_id: Uuid, entry: LogEntry) {
    let ring = self.ring(worktree_id).await;
    ring.write().await.push(entry);
  }

  pub async fn tail(&self, worktree_id: Uuid, lines: usize, container: Option<&str>) -> LogSnapshot {
    let ring = self.ring(worktree_id).await;
    let ring = ring.read().await;
    let filtered: Vec<LogEntry> = ring
      .entries
      .iter()
      .filter(|e| container.is_none_or(|c| e.source_container == c))
      .cloned()
      .collect();
    let truncated = ring.entries.len() >= ring.capacity;
    let start = filtered.len().saturating_sub(lines);
    LogSnapshot {
      entries: filtered[start..].to_vec(),
      truncated,
    }
  }

  /// Lazy, restartable follow stream (§4.7): each call opens a fresh
  /// subscriber to the ring's broadcast channel, so a dropped/closed
  /// consumer never blocks others.
  pub async fn follow(
    &self,
    worktree_id: Uuid,
    container: Option<String>,
  ) -> impl futures_util::Stream<Item = LogEntry> + Send + 'static {
    let ring = self.ring(worktree_id).await;
    let receiver = ring.read().await.follow.subscribe();
    follow_stream(receiver, container)
  }

  pub async fn search(&self, worktree_id: Uuid, query: &LogSearchQuery) -> Vec<LogEntry> {
    let ring = self.ring(worktree_id).await;
    let ring = ring.read().await;

    let matcher: Box<dyn Fn(&str) -> bool> = if query.regex {
      let pattern = if query.case_sensitive {
        Regex::new(&query.query)
      } else {
        Regex::new(&format!("(?i){}", query.query))
      };
      match pattern {
        Ok(re) => Box::new(move |s: &str| re.is_match(s)),
        Err(_) => Box::new(|_: &str| false),
      }
    } else if query.case_sensitive {
      let needle = query.query.clone();
      Box::new(move |s: &str| s.contains(needle.as_str()))
    } else {
      let needle = query.query.to_lowercase();
      Box::new(move |s: &str| s.to_lowercase().contains(needle.as_str()))
    };

    ring
      .entries
      .iter()
      .filter(|e| query.since.is_none_or(|since| e.timestamp >= since))
      .filter(|e| query.until.is_none_or(|until| e.timestamp <= until))
      .filter(|e| {
        query
          .containers
          .as_ref()
          .is_none_or(|cs| cs.iter().any(|c| c == &e.source_container))
      })
      .filter(|e| matcher(&e.message))
      .rev()
      .take(query.limit)
      .cloned()
      .collect::<Vec<_>>()
      .into_iter()
      .rev()
      .collect()
  }

  pub async fn clear(&self, worktree_id: Uuid, container: Option<&str>) {
    let ring = self.ring(worktree_id).await;
    let mut ring = ring.write().await;
    match container {
      Some(c) => ring.entries.retain(|e| e.source_container != c),
      None => ring.entries.clear(),
    }
  }
}

fn follow_stream(
  mut receiver: broadcast::Receiver<LogEntry>,
  container: Option<String>,
) -> impl futures_util::Stream<Item = LogEntry> + Send + 'static {
  async_stream::stream! {
    loop {
      match receiver.recv().await {
        Ok(entry) => {
          if container.as_deref().is_none_or(|c| entry.source_container == c) {
            yield entry;
          }
        }
        Err(broadcast::error::RecvError::Lagged(dropped)) => {
          yield LogEntry {
            timestamp: chrono::Utc::now(),
            level: LogLevel::Warn,
            source_container: "orchestrator".to_string(),
            message: format!("dropped {dropped} buffered log entries due to backpressure"),
            labels: indexmap::IndexMap::new(),
          };
        }
        Err(broadcast::error::RecvError::Closed) => break,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detects_known_level_prefixes() {
    assert_eq!(detect_level("2024 ERROR something broke"), LogLevel::Error);
    assert_eq!(detect_level("warn: retrying"), LogLevel::Warn);
    assert_eq!(detect_level("just a line"), LogLevel::Info);
  }

  #[tokio::test]
  async fn tail_respects_container_filter_and_limit() {
    let aggregator = LogAggregator::new(100);
    let worktree_id = Uuid::new_v4();
    let ring = aggregator.ring(worktree_id).await;
    {
      let mut ring = ring.write().await;
      for i in 0..5 {
        ring.push(LogEntry {
          timestamp: chrono::Utc::now(),
          level: LogLevel::Info,
          source_container: if i % 2 == 0 { "app" } else { "ai" }.to_string(),
          message: format!("line {i}"),
          labels: indexmap::IndexMap::new(),
        });
      }
    }
    let snapshot = aggregator.tail(worktree_id, 2, Some("app")).await;
    assert_eq!(snapshot.entries.len(), 2);
    assert!(snapshot.entries.iter().all(|e| e.source_container == "app"));
  }

  #[tokio::test]
  async fn clear_drops_entries_for_container_only() {
    let aggregator = LogAggregator::new(100);
    let worktree_id = Uuid::new_v4();
    let ring = aggregator.ring(worktree_id).await;
    {
      let mut ring = ring.write().await;
      ring.push(LogEntry {
        timestamp: chrono::Utc::now(),
        level: LogLevel::Info,
        source_container: "app".to_string(),
        message: "one".to_string(),
        labels: indexmap::IndexMap::new(),
      });
      ring.push(LogEntry {
        timestamp: chrono::Utc::now(),
        level: LogLevel::Info,
        source_container: "ai".to_string(),
        message: "two".to_string(),
        labels: indexmap::IndexMap::new(),
      });
    }
    aggregator.clear(worktree_id, Some("app")).await;
    let snapshot = aggregator.tail(worktree_id, 10, None).await;
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].source_container, "ai");
  }
}
