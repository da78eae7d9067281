/// Container runtime port types (§4.4): config in, info out, labels.
pub mod container;
/// Shell-command audit trail and the Log Aggregator's entry shape (§4.7).
pub mod log;
/// The per-repository manifest and global service catalog (§6).
pub mod manifest;
/// [Repository] rows (§3).
pub mod repository;
/// Shared-service descriptor and registry state (§3/§4.5).
pub mod service;
/// [Worktree] rows and their status state machine (§3).
pub mod worktree;

pub use container::*;
pub use log::*;
pub use manifest::*;
pub use repository::*;
pub use service::*;
pub use worktree::*;
