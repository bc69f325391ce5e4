//! Change notification plumbing

mod orchestrator;
mod state;
mod types;

pub(crate) use orchestrator::WatchOrchestrator;
pub use state::{WatchLatch, WatchState};
pub use types::{WatchCallback, WatchEvent, WatchEventKind, WatchNotification};
