//! Workflow watch loops
//!
//! Two independent scheduled tasks coordinate through the signal-file
//! store: the event loop reacting to agent exits, and the global scan
//! tick that picks up signals dropped outside the supervisor's
//! observation (a human touching a file, an external process). Both are
//! cancelled deterministically on shutdown.

mod watcher;

pub use watcher::{WatcherHandle, WorkflowWatcher};
