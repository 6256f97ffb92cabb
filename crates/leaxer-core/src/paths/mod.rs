//! Path utilities for Leaxer data directories.
//!
//! Canonical resolution for the queue state file and PID tracking directory.
//! Deliberately simpler than a desktop-app equivalent: there is no local-repo
//! detection here, only an env override and the OS data directory.

mod error;
mod pids;
mod platform;
mod queue;

pub use error::PathError;
pub use pids::pids_dir;
pub use platform::data_root;
pub use queue::queue_state_path;
