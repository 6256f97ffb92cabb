//! Graceful process termination: SIGTERM with a grace period, escalating
//! to SIGKILL.

mod child;
mod pid;

pub use child::shutdown_child;
pub use pid::kill_pid;
