//! Native Launcher: spawns external inference binaries with the
//! platform's dynamic-library search path configured.

mod env;
mod spawn;

pub use env::{LaunchEnv, compute_launch_env, has_expected_runtime_library};
pub use spawn::{LaunchSpec, LaunchedProcess, spawn, spawn_log_readers};
