//! Process runtime and OS-level concerns for the Leaxer execution
//! substrate: the concrete adapters behind `leaxer-core`'s ports.

pub mod event_bus;
pub mod execution_state;
pub mod graph;
pub mod launcher;
pub mod model_server;
pub mod pidfile;
pub mod process_tracker;
pub mod queue;
pub mod shutdown;

pub use event_bus::{EventBus, LogBroadcaster, spawn_log_flush_loop};
pub use execution_state::ExecutionStateStore;
pub use graph::{DEFAULT_UNLOAD_IDLE_AFTER, GraphRuntime, Workers};
pub use launcher::{LaunchEnv, LaunchSpec, LaunchedProcess, compute_launch_env, spawn, spawn_log_readers};
pub use model_server::{
    CliOneShotWorker, ImageOneShot, ImageVariant, ServerManager, ServerWithFallback, TextOneShot, TextVariant,
    VideoOneShot,
};
pub use pidfile::{delete_pidfile, is_expected_binary, list_pidfiles, read_pidfile, write_pidfile};
pub use process_tracker::ProcessTracker;
pub use queue::JobQueue;
pub use shutdown::{kill_pid, shutdown_child};
