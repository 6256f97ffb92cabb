//! Subcommands exposed by the smoke-test CLI, one per §2.1 in-process
//! command (`enqueue`, `cancel`, `get_state`, `clear_pending`) plus a
//! `serve` loop and a `paths` diagnostic, following `gglib_cli::commands`.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Submit one workflow snapshot (read as JSON from a file, or `-`
    /// for stdin) and print the new job id.
    Enqueue {
        /// Path to a JSON workflow snapshot, or `-` to read from stdin.
        snapshot: String,
    },

    /// Print the current queue state: running job, pending jobs,
    /// finished jobs.
    Status,

    /// Cancel a pending or running job by id.
    Cancel {
        /// Job id to cancel.
        job_id: String,
    },

    /// Discard every pending (not yet started) job.
    ClearPending,

    /// Show resolved paths for diagnostics (`data_root`, `pids_dir`,
    /// `queue_state_path`, the configured binary directory).
    Paths,

    /// Run the interactive loop: one JSON workflow snapshot per stdin
    /// line, queue/event activity printed to stdout until EOF.
    Serve,
}
