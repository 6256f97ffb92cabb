//! OS-level liveness checks backing the Process Tracker's periodic sweep.

use sysinfo::{Pid, ProcessStatus, System};

/// Check whether `pid` is alive and in a runnable/sleeping state.
pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new_all();
    system.refresh_processes(sysinfo::ProcessesToUpdate::All, false);

    system
        .process(Pid::from_u32(pid))
        .is_some_and(|process| {
            matches!(
                process.status(),
                ProcessStatus::Run | ProcessStatus::Sleep | ProcessStatus::Idle
            )
        })
}

/// Batch liveness check, refreshing the process table once for the whole
/// set rather than once per PID.
pub fn check_liveness_batch(pids: &[u32]) -> Vec<(u32, bool)> {
    let mut system = System::new_all();
    system.refresh_processes(sysinfo::ProcessesToUpdate::All, false);

    pids.iter()
        .map(|&pid| {
            let alive = system.process(Pid::from_u32(pid)).is_some_and(|process| {
                matches!(
                    process.status(),
                    ProcessStatus::Run | ProcessStatus::Sleep | ProcessStatus::Idle
                )
            });
            (pid, alive)
        })
        .collect()
}
