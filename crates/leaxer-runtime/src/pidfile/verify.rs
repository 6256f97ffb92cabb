//! Verify a PID belongs to the binary we expect before killing it.
//!
//! Prevents a reused PID (from an unrelated process started after a
//! crash) from being killed by the startup orphan sweep.

#[cfg(target_os = "macos")]
use sysinfo::System;

#[cfg(target_os = "linux")]
use std::fs;

use std::path::Path;

/// Check whether `pid`'s executable resolves to `expected_path`.
///
/// Returns `false` (conservative) if verification fails for any reason,
/// or on platforms with no supported verification strategy.
pub fn is_expected_binary(pid: u32, expected_path: &Path) -> bool {
    #[cfg(target_os = "macos")]
    {
        is_expected_binary_macos(pid, expected_path)
    }

    #[cfg(target_os = "linux")]
    {
        is_expected_binary_linux(pid, expected_path)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = (pid, expected_path);
        false
    }
}

#[cfg(target_os = "macos")]
fn is_expected_binary_macos(pid: u32, expected_path: &Path) -> bool {
    let sys = System::new_all();
    let Some(process) = sys.process(sysinfo::Pid::from_u32(pid)) else {
        return false;
    };
    let Some(exe_path) = process.exe() else {
        return false;
    };
    match (exe_path.canonicalize(), expected_path.canonicalize()) {
        (Ok(actual), Ok(expected)) => actual == expected,
        _ => false,
    }
}

#[cfg(target_os = "linux")]
fn is_expected_binary_linux(pid: u32, expected_path: &Path) -> bool {
    let proc_exe = format!("/proc/{pid}/exe");
    let Ok(actual_path) = fs::read_link(&proc_exe) else {
        return false;
    };
    match (actual_path.canonicalize(), expected_path.canonicalize()) {
        (Ok(actual), Ok(expected)) => actual == expected,
        _ => false,
    }
}

/// Check whether a PID currently exists, without verifying its identity.
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub fn pid_exists(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn pid_exists_for_self() {
        assert!(pid_exists(std::process::id()));
    }

    #[test]
    #[cfg(unix)]
    fn pid_exists_false_for_impossible_pid() {
        assert!(!pid_exists(999_999));
    }

    #[test]
    fn rejects_self_as_unexpected_binary() {
        let self_pid = std::process::id();
        assert!(!is_expected_binary(self_pid, Path::new("/nonexistent/sd-server")));
    }
}
