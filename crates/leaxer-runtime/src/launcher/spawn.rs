//! Spawn an external executable with the Native Launcher's environment
//! contract applied.

use std::path::PathBuf;

use leaxer_core::ports::ProcessError;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::env::{compute_launch_env, has_expected_runtime_library};

/// Parameters for one launch.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub exe_path: PathBuf,
    pub args: Vec<String>,
    pub bin_dir: PathBuf,
    pub extra_env: Vec<(String, String)>,
}

/// A spawned process with its OS PID captured before ownership of the
/// `Child` passes to the caller.
pub struct LaunchedProcess {
    pub child: Child,
    pub os_pid: u32,
}

/// Spawn `spec.exe_path` with the platform's dynamic-library search path
/// prefixed with `spec.bin_dir`.
///
/// On Windows the working directory must be set before process creation
/// since DLL resolution happens during `CreateProcess`; `tokio::process::Command`
/// applies `current_dir` as part of the same underlying call on every
/// platform, so no extra shim is needed here.
pub fn spawn(spec: &LaunchSpec) -> Result<LaunchedProcess, ProcessError> {
    if !has_expected_runtime_library(&spec.bin_dir) {
        warn!(bin_dir = %spec.bin_dir.display(), "expected runtime library not found, continuing anyway");
    }

    let launch_env = compute_launch_env(&spec.bin_dir);

    let mut cmd = Command::new(&spec.exe_path);
    cmd.args(&spec.args)
        .current_dir(&launch_env.current_dir)
        .envs(&launch_env.vars)
        .envs(spec.extra_env.iter().cloned())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    debug!(exe = %spec.exe_path.display(), args = ?spec.args, "spawning external process");

    let child = cmd
        .spawn()
        .map_err(|e| ProcessError::SpawnFailed(e.to_string()))?;

    let os_pid = child
        .id()
        .ok_or_else(|| ProcessError::SpawnFailed("spawned child has no PID".to_string()))?;

    Ok(LaunchedProcess { child, os_pid })
}

/// Spawn background tasks that forward a child's stdout/stderr lines to
/// `on_line`, one task per stream.
pub fn spawn_log_readers<F>(child: &mut Child, on_line: F)
where
    F: Fn(String) + Send + Sync + 'static,
{
    use tokio::io::{AsyncBufReadExt, BufReader};

    let on_line = std::sync::Arc::new(on_line);

    if let Some(stdout) = child.stdout.take() {
        let on_line = on_line.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                on_line(line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                on_line(line);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_reports_pid_and_allows_wait() {
        let spec = LaunchSpec {
            exe_path: PathBuf::from("echo"),
            args: vec!["hello".to_string()],
            bin_dir: std::env::temp_dir(),
            extra_env: Vec::new(),
        };

        let mut launched = spawn(&spec).expect("failed to spawn echo");
        assert!(launched.os_pid > 0);

        let status = launched.child.wait().await.expect("wait failed");
        assert!(status.success());
    }

    #[test]
    fn missing_binary_returns_spawn_error() {
        let spec = LaunchSpec {
            exe_path: PathBuf::from("/nonexistent/definitely-not-a-binary"),
            args: Vec::new(),
            bin_dir: std::env::temp_dir(),
            extra_env: Vec::new(),
        };
        assert!(spawn(&spec).is_err());
    }
}
