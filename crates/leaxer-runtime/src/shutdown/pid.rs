//! Kill an orphaned process by PID without a `Child` handle to reap it.

use std::io;

#[cfg(unix)]
use std::time::Duration;
#[cfg(unix)]
use tokio::time::sleep;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Kill an orphaned process by PID: SIGTERM, poll up to 2s, escalate to
/// SIGKILL, poll up to 2s again.
///
/// Used for cleaning up servers left over from a previous crash, where no
/// `Child` handle exists. Cannot reap the process; the OS init process
/// does that.
pub async fn kill_pid(pid: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        kill_pid_unix(pid).await
    }

    #[cfg(not(unix))]
    {
        kill_pid_windows(pid).await
    }
}

#[cfg(unix)]
async fn kill_pid_unix(pid: u32) -> io::Result<()> {
    let nix_pid = Pid::from_raw(pid as i32);

    if let Err(e) = signal::kill(nix_pid, Signal::SIGTERM) {
        if e == Errno::ESRCH {
            return Ok(());
        }
        return Err(io::Error::other(e));
    }

    for _ in 0..20 {
        sleep(Duration::from_millis(100)).await;
        match signal::kill(nix_pid, None) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok(()),
            Err(_) => {}
        }
    }

    if let Err(e) = signal::kill(nix_pid, Signal::SIGKILL) {
        if e == Errno::ESRCH {
            return Ok(());
        }
        return Err(io::Error::other(e));
    }

    for _ in 0..20 {
        sleep(Duration::from_millis(100)).await;
        match signal::kill(nix_pid, None) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok(()),
            Err(_) => {}
        }
    }

    Err(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("process {pid} did not exit after SIGKILL"),
    ))
}

#[cfg(not(unix))]
async fn kill_pid_windows(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "orphan cleanup not implemented on Windows",
    ))
}
