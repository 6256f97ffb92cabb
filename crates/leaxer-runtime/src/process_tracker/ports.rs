//! Port availability and allocation.

use std::net::TcpListener;
use std::time::Duration;

use leaxer_core::ports::ProcessError;
use tokio::time::sleep;
use tracing::debug;

/// Check if a port is available by attempting to bind to it.
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port))
        .map(|listener| listener.local_addr().is_ok())
        .unwrap_or(false)
}

/// Allocate an available port starting at `base_port`, skipping ports
/// already tracked in `used_ports`. Retries a few times to ride out
/// races with another process grabbing the port between the check and
/// the caller's own bind.
pub async fn allocate_port(base_port: u16, used_ports: &[u16]) -> Result<u16, ProcessError> {
    for attempt in 0..3u32 {
        for offset in 0..100u16 {
            let port = base_port + offset;
            if used_ports.contains(&port) {
                continue;
            }
            if is_port_available(port) {
                sleep(Duration::from_millis(10)).await;
                if is_port_available(port) {
                    debug!(port, attempt, "allocated port");
                    return Ok(port);
                }
            }
        }
        if attempt < 2 {
            sleep(Duration::from_millis(100)).await;
        }
    }

    Err(ProcessError::NoFreePort {
        start: base_port,
        end: base_port + 99,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocate_port_skips_used() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = listener.local_addr().unwrap().port();
        let port = allocate_port(taken, &[]).await.unwrap();
        assert_ne!(port, taken);
    }
}
