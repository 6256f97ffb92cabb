//! Platform-specific path resolution.

use std::env;
use std::fs;
use std::path::PathBuf;

use super::error::PathError;

/// Get the root directory for application data (queue state, pid files).
///
/// Resolution order:
/// 1. `LEAXER_DATA_DIR` environment variable (highest priority)
/// 2. System data directory (e.g., `~/.local/share/leaxer`)
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var("LEAXER_DATA_DIR") {
        return Ok(PathBuf::from(path));
    }

    let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    let root = data_dir.join("leaxer");

    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| PathError::CreateFailed {
            path: root.clone(),
            reason: e.to_string(),
        })?;
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_override_wins() {
        // SAFETY of the test: single-threaded env mutation scoped to this test.
        unsafe {
            env::set_var("LEAXER_DATA_DIR", "/tmp/leaxer-test-root");
        }
        let root = data_root().expect("data_root failed");
        assert_eq!(root, PathBuf::from("/tmp/leaxer-test-root"));
        unsafe {
            env::remove_var("LEAXER_DATA_DIR");
        }
    }
}
