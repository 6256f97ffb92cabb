//! Platform-specific environment and working-directory computation for
//! the Native Launcher.
//!
//! Expressed as pure functions over a `bin_dir` so the platform logic is
//! unit-testable without spawning a process, per `GuiProcessCore`'s
//! approach of keeping command construction separate from `.spawn()`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variables and working directory to apply to a `Command`
/// before spawning, computed for the current platform.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchEnv {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
}

/// Compute the launch environment for `bin_dir`, prefixing the
/// platform's dynamic-library search path and setting `GGML_BACKEND_DIR`.
#[must_use]
pub fn compute_launch_env(bin_dir: &Path) -> LaunchEnv {
    let mut vars = HashMap::new();
    vars.insert(
        "GGML_BACKEND_DIR".to_string(),
        bin_dir.display().to_string(),
    );

    let path_var = library_path_var();
    let existing = std::env::var(path_var).unwrap_or_default();
    let prefixed = if existing.is_empty() {
        bin_dir.display().to_string()
    } else {
        format!("{}{}{}", bin_dir.display(), path_separator(), existing)
    };
    vars.insert(path_var.to_string(), prefixed);

    if cfg!(target_os = "windows") {
        let existing_path = std::env::var("PATH").unwrap_or_default();
        let prefixed_path = format!("{}{}{}", bin_dir.display(), path_separator(), existing_path);
        vars.insert("PATH".to_string(), prefixed_path);
    }

    LaunchEnv {
        vars,
        current_dir: bin_dir.to_path_buf(),
    }
}

fn library_path_var() -> &'static str {
    if cfg!(target_os = "windows") {
        "PATH"
    } else if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

fn path_separator() -> char {
    if cfg!(target_os = "windows") { ';' } else { ':' }
}

/// Whether the expected runtime library (`llama.dll` on Windows, nothing
/// checked elsewhere) is present in `bin_dir`. Diagnostic only: the
/// launcher logs the result but never treats it as fatal.
#[must_use]
pub fn has_expected_runtime_library(bin_dir: &Path) -> bool {
    if cfg!(target_os = "windows") {
        bin_dir.join("llama.dll").exists()
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_ggml_backend_dir() {
        let env = compute_launch_env(Path::new("/opt/leaxer/bin"));
        assert_eq!(
            env.vars.get("GGML_BACKEND_DIR"),
            Some(&"/opt/leaxer/bin".to_string())
        );
    }

    #[test]
    fn current_dir_matches_bin_dir() {
        let env = compute_launch_env(Path::new("/opt/leaxer/bin"));
        assert_eq!(env.current_dir, PathBuf::from("/opt/leaxer/bin"));
    }

    #[test]
    fn prefixes_library_path() {
        let env = compute_launch_env(Path::new("/opt/leaxer/bin"));
        let var = if cfg!(target_os = "windows") {
            "PATH"
        } else if cfg!(target_os = "macos") {
            "DYLD_LIBRARY_PATH"
        } else {
            "LD_LIBRARY_PATH"
        };
        assert!(env.vars.get(var).unwrap().starts_with("/opt/leaxer/bin"));
    }
}
