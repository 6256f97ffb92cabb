//! The behavior that differs between the image- and text-generation
//! Model Server Manager variants (§4.3): everything else lives in
//! `ServerManager<V>`.

use std::path::{Path, PathBuf};

use leaxer_core::domain::ComputeBackend;
use leaxer_core::ports::GenerationRequest;
use regex::Regex;

/// Behavior specific to one Model Server Manager variant.
pub trait ServerVariant: Send + Sync + 'static {
    /// Label used for Process Tracker registration and log spans.
    fn label(&self) -> &'static str;

    /// Path of the liveness-probe endpoint, relative to the server's base URL.
    fn health_path(&self) -> &'static str;

    /// Stdout substrings that indicate the server finished starting.
    fn banner_markers(&self) -> &'static [&'static str];

    /// Regex matching a stdout progress line; capture groups 1/2 are
    /// current/total.
    fn progress_regex(&self) -> &'static Regex;

    /// Executable filename for `backend` on the current platform (§6).
    fn binary_name(&self, backend: ComputeBackend) -> String;

    /// CLI arguments to launch the server on `port` with `model`/`params`.
    fn build_args(&self, model: &Path, params: &leaxer_core::domain::StartupParams, port: u16) -> Vec<String>;

    /// Build the request path and JSON body for `request`.
    fn build_request(&self, request: &GenerationRequest) -> (&'static str, serde_json::Value);

    /// Default HTTP timeout for a generation call (§5 Timeouts).
    fn request_timeout(&self) -> std::time::Duration;
}

/// Backends tried in order when the requested backend's binary is
/// missing: the request first, then `cuda -> metal -> cpu`, de-duplicated.
#[must_use]
pub fn fallback_backends(requested: ComputeBackend) -> Vec<ComputeBackend> {
    let candidates = [
        requested,
        ComputeBackend::Cuda,
        ComputeBackend::Metal,
        ComputeBackend::Cpu,
    ];
    let mut seen = Vec::new();
    for backend in candidates {
        if !seen.contains(&backend) {
            seen.push(backend);
        }
    }
    seen
}

/// Resolve the first backend (in fallback order) whose binary exists in
/// `bin_dir`, per the variant's naming scheme.
#[must_use]
pub fn resolve_binary<V: ServerVariant + ?Sized>(
    bin_dir: &Path,
    variant: &V,
    requested: ComputeBackend,
) -> Option<(ComputeBackend, PathBuf)> {
    for backend in fallback_backends(requested) {
        let path = bin_dir.join(variant.binary_name(backend));
        if path.exists() {
            return Some((backend, path));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_order_dedups_requested_backend() {
        let order = fallback_backends(ComputeBackend::Cuda);
        assert_eq!(
            order,
            vec![ComputeBackend::Cuda, ComputeBackend::Metal, ComputeBackend::Cpu]
        );
    }

    #[test]
    fn fallback_order_keeps_cpu_last_when_requested_is_directml() {
        let order = fallback_backends(ComputeBackend::Directml);
        assert_eq!(
            order,
            vec![
                ComputeBackend::Directml,
                ComputeBackend::Cuda,
                ComputeBackend::Metal,
                ComputeBackend::Cpu,
            ]
        );
    }
}
