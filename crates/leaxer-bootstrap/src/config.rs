//! Bootstrap configuration: where `Settings` and the external binary
//! directory come from, for this adapter only (§2.1, §3.1 — "loading
//! from `leaxer.toml`/environment variables is the bootstrap layer's
//! job", per `leaxer_core::settings`).
//!
//! No TOML/config crate is introduced: none of the teacher's own
//! settings loading goes through one either (`gglib-core::settings` is
//! pure domain types; its own bootstrap-layer loading is env-var driven
//! the same way this one is), so Leaxer's layering stays
//! `defaults -> env vars -> validate` rather than adding a dependency
//! the corpus never reaches for.

use std::path::PathBuf;

use anyhow::{Context, Result};
use leaxer_core::settings::{Settings, validate_settings};

/// Bootstrap-only configuration: a validated `Settings` plus the
/// directory external server/CLI binaries are resolved from.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub settings: Settings,
    pub bin_dir: PathBuf,
}

impl BootstrapConfig {
    /// Load settings from defaults overridden by environment variables,
    /// then validate. `bin_dir` defaults to `data_root()/bin` unless
    /// `LEAXER_BIN_DIR` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds a value that
    /// doesn't parse for its field, or if the resulting settings fail
    /// `validate_settings`.
    pub fn load() -> Result<Self> {
        let mut settings = Settings::with_defaults();

        if let Some(port) = env_parsed("LEAXER_IMAGE_SERVER_PORT")? {
            settings.image_server_port = Some(port);
        }
        if let Some(port) = env_parsed("LEAXER_TEXT_SERVER_PORT")? {
            settings.text_server_port = Some(port);
        }
        if let Some(size) = env_parsed("LEAXER_CONTEXT_SIZE")? {
            settings.context_size = Some(size);
        }
        if let Some(enabled) = env_parsed("LEAXER_BATCHING_ENABLED")? {
            settings.batching_enabled = Some(enabled);
        }
        if let Some(ms) = env_parsed("LEAXER_HEALTH_CHECK_INTERVAL_MS")? {
            settings.health_check_interval_ms = Some(ms);
        }
        if let Some(size) = env_parsed("LEAXER_LOG_RING_SIZE")? {
            settings.log_ring_size = Some(size);
        }
        if let Some(ms) = env_parsed("LEAXER_LOG_BATCH_MS")? {
            settings.log_batch_ms = Some(ms);
        }

        validate_settings(&settings).context("invalid settings")?;

        let bin_dir = match std::env::var("LEAXER_BIN_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => leaxer_core::paths::data_root()
                .context("resolving default binary directory")?
                .join("bin"),
        };

        Ok(Self { settings, bin_dir })
    }
}

/// Parse an optional environment variable, returning `Ok(None)` if unset
/// and an error only if it's set to something unparsable.
fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{key}: {e}")),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_without_overrides_matches_defaults() {
        // SAFETY: test mutates process env but restores it before returning.
        unsafe {
            std::env::remove_var("LEAXER_IMAGE_SERVER_PORT");
        }
        let config = BootstrapConfig::load().expect("load should succeed with no overrides");
        assert_eq!(config.settings.image_server_port, Some(1234));
    }

    #[test]
    fn env_override_replaces_default_port() {
        unsafe {
            std::env::set_var("LEAXER_IMAGE_SERVER_PORT", "5000");
        }
        let config = BootstrapConfig::load().expect("load should succeed");
        assert_eq!(config.settings.image_server_port, Some(5000));
        unsafe {
            std::env::remove_var("LEAXER_IMAGE_SERVER_PORT");
        }
    }

    #[test]
    fn invalid_override_is_rejected() {
        unsafe {
            std::env::set_var("LEAXER_IMAGE_SERVER_PORT", "80");
        }
        assert!(BootstrapConfig::load().is_err());
        unsafe {
            std::env::remove_var("LEAXER_IMAGE_SERVER_PORT");
        }
    }
}
