//! Image-generation one-shot command (§4.3 "the Manager MUST delegate to
//! a CLI-based one-shot worker" when no server binary exists for any
//! backend). Mirrors the video one-shot's CLI-naming scheme; unlike the
//! server variant there is no HTTP surface, only arguments and an exit
//! code.

use std::path::{Path, PathBuf};

use leaxer_core::domain::ComputeBackend;
use leaxer_core::ports::{GenerationRequest, ServerError};
use serde_json::Value;

use super::cli_worker::OneShotCommand;

/// CLI invocation for a single image-generation job, used as the
/// `NotAvailable` fallback for the persistent image server.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageOneShot {
    pub backend: ComputeBackend,
}

impl OneShotCommand for ImageOneShot {
    fn label(&self) -> &'static str {
        "image-cli"
    }

    fn binary_path(&self, bin_dir: &Path) -> Option<PathBuf> {
        let path = bin_dir.join(image_cli_binary_name(self.backend));
        path.exists().then_some(path)
    }

    fn build_args(&self, request: &GenerationRequest, _bin_dir: &Path) -> Vec<String> {
        let mut args = vec!["--model".to_string(), request.model_path.display().to_string()];
        let options = &request.options;

        if let Some(prompt) = options.get("prompt").and_then(Value::as_str) {
            args.push("--prompt".to_string());
            args.push(prompt.to_string());
        }
        if let Some(negative) = options.get("negative_prompt").and_then(Value::as_str) {
            args.push("--negative-prompt".to_string());
            args.push(negative.to_string());
        }
        if let Some(width) = options.get("width").and_then(Value::as_u64) {
            args.push("--width".to_string());
            args.push(width.to_string());
        }
        if let Some(height) = options.get("height").and_then(Value::as_u64) {
            args.push("--height".to_string());
            args.push(height.to_string());
        }
        if let Some(steps) = options.get("steps").and_then(Value::as_u64) {
            args.push("--steps".to_string());
            args.push(steps.to_string());
        }
        if let Some(cfg_scale) = options.get("cfg_scale").and_then(Value::as_f64) {
            args.push("--cfg-scale".to_string());
            args.push(cfg_scale.to_string());
        }
        if let Some(seed) = options.get("seed").and_then(Value::as_i64) {
            args.push("--seed".to_string());
            args.push(seed.to_string());
        }
        if let Some(sampler) = options.get("sampler_name").and_then(Value::as_str) {
            args.push("--sampling-method".to_string());
            args.push(sampler.to_string());
        }

        args
    }

    /// Exit code 0 is success; the output path is the last non-empty
    /// stdout line, matching the generic one-shot contract of §6.
    fn parse_output(&self, stdout_tail: &[String], exit_code: Option<i32>) -> Result<Value, ServerError> {
        if exit_code != Some(0) {
            return Err(ServerError::ServerCrashed(exit_code));
        }
        let path = stdout_tail
            .iter()
            .rev()
            .find(|line| !line.trim().is_empty())
            .cloned()
            .unwrap_or_default();
        Ok(serde_json::json!({ "output_path": path }))
    }
}

/// Executable filename for the image one-shot CLI binary, distinct from
/// the persistent server's `sd-server-*` naming (§6) since the two are
/// separate binaries shipped side by side.
#[must_use]
pub fn image_cli_binary_name(backend: ComputeBackend) -> String {
    if cfg!(target_os = "windows") {
        match backend {
            ComputeBackend::Cuda => "sd-cli-x86_64-pc-windows-msvc-cuda.exe".to_string(),
            ComputeBackend::Directml => "sd-cli-x86_64-pc-windows-msvc-directml.exe".to_string(),
            _ => "sd-cli-x86_64-pc-windows-msvc.exe".to_string(),
        }
    } else if cfg!(target_os = "macos") {
        match backend {
            ComputeBackend::Metal => "sd-cli-aarch64-apple-darwin-metal".to_string(),
            _ => "sd-cli-aarch64-apple-darwin".to_string(),
        }
    } else {
        match backend {
            ComputeBackend::Cuda => "sd-cli-x86_64-unknown-linux-gnu-cuda".to_string(),
            _ => "sd-cli-x86_64-unknown-linux-gnu".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use leaxer_core::domain::StartupParams;

    use super::*;

    fn request(options: Value) -> GenerationRequest {
        GenerationRequest {
            job_id: "job1".to_string(),
            node_id: "node1".to_string(),
            model_path: PathBuf::from("model.safetensors"),
            startup_params: StartupParams::default(),
            options,
        }
    }

    #[test]
    fn missing_binary_reports_none() {
        let cmd = ImageOneShot { backend: ComputeBackend::Cpu };
        assert_eq!(cmd.binary_path(&std::env::temp_dir().join("definitely-not-here")), None);
    }

    #[test]
    fn build_args_includes_prompt_and_steps_when_present() {
        let cmd = ImageOneShot { backend: ComputeBackend::Cpu };
        let args = cmd.build_args(&request(serde_json::json!({"prompt": "a cat", "steps": 20})), Path::new("."));
        assert!(args.windows(2).any(|w| w == ["--prompt", "a cat"]));
        assert!(args.windows(2).any(|w| w == ["--steps", "20"]));
    }

    #[test]
    fn nonzero_exit_is_reported_as_crashed() {
        let cmd = ImageOneShot::default();
        let result = cmd.parse_output(&[], Some(1));
        assert!(matches!(result, Err(ServerError::ServerCrashed(Some(1)))));
    }

    #[test]
    fn success_returns_last_nonblank_line_as_output_path() {
        let cmd = ImageOneShot::default();
        let result = cmd
            .parse_output(&["sampling...".to_string(), "/tmp/out.png".to_string(), String::new()], Some(0))
            .unwrap();
        assert_eq!(result["output_path"], "/tmp/out.png");
    }
}
