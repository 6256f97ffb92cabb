//! Text-generation one-shot command (§4.3 NotAvailable fallback), the
//! `llama-cli`-style counterpart to the persistent `llama-server` variant.

use std::path::{Path, PathBuf};

use leaxer_core::domain::ComputeBackend;
use leaxer_core::ports::{GenerationRequest, ServerError};
use serde_json::Value;

use super::cli_worker::OneShotCommand;

/// CLI invocation for a single text-completion job, used as the
/// `NotAvailable` fallback for the persistent text server.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextOneShot {
    pub backend: ComputeBackend,
}

impl OneShotCommand for TextOneShot {
    fn label(&self) -> &'static str {
        "text-cli"
    }

    fn binary_path(&self, bin_dir: &Path) -> Option<PathBuf> {
        let path = bin_dir.join(text_cli_binary_name(self.backend));
        path.exists().then_some(path)
    }

    fn build_args(&self, request: &GenerationRequest, _bin_dir: &Path) -> Vec<String> {
        let mut args = vec!["--model".to_string(), request.model_path.display().to_string()];
        let options = &request.options;

        if let Some(prompt) = options.get("prompt").and_then(Value::as_str) {
            args.push("--prompt".to_string());
            args.push(prompt.to_string());
        }
        if let Some(max_tokens) = options.get("max_tokens").and_then(Value::as_u64) {
            args.push("--n-predict".to_string());
            args.push(max_tokens.to_string());
        }
        if let Some(temperature) = options.get("temperature").and_then(Value::as_f64) {
            args.push("--temp".to_string());
            args.push(temperature.to_string());
        }
        if let Some(n_ctx) = request.startup_params.n_ctx {
            args.push("--ctx-size".to_string());
            args.push(n_ctx.to_string());
        }

        args
    }

    /// Unlike the image/video one-shots, the text CLI binary has no
    /// output file: a zero exit means the generated completion is the
    /// full stdout tail, concatenated back into one string.
    fn parse_output(&self, stdout_tail: &[String], exit_code: Option<i32>) -> Result<Value, ServerError> {
        if exit_code != Some(0) {
            return Err(ServerError::ServerCrashed(exit_code));
        }
        Ok(serde_json::json!({ "text": stdout_tail.join("\n") }))
    }
}

/// Executable filename for the text one-shot CLI binary, distinct from
/// the persistent server's `llama-server-*` naming (§6).
#[must_use]
pub fn text_cli_binary_name(backend: ComputeBackend) -> String {
    if cfg!(target_os = "windows") {
        match backend {
            ComputeBackend::Cuda => "llama-cli-x86_64-pc-windows-msvc-cuda.exe".to_string(),
            _ => "llama-cli-x86_64-pc-windows-msvc.exe".to_string(),
        }
    } else if cfg!(target_os = "macos") {
        match backend {
            ComputeBackend::Metal => "llama-cli-aarch64-apple-darwin-metal".to_string(),
            _ => "llama-cli-aarch64-apple-darwin".to_string(),
        }
    } else {
        match backend {
            ComputeBackend::Cuda => "llama-cli-x86_64-unknown-linux-gnu-cuda".to_string(),
            _ => "llama-cli-x86_64-unknown-linux-gnu".to_string(),
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
            model_path: PathBuf::from("model.gguf"),
            startup_params: StartupParams::default(),
            options,
        }
    }

    #[test]
    fn missing_binary_reports_none() {
        let cmd = TextOneShot { backend: ComputeBackend::Cpu };
        assert_eq!(cmd.binary_path(&std::env::temp_dir().join("definitely-not-here")), None);
    }

    #[test]
    fn build_args_includes_prompt_and_n_predict_when_present() {
        let cmd = TextOneShot { backend: ComputeBackend::Cpu };
        let args = cmd.build_args(&request(serde_json::json!({"prompt": "hello", "max_tokens": 64})), Path::new("."));
        assert!(args.windows(2).any(|w| w == ["--prompt", "hello"]));
        assert!(args.windows(2).any(|w| w == ["--n-predict", "64"]));
    }

    #[test]
    fn nonzero_exit_is_reported_as_crashed() {
        let cmd = TextOneShot::default();
        let result = cmd.parse_output(&[], Some(1));
        assert!(matches!(result, Err(ServerError::ServerCrashed(Some(1)))));
    }

    #[test]
    fn success_joins_stdout_tail_as_text() {
        let cmd = TextOneShot::default();
        let result = cmd.parse_output(&["hello".to_string(), "world".to_string()], Some(0)).unwrap();
        assert_eq!(result["text"], "hello\nworld");
    }
}
