//! Video-generation one-shot command (§4.3 "Video generation requests are
//! not supported by the server; they MUST route to the CLI one-shot
//! path."). There is no persistent video server variant: this only
//! builds the CLI invocation `CliOneShotWorker` spawns per request.

use std::path::{Path, PathBuf};

use leaxer_core::domain::ComputeBackend;
use leaxer_core::ports::{GenerationRequest, ServerError};

use super::cli_worker::OneShotCommand;

/// CLI invocation for a single video-generation job. Mirrors the image
/// and text servers' arch/backend naming scheme (§6) but has no HTTP
/// surface at all, only an exit code and an output file path.
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoOneShot {
    pub backend: ComputeBackend,
}

impl OneShotCommand for VideoOneShot {
    fn label(&self) -> &'static str {
        "video-cli"
    }

    fn binary_path(&self, bin_dir: &Path) -> Option<PathBuf> {
        let path = bin_dir.join(video_binary_name(self.backend));
        path.exists().then_some(path)
    }

    fn build_args(&self, request: &GenerationRequest, _bin_dir: &Path) -> Vec<String> {
        let mut args = vec!["--model".to_string(), request.model_path.display().to_string()];

        if let Some(prompt) = request.options.get("prompt").and_then(serde_json::Value::as_str) {
            args.push("--prompt".to_string());
            args.push(prompt.to_string());
        }
        if let Some(frames) = request.options.get("frames").and_then(serde_json::Value::as_u64) {
            args.push("--frames".to_string());
            args.push(frames.to_string());
        }
        if let Some(fps) = request.options.get("fps").and_then(serde_json::Value::as_u64) {
            args.push("--fps".to_string());
            args.push(fps.to_string());
        }
        if let Some(out) = request.options.get("output_path").and_then(serde_json::Value::as_str) {
            args.push("--output".to_string());
            args.push(out.to_string());
        }

        args
    }

    /// Exit code 0 is success; the output path is the last non-empty
    /// stdout line (the binary prints it once encoding finishes),
    /// matching the generic CLI contract of §6.
    fn parse_output(&self, stdout_tail: &[String], exit_code: Option<i32>) -> Result<serde_json::Value, ServerError> {
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

/// Executable filename for the video one-shot binary, mirroring the
/// image/text server naming scheme.
#[must_use]
pub fn video_binary_name(backend: ComputeBackend) -> String {
    if cfg!(target_os = "windows") {
        match backend {
            ComputeBackend::Cuda => "sd-video-x86_64-pc-windows-msvc-cuda.exe".to_string(),
            _ => "sd-video-x86_64-pc-windows-msvc.exe".to_string(),
        }
    } else if cfg!(target_os = "macos") {
        match backend {
            ComputeBackend::Metal => "sd-video-aarch64-apple-darwin-metal".to_string(),
            _ => "sd-video-aarch64-apple-darwin".to_string(),
        }
    } else {
        match backend {
            ComputeBackend::Cuda => "sd-video-x86_64-unknown-linux-gnu-cuda".to_string(),
            _ => "sd-video-x86_64-unknown-linux-gnu".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use leaxer_core::domain::StartupParams;

    use super::*;

    fn request(options: serde_json::Value) -> GenerationRequest {
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
        let cmd = VideoOneShot { backend: ComputeBackend::Cpu };
        assert_eq!(cmd.binary_path(&std::env::temp_dir().join("definitely-not-here")), None);
    }

    #[test]
    fn build_args_includes_frame_and_fps_when_present() {
        let cmd = VideoOneShot { backend: ComputeBackend::Cpu };
        let args = cmd.build_args(&request(serde_json::json!({"prompt": "a cat running", "frames": 24, "fps": 8})), Path::new("."));
        assert!(args.windows(2).any(|w| w == ["--frames", "24"]));
        assert!(args.windows(2).any(|w| w == ["--fps", "8"]));
        assert!(args.windows(2).any(|w| w == ["--prompt", "a cat running"]));
    }

    #[test]
    fn nonzero_exit_is_reported_as_crashed() {
        let cmd = VideoOneShot::default();
        let result = cmd.parse_output(&[], Some(1));
        assert!(matches!(result, Err(ServerError::ServerCrashed(Some(1)))));
    }

    #[test]
    fn success_returns_last_nonblank_line_as_output_path() {
        let cmd = VideoOneShot::default();
        let result = cmd
            .parse_output(&["rendering...".to_string(), "/tmp/out.mp4".to_string(), String::new()], Some(0))
            .unwrap();
        assert_eq!(result["output_path"], "/tmp/out.mp4");
    }
}
