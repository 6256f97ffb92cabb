//! Text-generation server variant: an OpenAI-compatible HTTP API (llama.cpp
//! and siblings), §4.3 ADDED.

use std::path::Path;
use std::time::Duration;

use leaxer_core::domain::{ComputeBackend, StartupParams};
use leaxer_core::ports::GenerationRequest;
use regex::Regex;
use serde_json::{Value, json};

use super::progress::TEXT_PROGRESS_REGEX;
use super::variant::ServerVariant;

/// The text-generation Model Server Manager's variant behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextVariant;

impl ServerVariant for TextVariant {
    fn label(&self) -> &'static str {
        "text-server"
    }

    fn health_path(&self) -> &'static str {
        "/health"
    }

    fn banner_markers(&self) -> &'static [&'static str] {
        &["listening on", "server is listening"]
    }

    fn progress_regex(&self) -> &'static Regex {
        &TEXT_PROGRESS_REGEX
    }

    fn binary_name(&self, backend: ComputeBackend) -> String {
        text_binary_name(backend)
    }

    fn build_args(&self, model: &Path, params: &StartupParams, port: u16) -> Vec<String> {
        build_text_args(model, params, port)
    }

    fn build_request(&self, request: &GenerationRequest) -> (&'static str, Value) {
        build_text_body(request)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(300)
    }
}

/// Executable filename for the text server, mirroring the image server's
/// arch/backend naming scheme (§6).
#[must_use]
pub fn text_binary_name(backend: ComputeBackend) -> String {
    if cfg!(target_os = "windows") {
        match backend {
            ComputeBackend::Cuda => "llama-server-x86_64-pc-windows-msvc-cuda.exe".to_string(),
            _ => "llama-server-x86_64-pc-windows-msvc.exe".to_string(),
        }
    } else if cfg!(target_os = "macos") {
        match backend {
            ComputeBackend::Metal => "llama-server-aarch64-apple-darwin-metal".to_string(),
            _ => "llama-server-aarch64-apple-darwin".to_string(),
        }
    } else {
        match backend {
            ComputeBackend::Cuda => "llama-server-x86_64-unknown-linux-gnu-cuda".to_string(),
            _ => "llama-server-x86_64-unknown-linux-gnu".to_string(),
        }
    }
}

fn build_text_args(model: &Path, params: &StartupParams, port: u16) -> Vec<String> {
    let mut args = vec![
        "--model".to_string(),
        model.display().to_string(),
        "--port".to_string(),
        port.to_string(),
    ];

    if let Some(n_ctx) = params.n_ctx {
        args.push("--ctx-size".to_string());
        args.push(n_ctx.to_string());
    }
    if let Some(n_gpu_layers) = params.n_gpu_layers {
        args.push("--n-gpu-layers".to_string());
        args.push(n_gpu_layers.to_string());
    }
    if params.chat_template_jinja {
        args.push("--jinja".to_string());
    }

    args
}

/// Build an OpenAI-compatible completion request body. `stream` is always
/// forced to `false`: the Manager consumes the full response and
/// re-publishes progress via `llm.streaming` itself rather than forwarding
/// upstream SSE framing (transport framing is out of scope, §1).
fn build_text_body(request: &GenerationRequest) -> (&'static str, Value) {
    let mut body = request.options.clone();
    if !body.is_object() {
        body = json!({});
    }
    let obj = body.as_object_mut().expect("forced to an object above");
    obj.insert("stream".to_string(), json!(false));

    ("/v1/completions", body)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn forces_stream_false() {
        let request = GenerationRequest {
            job_id: "job1".to_string(),
            node_id: "node1".to_string(),
            model_path: PathBuf::from("model.gguf"),
            startup_params: StartupParams::default(),
            options: json!({"prompt": "hello", "stream": true}),
        };
        let (path, body) = build_text_body(&request);
        assert_eq!(path, "/v1/completions");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn args_include_context_size_when_set() {
        let params = StartupParams {
            n_ctx: Some(4096),
            ..Default::default()
        };
        let args = build_text_args(Path::new("model.gguf"), &params, 8080);
        assert!(args.windows(2).any(|w| w == ["--ctx-size", "4096"]));
    }
}
