//! Image-generation server variant: an A1111/Forge-compatible HTTP API
//! (§4.3, §6).

use std::path::Path;
use std::time::Duration;

use leaxer_core::domain::{ComputeBackend, StartupParams};
use leaxer_core::ports::GenerationRequest;
use rand::Rng;
use regex::Regex;
use serde_json::{Value, json};

use super::progress::IMAGE_PROGRESS_REGEX;
use super::variant::ServerVariant;

/// The image-generation Model Server Manager's variant behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageVariant;

impl ServerVariant for ImageVariant {
    fn label(&self) -> &'static str {
        "image-server"
    }

    fn health_path(&self) -> &'static str {
        "/v1/models"
    }

    fn banner_markers(&self) -> &'static [&'static str] {
        &["Uvicorn running on", "Application startup complete", "listening on"]
    }

    fn progress_regex(&self) -> &'static Regex {
        &IMAGE_PROGRESS_REGEX
    }

    fn binary_name(&self, backend: ComputeBackend) -> String {
        image_binary_name(backend)
    }

    fn build_args(&self, model: &Path, params: &StartupParams, port: u16) -> Vec<String> {
        build_image_args(model, params, port)
    }

    fn build_request(&self, request: &GenerationRequest) -> (&'static str, Value) {
        build_image_body(request)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(600)
    }
}

/// Executable filename for the image server, per §6's naming scheme.
#[must_use]
pub fn image_binary_name(backend: ComputeBackend) -> String {
    if cfg!(target_os = "windows") {
        match backend {
            ComputeBackend::Cuda => "sd-server-x86_64-pc-windows-msvc-cuda.exe".to_string(),
            ComputeBackend::Directml => "sd-server-x86_64-pc-windows-msvc-directml.exe".to_string(),
            _ => "sd-server-x86_64-pc-windows-msvc.exe".to_string(),
        }
    } else if cfg!(target_os = "macos") {
        match backend {
            ComputeBackend::Metal => "sd-server-aarch64-apple-darwin-metal".to_string(),
            _ => "sd-server-aarch64-apple-darwin".to_string(),
        }
    } else {
        match backend {
            ComputeBackend::Cuda => "sd-server-x86_64-unknown-linux-gnu-cuda".to_string(),
            _ => "sd-server-x86_64-unknown-linux-gnu".to_string(),
        }
    }
}

fn build_image_args(model: &Path, params: &StartupParams, port: u16) -> Vec<String> {
    let mut args = vec![
        "--model".to_string(),
        model.display().to_string(),
        "--port".to_string(),
        port.to_string(),
    ];

    if let Some(vae) = &params.vae_path {
        args.push("--vae".to_string());
        args.push(vae.display().to_string());
    }
    if params.tiling {
        args.push("--vae-tiling".to_string());
    }
    if let Some(clip_l) = &params.clip_l_path {
        args.push("--clip-l".to_string());
        args.push(clip_l.display().to_string());
    }
    if let Some(clip_g) = &params.clip_g_path {
        args.push("--clip-g".to_string());
        args.push(clip_g.display().to_string());
    }
    if let Some(t5) = &params.t5_path {
        args.push("--t5xxl".to_string());
        args.push(t5.display().to_string());
    }
    if let Some(controlnet) = &params.controlnet_path {
        args.push("--control-net".to_string());
        args.push(controlnet.display().to_string());
    }
    if let Some(photomaker) = &params.photomaker_dir {
        args.push("--photo-maker".to_string());
        args.push(photomaker.display().to_string());
    }
    if let Some(taesd) = &params.taesd_path {
        args.push("--taesd".to_string());
        args.push(taesd.display().to_string());
    }
    if params.cpu_offload_vae {
        args.push("--vae-on-cpu".to_string());
    }
    if params.cpu_offload_clip {
        args.push("--clip-on-cpu".to_string());
    }

    args
}

/// Build an A1111-compatible `txt2img`/`img2img` request body from
/// `request.options`, applying the defaulting rules of §4.3.
fn build_image_body(request: &GenerationRequest) -> (&'static str, Value) {
    let mut body = request.options.clone();
    if !body.is_object() {
        body = json!({});
    }
    let obj = body.as_object_mut().expect("forced to an object above");

    obj.entry("batch_size").or_insert_with(|| json!(1));

    if obj.get("seed").and_then(Value::as_i64) == Some(-1) {
        let seed: i32 = rand::rng().random_range(1..i32::MAX);
        obj.insert("seed".to_string(), json!(seed));
    }

    let is_img2img = obj.contains_key("init_images");
    if is_img2img && obj.contains_key("mask") {
        obj.entry("inpainting_fill").or_insert_with(|| json!(1));
        obj.entry("resize_mode").or_insert_with(|| json!(1));
        obj.entry("mask_blur").or_insert_with(|| json!(4));
    }

    let path = if is_img2img {
        "/sdapi/v1/img2img"
    } else {
        "/sdapi/v1/txt2img"
    };
    (path, body)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

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
    fn txt2img_path_when_no_init_images() {
        let (path, body) = build_image_body(&request(json!({"prompt": "a cat"})));
        assert_eq!(path, "/sdapi/v1/txt2img");
        assert_eq!(body["batch_size"], 1);
    }

    #[test]
    fn img2img_path_with_mask_sets_inpainting_defaults() {
        let (path, body) = build_image_body(&request(json!({
            "init_images": ["base64data"],
            "mask": "maskdata",
        })));
        assert_eq!(path, "/sdapi/v1/img2img");
        assert_eq!(body["inpainting_fill"], 1);
        assert_eq!(body["resize_mode"], 1);
        assert_eq!(body["mask_blur"], 4);
    }

    #[test]
    fn random_seed_substituted_when_negative_one() {
        let (_, body) = build_image_body(&request(json!({"seed": -1})));
        let seed = body["seed"].as_i64().unwrap();
        assert!(seed > 0);
    }

    #[test]
    fn explicit_seed_is_preserved() {
        let (_, body) = build_image_body(&request(json!({"seed": 42})));
        assert_eq!(body["seed"], 42);
    }

    #[test]
    fn startup_args_include_vae_when_set() {
        let params = StartupParams {
            vae_path: Some(PathBuf::from("foo.safetensors")),
            ..Default::default()
        };
        let args = build_image_args(Path::new("model.safetensors"), &params, 1234);
        assert!(args.windows(2).any(|w| w == ["--vae", "foo.safetensors"]));
    }
}
