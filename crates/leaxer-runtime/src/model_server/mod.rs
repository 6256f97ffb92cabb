//! Model Server Manager and CLI One-Shot Worker adapters (§4.3, §4.4).

mod cli_worker;
mod fallback;
mod image;
mod image_oneshot;
mod manager;
mod progress;
mod text;
mod text_oneshot;
mod variant;
mod video;

pub use cli_worker::{CliOneShotWorker, OneShotCommand};
pub use fallback::ServerWithFallback;
pub use image::{ImageVariant, image_binary_name};
pub use image_oneshot::{ImageOneShot, image_cli_binary_name};
pub use manager::ServerManager;
pub use progress::{IMAGE_PROGRESS_REGEX, TEXT_PROGRESS_REGEX, ParsedProgress, parse_progress_line};
pub use text::{TextVariant, text_binary_name};
pub use text_oneshot::{TextOneShot, text_cli_binary_name};
pub use variant::{ServerVariant, fallback_backends, resolve_binary};
pub use video::{VideoOneShot, video_binary_name};
