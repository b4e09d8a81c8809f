pub mod camera;
pub mod controller;
pub mod ffmpeg;
pub mod image;

pub use controller::CaptureController;
pub use ffmpeg::FfmpegCamera;
pub use image::{ImageOrigin, ImagePayload};
