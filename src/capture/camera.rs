use super::image::ImagePayload;
use crate::error::Result;
use async_trait::async_trait;

/// A video input device that can be opened into a live session.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Acquire the device. Fails with `DeviceUnavailable` when it is missing
    /// or access is denied.
    async fn open(&self) -> Result<Box<dyn CameraSession>>;
}

/// An acquired camera stream.
#[async_trait]
pub trait CameraSession: Send {
    /// Encode the current frame at the stream's native resolution.
    async fn grab_frame(&mut self) -> Result<ImagePayload>;

    /// Stop every underlying track. Must be safe to call more than once.
    fn release(&mut self);
}
