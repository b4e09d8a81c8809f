use super::camera::{CameraDevice, CameraSession};
use super::image::{self, ImagePayload};
use crate::error::{MoodError, Result};
use std::path::Path;
use tokio::sync::watch;

/// Owns the camera lifecycle and turns camera frames or uploads into payloads.
///
/// At most one session is open at a time. Dropping the controller releases it.
pub struct CaptureController {
    device: Box<dyn CameraDevice>,
    session: Option<Box<dyn CameraSession>>,
    active: watch::Sender<bool>,
}

impl CaptureController {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        let (active, _) = watch::channel(false);
        Self {
            device,
            session: None,
            active,
        }
    }

    /// Observe whether the camera is live.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Acquire the camera, releasing any session that is still open first.
    pub async fn start_camera(&mut self) -> Result<()> {
        self.stop_camera();

        let session = self.device.open().await?;
        self.session = Some(session);
        self.active.send_replace(true);
        tracing::info!("Camera started");
        Ok(())
    }

    /// Release the camera. Safe to call without an open session.
    pub fn stop_camera(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
            tracing::info!("Camera stopped");
        }
        self.active.send_replace(false);
    }

    pub async fn capture_frame(&mut self) -> Result<ImagePayload> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| MoodError::CaptureFailed("Camera is not active".to_string()))?;
        session.grab_frame().await
    }

    /// Uploads never touch the camera, so no session or lock is needed.
    pub async fn normalize_upload(path: &Path) -> Result<ImagePayload> {
        image::normalize_upload(path).await
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop_camera();
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory camera counting opens and releases.
    #[derive(Default, Clone)]
    pub struct FakeCamera {
        pub opened: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
        pub deny: bool,
    }

    impl FakeCamera {
        pub fn open_sessions(&self) -> usize {
            self.opened.load(Ordering::SeqCst) - self.released.load(Ordering::SeqCst)
        }
    }

    struct FakeSession {
        released: Arc<AtomicUsize>,
        live: bool,
    }

    #[async_trait]
    impl CameraDevice for FakeCamera {
        async fn open(&self) -> Result<Box<dyn CameraSession>> {
            if self.deny {
                return Err(MoodError::DeviceUnavailable("permission denied".to_string()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                released: Arc::clone(&self.released),
                live: true,
            }))
        }
    }

    #[async_trait]
    impl CameraSession for FakeSession {
        async fn grab_frame(&mut self) -> Result<ImagePayload> {
            Ok(ImagePayload::camera_jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]))
        }

        fn release(&mut self) {
            if self.live {
                self.live = false;
                self.released.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeCamera;
    use super::*;

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let camera = FakeCamera::default();
        let mut controller = CaptureController::new(Box::new(camera.clone()));
        let active = controller.subscribe();

        controller.start_camera().await.unwrap();
        assert!(*active.borrow());
        assert_eq!(camera.open_sessions(), 1);

        controller.stop_camera();
        controller.stop_camera();
        assert!(!*active.borrow());
        assert_eq!(camera.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_restart_releases_previous_session() {
        let camera = FakeCamera::default();
        let mut controller = CaptureController::new(Box::new(camera.clone()));

        controller.start_camera().await.unwrap();
        controller.start_camera().await.unwrap();

        assert_eq!(camera.opened.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(camera.open_sessions(), 1);
    }

    #[tokio::test]
    async fn test_capture_without_session_fails() {
        let mut controller = CaptureController::new(Box::new(FakeCamera::default()));
        let err = controller.capture_frame().await.unwrap_err();
        assert!(matches!(err, MoodError::CaptureFailed(_)));
    }

    #[tokio::test]
    async fn test_denied_camera_stays_inactive() {
        let camera = FakeCamera {
            deny: true,
            ..FakeCamera::default()
        };
        let mut controller = CaptureController::new(Box::new(camera));

        let err = controller.start_camera().await.unwrap_err();
        assert!(matches!(err, MoodError::DeviceUnavailable(_)));
        assert!(!controller.is_active());
    }

    #[tokio::test]
    async fn test_drop_releases_session() {
        let camera = FakeCamera::default();
        {
            let mut controller = CaptureController::new(Box::new(camera.clone()));
            controller.start_camera().await.unwrap();
            let frame = controller.capture_frame().await.unwrap();
            assert_eq!(frame.mime, "image/jpeg");
        }
        assert_eq!(camera.open_sessions(), 0);
    }
}
