use super::camera::{CameraDevice, CameraSession};
use super::image::ImagePayload;
use crate::error::{MoodError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_PENDING_BYTES: usize = 8 * 1024 * 1024;

/// V4L2 camera read through an `ffmpeg` child process.
///
/// While a session is open ffmpeg streams MJPEG to stdout and a reader task
/// keeps the most recent complete frame.
pub struct FfmpegCamera {
    ffmpeg: String,
    device: PathBuf,
}

impl FfmpegCamera {
    pub fn new(ffmpeg: impl Into<String>, device: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            device: device.into(),
        }
    }

    async fn check_device(&self) -> Result<()> {
        tokio::fs::File::open(&self.device).await.map_err(|e| {
            MoodError::DeviceUnavailable(format!("{}: {}", self.device.display(), e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl CameraDevice for FfmpegCamera {
    async fn open(&self) -> Result<Box<dyn CameraSession>> {
        self.check_device().await?;

        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-f", "v4l2", "-i"])
            .arg(&self.device)
            .args(["-f", "image2pipe", "-c:v", "mjpeg", "-q:v", "3", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MoodError::DeviceUnavailable(format!("Failed to spawn {}: {}", self.ffmpeg, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MoodError::DeviceUnavailable("ffmpeg stdout unavailable".to_string()))?;

        let (frame_tx, frame_rx) = watch::channel(None);
        let reader = tokio::spawn(read_frames(stdout, frame_tx));

        tracing::info!("Camera stream started on {}", self.device.display());
        Ok(Box::new(FfmpegSession {
            child: Some(child),
            reader: Some(reader),
            frames: frame_rx,
        }))
    }
}

async fn read_frames(
    mut stdout: tokio::process::ChildStdout,
    frames: watch::Sender<Option<Vec<u8>>>,
) {
    let mut splitter = FrameSplitter::default();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Some(frame) = splitter.push(&buf[..n]).pop() {
                    frames.send_replace(Some(frame));
                }
            }
            Err(e) => {
                tracing::warn!("Camera stream read failed: {}", e);
                break;
            }
        }
    }
    tracing::debug!("Camera reader finished");
}

struct FfmpegSession {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    frames: watch::Receiver<Option<Vec<u8>>>,
}

#[async_trait]
impl CameraSession for FfmpegSession {
    async fn grab_frame(&mut self) -> Result<ImagePayload> {
        if self.child.is_none() {
            return Err(MoodError::CaptureFailed("Camera session was released".to_string()));
        }

        let waited = tokio::time::timeout(
            FIRST_FRAME_TIMEOUT,
            self.frames.wait_for(|frame| frame.is_some()),
        )
        .await
        .map_err(|_| MoodError::CaptureFailed("Timed out waiting for a camera frame".to_string()))?;

        let frame = waited
            .map_err(|_| MoodError::CaptureFailed("Camera stream ended".to_string()))?
            .clone()
            .ok_or_else(|| MoodError::CaptureFailed("No frame available".to_string()))?;

        tracing::debug!("Grabbed camera frame ({} bytes)", frame.len());
        Ok(ImagePayload::camera_jpeg(frame))
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::warn!("Failed to stop camera process: {}", e);
            }
            tracing::info!("Camera stream released");
        }
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Splits a concatenated MJPEG byte stream into individual JPEG images.
///
/// Frames are delimited by the SOI (`FF D8`) and EOI (`FF D9`) markers; entropy
/// coded data never contains an unstuffed `FF D9`.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    pending: Vec<u8>,
}

impl FrameSplitter {
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(data);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_marker(&self.pending, 0xD8, 0) else {
                // Keep a trailing 0xFF in case the marker straddles reads.
                let keep = usize::from(self.pending.last() == Some(&0xFF));
                let drop_to = self.pending.len() - keep;
                self.pending.drain(..drop_to);
                break;
            };

            match find_marker(&self.pending, 0xD9, start + 2) {
                Some(end) => {
                    frames.push(self.pending[start..end + 2].to_vec());
                    self.pending.drain(..end + 2);
                }
                None => {
                    self.pending.drain(..start);
                    break;
                }
            }
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            tracing::warn!("Discarding {} bytes of unterminated frame data", self.pending.len());
            self.pending.clear();
        }

        frames
    }
}

fn find_marker(buf: &[u8], marker: u8, from: usize) -> Option<usize> {
    if from >= buf.len() {
        return None;
    }
    buf[from..]
        .windows(2)
        .position(|w| w[0] == 0xFF && w[1] == marker)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(body: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xFF, 0xD8];
        frame.extend_from_slice(body);
        frame.extend_from_slice(&[0xFF, 0xD9]);
        frame
    }

    #[test]
    fn test_splits_back_to_back_frames() {
        let mut stream = jpeg(&[1, 2, 3]);
        stream.extend(jpeg(&[4, 5]));

        let mut splitter = FrameSplitter::default();
        let frames = splitter.push(&stream);

        assert_eq!(frames, vec![jpeg(&[1, 2, 3]), jpeg(&[4, 5])]);
    }

    #[test]
    fn test_frame_across_reads() {
        let frame = jpeg(&[9, 0xFF, 0x00, 7]);
        let mut splitter = FrameSplitter::default();

        assert!(splitter.push(&frame[..3]).is_empty());
        assert!(splitter.push(&frame[3..frame.len() - 1]).is_empty());
        assert_eq!(splitter.push(&frame[frame.len() - 1..]), vec![frame]);
    }

    #[test]
    fn test_skips_garbage_before_frame() {
        let mut stream = vec![0x00, 0x13, 0x37];
        stream.extend(jpeg(&[42]));

        let mut splitter = FrameSplitter::default();
        assert_eq!(splitter.push(&stream), vec![jpeg(&[42])]);
    }

    #[tokio::test]
    async fn test_missing_device_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let camera = FfmpegCamera::new("ffmpeg", dir.path().join("video9"));

        let err = camera.open().await.err().unwrap();
        assert!(matches!(err, MoodError::DeviceUnavailable(_)));
    }
}
