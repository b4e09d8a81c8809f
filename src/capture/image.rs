use crate::error::{MoodError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

/// Where a still image came from. The classification boundary has one
/// endpoint per origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOrigin {
    Camera,
    Upload { file_name: String },
}

/// Encoded still image ready for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub origin: ImageOrigin,
}

impl ImagePayload {
    pub fn camera_jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime: "image/jpeg",
            origin: ImageOrigin::Camera,
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    pub fn file_name(&self) -> String {
        match &self.origin {
            ImageOrigin::Upload { file_name } => file_name.clone(),
            ImageOrigin::Camera => format!("capture.{}", extension_for(self.mime)),
        }
    }
}

/// Guess the image type from its leading bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        _ => "jpg",
    }
}

/// Turn a user-chosen file into the same payload shape a camera frame has.
pub async fn normalize_upload(path: &Path) -> Result<ImagePayload> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        MoodError::CaptureFailed(format!("Failed to read {}: {}", path.display(), e))
    })?;

    if bytes.is_empty() {
        return Err(MoodError::CaptureFailed(format!(
            "{} is empty",
            path.display()
        )));
    }

    let mime = sniff_mime(&bytes).ok_or_else(|| {
        MoodError::CaptureFailed(format!("{} is not a supported image", path.display()))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("upload.{}", extension_for(mime)));

    tracing::info!("Loaded upload {} ({}, {} bytes)", file_name, mime, bytes.len());

    Ok(ImagePayload {
        bytes,
        mime,
        origin: ImageOrigin::Upload { file_name },
    })
}
