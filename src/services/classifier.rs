use super::api::{ApiClient, send_json};
use crate::capture::{ImageOrigin, ImagePayload};
use crate::error::{MoodError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Result of a successful emotion classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub detection_id: String,
}

/// Remote emotion classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &ImagePayload) -> Result<Detection>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct DetectionResponse {
    #[serde(alias = "emotionLabel", alias = "label")]
    emotion: String,
    confidence: f64,
    #[serde(alias = "detectionId", alias = "history_id")]
    detection_id: DetectionId,
}

impl TryFrom<DetectionResponse> for Detection {
    type Error = MoodError;

    fn try_from(response: DetectionResponse) -> Result<Self> {
        let label = response.emotion.trim().to_lowercase();
        if label.is_empty() {
            return Err(MoodError::ClassificationFailed(
                "Response carried no emotion label".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&response.confidence) {
            return Err(MoodError::ClassificationFailed(format!(
                "Confidence {} is outside [0, 1]",
                response.confidence
            )));
        }
        let detection_id = match response.detection_id {
            DetectionId::Text(id) => id,
            DetectionId::Number(id) => id.to_string(),
        };

        Ok(Self {
            label,
            confidence: response.confidence as f32,
            detection_id,
        })
    }
}

/// Classifier reached over HTTP.
///
/// Camera frames are posted as a JSON data URI to `emotion/detect-webcam`,
/// uploads as a multipart file to `emotion/detect-image`.
pub struct HttpClassifier {
    api: ApiClient,
}

impl HttpClassifier {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn build_request(&self, image: &ImagePayload) -> Result<reqwest::RequestBuilder> {
        match &image.origin {
            ImageOrigin::Camera => Ok(self
                .api
                .post("emotion/detect-webcam")
                .json(&serde_json::json!({ "image": image.to_data_uri() }))),
            ImageOrigin::Upload { .. } => {
                let part = Part::bytes(image.bytes.clone())
                    .file_name(image.file_name())
                    .mime_str(image.mime)
                    .map_err(|e| MoodError::ClassificationFailed(e.to_string()))?;
                Ok(self
                    .api
                    .post("emotion/detect-image")
                    .multipart(Form::new().part("image", part)))
            }
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, image: &ImagePayload) -> Result<Detection> {
        tracing::info!("Submitting {} image ({} bytes)", image.mime, image.bytes.len());

        let request = self.build_request(image)?;
        let response: DetectionResponse = send_json(request)
            .await
            .map_err(MoodError::ClassificationFailed)?;
        let detection = Detection::try_from(response)?;

        tracing::info!(
            "Detected {} ({:.0}%)",
            detection.label,
            detection.confidence * 100.0
        );
        Ok(detection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionContext;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName};
    use std::sync::Arc;

    fn classifier(token: Option<&str>) -> HttpClassifier {
        let session = SessionContext::in_memory(token.map(str::to_string));
        HttpClassifier::new(ApiClient::new(
            reqwest::Client::new(),
            "http://localhost:5000/api",
            Arc::new(session),
        ))
    }

    fn header(request: &reqwest::Request, name: HeaderName) -> Option<&str> {
        request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    fn parse(body: &str) -> Result<Detection> {
        let response: DetectionResponse = serde_json::from_str(body)
            .map_err(|e| MoodError::ClassificationFailed(e.to_string()))?;
        Detection::try_from(response)
    }

    #[test]
    fn test_camera_frame_posts_json_data_uri() {
        let image = ImagePayload::camera_jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9]);
        let request = classifier(Some("tok-1"))
            .build_request(&image)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "http://localhost:5000/api/emotion/detect-webcam"
        );
        assert_eq!(header(&request, CONTENT_TYPE), Some("application/json"));
        assert_eq!(header(&request, AUTHORIZATION), Some("Bearer tok-1"));

        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(json["image"], image.to_data_uri());
        assert!(json["image"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_upload_posts_multipart_without_token() {
        let image = ImagePayload {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime: "image/png",
            origin: ImageOrigin::Upload {
                file_name: "face.png".to_string(),
            },
        };
        let request = classifier(None)
            .build_request(&image)
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "http://localhost:5000/api/emotion/detect-image"
        );
        assert!(
            header(&request, CONTENT_TYPE)
                .unwrap()
                .starts_with("multipart/form-data; boundary=")
        );
        assert_eq!(header(&request, AUTHORIZATION), None);
    }

    #[test]
    fn test_backend_response() {
        let detection = parse(
            r#"{"message": "Emotion detected successfully", "emotion": "happy",
                "confidence": 0.82, "history_id": 17}"#,
        )
        .unwrap();
        assert_eq!(
            detection,
            Detection {
                label: "happy".to_string(),
                confidence: 0.82,
                detection_id: "17".to_string(),
            }
        );
    }

    #[test]
    fn test_contract_response() {
        let detection =
            parse(r#"{"emotionLabel": " Sad ", "confidence": 1.0, "detectionId": "d-1"}"#)
                .unwrap();
        assert_eq!(detection.label, "sad");
        assert_eq!(detection.detection_id, "d-1");
    }

    #[test]
    fn test_out_of_range_confidence_is_malformed() {
        let err = parse(r#"{"emotion": "happy", "confidence": 1.4, "history_id": 1}"#)
            .unwrap_err();
        assert!(matches!(err, MoodError::ClassificationFailed(_)));
    }

    #[test]
    fn test_blank_label_is_malformed() {
        assert!(parse(r#"{"emotion": "  ", "confidence": 0.5, "history_id": 1}"#).is_err());
    }
}
