use super::api::{ApiClient, send_json};
use crate::error::{MoodError, Result};
use crate::track::Track;
use async_trait::async_trait;
use serde::Deserialize;

/// What the pipeline asks the recommendation boundary for.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    pub label: String,
    pub detection_id: String,
    pub limit: u32,
}

impl RecommendationRequest {
    fn to_body(&self) -> serde_json::Value {
        // The backend keys its history rows by integer; keep opaque ids as text.
        let history_id = match self.detection_id.parse::<i64>() {
            Ok(id) => serde_json::Value::from(id),
            Err(_) => serde_json::Value::from(self.detection_id.clone()),
        };
        serde_json::json!({
            "emotion": self.label,
            "emotion_history_id": history_id,
            "limit": self.limit,
        })
    }
}

/// Remote mood-to-playlist service.
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Ordered by rank. Never empty on success.
    async fn recommend(&self, request: &RecommendationRequest) -> Result<Vec<Track>>;
}

#[derive(Deserialize)]
struct RecommendationResponse {
    tracks: Vec<Track>,
}

fn non_empty(tracks: Vec<Track>) -> Result<Vec<Track>> {
    if tracks.is_empty() {
        return Err(MoodError::RecommendationFailed(
            "No recommendations found".to_string(),
        ));
    }
    Ok(tracks)
}

pub struct HttpRecommender {
    api: ApiClient,
}

impl HttpRecommender {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Recommender for HttpRecommender {
    async fn recommend(&self, request: &RecommendationRequest) -> Result<Vec<Track>> {
        tracing::info!(
            "Requesting {} tracks for {}",
            request.limit,
            request.label
        );

        let response: RecommendationResponse =
            send_json(self.api.post("music/recommend").json(&request.to_body()))
                .await
                .map_err(MoodError::RecommendationFailed)?;

        let tracks = non_empty(response.tracks)?;
        tracing::info!("Received {} tracks", tracks.len());
        Ok(tracks)
    }
}
