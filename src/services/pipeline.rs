use super::classifier::{Classifier, Detection};
use super::player::PlayerHandle;
use super::recommender::{RecommendationRequest, Recommender};
use crate::capture::{CaptureController, ImagePayload};
use crate::error::{MoodError, Result};
use crate::messages::{RecognitionPhase, RecognitionState, ScrollIntent};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, broadcast, watch};

/// Where the image for a run comes from.
#[derive(Debug, Clone)]
pub enum ImageSource<'a> {
    Camera,
    Upload(&'a Path),
}

/// Runs capture → classification → recommendation and hands the result to the
/// player.
///
/// Cheap to clone; clones share the same camera, state and in-flight flag. Only
/// one run may be in progress, extra requests are rejected with
/// [`MoodError::RunInFlight`]. The camera lock is held only while acquiring,
/// releasing or grabbing a frame, so the camera can be stopped while a
/// network call is outstanding.
#[derive(Clone)]
pub struct RecognitionPipeline {
    inner: Arc<Inner>,
}

struct Inner {
    capture: Mutex<CaptureController>,
    classifier: Arc<dyn Classifier>,
    recommender: Arc<dyn Recommender>,
    player: PlayerHandle,
    state: watch::Sender<RecognitionState>,
    scroll: broadcast::Sender<ScrollIntent>,
    running: AtomicBool,
    limit: u32,
}

/// Clears the in-flight flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl RecognitionPipeline {
    pub fn new(
        capture: CaptureController,
        classifier: Arc<dyn Classifier>,
        recommender: Arc<dyn Recommender>,
        player: PlayerHandle,
        scroll: broadcast::Sender<ScrollIntent>,
        limit: u32,
    ) -> Self {
        let (state, _) = watch::channel(RecognitionState::default());
        Self {
            inner: Arc::new(Inner {
                capture: Mutex::new(capture),
                classifier,
                recommender,
                player,
                state,
                scroll,
                running: AtomicBool::new(false),
                limit,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RecognitionState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> RecognitionState {
        self.inner.state.borrow().clone()
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub async fn camera_active(&self) -> watch::Receiver<bool> {
        self.inner.capture.lock().await.subscribe()
    }

    pub async fn start_camera(&self) -> Result<()> {
        self.inner.capture.lock().await.start_camera().await
    }

    pub async fn stop_camera(&self) {
        self.inner.capture.lock().await.stop_camera();
    }

    pub async fn run_from_camera(&self) -> Result<Vec<String>> {
        self.run(ImageSource::Camera).await
    }

    pub async fn run_from_upload(&self, path: &Path) -> Result<Vec<String>> {
        self.run(ImageSource::Upload(path)).await
    }

    /// One full run. Returns the keys of the tracks handed to the player.
    pub async fn run(&self, source: ImageSource<'_>) -> Result<Vec<String>> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Pipeline busy, rejecting run");
            return Err(MoodError::RunInFlight);
        }
        let _guard = RunGuard(&self.inner.running);

        self.inner.state.send_replace(RecognitionState {
            phase: RecognitionPhase::Capturing,
            ..RecognitionState::default()
        });

        let result = self.execute(source).await;
        if let Err(e) = &result {
            tracing::error!("Pipeline run failed: {}", e);
            self.inner.state.send_modify(|state| {
                state.phase = RecognitionPhase::Error;
                state.error = Some(e.user_message());
            });
        }
        result
    }

    async fn execute(&self, source: ImageSource<'_>) -> Result<Vec<String>> {
        let image = self.acquire(source).await?;

        self.set_phase(RecognitionPhase::Detecting);
        let detection = self.inner.classifier.classify(&image).await?;
        self.record_detection(&detection);
        let _ = self.inner.scroll.send(ScrollIntent::DetectionResult);

        self.set_phase(RecognitionPhase::Recommending);
        let request = RecommendationRequest {
            label: detection.label,
            detection_id: detection.detection_id,
            limit: self.inner.limit,
        };
        let tracks = self.inner.recommender.recommend(&request).await?;
        if tracks.is_empty() {
            return Err(MoodError::RecommendationFailed(
                "No recommendations found".to_string(),
            ));
        }

        let keys: Vec<String> = tracks
            .iter()
            .enumerate()
            .map(|(i, track)| track.key(i))
            .collect();
        let count = tracks.len();

        self.inner
            .player
            .replace_all(tracks)
            .await
            .map_err(|e| MoodError::RecommendationFailed(e.to_string()))?;

        self.inner.state.send_modify(|state| {
            state.phase = RecognitionPhase::Done;
            state.track_count = count;
        });
        let _ = self.inner.scroll.send(ScrollIntent::Playlist);
        tracing::info!("Pipeline run complete with {} tracks", count);

        Ok(keys)
    }

    async fn acquire(&self, source: ImageSource<'_>) -> Result<ImagePayload> {
        match source {
            ImageSource::Camera => self.inner.capture.lock().await.capture_frame().await,
            ImageSource::Upload(path) => CaptureController::normalize_upload(path).await,
        }
    }

    fn set_phase(&self, phase: RecognitionPhase) {
        tracing::debug!("Pipeline phase: {:?}", phase);
        self.inner.state.send_modify(|state| state.phase = phase);
    }

    fn record_detection(&self, detection: &Detection) {
        self.inner.state.send_modify(|state| {
            state.label = Some(detection.label.clone());
            state.confidence = Some(detection.confidence);
            state.detection_id = Some(detection.detection_id.clone());
        });
    }
}
