use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Work the engine asks the media transport to perform.
///
/// Generation numbers tag every request so late work for a track that is no
/// longer selected can be recognised and dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    /// Release the current media resource.
    Stop { generation: u64 },
    /// Fetch, decode and start the preview at `url`.
    LoadAndPlay { generation: u64, url: String },
    Pause,
    Seek(Duration),
    SetVolume(f32),
}

/// Signals coming back from the transport while media is loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Progress {
        generation: u64,
        elapsed: Duration,
        duration: Option<Duration>,
    },
    Ended {
        generation: u64,
    },
}

/// Playback backend for native-stream tracks.
///
/// Implementations own exactly one media resource. `stop` and `load_and_play`
/// carry a generation; a load whose generation is older than the latest stop
/// must not start audio.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Load the preview and start playing it. Resolves once playback started.
    async fn load_and_play(&self, generation: u64, url: &str) -> Result<()>;

    fn stop(&self, generation: u64);

    fn pause(&self);

    fn seek(&self, position: Duration);

    fn set_volume(&self, level: f32);
}
