use crate::track::{SourceKind, Track};
use std::time::Duration;

/// Transport phase of the current track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPhase {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Snapshot of the player published to the host after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub track: Option<Track>,
    pub source: SourceKind,
    pub phase: TransportPhase,
    pub elapsed: Duration,
    /// Known only for native-stream tracks once the media is decoded.
    pub duration: Option<Duration>,
    pub volume: f32,
    pub muted: bool,
    /// Only meaningful for external-embed tracks.
    pub embed_visible: bool,
    pub last_error: Option<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            track: None,
            source: SourceKind::Inert,
            phase: TransportPhase::Idle,
            elapsed: Duration::ZERO,
            duration: None,
            volume: 1.0,
            muted: false,
            embed_visible: false,
            last_error: None,
        }
    }
}

impl PlaybackState {
    /// Level actually applied to the output.
    pub fn effective_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    pub fn is_silent(&self) -> bool {
        self.effective_volume() == 0.0
    }

    pub fn can_toggle(&self) -> bool {
        self.source == SourceKind::NativeStream
    }

    pub fn can_seek(&self) -> bool {
        self.source == SourceKind::NativeStream && self.duration.is_some()
    }

    /// Scrub bar position in [0, 1].
    #[cfg(test)]
    pub fn progress(&self) -> f32 {
        match self.duration {
            Some(total) if !total.is_zero() => {
                (self.elapsed.as_secs_f32() / total.as_secs_f32()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }
}
