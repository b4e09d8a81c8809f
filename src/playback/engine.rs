use super::state::{PlaybackState, TransportPhase};
use super::transport::TransportCommand;
use crate::error::MoodError;
use crate::track::{Track, TrackSource};
use std::time::Duration;

const DEFAULT_AUDIBLE_VOLUME: f32 = 1.0;

/// Transport state machine for the selected track.
///
/// The engine never touches media itself. Each operation updates the state and
/// returns the [`TransportCommand`] the caller must forward to the transport.
/// Asynchronous outcomes come back through [`PlaybackEngine::complete_play`],
/// [`PlaybackEngine::on_progress`] and [`PlaybackEngine::on_ended`], each
/// tagged with the generation they were issued under.
#[derive(Debug)]
pub struct PlaybackEngine {
    source: TrackSource,
    state: PlaybackState,
    generation: u64,
    last_audible_volume: f32,
}

impl PlaybackEngine {
    pub fn new(volume: f32) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        Self {
            source: TrackSource::Inert,
            state: PlaybackState {
                volume,
                ..PlaybackState::default()
            },
            generation: 0,
            last_audible_volume: if volume > 0.0 {
                volume
            } else {
                DEFAULT_AUDIBLE_VOLUME
            },
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Make `track` current, releasing whatever was loaded before.
    pub fn select_track(&mut self, track: Track) -> TransportCommand {
        self.generation += 1;
        self.source = track.source.clone();

        let kind = self.source.kind();
        self.state = PlaybackState {
            track: Some(track),
            source: kind,
            phase: TransportPhase::Idle,
            elapsed: Duration::ZERO,
            duration: None,
            volume: self.state.volume,
            muted: self.state.muted,
            embed_visible: matches!(self.source, TrackSource::ExternalEmbed { .. }),
            last_error: None,
        };

        tracing::debug!(
            "Selected track (generation {}, source {:?})",
            self.generation,
            kind
        );

        TransportCommand::Stop {
            generation: self.generation,
        }
    }

    /// Drop the current track after the playlist became empty.
    pub fn clear(&mut self) -> TransportCommand {
        self.generation += 1;
        self.source = TrackSource::Inert;
        self.state = PlaybackState {
            volume: self.state.volume,
            muted: self.state.muted,
            ..PlaybackState::default()
        };

        tracing::debug!("Cleared current track (generation {})", self.generation);

        TransportCommand::Stop {
            generation: self.generation,
        }
    }

    /// Flip between playing and paused for native-stream tracks.
    ///
    /// Ignored while a load is outstanding.
    pub fn toggle_play_pause(&mut self) -> Option<TransportCommand> {
        let url = match &self.source {
            TrackSource::NativeStream { url } => url.clone(),
            TrackSource::ExternalEmbed { .. } | TrackSource::Inert => return None,
        };

        if self.state.phase == TransportPhase::Loading {
            tracing::debug!("Play request ignored, preview still loading");
            return None;
        }

        if self.state.phase == TransportPhase::Playing {
            self.state.phase = TransportPhase::Paused;
            return Some(TransportCommand::Pause);
        }

        self.generation += 1;
        self.state.phase = TransportPhase::Loading;
        self.state.last_error = None;
        Some(TransportCommand::LoadAndPlay {
            generation: self.generation,
            url,
        })
    }

    /// Apply the outcome of a `LoadAndPlay`. Returns false when it was stale.
    pub fn complete_play(&mut self, generation: u64, result: Result<(), MoodError>) -> bool {
        if generation != self.generation {
            tracing::debug!(
                "Dropping stale play resolution (generation {} != {})",
                generation,
                self.generation
            );
            return false;
        }

        match result {
            Ok(()) => {
                self.state.phase = TransportPhase::Playing;
                self.state.last_error = None;
            }
            Err(e) => {
                tracing::warn!("Playback failed: {}", e);
                self.state.phase = TransportPhase::Paused;
                self.state.last_error = Some(e.user_message());
            }
        }
        true
    }

    pub fn on_progress(
        &mut self,
        generation: u64,
        elapsed: Duration,
        duration: Option<Duration>,
    ) -> bool {
        if generation != self.generation || !self.state.can_toggle() {
            return false;
        }
        self.state.elapsed = elapsed;
        if duration.is_some() {
            self.state.duration = duration;
        }
        true
    }

    /// Whether the end-of-stream signal belongs to the current track.
    pub fn on_ended(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state.phase = TransportPhase::Paused;
        true
    }

    /// Scrub to `fraction` of the preview. Native-stream only.
    pub fn seek(&mut self, fraction: f32) -> Option<TransportCommand> {
        if !self.state.can_seek() {
            return None;
        }
        let total = self.state.duration?;
        let position = total.mul_f32(fraction.clamp(0.0, 1.0));
        self.state.elapsed = position;
        Some(TransportCommand::Seek(position))
    }

    /// Set the slider level. A non-zero level also lifts the mute.
    pub fn set_volume(&mut self, level: f32) -> TransportCommand {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        self.state.volume = level;
        if level > 0.0 {
            self.last_audible_volume = level;
            self.state.muted = false;
        }
        TransportCommand::SetVolume(self.state.effective_volume())
    }

    /// Mute, or unmute back to the last audible level.
    pub fn toggle_mute(&mut self) -> TransportCommand {
        if self.state.is_silent() {
            self.state.muted = false;
            if self.state.volume == 0.0 {
                self.state.volume = self.last_audible_volume;
            }
        } else {
            self.state.muted = true;
        }
        TransportCommand::SetVolume(self.state.effective_volume())
    }

    /// Show or hide the embedded player. Returns false outside embed mode.
    pub fn toggle_embed(&mut self) -> bool {
        if !matches!(self.source, TrackSource::ExternalEmbed { .. }) {
            return false;
        }
        self.state.embed_visible = !self.state.embed_visible;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{SourceKind, test_track};

    fn preview(id: &str) -> Track {
        test_track(
            id,
            TrackSource::NativeStream {
                url: format!("https://p.example/{id}.mp3"),
            },
        )
    }

    fn embed(id: &str) -> Track {
        test_track(
            id,
            TrackSource::ExternalEmbed {
                url: format!("https://e.example/{id}"),
            },
        )
    }

    fn playing_engine() -> PlaybackEngine {
        let mut engine = PlaybackEngine::new(1.0);
        engine.select_track(preview("a"));
        let generation = match engine.toggle_play_pause() {
            Some(TransportCommand::LoadAndPlay { generation, .. }) => generation,
            other => panic!("unexpected command {other:?}"),
        };
        assert!(engine.complete_play(generation, Ok(())));
        engine.on_progress(generation, Duration::from_secs(12), Some(Duration::from_secs(30)));
        engine
    }

    #[test]
    fn test_select_track_resets_state() {
        let mut engine = playing_engine();
        assert_eq!(engine.state().phase, TransportPhase::Playing);

        let cmd = engine.select_track(preview("b"));

        assert_eq!(cmd, TransportCommand::Stop { generation: engine.generation() });
        assert_eq!(engine.state().phase, TransportPhase::Idle);
        assert_eq!(engine.state().elapsed, Duration::ZERO);
        assert_eq!(engine.state().duration, None);
        assert_eq!(engine.state().track.as_ref().and_then(|t| t.id.as_deref()), Some("b"));
    }

    #[test]
    fn test_play_then_pause() {
        let mut engine = playing_engine();
        assert_eq!(engine.toggle_play_pause(), Some(TransportCommand::Pause));
        assert_eq!(engine.state().phase, TransportPhase::Paused);
    }

    #[test]
    fn test_rejected_play_reverts_to_paused() {
        let mut engine = PlaybackEngine::new(1.0);
        engine.select_track(preview("a"));
        engine.toggle_play_pause();
        assert_eq!(engine.state().phase, TransportPhase::Loading);

        let generation = engine.generation();
        engine.complete_play(
            generation,
            Err(MoodError::PlaybackFailed("unsupported format".to_string())),
        );

        assert_eq!(engine.state().phase, TransportPhase::Paused);
        assert_eq!(engine.state().last_error.as_deref(), Some("unsupported format"));
    }

    #[test]
    fn test_inert_toggle_is_noop() {
        let mut engine = PlaybackEngine::new(1.0);
        engine.select_track(test_track("c", TrackSource::Inert));
        let before = engine.state().clone();

        assert_eq!(engine.toggle_play_pause(), None);
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn test_embed_track_defaults_visible_and_cannot_seek() {
        let mut engine = playing_engine();
        engine.select_track(embed("b"));

        assert_eq!(engine.state().source, SourceKind::ExternalEmbed);
        assert!(engine.state().embed_visible);
        assert_eq!(engine.seek(0.5), None);
        assert_eq!(engine.toggle_play_pause(), None);

        assert!(engine.toggle_embed());
        assert!(!engine.state().embed_visible);
    }

    #[test]
    fn test_stale_play_resolution_is_dropped() {
        let mut engine = PlaybackEngine::new(1.0);
        engine.select_track(preview("a"));
        engine.toggle_play_pause();
        let stale = engine.generation();

        engine.select_track(preview("b"));

        assert!(!engine.complete_play(stale, Ok(())));
        assert_eq!(engine.state().phase, TransportPhase::Idle);
    }

    #[test]
    fn test_toggle_while_loading_is_ignored() {
        let mut engine = PlaybackEngine::new(1.0);
        engine.select_track(preview("a"));
        engine.toggle_play_pause();
        let pending = engine.generation();

        assert_eq!(engine.toggle_play_pause(), None);
        assert_eq!(engine.generation(), pending);
        assert_eq!(engine.state().phase, TransportPhase::Loading);

        assert!(engine.complete_play(pending, Ok(())));
        assert_eq!(engine.state().phase, TransportPhase::Playing);
    }

    #[test]
    fn test_play_after_reselect_wins() {
        let mut engine = PlaybackEngine::new(1.0);
        engine.select_track(preview("a"));
        engine.toggle_play_pause();
        let first = engine.generation();
        engine.select_track(preview("b"));
        engine.toggle_play_pause();
        let second = engine.generation();

        assert!(!engine.complete_play(first, Err(MoodError::PlaybackFailed("x".into()))));
        assert_eq!(engine.state().phase, TransportPhase::Loading);
        assert!(engine.complete_play(second, Ok(())));
        assert_eq!(engine.state().phase, TransportPhase::Playing);
    }

    #[test]
    fn test_clear_drops_track_and_keeps_volume() {
        let mut engine = playing_engine();
        engine.set_volume(0.4);
        engine.toggle_mute();
        let before = engine.generation();

        let cmd = engine.clear();

        assert_eq!(cmd, TransportCommand::Stop { generation: before + 1 });
        assert_eq!(engine.state().track, None);
        assert_eq!(engine.state().phase, TransportPhase::Idle);
        assert_eq!(engine.state().source, SourceKind::Inert);
        assert_eq!(engine.state().volume, 0.4);
        assert!(engine.state().muted);
        assert_eq!(engine.toggle_play_pause(), None);
        assert!(!engine.complete_play(before, Ok(())));
    }

    #[test]
    fn test_seek_uses_fraction_of_duration() {
        let mut engine = playing_engine();
        assert_eq!(
            engine.seek(0.5),
            Some(TransportCommand::Seek(Duration::from_secs(15)))
        );
        assert_eq!(engine.state().elapsed, Duration::from_secs(15));
        assert_eq!(
            engine.seek(4.0),
            Some(TransportCommand::Seek(Duration::from_secs(30)))
        );
    }

    #[test]
    fn test_stale_progress_is_ignored() {
        let mut engine = playing_engine();
        let old = engine.generation();
        engine.select_track(preview("b"));
        assert!(!engine.on_progress(old, Duration::from_secs(3), None));
        assert_eq!(engine.state().elapsed, Duration::ZERO);
        assert!(!engine.on_ended(old));
    }

    #[test]
    fn test_unmute_from_zero_restores_default() {
        let mut engine = PlaybackEngine::new(1.0);
        engine.set_volume(0.0);
        assert_eq!(engine.toggle_mute(), TransportCommand::SetVolume(1.0));
        assert_eq!(engine.state().volume, 1.0);
        assert!(!engine.state().muted);
    }

    #[test]
    fn test_mute_keeps_level_across_repeated_zero() {
        let mut engine = PlaybackEngine::new(1.0);
        engine.set_volume(0.4);
        engine.set_volume(0.0);
        engine.set_volume(0.0);
        engine.toggle_mute();
        assert_eq!(engine.state().volume, 0.4);

        assert_eq!(engine.toggle_mute(), TransportCommand::SetVolume(0.0));
        assert!(engine.state().muted);
        assert_eq!(engine.state().volume, 0.4);
        assert_eq!(engine.toggle_mute(), TransportCommand::SetVolume(0.4));
    }

    #[test]
    fn test_volume_change_survives_track_switch() {
        let mut engine = PlaybackEngine::new(0.7);
        engine.toggle_mute();
        engine.select_track(preview("a"));
        assert!(engine.state().muted);
        assert_eq!(engine.state().volume, 0.7);
    }
}
