//! Text rendering of player and pipeline state for the terminal front end.

use crate::messages::{RecognitionPhase, RecognitionState};
use crate::playback::{PlaybackState, TransportPhase};
use crate::playlist::PlaylistState;
use crate::track::SourceKind;
use std::time::Duration;

/// `m:ss`, as shown under the scrub bar.
pub fn format_time(t: Duration) -> String {
    let total = t.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

/// Track length from milliseconds; unknown renders as `0:00`.
pub fn format_duration_ms(ms: Option<u64>) -> String {
    format_time(Duration::from_millis(ms.unwrap_or(0)))
}

pub fn emotion_emoji(label: &str) -> &'static str {
    match label {
        "happy" => "😊",
        "sad" => "😢",
        "angry" => "😠",
        "fear" => "😨",
        "surprise" => "😲",
        "disgust" => "🤢",
        "neutral" => "😐",
        _ => "🙂",
    }
}

pub fn render_recognition(state: &RecognitionState) -> String {
    let detected = match (&state.label, state.confidence) {
        (Some(label), Some(confidence)) => format!(
            "{} {} ({:.0}%)",
            emotion_emoji(label),
            label,
            confidence * 100.0
        ),
        _ => "no detection".to_string(),
    };

    match state.phase {
        RecognitionPhase::Idle => "Ready".to_string(),
        RecognitionPhase::Capturing => "Capturing image...".to_string(),
        RecognitionPhase::Detecting => "Analyzing...".to_string(),
        RecognitionPhase::Recommending => {
            format!("{detected} - curating your playlist...")
        }
        RecognitionPhase::Done => format!("{detected} - {} songs", state.track_count),
        RecognitionPhase::Error => format!(
            "{detected} - error: {}",
            state.error.as_deref().unwrap_or("unknown")
        ),
    }
}

pub fn render_playback(state: &PlaybackState) -> String {
    let Some(track) = &state.track else {
        return "Nothing selected".to_string();
    };

    let phase = match state.phase {
        TransportPhase::Idle => "stopped",
        TransportPhase::Loading => "loading",
        TransportPhase::Playing => "playing",
        TransportPhase::Paused => "paused",
    };

    let volume = if state.muted {
        "muted".to_string()
    } else {
        format!("vol {:.0}%", state.volume * 100.0)
    };

    let transport = match state.source {
        SourceKind::NativeStream => format!(
            "{phase} {} / {}",
            format_time(state.elapsed),
            format_time(state.duration.unwrap_or_default())
        ),
        SourceKind::ExternalEmbed => match (state.embed_visible, track.embed_player_url()) {
            (true, Some(url)) => format!("embedded player: {url}"),
            _ => "embedded player hidden".to_string(),
        },
        SourceKind::Inert => "no playable source".to_string(),
    };

    let mut line = format!("{} - {} | {} | {}", track.artist, track.name, transport, volume);
    if let Some(err) = &state.last_error {
        line.push_str(&format!(" | {err}"));
    }
    line
}

pub fn render_playlist(playlist: &PlaylistState) -> String {
    if playlist.is_empty() {
        return "Playlist is empty".to_string();
    }

    playlist
        .tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            let marker = if i == playlist.index { '>' } else { ' ' };
            format!(
                "{marker} {:>2}. {} - {} ({}) [{}]",
                i + 1,
                track.artist,
                track.name,
                format_duration_ms(track.duration_ms),
                track.badge()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{TrackSource, test_track};
    use std::sync::Arc;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::ZERO), "0:00");
        assert_eq!(format_time(Duration::from_millis(29_900)), "0:29");
        assert_eq!(format_time(Duration::from_secs(201)), "3:21");
        assert_eq!(format_duration_ms(None), "0:00");
    }

    #[test]
    fn test_render_error_keeps_detection() {
        let state = RecognitionState {
            phase: RecognitionPhase::Error,
            label: Some("happy".to_string()),
            confidence: Some(0.82),
            error: Some("No recommendations found".to_string()),
            ..RecognitionState::default()
        };
        assert_eq!(
            render_recognition(&state),
            "😊 happy (82%) - error: No recommendations found"
        );
    }

    #[test]
    fn test_render_playlist_marks_current() {
        let playlist = PlaylistState {
            tracks: Arc::from(vec![
                test_track("a", TrackSource::Inert),
                test_track("b", TrackSource::Inert),
            ]),
            index: 1,
        };
        let rendered = render_playlist(&playlist);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].starts_with("   1."));
        assert!(lines[1].starts_with(">  2. Artist - Track b (0:30)"));
    }

    #[test]
    fn test_render_muted_embed() {
        let state = PlaybackState {
            track: Some(test_track(
                "b",
                TrackSource::ExternalEmbed {
                    url: "https://e.example/b".to_string(),
                },
            )),
            source: SourceKind::ExternalEmbed,
            embed_visible: true,
            muted: true,
            ..PlaybackState::default()
        };
        assert_eq!(
            render_playback(&state),
            "Artist - Track b | embedded player: https://e.example/b?utm_source=generator | muted"
        );
    }
}
