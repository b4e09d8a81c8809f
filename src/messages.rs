use crate::error::MoodError;
use crate::track::Track;

/// Commands for the Player service
pub enum PlayerCommand {
    ReplaceAll(Vec<Track>),
    SelectIndex(usize),
    Next,
    Previous,
    TogglePlayPause,
    Seek(f32),
    SetVolume(f32),
    ToggleMute,
    ToggleEmbed,
}

/// Outcome of a spawned load-and-play request, fed back into the Player.
pub struct PlayResolved {
    pub generation: u64,
    pub result: Result<(), MoodError>,
}

/// Presentation hint: which part of the screen should be brought into view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollIntent {
    DetectionResult,
    Playlist,
    PlayerControls,
}

/// Recognition pipeline phase (observable via watch channel)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RecognitionPhase {
    #[default]
    Idle,
    Capturing,
    Detecting,
    Recommending,
    Done,
    Error,
}

/// State of the latest pipeline run. Replaced in full when a new run starts.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct RecognitionState {
    pub phase: RecognitionPhase,
    pub label: Option<String>,
    pub confidence: Option<f32>,
    pub detection_id: Option<String>,
    pub track_count: usize,
    pub error: Option<String>,
}
