//! Ordered recommendation list and the active index.

use crate::track::Track;
use std::sync::Arc;

/// Read-only view of the playlist handed to the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistState {
    pub tracks: Arc<[Track]>,
    pub index: usize,
}

impl PlaylistState {
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Owns the track list for one recommendation result set.
///
/// Tracks are never mutated; only the list (wholesale) and the index change.
#[derive(Debug, Default)]
pub struct PlaylistController {
    tracks: Arc<[Track]>,
    index: usize,
}

impl PlaylistController {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[cfg(test)]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    /// Advance with wraparound. Identity on an empty list.
    pub fn next(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        self.index = (self.index + 1) % self.tracks.len();
        self.current()
    }

    /// Step back with wraparound. Identity on an empty list.
    pub fn previous(&mut self) -> Option<&Track> {
        if self.tracks.is_empty() {
            return None;
        }
        let len = self.tracks.len();
        self.index = (self.index + len - 1) % len;
        self.current()
    }

    /// Jump to `index`. Out-of-range requests leave the selection untouched.
    pub fn select_index(&mut self, index: usize) -> Option<&Track> {
        if index >= self.tracks.len() {
            tracing::warn!(
                "Ignoring selection of track {} (playlist has {})",
                index,
                self.tracks.len()
            );
            return None;
        }
        self.index = index;
        self.current()
    }

    /// Replace the whole list with a fresh result set and reset to the top.
    pub fn replace_all(&mut self, tracks: Vec<Track>) -> Option<&Track> {
        self.tracks = tracks.into();
        self.index = 0;
        self.current()
    }

    pub fn snapshot(&self) -> PlaylistState {
        PlaylistState {
            tracks: Arc::clone(&self.tracks),
            index: self.index,
        }
    }
}
