use serde::Deserialize;

const EMBED_QUERY: &str = "utm_source=generator";

/// Where a track's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// Short preview fetched and played locally.
    NativeStream { url: String },
    /// Third-party embeddable player, no local transport introspection.
    ExternalEmbed { url: String },
    /// Nothing playable; selectable but transport controls are disabled.
    Inert,
}

/// Source kind without the URL, used in snapshots and for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    NativeStream,
    ExternalEmbed,
    #[default]
    Inert,
}

impl TrackSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::NativeStream { .. } => SourceKind::NativeStream,
            Self::ExternalEmbed { .. } => SourceKind::ExternalEmbed,
            Self::Inert => SourceKind::Inert,
        }
    }
}

/// A recommended track. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "TrackRecord")]
pub struct Track {
    pub id: Option<String>,
    pub name: String,
    pub artist: String,
    pub album: String,
    pub artwork_url: Option<String>,
    pub duration_ms: Option<u64>,
    pub external_url: Option<String>,
    pub source: TrackSource,
}

impl Track {
    /// Stable identity for list rendering, falling back to the position.
    pub fn key(&self, index: usize) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => index.to_string(),
        }
    }

    /// URL to hand to the embeddable player, if this is an embed-only track.
    pub fn embed_player_url(&self) -> Option<String> {
        match &self.source {
            TrackSource::ExternalEmbed { url } => {
                let sep = if url.contains('?') { '&' } else { '?' };
                Some(format!("{url}{sep}{EMBED_QUERY}"))
            }
            _ => None,
        }
    }

    /// Short badge shown next to the track in the list.
    pub fn badge(&self) -> &'static str {
        match self.source.kind() {
            SourceKind::NativeStream => "Preview",
            SourceKind::ExternalEmbed => "Embed",
            SourceKind::Inert => "Unavailable",
        }
    }
}

/// Raw wire shape. Accepts both the camelCase contract names and the
/// snake_case names the recommendation backend emits.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrackRecord {
    id: Option<String>,
    name: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    #[serde(alias = "imageUrl", alias = "artworkUrl")]
    image_url: Option<String>,
    #[serde(alias = "durationMs")]
    duration_ms: Option<u64>,
    #[serde(alias = "externalUrl", alias = "spotify_url")]
    external_url: Option<String>,
    #[serde(alias = "previewUrl")]
    preview_url: Option<String>,
    #[serde(alias = "embedUrl", alias = "spotify_embed_url")]
    embed_url: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        let source = match (present(record.preview_url), present(record.embed_url)) {
            (Some(url), _) => TrackSource::NativeStream { url },
            (None, Some(url)) => TrackSource::ExternalEmbed { url },
            (None, None) => TrackSource::Inert,
        };

        Self {
            id: present(record.id),
            name: present(record.name).unwrap_or_else(|| "Unknown".to_string()),
            artist: record.artist.unwrap_or_default(),
            album: record.album.unwrap_or_default(),
            artwork_url: present(record.image_url),
            duration_ms: record.duration_ms.filter(|ms| *ms > 0),
            external_url: present(record.external_url),
            source,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_track(id: &str, source: TrackSource) -> Track {
    Track {
        id: Some(id.to_string()),
        name: format!("Track {id}"),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        artwork_url: None,
        duration_ms: Some(30_000),
        external_url: None,
        source,
    }
}
