use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a station reports as currently playing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NowPlaying {
    pub artist: String,
    pub title: String,
    /// may be empty
    pub album: String,
}

impl NowPlaying {
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        album: impl Into<String>,
    ) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            album: album.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.artist.trim().is_empty() || self.title.trim().is_empty()
    }
}

/// A played track joined with its artist and album
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackSnapshot {
    pub track_id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub youtube_link: String,
    pub filesystem_link: String,
    pub play_time: DateTime<Utc>,
}

/// A catalogue track joined with its artist and album
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub track_id: i64,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artist_id: i64,
    pub album_id: i64,
    pub youtube_link: String,
    pub filesystem_link: String,
}

/// Result of `latest_tracks`.
///
/// Asking for one track yields the track itself, asking for more yields a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LatestTracks {
    Single(TrackSnapshot),
    Many(Vec<TrackSnapshot>),
}

impl LatestTracks {
    pub fn into_vec(self) -> Vec<TrackSnapshot> {
        match self {
            LatestTracks::Single(track) => vec![track],
            LatestTracks::Many(tracks) => tracks,
        }
    }
}
