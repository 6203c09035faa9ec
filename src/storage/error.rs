use std::fmt::Display;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::video::InvalidVideo;

/// What a failed lookup was looking for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Station(String),
    StationId(i64),
    PlaylistHandle(String),
    Track(i64),
    TrackIdentity {
        artist: String,
        album: String,
        title: String,
    },
    LatestTrack(i64),
}

impl Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lookup::Station(name) => write!(f, "station '{name}'"),
            Lookup::StationId(id) => write!(f, "station #{id}"),
            Lookup::PlaylistHandle(handle) => write!(f, "station with playlist '{handle}'"),
            Lookup::Track(id) => write!(f, "track #{id}"),
            Lookup::TrackIdentity {
                artist,
                album,
                title,
            } => write!(f, "track '{title}' by '{artist}' on '{album}'"),
            Lookup::LatestTrack(station) => write!(f, "latest track of station #{station}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0} not found")]
    NotFound(Lookup),

    #[error("track #{track_id} already recorded for station #{station_id} at {play_time}")]
    DuplicateEntry {
        track_id: i64,
        station_id: i64,
        play_time: DateTime<Utc>,
    },

    #[error("stored ignore list is malformed: {0}")]
    InvalidIgnoreList(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidLink(#[from] InvalidVideo),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
